//! Integration tests for async evaluation sessions.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use evalq_core::{
    Error, EvaluationFailure, EvaluationSession, Evaluator, Outcome, QueueEvent, RequestId,
    SessionConfig,
};

/// Chunk used by these tests: a label plus scripted behavior.
#[derive(Debug, Clone)]
struct Chunk {
    label: &'static str,
    fail: bool,
    delay: Duration,
}

impl Chunk {
    fn ok(label: &'static str) -> Self {
        Self {
            label,
            fail: false,
            delay: Duration::ZERO,
        }
    }

    fn failing(label: &'static str) -> Self {
        Self {
            fail: true,
            ..Self::ok(label)
        }
    }

    fn slow(label: &'static str, delay: Duration) -> Self {
        Self {
            delay,
            ..Self::ok(label)
        }
    }
}

/// Evaluator that records the order chunks were run in.
#[derive(Default)]
struct RecordingEvaluator {
    ran: Mutex<Vec<&'static str>>,
}

impl Evaluator<Chunk> for RecordingEvaluator {
    async fn evaluate(&self, _id: RequestId, chunk: &Chunk) -> Result<(), EvaluationFailure> {
        self.ran.lock().unwrap().push(chunk.label);
        if !chunk.delay.is_zero() {
            tokio::time::sleep(chunk.delay).await;
        }
        if chunk.fail {
            Err(EvaluationFailure::new(format!("{} failed", chunk.label)))
        } else {
            Ok(())
        }
    }
}

#[tokio::test]
async fn test_chunks_run_in_submission_order() {
    let session = EvaluationSession::default();
    for label in ["load", "clean", "plot"] {
        session.submit(Chunk::ok(label)).await;
    }

    let evaluator = RecordingEvaluator::default();
    let report = session.run_until_idle(&evaluator).await.unwrap();

    assert_eq!(report.resolved.len(), 3);
    assert_eq!(*evaluator.ran.lock().unwrap(), vec!["load", "clean", "plot"]);
}

#[tokio::test]
async fn test_failure_skips_remaining_chunks() {
    let session = EvaluationSession::default();
    session.submit(Chunk::ok("a")).await;
    let (_, failed) = session.submit(Chunk::failing("b")).await;
    let (_, skipped) = session.submit(Chunk::ok("c")).await;

    let evaluator = RecordingEvaluator::default();
    let report = session.run_until_idle(&evaluator).await.unwrap();

    assert!(!report.is_success());
    assert_eq!(report.failure.unwrap().message, "b failed");
    assert_eq!(*evaluator.ran.lock().unwrap(), vec!["a", "b"]);
    assert_eq!(failed.await.unwrap(), Outcome::Rejected);
    assert!(skipped.await.is_err());
}

#[tokio::test]
async fn test_session_usable_after_rejection() {
    let session = EvaluationSession::default();
    session.submit(Chunk::failing("bad")).await;
    let evaluator = RecordingEvaluator::default();
    session.run_until_idle(&evaluator).await.unwrap();

    let (id, rx) = session.submit(Chunk::ok("retry")).await;
    let report = session.run_until_idle(&evaluator).await.unwrap();

    assert_eq!(id, RequestId::new(2));
    assert_eq!(report.resolved, vec![id]);
    assert_eq!(rx.await.unwrap(), Outcome::Resolved);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_rejects_batch() {
    let config = SessionConfig::default().with_evaluation_timeout(Duration::from_millis(100));
    let session = EvaluationSession::new(config);
    let (id, slow) = session
        .submit(Chunk::slow("slow", Duration::from_secs(5)))
        .await;
    let (_, after) = session.submit(Chunk::ok("after")).await;

    let evaluator = RecordingEvaluator::default();
    let err = session.run_until_idle(&evaluator).await.unwrap_err();

    assert_eq!(err, Error::EvaluationTimeout { id });
    assert_eq!(slow.await.unwrap(), Outcome::Rejected);
    assert!(after.await.is_err());
    assert_eq!(session.queue_size().await, 0);
}

#[tokio::test(start_paused = true)]
async fn test_submissions_during_run_are_picked_up() {
    let session = Arc::new(EvaluationSession::default());
    session
        .submit(Chunk::slow("first", Duration::from_millis(20)))
        .await;

    let runner = {
        let session = session.clone();
        tokio::spawn(async move {
            let evaluator = RecordingEvaluator::default();
            let report = session.run_until_idle(&evaluator).await.unwrap();
            let ran = evaluator.ran.lock().unwrap().clone();
            (report, ran)
        })
    };

    tokio::time::sleep(Duration::from_millis(5)).await;
    session.submit(Chunk::ok("second")).await;

    let (report, ran) = runner.await.unwrap();
    assert_eq!(report.resolved.len(), 2);
    assert_eq!(ran, vec!["first", "second"]);
}

#[tokio::test]
async fn test_events_describe_lifecycle() {
    let session = EvaluationSession::default();
    let mut events = session.subscribe().await;

    session.submit(Chunk::ok("a")).await;
    session.submit(Chunk::failing("b")).await;
    session.submit(Chunk::ok("c")).await;
    session
        .run_until_idle(&RecordingEvaluator::default())
        .await
        .unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }

    let id = RequestId::new;
    assert_eq!(
        seen,
        vec![
            QueueEvent::Queued { id: id(1) },
            QueueEvent::Dispatched { id: id(1) },
            QueueEvent::Queued { id: id(2) },
            QueueEvent::Queued { id: id(3) },
            QueueEvent::Resolved { id: id(1) },
            QueueEvent::Dispatched { id: id(2) },
            QueueEvent::Rejected {
                id: id(2),
                abandoned: vec![id(3)]
            },
        ]
    );
}

/// Evaluator that tracks how many evaluations overlap.
#[derive(Default)]
struct InFlightEvaluator {
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
}

impl Evaluator<Chunk> for InFlightEvaluator {
    async fn evaluate(&self, _id: RequestId, chunk: &Chunk) -> Result<(), EvaluationFailure> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(chunk.delay).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[tokio::test(start_paused = true)]
async fn test_concurrent_runs_never_overlap() {
    let session = Arc::new(EvaluationSession::default());
    session
        .submit(Chunk::slow("first", Duration::from_millis(50)))
        .await;
    session
        .submit(Chunk::slow("second", Duration::from_millis(50)))
        .await;

    let evaluator = Arc::new(InFlightEvaluator::default());
    let runners: Vec<_> = (0..2)
        .map(|_| {
            let session = session.clone();
            let evaluator = evaluator.clone();
            tokio::spawn(async move { session.run_until_idle(evaluator.as_ref()).await })
        })
        .collect();

    let mut reports = Vec::new();
    let mut refused = 0;
    for runner in runners {
        match runner.await.unwrap() {
            Ok(report) => reports.push(report),
            Err(Error::RunInProgress) => refused += 1,
            Err(e) => panic!("unexpected error: {e}"),
        }
    }

    assert_eq!(refused, 1);
    assert_eq!(reports.len(), 1);
    assert_eq!(reports[0].resolved, vec![RequestId::new(1), RequestId::new(2)]);
    assert_eq!(evaluator.calls.load(Ordering::SeqCst), 2);
    assert_eq!(evaluator.max_in_flight.load(Ordering::SeqCst), 1);
    assert!(!session.is_running());
}

#[tokio::test(start_paused = true)]
async fn test_second_run_refused_while_first_evaluates() {
    let session = Arc::new(EvaluationSession::default());
    let (_, slow) = session
        .submit(Chunk::slow("slow", Duration::from_millis(100)))
        .await;

    let runner = {
        let session = session.clone();
        tokio::spawn(async move {
            session
                .run_until_idle(&RecordingEvaluator::default())
                .await
        })
    };

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert!(session.is_running());
    let err = session
        .run_until_idle(&RecordingEvaluator::default())
        .await
        .unwrap_err();
    assert_eq!(err, Error::RunInProgress);
    // The refused call left the queue alone.
    assert_eq!(session.queue_size().await, 1);

    let report = runner.await.unwrap().unwrap();
    assert_eq!(report.resolved, vec![RequestId::new(1)]);
    assert_eq!(slow.await.unwrap(), Outcome::Resolved);

    // The guard is released, so the session can be driven again.
    session.submit(Chunk::ok("later")).await;
    let report = session
        .run_until_idle(&RecordingEvaluator::default())
        .await
        .unwrap();
    assert_eq!(report.resolved, vec![RequestId::new(2)]);
}
