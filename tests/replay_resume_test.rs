//! Replay and resume of interrupted grading runs

mod common;

use chrono::{Duration as ChronoDuration, TimeZone, Utc};
use common::*;
use gradeflow::orchestration::{
    FileHistoryStore, GradeStudentTask, HistoryStore, InMemoryHistoryStore, OrchestrationInput,
    RunPhase, RunState, RunStatus, TaskHandler, TaskOutcome, GRADE_TASK, GRADE_WORKFLOW,
};
use gradeflow::storage::{BlobStore, MemoryBlobStore};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn students() -> Vec<String> {
    vec![
        batch(&[("1", 80.0, 20.0, false), ("1", 60.0, 10.0, false)]),
        batch(&[("2", 45.0, 10.0, false)]),
    ]
}

/// A run that settled every grading task and read the clock before the
/// process died while writing the report
async fn interrupted_state(instance_id: &str) -> RunState {
    let start_time = Utc.with_ymd_and_hms(2024, 6, 1, 9, 0, 0).unwrap();
    let input = OrchestrationInput {
        students: students(),
        start_time,
        output_name: "results_batch.tsv".to_string(),
    };
    let mut state = RunState::new(
        instance_id.to_string(),
        GRADE_WORKFLOW.to_string(),
        serde_json::to_value(&input).unwrap(),
    );
    state.phase = RunPhase::WritingOutput;
    for (i, student) in input.students.iter().enumerate() {
        let result = GradeStudentTask
            .execute(Value::String(student.clone()))
            .await;
        state.history.insert(
            i as u64,
            TaskOutcome {
                task_id: i as u64,
                task_name: GRADE_TASK.to_string(),
                attempts: 1,
                result,
            },
        );
    }
    state.clock.push(start_time + ChronoDuration::seconds(5));
    state
}

#[tokio::test]
async fn test_resume_reuses_recorded_outcomes_and_clock() {
    let dir = TempDir::new().unwrap();
    let history: Arc<dyn HistoryStore> =
        Arc::new(FileHistoryStore::new(dir.path().join("state")).await.unwrap());
    history.save(&interrupted_state("run-1").await).await.unwrap();

    let blobs = Arc::new(MemoryBlobStore::new());
    let grader = Arc::new(CountingGrader::default());
    let runtime = grading_runtime(
        history.clone(),
        blobs.clone(),
        grader.clone(),
        quick_retry(3),
        Duration::from_secs(5),
    );

    let resumed = runtime.resume("run-1").await.unwrap();
    assert!(!resumed.is_terminal());
    let status = runtime.wait_for_completion("run-1").await.unwrap();

    match status {
        RunStatus::Completed { message, .. } => {
            assert!(message.starts_with("Graded 2 of 2 student(s), 0 failed"), "{message}");
            // Duration comes from the recorded clock, not the wall clock
            assert!(message.ends_with("in 5.000s"), "{message}");
        }
        other => panic!("unexpected status {other:?}"),
    }
    assert_eq!(grader.calls(), 0);

    let report = String::from_utf8(blobs.get("results", "results_batch.tsv").await.unwrap()).unwrap();
    assert_eq!(
        report,
        "StudentID\tAverage\tDegree Class\n1\t73\tFirst\n2\t45\tPass\n"
    );

    // Only the output write was added to the history
    let state = history.load("run-1").await.unwrap().unwrap();
    assert_eq!(state.phase, RunPhase::Completed);
    assert_eq!(state.history.len(), 3);
    assert_eq!(state.clock.len(), 1);
}

#[tokio::test]
async fn test_partial_history_runs_only_missing_tasks() {
    let dir = TempDir::new().unwrap();
    let history: Arc<dyn HistoryStore> =
        Arc::new(FileHistoryStore::new(dir.path().join("state")).await.unwrap());

    let mut state = interrupted_state("run-2").await;
    state.phase = RunPhase::Waiting;
    state.history.remove(&1);
    state.clock.clear();
    history.save(&state).await.unwrap();

    let blobs = Arc::new(MemoryBlobStore::new());
    let grader = Arc::new(CountingGrader::default());
    let runtime = grading_runtime(
        history.clone(),
        blobs.clone(),
        grader.clone(),
        quick_retry(3),
        Duration::from_secs(5),
    );

    runtime.resume("run-2").await.unwrap();
    let status = runtime.wait_for_completion("run-2").await.unwrap();

    assert!(matches!(status, RunStatus::Completed { .. }), "{status:?}");
    assert_eq!(grader.calls(), 1);
    assert!(blobs.get("results", "results_batch.tsv").await.is_ok());
}

#[tokio::test]
async fn test_history_survives_a_new_runtime() {
    let dir = TempDir::new().unwrap();
    let blobs = Arc::new(MemoryBlobStore::new());
    blobs
        .put(
            "students",
            "batch.tsv",
            batch(&[("7", 62.0, 10.0, false)]).as_bytes(),
        )
        .await
        .unwrap();

    let config = test_config(&dir);
    let first = gradeflow::app::App::with_store(config.clone(), blobs.clone())
        .await
        .unwrap();
    let id = match first.trigger.handle_artifact("batch.tsv").await.unwrap() {
        gradeflow::ingest::TriggerOutcome::Started { instance_id, .. } => instance_id,
        other => panic!("unexpected outcome {other:?}"),
    };
    let finished = first.runtime.wait_for_completion(&id).await.unwrap();
    first.shutdown().await;
    drop(first);

    // A second process sees the same finished run and leaves it alone
    let second = gradeflow::app::App::with_store(config, blobs.clone())
        .await
        .unwrap();
    assert_eq!(second.runtime.status(&id).await.unwrap(), finished);
    assert_eq!(second.runtime.resume(&id).await.unwrap(), finished);
    assert_eq!(second.runtime.list().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_concurrent_resumes_start_one_driver() {
    let history: Arc<dyn HistoryStore> = Arc::new(InMemoryHistoryStore::new());
    let mut state = interrupted_state("run-3").await;
    state.phase = RunPhase::Waiting;
    state.history.clear();
    state.clock.clear();
    history.save(&state).await.unwrap();

    let blobs = Arc::new(MemoryBlobStore::new());
    let grader = Arc::new(CountingGrader::default());
    let runtime = grading_runtime(
        history.clone(),
        blobs.clone(),
        grader.clone(),
        quick_retry(1),
        Duration::from_secs(5),
    );

    let (first, second) = tokio::join!(runtime.resume("run-3"), runtime.resume("run-3"));
    assert!(!first.unwrap().is_terminal());
    second.unwrap();

    let status = runtime.wait_for_completion("run-3").await.unwrap();
    assert!(matches!(status, RunStatus::Completed { .. }), "{status:?}");
    // One grading call per student, not one per resume
    assert_eq!(grader.calls(), 2);
}
