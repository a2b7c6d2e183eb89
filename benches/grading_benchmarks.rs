//! Performance benchmarks for grading, partitioning and a full in-memory run

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use gradeflow::grading::{evaluate, grade_serialized, ResultRow, StudentRecord};
use gradeflow::ingest::partition_batch;
use gradeflow::orchestration::{
    FailurePolicy, GradeStudentTask, GradeWorkflow, InMemoryHistoryStore, OrchestrationInput,
    RetryConfig, Runtime, GRADE_TASK, GRADE_WORKFLOW, WRITE_OUTPUT_TASK,
};
use gradeflow::output::OutputWriter;
use gradeflow::storage::MemoryBlobStore;
use std::hint::black_box;
use std::sync::Arc;
use tokio::runtime::Runtime as TokioRuntime;

const HEADER: &str = "StudentID\tModule\tResult\tCredits\tPassForProgress";

/// A batch with `students` students and `modules` rows each, interleaved
fn create_batch(students: usize, modules: usize) -> String {
    let mut out = format!("{HEADER}\n");
    for module in 0..modules {
        for student in 0..students {
            let result = 35 + (student * 7 + module * 11) % 60;
            let credits = 10 + (module % 3) * 5;
            let pass = if module == 0 { "True" } else { "False" };
            out.push_str(&format!(
                "{student}\tM{module}\t{result}\t{credits}\t{pass}\n"
            ));
        }
    }
    out
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");

    for rows in [4, 16, 64] {
        let record = StudentRecord::from_rows(
            (0..rows)
                .map(|i| ResultRow {
                    student_id: "42".to_string(),
                    result: 40.0 + (i % 50) as f64,
                    credits: 10.0 + (i % 4) as f64 * 5.0,
                    pass_for_progress: false,
                })
                .collect(),
        )
        .unwrap();
        group.bench_with_input(BenchmarkId::new("parsed", rows), &record, |b, record| {
            b.iter(|| evaluate(black_box(record)))
        });

        let serialized = partition_batch(&create_batch(1, rows)).unwrap().remove(0);
        group.bench_with_input(
            BenchmarkId::new("serialized", rows),
            &serialized,
            |b, serialized| b.iter(|| grade_serialized(black_box(serialized))),
        );
    }

    group.finish();
}

fn bench_partition(c: &mut Criterion) {
    let mut group = c.benchmark_group("partition_batch");

    for students in [10, 100, 1000] {
        let batch = create_batch(students, 6);
        group.bench_with_input(BenchmarkId::from_parameter(students), &batch, |b, batch| {
            b.iter(|| partition_batch(black_box(batch)))
        });
    }

    group.finish();
}

fn bench_full_run(c: &mut Criterion) {
    let rt = TokioRuntime::new().unwrap();
    let mut group = c.benchmark_group("grade_workflow");
    group.sample_size(20);

    for students in [10, 100] {
        let partitions = partition_batch(&create_batch(students, 6)).unwrap();
        group.bench_with_input(
            BenchmarkId::from_parameter(students),
            &partitions,
            |b, partitions| {
                b.to_async(&rt).iter(|| async {
                    let blobs = Arc::new(MemoryBlobStore::new());
                    let runtime = Runtime::builder(Arc::new(InMemoryHistoryStore::new()))
                        .max_parallel_tasks(16)
                        .task(GRADE_TASK, Arc::new(GradeStudentTask), RetryConfig::none())
                        .task(
                            WRITE_OUTPUT_TASK,
                            Arc::new(OutputWriter::new(blobs, "results")),
                            RetryConfig::none(),
                        )
                        .workflow(
                            GRADE_WORKFLOW,
                            Arc::new(GradeWorkflow::new(FailurePolicy::default())),
                        )
                        .build()
                        .unwrap();

                    let input = serde_json::to_value(OrchestrationInput {
                        students: partitions.clone(),
                        start_time: chrono::Utc::now(),
                        output_name: "results_bench.tsv".to_string(),
                    })
                    .unwrap();
                    let id = runtime.start(GRADE_WORKFLOW, input).await.unwrap();
                    black_box(runtime.wait_for_completion(&id).await.unwrap())
                })
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_evaluate, bench_partition, bench_full_run);
criterion_main!(benches);
