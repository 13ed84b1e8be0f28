use super::artifact::{Artifact, ExtractionTask};
use super::engine::ExtractionEngine;
use super::task_scheduler::{
    ExtractionScheduler, ProgressEvent, ScheduleOutcome, TaskFailure, panic_message,
};
use crate::config::ExtractionStrategy;
use crate::error::ExtractionError;
use log::{debug, info, warn};
use rayon::ThreadPoolBuilder;
use rayon::prelude::*;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

/// 批次擷取設定
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchConfig {
    pub strategy: ExtractionStrategy,
    pub chunk_size: usize,
    pub concurrency: usize,
}

/// 依策略擷取所有片段，結果順序與任務順序相同
pub fn extract_all(
    engine: &dyn ExtractionEngine,
    tasks: Vec<ExtractionTask>,
    config: BatchConfig,
    shutdown_signal: &Arc<AtomicBool>,
    on_progress: &mut dyn FnMut(ProgressEvent),
) -> ScheduleOutcome<Artifact> {
    match config.strategy {
        ExtractionStrategy::PerTask => {
            extract_per_task(engine, tasks, config.concurrency, shutdown_signal, on_progress)
        }
        ExtractionStrategy::Chunked => extract_chunked(
            engine,
            tasks,
            config.chunk_size.max(1),
            config.concurrency,
            shutdown_signal,
            on_progress,
        ),
    }
}

/// 每個片段一個 ffmpeg 程序，由排程器控制並行數
fn extract_per_task(
    engine: &dyn ExtractionEngine,
    tasks: Vec<ExtractionTask>,
    concurrency: usize,
    shutdown_signal: &Arc<AtomicBool>,
    on_progress: &mut dyn FnMut(ProgressEvent),
) -> ScheduleOutcome<Artifact> {
    let scheduler = ExtractionScheduler::new(concurrency, Arc::clone(shutdown_signal));
    scheduler.run(tasks, |task| engine.extract(&task), on_progress)
}

/// 分組擷取：組與組平行，組內依序
///
/// 以 rayon 進行平行處理，執行緒數等於並行上限。
fn extract_chunked(
    engine: &dyn ExtractionEngine,
    tasks: Vec<ExtractionTask>,
    chunk_size: usize,
    concurrency: usize,
    shutdown_signal: &Arc<AtomicBool>,
    on_progress: &mut dyn FnMut(ProgressEvent),
) -> ScheduleOutcome<Artifact> {
    let total = tasks.len();
    if total == 0 {
        return ScheduleOutcome::empty();
    }

    let threads = concurrency.max(1);
    let pool = match ThreadPoolBuilder::new().num_threads(threads).build() {
        Ok(pool) => pool,
        Err(e) => {
            warn!("無法建立執行緒池，改用逐一排程: {e}");
            return extract_per_task(engine, tasks, concurrency, shutdown_signal, on_progress);
        }
    };

    let chunks: Vec<Vec<(usize, ExtractionTask)>> = {
        let mut indexed = tasks.into_iter().enumerate().peekable();
        let mut chunks = Vec::new();
        while indexed.peek().is_some() {
            chunks.push(indexed.by_ref().take(chunk_size).collect());
        }
        chunks
    };
    let chunk_count = chunks.len();
    info!("分組擷取，共 {total} 個片段，{chunk_count} 組，執行緒 {threads}");

    let (event_tx, event_rx) = mpsc::channel::<(usize, bool)>();

    let joined = thread::scope(|scope| {
        let handle = scope.spawn(move || {
            let event_tx = event_tx;
            pool.install(|| {
                chunks
                    .par_iter()
                    .map(|chunk| {
                        chunk
                            .iter()
                            .map(|(index, task)| {
                                if shutdown_signal.load(Ordering::SeqCst) {
                                    return (*index, Err(ExtractionError::Cancelled));
                                }
                                let result = extract_guarded(engine, task);
                                let _ = event_tx.send((*index, result.is_ok()));
                                (*index, result)
                            })
                            .collect::<Vec<_>>()
                    })
                    .collect::<Vec<_>>()
            })
        });

        let mut processed = 0;
        for (index, succeeded) in event_rx {
            processed += 1;
            on_progress(ProgressEvent {
                index,
                succeeded,
                processed,
                total,
                fraction: processed as f64 / total as f64,
            });
        }

        handle.join()
    });

    let mut results: Vec<Option<Artifact>> = (0..total).map(|_| None).collect();
    let mut failures = Vec::new();
    let mut cancelled = 0;

    match joined {
        Ok(chunk_results) => {
            for (index, result) in chunk_results.into_iter().flatten() {
                match result {
                    Ok(artifact) => results[index] = Some(artifact),
                    Err(error) => {
                        if error.is_cancelled() {
                            cancelled += 1;
                        } else {
                            warn!("擷取失敗 [{index}]: {error}");
                        }
                        failures.push(TaskFailure { index, error });
                    }
                }
            }
        }
        Err(payload) => {
            let message = panic_message(payload.as_ref());
            warn!("分組擷取異常結束: {message}");
            failures = (0..total)
                .map(|index| TaskFailure {
                    index,
                    error: ExtractionError::Panicked(message.clone()),
                })
                .collect();
        }
    }

    failures.sort_by_key(|f| f.index);
    debug!(
        "分組擷取結束 - 成功: {}, 失敗: {}",
        results.iter().filter(|r| r.is_some()).count(),
        failures.len()
    );

    ScheduleOutcome {
        results,
        failures,
        cancelled,
        peak_active: threads.min(chunk_count),
    }
}

fn extract_guarded(
    engine: &dyn ExtractionEngine,
    task: &ExtractionTask,
) -> Result<Artifact, ExtractionError> {
    panic::catch_unwind(AssertUnwindSafe(|| engine.extract(task)))
        .unwrap_or_else(|payload| Err(ExtractionError::Panicked(panic_message(payload.as_ref()))))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::component::scene_extractor::Segment;
    use crate::config::ArtifactKind;
    use std::path::PathBuf;
    use std::sync::Mutex;
    use std::time::Duration;

    /// 不呼叫 ffmpeg 的擷取器，指定的索引會失敗
    struct StubEngine {
        failing: Vec<usize>,
        seen: Mutex<Vec<usize>>,
    }

    impl StubEngine {
        fn new(failing: Vec<usize>) -> Self {
            Self {
                failing,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    impl ExtractionEngine for StubEngine {
        fn kind(&self) -> ArtifactKind {
            ArtifactKind::Frame
        }

        fn extract(&self, task: &ExtractionTask) -> Result<Artifact, ExtractionError> {
            self.seen.lock().unwrap().push(task.original_index);
            thread::sleep(Duration::from_millis(((task.original_index * 7) % 5) as u64));
            if self.failing.contains(&task.original_index) {
                return Err(ExtractionError::OutputMissing(task.output_path.clone()));
            }
            Ok(Artifact {
                path: task.output_path.clone(),
                filename: format!("{}.jpg", task.original_index),
                segment_index: task.segment.index,
                time_seconds: task.segment.start_time,
                frame: None,
                file_size: 1,
                format: "jpg".to_string(),
                quality: 8,
            })
        }
    }

    fn tasks(count: usize) -> Vec<ExtractionTask> {
        (0..count)
            .map(|i| ExtractionTask {
                segment: Segment {
                    index: i,
                    start_time: i as f64 * 10.0,
                    end_time: i as f64 * 10.0 + 9.0,
                    duration: 9.0,
                    in_frame: i as u64 * 300,
                    out_frame: i as u64 * 300 + 269,
                    frame_count: 270,
                },
                source_path: PathBuf::from("/videos/a.mp4"),
                output_path: PathBuf::from(format!("/out/a_frame_{i:03}.jpg")),
                frame_time: None,
                original_index: i,
            })
            .collect()
    }

    fn run(
        strategy: ExtractionStrategy,
        engine: &StubEngine,
        count: usize,
    ) -> (ScheduleOutcome<Artifact>, usize) {
        let shutdown = Arc::new(AtomicBool::new(false));
        let mut events = 0;
        let outcome = extract_all(
            engine,
            tasks(count),
            BatchConfig {
                strategy,
                chunk_size: 4,
                concurrency: 3,
            },
            &shutdown,
            &mut |_| events += 1,
        );
        (outcome, events)
    }

    #[test]
    fn test_strategies_produce_same_ordering() {
        for strategy in [ExtractionStrategy::PerTask, ExtractionStrategy::Chunked] {
            let engine = StubEngine::new(vec![3, 9]);
            let (outcome, events) = run(strategy, &engine, 18);

            assert_eq!(outcome.results.len(), 18);
            assert_eq!(events, 18);
            assert_eq!(outcome.success_count(), 16);
            assert!(outcome.results[3].is_none());
            assert!(outcome.results[9].is_none());
            for (i, result) in outcome.results.iter().enumerate() {
                if let Some(artifact) = result {
                    assert_eq!(artifact.segment_index, i);
                }
            }
            let failed: Vec<usize> = outcome.failures.iter().map(|f| f.index).collect();
            assert_eq!(failed, vec![3, 9]);
            assert!(outcome.peak_active <= 3);
        }
    }

    #[test]
    fn test_chunked_runs_each_chunk_in_order() {
        let engine = StubEngine::new(vec![]);
        let (outcome, _) = run(ExtractionStrategy::Chunked, &engine, 10);
        assert_eq!(outcome.success_count(), 10);

        let seen = engine.seen.lock().unwrap();
        // 同一組內依序擷取
        for chunk_start in [0, 4, 8] {
            let positions: Vec<usize> = seen
                .iter()
                .enumerate()
                .filter(|(_, i)| **i / 4 == chunk_start / 4)
                .map(|(pos, _)| pos)
                .collect();
            assert!(positions.windows(2).all(|w| w[0] < w[1]));
            let indices: Vec<usize> = positions.iter().map(|&p| seen[p]).collect();
            let mut sorted = indices.clone();
            sorted.sort_unstable();
            assert_eq!(indices, sorted);
        }
    }

    #[test]
    fn test_chunked_cancellation() {
        let engine = StubEngine::new(vec![]);
        let shutdown = Arc::new(AtomicBool::new(true));
        let outcome = extract_all(
            &engine,
            tasks(6),
            BatchConfig {
                strategy: ExtractionStrategy::Chunked,
                chunk_size: 2,
                concurrency: 2,
            },
            &shutdown,
            &mut |_| {},
        );
        assert_eq!(outcome.cancelled, 6);
        assert_eq!(outcome.success_count(), 0);
        assert!(engine.seen.lock().unwrap().is_empty());
    }
}
