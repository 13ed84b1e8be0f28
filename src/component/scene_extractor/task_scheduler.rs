//! 有界並行排程器
//!
//! 協調執行緒持有等待佇列、執行中計數與結果陣列；每個任務在獨立的 scoped
//! 執行緒中執行，完成後經由 channel 回報。所有狀態只在協調執行緒上修改。

use crate::error::ExtractionError;
use log::{debug, error, info, warn};
use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc;
use std::thread;

/// 單一任務完成時的進度事件（依完成順序送出）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressEvent {
    pub index: usize,
    pub succeeded: bool,
    pub processed: usize,
    pub total: usize,
    pub fraction: f64,
}

/// 失敗任務的紀錄
#[derive(Debug)]
pub struct TaskFailure {
    pub index: usize,
    pub error: ExtractionError,
}

/// 排程結果，`results` 與輸入任務一一對應
#[derive(Debug)]
pub struct ScheduleOutcome<R> {
    pub results: Vec<Option<R>>,
    pub failures: Vec<TaskFailure>,
    pub cancelled: usize,
    pub peak_active: usize,
}

impl<R> ScheduleOutcome<R> {
    pub(crate) fn empty() -> Self {
        Self {
            results: Vec::new(),
            failures: Vec::new(),
            cancelled: 0,
            peak_active: 0,
        }
    }

    #[must_use]
    pub fn success_count(&self) -> usize {
        self.results.iter().filter(|r| r.is_some()).count()
    }
}

pub struct ExtractionScheduler {
    concurrency: usize,
    shutdown_signal: Arc<AtomicBool>,
}

impl ExtractionScheduler {
    #[must_use]
    pub fn new(concurrency: usize, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            concurrency: concurrency.max(1),
            shutdown_signal,
        }
    }

    #[must_use]
    pub const fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// 執行所有任務，回傳依提交順序排列的結果
    ///
    /// 任務失敗不會中止排程，只記錄在 `failures`；取消只在派發前檢查，
    /// 尚未派發的任務記為 `ExtractionError::Cancelled`。
    pub fn run<T, R, F, P>(
        &self,
        tasks: Vec<T>,
        worker: F,
        mut on_progress: P,
    ) -> ScheduleOutcome<R>
    where
        T: Send,
        R: Send,
        F: Fn(T) -> Result<R, ExtractionError> + Sync,
        P: FnMut(ProgressEvent),
    {
        let total = tasks.len();
        if total == 0 {
            return ScheduleOutcome::empty();
        }

        let limit = self.concurrency.min(total);
        info!("開始擷取任務，共 {total} 個，並行數 {limit}");

        let mut results: Vec<Option<R>> = (0..total).map(|_| None).collect();
        let mut failures = Vec::new();
        let mut cancelled = 0;
        let mut peak_active = 0;
        let mut queue: VecDeque<(usize, T)> = tasks.into_iter().enumerate().collect();
        let (done_tx, done_rx) = mpsc::channel::<(usize, Result<R, ExtractionError>)>();
        let worker = &worker;

        thread::scope(|scope| {
            let mut active = 0usize;
            let mut processed = 0usize;

            loop {
                // 補滿執行中的任務
                while active < limit {
                    if self.shutdown_signal.load(Ordering::SeqCst) {
                        if !queue.is_empty() {
                            warn!("收到中斷信號，取消 {} 個尚未開始的任務", queue.len());
                        }
                        for (index, _) in queue.drain(..) {
                            cancelled += 1;
                            failures.push(TaskFailure {
                                index,
                                error: ExtractionError::Cancelled,
                            });
                        }
                        break;
                    }

                    let Some((index, task)) = queue.pop_front() else {
                        break;
                    };

                    let done_tx = done_tx.clone();
                    scope.spawn(move || {
                        let outcome = panic::catch_unwind(AssertUnwindSafe(|| worker(task)))
                            .unwrap_or_else(|payload| {
                                Err(ExtractionError::Panicked(panic_message(payload.as_ref())))
                            });
                        let _ = done_tx.send((index, outcome));
                    });

                    active += 1;
                    peak_active = peak_active.max(active);
                    debug!("派發任務 [{index}]，執行中 {active}");
                }

                // 每次完成後都重新檢查：執行中為 0 且佇列為空才算結束
                if active == 0 && queue.is_empty() {
                    break;
                }

                let Ok((index, outcome)) = done_rx.recv() else {
                    break;
                };
                active -= 1;
                processed += 1;

                let succeeded = match outcome {
                    Ok(result) => {
                        results[index] = Some(result);
                        true
                    }
                    Err(e) => {
                        error!("擷取失敗 [{index}]: {e}");
                        failures.push(TaskFailure { index, error: e });
                        false
                    }
                };

                on_progress(ProgressEvent {
                    index,
                    succeeded,
                    processed,
                    total,
                    fraction: processed as f64 / total as f64,
                });
            }
        });

        failures.sort_by_key(|f| f.index);

        let outcome = ScheduleOutcome {
            results,
            failures,
            cancelled,
            peak_active,
        };
        info!(
            "擷取任務結束 - 成功: {}, 失敗: {}, 取消: {}",
            outcome.success_count(),
            outcome.failures.len() - outcome.cancelled,
            outcome.cancelled
        );
        outcome
    }
}

pub(crate) fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| (*s).to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "未知錯誤".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    fn scheduler(concurrency: usize) -> ExtractionScheduler {
        ExtractionScheduler::new(concurrency, Arc::new(AtomicBool::new(false)))
    }

    #[test]
    fn test_empty_task_list() {
        let outcome = scheduler(4).run(Vec::<usize>::new(), Ok, |_| {});
        assert!(outcome.results.is_empty());
        assert!(outcome.failures.is_empty());
        assert_eq!(outcome.peak_active, 0);
    }

    #[test]
    fn test_five_tasks_one_failure() {
        let completions = Mutex::new(Vec::new());
        let outcome = scheduler(2).run(
            (0..5).collect::<Vec<usize>>(),
            |i| {
                thread::sleep(Duration::from_millis(5 * (5 - i as u64)));
                if i == 2 {
                    Err(ExtractionError::OutputMissing(format!("/out/{i}.jpg").into()))
                } else {
                    Ok(i * 10)
                }
            },
            |event| completions.lock().unwrap().push(event),
        );

        assert_eq!(outcome.results.len(), 5);
        assert_eq!(outcome.success_count(), 4);
        assert_eq!(outcome.results[2], None);
        assert_eq!(outcome.results[0], Some(0));
        assert_eq!(outcome.results[4], Some(40));
        assert_eq!(outcome.failures.len(), 1);
        assert_eq!(outcome.failures[0].index, 2);
        assert!(matches!(
            outcome.failures[0].error,
            ExtractionError::OutputMissing(_)
        ));
        assert!(outcome.peak_active <= 2);

        let completions = completions.into_inner().unwrap();
        assert_eq!(completions.len(), 5);
        let processed: Vec<usize> = completions.iter().map(|e| e.processed).collect();
        assert_eq!(processed, vec![1, 2, 3, 4, 5]);
        assert!((completions[4].fraction - 1.0).abs() < f64::EPSILON);
        assert_eq!(completions.iter().filter(|e| !e.succeeded).count(), 1);
    }

    #[test]
    fn test_active_workers_never_exceed_limit() {
        for (concurrency, count) in [(1, 6), (3, 10), (4, 2), (8, 8)] {
            let active = AtomicUsize::new(0);
            let peak = AtomicUsize::new(0);
            let outcome = scheduler(concurrency).run(
                (0..count).collect::<Vec<usize>>(),
                |i| {
                    let now = active.fetch_add(1, Ordering::SeqCst) + 1;
                    peak.fetch_max(now, Ordering::SeqCst);
                    thread::sleep(Duration::from_millis(3));
                    active.fetch_sub(1, Ordering::SeqCst);
                    Ok(i)
                },
                |_| {},
            );
            let bound = concurrency.min(count);
            assert!(peak.load(Ordering::SeqCst) <= bound);
            assert!(outcome.peak_active <= bound);
            assert_eq!(outcome.results.len(), count);
            assert_eq!(outcome.success_count(), count);
        }
    }

    #[test]
    fn test_results_keep_submission_order() {
        let outcome = scheduler(4).run(
            (0..12).collect::<Vec<u64>>(),
            |i| {
                // 越前面的任務越慢，完成順序與提交順序相反
                thread::sleep(Duration::from_millis(2 * (12 - i)));
                Ok(format!("task-{i}"))
            },
            |_| {},
        );
        for (i, result) in outcome.results.iter().enumerate() {
            assert_eq!(result.as_deref(), Some(format!("task-{i}").as_str()));
        }
    }

    #[test]
    fn test_panicking_task_is_recorded() {
        let outcome = scheduler(2).run(
            vec![1, 2, 3],
            |i: i32| {
                if i == 2 {
                    panic!("boom");
                }
                Ok(i)
            },
            |_| {},
        );
        assert_eq!(outcome.success_count(), 2);
        assert_eq!(outcome.failures.len(), 1);
        assert!(matches!(
            &outcome.failures[0].error,
            ExtractionError::Panicked(msg) if msg == "boom"
        ));
    }

    #[test]
    fn test_cancellation_stops_dispatch() {
        let shutdown = Arc::new(AtomicBool::new(false));
        let scheduler = ExtractionScheduler::new(1, Arc::clone(&shutdown));
        let outcome = scheduler.run(
            (0..5).collect::<Vec<usize>>(),
            |i| {
                if i == 1 {
                    shutdown.store(true, Ordering::SeqCst);
                }
                Ok(i)
            },
            |_| {},
        );
        assert_eq!(outcome.results[0], Some(0));
        assert_eq!(outcome.results[1], Some(1));
        assert_eq!(outcome.cancelled, 3);
        assert_eq!(outcome.failures.len(), 3);
        assert!(outcome.failures.iter().all(|f| f.error.is_cancelled()));
        assert_eq!(outcome.failures[0].index, 2);
    }
}
