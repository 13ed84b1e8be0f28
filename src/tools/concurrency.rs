use log::debug;
use std::num::NonZeroUsize;
use std::thread;
use sysinfo::{CpuRefreshKind, RefreshKind, System};

/// 取得邏輯核心數，sysinfo 無法取得時改用標準函式庫
#[must_use]
pub fn logical_core_count() -> usize {
    let system =
        System::new_with_specifics(RefreshKind::nothing().with_cpu(CpuRefreshKind::nothing()));
    let count = system.cpus().len();
    if count > 0 {
        return count;
    }
    thread::available_parallelism().map_or(1, NonZeroUsize::get)
}

/// 依核心數分級決定並行數，在吞吐量與資源爭用之間取得平衡
#[must_use]
pub fn tiered_concurrency(cores: usize) -> usize {
    if cores >= 12 {
        ((cores * 9) / 10).clamp(6, 16)
    } else if cores >= 8 {
        ((cores * 8) / 10).clamp(4, 10)
    } else {
        ((cores * 6) / 10).clamp(2, 6)
    }
}

/// 最終並行上限：min(分級結果或使用者覆寫值, 任務數)
#[must_use]
pub fn concurrency_limit(cores: usize, task_count: usize, override_limit: Option<usize>) -> usize {
    let base = override_limit.unwrap_or_else(|| tiered_concurrency(cores));
    let limit = base.min(task_count);
    debug!("並行數: 核心 {cores}, 任務 {task_count}, 上限 {limit}");
    limit
}
