use super::artifact::{Artifact, ExtractionTask};
use crate::config::ArtifactKind;
use crate::error::ExtractionError;
use crate::tools::{Invocation, ProcessRunner};
use log::{debug, info, warn};
use std::fs;
use std::path::Path;

/// 將一個片段轉成一個產出物
///
/// 失敗只回傳 `ExtractionError`，不會中止整批任務。
pub trait ExtractionEngine: Send + Sync {
    fn kind(&self) -> ArtifactKind;

    fn extract(&self, task: &ExtractionTask) -> Result<Artifact, ExtractionError>;
}

/// 執行 ffmpeg 並檢查輸出檔案
///
/// 結束碼為 0 但沒有產生檔案（或檔案為空）同樣視為失敗；失敗時刪除殘留的輸出。
pub(crate) fn run_and_verify(
    runner: &dyn ProcessRunner,
    invocation: &Invocation,
    output_path: &Path,
) -> Result<u64, ExtractionError> {
    debug!("執行擷取: {}", invocation.command_line());

    let output = runner
        .run(invocation, &mut |_| {})
        .map_err(ExtractionError::Spawn)?;

    if !output.success {
        remove_partial_output(output_path);
        return Err(ExtractionError::ExitStatus {
            code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }

    // 確認輸出檔案存在
    match fs::metadata(output_path) {
        Ok(metadata) if metadata.is_file() && metadata.len() > 0 => Ok(metadata.len()),
        _ => {
            remove_partial_output(output_path);
            Err(ExtractionError::OutputMissing(output_path.to_path_buf()))
        }
    }
}

fn remove_partial_output(path: &Path) {
    if !path.exists() {
        return;
    }
    if let Err(e) = fs::remove_file(path) {
        warn!("無法刪除失敗的輸出檔案 {}: {}", path.display(), e);
    } else {
        info!("已刪除失敗的輸出檔案: {}", path.display());
    }
}

/// 兩段式 seek 的時間點：(-i 前的快速跳轉, -i 後的精準定位)
pub(crate) fn split_seek(timestamp: f64, margin: f64) -> (f64, f64) {
    let t0 = (timestamp - margin).max(0.0);
    (t0, (timestamp - t0).max(0.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_seek() {
        let (t0, delta) = split_seek(10.0, 2.0);
        assert!((t0 - 8.0).abs() < 1e-9);
        assert!((delta - 2.0).abs() < 1e-9);

        let (t0, delta) = split_seek(0.5, 2.0);
        assert!(t0.abs() < 1e-9);
        assert!((delta - 0.5).abs() < 1e-9);
    }
}
