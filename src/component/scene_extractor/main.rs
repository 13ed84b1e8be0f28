use super::pipeline::ScenePipeline;
use super::progress::{ProgressSink, ProgressUpdate};
use super::report::ExtractionReport;
use crate::config::{ArtifactKind, Config};
use crate::tools::{
    ProcessRunner, SystemProcessRunner, VideoFileInfo, scan_video_files, validate_directory_exists,
};
use anyhow::{Context, Result};
use console::style;
use dialoguer::{Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// 整批處理的統計
#[derive(Debug, Default)]
pub struct ExtractionSummary {
    pub total_videos: usize,
    pub successful: usize,
    pub failed: usize,
    pub artifacts: usize,
    pub artifact_failures: usize,
}

/// 場景擷取元件
///
/// 對每部影片：探測 → 偵測場景 → 精修切點 → 平行擷取 → 寫出中繼資料。
pub struct SceneExtractor {
    config: Config,
    kind: ArtifactKind,
    shutdown_signal: Arc<AtomicBool>,
}

impl SceneExtractor {
    pub const fn new(config: Config, kind: ArtifactKind, shutdown_signal: Arc<AtomicBool>) -> Self {
        Self {
            config,
            kind,
            shutdown_signal,
        }
    }

    pub fn run(&self) -> Result<()> {
        println!(
            "{}",
            style(format!("=== 擷取{} ===", self.kind)).cyan().bold()
        );

        let input = self.prompt_input_path()?;
        let videos = collect_videos(Path::new(&input))?;

        if videos.is_empty() {
            println!("{}", style("找不到任何影片檔案").yellow());
            return Ok(());
        }

        println!(
            "{}",
            style(format!(
                "找到 {} 個影片檔案，依檔案大小排序（由小到大）",
                videos.len()
            ))
            .green()
        );
        for (index, video) in videos.iter().enumerate() {
            println!(
                "  {}. {} ({:.2} MB)",
                index + 1,
                video.path.file_name().unwrap_or_default().to_string_lossy(),
                video.size as f64 / 1024.0 / 1024.0
            );
        }

        if !self.confirm_start()? {
            println!("{}", style("已取消").yellow());
            return Ok(());
        }

        let summary = self.process_videos(&videos);
        self.print_summary(&summary);

        Ok(())
    }

    fn prompt_input_path(&self) -> Result<String> {
        let path: String = Input::new()
            .with_prompt("請輸入影片檔案或資料夾路徑")
            .interact_text()?;
        Ok(path.trim().to_string())
    }

    fn confirm_start(&self) -> Result<bool> {
        let confirm = Confirm::new()
            .with_prompt("確定要開始擷取嗎？")
            .default(true)
            .interact()?;
        Ok(confirm)
    }

    fn process_videos(&self, videos: &[VideoFileInfo]) -> ExtractionSummary {
        let mut settings = self.config.settings.clone();
        settings.extraction.kind = self.kind;

        let runner: Arc<dyn ProcessRunner> = Arc::new(SystemProcessRunner::new(
            Arc::clone(&self.shutdown_signal),
            settings.extraction.kill_on_cancel,
        ));

        let mut summary = ExtractionSummary {
            total_videos: videos.len(),
            ..ExtractionSummary::default()
        };

        for (index, video) in videos.iter().enumerate() {
            if self.shutdown_signal.load(Ordering::SeqCst) {
                warn!("收到中斷訊號，停止處理");
                break;
            }

            let video_name = video.path.file_name().unwrap_or_default().to_string_lossy();
            println!(
                "\n{} [{}/{}] {}",
                style("處理中").cyan(),
                index + 1,
                videos.len(),
                style(&video_name).bold()
            );

            let progress_bar = match new_progress_bar() {
                Ok(bar) => bar,
                Err(e) => {
                    warn!("無法建立進度條: {e}");
                    ProgressBar::hidden()
                }
            };
            let pipeline = ScenePipeline::new(
                settings.clone(),
                Arc::clone(&runner),
                Arc::clone(&self.shutdown_signal),
            )
            .with_progress(Arc::new(ProgressBarSink(progress_bar.clone())));

            match pipeline.run(&video.path.to_string_lossy()) {
                Ok(report) => {
                    progress_bar.finish_and_clear();
                    print_report(&report);
                    summary.successful += 1;
                    summary.artifacts += report.success_count();
                    summary.artifact_failures += report.failure_count();
                }
                Err(e) => {
                    progress_bar.abandon_with_message("處理失敗");
                    error!("處理影片失敗 {video_name}: {e}");
                    println!("  {} 處理失敗: {}", style("✗").red(), e);
                    summary.failed += 1;
                }
            }
        }

        summary
    }

    fn print_summary(&self, summary: &ExtractionSummary) {
        println!();
        println!("{}", style(format!("=== {}擷取摘要 ===", self.kind)).cyan().bold());
        println!("  影片: {} 個", summary.total_videos);
        println!("  成功: {} 個", style(summary.successful).green());
        if summary.failed > 0 {
            println!("  失敗: {} 個", style(summary.failed).red());
        }
        println!("  產出檔案: {} 個", style(summary.artifacts).green());
        if summary.artifact_failures > 0 {
            println!("  擷取失敗: {} 個", style(summary.artifact_failures).red());
        }

        info!(
            "場景擷取完成 - 影片成功: {}, 影片失敗: {}, 產出: {}, 擷取失敗: {}",
            summary.successful, summary.failed, summary.artifacts, summary.artifact_failures
        );
    }
}

/// 單一檔案直接處理，資料夾則遞迴掃描影片
fn collect_videos(input: &Path) -> Result<Vec<VideoFileInfo>> {
    if input.is_file() {
        let size = fs::metadata(input)
            .with_context(|| format!("無法讀取檔案資訊: {}", input.display()))?
            .len();
        return Ok(vec![VideoFileInfo {
            path: PathBuf::from(input),
            size,
        }]);
    }
    validate_directory_exists(input)?;
    println!("{}", style("掃描影片檔案中...").dim());
    scan_video_files(input)
}

fn new_progress_bar() -> Result<ProgressBar> {
    let progress_bar = ProgressBar::new(100);
    progress_bar.set_style(
        ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos:>3}% {msg}",
        )?
        .progress_chars("#>-"),
    );
    Ok(progress_bar)
}

fn print_report(report: &ExtractionReport) {
    if report.used_fallback {
        println!(
            "  {} 沒有偵測到可用的場景切點，使用固定間隔切割",
            style("!").yellow()
        );
    }
    println!(
        "  {} {} 個片段，成功 {}，失敗 {}，共 {:.2} MB",
        style("✓").green(),
        report.segments.len(),
        report.success_count(),
        report.failure_count(),
        report.total_size() as f64 / 1024.0 / 1024.0
    );
    if report.cancelled > 0 {
        println!("  {} 取消 {} 個", style("⤳").dim(), report.cancelled);
    }
    println!("  {} {}", style("輸出:").dim(), report.output_dir.display());
}

/// 將整體進度顯示在 indicatif 進度條上
struct ProgressBarSink(ProgressBar);

impl ProgressSink for ProgressBarSink {
    fn on_progress(&self, update: &ProgressUpdate) {
        self.0.set_position(update.global.round() as u64);
        self.0.set_message(format!("{} {}", update.stage, update.message));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_single_file() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("clip.mp4");
        fs::write(&file, vec![0u8; 64]).unwrap();

        let videos = collect_videos(&file).unwrap();
        assert_eq!(videos.len(), 1);
        assert_eq!(videos[0].size, 64);
    }

    #[test]
    fn test_collect_directory() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.mkv"), vec![0u8; 20]).unwrap();
        fs::write(dir.path().join("a.mp4"), vec![0u8; 10]).unwrap();
        fs::write(dir.path().join("notes.txt"), b"x").unwrap();

        let videos = collect_videos(dir.path()).unwrap();
        assert_eq!(videos.len(), 2);
        assert!(videos[0].path.ends_with("a.mp4"));
    }
}
