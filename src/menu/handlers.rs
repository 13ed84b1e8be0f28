use crate::component::SceneExtractor;
use crate::config::{ArtifactKind, Config, SETTINGS_FILE};
use crate::pause;
use anyhow::Result;
use console::{Term, style};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

pub fn run_scene_extractor(
    term: &Term,
    shutdown_signal: &Arc<AtomicBool>,
    config: &Config,
    kind: ArtifactKind,
) -> Result<()> {
    // 上一次的中斷不影響新的工作
    shutdown_signal.store(false, Ordering::SeqCst);

    let extractor = SceneExtractor::new(config.clone(), kind, Arc::clone(shutdown_signal));

    if let Err(e) = extractor.run() {
        eprintln!("{} {}", style("錯誤:").red().bold(), e);
    }

    pause(term)?;
    Ok(())
}

pub fn show_current_settings(term: &Term, config: &Config) -> Result<()> {
    term.clear_screen()?;

    let settings = &config.settings;
    println!("{}", style("=== 目前設定 ===").cyan().bold());
    println!("{}", style(format!("(修改 {SETTINGS_FILE} 後重新啟動生效)")).dim());
    println!();
    println!("  ffmpeg: {}", settings.tools.ffmpeg.display());
    println!("  ffprobe: {}", settings.tools.ffprobe.display());
    println!("  場景閾值: {}", settings.scene.sensitivity);
    println!("  最小切點間隔: {} 秒", settings.scene.min_gap_seconds);
    println!(
        "  前後緩衝: {} / {} 幀",
        settings.scene.in_handle_frames, settings.scene.out_handle_frames
    );
    println!(
        "  畫面格式: {}，片段格式: {}，品質: {}",
        settings.extraction.image_format.extension(),
        settings.extraction.clip_format.extension(),
        settings.extraction.quality
    );
    println!(
        "  並行數: {}",
        settings
            .extraction
            .max_concurrency
            .map_or_else(|| "自動".to_string(), |n| n.to_string())
    );
    println!(
        "  輸出位置: {}",
        settings
            .output
            .root
            .as_ref()
            .map_or_else(|| "影片所在資料夾".to_string(), |p| p.display().to_string())
    );

    pause(term)?;
    Ok(())
}
