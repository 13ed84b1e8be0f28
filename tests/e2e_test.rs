//! E2E 測試
//!
//! 使用真正的 ffmpeg/ffprobe 產生測試影片並執行完整流程；
//! 系統沒有安裝 ffmpeg 時跳過。

use std::path::Path;
use std::process::Command;
use std::sync::Arc;
use std::sync::atomic::AtomicBool;

use scene_extractor::component::scene_extractor::ScenePipeline;
use scene_extractor::config::UserSettings;
use scene_extractor::tools::{SystemProcessRunner, VideoInfoProbe, locate_program};
use tempfile::TempDir;

fn ffmpeg_available() -> bool {
    locate_program(Path::new("ffmpeg")).is_some() && locate_program(Path::new("ffprobe")).is_some()
}

/// 產生紅色 3 秒 + 藍色 3 秒的測試影片
fn generate_two_scene_video(path: &Path) -> bool {
    Command::new("ffmpeg")
        .args([
            "-hide_banner",
            "-loglevel",
            "error",
            "-f",
            "lavfi",
            "-i",
            "color=c=red:s=160x120:r=25:d=3",
            "-f",
            "lavfi",
            "-i",
            "color=c=blue:s=160x120:r=25:d=3",
            "-filter_complex",
            "[0:v][1:v]concat=n=2:v=1:a=0",
            "-c:v",
            "mpeg4",
            "-y",
        ])
        .arg(path)
        .status()
        .is_ok_and(|status| status.success())
}

#[test]
fn test_probe_real_video() {
    if !ffmpeg_available() {
        println!("跳過測試：找不到 ffmpeg/ffprobe");
        return;
    }

    let dir = TempDir::new().unwrap();
    let video = dir.path().join("two_scenes.mp4");
    if !generate_two_scene_video(&video) {
        println!("跳過測試：無法產生測試影片");
        return;
    }

    let probe = VideoInfoProbe::new(Arc::new(SystemProcessRunner::default()), "ffprobe");
    let info = probe.probe(&video).unwrap();
    assert_eq!(info.width, 160);
    assert_eq!(info.height, 120);
    assert!((info.fps - 25.0).abs() < 1e-6);
    assert!(info.duration_seconds > 5.0 && info.duration_seconds < 7.0);
    assert!((info.frame_time * info.fps - 1.0).abs() < 1e-6);
}

#[test]
fn test_full_pipeline_real_video() {
    if !ffmpeg_available() {
        println!("跳過測試：找不到 ffmpeg/ffprobe");
        return;
    }

    let dir = TempDir::new().unwrap();
    let video = dir.path().join("two_scenes.mp4");
    if !generate_two_scene_video(&video) {
        println!("跳過測試：無法產生測試影片");
        return;
    }

    let shutdown_signal = Arc::new(AtomicBool::new(false));
    let mut settings = UserSettings::default();
    settings.output.root = Some(dir.path().join("out"));

    let pipeline = ScenePipeline::new(
        settings,
        Arc::new(SystemProcessRunner::new(Arc::clone(&shutdown_signal), false)),
        shutdown_signal,
    );
    let report = pipeline.run(&video.to_string_lossy()).unwrap();

    assert!(!report.segments.is_empty());
    assert_eq!(report.success_count(), report.segments.len());
    for artifact in report.completed_artifacts() {
        assert!(artifact.path.exists());
        assert!(artifact.file_size > 0);
    }
    let sidecar = report.metadata_path.as_ref().unwrap();
    assert!(sidecar.ends_with("two_scenes_metadata.json"));
    assert!(sidecar.exists());

    println!(
        "✓ {} 個切點，{} 個片段，{} 個畫面",
        report.scene_cuts,
        report.segments.len(),
        report.success_count()
    );
}
