//! 單一影片的完整處理流程
//!
//! 初始化（設定、工具、來源、探測）→ 場景分析 → 精修 → 擷取 → 匯入 → 寫出中繼資料。
//! 每個階段的局部進度經由 `ProgressAggregator` 換算成整體進度。

use super::artifact::{ExtractionTask, NamingScheme, midpoint, video_base_name};
use super::batch_extractor::{BatchConfig, extract_all};
use super::clip_extractor::{ClipExtractor, ClipExtractorConfig};
use super::cut_point_refiner::{CutPointRefiner, MIN_SEGMENT_FRAMES, RefinerSettings, Segment};
use super::engine::ExtractionEngine;
use super::frame_extractor::{FrameExtractor, FrameExtractorConfig};
use super::progress::{NoopProgress, ProgressAggregator, ProgressSink, Stage, StageRange};
use super::report::{ExtractionReport, write_sidecar};
use super::scene_detector::{SceneChangeDetector, SceneDetectorConfig};
use crate::config::{ArtifactKind, UserSettings};
use crate::error::{PipelineError, Result};
use crate::tools::{
    DirectoryProvider, FsDirectoryProvider, FsPathResolver, LibraryImporter, NoopImporter,
    PathResolver, ProcessRunner, VideoInfo, VideoInfoProbe, concurrency_limit,
    logical_core_count,
};
use chrono::Utc;
use log::{info, warn};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::AtomicBool;
use uuid::Uuid;

pub struct ScenePipeline {
    settings: UserSettings,
    runner: Arc<dyn ProcessRunner>,
    resolver: Arc<dyn PathResolver>,
    directories: Arc<dyn DirectoryProvider>,
    importer: Arc<dyn LibraryImporter>,
    progress: ProgressAggregator,
    shutdown_signal: Arc<AtomicBool>,
    cores: usize,
}

impl ScenePipeline {
    /// 使用檔案系統的預設協作者建立流程
    pub fn new(
        settings: UserSettings,
        runner: Arc<dyn ProcessRunner>,
        shutdown_signal: Arc<AtomicBool>,
    ) -> Self {
        Self {
            settings,
            runner,
            resolver: Arc::new(FsPathResolver),
            directories: Arc::new(FsDirectoryProvider),
            importer: Arc::new(NoopImporter),
            progress: ProgressAggregator::with_default_stages(Arc::new(NoopProgress)),
            shutdown_signal,
            cores: logical_core_count(),
        }
    }

    #[must_use]
    pub fn with_resolver(mut self, resolver: Arc<dyn PathResolver>) -> Self {
        self.resolver = resolver;
        self
    }

    #[must_use]
    pub fn with_directories(mut self, directories: Arc<dyn DirectoryProvider>) -> Self {
        self.directories = directories;
        self
    }

    #[must_use]
    pub fn with_importer(mut self, importer: Arc<dyn LibraryImporter>) -> Self {
        self.importer = importer;
        self
    }

    #[must_use]
    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = self.progress.with_sink(sink);
        self
    }

    /// 自訂階段表，不合法時回傳 `PipelineError::Configuration`
    pub fn with_stages(mut self, ranges: &[StageRange]) -> Result<Self> {
        let sink = Arc::clone(self.progress.sink());
        self.progress = ProgressAggregator::new(ranges, sink)?;
        Ok(self)
    }

    /// 覆寫偵測到的核心數（用於計算並行數）
    #[must_use]
    pub fn with_core_count(mut self, cores: usize) -> Self {
        self.cores = cores.max(1);
        self
    }

    #[must_use]
    pub const fn settings(&self) -> &UserSettings {
        &self.settings
    }

    /// 處理一部影片
    ///
    /// 設定、來源、探測、偵測的錯誤會中止流程；個別片段的擷取或匯入失敗只記錄在報告中。
    pub fn run(&self, source: &str) -> Result<ExtractionReport> {
        let progress = &self.progress;
        let settings = &self.settings;

        // 初始化
        progress.report(Stage::Initialize, 0.0, "檢查設定");
        settings.validate()?;
        self.check_tools()?;

        let source_path = self
            .resolver
            .resolve(source)
            .map_err(|e| PipelineError::Source(format!("{source}: {e:#}")))?;
        let base_name = video_base_name(&source_path);
        let output_dir = self.output_dir(&source_path, &base_name);
        self.directories
            .ensure_dir(&output_dir)
            .map_err(|e| PipelineError::Io(io::Error::other(format!("{e:#}"))))?;

        progress.report(Stage::Initialize, 0.5, "讀取影片資訊");
        let video = VideoInfoProbe::new(Arc::clone(&self.runner), &settings.tools.ffprobe)
            .probe(&source_path)?;
        info!(
            "影片資訊: {:.2}s, {}x{}, {} fps, {} 幀",
            video.duration_seconds, video.width, video.height, video.frame_rate, video.total_frames
        );
        progress.report(Stage::Initialize, 1.0, "影片資訊已取得");

        // 場景分析
        let detector = SceneChangeDetector::new(
            Arc::clone(&self.runner),
            &settings.tools.ffmpeg,
            SceneDetectorConfig {
                sensitivity: settings.scene.sensitivity,
                min_gap_seconds: settings.scene.min_gap_seconds,
                scale_width: settings.scene.analyze_width,
            },
        );
        let cuts = detector.detect(&source_path, &video, &mut |local| {
            progress.report(Stage::Analyze, local, "分析場景");
        })?;

        let refiner = CutPointRefiner::new(RefinerSettings {
            in_handle: settings.scene.in_handle_frames,
            out_handle: settings.scene.out_handle_frames,
            min_frames: MIN_SEGMENT_FRAMES,
            fallback_interval: settings.scene.fallback_interval_seconds,
        });
        let refinement = refiner.refine(&cuts, &video);
        if refinement.segments.is_empty() {
            return Err(PipelineError::NoSegments {
                duration: video.duration_seconds,
            });
        }
        progress.report(
            Stage::Analyze,
            1.0,
            format!(
                "{} 個場景切點，{} 個片段",
                cuts.len(),
                refinement.segments.len()
            ),
        );

        // 擷取
        let tasks = self.build_tasks(
            &refinement.segments,
            &source_path,
            &output_dir,
            &video,
            &base_name,
        );
        let engine = self.engine();
        let concurrency = concurrency_limit(
            self.cores,
            tasks.len(),
            settings.extraction.max_concurrency,
        );
        let batch = BatchConfig {
            strategy: settings.extraction.strategy,
            chunk_size: settings.extraction.chunk_size,
            concurrency,
        };

        progress.report(Stage::Extract, 0.0, format!("開始擷取{}", engine.kind()));
        let outcome = extract_all(
            engine.as_ref(),
            tasks,
            batch,
            &self.shutdown_signal,
            &mut |event| {
                progress.report(
                    Stage::Extract,
                    event.fraction,
                    format!("{}/{}", event.processed, event.total),
                );
            },
        );
        if outcome.cancelled > 0 {
            warn!("已取消 {} 個擷取任務", outcome.cancelled);
        }

        // 匯入
        let completed: Vec<_> = outcome.results.iter().flatten().collect();
        let mut import_failures = 0;
        progress.report(Stage::Import, 0.0, "匯入素材庫");
        for (position, artifact) in completed.iter().enumerate() {
            if let Err(e) = self.importer.import(artifact) {
                warn!("匯入失敗 {}: {e:#}", artifact.path.display());
                import_failures += 1;
            }
            progress.report(
                Stage::Import,
                (position + 1) as f64 / completed.len() as f64,
                artifact.filename.clone(),
            );
        }
        progress.report(Stage::Import, 1.0, "匯入完成");

        // 完成
        let mut report = ExtractionReport {
            run_id: Uuid::new_v4(),
            source_video: source_path,
            output_dir,
            extracted_at: Utc::now(),
            kind: settings.extraction.kind,
            video,
            scene_cuts: cuts.len(),
            segments: refinement.segments,
            rejected_segments: refinement.rejected.len(),
            used_fallback: refinement.used_fallback,
            artifacts: outcome.results,
            failures: outcome.failures,
            cancelled: outcome.cancelled,
            import_failures,
            metadata_path: None,
        };

        if settings.output.write_metadata {
            progress.report(Stage::Finalize, 0.0, "寫入中繼資料");
            report.metadata_path = Some(write_sidecar(&report, &base_name)?);
        }

        info!(
            "處理完成 {} - 成功: {}, 失敗: {}, 取消: {}",
            base_name,
            report.success_count(),
            report.failure_count(),
            report.cancelled
        );
        progress.report(Stage::Finalize, 1.0, "完成");

        Ok(report)
    }

    /// 在派發任何任務前確認 ffmpeg 與 ffprobe 可用
    fn check_tools(&self) -> Result<()> {
        for tool in [&self.settings.tools.ffprobe, &self.settings.tools.ffmpeg] {
            if !self.runner.is_available(tool) {
                return Err(PipelineError::Configuration(format!(
                    "找不到外部工具: {}",
                    tool.display()
                )));
            }
        }
        Ok(())
    }

    /// 輸出目錄：`{root 或影片所在資料夾}/{影片名稱}`
    fn output_dir(&self, source_path: &Path, base_name: &str) -> PathBuf {
        let root = self.settings.output.root.clone().unwrap_or_else(|| {
            source_path
                .parent()
                .map_or_else(|| PathBuf::from("."), Path::to_path_buf)
        });
        root.join(base_name)
    }

    fn build_tasks(
        &self,
        segments: &[Segment],
        source_path: &Path,
        output_dir: &Path,
        video: &VideoInfo,
        base_name: &str,
    ) -> Vec<ExtractionTask> {
        let extraction = &self.settings.extraction;
        let naming = NamingScheme::new(
            base_name,
            extraction,
            video.duration_seconds,
            segments.len(),
        );
        let frame_time = (video.frame_time > 0.0).then_some(video.frame_time);

        let entries: Vec<(usize, f64)> = segments
            .iter()
            .map(|segment| {
                let time = match extraction.kind {
                    ArtifactKind::Frame => midpoint(segment, frame_time).0,
                    ArtifactKind::Clip => segment.start_time,
                };
                (segment.index, time)
            })
            .collect();
        let filenames = naming.unique_filenames(&entries);

        segments
            .iter()
            .zip(filenames)
            .enumerate()
            .map(|(position, (segment, filename))| ExtractionTask {
                segment: segment.clone(),
                source_path: source_path.to_path_buf(),
                output_path: output_dir.join(filename),
                frame_time,
                original_index: position,
            })
            .collect()
    }

    fn engine(&self) -> Box<dyn ExtractionEngine> {
        let tools = &self.settings.tools;
        let extraction = &self.settings.extraction;
        match extraction.kind {
            ArtifactKind::Frame => Box::new(FrameExtractor::new(
                Arc::clone(&self.runner),
                &tools.ffmpeg,
                FrameExtractorConfig {
                    format: extraction.image_format,
                    quality: extraction.quality,
                    hardware_acceleration: extraction.hardware_acceleration,
                },
            )),
            ArtifactKind::Clip => Box::new(ClipExtractor::new(
                Arc::clone(&self.runner),
                &tools.ffmpeg,
                ClipExtractorConfig {
                    format: extraction.clip_format,
                    quality: extraction.quality,
                    hardware_acceleration: extraction.hardware_acceleration,
                },
            )),
        }
    }
}
