//! 場景擷取元件
//!
//! 流程：
//! 1. 取得影片資訊（ffprobe）
//! 2. 場景變換偵測（select + showinfo）
//! 3. 切點精修成逐幀精確的片段
//! 4. 平行擷取畫面或片段
//! 5. 匯入並寫出中繼資料

mod artifact;
mod batch_extractor;
mod clip_extractor;
mod cut_point_refiner;
mod engine;
mod frame_extractor;
mod main;
mod pipeline;
mod progress;
mod report;
mod scene_detector;
mod task_scheduler;

pub use artifact::{
    Artifact, ExtractionTask, NamingScheme, clip_crf, image_quality_args, midpoint, pad_width,
    video_base_name,
};
pub use batch_extractor::{BatchConfig, extract_all};
pub use clip_extractor::{ClipExtractor, ClipExtractorConfig};
pub use cut_point_refiner::{
    CutPointRefiner, DEFAULT_FALLBACK_INTERVAL, MIN_SEGMENT_FRAMES, RefinerSettings, Refinement,
    Segment,
};
pub use engine::ExtractionEngine;
pub use frame_extractor::{FrameExtractor, FrameExtractorConfig};
pub use main::{ExtractionSummary, SceneExtractor};
pub use pipeline::ScenePipeline;
pub use progress::{
    DEFAULT_STAGES, NoopProgress, ProgressAggregator, ProgressSink, ProgressUpdate, Stage,
    StageRange,
};
pub use report::{
    ExtractionReport, MetadataSidecar, SidecarArtifact, VideoSummary, sidecar_path, write_sidecar,
};
pub use scene_detector::{
    MAX_SENSITIVITY, MIN_SENSITIVITY, SceneChangeDetector, SceneDetectorConfig,
    normalize_timestamps,
};
pub use task_scheduler::{ExtractionScheduler, ProgressEvent, ScheduleOutcome, TaskFailure};
