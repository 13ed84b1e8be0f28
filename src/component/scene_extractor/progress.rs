use crate::error::PipelineError;
use log::debug;
use std::fmt;
use std::sync::Arc;

/// 處理階段（依執行順序）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Initialize,
    Analyze,
    Extract,
    Import,
    Finalize,
}

impl Stage {
    pub const ALL: [Self; 5] = [
        Self::Initialize,
        Self::Analyze,
        Self::Extract,
        Self::Import,
        Self::Finalize,
    ];

    const fn position(self) -> usize {
        match self {
            Self::Initialize => 0,
            Self::Analyze => 1,
            Self::Extract => 2,
            Self::Import => 3,
            Self::Finalize => 4,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Initialize => "初始化",
            Self::Analyze => "分析場景",
            Self::Extract => "擷取",
            Self::Import => "匯入",
            Self::Finalize => "完成",
        };
        write!(f, "{label}")
    }
}

/// 階段在整體進度中佔用的區間（百分比）
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StageRange {
    pub stage: Stage,
    pub start: f64,
    pub end: f64,
}

impl StageRange {
    #[must_use]
    pub const fn new(stage: Stage, start: f64, end: f64) -> Self {
        Self { stage, start, end }
    }
}

/// 預設階段表
pub const DEFAULT_STAGES: [StageRange; 5] = [
    StageRange::new(Stage::Initialize, 0.0, 10.0),
    StageRange::new(Stage::Analyze, 10.0, 30.0),
    StageRange::new(Stage::Extract, 30.0, 80.0),
    StageRange::new(Stage::Import, 80.0, 95.0),
    StageRange::new(Stage::Finalize, 95.0, 100.0),
];

#[derive(Debug, Clone, PartialEq)]
pub struct ProgressUpdate {
    pub stage: Stage,
    /// 階段內進度 [0, 1]
    pub local: f64,
    /// 整體進度 [0, 100]
    pub global: f64,
    pub message: String,
}

/// 接收整體進度的對象
pub trait ProgressSink: Send + Sync {
    fn on_progress(&self, update: &ProgressUpdate);
}

impl<F> ProgressSink for F
where
    F: Fn(&ProgressUpdate) + Send + Sync,
{
    fn on_progress(&self, update: &ProgressUpdate) {
        self(update);
    }
}

/// 不做任何事的進度接收者
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProgress;

impl ProgressSink for NoopProgress {
    fn on_progress(&self, _update: &ProgressUpdate) {}
}

/// 將各階段的局部進度換算成整體進度
pub struct ProgressAggregator {
    ranges: [StageRange; 5],
    sink: Arc<dyn ProgressSink>,
}

impl ProgressAggregator {
    /// 建立自訂階段表
    ///
    /// 階段表必須依 `Stage::ALL` 的順序列出每個階段，區間首尾相接，
    /// 從 0 開始、到 100 結束。
    pub fn new(
        ranges: &[StageRange],
        sink: Arc<dyn ProgressSink>,
    ) -> Result<Self, PipelineError> {
        let ranges = validate_ranges(ranges)?;
        Ok(Self { ranges, sink })
    }

    #[must_use]
    pub fn with_default_stages(sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            ranges: DEFAULT_STAGES,
            sink,
        }
    }

    /// 保留階段表，更換進度接收者
    #[must_use]
    pub fn with_sink(self, sink: Arc<dyn ProgressSink>) -> Self {
        Self {
            ranges: self.ranges,
            sink,
        }
    }

    #[must_use]
    pub fn ranges(&self) -> &[StageRange] {
        &self.ranges
    }

    #[must_use]
    pub const fn sink(&self) -> &Arc<dyn ProgressSink> {
        &self.sink
    }

    /// global = start + local * (end - start)
    #[must_use]
    pub fn global(&self, stage: Stage, local: f64) -> f64 {
        let range = &self.ranges[stage.position()];
        let local = clamp_unit(local);
        range.start + local * (range.end - range.start)
    }

    /// 回報階段內進度，回傳換算後的整體進度
    pub fn report(&self, stage: Stage, local: f64, message: impl Into<String>) -> f64 {
        let local = clamp_unit(local);
        let global = self.global(stage, local);
        let update = ProgressUpdate {
            stage,
            local,
            global,
            message: message.into(),
        };
        debug!("進度 [{}] {:.1}% {}", stage, global, update.message);
        self.sink.on_progress(&update);
        global
    }
}

fn clamp_unit(value: f64) -> f64 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

fn validate_ranges(ranges: &[StageRange]) -> Result<[StageRange; 5], PipelineError> {
    let table: [StageRange; 5] = ranges.try_into().map_err(|_| {
        PipelineError::Configuration(format!(
            "階段表需要 {} 個階段，實際為 {}",
            Stage::ALL.len(),
            ranges.len()
        ))
    })?;

    let mut expected_start = 0.0;
    for (range, stage) in table.iter().zip(Stage::ALL) {
        if range.stage != stage {
            return Err(PipelineError::Configuration(format!(
                "階段順序錯誤：預期 {stage}，實際為 {}",
                range.stage
            )));
        }
        if (range.start - expected_start).abs() > f64::EPSILON {
            return Err(PipelineError::Configuration(format!(
                "階段 {stage} 的起點 {} 與前一階段不連續",
                range.start
            )));
        }
        if !range.start.is_finite() || !range.end.is_finite() || range.end <= range.start {
            return Err(PipelineError::Configuration(format!(
                "階段 {stage} 的區間無效: {} - {}",
                range.start, range.end
            )));
        }
        expected_start = range.end;
    }

    if (expected_start - 100.0).abs() > f64::EPSILON {
        return Err(PipelineError::Configuration(format!(
            "階段表必須在 100 結束，實際為 {expected_start}"
        )));
    }

    Ok(table)
}
