//! 切點精修
//!
//! 將偵測到的時間點換算成幀，套用前後緩衝（handle），產生不重疊、逐幀精確的片段。
//! 沒有可用切點時改用固定間隔的預設切割。

use crate::error::SegmentRejected;
use crate::tools::VideoInfo;
use log::{debug, info};
use serde::Serialize;

/// 最短可用片段（幀）
pub const MIN_SEGMENT_FRAMES: u64 = 10;

/// 預設切割的固定間隔（秒）
pub const DEFAULT_FALLBACK_INTERVAL: f64 = 10.0;

/// 兩個切點之間的影片片段，建立後不再變動
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Segment {
    pub index: usize,
    pub start_time: f64,
    pub end_time: f64,
    pub duration: f64,
    pub in_frame: u64,
    /// 包含在片段內的最後一幀
    pub out_frame: u64,
    pub frame_count: u64,
}

impl Segment {
    fn from_frames(index: usize, in_frame: u64, out_frame: u64, frame_time: f64) -> Self {
        let start_time = in_frame as f64 * frame_time;
        let end_time = (out_frame + 1) as f64 * frame_time;
        Self {
            index,
            start_time,
            end_time,
            duration: end_time - start_time,
            in_frame,
            out_frame,
            frame_count: out_frame - in_frame + 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RefinerSettings {
    pub in_handle: u64,
    pub out_handle: u64,
    pub min_frames: u64,
    pub fallback_interval: f64,
}

impl Default for RefinerSettings {
    fn default() -> Self {
        Self {
            in_handle: 2,
            out_handle: 2,
            min_frames: MIN_SEGMENT_FRAMES,
            fallback_interval: DEFAULT_FALLBACK_INTERVAL,
        }
    }
}

/// 精修結果
#[derive(Debug, Clone, PartialEq)]
pub struct Refinement {
    pub segments: Vec<Segment>,
    pub rejected: Vec<SegmentRejected>,
    pub used_fallback: bool,
}

pub struct CutPointRefiner {
    settings: RefinerSettings,
}

impl CutPointRefiner {
    #[must_use]
    pub const fn new(settings: RefinerSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub const fn settings(&self) -> &RefinerSettings {
        &self.settings
    }

    /// 將切點時間換算成片段；相同輸入永遠得到相同結果
    #[must_use]
    pub fn refine(&self, timestamps: &[f64], video_info: &VideoInfo) -> Refinement {
        let total_frames = video_info.total_frames;
        let cut_frames = self.cut_frames(timestamps, video_info);

        let mut rejected = Vec::new();
        let mut segments = Vec::new();

        if !cut_frames.is_empty() {
            let mut retained_first_cut = None;
            for (position, &current) in cut_frames.iter().enumerate() {
                let next = cut_frames.get(position + 1).copied().unwrap_or(total_frames);
                if let Some((in_frame, out_frame)) =
                    self.candidate(current, next, self.settings.min_frames, &mut rejected)
                {
                    retained_first_cut.get_or_insert(current);
                    segments.push(Segment::from_frames(
                        segments.len(),
                        in_frame,
                        out_frame,
                        video_info.frame_time,
                    ));
                }
            }

            if let Some(first_cut) = retained_first_cut {
                self.prepend_lead_in(&mut segments, first_cut, video_info.frame_time);
            }
        }

        if segments.is_empty() {
            info!(
                "沒有可用的場景切點，改用每 {} 秒的預設切割",
                self.settings.fallback_interval
            );
            let segments = self.fallback_segments(video_info, &mut rejected);
            return Refinement {
                segments,
                rejected,
                used_fallback: true,
            };
        }

        debug!(
            "精修完成: {} 個片段，捨棄 {} 個候選",
            segments.len(),
            rejected.len()
        );

        Refinement {
            segments,
            rejected,
            used_fallback: false,
        }
    }

    /// 時間點轉幀：round(t * fps)，排除超出影片範圍的值，去重排序
    fn cut_frames(&self, timestamps: &[f64], video_info: &VideoInfo) -> Vec<u64> {
        let mut frames: Vec<u64> = timestamps
            .iter()
            .filter(|t| t.is_finite() && **t >= 0.0)
            .map(|t| (t * video_info.fps).round() as u64)
            .filter(|&frame| frame < video_info.total_frames)
            .collect();
        frames.sort_unstable();
        frames.dedup();
        frames
    }

    /// 套用緩衝：`current + in_handle` 到 `next - out_handle`（不含）
    fn candidate(
        &self,
        current: u64,
        next: u64,
        required: u64,
        rejected: &mut Vec<SegmentRejected>,
    ) -> Option<(u64, u64)> {
        let in_frame = i128::from(current) + i128::from(self.settings.in_handle);
        let out_frame = i128::from(next) - i128::from(self.settings.out_handle) - 1;
        let frame_count = out_frame - in_frame + 1;

        if frame_count < i128::from(required) {
            let rejection = SegmentRejected {
                in_frame: saturate(in_frame),
                out_frame: saturate(out_frame),
                frame_count: saturate(frame_count),
                required,
            };
            debug!("{rejection}");
            rejected.push(rejection);
            return None;
        }

        Some((u64::try_from(in_frame).ok()?, u64::try_from(out_frame).ok()?))
    }

    /// 第一個切點離開頭夠遠時，補上開頭的片段 [0, first_cut - out_handle)
    fn prepend_lead_in(&self, segments: &mut Vec<Segment>, first_cut: u64, frame_time: f64) {
        let threshold = self
            .settings
            .in_handle
            .saturating_add(self.settings.out_handle)
            .saturating_add(self.settings.min_frames);
        if first_cut <= threshold {
            return;
        }

        let out_frame = first_cut - self.settings.out_handle - 1;
        segments.insert(0, Segment::from_frames(0, 0, out_frame, frame_time));

        let resequenced: Vec<Segment> = segments
            .drain(..)
            .enumerate()
            .map(|(index, segment)| Segment {
                index,
                ..segment
            })
            .collect();
        *segments = resequenced;
    }

    /// 固定間隔的預設切割，每段至少一秒
    fn fallback_segments(
        &self,
        video_info: &VideoInfo,
        rejected: &mut Vec<SegmentRejected>,
    ) -> Vec<Segment> {
        let interval = self.settings.fallback_interval;
        if interval.is_nan() || interval <= 0.0 || video_info.duration_seconds <= 0.0 {
            return Vec::new();
        }

        let required = (video_info.fps.ceil() as u64).max(self.settings.min_frames);

        let mut boundaries = Vec::new();
        let mut step = 0u32;
        loop {
            let time = f64::from(step) * interval;
            if time >= video_info.duration_seconds {
                break;
            }
            let frame = (time * video_info.fps).round() as u64;
            if frame >= video_info.total_frames {
                break;
            }
            if boundaries.last() != Some(&frame) {
                boundaries.push(frame);
            }
            step += 1;
        }

        let mut segments = Vec::new();
        for (position, &current) in boundaries.iter().enumerate() {
            let next = boundaries
                .get(position + 1)
                .copied()
                .unwrap_or(video_info.total_frames);
            if let Some((in_frame, out_frame)) = self.candidate(current, next, required, rejected) {
                segments.push(Segment::from_frames(
                    segments.len(),
                    in_frame,
                    out_frame,
                    video_info.frame_time,
                ));
            }
        }
        segments
    }
}

fn saturate(value: i128) -> i64 {
    i64::try_from(value).unwrap_or(if value < 0 { i64::MIN } else { i64::MAX })
}
