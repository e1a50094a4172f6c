//! Background warming of the frame cache, one segment at a time.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::cache::{TimeBucket, BUCKETS_PER_SECOND};
use super::decoder::{FrameDecoder, MediaSession};
use super::scrub::SeekBarGeometry;
use super::PreviewContext;

/// Frames expected for the loaded media and frames produced so far.
///
/// Each bucket counts once, however often it is decoded or reused.
#[derive(Debug, Default)]
pub struct Progress {
    total: AtomicU64,
    processed: AtomicU64,
    counted: parking_lot::Mutex<HashSet<TimeBucket>>,
}

impl Progress {
    pub fn reset(&self, total: u64) {
        let mut counted = self.counted.lock();
        counted.clear();
        self.total.store(total, Ordering::Release);
        self.processed.store(0, Ordering::Release);
    }

    /// Count `bucket` as produced. Returns the new count, or `None` if the
    /// bucket was already counted.
    pub fn record_frame(&self, bucket: TimeBucket) -> Option<u64> {
        let mut counted = self.counted.lock();
        if !counted.insert(bucket) {
            return None;
        }
        Some(self.processed.fetch_add(1, Ordering::AcqRel) + 1)
    }

    pub fn total(&self) -> u64 {
        self.total.load(Ordering::Acquire)
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Acquire)
    }

    /// Completion in `[0, 1]`.
    pub fn fraction(&self) -> f32 {
        let total = self.total();
        if total == 0 {
            return 0.0;
        }
        (self.processed() as f32 / total as f32).min(1.0)
    }
}

/// Frames needed to cover `duration` at bucket resolution: `ceil(duration * 2)`.
pub fn total_frames_needed(duration: f64) -> u64 {
    if !duration.is_finite() || duration <= 0.0 {
        return 0;
    }
    (duration * BUCKETS_PER_SECOND).ceil() as u64
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreloadOutcome {
    /// Every bucket of the segment is now cached.
    Completed { decoded: usize, reused: usize },
    AlreadyComplete,
    /// Some buckets failed; the segment stays incomplete and can be retried.
    Incomplete { failed: usize },
    /// The segment starts at or after the end of the media.
    OutOfRange,
    /// The media changed while the preload was queued or running.
    Cancelled,
    NoMedia,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PreprocessReport {
    pub completed: u64,
    pub incomplete: u64,
    pub cancelled: bool,
}

pub struct PreloadScheduler<S> {
    ctx: PreviewContext,
    decoder: Arc<FrameDecoder<S>>,
    // One segment preload at a time; later requests wait their turn
    slot: Mutex<()>,
}

impl<S: MediaSession> PreloadScheduler<S> {
    pub fn new(ctx: PreviewContext, decoder: Arc<FrameDecoder<S>>) -> Self {
        Self {
            ctx,
            decoder,
            slot: Mutex::new(()),
        }
    }

    pub fn decoder(&self) -> &Arc<FrameDecoder<S>> {
        &self.decoder
    }

    /// Decode every bucket of the segment containing `start_time`.
    ///
    /// Waits while another segment is being preloaded, then re-checks whether
    /// the work is still needed. Decode failures are logged and the remaining
    /// buckets are still attempted.
    pub async fn preload_segment(&self, start_time: f64) -> PreloadOutcome {
        self.preload(start_time, PreloadMode::OnDemand).await
    }

    async fn preload(&self, start_time: f64, mode: PreloadMode) -> PreloadOutcome {
        // Generation first: media read afterwards is at least as new
        let generation = self.ctx.generation();
        let Some(media) = self.ctx.media() else {
            return PreloadOutcome::NoMedia;
        };
        let index = self.ctx.segments().segment_index_for(start_time);
        if self.ctx.segments().is_complete(index) {
            return PreloadOutcome::AlreadyComplete;
        }

        let _slot = self.slot.lock().await;
        if self.ctx.generation() != generation {
            return PreloadOutcome::Cancelled;
        }
        if self.ctx.segments().is_complete(index) {
            return PreloadOutcome::AlreadyComplete;
        }

        let (start, end) = {
            let segments = self.ctx.segments();
            let start = segments.segment_start(index);
            (start, (start + segments.segment_length()).min(media.duration))
        };
        if start >= end {
            return PreloadOutcome::OutOfRange;
        }

        let mut decoded = 0;
        let mut reused = 0;
        let mut failed = 0;
        for bucket in TimeBucket::range(start, end) {
            if self.ctx.generation() != generation {
                return PreloadOutcome::Cancelled;
            }
            if self.ctx.cache().contains(bucket) {
                reused += 1;
                self.record_progress(bucket, mode);
                continue;
            }

            match self.decoder.decode_frame(&media.source, bucket.as_secs()).await {
                Ok(_) if self.ctx.generation() != generation => {
                    return PreloadOutcome::Cancelled;
                }
                Ok(_) => {
                    decoded += 1;
                    self.record_progress(bucket, mode);
                }
                Err(e) => {
                    failed += 1;
                    warn!(segment = index, "Error preloading segment: {}", e);
                }
            }
        }

        if failed > 0 {
            return PreloadOutcome::Incomplete { failed };
        }
        if !self.ctx.mark_segment_complete(index, generation) {
            return PreloadOutcome::Cancelled;
        }
        debug!(segment = index, decoded, reused, "Segment preloaded");
        PreloadOutcome::Completed { decoded, reused }
    }

    /// Preload the hovered segment, then its neighbour in the direction of travel.
    ///
    /// Returns the segment indices that were requested, in order.
    pub async fn predictive_preload(
        &self,
        geometry: &SeekBarGeometry,
        pointer_x: f32,
        movement_x: f32,
    ) -> Vec<u64> {
        let Some(media) = self.ctx.media() else {
            return Vec::new();
        };
        let timestamp = geometry.time_at(pointer_x, media.duration);
        self.predictive_preload_at(timestamp, movement_x).await
    }

    pub async fn predictive_preload_at(&self, timestamp: f64, movement_x: f32) -> Vec<u64> {
        let Some(media) = self.ctx.media() else {
            return Vec::new();
        };
        let (targets, segment_length) = {
            let segments = self.ctx.segments();
            let current = segments.segment_index_for(timestamp);
            let mut targets = vec![current];
            if movement_x > 0.0 {
                let next = current + 1;
                if segments.segment_start(next) < media.duration {
                    targets.push(next);
                }
            } else if movement_x < 0.0 && current > 0 {
                targets.push(current - 1);
            }
            (targets, segments.segment_length())
        };

        for index in &targets {
            self.preload_segment(*index as f64 * segment_length).await;
        }
        targets
    }

    /// Reset the cache and decode the whole timeline, segment by segment in
    /// ascending order. Stops early if the media changes.
    pub async fn run_full_preprocessing(&self) -> PreprocessReport {
        let mut report = PreprocessReport::default();
        let Some(media) = self.ctx.media() else {
            return report;
        };

        let total = total_frames_needed(media.duration);
        self.ctx.reset(total);
        let generation = self.ctx.generation();
        info!(
            "Starting video preprocessing... ({} frames needed for {})",
            total,
            media.filename()
        );

        let (count, segment_length) = {
            let segments = self.ctx.segments();
            (segments.segment_count(media.duration), segments.segment_length())
        };
        for index in 0..count {
            if self.ctx.generation() != generation {
                report.cancelled = true;
                break;
            }
            match self.preload(index as f64 * segment_length, PreloadMode::Full).await {
                PreloadOutcome::Completed { .. } | PreloadOutcome::AlreadyComplete => {
                    report.completed += 1
                }
                PreloadOutcome::Incomplete { .. } => report.incomplete += 1,
                PreloadOutcome::Cancelled | PreloadOutcome::NoMedia => {
                    report.cancelled = true;
                    break;
                }
                PreloadOutcome::OutOfRange => {}
            }
        }

        if report.cancelled {
            info!("Preprocessing of {} cancelled", media.filename());
        } else {
            info!(
                "Complete preprocessing finished! ({} segments, {} incomplete)",
                report.completed, report.incomplete
            );
        }
        report
    }

    fn record_progress(&self, bucket: TimeBucket, mode: PreloadMode) {
        let progress = self.ctx.progress();
        let Some(processed) = progress.record_frame(bucket) else {
            return;
        };
        let total = progress.total();
        // Every 2 seconds of media
        if mode.announces_progress() && total > 0 && bucket.index() % 4 == 0 {
            info!(
                "Preprocessing progress: {:.0}% ({}/{} frames)",
                progress.fraction() * 100.0,
                processed,
                total
            );
        }
    }
}

/// Who asked for a segment. Only the full run reports milestones.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PreloadMode {
    OnDemand,
    Full,
}

impl PreloadMode {
    fn announces_progress(self) -> bool {
        self == PreloadMode::Full
    }
}
