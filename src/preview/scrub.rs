use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::task::{AbortHandle, JoinHandle};
use tokio::time::Instant;
use tracing::debug;

use super::cache::CachedFrame;
use super::decoder::{FrameDecoder, MediaSession};
use super::error::PreviewError;
use super::scheduler::{PreloadScheduler, PreprocessReport, Progress};
use super::PreviewContext;
use crate::config::PreviewConfig;
use crate::media::MediaHandle;
use crate::utils::time::format_clock;

/// Preview width for wide (>= 1.77) media.
pub const WIDE_PREVIEW_WIDTH: f32 = 340.0;
pub const NARROW_PREVIEW_WIDTH: f32 = 260.0;

pub fn preview_width(aspect_ratio: f64) -> f32 {
    if aspect_ratio >= 1.77 {
        WIDE_PREVIEW_WIDTH
    } else {
        NARROW_PREVIEW_WIDTH
    }
}

/// Horizontal placement of the seek bar on screen.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SeekBarGeometry {
    pub left: f32,
    pub width: f32,
}

impl SeekBarGeometry {
    pub fn new(left: f32, width: f32) -> Self {
        Self { left, width }
    }

    /// Pointer position as a fraction of the bar, clamped to `[0, 1]`.
    pub fn fraction(&self, pointer_x: f32) -> f64 {
        if self.width <= 0.0 {
            return 0.0;
        }
        ((pointer_x - self.left) as f64 / self.width as f64).clamp(0.0, 1.0)
    }

    pub fn time_at(&self, pointer_x: f32, duration: f64) -> f64 {
        if self.width <= 0.0 {
            return 0.0;
        }
        let width = self.width as f64;
        let offset = ((pointer_x - self.left) as f64).clamp(0.0, width);
        offset * duration / width
    }
}

/// Lets one call through per interval.
#[derive(Debug)]
pub struct Throttle {
    interval: Duration,
    last: Mutex<Option<Instant>>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last: Mutex::new(None),
        }
    }

    pub fn ready(&self) -> bool {
        let now = Instant::now();
        let mut last = self.last.lock();
        match *last {
            Some(prev) if now.duration_since(prev) < self.interval => false,
            _ => {
                *last = Some(now);
                true
            }
        }
    }
}

/// What the seek-bar tooltip should show.
#[derive(Debug, Clone, PartialEq)]
pub struct PreviewPayload {
    pub timestamp: f64,
    /// JPEG bytes
    pub image: Arc<[u8]>,
    pub label: String,
    /// Left edge of the preview box, in the same space as the pointer.
    pub left: f32,
    pub width: f32,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HoverOutcome {
    Throttled,
    NoMedia,
    Shown(PreviewPayload),
    /// The frame could not be produced; show no thumbnail.
    Unavailable { timestamp: f64 },
}

/// Entry point for the UI: hover, leave and media lifecycle.
pub struct ScrubController<S> {
    ctx: PreviewContext,
    decoder: Arc<FrameDecoder<S>>,
    scheduler: Arc<PreloadScheduler<S>>,
    geometry: Mutex<SeekBarGeometry>,
    throttle: Throttle,
    visible: AtomicBool,
    preprocessing: Mutex<Option<AbortHandle>>,
}

impl<S: MediaSession> ScrubController<S> {
    pub fn new(session: S, config: &PreviewConfig) -> Self {
        let ctx = PreviewContext::new(config);
        let decoder = Arc::new(FrameDecoder::new(ctx.clone(), session, config));
        let scheduler = Arc::new(PreloadScheduler::new(ctx.clone(), decoder.clone()));
        Self {
            ctx,
            decoder,
            scheduler,
            geometry: Mutex::new(SeekBarGeometry::default()),
            throttle: Throttle::new(config.hover_throttle()),
            visible: AtomicBool::new(false),
            preprocessing: Mutex::new(None),
        }
    }

    pub fn context(&self) -> &PreviewContext {
        &self.ctx
    }

    pub fn progress(&self) -> &Progress {
        self.ctx.progress()
    }

    pub fn media(&self) -> Option<MediaHandle> {
        self.ctx.media()
    }

    /// Fully preloaded parts of the timeline as `[start, end)` fractions of
    /// the duration. Frames decoded outside complete segments are not shown.
    pub fn preprocessed_spans(&self) -> Vec<(f32, f32)> {
        let Some(media) = self.ctx.media() else {
            return Vec::new();
        };
        if media.duration <= 0.0 {
            return Vec::new();
        }
        self.ctx
            .segments()
            .completed_spans(media.duration)
            .into_iter()
            .map(|(start, end)| ((start / media.duration) as f32, (end / media.duration) as f32))
            .collect()
    }

    pub fn set_geometry(&self, geometry: SeekBarGeometry) {
        *self.geometry.lock() = geometry;
    }

    pub fn geometry(&self) -> SeekBarGeometry {
        *self.geometry.lock()
    }

    pub fn is_visible(&self) -> bool {
        self.visible.load(Ordering::Acquire)
    }

    /// Serve the frame under the pointer, decoding it on a cache miss, then
    /// warm the surrounding segments in the background.
    pub async fn on_hover(&self, pointer_x: f32, movement_x: f32) -> HoverOutcome {
        if !self.throttle.ready() {
            return HoverOutcome::Throttled;
        }
        let Some(media) = self.ctx.media() else {
            return HoverOutcome::NoMedia;
        };
        let timestamp = self.geometry().time_at(pointer_x, media.duration);
        self.visible.store(true, Ordering::Release);

        let frame = match self.frame_at(timestamp).await {
            Ok(frame) => Some(frame),
            Err(e) => {
                debug!("No preview at {:.2}s: {}", timestamp, e);
                None
            }
        };

        let scheduler = self.scheduler.clone();
        tokio::spawn(async move {
            scheduler.predictive_preload_at(timestamp, movement_x).await;
        });

        let Some(frame) = frame else {
            return HoverOutcome::Unavailable { timestamp };
        };
        let width = preview_width(media.aspect_ratio());
        HoverOutcome::Shown(PreviewPayload {
            timestamp,
            image: frame.data,
            label: format_clock(timestamp),
            left: pointer_x - width / 2.0,
            width,
        })
    }

    /// The cached frame for `timestamp`, decoding it on a miss.
    pub async fn frame_at(&self, timestamp: f64) -> Result<CachedFrame, PreviewError> {
        let media = self.ctx.media().ok_or(PreviewError::NoMedia)?;
        let cached = self.ctx.cache().get(timestamp).cloned();
        match cached {
            Some(frame) => Ok(frame),
            None => self.decoder.decode_frame(&media.source, timestamp).await,
        }
    }

    pub fn on_leave(&self) {
        self.visible.store(false, Ordering::Release);
    }

    /// Replace the media and start preprocessing it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn load_media(&self, media: MediaHandle) -> JoinHandle<PreprocessReport> {
        self.abort_preprocessing();
        self.visible.store(false, Ordering::Release);
        self.ctx.replace_media(Some(media));
        self.initialize_full_preprocessing()
    }

    /// Decode the whole timeline in the background, replacing any run in progress.
    pub fn initialize_full_preprocessing(&self) -> JoinHandle<PreprocessReport> {
        self.abort_preprocessing();
        let scheduler = self.scheduler.clone();
        let task = tokio::spawn(async move { scheduler.run_full_preprocessing().await });
        *self.preprocessing.lock() = Some(task.abort_handle());
        task
    }

    pub async fn unload(&self) {
        self.abort_preprocessing();
        self.visible.store(false, Ordering::Release);
        self.ctx.replace_media(None);
        self.decoder.detach().await;
    }

    fn abort_preprocessing(&self) {
        if let Some(task) = self.preprocessing.lock().take() {
            task.abort();
        }
    }
}

impl<S> Drop for ScrubController<S> {
    fn drop(&mut self) {
        if let Some(task) = self.preprocessing.get_mut().take() {
            task.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::media::MediaHandle;
    use crate::preview::testing::{handle, source, ScriptedSession};

    fn controller(session: ScriptedSession, media: Option<MediaHandle>) -> ScrubController<ScriptedSession> {
        let controller = ScrubController::new(session, &PreviewConfig::default());
        controller.set_geometry(SeekBarGeometry::new(0.0, 600.0));
        if let Some(media) = media {
            controller.context().replace_media(Some(media));
        }
        controller
    }

    #[test]
    fn test_geometry_clamps() {
        let geometry = SeekBarGeometry::new(100.0, 400.0);
        assert_eq!(geometry.fraction(50.0), 0.0);
        assert_eq!(geometry.fraction(300.0), 0.5);
        assert_eq!(geometry.fraction(900.0), 1.0);
        assert_eq!(geometry.time_at(300.0, 60.0), 30.0);
        assert_eq!(geometry.time_at(900.0, 60.0), 60.0);
        assert_eq!(SeekBarGeometry::new(0.0, 0.0).time_at(10.0, 60.0), 0.0);
    }

    #[test]
    fn test_preview_width_by_aspect() {
        assert_eq!(preview_width(16.0 / 9.0), 340.0);
        assert_eq!(preview_width(4.0 / 3.0), 260.0);
        assert_eq!(preview_width(9.0 / 16.0), 260.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_miss_then_hit() {
        let session = ScriptedSession::new();
        let log = session.log();
        let controller = controller(session, Some(handle("clip", 60.0)));

        let first = controller.on_hover(73.0, 0.0).await;
        let first = match first {
            HoverOutcome::Shown(payload) => payload,
            other => panic!("expected a preview, got {other:?}"),
        };
        assert_eq!(first.timestamp, 7.3);
        assert_eq!(log.seeks_at(7.3), 1);
        assert!(controller.context().cache().get(7.0).is_some());
        assert!(controller.is_visible());

        tokio::time::advance(Duration::from_millis(60)).await;
        let second = controller.on_hover(74.0, 0.0).await;
        let second = match second {
            HoverOutcome::Shown(payload) => payload,
            other => panic!("expected a preview, got {other:?}"),
        };
        assert_eq!(second.image, first.image);
        assert_eq!(log.seeks_at(7.3), 1);
        assert_eq!(log.seeks_at(7.4), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hover_is_throttled() {
        let controller = controller(ScriptedSession::new(), Some(handle("clip", 60.0)));

        assert!(matches!(controller.on_hover(100.0, 1.0).await, HoverOutcome::Shown(_)));
        assert_eq!(controller.on_hover(101.0, 1.0).await, HoverOutcome::Throttled);

        tokio::time::advance(Duration::from_millis(50)).await;
        assert!(matches!(controller.on_hover(102.0, 1.0).await, HoverOutcome::Shown(_)));
    }

    #[tokio::test]
    async fn test_payload_label_and_position() {
        let controller = controller(ScriptedSession::new(), Some(handle("clip", 600.0)));

        let HoverOutcome::Shown(payload) = controller.on_hover(75.0, 0.0).await else {
            panic!("expected a preview");
        };
        assert_eq!(payload.label, "1:15");
        assert_eq!(payload.width, 340.0);
        assert_eq!(payload.left, 75.0 - 170.0);
    }

    #[tokio::test]
    async fn test_portrait_media_uses_narrow_preview() {
        let portrait = MediaHandle::new(source("tall"), 60.0, 1080, 1920);
        let controller = controller(ScriptedSession::new(), Some(portrait));

        let HoverOutcome::Shown(payload) = controller.on_hover(300.0, 0.0).await else {
            panic!("expected a preview");
        };
        assert_eq!(payload.width, 260.0);
        assert_eq!(payload.left, 170.0);
        assert_eq!(payload.label, "0:30");
    }

    #[tokio::test(start_paused = true)]
    async fn test_decode_failure_degrades_to_no_thumbnail() {
        let session = ScriptedSession::new().fail_at(7.0);
        let controller = controller(session, Some(handle("clip", 60.0)));

        assert_eq!(
            controller.on_hover(73.0, 0.0).await,
            HoverOutcome::Unavailable { timestamp: 7.3 }
        );

        tokio::time::advance(Duration::from_millis(60)).await;
        assert!(matches!(controller.on_hover(200.0, 0.0).await, HoverOutcome::Shown(_)));
    }

    #[tokio::test]
    async fn test_no_media_and_leave() {
        let controller = controller(ScriptedSession::new(), None);
        assert_eq!(controller.on_hover(10.0, 0.0).await, HoverOutcome::NoMedia);
        assert!(!controller.is_visible());

        controller.context().replace_media(Some(handle("clip", 60.0)));
        tokio::time::sleep(Duration::from_millis(60)).await;
        controller.on_hover(10.0, 0.0).await;
        assert!(controller.is_visible());
        controller.on_leave();
        assert!(!controller.is_visible());
    }

    #[tokio::test]
    async fn test_frame_at_without_media() {
        let controller = controller(ScriptedSession::new(), None);
        assert_eq!(controller.frame_at(3.0).await.unwrap_err(), PreviewError::NoMedia);
    }

    #[tokio::test]
    async fn test_load_media_preprocesses_everything() {
        let controller = controller(ScriptedSession::new(), None);

        let report = controller.load_media(handle("clip", 12.0)).await.unwrap();
        assert_eq!(report.completed, 3);
        assert!(!report.cancelled);
        assert_eq!(controller.context().cache().len(), 24);
        assert_eq!(controller.progress().fraction(), 1.0);
    }

    #[tokio::test]
    async fn test_reload_aborts_previous_preprocessing() {
        let controller = controller(ScriptedSession::new(), None);

        let first = controller.load_media(handle("long", 600.0));
        let second = controller.load_media(handle("short", 12.0));

        assert!(first.await.unwrap_err().is_cancelled());
        let report = second.await.unwrap();
        assert_eq!(report.completed, 3);
        assert_eq!(controller.media().map(|m| m.source.id.to_string()), Some("short".into()));
        assert_eq!(controller.context().cache().len(), 24);
    }

    #[tokio::test]
    async fn test_preprocessed_spans_follow_completed_segments() {
        let controller = controller(ScriptedSession::new(), Some(handle("clip", 20.0)));
        assert!(controller.preprocessed_spans().is_empty());

        // A lone hover preload in the middle does not paint the start
        controller.scheduler.preload_segment(10.0).await;
        assert_eq!(controller.preprocessed_spans(), vec![(0.5, 0.75)]);

        let report = controller.initialize_full_preprocessing().await.unwrap();
        assert_eq!(report.completed, 4);
        assert_eq!(controller.preprocessed_spans(), vec![(0.0, 1.0)]);
    }

    #[tokio::test]
    async fn test_unload_clears_and_detaches() {
        let session = ScriptedSession::new();
        let log = session.log();
        let controller = controller(session, None);

        controller.load_media(handle("clip", 12.0)).await.unwrap();
        controller.unload().await;

        assert!(controller.media().is_none());
        assert!(controller.context().cache().is_empty());
        assert_eq!(controller.context().segments().completed_count(), 0);
        assert_eq!(log.detach_count(), 1);
    }
}
