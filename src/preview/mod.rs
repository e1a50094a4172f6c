//! Scrub preview: thumbnails for arbitrary timestamps while hovering the seek bar.
//!
//! Frames come from a hidden copy of the media ([`FrameDecoder`]), are cached
//! per half-second ([`FrameCache`]) and prefetched a segment at a time
//! ([`PreloadScheduler`]). The UI only talks to [`ScrubController`].

mod cache;
mod decoder;
mod error;
mod scheduler;
mod scrub;
mod segments;

pub use cache::*;
pub use decoder::*;
pub use error::*;
pub use scheduler::*;
pub use scrub::*;
pub use segments::*;

use crate::config::PreviewConfig;
use crate::media::MediaHandle;
use parking_lot::{Mutex, MutexGuard, RwLock};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// State shared by the preview components. Cloning shares it.
#[derive(Clone)]
pub struct PreviewContext {
    cache: Arc<Mutex<FrameCache>>,
    segments: Arc<Mutex<SegmentTracker>>,
    media: Arc<RwLock<Option<MediaHandle>>>,
    progress: Arc<Progress>,
    generation: Arc<AtomicU64>,
}

impl PreviewContext {
    pub fn new(config: &PreviewConfig) -> Self {
        Self {
            cache: Arc::new(Mutex::new(FrameCache::new(config.max_cached_frames))),
            segments: Arc::new(Mutex::new(SegmentTracker::new(config.segment_length_secs))),
            media: Arc::new(RwLock::new(None)),
            progress: Arc::new(Progress::default()),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn cache(&self) -> MutexGuard<'_, FrameCache> {
        self.cache.lock()
    }

    pub fn segments(&self) -> MutexGuard<'_, SegmentTracker> {
        self.segments.lock()
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    pub fn media(&self) -> Option<MediaHandle> {
        self.media.read().clone()
    }

    /// Changes every time the media is replaced or unloaded.
    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Swap the media and drop everything derived from the previous one.
    pub fn replace_media(&self, media: Option<MediaHandle>) {
        // Written before the generation moves: a reader that sees the new
        // generation also sees the new media
        *self.media.write() = media;
        self.reset(0);
    }

    /// Drop every cached frame and completed segment and start counting
    /// progress towards `total`. Work started before the reset is cancelled.
    pub fn reset(&self, total: u64) {
        let mut segments = self.segments.lock();
        self.generation.fetch_add(1, Ordering::AcqRel);
        self.cache.lock().clear();
        segments.reset();
        self.progress.reset(total);
    }

    /// Mark `index` complete unless a reset happened since `generation`.
    pub fn mark_segment_complete(&self, index: u64, generation: u64) -> bool {
        let mut segments = self.segments.lock();
        if self.generation() != generation {
            return false;
        }
        segments.mark_complete(index);
        true
    }
}
