//! Frame extraction from a hidden, independently seekable copy of the media.
//!
//! The hidden resource has a single playback position, so every request goes
//! through one async mutex. Hover lookups and background preloads queue behind
//! each other in arrival order instead of fighting over the position.

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use image::codecs::jpeg::JpegEncoder;
use image::imageops::{self, FilterType};
use image::{DynamicImage, ExtendedColorType, RgbaImage};
use tokio::sync::Mutex;

use super::cache::{CachedFrame, TimeBucket};
use super::error::PreviewError;
use super::PreviewContext;
use crate::config::PreviewConfig;
use crate::media::{MediaSource, SourceId};

/// A decodable media resource that can be positioned and rasterized.
///
/// Implementations own platform decoding state; the frame decoder guarantees
/// at most one call in flight at a time.
pub trait MediaSession: Send + 'static {
    /// Point the resource at `source` and wait until it has decodable data.
    fn attach(
        &mut self,
        source: &MediaSource,
    ) -> impl Future<Output = Result<(), PreviewError>> + Send;

    /// Move to `timestamp` and resolve once the resource confirms the seek.
    fn seek_to(&mut self, timestamp: f64)
        -> impl Future<Output = Result<(), PreviewError>> + Send;

    /// The visual frame at the current position.
    fn current_frame(&mut self) -> Result<RgbaImage, PreviewError>;

    fn detach(&mut self);
}

struct DecoderSession<S> {
    media: S,
    attached: Option<SourceId>,
    surface: RgbaImage,
}

impl<S: MediaSession> DecoderSession<S> {
    async fn ensure_attached(
        &mut self,
        source: &MediaSource,
        timeout: Duration,
        timestamp: f64,
    ) -> Result<(), PreviewError> {
        if self.attached.as_ref() == Some(&source.id) {
            return Ok(());
        }
        if self.attached.take().is_some() {
            self.media.detach();
        }

        match tokio::time::timeout(timeout, self.media.attach(source)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(PreviewError::DecodeTimeout {
                    timestamp,
                    after: timeout,
                })
            }
        }
        self.attached = Some(source.id.clone());
        Ok(())
    }

    /// Draw `frame` onto the reusable surface, scaling to the surface size.
    fn rasterize(&mut self, frame: &RgbaImage, (width, height): (u32, u32)) {
        if self.surface.dimensions() != (width, height) {
            self.surface = RgbaImage::new(width, height);
        }
        if frame.dimensions() == (width, height) {
            self.surface.copy_from_slice(frame.as_raw());
        } else {
            let scaled = imageops::resize(frame, width, height, FilterType::Triangle);
            self.surface.copy_from_slice(scaled.as_raw());
        }
    }
}

pub struct FrameDecoder<S> {
    ctx: PreviewContext,
    session: Mutex<DecoderSession<S>>,
    timeout: Duration,
    surface_size: (u32, u32),
    jpeg_quality: u8,
    decoded: AtomicU64,
}

impl<S: MediaSession> FrameDecoder<S> {
    pub fn new(ctx: PreviewContext, media: S, config: &PreviewConfig) -> Self {
        let (width, height) = config.surface_size();
        Self {
            ctx,
            session: Mutex::new(DecoderSession {
                media,
                attached: None,
                surface: RgbaImage::new(width, height),
            }),
            timeout: config.decode_timeout(),
            surface_size: (width, height),
            jpeg_quality: config.jpeg_quality.clamp(1, 100),
            decoded: AtomicU64::new(0),
        }
    }

    /// Decode, encode and cache the frame at `timestamp`.
    ///
    /// Waits for any decode already in flight. Nothing is cached on failure,
    /// or when the media was replaced while the frame was being produced.
    pub async fn decode_frame(
        &self,
        source: &MediaSource,
        timestamp: f64,
    ) -> Result<CachedFrame, PreviewError> {
        let generation = self.ctx.generation();
        let mut session = self.session.lock().await;
        session
            .ensure_attached(source, self.timeout, timestamp)
            .await?;

        match tokio::time::timeout(self.timeout, session.media.seek_to(timestamp)).await {
            Ok(result) => result?,
            Err(_) => {
                return Err(PreviewError::DecodeTimeout {
                    timestamp,
                    after: self.timeout,
                })
            }
        }

        let frame = session.media.current_frame()?;
        if frame.width() == 0 || frame.height() == 0 {
            return Err(PreviewError::failure(timestamp, "empty frame"));
        }
        session.rasterize(&frame, self.surface_size);

        let data = encode_jpeg(&session.surface, self.jpeg_quality)
            .map_err(|e| PreviewError::failure(timestamp, e.to_string()))?;
        drop(session);

        let cached = CachedFrame::new(TimeBucket::from_secs(timestamp), data);
        if self.ctx.generation() == generation {
            self.ctx.cache().insert(cached.clone());
        }
        self.decoded.fetch_add(1, Ordering::Relaxed);
        Ok(cached)
    }

    /// Release the hidden resource. The next decode re-attaches.
    pub async fn detach(&self) {
        let mut session = self.session.lock().await;
        if session.attached.take().is_some() {
            session.media.detach();
        }
    }

    /// Number of frames decoded since creation.
    pub fn decoded_count(&self) -> u64 {
        self.decoded.load(Ordering::Relaxed)
    }
}

fn encode_jpeg(surface: &RgbaImage, quality: u8) -> Result<Vec<u8>, image::ImageError> {
    // JPEG has no alpha channel
    let rgb = DynamicImage::ImageRgba8(surface.clone()).into_rgb8();
    let mut out = Vec::with_capacity(rgb.as_raw().len() / 8);
    JpegEncoder::new_with_quality(&mut out, quality).encode(
        rgb.as_raw(),
        rgb.width(),
        rgb.height(),
        ExtendedColorType::Rgb8,
    )?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::testing::{source, ScriptedSession};
    use std::sync::Arc;

    fn decoder(session: ScriptedSession) -> (PreviewContext, FrameDecoder<ScriptedSession>) {
        let config = PreviewConfig::default();
        let ctx = PreviewContext::new(&config);
        let decoder = FrameDecoder::new(ctx.clone(), session, &config);
        (ctx, decoder)
    }

    #[tokio::test]
    async fn test_decode_populates_cache() {
        let session = ScriptedSession::new();
        let log = session.log();
        let (ctx, decoder) = decoder(session);

        let frame = decoder.decode_frame(&source("a"), 7.3).await.unwrap();
        assert_eq!(frame.bucket.as_secs(), 7.0);
        // JPEG SOI marker
        assert_eq!(&frame.data[..2], &[0xFF, 0xD8]);

        assert_eq!(ctx.cache().get(7.4).cloned(), Some(frame));
        assert_eq!(log.seeks(), vec![7.3]);
        assert_eq!(log.attach_count(), 1);
        assert_eq!(decoder.decoded_count(), 1);
    }

    #[tokio::test]
    async fn test_attaches_once_per_source() {
        let session = ScriptedSession::new();
        let log = session.log();
        let (_ctx, decoder) = decoder(session);

        decoder.decode_frame(&source("a"), 1.0).await.unwrap();
        decoder.decode_frame(&source("a"), 2.0).await.unwrap();
        assert_eq!(log.attach_count(), 1);

        decoder.decode_frame(&source("b"), 3.0).await.unwrap();
        assert_eq!(log.attach_count(), 2);
        assert_eq!(log.detach_count(), 1);

        decoder.detach().await;
        decoder.decode_frame(&source("b"), 4.0).await.unwrap();
        assert_eq!(log.attach_count(), 3);
    }

    #[tokio::test]
    async fn test_failure_leaves_cache_untouched() {
        let session = ScriptedSession::new().fail_at(2.0);
        let (ctx, decoder) = decoder(session);

        let err = decoder.decode_frame(&source("a"), 2.0).await.unwrap_err();
        assert!(matches!(err, PreviewError::DecodeFailure { .. }));
        assert!(ctx.cache().is_empty());
        assert_eq!(decoder.decoded_count(), 0);

        // The session is still usable afterwards
        assert!(decoder.decode_frame(&source("a"), 2.5).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_seek_times_out() {
        let session = ScriptedSession::new().hang_at(4.0);
        let (ctx, decoder) = decoder(session);

        let err = decoder.decode_frame(&source("a"), 4.0).await.unwrap_err();
        assert_eq!(
            err,
            PreviewError::DecodeTimeout {
                timestamp: 4.0,
                after: Duration::from_millis(2000),
            }
        );
        assert!(ctx.cache().get(4.0).is_none());
        assert!(decoder.decode_frame(&source("a"), 4.5).await.is_ok());
    }

    #[tokio::test]
    async fn test_concurrent_requests_are_serialized() {
        let session = ScriptedSession::new();
        let log = session.log();
        let (_ctx, decoder) = decoder(session);
        let decoder = Arc::new(decoder);

        let mut handles = Vec::new();
        for i in 0..6 {
            let decoder = decoder.clone();
            handles.push(tokio::spawn(async move {
                decoder.decode_frame(&source("a"), i as f64).await
            }));
        }
        for handle in handles {
            assert!(handle.await.unwrap().is_ok());
        }
        assert_eq!(log.max_in_flight(), 1);
        assert_eq!(log.seeks().len(), 6);
    }

    #[tokio::test]
    async fn test_surface_is_scaled_to_configured_size() {
        let session = ScriptedSession::new().frame_size(64, 48);
        let (_ctx, decoder) = decoder(session);

        let frame = decoder.decode_frame(&source("a"), 0.0).await.unwrap();
        let decoded = image::load_from_memory(&frame.data).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (320, 180));
    }
}
