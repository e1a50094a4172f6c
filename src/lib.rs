//! Local video player with live scrub previews.
//!
//! The scrub-preview pipeline lives in [`preview`]; [`player`] drives the
//! visible video and [`ffmpeg`] talks to the external binaries.

pub mod config;
pub mod ffmpeg;
pub mod media;
pub mod player;
pub mod preview;
pub mod storage;
pub mod utils;
