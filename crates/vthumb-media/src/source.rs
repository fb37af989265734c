//! Video source capability and its OpenCV backing.

use std::path::Path;

use opencv::{
    core::Mat,
    prelude::*,
    videoio::{
        VideoCapture, CAP_ANY, CAP_PROP_FPS, CAP_PROP_FRAME_COUNT, CAP_PROP_FRAME_HEIGHT,
        CAP_PROP_FRAME_WIDTH, CAP_PROP_POS_MSEC,
    },
};
use tracing::{debug, warn};

use vthumb_models::VideoMetadata;

use crate::error::{MediaError, MediaResult};

/// Substitute frame rate when the container reports a bogus one.
const FALLBACK_FPS: f64 = 30.0;

/// Seekable decoded-frame provider.
///
/// Opening can fail; reading cannot. A seek that lands past the end of
/// the stream (or any per-frame decode hiccup) yields `None` and the
/// caller skips that timestamp.
pub trait VideoSource {
    /// Facts captured when the source was opened.
    fn metadata(&self) -> &VideoMetadata;

    /// Seek to an absolute time and read one decoded BGR frame.
    fn seek_and_read(&mut self, time_sec: f64) -> MediaResult<Option<Mat>>;
}

/// `VideoSource` over an OpenCV `VideoCapture`.
pub struct OpenCvVideoSource {
    capture: VideoCapture,
    metadata: VideoMetadata,
}

impl OpenCvVideoSource {
    /// Open a video file and capture its metadata.
    pub fn open(path: impl AsRef<Path>) -> MediaResult<Self> {
        let path = path.as_ref();
        let path_str = path.to_string_lossy();

        let capture = VideoCapture::from_file(&path_str, CAP_ANY)
            .map_err(|e| MediaError::open_failed(path, e.to_string()))?;
        if !capture.is_opened().unwrap_or(false) {
            return Err(MediaError::open_failed(path, "no decoder backend could open the file"));
        }

        let mut fps = capture.get(CAP_PROP_FPS).unwrap_or(0.0);
        if fps <= 0.0 {
            warn!(path = %path.display(), "Container reports no frame rate; assuming {FALLBACK_FPS}");
            fps = FALLBACK_FPS;
        }
        let frame_count = capture.get(CAP_PROP_FRAME_COUNT).unwrap_or(0.0);
        let duration_sec = if frame_count > 0.0 { frame_count / fps } else { 0.0 };
        let width = capture.get(CAP_PROP_FRAME_WIDTH).unwrap_or(0.0) as u32;
        let height = capture.get(CAP_PROP_FRAME_HEIGHT).unwrap_or(0.0) as u32;

        debug!(
            path = %path.display(),
            duration = format!("{duration_sec:.2}"),
            fps = format!("{fps:.2}"),
            width,
            height,
            "Video opened"
        );

        Ok(Self {
            capture,
            metadata: VideoMetadata {
                path: path.display().to_string(),
                duration_sec,
                fps,
                width,
                height,
            },
        })
    }
}

impl VideoSource for OpenCvVideoSource {
    fn metadata(&self) -> &VideoMetadata {
        &self.metadata
    }

    fn seek_and_read(&mut self, time_sec: f64) -> MediaResult<Option<Mat>> {
        if let Err(e) = self.capture.set(CAP_PROP_POS_MSEC, time_sec * 1000.0) {
            warn!("Seek to {time_sec:.3}s failed: {e}");
            return Ok(None);
        }

        let mut frame = Mat::default();
        match self.capture.read(&mut frame) {
            Ok(true) if !frame.empty() => Ok(Some(frame)),
            Ok(_) => Ok(None),
            Err(e) => {
                warn!("Read at {time_sec:.3}s failed: {e}");
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_missing_file_fails() {
        let result = OpenCvVideoSource::open("/definitely/not/a/video.mp4");
        assert!(matches!(result, Err(MediaError::OpenFailed { .. })));
    }
}
