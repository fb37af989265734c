//! Video metadata.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Immutable facts about the opened video, captured once per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct VideoMetadata {
    /// Source file path as given by the caller.
    pub path: String,
    /// Duration in seconds (0 when the container reports no frame count).
    pub duration_sec: f64,
    /// Frame rate; a non-positive reported rate is substituted with 30.
    pub fps: f64,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metadata_roundtrip() {
        let meta = VideoMetadata {
            path: "clip.mp4".to_string(),
            duration_sec: 12.5,
            fps: 29.97,
            width: 1920,
            height: 1080,
        };
        let json = serde_json::to_string(&meta).unwrap();
        let back: VideoMetadata = serde_json::from_str(&json).unwrap();
        assert_eq!(meta, back);
    }
}
