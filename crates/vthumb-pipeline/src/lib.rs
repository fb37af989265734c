//! Single-run thumbnail-candidate pipeline.
//!
//! A [`session::Session`] drives one video through sampling, scoring,
//! diverse top-K selection, neighbor fetching, and manifest emission:
//!
//! ```text
//! Video file
//!     │  seek + decode at generated timestamps
//!     ▼
//! [Metrics engine]  ── ten raw metrics + faces per frame
//!     │  corpus normalize + weighted score
//!     ▼
//! [Hard gates] ──► [Greedy diverse ranker] ──► top K
//!     │                                          │
//!     ▼                                          ▼
//! frames/f_*.png                       [Neighbor fetch] + candidates/c_*.png
//!                                                │
//!                                                ▼
//!                                          manifest.json
//! ```

pub mod error;
pub mod manifest;
pub mod neighbors;
pub mod progress;
pub mod ranker;
pub mod timestamps;

#[cfg(feature = "opencv")]
pub mod session;

pub use error::{PipelineError, PipelineResult};
pub use manifest::suggested_crop;
pub use neighbors::default_offsets;
pub use progress::{log_progress, noop_progress, ProgressCallback, ProgressEvent, Stage};
pub use ranker::{select_diverse, RankCandidate};
pub use timestamps::sample_times;

#[cfg(feature = "opencv")]
pub use session::{Session, SessionStats};
