//! Target-driven compression search and its supporting pieces

pub mod cancel;
pub mod candidate;
pub mod estimator;
pub mod progress;
pub mod search;

pub use cancel::CancelToken;
pub use candidate::{Candidate, CandidateSlot};
pub use estimator::estimate_start;
pub use progress::{ChannelSink, NullSink, ProgressSink};
pub use search::{default_output_path, CompressRequest, Compressor};
