//! Pure scoring functions over customer profiles: RFM scores and segments,
//! and lifecycle stage classification.

pub mod lifecycle;
pub mod rfm;

pub use lifecycle::LifecycleClassifier;
pub use rfm::{classify_segment, RfmScore, RfmScorer};
