//! Noise filtering and relevancy ranking

pub mod patterns;

mod noise;
mod scorer;

pub use noise::NoiseFilter;
pub use scorer::{RelevancyScorer, ScoredFile};
