//! Re-ranking module
pub mod scorer;

pub use scorer::{RankedChunk, RankingStrategy, ReRankConfig, ReRanker};
