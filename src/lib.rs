//! trendflow - trending hashtags and sentiment over a live stream of posts

pub mod pipeline;

pub use pipeline::{
    Pipeline, PipelineConfig, PipelineError, PipelineHandle, PipelineStats, ShutdownStrategy,
    Summary,
};
