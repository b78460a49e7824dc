pub mod dedupe;
pub mod document;
pub mod extract;
pub mod feeds;
pub mod fetcher;
pub mod normalize;
pub mod pipeline;

pub use pipeline::Pipeline;

pub mod prelude {
    pub use super::feeds::FeedsConfig;
    pub use super::pipeline::Pipeline;
    pub use nw_core::{Article, Error, Result};
}
