//! Content analysis over fetched pages
//!
//! Everything here is side-effect free and operates on a parsed page or on
//! plain text, so it can run concurrently for independent targets:
//! - `normalize`: canonical text form used for all comparisons
//! - `ContentCollector`: gathers every searchable string from a page
//! - `matcher`: substring matching of normalized terms against content
//! - `DetailExtractor`: best-effort location of a matched term on the page

pub mod collector;
pub mod details;
pub mod matcher;
mod normalize;

pub use collector::ContentCollector;
pub use details::DetailExtractor;
pub use normalize::{normalize, TEXT_LIMIT};
