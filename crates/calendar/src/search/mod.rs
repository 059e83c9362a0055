//! Event search built on the timeline

mod engine;
mod model;

pub use engine::SearchEngine;
pub use model::SearchModel;
