pub mod calibration;
pub mod core;
pub mod export;
pub mod nli;
pub mod parser;
pub mod pipeline;
pub mod scoring;
pub mod sectioning;

pub use crate::core::config::ScoringConfig;
pub use crate::core::model::{Band, LabeledExample, Page, Sentence};
