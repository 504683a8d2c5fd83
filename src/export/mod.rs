pub mod json_export;
pub mod text_export;

use anyhow::Result;

use crate::pipeline::RunArtifacts;

pub use json_export::{write_json_file, JsonExporter};
pub use text_export::TextExporter;

pub trait Exporter {
    fn export(&self, run: &RunArtifacts) -> Result<()>;
}
