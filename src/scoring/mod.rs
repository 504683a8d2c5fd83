//! Rule-based document scores and their aggregation.

pub mod ci;
pub mod gw;
pub mod spi;
pub mod vui;

pub use ci::{ci_light, ConsistencyResult};
pub use gw::{aggregate_gw, hybrid_spi, Bands, GwResult, Weights};
pub use spi::{compute_spi_rule, is_specific, SpecificityResult};
pub use vui::{compute_vui, VagueIndexResult};
