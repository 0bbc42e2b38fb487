//! ComptoxAI data sources.
//!
//! Readers for the dataset dumps, one [`SourceImporter`] per source, the
//! JSON pipeline configuration that wires them together, and TSV feature
//! export over a built graph.
//!
//! ```text
//!   hetionet ──▶ ctd ──┬─▶ epa
//!                      └─▶ aopwiki
//!   table sources        (declared in the pipeline config)
//! ```
//!
//! [`SourceImporter`]: comptox_build::SourceImporter

pub mod aopwiki;
pub mod config;
pub mod ctd;
pub mod declarative;
pub mod epa;
pub mod export;
pub mod hetionet;
pub mod ids;
pub mod json;
pub mod table;

pub use aopwiki::AopWikiImporter;
pub use config::{PipelineConfig, SourceConfig, SourceEntry};
pub use ctd::{CtdImporter, CtdOptions};
pub use declarative::{TableImporter, TableSourceConfig};
pub use epa::{EpaFiles, EpaImporter};
pub use hetionet::HetionetImporter;
pub use table::{HeaderMode, Row, Table, TableSpec};
