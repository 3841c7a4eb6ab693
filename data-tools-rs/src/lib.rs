//! # Data Tools SDK
//!
//! Collaborator implementations for the data analyst agent.
//!
//! This crate provides:
//!
//! - `TabularData`: the raw-table interchange type shared by all collaborators
//! - `TableSource`: the source-acquisition trait, with an HTTP-backed client
//! - `QuestionAnswerer`: the free-form answering trait, with a declining stub
//! - Analysis operations over tabular data (counts, extrema, correlation,
//!   regression slope)
//! - `ChartRenderer`: the visualization trait, with a size-capped SVG renderer
//! - `ToolError`: the error system shared by all of the above
//!
//! The orchestration core treats everything here as a replaceable collaborator
//! behind a trait; the implementations are intentionally thin.

pub mod error;
pub use error::{Result, ToolError};

pub mod table;
pub use table::TabularData;

pub mod source;
pub use source::{HttpTableClient, SourceRef, TableSource};

pub mod analysis;
pub use analysis::{run_operation, AnalysisOp};

pub mod answer;
pub use answer::{QuestionAnswerer, UnroutedAnswerer};

pub mod chart;
pub use chart::{ChartRenderer, ChartSpec, EncodedImage, SvgChartRenderer, MAX_ENCODED_IMAGE_BYTES};
