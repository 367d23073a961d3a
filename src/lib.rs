//! Deterministic CSV cleaning and summary pipeline:
//! load → profile → assess → clean → summarize/export.

pub mod cleaner;
pub mod config;
pub mod error;
pub mod loader;
pub mod output;
pub mod pipeline;
pub mod profiler;
pub mod quality;
pub mod reports;
pub mod table;
pub mod types;
pub mod util;

pub use config::PipelineConfig;
pub use error::{PipelineError, Result};
pub use pipeline::{Pipeline, RunOutcome};
pub use table::{Column, ColumnKind, Table, Value};
