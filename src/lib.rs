//! Digital Balance - Composition-based balance scoring for daily screen time
//!
//! Turns per-user daily screen-time records into a Digital Balance Index (DBI)
//! through a deterministic pipeline: validation → share and entropy scoring →
//! tiering against batch-derived thresholds → segment and daily aggregation →
//! metric cards.
//!
//! ## Modules
//!
//! - **Core**: `validate`, `scoring`, `aggregate` hold all computation
//! - **Edges**: `dataset` reads CSV, `export` writes CSV/JSON, `breakdown`
//!   prepares chart series and dashboard filters
//!
//! The DBI measures how evenly time is split across social, work/study and
//! entertainment use. It is descriptive only; it says nothing about amount
//! of use or wellbeing.

pub mod aggregate;
pub mod breakdown;
pub mod config;
pub mod dataset;
pub mod encoder;
pub mod error;
pub mod export;
pub mod pipeline;
pub mod scoring;
pub mod stats;
pub mod types;
pub mod validate;

pub use breakdown::{ChartData, RecordFilter};
pub use config::{DatePolicy, ScoringConfig};
pub use dataset::Dataset;
pub use error::DbiError;
pub use pipeline::{score_csv_file, score_dataset, DbiProcessor, PipelineOutput};

/// Crate version embedded in metric cards
pub const DBI_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name for metric cards
pub const PRODUCER_NAME: &str = "digital-balance";
