//! Read-only graph queries served to the API layer.

pub mod coverage;

pub use coverage::{
    control_coverage, coverage_summary, projection, ControlCoverage, CoverageSummary,
    StandardProjection,
};
