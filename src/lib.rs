//! # gridslice
//!
//! Schema inference and sliced access for gridded NetCDF model output.
//!
//! Opening a file classifies its dimensions into the X, Y, Z, time and
//! ensemble member roles, finds the coordinate, projection and parameter
//! variables, and positions cursors over time steps, levels and parameters.
//! Values are then read one (time, level) slice at a time, and a slice can
//! be written back out as a self-contained NetCDF file.
//!
//! ## Architecture
//!
//! - **Store**: [`store::ArrayStore`] abstracts the file format; the NetCDF
//!   backend lives behind the `netcdf` feature and an in-memory backend is
//!   always available
//! - **Inference**: [`dimensions`] and [`variables`] classify a [`store::Schema`]
//! - **Access**: [`Dataset`] owns the cursors and reads slices planned by [`slice`]
//! - **Output**: [`writer`] produces a single-slice file through the same store

pub mod attribute;
pub mod config;
pub mod coordinates;
pub mod cursor;
pub mod dataset;
pub mod diagnostics;
pub mod dimensions;
pub mod error;
pub mod logging;
pub mod slice;
pub mod store;
pub mod variables;
pub mod writer;

pub use attribute::{Attribute, AttributeValue};
pub use config::Config;
pub use coordinates::{PrecisionMode, FLOAT_MISSING};
pub use dataset::{Classification, Dataset, OpenOptions};
pub use diagnostics::{Diagnostic, DiagnosticsSink, RecordingSink, TracingSink};
pub use dimensions::{DimensionRoles, Role};
pub use error::{GridError, Result};
pub use logging::{
    init_tracing, log_dataset_stats, log_error, log_operation_end, log_operation_start,
    log_timed_operation,
};
pub use store::memory::MemoryStore;
#[cfg(feature = "netcdf")]
pub use store::netcdf::NetcdfStore;
pub use store::{ArrayReader, ArrayStore, ArrayWriter, ElementType, Schema};
