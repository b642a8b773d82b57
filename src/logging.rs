//! Logging utilities for gridslice.
//!
//! Structured `tracing` helpers used by the library and the batch binary.

use std::time::Instant;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::error::GridError;

/// Initialize the tracing subscriber with the given log level.
///
/// `RUST_LOG`, when set, takes precedence over `log_level`.
pub fn init_tracing(log_level: &str) {
    let filter = match std::env::var("RUST_LOG") {
        Ok(val) => val,
        Err(_) => log_level.to_string(),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(true)
        .with_line_number(true)
        .init();
}

/// Log a start message for a significant operation
pub fn log_operation_start(operation: &str, details: Option<&str>) {
    if let Some(details) = details {
        info!(
            operation = operation,
            details = details,
            "Starting operation"
        );
    } else {
        info!(operation = operation, "Starting operation");
    }
}

/// Log the completion of a significant operation
pub fn log_operation_end(operation: &str, start_time: Instant, success: bool) {
    let duration_ms = start_time.elapsed().as_secs_f64() * 1000.0;

    if success {
        info!(
            operation = operation,
            duration_ms = duration_ms,
            "Operation completed successfully"
        );
    } else {
        warn!(
            operation = operation,
            duration_ms = duration_ms,
            "Operation completed with failures"
        );
    }
}

/// Run `f`, logging its duration under a fresh run id
pub fn log_timed_operation<F, R>(operation: &str, f: F) -> R
where
    F: FnOnce() -> R,
{
    let start = Instant::now();
    let run_id = Uuid::new_v4();

    debug!(
        operation = operation,
        run_id = %run_id,
        "Starting operation"
    );

    let result = f();

    debug!(
        operation = operation,
        run_id = %run_id,
        duration_ms = start.elapsed().as_secs_f64() * 1000.0,
        "Operation completed"
    );

    result
}

/// Log what was found in a freshly opened dataset
pub fn log_dataset_stats(
    file_path: &str,
    dim_count: usize,
    var_count: usize,
    parameters: &[String],
    projection: &str,
) {
    info!(
        operation = "open",
        file_path = file_path,
        dim_count = dim_count,
        var_count = var_count,
        param_count = parameters.len(),
        params = %parameters.join(", "),
        projection = projection,
        "Dataset classified"
    );
}

/// Log an error with context
pub fn log_error(error: &GridError, context: &str) {
    error!(
        error = %error,
        context = context,
        error_type = error_kind(error),
        "Error occurred"
    );
}

fn error_kind(error: &GridError) -> &'static str {
    match error {
        #[cfg(feature = "netcdf")]
        GridError::NetCdf(_) => "netcdf",
        GridError::Io(_) => "io",
        GridError::Structural { .. } => "structural",
        GridError::NotFound { .. } => "not_found",
        GridError::Range { .. } => "range",
        GridError::Write { .. } => "write",
        GridError::UnsupportedType { .. } => "unsupported_type",
        GridError::Store { .. } => "store",
        GridError::Config { .. } => "config",
        GridError::Json(_) => "json",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_log_timed_operation() {
        let result = log_timed_operation("test_operation", || {
            std::thread::sleep(Duration::from_millis(1));
            42
        });

        assert_eq!(result, 42);
    }

    #[test]
    fn test_error_kind() {
        assert_eq!(
            error_kind(&GridError::Range {
                message: "past end".to_string()
            }),
            "range"
        );
        log_error(&GridError::structural("no time"), "test");
    }
}
