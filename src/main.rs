//! gridslice - split gridded NetCDF model output into single-slice files
//!
//! This is the main entry point for the gridslice batch tool.

use anyhow::Context;
use std::time::Instant;
use tracing::{error, info};

use gridslice::{
    init_tracing, log_error, log_operation_end, log_operation_start, Config, Dataset, NetcdfStore,
};

fn main() -> anyhow::Result<()> {
    // Load configuration
    let (config, invocation) = Config::load().context("Configuration error")?;

    init_tracing(&config.log_level);
    info!("Starting gridslice v{}", env!("CARGO_PKG_VERSION"));

    // Validate configuration
    config.validate().map_err(|e| {
        error!("Invalid configuration: {}", e);
        e
    })?;

    info!("Opening NetCDF file: {:?}", invocation.input);

    let mut dataset = Dataset::open_with(NetcdfStore, &invocation.input, config.open_options())
        .map_err(|e| {
            log_error(&e, "open");
            e
        })
        .with_context(|| format!("Failed to open {}", invocation.input.display()))?;

    if invocation.describe {
        let classification = serde_json::to_string_pretty(&dataset.classification())?;
        println!("{}", classification);
        return Ok(());
    }

    std::fs::create_dir_all(&config.write.output_dir).with_context(|| {
        format!(
            "Failed to create output directory {}",
            config.write.output_dir.display()
        )
    })?;

    let start = Instant::now();
    let target = config.write.output_dir.display().to_string();
    log_operation_start("write_slices", Some(&target));
    let result = write_all_slices(&mut dataset, &config);
    log_operation_end("write_slices", start, result.is_ok());
    let written = result?;
    info!(
        "Wrote {} slices to {}",
        written,
        config.write.output_dir.display()
    );

    Ok(())
}

/// Write every selected parameter at every time step and level.
fn write_all_slices(dataset: &mut Dataset<NetcdfStore>, config: &Config) -> anyhow::Result<usize> {
    let mut written = 0;

    dataset.first_param();
    loop {
        let Some(parameter) = dataset.current_parameter().map(|p| p.name.clone()) else {
            break;
        };

        if config.wants(&parameter) {
            let has_level = dataset.has_dimension("z");
            dataset.reset_time();
            while dataset.next_time() {
                if has_level {
                    dataset.reset_level();
                    while dataset.next_level() {
                        written += write_one(dataset, config, &parameter)?;
                    }
                } else {
                    written += write_one(dataset, config, &parameter)?;
                }
            }
        }

        if !dataset.next_param() {
            break;
        }
    }

    Ok(written)
}

fn write_one(
    dataset: &Dataset<NetcdfStore>,
    config: &Config,
    parameter: &str,
) -> anyhow::Result<usize> {
    let level_index = if dataset.has_dimension("z") {
        dataset.level_index()
    } else {
        -1
    };
    let path = config.output_path(parameter, dataset.time_index(), level_index);
    dataset.write_slice(&path).map_err(|e| {
        log_error(&e, "write_slice");
        e
    })?;
    Ok(1)
}
