//! Configuration management for the gridslice batch tool.
//!
//! This module handles the layered configuration system with the following precedence:
//! 1. Command-line arguments (highest priority)
//! 2. Environment variables
//! 3. JSON config file
//! 4. Default values (lowest priority)

use clap::Parser;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::coordinates::PrecisionMode;
use crate::dataset::OpenOptions;
use crate::error::{GridError, Result};
use crate::writer::DEFAULT_DISTRIBUTOR;

/// Placeholder replaced by the parameter name in output file names
pub const PARAM_PLACEHOLDER: &str = "{param}";

/// Command-line arguments for gridslice
#[derive(Parser, Debug)]
#[command(name = "gridslice")]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the NetCDF file to slice
    pub input: PathBuf,

    /// Directory receiving one file per parameter, time step and level
    #[arg(short, long, env = "GRIDSLICE_OUTPUT_DIR")]
    pub output_dir: Option<PathBuf>,

    /// Path to JSON configuration file
    #[arg(short, long, env = "GRIDSLICE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "GRIDSLICE_LOG_LEVEL")]
    pub log_level: Option<String>,

    /// Reverse the X axis when reading coordinates
    #[arg(long, env = "GRIDSLICE_FLIP_X")]
    pub flip_x: bool,

    /// Reverse the Y axis when reading coordinates
    #[arg(long, env = "GRIDSLICE_FLIP_Y")]
    pub flip_y: bool,

    /// Round values widened from single precision to their source digits
    #[arg(long, env = "GRIDSLICE_IMPROVED_PRECISION")]
    pub improved_precision: bool,

    /// Only slice these parameters (repeatable)
    #[arg(short, long = "parameter", env = "GRIDSLICE_PARAMETERS", value_delimiter = ',')]
    pub parameters: Vec<String>,

    /// Print the classification of the input as JSON and exit
    #[arg(long)]
    pub describe: bool,
}

/// Reading configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReadConfig {
    /// Reverse the X axis
    #[serde(default)]
    pub flip_x: bool,

    /// Reverse the Y axis
    #[serde(default)]
    pub flip_y: bool,

    /// Precision handling for single precision sources
    #[serde(default)]
    pub precision: PrecisionMode,

    /// Parameters to slice; empty means all
    #[serde(default)]
    pub parameters: Vec<String>,
}

/// Slice output configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteConfig {
    /// Output directory
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// File name template; `{param}`, `{time}` and `{level}` are substituted
    #[serde(default = "default_file_template")]
    pub file_template: String,

    /// Value of the `distributor` file attribute
    #[serde(default = "default_distributor")]
    pub distributor: String,
}

/// Complete configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Reading configuration
    #[serde(default)]
    pub read: ReadConfig,

    /// Output configuration
    #[serde(default)]
    pub write: WriteConfig,

    /// Log level
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// What the binary was asked to do
#[derive(Debug, Clone)]
pub struct Invocation {
    pub input: PathBuf,
    pub describe: bool,
}

impl Config {
    /// Load configuration from all sources with proper precedence
    pub fn load() -> Result<(Self, Invocation)> {
        Self::from_args(Args::parse())
    }

    /// Build the configuration from already parsed arguments
    pub fn from_args(args: Args) -> Result<(Self, Invocation)> {
        // Start with defaults
        let mut config = Config::default();

        // Load from JSON file if provided
        if let Some(config_path) = &args.config {
            let json_config = Self::load_from_file(config_path)?;
            config.merge(json_config);
        }

        // Override with command-line arguments and environment
        if let Some(output_dir) = args.output_dir {
            config.write.output_dir = output_dir;
        }
        if let Some(log_level) = args.log_level {
            config.log_level = log_level;
        }
        config.read.flip_x |= args.flip_x;
        config.read.flip_y |= args.flip_y;
        if args.improved_precision {
            config.read.precision = PrecisionMode::MatchSource;
        }
        if !args.parameters.is_empty() {
            config.read.parameters = args.parameters;
        }

        let invocation = Invocation {
            input: args.input,
            describe: args.describe,
        };
        Ok((config, invocation))
    }

    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Merge another config into this one (other takes precedence)
    fn merge(&mut self, other: Config) {
        self.read = other.read;
        self.write = other.write;
        self.log_level = other.log_level;
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.write.output_dir.as_os_str().is_empty() {
            return Err(GridError::Config {
                message: "Output directory cannot be empty".to_string(),
            });
        }

        if !self.write.file_template.contains(PARAM_PLACEHOLDER) {
            return Err(GridError::Config {
                message: format!(
                    "File template {} must contain {}",
                    self.write.file_template, PARAM_PLACEHOLDER
                ),
            });
        }

        // Validate log level
        match self.log_level.as_str() {
            "trace" | "debug" | "info" | "warn" | "error" => {}
            _ => {
                return Err(GridError::Config {
                    message: format!(
                        "Invalid log level: {}. Must be one of: trace, debug, info, warn, error",
                        self.log_level
                    ),
                });
            }
        }

        Ok(())
    }

    /// Options for opening the input dataset
    pub fn open_options(&self) -> OpenOptions {
        OpenOptions::default()
            .with_flip_x(self.read.flip_x)
            .with_flip_y(self.read.flip_y)
            .with_precision(self.read.precision)
            .with_distributor(self.write.distributor.clone())
    }

    /// Whether `parameter` passes the parameter filter
    pub fn wants(&self, parameter: &str) -> bool {
        self.read.parameters.is_empty() || self.read.parameters.iter().any(|p| p == parameter)
    }

    /// Output path of one slice
    pub fn output_path(&self, parameter: &str, time_index: i64, level_index: i64) -> PathBuf {
        let level = if level_index < 0 {
            "sfc".to_string()
        } else {
            level_index.to_string()
        };
        let name = self
            .write
            .file_template
            .replace(PARAM_PLACEHOLDER, parameter)
            .replace("{time}", &time_index.to_string())
            .replace("{level}", &level);
        self.write.output_dir.join(name)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            read: ReadConfig::default(),
            write: WriteConfig::default(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ReadConfig {
    fn default() -> Self {
        Self {
            flip_x: false,
            flip_y: false,
            precision: PrecisionMode::default(),
            parameters: Vec::new(),
        }
    }
}

impl Default for WriteConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            file_template: default_file_template(),
            distributor: default_distributor(),
        }
    }
}

// Default value functions for serde
fn default_output_dir() -> PathBuf {
    PathBuf::from("slices")
}

fn default_file_template() -> String {
    "{param}_{time}_{level}.nc".to_string()
}

fn default_distributor() -> String {
    DEFAULT_DISTRIBUTOR.to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::io::Write;

    fn args(extra: &[&str]) -> Args {
        let mut argv = vec!["gridslice", "input.nc"];
        argv.extend_from_slice(extra);
        Args::parse_from(argv)
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.write.output_dir, PathBuf::from("slices"));
        assert_eq!(config.write.distributor, DEFAULT_DISTRIBUTOR);
        assert_eq!(config.read.precision, PrecisionMode::Native);
        assert_eq!(config.log_level, "info");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = Config::default();
        config.write.output_dir = PathBuf::new();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.write.file_template = "slice.nc".to_string();
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.log_level = "invalid".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_command_line_overrides_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"read": {{"precision": "match_source", "parameters": ["t"]}},
                "write": {{"output_dir": "/data/out", "distributor": "Somebody"}},
                "log_level": "debug"}}"#
        )
        .unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let (config, invocation) = Config::from_args(args(&[
            "--config",
            &path,
            "--output-dir",
            "/tmp/slices",
            "--flip-y",
            "--parameter",
            "u",
            "--parameter",
            "v",
        ]))
        .unwrap();

        assert_eq!(invocation.input, PathBuf::from("input.nc"));
        assert!(!invocation.describe);
        assert_eq!(config.write.output_dir, PathBuf::from("/tmp/slices"));
        assert_eq!(config.write.distributor, "Somebody");
        assert_eq!(config.read.precision, PrecisionMode::MatchSource);
        assert_eq!(config.read.parameters, vec!["u".to_string(), "v".to_string()]);
        assert!(config.read.flip_y);
        assert!(!config.read.flip_x);
        assert_eq!(config.log_level, "debug");
    }

    #[test]
    fn test_output_path() {
        let config = Config::default();
        assert_eq!(
            config.output_path("t2m", 3, -1),
            PathBuf::from("slices/t2m_3_sfc.nc")
        );
        assert_eq!(
            config.output_path("t", 0, 2),
            PathBuf::from("slices/t_0_2.nc")
        );
    }

    #[test]
    fn test_parameter_filter() {
        let mut config = Config::default();
        assert!(config.wants("anything"));
        config.read.parameters = vec!["t".to_string()];
        assert!(config.wants("t"));
        assert!(!config.wants("u"));
    }
}
