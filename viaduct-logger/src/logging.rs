use std::fs::File;
use std::sync::Arc;

use anyhow::Result;
use serde::Deserialize;
use tracing_subscriber::{filter::EnvFilter, fmt, prelude::*, Registry};

/// Log output format.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    #[default]
    Plain,
}

/// Log output destination.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogOutput {
    #[default]
    Stdout,
    File,
}

/// Logging configuration, typically a `[log]` section of the host's config
/// file.
#[derive(Debug, Deserialize, Clone, Default)]
#[serde(rename_all = "kebab-case")]
pub struct LogConfig {
    /// Filter directives, e.g. `"info"` or `"viaduct_relayer=debug,info"`.
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    /// Path to the log file, required if output is "file".
    pub file_path: Option<String>,
}

/// Installs the global tracing subscriber described by `config`.
pub fn init(config: &LogConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = Registry::default().with(filter);

    match config.output {
        LogOutput::File => {
            let file_path = config.file_path.as_deref().ok_or_else(|| {
                anyhow::anyhow!("Log output is 'file' but 'file-path' is not specified")
            })?;
            let writer = Arc::new(File::create(file_path)?);
            match config.format {
                LogFormat::Json => registry.with(fmt::layer().with_writer(writer).json()).init(),
                LogFormat::Plain => registry
                    .with(fmt::layer().with_writer(writer).with_ansi(false))
                    .init(),
            }
        }
        LogOutput::Stdout => match config.format {
            LogFormat::Json => registry.with(fmt::layer().json()).init(),
            LogFormat::Plain => registry.with(fmt::layer().pretty()).init(),
        },
    };

    Ok(())
}
