use anyhow::{Context, Result};
use parcelscan_core::ScannerConfig;
use tracing::info;

/// Load and validate `input`, or take the defaults
pub fn load(input: Option<&str>) -> Result<ScannerConfig> {
    match input {
        Some(path) => {
            info!("Loading configuration from {}", path);
            ScannerConfig::from_file(path)
                .with_context(|| format!("Invalid configuration: {}", path))
        }
        None => Ok(ScannerConfig::default()),
    }
}

/// Effective configuration as TOML
pub fn render(input: Option<&str>) -> Result<String> {
    let config = load(input)?;
    config
        .to_toml_string()
        .with_context(|| "Failed to serialize configuration")
}

pub fn execute(input: Option<&str>) -> Result<()> {
    print!("{}", render(input)?);
    Ok(())
}
