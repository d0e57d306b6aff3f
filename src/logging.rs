use std::str::FromStr;

use anyhow::{Context, Result};
use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;

static INITIALIZED: OnceCell<()> = OnceCell::new();

pub fn init(level: &str, json: bool) -> Result<()> {
    INITIALIZED.get_or_try_init(|| {
        let env_filter = EnvFilter::from_str(level).context("failed to parse log level")?;

        let builder = tracing_subscriber::fmt()
            .with_line_number(true)
            .with_file(true)
            .with_env_filter(env_filter);

        if json {
            builder.json().try_init()
        } else {
            builder.pretty().try_init()
        }
        .map_err(|err| anyhow::anyhow!("failed to install subscriber: {}", err))
    })?;

    Ok(())
}
