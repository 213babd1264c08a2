use anyhow::{Context, Result};
use std::env;
use std::fs::File;

use tracetok_cli::config::{self, Args};
use tracetok_cli::summary;

fn main() -> Result<()> {
    env_logger::init();

    let args = Args::parse(env::args().skip(1))?;
    let config = config::load_config(args.config_path.as_deref())?;
    log::debug!("using config {:?}", config);

    let file = File::open(&args.trace_path)
        .with_context(|| format!("failed to open trace {}", args.trace_path.display()))?;
    let summary = summary::summarize(file, &config)?;

    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}
