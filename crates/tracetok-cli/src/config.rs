use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::{env, fs::File, io::Read};

/// Environment variable overriding the chunk size of the config file.
pub const CHUNK_SIZE_ENV: &str = "TRACETOK_CHUNK_SIZE";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CliConfig {
    /// Number of bytes read from the trace file per chunk.
    pub chunk_size: usize,
    pub print_events: bool,
    pub max_events: usize,
}

impl Default for CliConfig {
    fn default() -> Self {
        CliConfig {
            chunk_size: 1 << 20,
            print_events: false,
            max_events: 100,
        }
    }
}

/// Command line arguments: `[-c config.json] <trace-file>`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Args {
    pub config_path: Option<PathBuf>,
    pub trace_path: PathBuf,
}

impl Args {
    pub fn parse<I: IntoIterator<Item = String>>(args: I) -> Result<Args> {
        let mut config_path = None;
        let mut trace_path = None;
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if arg == "-c" {
                let path = args.next().context("-c requires a config file path")?;
                config_path = Some(PathBuf::from(path));
            } else if trace_path.is_none() {
                trace_path = Some(PathBuf::from(arg));
            } else {
                anyhow::bail!("unexpected argument {}", arg);
            }
        }
        Ok(Args {
            config_path,
            trace_path: trace_path.context("usage: tracetok [-c config.json] <trace-file>")?,
        })
    }
}

// loads the config file, if any, then applies the environment override
pub fn load_config(path: Option<&Path>) -> Result<CliConfig> {
    let mut config = match path {
        Some(path) => read_config_file(path)?,
        None => CliConfig::default(),
    };

    if let Ok(value) = env::var(CHUNK_SIZE_ENV) {
        config.chunk_size = value
            .parse()
            .with_context(|| format!("invalid {} value {:?}", CHUNK_SIZE_ENV, value))?;
    }

    if config.chunk_size == 0 {
        anyhow::bail!("chunk_size must be positive");
    }
    Ok(config)
}

fn read_config_file(path: &Path) -> Result<CliConfig> {
    let mut file = File::open(path)
        .with_context(|| format!("failed to open config file {}", path.display()))?;
    let mut contents = String::new();
    file.read_to_string(&mut contents)?;
    serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse config file {}", path.display()))
}
