mod cli;
mod dql_check;
mod mapping_show;

use ormcheck::AnalysisConfig;
use std::path::Path;

pub fn run(args: Vec<String>) -> anyhow::Result<()> {
    let cmd = cli::parse_args(&args)?;
    match cmd {
        cli::Command::Help(topic) => {
            cli::print_help(topic);
            Ok(())
        }
        cli::Command::Dql(cmd) => match cmd {
            cli::DqlCommand::Check(args) => dql_check::run(args),
        },
        cli::Command::Mapping(cmd) => match cmd {
            cli::MappingCommand::Show(args) => mapping_show::run(args),
        },
    }
}

/// The config file when it exists, defaults otherwise, with the mapping file
/// overridden from the command line (relative to the working directory).
pub(crate) fn load_config(config: &Path, mapping: Option<&str>) -> anyhow::Result<AnalysisConfig> {
    let loaded = if config.exists() {
        AnalysisConfig::load(config)?
    } else {
        tracing::debug!(target: "ormcheck.cli", config = %config.display(), "config file not found, using defaults");
        AnalysisConfig::default()
    };

    let Some(mapping) = mapping else {
        return Ok(loaded);
    };
    let path = Path::new(mapping);
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map_err(|e| anyhow::anyhow!("failed to read current directory: {e}"))?
            .join(path)
    };
    Ok(loaded.with_mapping(path.to_string_lossy().into_owned()))
}
