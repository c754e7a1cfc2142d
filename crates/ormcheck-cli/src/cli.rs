use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelpTopic {
    Root,
    Dql,
    DqlCheck,
    Mapping,
    MappingShow,
}

#[derive(Debug, Clone)]
pub enum Command {
    Help(HelpTopic),
    Dql(DqlCommand),
    Mapping(MappingCommand),
}

#[derive(Debug, Clone)]
pub enum DqlCommand {
    Check(DqlCheckArgs),
}

#[derive(Debug, Clone)]
pub struct DqlCheckArgs {
    pub config: PathBuf,
    pub mapping: Option<String>,
    pub files: Vec<PathBuf>,
}

#[derive(Debug, Clone)]
pub enum MappingCommand {
    Show(MappingShowArgs),
}

#[derive(Debug, Clone)]
pub struct MappingShowArgs {
    pub config: PathBuf,
    pub mapping: Option<String>,
    pub class: String,
}

const DEFAULT_CONFIG: &str = "ormcheck.toml";

pub fn parse_args(args: &[String]) -> anyhow::Result<Command> {
    let mut it = args.iter().skip(1);
    let Some(first) = it.next() else {
        return Ok(Command::Help(HelpTopic::Root));
    };

    match first.as_str() {
        "-h" | "--help" => Ok(Command::Help(HelpTopic::Root)),
        "dql" => parse_dql(it.map(|s| s.as_str())),
        "mapping" => parse_mapping(it.map(|s| s.as_str())),
        _ => anyhow::bail!("unknown command: {first}"),
    }
}

/// Options shared by every subcommand. Returns `false` when `token` is not one.
fn parse_common<'a>(
    token: &'a str,
    it: &mut impl Iterator<Item = &'a str>,
    config: &mut PathBuf,
    mapping: &mut Option<String>,
) -> anyhow::Result<bool> {
    match token {
        "--config" => {
            let Some(v) = it.next() else {
                anyhow::bail!("--config requires a value");
            };
            *config = PathBuf::from(v);
        }
        _ if token.starts_with("--config=") => {
            *config = PathBuf::from(token.trim_start_matches("--config="));
        }
        "--mapping" => {
            let Some(v) = it.next() else {
                anyhow::bail!("--mapping requires a value");
            };
            *mapping = Some(v.to_string());
        }
        _ if token.starts_with("--mapping=") => {
            *mapping = Some(token.trim_start_matches("--mapping=").to_string());
        }
        _ => return Ok(false),
    }
    Ok(true)
}

fn parse_dql<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut subcmd: Option<&str> = None;

    let mut config = PathBuf::from(DEFAULT_CONFIG);
    let mut mapping: Option<String> = None;
    let mut files: Vec<PathBuf> = Vec::new();

    while let Some(token) = it.next() {
        if parse_common(token, &mut it, &mut config, &mut mapping)? {
            continue;
        }
        match token {
            "-h" | "--help" => {
                return Ok(Command::Help(match subcmd {
                    None => HelpTopic::Dql,
                    Some(_) => HelpTopic::DqlCheck,
                }));
            }
            "check" if subcmd.is_none() => subcmd = Some(token),
            other if other.starts_with('-') => anyhow::bail!("unknown argument: {other}"),
            other if subcmd.is_none() => anyhow::bail!("unknown subcommand: {other}"),
            other => files.push(PathBuf::from(other)),
        }
    }

    match subcmd {
        None if files.is_empty() && mapping.is_none() => Ok(Command::Help(HelpTopic::Dql)),
        None => anyhow::bail!("missing subcommand: expected `ormcheck dql check`"),
        Some(_) => Ok(Command::Dql(DqlCommand::Check(DqlCheckArgs {
            config,
            mapping,
            files,
        }))),
    }
}

fn parse_mapping<'a>(mut it: impl Iterator<Item = &'a str>) -> anyhow::Result<Command> {
    let mut subcmd: Option<&str> = None;

    let mut config = PathBuf::from(DEFAULT_CONFIG);
    let mut mapping: Option<String> = None;
    let mut class: Option<String> = None;

    while let Some(token) = it.next() {
        if parse_common(token, &mut it, &mut config, &mut mapping)? {
            continue;
        }
        match token {
            "-h" | "--help" => {
                return Ok(Command::Help(match subcmd {
                    None => HelpTopic::Mapping,
                    Some(_) => HelpTopic::MappingShow,
                }));
            }
            "show" if subcmd.is_none() => subcmd = Some(token),
            other if other.starts_with('-') => anyhow::bail!("unknown argument: {other}"),
            other if subcmd.is_none() => anyhow::bail!("unknown subcommand: {other}"),
            other => {
                if class.is_some() {
                    anyhow::bail!("unexpected argument: {other}");
                }
                class = Some(other.to_string());
            }
        }
    }

    match subcmd {
        None if mapping.is_none() => Ok(Command::Help(HelpTopic::Mapping)),
        None => anyhow::bail!("missing subcommand: expected `ormcheck mapping show`"),
        Some(_) => {
            let Some(class) = class else {
                anyhow::bail!("missing class name: `ormcheck mapping show <CLASS>`");
            };
            Ok(Command::Mapping(MappingCommand::Show(MappingShowArgs {
                config,
                mapping,
                class,
            })))
        }
    }
}

pub fn print_help(topic: HelpTopic) {
    match topic {
        HelpTopic::Root => {
            println!(
                "\
ormcheck - check ORM code against the mapping metadata

USAGE:
  ormcheck <COMMAND> [OPTIONS]

COMMANDS:
  dql           Compile DQL statements against the mapping
  mapping       Inspect the mapping metadata

Run `ormcheck <command> --help` for more."
            );
        }
        HelpTopic::Dql | HelpTopic::DqlCheck => {
            println!(
                "\
USAGE:
  ormcheck dql check [OPTIONS] [FILES...]

Reads `;`-separated DQL statements from FILES (or stdin) and compiles each one.

OPTIONS:
  --config <FILE>       Config file path (default: ormcheck.toml)
  --mapping <FILE>      Override metadata.mapping from config
  -h, --help            Print help"
            );
        }
        HelpTopic::Mapping | HelpTopic::MappingShow => {
            println!(
                "\
USAGE:
  ormcheck mapping show <CLASS> [OPTIONS]

Prints the mapping of CLASS as JSON.

OPTIONS:
  --config <FILE>       Config file path (default: ormcheck.toml)
  --mapping <FILE>      Override metadata.mapping from config
  -h, --help            Print help"
            );
        }
    }
}
