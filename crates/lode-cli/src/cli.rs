use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use lode_types::ResourceIdentifier;

#[derive(Parser)]
#[command(
    name = "lode",
    about = "Lode: resource storage with write-time validation",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Directory holding the stored resources
    #[arg(long, global = true, default_value = ".lode")]
    pub root: PathBuf,

    /// Gate configuration (TOML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Store a document read from a file or stdin
    Put(PutArgs),
    /// Write a document body to stdout
    Get(GetArgs),
    /// Show resource metadata
    Meta(MetaArgs),
    /// List the children of a container
    Ls(LsArgs),
    /// Create a container
    Mkdir(MkdirArgs),
    /// Delete a document or an empty container
    Rm(RmArgs),
}

#[derive(Args)]
pub struct PutArgs {
    pub id: ResourceIdentifier,
    /// Source file; stdin when omitted
    pub file: Option<PathBuf>,
    #[arg(short = 't', long, default_value = "application/octet-stream")]
    pub content_type: String,
}

#[derive(Args)]
pub struct GetArgs {
    pub id: ResourceIdentifier,
}

#[derive(Args)]
pub struct MetaArgs {
    pub id: ResourceIdentifier,
}

#[derive(Args)]
pub struct LsArgs {
    #[arg(default_value = "/")]
    pub id: ResourceIdentifier,
}

#[derive(Args)]
pub struct MkdirArgs {
    pub id: ResourceIdentifier,
}

#[derive(Args)]
pub struct RmArgs {
    pub id: ResourceIdentifier,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_put_with_file() {
        let cli = Cli::try_parse_from(["lode", "put", "/doc.txt", "notes.txt", "-t", "text/plain"]).unwrap();
        if let Command::Put(args) = cli.command {
            assert_eq!(args.id.path(), "/doc.txt");
            assert_eq!(args.file, Some(PathBuf::from("notes.txt")));
            assert_eq!(args.content_type, "text/plain");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_put_from_stdin() {
        let cli = Cli::try_parse_from(["lode", "put", "/doc.txt"]).unwrap();
        if let Command::Put(args) = cli.command {
            assert!(args.file.is_none());
            assert_eq!(args.content_type, "application/octet-stream");
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_ls_defaults_to_root() {
        let cli = Cli::try_parse_from(["lode", "ls"]).unwrap();
        if let Command::Ls(args) = cli.command {
            assert_eq!(args.id, ResourceIdentifier::root());
        } else { panic!("wrong command"); }
    }

    #[test]
    fn parse_rejects_invalid_identifier() {
        assert!(Cli::try_parse_from(["lode", "get", ""]).is_err());
        assert!(Cli::try_parse_from(["lode", "get", "/a//b"]).is_err());
    }

    #[test]
    fn parse_global_options() {
        let cli = Cli::try_parse_from([
            "lode", "rm", "/old.txt", "--root", "/srv/lode", "--config", "gate.toml", "--verbose",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.root, PathBuf::from("/srv/lode"));
        assert_eq!(cli.config, Some(PathBuf::from("gate.toml")));
        assert!(matches!(cli.command, Command::Rm(_)));
    }

    #[test]
    fn parse_default_root() {
        let cli = Cli::try_parse_from(["lode", "mkdir", "/photos/"]).unwrap();
        assert_eq!(cli.root, PathBuf::from(".lode"));
        assert!(matches!(cli.command, Command::Mkdir(_)));
    }

    #[test]
    fn parse_json_format() {
        let cli = Cli::try_parse_from(["lode", "--format", "json", "meta", "/"]).unwrap();
        assert!(matches!(cli.format, OutputFormat::Json));
    }
}
