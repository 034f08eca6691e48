use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "chunked",
    about = "Store large objects as fixed-size chunks in a local directory",
    version
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[arg(long, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Store directory (overrides `root` in the config file)
    #[arg(long, global = true)]
    pub root: Option<PathBuf>,

    /// TOML config file
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Text,
    Json,
}

#[derive(Subcommand)]
pub enum Command {
    /// Write an object from a file or stdin
    Put(PutArgs),
    /// Read an object into a file or stdout
    Get(GetArgs),
    /// Show an object's metadata
    Info(InfoArgs),
    /// Delete an object
    Rm(RmArgs),
    /// List the chunk keys of an object
    Keys(KeysArgs),
}

#[derive(Args)]
pub struct PutArgs {
    pub name: String,
    /// Input file; `-` or absent reads stdin
    pub input: Option<PathBuf>,
    #[arg(long)]
    pub chunk_size: Option<u32>,
    #[arg(long)]
    pub concurrency: Option<usize>,
    /// Expiry in seconds
    #[arg(long)]
    pub ttl: Option<u64>,
    #[arg(long)]
    pub attributes: Option<String>,
}

#[derive(Args)]
pub struct GetArgs {
    pub name: String,
    /// Output file; `-` or absent writes stdout
    pub output: Option<PathBuf>,
    #[arg(long)]
    pub batch_size: Option<usize>,
    #[arg(long)]
    pub concurrency: Option<usize>,
}

#[derive(Args)]
pub struct InfoArgs {
    pub name: String,
}

#[derive(Args)]
pub struct RmArgs {
    pub name: String,
}

#[derive(Args)]
pub struct KeysArgs {
    pub name: String,
}

/// The file named by a path argument. `None` when the argument is absent or
/// `-`, meaning the standard stream.
pub fn file_arg(path: &Option<PathBuf>) -> Option<&Path> {
    path.as_deref().filter(|p| p.as_os_str() != "-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_put() {
        let cli = Cli::try_parse_from(["chunked", "put", "obj", "data.bin", "--chunk-size", "100"])
            .unwrap();
        if let Command::Put(args) = cli.command {
            assert_eq!(args.name, "obj");
            assert_eq!(file_arg(&args.input), Some(Path::new("data.bin")));
            assert_eq!(args.chunk_size, Some(100));
            assert!(args.ttl.is_none());
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_put_from_stdin() {
        let cli = Cli::try_parse_from(["chunked", "put", "obj", "-", "--ttl", "30"]).unwrap();
        if let Command::Put(args) = cli.command {
            assert!(file_arg(&args.input).is_none());
            assert_eq!(args.ttl, Some(30));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_get() {
        let cli = Cli::try_parse_from([
            "chunked",
            "get",
            "obj",
            "--batch-size",
            "11",
            "--concurrency",
            "3",
        ])
        .unwrap();
        if let Command::Get(args) = cli.command {
            assert!(file_arg(&args.output).is_none());
            assert_eq!(args.batch_size, Some(11));
            assert_eq!(args.concurrency, Some(3));
        } else {
            panic!("wrong command");
        }
    }

    #[test]
    fn parse_global_flags() {
        let cli = Cli::try_parse_from([
            "chunked", "info", "obj", "--format", "json", "--root", "/tmp/store", "-v",
        ])
        .unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.format, OutputFormat::Json);
        assert_eq!(cli.root, Some(PathBuf::from("/tmp/store")));
        assert!(matches!(cli.command, Command::Info(_)));
    }

    #[test]
    fn parse_rm_and_keys() {
        let cli = Cli::try_parse_from(["chunked", "rm", "obj"]).unwrap();
        assert!(matches!(cli.command, Command::Rm(_)));
        let cli = Cli::try_parse_from(["chunked", "keys", "obj"]).unwrap();
        assert!(matches!(cli.command, Command::Keys(_)));
    }

    #[test]
    fn name_is_required() {
        assert!(Cli::try_parse_from(["chunked", "get"]).is_err());
    }
}
