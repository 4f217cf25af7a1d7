use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

mod commands;
mod logging;

use commands::{run_cache_key, run_fetch, run_home, run_locate, run_parse};

/// Locus CLI - resolve source references to cached local paths
#[derive(Parser)]
#[command(name = "locus")]
#[command(about = "Resolve local paths and remote source references", long_about = None)]
#[command(version)]
struct Cli {
    /// TOML configuration file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Cache home directory (overrides configuration and environment)
    #[arg(long, global = true)]
    home: Option<PathBuf>,

    /// Increase log verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Subcommand)]
enum Commands {
    /// Print a usable local path for a local path or remote reference
    Locate {
        /// Local path or remote reference
        reference: String,
        /// Subdirectory of the cache home to cache under
        #[arg(long)]
        cache_dir: Option<String>,
    },
    /// Download a remote reference into the cache and print its path
    Fetch {
        /// Remote reference
        reference: String,
        /// Subdirectory of the cache home to cache under
        #[arg(long)]
        cache_dir: Option<String>,
    },
    /// Show how a reference is parsed
    Parse {
        /// Remote reference
        reference: String,
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },
    /// Print the cache key for a reference
    CacheKey {
        /// Remote reference
        reference: String,
    },
    /// Print the resolved cache home
    Home,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = logging::init_logging(cli.verbose) {
        eprintln!("warning: failed to initialize logging: {e}");
    }

    let settings = commands::Settings {
        config: cli.config,
        home: cli.home,
    };

    let result = match cli.command {
        Commands::Locate {
            reference,
            cache_dir,
        } => run_locate(&settings, &reference, cache_dir.as_deref()),
        Commands::Fetch {
            reference,
            cache_dir,
        } => run_fetch(&settings, &reference, cache_dir.as_deref()),
        Commands::Parse { reference, json } => run_parse(&reference, json),
        Commands::CacheKey { reference } => run_cache_key(&reference),
        Commands::Home => run_home(&settings),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "locus",
            "locate",
            "s3://bucket/values.yaml",
            "--cache-dir",
            "values",
            "--home",
            "/tmp/cache",
            "-vv",
        ])
        .unwrap();

        assert_eq!(cli.verbose, 2);
        assert_eq!(cli.home, Some(PathBuf::from("/tmp/cache")));
        match cli.command {
            Commands::Locate {
                reference,
                cache_dir,
            } => {
                assert_eq!(reference, "s3://bucket/values.yaml");
                assert_eq!(cache_dir.as_deref(), Some("values"));
            }
            _ => panic!("expected locate"),
        }
    }

    #[test]
    fn test_parse_json_flag() {
        let cli = Cli::try_parse_from(["locus", "parse", "--json", "https://a/b.yaml"]).unwrap();
        assert!(matches!(cli.command, Commands::Parse { json: true, .. }));
    }

    #[test]
    fn test_reference_is_required() {
        assert!(Cli::try_parse_from(["locus", "fetch"]).is_err());
    }

    #[test]
    fn test_cli_definition() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
