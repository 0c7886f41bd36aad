//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - scan: list the annotation candidates of a page fixture
//! - run: annotate a page fixture, optionally scrolling through it

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Glosser - viewport-driven incremental page annotation
#[derive(Parser, Debug)]
#[command(name = "glosser")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// List the nodes that would be annotated
    Scan {
        /// Page fixture (YAML)
        page: PathBuf,

        /// Print JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Annotate a page fixture and print the result
    Run {
        /// Page fixture (YAML)
        page: PathBuf,

        /// Annotation backend
        #[arg(short, long, value_enum, default_value_t = Backend::Chat)]
        backend: Backend,

        /// Scroll offsets to visit after the first pass
        #[arg(short, long)]
        scroll: Vec<f64>,

        /// Override the concurrency budget
        #[arg(short, long)]
        max_concurrent: Option<usize>,

        /// Override the target language
        #[arg(short, long)]
        target: Option<String>,
    },
}

/// Which annotator to drive the scheduler with
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    /// Chat-completions service from the config file
    Chat,
    /// Local echo annotator, no network
    Mock,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_parse_no_args() {
        let cli = Cli::try_parse_from(["glosser"]).unwrap();
        assert!(cli.command.is_none());
        assert!(!cli.is_verbose());
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["glosser", "-v"]).unwrap();
        assert!(cli.is_verbose());
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["glosser", "--config", "/tmp/glosser.yml"]).unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("/tmp/glosser.yml")));
    }

    #[test]
    fn test_scan_json() {
        let cli = Cli::try_parse_from(["glosser", "scan", "page.yml", "--json"]).unwrap();
        match cli.command {
            Some(Commands::Scan { page, json }) => {
                assert_eq!(page, PathBuf::from("page.yml"));
                assert!(json);
            }
            other => panic!("expected scan, got {:?}", other),
        }
    }

    #[test]
    fn test_run_defaults() {
        let cli = Cli::try_parse_from(["glosser", "run", "page.yml"]).unwrap();
        match cli.command {
            Some(Commands::Run {
                backend,
                scroll,
                max_concurrent,
                target,
                ..
            }) => {
                assert_eq!(backend, Backend::Chat);
                assert!(scroll.is_empty());
                assert!(max_concurrent.is_none());
                assert!(target.is_none());
            }
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_run_with_options() {
        let cli = Cli::try_parse_from([
            "glosser", "run", "page.yml", "-b", "mock", "-s", "800", "-s", "1600", "-m", "2", "-t", "ja", "-v",
        ])
        .unwrap();
        assert!(cli.is_verbose());
        match cli.command {
            Some(Commands::Run {
                backend,
                scroll,
                max_concurrent,
                target,
                ..
            }) => {
                assert_eq!(backend, Backend::Mock);
                assert_eq!(scroll, vec![800.0, 1600.0]);
                assert_eq!(max_concurrent, Some(2));
                assert_eq!(target.as_deref(), Some("ja"));
            }
            other => panic!("expected run, got {:?}", other),
        }
    }

    #[test]
    fn test_run_requires_page() {
        assert!(Cli::try_parse_from(["glosser", "run"]).is_err());
    }

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }
}
