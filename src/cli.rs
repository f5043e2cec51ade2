//! Command-line interface implementation for docpipe.
//! Provides argument parsing and help text formatting using clap.

use clap::{error::ErrorKind, CommandFactory, Parser, Subcommand};
use std::path::PathBuf;

/// Command-line arguments structure for docpipe.
#[derive(Parser, Debug)]
#[command(author, version, about = "docpipe: markdown to structured data, filled documents and a read API", long_about = None)]
pub struct Args {
    /// Path to the conversion configuration (defaults to docpipe.json/.yml/.yaml)
    #[arg(short, long, global = true, env = "DOCPIPE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Enable verbose logging output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug, PartialEq, Eq)]
pub enum Command {
    /// Convert markdown sources into structured data files
    Convert,
    /// Fill templates from structured data files
    Fill,
    /// Convert, then fill
    Run,
    /// Serve structured documents over HTTP
    Serve {
        /// Address to bind (defaults to the config, then DOCPIPE_ENV)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Render the markdown sources and serve them for preview
    Preview {
        /// Address to bind (defaults to the config, then DOCPIPE_ENV)
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

/// Parses command line arguments and returns the Args structure.
///
/// # Exits
/// * With status code 1 if the subcommand is missing
/// * With clap's default error handling for other argument errors
pub fn get_args() -> Args {
    match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            if matches!(
                e.kind(),
                ErrorKind::MissingSubcommand
                    | ErrorKind::DisplayHelpOnMissingArgumentOrSubcommand
            ) {
                let _ = Args::command()
                    .help_template(
                        r#"{about-section}
{usage-heading} {usage}

{all-args}
{after-help}
"#,
                    )
                    .print_help();
                std::process::exit(1);
            } else {
                e.exit();
            }
        }
    }
}
