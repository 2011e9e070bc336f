use std::{
    io::{self, Write},
    path::PathBuf,
    process::ExitCode,
};

use anyhow::Result;
use clap::{ArgAction, Parser, Subcommand};
use log::{LevelFilter, debug, error};
use scopelink::{config::LinkConfig, manifest::Manifest};

#[derive(Parser, Debug)]
#[command(name = "scopelink")]
#[command(version, about = "Link concatenated JavaScript modules and render their ESM interface")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Link the modules of a manifest and print the root module's interface
    Link {
        /// Manifest describing modules, exports and the concatenation
        manifest: PathBuf,

        /// Link configuration file
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Runtime used for used-name lookups, overrides the config file
        #[arg(long)]
        runtime: Option<String>,

        /// Append the content hash of the concatenation as a comment
        #[arg(long)]
        hash: bool,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(cli.command) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{err:#}");
            ExitCode::FAILURE
        }
    }
}

/// Verbosity flags set the level; `RUST_LOG` overrides them when present
fn init_logging(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .parse_default_env()
        .init();
}

fn run(command: Command) -> Result<()> {
    match command {
        Command::Link {
            manifest,
            config,
            runtime,
            hash,
        } => {
            let mut config = match &config {
                Some(path) => LinkConfig::load(path)?,
                None => LinkConfig::default(),
            };
            if let Some(runtime) = runtime {
                config.output.runtime = runtime;
            }
            debug!("Using runtime '{}'", config.output.runtime);

            let manifest = Manifest::load(&manifest)?;
            let linked = manifest.link(config)?;

            let mut stdout = io::stdout().lock();
            stdout.write_all(linked.code.as_bytes())?;
            if hash && let Some(content_hash) = &linked.content_hash {
                writeln!(stdout, "// content hash: {content_hash}")?;
            }
            Ok(())
        }
    }
}
