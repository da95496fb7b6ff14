//! hostprov
//!
//! Provisions a Fedora host to build and run xo-server from source by
//! walking a fixed, ordered list of idempotent actions.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand};
use color_eyre::Result;
use hostprov_core::{Playbook, Runner, TagFilter};
use tracing_subscriber::EnvFilter;

mod config;
mod factory;
mod output;

use config::{Config, LogConfig};

#[derive(Parser)]
#[command(name = "hostprov", version)]
#[command(about = "Provision a host to run xo-server from source", long_about = None)]
struct Cli {
    /// Config file (default: $HOSTPROV_CONFIG, ./hostprov.toml, /etc/hostprov/hostprov.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct Selection {
    /// Only run actions with any of these tags
    #[arg(short, long, value_delimiter = ',')]
    tags: Vec<String>,

    /// Skip actions with any of these tags
    #[arg(long, value_delimiter = ',')]
    skip_tags: Vec<String>,

    /// Override a variable
    #[arg(short = 'e', long = "extra-var", value_name = "KEY=VALUE")]
    extra_vars: Vec<String>,
}

impl Selection {
    fn filter(&self) -> TagFilter {
        TagFilter::new(&self.tags, &self.skip_tags)
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the target host
    Run {
        #[command(flatten)]
        selection: Selection,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },
    /// List the actions that would run, in order
    Tasks {
        #[command(flatten)]
        selection: Selection,
    },
}

fn init_tracing(log: &LogConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);

    if log.json {
        builder.json().init();
    } else {
        builder.with_target(false).init();
    }
}

async fn run(config: Config, selection: Selection, json: bool) -> Result<()> {
    let vars = config.vars_with(&selection.extra_vars)?;
    let playbook = Playbook::xo_server(&vars)?;
    let connection = factory::connect(&config.target).await?;

    let mut runner = Runner::new(Arc::clone(&connection.host), selection.filter());
    let result = runner.run(&playbook).await;
    connection.close().await;

    let report = match &result {
        Ok(report) => Some(report),
        Err(err) => err.report(),
    };
    if let Some(report) = report {
        if json {
            println!("{}", output::report_json(report)?);
        } else {
            print!("{}", output::report_text(report));
        }
    }

    result?;
    Ok(())
}

fn tasks(mut config: Config, selection: Selection) -> Result<()> {
    // listing does not need a real hostname
    if config.vars.hostname.is_empty() {
        config.vars.hostname = "localhost".to_string();
    }
    let vars = config.vars_with(&selection.extra_vars)?;
    let playbook = Playbook::xo_server(&vars)?;

    print!("{}", output::task_list(&playbook, &selection.filter()));
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let cli = Cli::parse();
    let config = Config::discover(cli.config.as_deref())?;
    init_tracing(&config.log);

    match cli.command {
        Commands::Run { selection, json } => run(config, selection, json).await,
        Commands::Tasks { selection } => tasks(config, selection),
    }
}
