//! Sentinel CLI - file-scanning security daemon command-line interface

use std::path::PathBuf;

use clap::Parser;
use sentinel_cli::{dispatch, load_or_default, IpcOperation, IpcResponse, SentinelDaemon};

#[derive(Parser)]
#[command(name = "sentinel")]
#[command(about = "Sentinel - local file-scanning security daemon")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Scan a file and apply policy/quarantine as configured
    Scan {
        /// File to scan
        path: PathBuf,
        /// Configuration file path
        #[arg(short, long, default_value = "config/sentinel.toml")]
        config: String,
        /// Client identifier for rate limiting
        #[arg(long, default_value = "cli")]
        client: String,
    },
    /// Check configuration validity
    Check {
        /// Configuration file path
        #[arg(short, long, default_value = "config/sentinel.toml")]
        config: String,
    },
    /// List stored policies
    ListPolicies {
        #[arg(short, long, default_value = "config/sentinel.toml")]
        config: String,
    },
    /// List quarantined files
    ListQuarantined {
        #[arg(short, long, default_value = "config/sentinel.toml")]
        config: String,
    },
    /// Restore a quarantined file
    Restore {
        id: i64,
        target_path: PathBuf,
        #[arg(short, long, default_value = "config/sentinel.toml")]
        config: String,
    },
    /// Show daemon health
    Status {
        #[arg(short, long, default_value = "config/sentinel.toml")]
        config: String,
    },
}

fn open_daemon(config_path: &str) -> anyhow::Result<SentinelDaemon> {
    let config = load_or_default(&PathBuf::from(config_path))?;
    SentinelDaemon::open(config)
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt::init();

    match cli.command {
        Some(Commands::Scan { path, config, client }) => {
            let mut daemon = open_daemon(&config)?;
            match dispatch(&mut daemon, IpcOperation::ScanFile { client, path })? {
                IpcResponse::Scanned(summary) => {
                    println!(
                        "level={} composite={:.2} quarantined={} explanation={}",
                        summary.level, summary.composite, summary.quarantined, summary.explanation
                    );
                }
                other => println!("{other:?}"),
            }
        }
        Some(Commands::Check { config }) => match load_or_default(&PathBuf::from(&config)) {
            Ok(_) => println!("config at {config} is valid"),
            Err(e) => println!("config at {config} is invalid: {e}"),
        },
        Some(Commands::ListPolicies { config }) => {
            let mut daemon = open_daemon(&config)?;
            match dispatch(&mut daemon, IpcOperation::ListPolicies)? {
                IpcResponse::Policies(policies) => {
                    for policy in policies {
                        println!("{} {} {:?}", policy.id, policy.rule_name, policy.action);
                    }
                }
                other => println!("{other:?}"),
            }
        }
        Some(Commands::ListQuarantined { config }) => {
            let mut daemon = open_daemon(&config)?;
            match dispatch(&mut daemon, IpcOperation::ListQuarantined)? {
                IpcResponse::QuarantineList(records) => {
                    for record in records {
                        println!("{} {} {:?}", record.id, record.original_path, record.threat_level);
                    }
                }
                other => println!("{other:?}"),
            }
        }
        Some(Commands::Restore { id, target_path, config }) => {
            let mut daemon = open_daemon(&config)?;
            dispatch(&mut daemon, IpcOperation::Restore { id, target_path })?;
            println!("restored quarantine record {id}");
        }
        Some(Commands::Status { config }) => {
            let mut daemon = open_daemon(&config)?;
            match dispatch(&mut daemon, IpcOperation::Health)? {
                IpcResponse::Health(report) => {
                    println!("overall: {:?}", report.overall);
                    for component in report.components {
                        println!("  {} -> {:?} ({})", component.name, component.state, component.reason);
                    }
                }
                other => println!("{other:?}"),
            }
        }
        None => {
            println!("Sentinel - use --help for commands");
        }
    }

    Ok(())
}
