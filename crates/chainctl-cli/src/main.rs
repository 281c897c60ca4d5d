//! `chainctl` - build, run and supervise a local Cosmos SDK node

use anyhow::Context;
use chainctl_chain::{Chain, ChainOptions, KeyringBackend};
use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

fn cli() -> Command {
    Command::new("chainctl")
        .version(chainctl_chain::VERSION)
        .about("Lifecycle coordinator for locally built Cosmos SDK nodes")
        .subcommand_required(true)
        .arg(
            Arg::new("log-json")
                .long("log-json")
                .global(true)
                .action(ArgAction::SetTrue)
                .help("Emit logs as JSON"),
        )
        .subcommand(
            Command::new("info")
                .about("Print the resolved chain settings")
                .args(chain_args())
                .arg(
                    Arg::new("json")
                        .long("json")
                        .action(ArgAction::SetTrue)
                        .help("Output as JSON"),
                ),
        )
        .subcommand(
            Command::new("serve")
                .about("Generate, build and run the node, restarting on source changes")
                .args(chain_args())
                .arg(
                    Arg::new("verbose")
                        .long("verbose")
                        .short('v')
                        .action(ArgAction::SetTrue)
                        .help("Forward node output"),
                )
                .arg(
                    Arg::new("third-party-codegen")
                        .long("third-party-codegen")
                        .action(ArgAction::SetTrue)
                        .help("Also generate code for third-party proto modules"),
                )
                .arg(
                    Arg::new("check-dependencies")
                        .long("check-dependencies")
                        .action(ArgAction::SetTrue)
                        .help("Verify Go module dependencies before generating"),
                )
                .arg(
                    Arg::new("print-generated-paths")
                        .long("print-generated-paths")
                        .action(ArgAction::SetTrue)
                        .help("Log generated output directories"),
                ),
        )
}

fn chain_args() -> [Arg; 5] {
    [
        Arg::new("path")
            .long("path")
            .short('p')
            .default_value(".")
            .value_parser(value_parser!(PathBuf))
            .help("Application source directory"),
        Arg::new("home")
            .long("home")
            .help("Node home directory"),
        Arg::new("config")
            .long("config")
            .short('c')
            .value_parser(value_parser!(PathBuf))
            .help("Chain config file"),
        Arg::new("keyring-backend")
            .long("keyring-backend")
            .value_parser(value_parser!(KeyringBackend))
            .help("Keyring backend (os, file, kwallet, pass, test, memory)"),
        Arg::new("chain-id")
            .long("chain-id")
            .help("Chain ID"),
    ]
}

fn chain_options(args: &ArgMatches) -> ChainOptions {
    let mut options = ChainOptions::new();
    if let Some(id) = args.get_one::<String>("chain-id") {
        options = options.with_id(id.as_str());
    }
    if let Some(home) = args.get_one::<String>("home") {
        options = options.with_home(home.as_str());
    }
    if let Some(config) = args.get_one::<PathBuf>("config") {
        options = options.with_config_file(config.clone());
    }
    if let Some(backend) = args.get_one::<KeyringBackend>("keyring-backend") {
        options = options.with_keyring_backend(*backend);
    }
    options
}

fn serve_options(args: &ArgMatches) -> ChainOptions {
    let mut options = chain_options(args);
    if args.get_flag("verbose") {
        options = options.verbose();
    }
    if args.get_flag("third-party-codegen") {
        options = options.enable_third_party_codegen();
    }
    if args.get_flag("check-dependencies") {
        options = options.check_dependencies();
    }
    if args.get_flag("print-generated-paths") {
        options = options.print_generated_paths();
    }
    options
}

fn app_path(args: &ArgMatches) -> PathBuf {
    args.get_one::<PathBuf>("path")
        .cloned()
        .unwrap_or_else(|| PathBuf::from("."))
}

fn init_tracing(json: bool) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn info(args: &ArgMatches) -> anyhow::Result<()> {
    let path = app_path(args);
    let chain = Chain::new(&path, chain_options(args))
        .with_context(|| format!("cannot open application at {}", path.display()))?;

    let id = chain.id()?;
    let home = chain.home()?;
    let binary = chain.binary_path()?;
    let keyring_backend = chain.keyring_backend()?;
    let node_address = chain.node_address()?;

    if args.get_flag("json") {
        let report = serde_json::json!({
            "app": chain.app().module_path(),
            "sdk_family": chain.version().family().to_string(),
            "sdk_version": chain.version().raw(),
            "chain_id": id,
            "home": home.display().to_string(),
            "binary": binary.display().to_string(),
            "keyring_backend": keyring_backend.as_str(),
            "node_address": node_address,
        });
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("App:             {}", chain.app().module_path());
    println!("SDK:             {} ({})", chain.version().family(), chain.version().raw());
    println!("Chain ID:        {id}");
    println!("Home:            {}", home.display());
    println!("Binary:          {}", binary.display());
    println!("Keyring backend: {keyring_backend}");
    println!("Node address:    {node_address}");
    Ok(())
}

async fn serve(args: &ArgMatches) -> anyhow::Result<()> {
    let path = app_path(args);
    let mut chain = Chain::new(&path, serve_options(args))
        .with_context(|| format!("cannot open application at {}", path.display()))?;

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                tracing::info!("interrupt received, shutting down");
                signal.cancel();
            }
            Err(e) => tracing::warn!(error = %e, "cannot listen for interrupts"),
        }
    });

    chain.serve(shutdown).await.context("serve failed")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let matches = cli().get_matches();
    init_tracing(matches.get_flag("log-json"));

    match matches.subcommand() {
        Some(("info", args)) => info(args),
        Some(("serve", args)) => serve(args).await,
        _ => unreachable!("subcommand is required"),
    }
}
