//! gateway-cli: 网关配置校验与路由计划查看
//!
//! Usage:
//!   gateway-cli validate <config.yaml>    Validate a gateway configuration
//!   gateway-cli plan <config.yaml>        Show auto-mode candidate order and eligible keys
//!   gateway-cli version                   Show version information

use ai_lib_gateway::catalog::ordered_candidates;
use ai_lib_gateway::keys::{select_candidates, KeyStore};
use ai_lib_gateway::GatewayConfig;
use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        print_usage();
        std::process::exit(1);
    }

    let result = match args[1].as_str() {
        "validate" => cmd_validate(&args[2..]),
        "plan" => cmd_plan(&args[2..]).await,
        "version" | "--version" | "-V" => {
            cmd_version();
            Ok(())
        }
        "help" | "--help" | "-h" => {
            print_usage();
            Ok(())
        }
        other => {
            eprintln!("Unknown command: {other}");
            eprintln!();
            print_usage();
            std::process::exit(1);
        }
    };

    if let Err(e) = result {
        eprintln!("Error: {e:#}");
        std::process::exit(1);
    }
}

fn print_usage() {
    println!(
        r#"gateway-cli: ai-lib-gateway 命令行工具

USAGE:
    gateway-cli <COMMAND> [ARGS]

COMMANDS:
    validate <config.yaml>      Validate providers, models and key secrets
    plan <config.yaml>          Print the auto-mode candidate order and eligible key counts
    version                     Show version information
    help                        Show this help message

ENVIRONMENT:
    AI_GATEWAY_MAX_RETRIES          Override retry.max_retries
    AI_GATEWAY_RETRY_DELAY_MS       Override retry.retry_delay_ms
    AI_GATEWAY_MAX_TOOL_ITERATIONS  Override tools.max_iterations
    RUST_LOG                        Log filter (default: warn)"#
    );
}

fn cmd_version() {
    println!("gateway-cli {}", env!("CARGO_PKG_VERSION"));
}

fn load(args: &[String]) -> anyhow::Result<GatewayConfig> {
    let Some(path) = args.first() else {
        bail!("missing <config.yaml> argument");
    };
    GatewayConfig::from_file(path).with_context(|| format!("loading {path}"))
}

fn cmd_validate(args: &[String]) -> anyhow::Result<()> {
    let config = load(args)?;
    let keys: usize = config.providers.iter().map(|p| p.keys.len()).sum();
    let models: usize = config.providers.iter().map(|p| p.models.len()).sum();
    println!(
        "OK: {} provider(s), {} model(s), {} key(s)",
        config.providers.len(),
        models,
        keys
    );
    println!(
        "retry: {} attempt(s), {}ms delay; tools: max {} iteration(s)",
        config.retry.max_retries, config.retry.retry_delay_ms, config.tools.max_iterations
    );
    Ok(())
}

async fn cmd_plan(args: &[String]) -> anyhow::Result<()> {
    let config = load(args)?;
    let catalog = config.build_catalog();
    let store = config.build_key_store()?;

    let candidates = ordered_candidates(&catalog).await?;
    if candidates.is_empty() {
        println!("No active provider/model candidates.");
        return Ok(());
    }

    println!("{:<4} {:<40} {}", "#", "candidate", "eligible keys");
    for (i, candidate) in candidates.iter().enumerate() {
        let eligible = select_candidates(store.keys_for(&candidate.provider).await?);
        let ids: Vec<&str> = eligible.iter().map(|k| k.id.as_str()).collect();
        println!(
            "{:<4} {:<40} {} [{}]",
            i + 1,
            candidate.token(),
            eligible.len(),
            ids.join(", ")
        );
    }
    Ok(())
}
