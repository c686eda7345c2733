//! Liquidity Book bootstrap tool
//!
//! Deploys the exchange contracts, registers presets, creates the pair and
//! seeds or withdraws liquidity. Results are printed to stdout as JSON; logs
//! go to stderr.

mod commands;
mod logging;

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use lb_bootstrap_config::{validate_config, AppConfig, ConfigLoader};
use lb_bootstrap_types::EPHEMERAL_NETWORK;
use serde::Serialize;
use std::path::PathBuf;

use crate::commands::{AddLiquidityArgs, Context, DeployArgs, FundArgs, RemoveLiquidityArgs};

/// Liquidity Book bootstrap CLI
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (TOML, YAML or JSON); `config/default.toml` is used when present
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Target network, as named under `[networks]`
    #[arg(long, global = true, default_value = EPHEMERAL_NETWORK)]
    network: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Deploy and wire the exchange contracts, reusing recorded addresses
    Deploy(DeployArgs),
    /// Print the preset catalog
    Presets,
    /// Print the recorded addresses of the network
    Registry,
    /// Mint the mock token and approve the router
    Fund(FundArgs),
    /// Seed liquidity into the pair
    AddLiquidity(AddLiquidityArgs),
    /// Withdraw liquidity for the native token and the mock token
    RemoveLiquidity(RemoveLiquidityArgs),
}

fn to_json<T: Serialize>(value: &T) -> anyhow::Result<String> {
    serde_json::to_string_pretty(value).context("serializing output")
}

async fn execute(config: AppConfig, network: &str, command: Commands) -> anyhow::Result<String> {
    match command {
        Commands::Presets => to_json(&commands::presets(&config)?),
        Commands::Deploy(args) => {
            let ctx = Context::new(config, network)?;
            to_json(&commands::deploy(&ctx, args).await?)
        }
        Commands::Registry => {
            let ctx = Context::new(config, network)?;
            to_json(&commands::registry(&ctx).await?)
        }
        Commands::Fund(args) => {
            let ctx = Context::new(config, network)?;
            to_json(&commands::fund(&ctx, args).await?)
        }
        Commands::AddLiquidity(args) => {
            let ctx = Context::new(config, network)?;
            to_json(&commands::add_liquidity(&ctx, args).await?)
        }
        Commands::RemoveLiquidity(args) => {
            let ctx = Context::new(config, network)?;
            to_json(&commands::remove_liquidity(&ctx, args).await?)
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = ConfigLoader::load(cli.config.as_deref()).context("loading configuration")?;
    validate_config(&config).context("invalid configuration")?;
    logging::init_logging(&config.logging)?;

    let output = execute(config, &cli.network, cli.command).await?;
    println!("{output}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_global_flags_after_subcommand() {
        let cli = Cli::try_parse_from([
            "lb-bootstrap",
            "deploy",
            "--redeploy",
            "LBRouter",
            "--network",
            "local_geth",
        ])
        .unwrap();

        assert_eq!(cli.network, "local_geth");
        match cli.command {
            Commands::Deploy(args) => assert_eq!(args.redeploy.len(), 1),
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_presets_need_no_network() {
        let output = execute(AppConfig::default(), "nowhere", Commands::Presets)
            .await
            .unwrap();

        let presets: serde_json::Value = serde_json::from_str(&output).unwrap();
        let bin_steps: Vec<u64> = presets
            .as_array()
            .unwrap()
            .iter()
            .map(|preset| preset["bin_step"].as_u64().unwrap())
            .collect();
        assert_eq!(bin_steps, vec![1, 2, 5, 10, 15, 20, 25]);
    }

    #[tokio::test]
    async fn test_unknown_network_is_an_error() {
        let err = execute(AppConfig::default(), "nowhere", Commands::Registry)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("nowhere"));
    }

    #[test]
    fn test_network_defaults_to_hardhat() {
        let cli = Cli::try_parse_from(["lb-bootstrap", "registry"]).unwrap();
        assert_eq!(cli.network, "hardhat");
        assert!(cli.config.is_none());
    }
}
