//! Command handlers behind the CLI

use anyhow::{Context as _, Result};
use clap::{Args, ValueEnum};
use lb_bootstrap_client::{ExecutionEnvironment, RpcConfig, RpcEnvironment, SimulatedEnvironment};
use lb_bootstrap_config::{AppConfig, Backend, NetworkConfig};
use lb_bootstrap_liquidity::{
    delta_ids, generate_curve, parse_bin_distribution, CurveProfile, CurveShape, DeadlinePolicy,
    DistributionTable, Placement, ShapeParams, WithdrawalParams,
};
use lb_bootstrap_orchestrator::{
    default_mint_amount, AddLiquidityOutcome, FundingReceipt, LiquidityExecutor, MockTokenSpec,
    Provisioner, ProvisioningPlan, ProvisioningReport, RedeployPolicy, RemoveLiquidityOutcome,
    TokenFunding,
};
use lb_bootstrap_registry::{AddressRegistry, JsonFileStore, RegistryStore};
use lb_bootstrap_types::{Address, ContractName, Network, PresetEntry, U256};
use rust_decimal::Decimal;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{info, warn};

// ═══════════════════════════════════════════════════════════════════════════
// ARGUMENTS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default, Args)]
pub struct DeployArgs {
    /// Redeploy this contract (and everything built on it) even if recorded
    #[arg(long = "redeploy", value_name = "NAME")]
    pub redeploy: Vec<ContractName>,

    /// Redeploy factory, pair implementation, router and quoter
    #[arg(long)]
    pub redeploy_core: bool,
}

#[derive(Debug, Clone, Args)]
pub struct FundArgs {
    /// Whole tokens to mint
    #[arg(long, default_value = "2000000", value_parser = parse_token_amount)]
    pub amount: U256,

    /// Defaults to the signer
    #[arg(long)]
    pub recipient: Option<Address>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CurveKind {
    Uniform,
    Gaussian,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum PlacementArg {
    Ask,
    Bid,
    Centered,
}

impl From<PlacementArg> for Placement {
    fn from(arg: PlacementArg) -> Self {
        match arg {
            PlacementArg::Ask => Placement::AskSide,
            PlacementArg::Bid => Placement::BidSide,
            PlacementArg::Centered => Placement::Centered,
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct AddLiquidityArgs {
    /// Wrapped native amount in whole tokens
    #[arg(long, default_value = "0", value_parser = parse_token_amount)]
    pub amount_x: U256,

    /// Mock token amount in whole tokens
    #[arg(long, default_value = "0", value_parser = parse_token_amount)]
    pub amount_y: U256,

    #[arg(long, default_value = "0", value_parser = parse_token_amount)]
    pub amount_x_min: U256,

    #[arg(long, default_value = "0", value_parser = parse_token_amount)]
    pub amount_y_min: U256,

    /// Number of bins of the generated curve
    #[arg(long)]
    pub bins: Option<usize>,

    /// Distance from the active id to the first seeded bin
    #[arg(long)]
    pub offset: Option<u32>,

    #[arg(long, value_enum)]
    pub curve: Option<CurveKind>,

    /// Gaussian width in bins
    #[arg(long)]
    pub sigma: Option<f64>,

    #[arg(long, value_enum)]
    pub placement: Option<PlacementArg>,

    /// Explicit `delta,x,y` bin entry with fractional weights; repeatable
    #[arg(
        long = "distribution",
        value_name = "DELTA,X,Y",
        allow_hyphen_values = true,
        value_parser = parse_bin_distribution,
        conflicts_with_all = ["bins", "offset", "curve", "sigma", "placement"]
    )]
    pub distribution: Vec<(i64, u128, u128)>,

    /// Defaults to the configured active id
    #[arg(long)]
    pub active_id: Option<u32>,

    #[arg(long)]
    pub id_slippage: Option<u32>,

    /// Seconds until the deadline
    #[arg(long, conflicts_with = "deadline")]
    pub ttl: Option<u64>,

    /// Explicit unix deadline
    #[arg(long)]
    pub deadline: Option<u64>,

    /// Defaults to the signer
    #[arg(long)]
    pub recipient: Option<Address>,
}

#[derive(Debug, Clone, Args)]
pub struct RemoveLiquidityArgs {
    /// Bin ids to withdraw from
    #[arg(long, value_delimiter = ',', required = true)]
    pub ids: Vec<u32>,

    /// Liquidity amounts per bin, in raw units
    #[arg(long, value_delimiter = ',', required = true)]
    pub amounts: Vec<U256>,

    #[arg(long, default_value = "0", value_parser = parse_token_amount)]
    pub amount_token_min: U256,

    #[arg(long, default_value = "0", value_parser = parse_token_amount)]
    pub amount_native_min: U256,

    #[arg(long, conflicts_with = "deadline")]
    pub ttl: Option<u64>,

    #[arg(long)]
    pub deadline: Option<u64>,

    #[arg(long)]
    pub recipient: Option<Address>,
}

/// Parse a whole-token amount with up to 18 decimals, e.g. `2.5`
pub fn parse_token_amount(src: &str) -> std::result::Result<U256, String> {
    let amount = Decimal::from_str(src.trim())
        .map_err(|e| format!("invalid amount '{src}': {e}"))?
        .normalize();
    if amount.scale() > 18 {
        return Err(format!("'{src}' has more than 18 decimals"));
    }
    let mantissa = u128::try_from(amount.mantissa())
        .map_err(|_| format!("amount '{src}' must not be negative"))?;

    Ok(U256::from(mantissa) * U256::from(10u64).pow(U256::from(18 - amount.scale())))
}

fn deadline_policy(deadline: Option<u64>, ttl: Option<u64>, default_ttl: u64) -> DeadlinePolicy {
    match (deadline, ttl) {
        (Some(at), _) => DeadlinePolicy::At(at),
        (None, Some(ttl)) => DeadlinePolicy::Ttl(ttl),
        (None, None) => DeadlinePolicy::Ttl(default_ttl),
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// CONTEXT
// ═══════════════════════════════════════════════════════════════════════════

/// Configuration resolved for the selected network
pub struct Context {
    config: AppConfig,
    network: Network,
    settings: NetworkConfig,
}

/// A connected environment plus the registry it is operated against
struct Session {
    environment: Arc<dyn ExecutionEnvironment>,
    registry: AddressRegistry,
}

impl Context {
    pub fn new(config: AppConfig, network: &str) -> Result<Self> {
        let (network, settings) = config.network(network)?;
        let settings = settings.clone();
        info!(network = %network, ephemeral = network.ephemeral, backend = ?settings.backend, "Selected network");
        Ok(Self {
            config,
            network,
            settings,
        })
    }

    fn store(&self) -> Arc<dyn RegistryStore> {
        Arc::new(JsonFileStore::new(&self.config.deployment.deployments_dir))
    }

    async fn environment(&self) -> Result<Arc<dyn ExecutionEnvironment>> {
        match self.settings.backend {
            Backend::Simulated => {
                let environment = match self.settings.signer {
                    Some(signer) => SimulatedEnvironment::with_signer(signer),
                    None => SimulatedEnvironment::new(),
                };
                info!(network = %self.network, signer = %environment.signer(), "Using simulated chain");
                Ok(Arc::new(environment))
            }
            Backend::Rpc => {
                let url = self
                    .settings
                    .rpc_url
                    .clone()
                    .with_context(|| format!("network {} has no rpc_url", self.network))?;
                let config = RpcConfig {
                    url,
                    signer: self.settings.signer,
                    poll_interval: Duration::from_millis(self.settings.poll_interval_ms),
                    max_poll_interval: Duration::from_millis(self.settings.max_poll_interval_ms),
                    confirmation_timeout: self
                        .settings
                        .confirmation_timeout_secs
                        .map(Duration::from_secs),
                    request_timeout: Duration::from_secs(self.settings.request_timeout_secs),
                };
                let environment = RpcEnvironment::connect(config)
                    .await
                    .with_context(|| format!("connecting to network {}", self.network))?;
                Ok(Arc::new(environment))
            }
        }
    }

    fn redeploy_policy(&self, args: &DeployArgs) -> RedeployPolicy {
        if args.redeploy_core || self.config.deployment.redeploy_core {
            return RedeployPolicy::Core;
        }

        let names: BTreeSet<ContractName> = self
            .config
            .deployment
            .redeploy
            .iter()
            .chain(&args.redeploy)
            .copied()
            .collect();
        if names.is_empty() {
            RedeployPolicy::ReuseAll
        } else {
            RedeployPolicy::Contracts(names)
        }
    }

    fn plan(&self, redeploy: RedeployPolicy) -> ProvisioningPlan {
        let deployment = &self.config.deployment;
        ProvisioningPlan {
            bin_step: deployment.bin_step,
            active_id: deployment.active_id,
            extra_bin_steps: deployment.preset_bin_steps.clone(),
            fee_recipient: deployment.fee_recipient,
            owner: deployment.owner,
            flash_loan_fee: U256::from(deployment.flash_loan_fee),
            mock_token: MockTokenSpec {
                name: deployment.mock_token.name.clone(),
                symbol: deployment.mock_token.symbol.clone(),
                decimals: deployment.mock_token.decimals,
            },
            redeploy,
        }
    }

    async fn provision(
        &self,
        environment: Arc<dyn ExecutionEnvironment>,
        redeploy: RedeployPolicy,
    ) -> Result<ProvisioningReport> {
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let interrupt = tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, stopping before the next step");
                let _ = cancel_tx.send(true);
            }
        });

        let provisioner = Provisioner::builder()
            .with_environment(environment)
            .with_store(self.store())
            .with_catalog(self.config.preset_catalog()?)
            .with_plan(self.plan(redeploy))
            .with_cancellation(cancel_rx)
            .build()?;
        let report = provisioner.run(&self.network).await;
        interrupt.abort();

        report.with_context(|| format!("provisioning network {}", self.network))
    }

    /// Connect and load the registry. A simulated chain starts empty, so it is
    /// provisioned and funded in-process first.
    async fn session(&self) -> Result<Session> {
        let environment = self.environment().await?;

        if self.settings.backend == Backend::Simulated {
            let report = self
                .provision(environment.clone(), RedeployPolicy::ReuseAll)
                .await?;
            let registry = AddressRegistry::from_entries(self.network.clone(), report.addresses);

            TokenFunding::from_registry(environment.clone(), &registry)?
                .fund_and_approve(environment.signer(), default_mint_amount())
                .await
                .context("funding the simulated signer")?;

            return Ok(Session {
                environment,
                registry,
            });
        }

        let registry = self
            .store()
            .load(&self.network)
            .await
            .with_context(|| format!("loading the registry of {}", self.network))?;
        Ok(Session {
            environment,
            registry,
        })
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// COMMANDS
// ═══════════════════════════════════════════════════════════════════════════

pub async fn deploy(ctx: &Context, args: DeployArgs) -> Result<ProvisioningReport> {
    let environment = ctx.environment().await?;
    let report = ctx.provision(environment, ctx.redeploy_policy(&args)).await?;

    info!(
        network = %ctx.network,
        deployed = report.deployed().len(),
        reused = report.reused().len(),
        transactions = report.transaction_count(),
        "Provisioning complete"
    );
    Ok(report)
}

pub fn presets(config: &AppConfig) -> Result<Vec<PresetEntry>> {
    let catalog = config.preset_catalog()?;
    Ok(catalog.iter().cloned().collect())
}

pub async fn registry(ctx: &Context) -> Result<BTreeMap<String, Address>> {
    if ctx.network.ephemeral {
        warn!(network = %ctx.network, "Ephemeral network, nothing is ever recorded");
    }

    let registry = ctx
        .store()
        .load(&ctx.network)
        .await
        .with_context(|| format!("loading the registry of {}", ctx.network))?;
    Ok(registry
        .iter()
        .map(|(name, address)| (name.to_string(), address))
        .collect())
}

pub async fn fund(ctx: &Context, args: FundArgs) -> Result<FundingReceipt> {
    let environment = ctx.environment().await?;
    let registry = if ctx.settings.backend == Backend::Simulated {
        let report = ctx
            .provision(environment.clone(), RedeployPolicy::ReuseAll)
            .await?;
        AddressRegistry::from_entries(ctx.network.clone(), report.addresses)
    } else {
        ctx.store().load(&ctx.network).await?
    };

    let recipient = args.recipient.unwrap_or_else(|| environment.signer());
    TokenFunding::from_registry(environment, &registry)?
        .fund_and_approve(recipient, args.amount)
        .await
        .context("minting and approving the mock token")
}

pub async fn add_liquidity(ctx: &Context, args: AddLiquidityArgs) -> Result<AddLiquidityOutcome> {
    let session = ctx.session().await?;
    let registry = &session.registry;
    let signer = session.environment.signer();
    let liquidity = &ctx.config.liquidity;

    let (delta_ids, distribution_x, distribution_y) = if args.distribution.is_empty() {
        let curve = curve_shape(&liquidity.curve, &args);
        let bins = args.bins.unwrap_or(liquidity.bins);
        let (x, y) = generate_curve(&curve, bins)?;
        (delta_ids(&curve, bins)?, x, y)
    } else {
        let table: DistributionTable = args.distribution.iter().copied().collect();
        (table.delta_ids, table.distribution_x, table.distribution_y)
    };

    let executor = LiquidityExecutor::from_registry(session.environment.clone(), registry)?;
    let recipient = args.recipient.unwrap_or(signer);
    let shape = executor
        .shape(ShapeParams {
            token_x: executor.wrapped_native(),
            token_y: registry.require(ContractName::MockErc20)?,
            bin_step: ctx.config.deployment.bin_step,
            amount_x: args.amount_x,
            amount_y: args.amount_y,
            amount_x_min: args.amount_x_min,
            amount_y_min: args.amount_y_min,
            active_id_desired: args.active_id.unwrap_or(ctx.config.deployment.active_id),
            id_slippage: args.id_slippage.unwrap_or(liquidity.id_slippage),
            delta_ids,
            distribution_x,
            distribution_y,
            recipient,
            refund_recipient: recipient,
            deadline: deadline_policy(args.deadline, args.ttl, liquidity.deadline_ttl_secs),
        })
        .await
        .context("invalid liquidity shape")?;

    executor
        .add_liquidity(&shape)
        .await
        .context("adding liquidity")
}

pub async fn remove_liquidity(ctx: &Context, args: RemoveLiquidityArgs) -> Result<RemoveLiquidityOutcome> {
    let session = ctx.session().await?;
    let executor = LiquidityExecutor::from_registry(session.environment.clone(), &session.registry)?;

    let withdrawal = executor
        .withdrawal(WithdrawalParams {
            token: session.registry.require(ContractName::MockErc20)?,
            bin_step: ctx.config.deployment.bin_step,
            amount_token_min: args.amount_token_min,
            amount_native_min: args.amount_native_min,
            ids: args.ids,
            amounts: args.amounts,
            recipient: args.recipient.unwrap_or_else(|| session.environment.signer()),
            deadline: deadline_policy(
                args.deadline,
                args.ttl,
                ctx.config.liquidity.deadline_ttl_secs,
            ),
        })
        .await
        .context("invalid withdrawal")?;

    executor
        .remove_liquidity(&withdrawal)
        .await
        .context("removing liquidity")
}

/// Configured curve with command line overrides applied
fn curve_shape(configured: &CurveShape, args: &AddLiquidityArgs) -> CurveShape {
    let mut shape = *configured;

    match (args.curve, args.sigma) {
        (Some(CurveKind::Uniform), _) => shape.profile = CurveProfile::Uniform,
        (Some(CurveKind::Gaussian), sigma) => shape.profile = CurveProfile::Gaussian { sigma },
        (None, Some(sigma)) => shape.profile = CurveProfile::Gaussian { sigma: Some(sigma) },
        (None, None) => {}
    }
    if let Some(placement) = args.placement {
        shape.placement = placement.into();
    }
    if let Some(offset) = args.offset {
        shape.offset = offset;
    }
    shape
}
