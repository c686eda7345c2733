//! Idempotent provisioning of the Liquidity Book contract set.
//!
//! A run walks [`ProvisioningStep::ALL`] in order. Deploy steps go through
//! [`AddressRegistry::resolve`] so recorded contracts are reused; wiring steps
//! read factory state first and only submit what is missing. The registry is
//! persisted after every step that changes it, so an aborted run resumes from
//! the last completed deployment.

use lb_bootstrap_client::{
    CallValue, ClientError, ContractCall, DeployRequest, ExecutionEnvironment, Receipt,
};
use lb_bootstrap_liquidity::price_from_id;
use lb_bootstrap_registry::{AddressRegistry, RegistryError, RegistryStore, Resolution};
use lb_bootstrap_types::{
    Address, ContractName, Network, PresetCatalog, PresetEntry, PresetError, B256, NULL_ADDRESS,
    U256,
};
use serde::{Serialize, Serializer};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::watch;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use crate::ProvisioningStep;

pub const DEFAULT_BIN_STEP: u16 = 20;

/// Active id of the seeded pair, about 0.0232 quote per base at bin step 20
pub const DEFAULT_ACTIVE_ID: u32 = 8_373_869;

/// Flash loan fee passed to the factory constructor (1e18 = 100%)
pub const DEFAULT_FLASH_LOAN_FEE: u64 = 5_000_000_000_000;

// ═══════════════════════════════════════════════════════════════════════════
// RUN IDENTITY
// ═══════════════════════════════════════════════════════════════════════════

/// Correlation id shared by every log line of one provisioning run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RunId(Uuid);

impl RunId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for RunId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for RunId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for RunId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// PLAN
// ═══════════════════════════════════════════════════════════════════════════

/// Which recorded contracts to discard before resolving
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum RedeployPolicy {
    /// Reuse every recorded address
    #[default]
    ReuseAll,
    /// Forget the named entries
    Contracts(BTreeSet<ContractName>),
    /// Legacy behaviour: factory, pair implementation, router and quoter every run
    Core,
}

impl RedeployPolicy {
    pub fn targets(&self) -> BTreeSet<ContractName> {
        match self {
            RedeployPolicy::ReuseAll => BTreeSet::new(),
            RedeployPolicy::Contracts(names) => names.clone(),
            RedeployPolicy::Core => ContractName::CORE.into_iter().collect(),
        }
    }
}

/// Constructor arguments of the mock quote asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MockTokenSpec {
    pub name: String,
    pub symbol: String,
    pub decimals: u8,
}

impl Default for MockTokenSpec {
    fn default() -> Self {
        Self {
            name: "MockERC20".to_string(),
            symbol: "mERC20".to_string(),
            decimals: 18,
        }
    }
}

/// Everything a run needs besides the environment and storage
#[derive(Debug, Clone)]
pub struct ProvisioningPlan {
    /// Bin step of the created pair
    pub bin_step: u16,
    /// Initial active id of the created pair
    pub active_id: u32,
    /// Bin steps registered on the factory in addition to `bin_step`
    pub extra_bin_steps: Vec<u16>,
    /// Defaults to the signer
    pub fee_recipient: Option<Address>,
    /// Defaults to the signer
    pub owner: Option<Address>,
    pub flash_loan_fee: U256,
    pub mock_token: MockTokenSpec,
    pub redeploy: RedeployPolicy,
}

impl Default for ProvisioningPlan {
    fn default() -> Self {
        Self {
            bin_step: DEFAULT_BIN_STEP,
            active_id: DEFAULT_ACTIVE_ID,
            extra_bin_steps: Vec::new(),
            fee_recipient: None,
            owner: None,
            flash_loan_fee: U256::from(DEFAULT_FLASH_LOAN_FEE),
            mock_token: MockTokenSpec::default(),
            redeploy: RedeployPolicy::default(),
        }
    }
}

impl ProvisioningPlan {
    /// Bin steps to register, ascending and deduplicated
    pub fn preset_bin_steps(&self) -> Vec<u16> {
        let mut steps: BTreeSet<u16> = self.extra_bin_steps.iter().copied().collect();
        steps.insert(self.bin_step);
        steps.into_iter().collect()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// REPORT
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StepOutcome {
    Deployed { address: Address },
    Reused { address: Address },
    Submitted { tx_hashes: Vec<B256> },
    AlreadySatisfied,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepRecord {
    pub step: ProvisioningStep,
    pub outcome: StepOutcome,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProvisioningReport {
    pub run_id: RunId,
    pub network: String,
    pub steps: Vec<StepRecord>,
    /// Pair created or found by the last step
    pub pair: Option<Address>,
    /// Registry contents at the end of the run
    pub addresses: BTreeMap<String, Address>,
}

impl ProvisioningReport {
    fn new(run_id: RunId, network: &Network) -> Self {
        Self {
            run_id,
            network: network.name.clone(),
            steps: Vec::with_capacity(ProvisioningStep::ALL.len()),
            pair: None,
            addresses: BTreeMap::new(),
        }
    }

    pub fn outcome(&self, step: ProvisioningStep) -> Option<&StepOutcome> {
        self.steps
            .iter()
            .find(|record| record.step == step)
            .map(|record| &record.outcome)
    }

    /// Contracts deployed during this run
    pub fn deployed(&self) -> Vec<ContractName> {
        self.steps
            .iter()
            .filter(|record| matches!(record.outcome, StepOutcome::Deployed { .. }))
            .filter_map(|record| record.step.produces())
            .collect()
    }

    /// Contracts taken from the registry unchanged
    pub fn reused(&self) -> Vec<ContractName> {
        self.steps
            .iter()
            .filter(|record| matches!(record.outcome, StepOutcome::Reused { .. }))
            .filter_map(|record| record.step.produces())
            .collect()
    }

    pub fn transaction_count(&self) -> usize {
        self.steps
            .iter()
            .map(|record| match &record.outcome {
                StepOutcome::Deployed { .. } => 1,
                StepOutcome::Submitted { tx_hashes } => tx_hashes.len(),
                StepOutcome::Reused { .. } | StepOutcome::AlreadySatisfied => 0,
            })
            .sum()
    }
}

// ═══════════════════════════════════════════════════════════════════════════
// ERRORS
// ═══════════════════════════════════════════════════════════════════════════

#[derive(Debug, Error)]
pub enum ProvisioningError {
    #[error(transparent)]
    Registry(#[from] RegistryError),

    #[error(transparent)]
    Preset(#[from] PresetError),

    #[error("step {step} failed: remote call rejected: {reason}")]
    RemoteCallRejected {
        step: ProvisioningStep,
        reason: String,
    },

    #[error("step {step} failed: {source}")]
    Transport {
        step: ProvisioningStep,
        #[source]
        source: ClientError,
    },

    #[error("step {step} failed: unexpected response: {reason}")]
    InvalidResponse {
        step: ProvisioningStep,
        reason: String,
    },

    #[error("provisioning cancelled before step {step}")]
    Cancelled { step: ProvisioningStep },
}

impl ProvisioningError {
    /// Step the run stopped at, when the failure belongs to one
    pub fn step(&self) -> Option<ProvisioningStep> {
        match self {
            ProvisioningError::RemoteCallRejected { step, .. }
            | ProvisioningError::Transport { step, .. }
            | ProvisioningError::InvalidResponse { step, .. }
            | ProvisioningError::Cancelled { step } => Some(*step),
            ProvisioningError::Registry(_) | ProvisioningError::Preset(_) => None,
        }
    }
}

fn step_failure(step: ProvisioningStep, err: ClientError) -> ProvisioningError {
    if err.is_remote_failure() {
        ProvisioningError::RemoteCallRejected {
            step,
            reason: err.reason(),
        }
    } else {
        ProvisioningError::Transport { step, source: err }
    }
}

/// Builder error
#[derive(Debug, Error)]
pub enum BuilderError {
    #[error("missing required field: {field}")]
    MissingField { field: String },
}

// ═══════════════════════════════════════════════════════════════════════════
// PROVISIONER
// ═══════════════════════════════════════════════════════════════════════════

/// Drives the provisioning pipeline against one environment and store
pub struct Provisioner {
    environment: Arc<dyn ExecutionEnvironment>,
    store: Arc<dyn RegistryStore>,
    catalog: PresetCatalog,
    plan: ProvisioningPlan,
    cancel: Option<watch::Receiver<bool>>,
}

/// Mutable state of one run
struct RunState {
    registry: AddressRegistry,
    pair: Option<Address>,
}

impl Provisioner {
    pub fn builder() -> ProvisionerBuilder {
        ProvisionerBuilder::default()
    }

    pub fn plan(&self) -> &ProvisioningPlan {
        &self.plan
    }

    pub fn catalog(&self) -> &PresetCatalog {
        &self.catalog
    }

    /// Run the whole pipeline for `network`.
    ///
    /// Stops at the first failing step; everything recorded before it stays
    /// persisted and is reused by the next run.
    pub async fn run(&self, network: &Network) -> Result<ProvisioningReport, ProvisioningError> {
        let run_id = RunId::new();
        let span = info_span!("provision", network = %network, run_id = %run_id);
        self.execute(network, run_id).instrument(span).await
    }

    async fn execute(
        &self,
        network: &Network,
        run_id: RunId,
    ) -> Result<ProvisioningReport, ProvisioningError> {
        // Unknown bin steps fail before anything is submitted
        let presets = self
            .plan
            .preset_bin_steps()
            .into_iter()
            .map(|bin_step| self.catalog.get_preset(bin_step).cloned())
            .collect::<Result<Vec<_>, _>>()?;

        let mut registry = self.store.load(network).await?;
        info!(
            entries = registry.len(),
            ephemeral = network.ephemeral,
            signer = %self.environment.signer(),
            "Starting provisioning"
        );

        self.apply_redeploy_policy(&mut registry);

        let mut run = RunState {
            registry,
            pair: None,
        };
        let mut report = ProvisioningReport::new(run_id, network);

        for step in ProvisioningStep::ALL {
            self.check_cancelled(step)?;

            let outcome = match self.run_step(step, &mut run, &presets).await {
                Ok(outcome) => outcome,
                Err(err) => {
                    warn!(step = %step, error = %err, "Provisioning step failed");
                    return Err(err);
                }
            };

            debug!(step = %step, outcome = ?outcome, "Step finished");
            report.steps.push(StepRecord { step, outcome });
        }

        self.store.persist(&run.registry).await?;

        report.pair = run.pair;
        report.addresses = run
            .registry
            .iter()
            .map(|(name, address)| (name.to_string(), address))
            .collect();

        info!(
            deployed = report.deployed().len(),
            reused = report.reused().len(),
            transactions = report.transaction_count(),
            pair = ?report.pair,
            "Provisioning complete"
        );
        Ok(report)
    }

    fn apply_redeploy_policy(&self, registry: &mut AddressRegistry) {
        if self.plan.redeploy == RedeployPolicy::Core {
            warn!("Legacy redeploy mode: factory, pair implementation, router and quoter are redeployed every run");
        }
        for name in self.plan.redeploy.targets() {
            registry.reset(name);
        }
    }

    fn check_cancelled(&self, next: ProvisioningStep) -> Result<(), ProvisioningError> {
        match &self.cancel {
            Some(cancel) if *cancel.borrow() => {
                warn!(next_step = %next, "Cancellation requested, stopping");
                Err(ProvisioningError::Cancelled { step: next })
            }
            _ => Ok(()),
        }
    }

    async fn run_step(
        &self,
        step: ProvisioningStep,
        run: &mut RunState,
        presets: &[PresetEntry],
    ) -> Result<StepOutcome, ProvisioningError> {
        check_requirements(step, &run.registry)?;
        let signer = self.environment.signer();

        match step {
            ProvisioningStep::DeployWrappedNative => {
                let request = DeployRequest::new(ContractName::WIota.as_str());
                self.provision(step, ContractName::WIota, request, run).await
            }
            ProvisioningStep::DeployMockToken => {
                let token = &self.plan.mock_token;
                let request = DeployRequest::new(ContractName::MockErc20.as_str())
                    .arg(token.name.as_str())
                    .arg(token.symbol.as_str())
                    .arg(u16::from(token.decimals));
                self.provision(step, ContractName::MockErc20, request, run).await
            }
            ProvisioningStep::DeployFactory => {
                let request = DeployRequest::new(ContractName::LbFactory.as_str())
                    .arg(self.plan.fee_recipient.unwrap_or(signer))
                    .arg(self.plan.owner.unwrap_or(signer))
                    .arg(self.plan.flash_loan_fee);
                self.provision(step, ContractName::LbFactory, request, run).await
            }
            ProvisioningStep::DeployPairImplementation => {
                let factory = run.registry.require(ContractName::LbFactory)?;
                let request = DeployRequest::new(ContractName::LbPair.as_str()).arg(factory);
                self.provision(step, ContractName::LbPair, request, run).await
            }
            ProvisioningStep::DeployRouter => {
                let factory = run.registry.require(ContractName::LbFactory)?;
                let wrapped_native = run.registry.require(ContractName::WIota)?;
                // Legacy factories and pair versions are not wired on this chain
                let request = DeployRequest::new(ContractName::LbRouter.as_str())
                    .arg(factory)
                    .arg(NULL_ADDRESS)
                    .arg(NULL_ADDRESS)
                    .arg(NULL_ADDRESS)
                    .arg(NULL_ADDRESS)
                    .arg(wrapped_native);
                self.provision(step, ContractName::LbRouter, request, run).await
            }
            ProvisioningStep::DeployQuoter => {
                let factory = run.registry.require(ContractName::LbFactory)?;
                let router = run.registry.require(ContractName::LbRouter)?;
                let request = DeployRequest::new(ContractName::LbQuoter.as_str())
                    .arg(NULL_ADDRESS)
                    .arg(NULL_ADDRESS)
                    .arg(NULL_ADDRESS)
                    .arg(factory)
                    .arg(NULL_ADDRESS)
                    .arg(NULL_ADDRESS)
                    .arg(router);
                self.provision(step, ContractName::LbQuoter, request, run).await
            }
            ProvisioningStep::SetPairImplementation => self.set_pair_implementation(step, run).await,
            ProvisioningStep::RegisterPresets => self.register_presets(step, run, presets).await,
            ProvisioningStep::WhitelistQuoteAsset => self.whitelist_quote_asset(step, run).await,
            ProvisioningStep::CreatePair => self.create_pair(step, run).await,
        }
    }

    /// Resolve one contract through the registry, deploying it when absent
    async fn provision(
        &self,
        step: ProvisioningStep,
        name: ContractName,
        request: DeployRequest,
        run: &mut RunState,
    ) -> Result<StepOutcome, ProvisioningError> {
        let environment = Arc::clone(&self.environment);
        let resolution = run
            .registry
            .resolve(name, move || async move {
                deploy_and_confirm(environment.as_ref(), step, request).await
            })
            .await?;

        match resolution {
            Resolution::Reused(address) => {
                info!(step = %step, contract = %name, address = %address, "Reusing recorded contract");
                Ok(StepOutcome::Reused { address })
            }
            Resolution::Provisioned(address) => {
                // Dependents recorded earlier were built against the old address
                for dependent in transitive_dependents(name) {
                    if let Some(stale) = run.registry.reset(dependent) {
                        info!(
                            contract = %dependent,
                            dependency = %name,
                            stale = %stale,
                            "Dependency redeployed, dependent will be redeployed"
                        );
                    }
                }
                self.store.persist(&run.registry).await?;
                Ok(StepOutcome::Deployed { address })
            }
        }
    }

    async fn set_pair_implementation(
        &self,
        step: ProvisioningStep,
        run: &RunState,
    ) -> Result<StepOutcome, ProvisioningError> {
        let factory = run.registry.require(ContractName::LbFactory)?;
        let implementation = run.registry.require(ContractName::LbPair)?;

        let current = self
            .view(step, ContractCall::new(factory, "getLBPairImplementation"))
            .await
            .and_then(|values| first_address(step, &values))?;
        if current == implementation {
            info!(step = %step, implementation = %implementation, "Pair implementation already set");
            return Ok(StepOutcome::AlreadySatisfied);
        }

        let receipt = self
            .transact(
                step,
                ContractCall::new(factory, "setLBPairImplementation").arg(implementation),
            )
            .await?;
        info!(step = %step, implementation = %implementation, "Pair implementation set");
        Ok(StepOutcome::Submitted {
            tx_hashes: vec![receipt.tx_hash],
        })
    }

    async fn register_presets(
        &self,
        step: ProvisioningStep,
        run: &RunState,
        presets: &[PresetEntry],
    ) -> Result<StepOutcome, ProvisioningError> {
        let factory = run.registry.require(ContractName::LbFactory)?;

        let values = self
            .view(step, ContractCall::new(factory, "getAllBinSteps"))
            .await?;
        let registered: BTreeSet<U256> = values
            .first()
            .and_then(CallValue::as_uint_array)
            .ok_or_else(|| ProvisioningError::InvalidResponse {
                step,
                reason: "getAllBinSteps did not return a list of bin steps".to_string(),
            })?
            .into_iter()
            .collect();

        let mut tx_hashes = Vec::new();
        for preset in presets {
            if registered.contains(&U256::from(preset.bin_step)) {
                debug!(bin_step = preset.bin_step, "Preset already registered");
                continue;
            }
            let receipt = self.transact(step, set_preset_call(factory, preset)).await?;
            info!(bin_step = preset.bin_step, tx_hash = %receipt.tx_hash, "Preset registered");
            tx_hashes.push(receipt.tx_hash);
        }

        if tx_hashes.is_empty() {
            info!(step = %step, "All presets already registered");
            Ok(StepOutcome::AlreadySatisfied)
        } else {
            Ok(StepOutcome::Submitted { tx_hashes })
        }
    }

    async fn whitelist_quote_asset(
        &self,
        step: ProvisioningStep,
        run: &RunState,
    ) -> Result<StepOutcome, ProvisioningError> {
        let factory = run.registry.require(ContractName::LbFactory)?;
        let quote_asset = run.registry.require(ContractName::MockErc20)?;

        let whitelisted = self
            .view(step, ContractCall::new(factory, "isQuoteAsset").arg(quote_asset))
            .await?
            .first()
            .and_then(CallValue::as_bool)
            .ok_or_else(|| ProvisioningError::InvalidResponse {
                step,
                reason: "isQuoteAsset did not return a bool".to_string(),
            })?;
        if whitelisted {
            info!(step = %step, token = %quote_asset, "Quote asset already whitelisted");
            return Ok(StepOutcome::AlreadySatisfied);
        }

        let receipt = self
            .transact(step, ContractCall::new(factory, "addQuoteAsset").arg(quote_asset))
            .await?;
        info!(step = %step, token = %quote_asset, "Quote asset whitelisted");
        Ok(StepOutcome::Submitted {
            tx_hashes: vec![receipt.tx_hash],
        })
    }

    async fn create_pair(
        &self,
        step: ProvisioningStep,
        run: &mut RunState,
    ) -> Result<StepOutcome, ProvisioningError> {
        let factory = run.registry.require(ContractName::LbFactory)?;
        let token_x = run.registry.require(ContractName::WIota)?;
        let token_y = run.registry.require(ContractName::MockErc20)?;
        let bin_step = self.plan.bin_step;

        if let Some(existing) = self.find_pair(step, factory, token_x, token_y).await? {
            info!(step = %step, pair = %existing, bin_step, "Pair already exists");
            run.pair = Some(existing);
            return Ok(StepOutcome::AlreadySatisfied);
        }

        let receipt = self
            .transact(
                step,
                ContractCall::new(factory, "createLBPair")
                    .arg(token_x)
                    .arg(token_y)
                    .arg(self.plan.active_id)
                    .arg(bin_step),
            )
            .await?;

        let pair = match receipt.outputs.first().and_then(CallValue::as_address) {
            Some(pair) => pair,
            None => self
                .find_pair(step, factory, token_x, token_y)
                .await?
                .ok_or_else(|| ProvisioningError::InvalidResponse {
                    step,
                    reason: "pair not visible after createLBPair confirmed".to_string(),
                })?,
        };

        match price_from_id(self.plan.active_id, bin_step) {
            Some(price) => info!(
                step = %step,
                pair = %pair,
                active_id = self.plan.active_id,
                bin_step,
                price = %price,
                "Pair created"
            ),
            None => info!(step = %step, pair = %pair, active_id = self.plan.active_id, bin_step, "Pair created"),
        }

        run.pair = Some(pair);
        Ok(StepOutcome::Submitted {
            tx_hashes: vec![receipt.tx_hash],
        })
    }

    async fn find_pair(
        &self,
        step: ProvisioningStep,
        factory: Address,
        token_x: Address,
        token_y: Address,
    ) -> Result<Option<Address>, ProvisioningError> {
        let values = self
            .view(
                step,
                ContractCall::new(factory, "getLBPairInformation")
                    .arg(token_x)
                    .arg(token_y)
                    .arg(self.plan.bin_step),
            )
            .await?;

        // (binStep, LBPair, createdByOwner, ignoredForRouting)
        let pair = values
            .first()
            .and_then(CallValue::as_array)
            .and_then(|fields| fields.get(1))
            .and_then(CallValue::as_address)
            .ok_or_else(|| ProvisioningError::InvalidResponse {
                step,
                reason: "getLBPairInformation returned no pair address".to_string(),
            })?;

        Ok((pair != NULL_ADDRESS).then_some(pair))
    }

    async fn view(
        &self,
        step: ProvisioningStep,
        call: ContractCall,
    ) -> Result<Vec<CallValue>, ProvisioningError> {
        debug!(step = %step, method = %call.method, to = %call.to, "View call");
        self.environment
            .call_view(call)
            .await
            .map_err(|err| step_failure(step, err))
    }

    async fn transact(
        &self,
        step: ProvisioningStep,
        call: ContractCall,
    ) -> Result<Receipt, ProvisioningError> {
        info!(step = %step, method = %call.method, to = %call.to, "Submitting call");
        let pending = self
            .environment
            .submit(call)
            .await
            .map_err(|err| step_failure(step, err))?;
        self.environment
            .wait_for_confirmation(&pending)
            .await
            .map_err(|err| step_failure(step, err))
    }
}

async fn deploy_and_confirm(
    environment: &dyn ExecutionEnvironment,
    step: ProvisioningStep,
    request: DeployRequest,
) -> Result<Address, ProvisioningError> {
    info!(step = %step, artifact = %request.artifact, "Deploying contract");
    let pending = environment
        .deploy(request)
        .await
        .map_err(|err| step_failure(step, err))?;
    let receipt = environment
        .wait_for_confirmation(&pending)
        .await
        .map_err(|err| step_failure(step, err))?;
    let address = receipt
        .deployed_address()
        .map_err(|err| ProvisioningError::InvalidResponse {
            step,
            reason: err.reason(),
        })?;
    info!(step = %step, address = %address, tx_hash = %receipt.tx_hash, "Contract deployed");
    Ok(address)
}

fn first_address(step: ProvisioningStep, values: &[CallValue]) -> Result<Address, ProvisioningError> {
    values
        .first()
        .and_then(CallValue::as_address)
        .ok_or_else(|| ProvisioningError::InvalidResponse {
            step,
            reason: "expected an address".to_string(),
        })
}

fn set_preset_call(factory: Address, preset: &PresetEntry) -> ContractCall {
    ContractCall::new(factory, "setPreset")
        .arg(preset.bin_step)
        .arg(preset.base_factor)
        .arg(preset.filter_period)
        .arg(preset.decay_period)
        .arg(preset.reduction_factor)
        .arg(preset.variable_fee_control)
        .arg(preset.protocol_share)
        .arg(preset.max_volatility_accumulated)
        .arg(preset.is_open)
}

/// Fail with `MissingEntry` unless every contract `step` builds on is recorded
fn check_requirements(step: ProvisioningStep, registry: &AddressRegistry) -> Result<(), ProvisioningError> {
    for name in step.requires() {
        if let Err(err) = registry.require(*name) {
            warn!(step = %step, contract = %name, "Step precondition not met");
            return Err(err.into());
        }
    }
    Ok(())
}

/// Every contract built, directly or not, against `name`
fn transitive_dependents(name: ContractName) -> BTreeSet<ContractName> {
    let mut found = BTreeSet::new();
    let mut queue = name.dependents();
    while let Some(next) = queue.pop() {
        if found.insert(next) {
            queue.extend(next.dependents());
        }
    }
    found
}

// ═══════════════════════════════════════════════════════════════════════════
// BUILDER
// ═══════════════════════════════════════════════════════════════════════════

/// Builder for [`Provisioner`]
#[derive(Default)]
pub struct ProvisionerBuilder {
    environment: Option<Arc<dyn ExecutionEnvironment>>,
    store: Option<Arc<dyn RegistryStore>>,
    catalog: Option<PresetCatalog>,
    plan: ProvisioningPlan,
    cancel: Option<watch::Receiver<bool>>,
}

impl ProvisionerBuilder {
    pub fn with_environment(mut self, environment: Arc<dyn ExecutionEnvironment>) -> Self {
        self.environment = Some(environment);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn RegistryStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Defaults to [`PresetCatalog::standard`]
    pub fn with_catalog(mut self, catalog: PresetCatalog) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_plan(mut self, plan: ProvisioningPlan) -> Self {
        self.plan = plan;
        self
    }

    /// Stop before the next step once the channel holds `true`
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    pub fn build(self) -> Result<Provisioner, BuilderError> {
        let environment = self.environment.ok_or_else(|| BuilderError::MissingField {
            field: "environment".to_string(),
        })?;

        let store = self.store.ok_or_else(|| BuilderError::MissingField {
            field: "store".to_string(),
        })?;

        Ok(Provisioner {
            environment,
            store,
            catalog: self.catalog.unwrap_or_default(),
            plan: self.plan,
            cancel: self.cancel,
        })
    }
}

#[cfg(test)]
mod unit_tests {
    use super::*;

    #[test]
    fn test_transitive_dependents() {
        let from_factory = transitive_dependents(ContractName::LbFactory);
        assert_eq!(
            from_factory,
            [ContractName::LbPair, ContractName::LbRouter, ContractName::LbQuoter]
                .into_iter()
                .collect()
        );

        let from_wrapped = transitive_dependents(ContractName::WIota);
        assert_eq!(
            from_wrapped,
            [ContractName::LbRouter, ContractName::LbQuoter].into_iter().collect()
        );

        assert!(transitive_dependents(ContractName::LbQuoter).is_empty());
    }

    #[test]
    fn test_step_requirements_gate_execution() {
        let network = Network::new("local_geth");
        let factory = Address::repeat_byte(1);
        let registry = AddressRegistry::from_entries(
            network.clone(),
            [(ContractName::LbFactory.as_str().to_string(), factory)],
        );

        check_requirements(ProvisioningStep::DeployPairImplementation, &registry).unwrap();
        check_requirements(ProvisioningStep::RegisterPresets, &registry).unwrap();

        let err = check_requirements(ProvisioningStep::DeployQuoter, &registry).unwrap_err();
        assert!(matches!(
            err,
            ProvisioningError::Registry(RegistryError::MissingEntry {
                name: ContractName::LbRouter,
                ..
            })
        ));

        let empty = AddressRegistry::empty(network);
        check_requirements(ProvisioningStep::DeployWrappedNative, &empty).unwrap();
        assert!(check_requirements(ProvisioningStep::CreatePair, &empty).is_err());
    }

    #[test]
    fn test_plan_always_registers_pair_bin_step() {
        let plan = ProvisioningPlan {
            extra_bin_steps: vec![25, 1, 25],
            ..ProvisioningPlan::default()
        };
        assert_eq!(plan.preset_bin_steps(), vec![1, 20, 25]);
    }

    #[test]
    fn test_redeploy_targets() {
        assert!(RedeployPolicy::ReuseAll.targets().is_empty());
        assert_eq!(RedeployPolicy::Core.targets().len(), 4);

        let only_router = RedeployPolicy::Contracts([ContractName::LbRouter].into_iter().collect());
        assert_eq!(only_router.targets().len(), 1);
    }

    #[test]
    fn test_builder_requires_environment_and_store() {
        let err = Provisioner::builder().build().err();
        assert!(matches!(
            err,
            Some(BuilderError::MissingField { field }) if field == "environment"
        ));
    }
}
