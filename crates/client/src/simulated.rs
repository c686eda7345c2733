use async_trait::async_trait;
use lb_bootstrap_types::{Address, ContractName, B256, I256, U256};
use std::collections::{BTreeSet, HashMap};
use std::sync::{Mutex, MutexGuard, PoisonError};
use tracing::debug;

use crate::{
    CallValue, ClientError, ContractCall, DeployRequest, ExecutionEnvironment, PendingTx, Receipt,
};

/// Fixed-point unit of liquidity distributions
const ONE: u128 = 1_000_000_000_000_000_000;

/// Injected failure for a method or artifact label
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureMode {
    /// Refused at submission; nothing reaches the chain
    Reject(String),
    /// Accepted, then reverts when confirmed
    Revert(String),
}

/// A confirmed deployment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeployRecord {
    pub artifact: String,
    pub address: Address,
    pub constructor_args: Vec<CallValue>,
}

/// In-memory execution environment.
///
/// Addresses follow CREATE derivation from the signer's nonce, so runs are
/// deterministic. Enough factory, router and token behaviour is modelled for
/// view calls to reflect earlier transactions and for the router's deadline,
/// slippage and balance checks to revert the way a chain would. Effects are
/// applied at confirmation time, never at submission.
pub struct SimulatedEnvironment {
    signer: Address,
    state: Mutex<SimState>,
}

#[derive(Default)]
struct SimState {
    nonce: u64,
    tx_counter: u64,
    clock: Option<u64>,
    labels: Vec<String>,
    submitted: Vec<ContractCall>,
    view_calls: Vec<ContractCall>,
    deployments: Vec<DeployRecord>,
    pending: HashMap<B256, Pending>,
    failures: HashMap<String, FailureMode>,
    artifacts: HashMap<Address, String>,
    factories: HashMap<Address, FactoryState>,
    routers: HashMap<Address, RouterState>,
    pairs: HashMap<Address, PairState>,
    balances: HashMap<(Address, Address), U256>,
    allowances: HashMap<(Address, Address, Address), U256>,
    positions: HashMap<(Address, Address, U256), Position>,
}

enum Pending {
    Deploy(DeployRecord),
    Call(ContractCall),
    Revert(String),
}

#[derive(Default)]
struct FactoryState {
    pair_implementation: Address,
    presets: BTreeSet<U256>,
    quote_assets: BTreeSet<Address>,
    pairs: HashMap<(Address, Address, U256), Address>,
}

struct RouterState {
    factory: Address,
    wnative: Address,
}

struct PairState {
    token_x: Address,
    token_y: Address,
    active_id: U256,
}

#[derive(Default, Clone, Copy)]
struct Position {
    liquidity: U256,
    x: U256,
    y: U256,
}

type Revert = String;

impl SimulatedEnvironment {
    pub fn new() -> Self {
        Self::with_signer(Address::repeat_byte(0xd0))
    }

    pub fn with_signer(signer: Address) -> Self {
        Self {
            signer,
            state: Mutex::new(SimState::default()),
        }
    }

    fn state(&self) -> MutexGuard<'_, SimState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Fail every later submission labelled `label` (method or artifact name)
    pub fn fail_on(&self, label: impl Into<String>, mode: FailureMode) {
        self.state().failures.insert(label.into(), mode);
    }

    pub fn clear_failures(&self) {
        self.state().failures.clear();
    }

    /// Freeze the block clock at `timestamp`
    pub fn set_block_timestamp(&self, timestamp: u64) {
        self.state().clock = Some(timestamp);
    }

    pub fn advance_clock(&self, secs: u64) {
        let mut state = self.state();
        let now = state.now();
        state.clock = Some(now + secs);
    }

    /// Labels of every accepted submission, in order
    pub fn submitted_labels(&self) -> Vec<String> {
        self.state().labels.clone()
    }

    /// Accepted contract calls, in order, including ones that later reverted
    pub fn submitted_calls(&self) -> Vec<ContractCall> {
        self.state().submitted.clone()
    }

    pub fn view_calls(&self) -> Vec<ContractCall> {
        self.state().view_calls.clone()
    }

    pub fn deployments(&self) -> Vec<DeployRecord> {
        self.state().deployments.clone()
    }

    pub fn deployments_of(&self, name: ContractName) -> Vec<DeployRecord> {
        self.deployments()
            .into_iter()
            .filter(|record| record.artifact == name.as_str())
            .collect()
    }

    pub fn balance_of(&self, token: Address, holder: Address) -> U256 {
        self.state()
            .balances
            .get(&(token, holder))
            .copied()
            .unwrap_or_default()
    }

    pub fn allowance(&self, token: Address, owner: Address, spender: Address) -> U256 {
        self.state()
            .allowances
            .get(&(token, owner, spender))
            .copied()
            .unwrap_or_default()
    }

    pub fn pair(&self, factory: Address, token_a: Address, token_b: Address, bin_step: u16) -> Option<Address> {
        let state = self.state();
        let factory = state.factories.get(&factory)?;
        factory
            .pairs
            .get(&pair_key(token_a, token_b, U256::from(bin_step)))
            .copied()
    }

    fn accept(&self, label: &str, pending: impl FnOnce(&mut SimState) -> Pending) -> Result<PendingTx, ClientError> {
        let mut state = self.state();

        let outcome = match state.failures.get(label).cloned() {
            Some(FailureMode::Reject(reason)) => {
                return Err(ClientError::Rejected {
                    method: label.to_string(),
                    reason,
                })
            }
            Some(FailureMode::Revert(reason)) => {
                // Submission still consumes a nonce and is recorded
                let _ = pending(&mut state);
                Pending::Revert(reason)
            }
            None => pending(&mut state),
        };

        state.tx_counter += 1;
        let tx_hash = B256::left_padding_from(&state.tx_counter.to_be_bytes());
        state.labels.push(label.to_string());
        state.pending.insert(tx_hash, outcome);

        Ok(PendingTx {
            tx_hash,
            label: label.to_string(),
        })
    }
}

impl Default for SimulatedEnvironment {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ExecutionEnvironment for SimulatedEnvironment {
    fn signer(&self) -> Address {
        self.signer
    }

    async fn deploy(&self, request: DeployRequest) -> Result<PendingTx, ClientError> {
        let signer = self.signer;
        self.accept(&request.artifact.clone(), move |state| {
            let address = signer.create(state.nonce);
            state.nonce += 1;
            Pending::Deploy(DeployRecord {
                artifact: request.artifact,
                address,
                constructor_args: request.constructor_args,
            })
        })
    }

    async fn submit(&self, call: ContractCall) -> Result<PendingTx, ClientError> {
        self.accept(&call.method.clone(), move |state| {
            state.nonce += 1;
            state.submitted.push(call.clone());
            Pending::Call(call)
        })
    }

    async fn call_view(&self, call: ContractCall) -> Result<Vec<CallValue>, ClientError> {
        let mut state = self.state();
        state.view_calls.push(call.clone());
        state.view(&call).map_err(|reason| ClientError::Rejected {
            method: call.method.clone(),
            reason,
        })
    }

    async fn wait_for_confirmation(&self, tx: &PendingTx) -> Result<Receipt, ClientError> {
        let signer = self.signer;
        let mut state = self.state();
        let pending = state.pending.remove(&tx.tx_hash).ok_or_else(|| {
            ClientError::InvalidResponse(format!("unknown transaction {}", tx.tx_hash))
        })?;
        let block_timestamp = state.now();

        let reverted = |reason: String| ClientError::Reverted {
            tx_hash: tx.tx_hash.to_string(),
            reason,
        };

        match pending {
            Pending::Revert(reason) => Err(reverted(reason)),
            Pending::Deploy(record) => {
                let address = record.address;
                state.install(&record);
                state.deployments.push(record);
                debug!(tx = %tx, address = %address, "Simulated deployment confirmed");
                Ok(Receipt {
                    tx_hash: tx.tx_hash,
                    contract_address: Some(address),
                    block_timestamp,
                    outputs: Vec::new(),
                })
            }
            Pending::Call(call) => {
                let outputs = state
                    .execute(signer, &call, block_timestamp)
                    .map_err(reverted)?;
                Ok(Receipt {
                    tx_hash: tx.tx_hash,
                    contract_address: None,
                    block_timestamp,
                    outputs,
                })
            }
        }
    }

    async fn block_timestamp(&self) -> Result<u64, ClientError> {
        Ok(self.state().now())
    }
}

fn pair_key(token_a: Address, token_b: Address, bin_step: U256) -> (Address, Address, U256) {
    if token_a < token_b {
        (token_a, token_b, bin_step)
    } else {
        (token_b, token_a, bin_step)
    }
}

fn arg(args: &[CallValue], index: usize) -> Result<&CallValue, Revert> {
    args.get(index)
        .ok_or_else(|| format!("missing argument {index}"))
}

fn address_arg(args: &[CallValue], index: usize) -> Result<Address, Revert> {
    arg(args, index)?
        .as_address()
        .ok_or_else(|| format!("argument {index} is not an address"))
}

fn uint_arg(args: &[CallValue], index: usize) -> Result<U256, Revert> {
    arg(args, index)?
        .as_uint()
        .ok_or_else(|| format!("argument {index} is not an unsigned integer"))
}

fn uint_array_arg(args: &[CallValue], index: usize) -> Result<Vec<U256>, Revert> {
    arg(args, index)?
        .as_uint_array()
        .ok_or_else(|| format!("argument {index} is not a uint array"))
}

fn int_array_arg(args: &[CallValue], index: usize) -> Result<Vec<I256>, Revert> {
    arg(args, index)?
        .as_array()
        .and_then(|items| items.iter().map(CallValue::as_int).collect())
        .ok_or_else(|| format!("argument {index} is not an int array"))
}

fn abs_diff(a: U256, b: U256) -> U256 {
    if a > b {
        a - b
    } else {
        b - a
    }
}

impl SimState {
    fn now(&self) -> u64 {
        self.clock
            .unwrap_or_else(|| chrono::Utc::now().timestamp().max(0) as u64)
    }

    fn install(&mut self, record: &DeployRecord) {
        self.artifacts.insert(record.address, record.artifact.clone());

        if record.artifact == ContractName::LbFactory.as_str() {
            self.factories.insert(record.address, FactoryState::default());
        } else if record.artifact == ContractName::LbRouter.as_str() {
            let args = &record.constructor_args;
            if let (Ok(factory), Ok(wnative)) = (address_arg(args, 0), address_arg(args, 5)) {
                self.routers.insert(record.address, RouterState { factory, wnative });
            }
        }
    }

    fn artifact(&self, address: Address) -> Result<&str, Revert> {
        self.artifacts
            .get(&address)
            .map(String::as_str)
            .ok_or_else(|| format!("no contract at {address}"))
    }

    fn view(&self, call: &ContractCall) -> Result<Vec<CallValue>, Revert> {
        let args = &call.args;

        match (self.artifact(call.to)?, call.method.as_str()) {
            ("LBFactory", "getLBPairImplementation") => {
                let factory = self.factory(call.to)?;
                Ok(vec![factory.pair_implementation.into()])
            }
            ("LBFactory", "getAllBinSteps") => {
                let factory = self.factory(call.to)?;
                Ok(vec![CallValue::uint_array(factory.presets.iter().copied())])
            }
            ("LBFactory", "isQuoteAsset") => {
                let factory = self.factory(call.to)?;
                let token = address_arg(args, 0)?;
                Ok(vec![factory.quote_assets.contains(&token).into()])
            }
            ("LBFactory", "getLBPairInformation") => {
                let factory = self.factory(call.to)?;
                let bin_step = uint_arg(args, 2)?;
                let key = pair_key(address_arg(args, 0)?, address_arg(args, 1)?, bin_step);
                let pair = factory.pairs.get(&key).copied().unwrap_or(Address::ZERO);
                Ok(vec![CallValue::Tuple(vec![
                    bin_step.into(),
                    pair.into(),
                    (pair != Address::ZERO).into(),
                    false.into(),
                ])])
            }
            ("wIOTA" | "MockERC20", "balanceOf") => {
                let holder = address_arg(args, 0)?;
                let balance = self.balances.get(&(call.to, holder)).copied().unwrap_or_default();
                Ok(vec![balance.into()])
            }
            ("wIOTA" | "MockERC20", "allowance") => {
                let key = (call.to, address_arg(args, 0)?, address_arg(args, 1)?);
                Ok(vec![self.allowances.get(&key).copied().unwrap_or_default().into()])
            }
            (artifact, method) => Err(format!("{artifact} has no view method {method}")),
        }
    }

    fn factory(&self, address: Address) -> Result<&FactoryState, Revert> {
        self.factories
            .get(&address)
            .ok_or_else(|| format!("{address} is not a factory"))
    }

    fn factory_mut(&mut self, address: Address) -> Result<&mut FactoryState, Revert> {
        self.factories
            .get_mut(&address)
            .ok_or_else(|| format!("{address} is not a factory"))
    }

    fn execute(&mut self, sender: Address, call: &ContractCall, now: u64) -> Result<Vec<CallValue>, Revert> {
        let artifact = self.artifact(call.to)?.to_string();
        let args = &call.args;

        match (artifact.as_str(), call.method.as_str()) {
            ("LBFactory", "setLBPairImplementation") => {
                let implementation = address_arg(args, 0)?;
                let factory = self.factory_mut(call.to)?;
                if factory.pair_implementation == implementation {
                    return Err("LBFactory__SameImplementation".to_string());
                }
                factory.pair_implementation = implementation;
                Ok(Vec::new())
            }
            ("LBFactory", "setPreset") => {
                if args.len() != 9 {
                    return Err(format!("setPreset expects 9 arguments, got {}", args.len()));
                }
                let bin_step = uint_arg(args, 0)?;
                self.factory_mut(call.to)?.presets.insert(bin_step);
                Ok(Vec::new())
            }
            ("LBFactory", "addQuoteAsset") => {
                let token = address_arg(args, 0)?;
                if !self.factory_mut(call.to)?.quote_assets.insert(token) {
                    return Err("LBFactory__QuoteAssetAlreadyWhitelisted".to_string());
                }
                Ok(Vec::new())
            }
            ("LBFactory", "createLBPair") => {
                let token_x = address_arg(args, 0)?;
                let token_y = address_arg(args, 1)?;
                let active_id = uint_arg(args, 2)?;
                let bin_step = uint_arg(args, 3)?;
                let factory_address = call.to;
                let factory = self.factory_mut(factory_address)?;

                if token_x == token_y {
                    return Err("LBFactory__IdenticalAddresses".to_string());
                }
                if factory.pair_implementation == Address::ZERO {
                    return Err("LBFactory__ImplementationNotSet".to_string());
                }
                if !factory.presets.contains(&bin_step) {
                    return Err("LBFactory__BinStepHasNoPreset".to_string());
                }
                if !factory.quote_assets.contains(&token_y) {
                    return Err("LBFactory__QuoteAssetNotWhitelisted".to_string());
                }
                let key = pair_key(token_x, token_y, bin_step);
                if factory.pairs.contains_key(&key) {
                    return Err("LBFactory__LBPairAlreadyExists".to_string());
                }

                let pair = factory_address.create(factory.pairs.len() as u64 + 1);
                factory.pairs.insert(key, pair);
                self.pairs.insert(pair, PairState { token_x, token_y, active_id });
                self.artifacts.insert(pair, "LBPairClone".to_string());
                Ok(vec![pair.into()])
            }
            ("wIOTA" | "MockERC20", "mint") => {
                let to = address_arg(args, 0)?;
                let amount = uint_arg(args, 1)?;
                let balance = self.balances.entry((call.to, to)).or_default();
                *balance = balance.saturating_add(amount);
                Ok(Vec::new())
            }
            ("wIOTA" | "MockERC20", "approve") => {
                let spender = address_arg(args, 0)?;
                let amount = uint_arg(args, 1)?;
                self.allowances.insert((call.to, sender, spender), amount);
                Ok(vec![true.into()])
            }
            ("LBRouter", "addLiquidity") => self.add_liquidity(sender, call, now, false),
            ("LBRouter", "addLiquidityNATIVE") => self.add_liquidity(sender, call, now, true),
            ("LBRouter", "removeLiquidityNATIVE") => self.remove_liquidity_native(sender, call, now),
            (artifact, method) => Err(format!("{artifact} has no method {method}")),
        }
    }

    fn router(&self, address: Address) -> Result<&RouterState, Revert> {
        self.routers
            .get(&address)
            .ok_or_else(|| format!("{address} is not a router"))
    }

    fn pair_for(&self, router: &RouterState, token_a: Address, token_b: Address, bin_step: U256) -> Result<Address, Revert> {
        self.factory(router.factory)?
            .pairs
            .get(&pair_key(token_a, token_b, bin_step))
            .copied()
            .ok_or_else(|| "LBRouter__PairNotCreated".to_string())
    }

    fn spendable(&self, token: Address, owner: Address, spender: Address, amount: U256) -> Result<(), Revert> {
        let allowance = self.allowances.get(&(token, owner, spender)).copied().unwrap_or_default();
        if allowance < amount {
            return Err("ERC20InsufficientAllowance".to_string());
        }
        let balance = self.balances.get(&(token, owner)).copied().unwrap_or_default();
        if balance < amount {
            return Err("ERC20InsufficientBalance".to_string());
        }
        Ok(())
    }

    fn debit(&mut self, token: Address, owner: Address, spender: Address, amount: U256) {
        if let Some(balance) = self.balances.get_mut(&(token, owner)) {
            *balance -= amount;
        }
        if let Some(allowance) = self.allowances.get_mut(&(token, owner, spender)) {
            if *allowance != U256::MAX {
                *allowance -= amount;
            }
        }
    }

    fn add_liquidity(&mut self, sender: Address, call: &ContractCall, now: u64, native: bool) -> Result<Vec<CallValue>, Revert> {
        let params = arg(&call.args, 0)?
            .as_array()
            .filter(|fields| fields.len() == 15)
            .ok_or_else(|| "malformed liquidity parameters".to_string())?;

        let token_x = address_arg(params, 0)?;
        let token_y = address_arg(params, 1)?;
        let bin_step = uint_arg(params, 2)?;
        let amount_x = uint_arg(params, 3)?;
        let amount_y = uint_arg(params, 4)?;
        let amount_x_min = uint_arg(params, 5)?;
        let amount_y_min = uint_arg(params, 6)?;
        let active_id_desired = uint_arg(params, 7)?;
        let id_slippage = uint_arg(params, 8)?;
        let delta_ids = int_array_arg(params, 9)?;
        let distribution_x = uint_array_arg(params, 10)?;
        let distribution_y = uint_array_arg(params, 11)?;
        let to = address_arg(params, 12)?;
        let deadline = uint_arg(params, 14)?;

        if U256::from(now) > deadline {
            return Err("LBRouter__DeadlineExceeded".to_string());
        }
        if delta_ids.len() != distribution_x.len() || delta_ids.len() != distribution_y.len() {
            return Err("LBRouter__LengthsMismatch".to_string());
        }

        let router = self.router(call.to)?;
        let wnative = router.wnative;
        let pair = self.pair_for(router, token_x, token_y, bin_step)?;

        if native {
            let native_amount = if token_x == wnative {
                amount_x
            } else if token_y == wnative {
                amount_y
            } else {
                return Err("LBRouter__WrongNativeLiquidityParameters".to_string());
            };
            if call.value != native_amount {
                return Err("LBRouter__WrongNativeLiquidityParameters".to_string());
            }
        }

        let active_id = self
            .pairs
            .get(&pair)
            .map(|state| state.active_id)
            .ok_or_else(|| "LBRouter__PairNotCreated".to_string())?;
        if abs_diff(active_id_desired, active_id) > id_slippage {
            return Err("LBRouter__IdSlippageCaught".to_string());
        }

        let one = U256::from(ONE);
        let sum_x = distribution_x.iter().fold(U256::ZERO, |acc, v| acc + *v);
        let sum_y = distribution_y.iter().fold(U256::ZERO, |acc, v| acc + *v);
        if sum_x > one || sum_y > one {
            return Err("LBRouter__WrongAmounts".to_string());
        }

        let used_x = amount_x * sum_x / one;
        let used_y = amount_y * sum_y / one;
        if used_x < amount_x_min || used_y < amount_y_min {
            return Err("LBRouter__AmountSlippageCaught".to_string());
        }

        let pulled_x = !(native && token_x == wnative);
        let pulled_y = !(native && token_y == wnative);
        if pulled_x {
            self.spendable(token_x, sender, call.to, used_x)?;
        }
        if pulled_y {
            self.spendable(token_y, sender, call.to, used_y)?;
        }

        let active = I256::from_raw(active_id);
        let mut deposit_ids = Vec::with_capacity(delta_ids.len());
        let mut minted = Vec::with_capacity(delta_ids.len());
        for ((delta, dx), dy) in delta_ids.iter().zip(&distribution_x).zip(&distribution_y) {
            let id = (active + *delta).into_raw();
            let x = amount_x * *dx / one;
            let y = amount_y * *dy / one;
            let liquidity = x + y;

            let position = self.positions.entry((pair, to, id)).or_default();
            position.liquidity += liquidity;
            position.x += x;
            position.y += y;

            deposit_ids.push(id);
            minted.push(liquidity);
        }

        if pulled_x {
            self.debit(token_x, sender, call.to, used_x);
        }
        if pulled_y {
            self.debit(token_y, sender, call.to, used_y);
        }

        Ok(vec![
            used_x.into(),
            used_y.into(),
            (amount_x - used_x).into(),
            (amount_y - used_y).into(),
            CallValue::uint_array(deposit_ids),
            CallValue::uint_array(minted),
        ])
    }

    fn remove_liquidity_native(&mut self, sender: Address, call: &ContractCall, now: u64) -> Result<Vec<CallValue>, Revert> {
        let args = &call.args;
        let token = address_arg(args, 0)?;
        let bin_step = uint_arg(args, 1)?;
        let amount_token_min = uint_arg(args, 2)?;
        let amount_native_min = uint_arg(args, 3)?;
        let ids = uint_array_arg(args, 4)?;
        let amounts = uint_array_arg(args, 5)?;
        let to = address_arg(args, 6)?;
        let deadline = uint_arg(args, 7)?;

        if U256::from(now) > deadline {
            return Err("LBRouter__DeadlineExceeded".to_string());
        }
        if ids.is_empty() || ids.len() != amounts.len() {
            return Err("LBToken__InvalidLength".to_string());
        }

        let router = self.router(call.to)?;
        let wnative = router.wnative;
        let pair = self.pair_for(router, token, wnative, bin_step)?;
        let native_is_x = self
            .pairs
            .get(&pair)
            .map(|state| state.token_x == wnative)
            .unwrap_or(true);

        let mut updated = Vec::with_capacity(ids.len());
        let (mut out_x, mut out_y) = (U256::ZERO, U256::ZERO);
        for (id, amount) in ids.iter().zip(&amounts) {
            let mut position = self.positions.get(&(pair, sender, *id)).copied().unwrap_or_default();
            if *amount > position.liquidity || position.liquidity.is_zero() {
                return Err("LBToken__BurnExceedsBalance".to_string());
            }
            let x = position.x * *amount / position.liquidity;
            let y = position.y * *amount / position.liquidity;
            position.liquidity -= *amount;
            position.x -= x;
            position.y -= y;
            out_x += x;
            out_y += y;
            updated.push((*id, position));
        }

        let (amount_native, amount_token) = if native_is_x { (out_x, out_y) } else { (out_y, out_x) };
        if amount_token < amount_token_min || amount_native < amount_native_min {
            return Err("LBRouter__AmountSlippageCaught".to_string());
        }

        for (id, position) in updated {
            self.positions.insert((pair, sender, id), position);
        }
        let balance = self.balances.entry((token, to)).or_default();
        *balance = balance.saturating_add(amount_token);

        Ok(vec![amount_token.into(), amount_native.into()])
    }
}
