use lb_bootstrap_client::{ExecutionEnvironment, FailureMode, SimulatedEnvironment};
use lb_bootstrap_liquidity::{
    delta_ids, generate_curve, CurveShape, DeadlinePolicy, LiquidityError, ShapeParams,
    WithdrawalParams, ONE,
};
use lb_bootstrap_orchestrator::{
    default_mint_amount, ExecutionError, LiquidityExecutor, Provisioner, ProvisioningPlan,
    ProvisioningReport, ProvisioningStep, StepOutcome, TokenFunding, DEFAULT_ACTIVE_ID,
};
use lb_bootstrap_registry::{AddressRegistry, JsonFileStore, RegistryError, RegistryStore};
use lb_bootstrap_types::{Address, ContractName, Network, U256};
use std::collections::BTreeMap;
use std::sync::Arc;

// ═══════════════════════════════════════════════════════════════════════════
// HELPERS
// ═══════════════════════════════════════════════════════════════════════════

const NOW: u64 = 1_731_442_185;

/// A simulated chain plus an on-disk deployments directory
struct TestNet {
    env: Arc<SimulatedEnvironment>,
    store: Arc<JsonFileStore>,
    network: Network,
    _dir: tempfile::TempDir,
}

impl TestNet {
    fn new(network: Network) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let env = Arc::new(SimulatedEnvironment::new());
        env.set_block_timestamp(NOW);

        Self {
            env,
            store: Arc::new(JsonFileStore::new(dir.path())),
            network,
            _dir: dir,
        }
    }

    fn persistent() -> Self {
        Self::new(Network::new("local_geth"))
    }

    async fn provision(&self) -> Result<ProvisioningReport, lb_bootstrap_orchestrator::ProvisioningError> {
        Provisioner::builder()
            .with_environment(self.env.clone())
            .with_store(self.store.clone())
            .with_plan(ProvisioningPlan::default())
            .build()
            .unwrap()
            .run(&self.network)
            .await
    }

    async fn registry(&self) -> AddressRegistry {
        self.store.load(&self.network).await.unwrap()
    }

    fn document(&self) -> BTreeMap<String, String> {
        let contents = std::fs::read_to_string(self.store.path_for(&self.network)).unwrap();
        serde_json::from_str(&contents).unwrap()
    }

    async fn executor(&self) -> (AddressRegistry, LiquidityExecutor) {
        let registry = self.registry().await;
        let executor = LiquidityExecutor::from_registry(self.env.clone(), &registry).unwrap();
        (registry, executor)
    }
}

fn ask_side_seed(registry: &AddressRegistry, recipient: Address) -> ShapeParams {
    let curve = CurveShape::default().with_offset(211);
    let (distribution_x, distribution_y) = generate_curve(&curve, 40).unwrap();

    ShapeParams {
        token_x: registry.require(ContractName::WIota).unwrap(),
        token_y: registry.require(ContractName::MockErc20).unwrap(),
        bin_step: 20,
        amount_x: U256::from(10 * ONE),
        amount_y: U256::ZERO,
        amount_x_min: U256::ZERO,
        amount_y_min: U256::ZERO,
        active_id_desired: DEFAULT_ACTIVE_ID,
        id_slippage: 2,
        delta_ids: delta_ids(&curve, 40).unwrap(),
        distribution_x,
        distribution_y,
        recipient,
        refund_recipient: recipient,
        deadline: DeadlinePolicy::default(),
    }
}

fn mutating_calls(env: &SimulatedEnvironment) -> usize {
    env.submitted_labels().len()
}

// ═══════════════════════════════════════════════════════════════════════════
// PROVISIONING SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_fresh_network_runs_every_step_and_records_six_contracts() {
    let net = TestNet::persistent();

    let report = net.provision().await.unwrap();

    let steps: Vec<ProvisioningStep> = report.steps.iter().map(|record| record.step).collect();
    assert_eq!(steps, ProvisioningStep::ALL.to_vec());
    assert_eq!(report.deployed(), ContractName::ALL.to_vec());
    for record in &report.steps[6..] {
        assert!(matches!(record.outcome, StepOutcome::Submitted { .. }));
    }

    let document = net.document();
    let keys: Vec<&str> = document.keys().map(String::as_str).collect();
    assert_eq!(
        keys,
        vec!["LBFactory", "LBPair", "LBQuoter", "LBRouter", "MockERC20", "wIOTA"]
    );
    // Stored addresses are checksummed and match the report
    for (name, address) in &report.addresses {
        assert_eq!(document[name], address.to_checksum(None));
    }
}

#[tokio::test]
async fn test_rerun_with_recorded_tokens_starts_at_factory() {
    let net = TestNet::persistent();

    // Tokens deployed by an earlier, separate run
    let earlier = TestNet::persistent();
    earlier.provision().await.unwrap();
    let previous = earlier.registry().await;
    let recorded = AddressRegistry::from_entries(
        net.network.clone(),
        [ContractName::WIota, ContractName::MockErc20]
            .into_iter()
            .map(|name| (name.as_str().to_string(), previous.require(name).unwrap())),
    );
    net.store.persist(&recorded).await.unwrap();

    let report = net.provision().await.unwrap();

    assert_eq!(
        report.reused(),
        vec![ContractName::WIota, ContractName::MockErc20]
    );
    assert_eq!(net.env.submitted_labels()[0], "LBFactory");
    assert!(net.env.deployments_of(ContractName::WIota).is_empty());
    assert!(net.env.deployments_of(ContractName::MockErc20).is_empty());

    let registry = net.registry().await;
    assert_eq!(registry.len(), 6);
    assert_eq!(
        registry.get(ContractName::WIota),
        previous.get(ContractName::WIota)
    );
}

#[tokio::test]
async fn test_second_run_issues_no_transactions() {
    let net = TestNet::persistent();
    net.provision().await.unwrap();
    let before = net.document();
    let calls = mutating_calls(&net.env);

    let report = net.provision().await.unwrap();

    assert_eq!(report.transaction_count(), 0);
    assert_eq!(mutating_calls(&net.env), calls);
    assert_eq!(net.document(), before);
}

#[tokio::test]
async fn test_interrupted_run_resumes_from_the_failed_step() {
    let net = TestNet::persistent();
    net.env
        .fail_on("LBQuoter", FailureMode::Revert("out of gas".to_string()));

    let err = net.provision().await.unwrap_err();
    assert_eq!(err.step(), Some(ProvisioningStep::DeployQuoter));

    let partial = net.registry().await;
    assert_eq!(partial.len(), 5);
    assert!(!partial.contains(ContractName::LbQuoter));

    net.env.clear_failures();
    let report = net.provision().await.unwrap();

    assert_eq!(report.deployed(), vec![ContractName::LbQuoter]);
    assert_eq!(net.env.deployments_of(ContractName::LbFactory).len(), 1);
    assert_eq!(net.registry().await.len(), 6);
}

#[tokio::test]
async fn test_ephemeral_network_leaves_no_artifact() {
    let net = TestNet::new(Network::new("hardhat"));

    let report = net.provision().await.unwrap();

    assert_eq!(report.addresses.len(), 6);
    assert!(!net.store.path_for(&net.network).exists());
    assert!(net.registry().await.is_empty());
}

#[tokio::test]
async fn test_corrupt_registry_stops_before_any_call() {
    let net = TestNet::persistent();
    let path = net.store.path_for(&net.network);
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(&path, "{ not json").unwrap();

    let err = net.provision().await.unwrap_err();

    assert!(err.to_string().contains("local_geth"));
    assert_eq!(mutating_calls(&net.env), 0);
    // The damaged document is left for inspection
    assert_eq!(std::fs::read_to_string(&path).unwrap(), "{ not json");
}

// ═══════════════════════════════════════════════════════════════════════════
// LIQUIDITY SCENARIOS
// ═══════════════════════════════════════════════════════════════════════════

#[tokio::test]
async fn test_non_increasing_delta_ids_fail_before_submission() {
    let net = TestNet::persistent();
    net.provision().await.unwrap();
    let (registry, executor) = net.executor().await;
    let calls = mutating_calls(&net.env);

    let params = ShapeParams {
        delta_ids: vec![1, 2, 2],
        distribution_x: vec![ONE / 4, ONE / 4, ONE / 4],
        distribution_y: vec![0, 0, 0],
        ..ask_side_seed(&registry, net.env.signer())
    };
    let err = executor.shape(params).await.unwrap_err();

    assert!(matches!(
        err,
        ExecutionError::Liquidity(LiquidityError::DeltaIdsNotIncreasing { index: 2 })
    ));
    assert_eq!(mutating_calls(&net.env), calls);
}

#[tokio::test]
async fn test_withdrawal_length_mismatch_fails_before_submission() {
    let net = TestNet::persistent();
    net.provision().await.unwrap();
    let (registry, executor) = net.executor().await;
    let calls = mutating_calls(&net.env);

    let err = executor
        .withdrawal(WithdrawalParams {
            token: registry.require(ContractName::MockErc20).unwrap(),
            bin_step: 20,
            amount_token_min: U256::ZERO,
            amount_native_min: U256::ZERO,
            ids: vec![DEFAULT_ACTIVE_ID],
            amounts: vec![U256::from(1u8), U256::from(2u8)],
            recipient: net.env.signer(),
            deadline: DeadlinePolicy::default(),
        })
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        ExecutionError::Liquidity(LiquidityError::LengthMismatch {
            left_len: 1,
            right_len: 2,
            ..
        })
    ));
    assert_eq!(mutating_calls(&net.env), calls);
}

#[tokio::test]
async fn test_provision_fund_seed_and_withdraw() {
    let net = TestNet::persistent();
    net.provision().await.unwrap();
    let (registry, executor) = net.executor().await;
    let signer = net.env.signer();

    let funding = TokenFunding::from_registry(net.env.clone(), &registry).unwrap();
    let receipt = funding
        .fund_and_approve(signer, default_mint_amount())
        .await
        .unwrap();
    assert_eq!(receipt.balance, default_mint_amount());

    let shape = executor
        .shape(ask_side_seed(&registry, signer))
        .await
        .unwrap();
    let added = executor.add_liquidity(&shape).await.unwrap();
    assert_eq!(added.positions.len(), 40);
    assert!(!added.total_minted().is_zero());

    // Withdraw half of every position
    let withdrawal = executor
        .withdrawal(WithdrawalParams {
            token: registry.require(ContractName::MockErc20).unwrap(),
            bin_step: 20,
            amount_token_min: U256::ZERO,
            amount_native_min: U256::ZERO,
            ids: added.positions.iter().map(|p| p.id.to::<u32>()).collect(),
            amounts: added
                .positions
                .iter()
                .map(|p| p.liquidity / U256::from(2u8))
                .collect(),
            recipient: signer,
            deadline: DeadlinePolicy::Ttl(60),
        })
        .await
        .unwrap();
    let removed = executor.remove_liquidity(&withdrawal).await.unwrap();

    assert!(!removed.received_native.is_zero());
    assert!(removed.received_native <= added.used_x / U256::from(2u8));
    assert_eq!(removed.received_token, U256::ZERO);
}

#[tokio::test]
async fn test_missing_registry_blocks_liquidity_operations() {
    let net = TestNet::persistent();
    let registry = net.registry().await;

    let err = LiquidityExecutor::from_registry(net.env.clone(), &registry)
        .err()
        .unwrap();
    assert!(matches!(
        err,
        ExecutionError::Registry(RegistryError::MissingEntry { .. })
    ));

    let err = TokenFunding::from_registry(net.env.clone(), &registry)
        .err()
        .unwrap();
    assert!(matches!(
        err,
        ExecutionError::Registry(RegistryError::MissingEntry {
            name: ContractName::MockErc20,
            ..
        })
    ));
}
