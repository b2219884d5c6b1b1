//! End-to-end connector tests against the scripted CIP-30 wallet

use std::time::Duration;

use walletd_cip30::ledger::{AssetName, Coin, PolicyId, TransactionMetadatum, Value};
use walletd_cip30::{
    CardanoAddress, CardanoError, ConnectorConfig, InjectedWalletConnector, TimeoutConfig,
    TransferMetadata,
};
use walletd_testing::{
    recipient_address, reward_address, token_value, EdgeCaseAddresses, EdgeCaseAmounts,
    EdgeCaseUnits, MockCall, MockProvider, MockWallet,
};

const TESTNET: u8 = 0;
const MAINNET: u8 = 1;

fn connector(wallet: &MockWallet, expected_network_id: u8) -> InjectedWalletConnector<MockProvider> {
    let provider = MockProvider::new().with_wallet("nami", wallet.clone());
    InjectedWalletConnector::new(provider, &["Nami"], ConnectorConfig::new(expected_network_id))
}

fn patate() -> (PolicyId, AssetName) {
    (
        PolicyId::from_hex(EdgeCaseUnits::POLICY).unwrap(),
        AssetName::from_hex(EdgeCaseUnits::PATATE_HEX).unwrap(),
    )
}

// ============================================================================
// Discovery and Connection
// ============================================================================

#[test]
fn test_detect_is_case_insensitive() {
    let provider = MockProvider::new().with_wallet("nami", MockWallet::new(TESTNET));
    let mut connector =
        InjectedWalletConnector::new(provider, &["NAMI", "ETERNL"], ConnectorConfig::new(TESTNET));

    assert_eq!(connector.detect_supported_wallets().unwrap(), 1);
    let wallets = connector.supported_wallets();
    assert_eq!(wallets.len(), 1);
    assert_eq!(wallets[0].wallet_identifier, "NAMI");
    assert_eq!(wallets[0].info["name"], "nami");
}

#[test]
fn test_detect_without_provider() {
    let mut connector = InjectedWalletConnector::new(
        MockProvider::unavailable(),
        &["Nami"],
        ConnectorConfig::default(),
    );
    assert!(matches!(
        connector.detect_supported_wallets(),
        Err(CardanoError::WalletProviderUnavailable)
    ));
}

#[tokio::test]
async fn test_network_mismatch_names_testnet() {
    let wallet = MockWallet::new(TESTNET);
    let mut connector = connector(&wallet, MAINNET);

    let err = connector.connect_wallet("Nami").await.unwrap_err();
    assert!(matches!(err, CardanoError::NetworkMismatch { expected: 1, actual: 0, .. }));
    assert!(err.to_string().contains("Testnet"));
    assert!(err.is_recoverable());
    assert!(connector.session().is_none());
}

#[tokio::test]
async fn test_connect_unknown_wallet() {
    let mut connector = connector(&MockWallet::new(TESTNET), TESTNET);
    let err = connector.connect_wallet("Flint").await.unwrap_err();
    assert!(matches!(err, CardanoError::WalletNotFound(name) if name == "Flint"));
}

#[tokio::test]
async fn test_declined_enable() {
    let wallet = MockWallet::new(TESTNET).fail(MockCall::Enable, -3, "user refused access");
    let mut connector = connector(&wallet, TESTNET);
    let err = connector.connect_wallet("nami").await.unwrap_err();
    assert!(matches!(err, CardanoError::WalletOperation { operation: "enable", code: Some(-3), .. }));
    assert_eq!(wallet.count(MockCall::GetNetworkId), 0);
}

#[tokio::test]
async fn test_reconnect_replaces_session() {
    let nami = MockWallet::new(TESTNET);
    let eternl = MockWallet::new(TESTNET);
    let provider = MockProvider::new()
        .with_wallet("nami", nami)
        .with_wallet("eternl", eternl);
    let mut connector =
        InjectedWalletConnector::new(provider, &["Nami", "Eternl"], ConnectorConfig::new(TESTNET));

    let first = connector.connect_wallet("Nami").await.unwrap();
    connector.connect_wallet("Eternl").await.unwrap();

    assert_eq!(first.provider_key(), "nami");
    assert_eq!(connector.session().unwrap().provider_key(), "eternl");
}

// ============================================================================
// Balances and Addresses
// ============================================================================

#[tokio::test]
async fn test_tokens_and_balance_connects_on_demand() {
    let wallet = MockWallet::new(TESTNET)
        .with_utxo(token_value(3_000_000, EdgeCaseUnits::POLICY, EdgeCaseUnits::PATATE_HEX, 100))
        .with_utxo(Value::new(2_000_000));
    let mut connector = connector(&wallet, TESTNET);

    let assets = connector.get_tokens_and_balance("Nami").await.unwrap();
    assert_eq!(assets.len(), 1);
    let asset = &assets[0];
    assert_eq!(asset.policy, EdgeCaseUnits::POLICY);
    assert_eq!(asset.asset_name, EdgeCaseUnits::PATATE_HEX);
    assert_eq!(asset.unit, format!("{}{}", EdgeCaseUnits::POLICY, EdgeCaseUnits::PATATE_HEX));
    assert_eq!(asset.name, "PATATE");
    assert_eq!(asset.fingerprint, EdgeCaseUnits::PATATE_FINGERPRINT);
    assert_eq!(asset.quantity, "100");
    assert_eq!(wallet.count(MockCall::Enable), 1);
}

#[tokio::test]
async fn test_ada_only_balance_has_no_entries() {
    let wallet = MockWallet::new(TESTNET).with_utxo(Value::new(9_000_000));
    let mut connector = connector(&wallet, TESTNET);
    assert!(connector.get_tokens_and_balance("Nami").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_balance_by_policy() {
    let wallet = MockWallet::new(TESTNET)
        .with_utxo(token_value(3_000_000, EdgeCaseUnits::POLICY, EdgeCaseUnits::PATATE_HEX, 7));
    let mut connector = connector(&wallet, TESTNET);

    let found = connector
        .get_balance_by_policy("Nami", EdgeCaseUnits::POLICY)
        .await
        .unwrap();
    assert_eq!(found.unwrap().quantity, "7");

    let missing = connector
        .get_balance_by_policy("Nami", &"00".repeat(28))
        .await
        .unwrap();
    assert!(missing.is_none());
}

#[tokio::test]
async fn test_change_address_tolerates_reward_failure() {
    let wallet = MockWallet::new(TESTNET)
        .fail(MockCall::GetRewardAddresses, -2, "locked")
        .fail(MockCall::GetUnusedAddresses, -2, "locked");
    let mut connector = connector(&wallet, TESTNET);
    connector.connect_wallet("Nami").await.unwrap();

    let address = connector.get_change_address().await.unwrap();
    assert!(address.starts_with("addr_test1"));
    assert_eq!(CardanoAddress::parse(&address).unwrap(), wallet.address());
}

#[tokio::test]
async fn test_change_address_requires_used_addresses() {
    let wallet = MockWallet::new(TESTNET).fail(MockCall::GetUsedAddresses, -2, "locked");
    let mut connector = connector(&wallet, TESTNET);
    connector.connect_wallet("Nami").await.unwrap();

    let err = connector.get_change_address().await.unwrap_err();
    assert!(matches!(err, CardanoError::WalletOperation { operation: "getUsedAddresses", .. }));
}

#[tokio::test]
async fn test_addresses_need_a_session() {
    let connector = connector(&MockWallet::new(TESTNET), TESTNET);
    assert!(matches!(
        connector.get_change_address().await,
        Err(CardanoError::WalletNotConnected)
    ));
    assert!(matches!(
        connector.get_used_addresses().await,
        Err(CardanoError::WalletNotConnected)
    ));
}

#[tokio::test]
async fn test_used_addresses_returns_first() {
    let wallet = MockWallet::new(TESTNET);
    let mut connector = connector(&wallet, TESTNET);
    connector.connect_wallet("Nami").await.unwrap();
    let used = connector.get_used_addresses().await.unwrap();
    assert_eq!(used, Some(wallet.address().to_bech32().unwrap()));
}

// ============================================================================
// Transfers
// ============================================================================

#[tokio::test]
async fn test_ada_transfer_conserves_value() {
    let wallet = MockWallet::new(TESTNET).with_utxo(Value::new(5_000_000));
    let mut connector = connector(&wallet, TESTNET);
    let recipient = recipient_address(3, TESTNET);

    let tx_hash = connector
        .transfer_ada("Nami", &recipient, "2000000")
        .await
        .unwrap();

    let submitted = wallet.submitted();
    assert_eq!(submitted.len(), 1);
    let tx = &submitted[0];
    assert_eq!(tx_hash.as_str(), tx.body.hash_hex().unwrap());

    let outputs: Coin = tx.body.outputs.iter().map(|o| o.amount.coin).sum();
    assert_eq!(outputs + tx.body.fee, 5_000_000);
    assert_eq!(tx.body.outputs[0].amount.coin, 2_000_000);
    assert_eq!(tx.body.outputs[0].address, CardanoAddress::parse(&recipient).unwrap());
    assert!(tx.body.outputs[1..].iter().all(|o| o.address == wallet.address()));
    assert!(tx.auxiliary_data.is_none());

    let body_hash = tx.body.hash().unwrap();
    let vkeys = tx.witness_set.vkeys().unwrap();
    assert_eq!(vkeys.len(), 1);
    assert!(vkeys[0].verify(&body_hash));
}

#[tokio::test]
async fn test_insufficient_funds_never_reaches_signing() {
    let wallet = MockWallet::new(TESTNET).with_utxo(Value::new(5_000_000));
    let mut connector = connector(&wallet, TESTNET);

    let err = connector
        .transfer_ada("Nami", &recipient_address(3, TESTNET), "9000000")
        .await
        .unwrap_err();

    assert!(matches!(err, CardanoError::InsufficientFunds { .. }));
    assert_eq!(wallet.count(MockCall::SignTx), 0);
    assert_eq!(wallet.count(MockCall::SubmitTx), 0);
}

#[tokio::test]
async fn test_token_transfer_carries_min_ada_and_returns_change() {
    let wallet = MockWallet::new(TESTNET)
        .with_utxo(token_value(10_000_000, EdgeCaseUnits::POLICY, EdgeCaseUnits::PATATE_HEX, 100));
    let mut connector = connector(&wallet, TESTNET);

    connector
        .transfer_tokens(
            "Nami",
            &recipient_address(4, TESTNET),
            EdgeCaseUnits::POLICY,
            EdgeCaseUnits::PATATE_HEX,
            "25",
        )
        .await
        .unwrap();

    let tx = &wallet.submitted()[0];
    let (policy, name) = patate();
    let sent = &tx.body.outputs[0].amount;
    assert_eq!(sent.assets().get_asset(&policy, &name), 25);
    assert_eq!(sent.coin, 39 * 34_482);

    let returned: u64 = tx.body.outputs[1..]
        .iter()
        .map(|o| o.amount.assets().get_asset(&policy, &name))
        .sum();
    assert_eq!(returned, 75);

    let coins: Coin = tx.body.outputs.iter().map(|o| o.amount.coin).sum();
    assert_eq!(coins + tx.body.fee, 10_000_000);
}

#[tokio::test]
async fn test_token_transfer_beyond_holdings() {
    let wallet = MockWallet::new(TESTNET)
        .with_utxo(token_value(10_000_000, EdgeCaseUnits::POLICY, EdgeCaseUnits::PATATE_HEX, 10));
    let mut connector = connector(&wallet, TESTNET);

    let err = connector
        .transfer_tokens(
            "Nami",
            &recipient_address(4, TESTNET),
            EdgeCaseUnits::POLICY,
            EdgeCaseUnits::PATATE_HEX,
            "11",
        )
        .await
        .unwrap_err();
    assert!(matches!(err, CardanoError::InsufficientFunds { required: 11, available: 10, .. }));
    assert_eq!(wallet.count(MockCall::SignTx), 0);
}

#[tokio::test]
async fn test_metadata_transfer_layout() {
    let wallet = MockWallet::new(TESTNET).with_utxo(Value::new(5_000_000));
    let mut connector = connector(&wallet, TESTNET);
    let signature: String = "0123456789abcdef".repeat(9)[..130].to_string();
    let registration: String = "fedcba9876543210".repeat(6)[..88].to_string();

    connector
        .transfer_tokens_with_metadata(
            "Nami",
            &recipient_address(5, TESTNET),
            "1500000",
            TransferMetadata::new(signature.clone(), registration.clone(), "42"),
        )
        .await
        .unwrap();

    let tx = &wallet.submitted()[0];
    let aux = tx.auxiliary_data.as_ref().unwrap();
    assert_eq!(tx.body.auxiliary_data_hash, Some(aux.hash().unwrap()));

    let map = aux.metadata().unwrap().get(1).and_then(TransactionMetadatum::as_map).unwrap();
    let field = |key: &str| map.get_str(key).and_then(TransactionMetadatum::as_text).unwrap().to_string();
    assert_eq!(field("s1"), signature[..64]);
    assert_eq!(field("s2"), signature[64..128]);
    assert_eq!(field("s3"), signature[128..130]);
    assert_eq!(field("wid"), "42");
    assert_eq!(field("r1"), registration[..64]);
    assert_eq!(field("r2"), registration[64..88]);
    let keys: Vec<_> = map.keys().filter_map(TransactionMetadatum::as_text).collect();
    assert_eq!(keys, vec!["s1", "s2", "s3", "wid", "r1", "r2"]);
}

#[tokio::test]
async fn test_invalid_input_never_touches_wallet() {
    let wallet = MockWallet::new(TESTNET).with_utxo(Value::new(5_000_000));
    let mut connector = connector(&wallet, TESTNET);

    let stake = reward_address(3, TESTNET);
    for address in EdgeCaseAddresses::invalid().into_iter().chain([stake.as_str()]) {
        let err = connector.transfer_ada("Nami", address, "1000000").await.unwrap_err();
        assert!(matches!(err, CardanoError::InvalidAddress(_)), "{address}");
    }
    for quantity in EdgeCaseAmounts::invalid_quantities() {
        let err = connector
            .transfer_ada("Nami", &recipient_address(3, TESTNET), quantity)
            .await
            .unwrap_err();
        assert!(matches!(err, CardanoError::InvalidQuantity(_)), "{quantity}");
    }
    for unit in EdgeCaseUnits::invalid() {
        let (policy, name) = unit.split_at(unit.len().min(56));
        let err = connector
            .transfer_tokens("Nami", &recipient_address(3, TESTNET), policy, name, "1")
            .await
            .unwrap_err();
        assert!(err.is_input_error(), "{unit}: {err}");
    }
    assert!(wallet.calls().is_empty());
}

#[tokio::test]
async fn test_declined_signature_is_not_retried() {
    let wallet = MockWallet::new(TESTNET)
        .with_utxo(Value::new(5_000_000))
        .fail(MockCall::SignTx, 2, "user declined");
    let mut connector = connector(&wallet, TESTNET);

    let err = connector
        .transfer_ada("Nami", &recipient_address(3, TESTNET), "2000000")
        .await
        .unwrap_err();
    assert!(matches!(err, CardanoError::WalletOperation { operation: "signTx", code: Some(2), .. }));
    assert_eq!(wallet.count(MockCall::SignTx), 1);
    assert_eq!(wallet.count(MockCall::SubmitTx), 0);
}

#[tokio::test]
async fn test_empty_witness_set_fails_before_submit() {
    let wallet = MockWallet::new(TESTNET)
        .with_utxo(Value::new(5_000_000))
        .with_empty_witnesses();
    let mut connector = connector(&wallet, TESTNET);

    let err = connector
        .transfer_ada("Nami", &recipient_address(3, TESTNET), "2000000")
        .await
        .unwrap_err();
    assert!(matches!(err, CardanoError::WalletOperation { operation: "signTx", .. }));
    assert_eq!(wallet.count(MockCall::SubmitTx), 0);
}

#[tokio::test]
async fn test_second_transfer_uses_fresh_utxos() {
    let wallet = MockWallet::new(TESTNET)
        .with_utxo(Value::new(5_000_000))
        .with_utxo(Value::new(4_000_000));
    let provider = MockProvider::new().with_wallet("nami", wallet.clone());
    let mut config = ConnectorConfig::new(TESTNET);
    // largest-first keeps the 4 ADA output for the second transfer
    config.token_transfer_strategy = 0;
    let mut connector = InjectedWalletConnector::new(provider, &["Nami"], config);
    let recipient = recipient_address(3, TESTNET);

    connector.transfer_ada("Nami", &recipient, "2000000").await.unwrap();
    connector.transfer_ada("Nami", &recipient, "2000000").await.unwrap();

    let submitted = wallet.submitted();
    assert_eq!(submitted.len(), 2);
    for input in &submitted[1].body.inputs {
        assert!(!submitted[0].body.inputs.contains(input));
    }
    assert_eq!(wallet.count(MockCall::GetUtxos), 2);
    assert_eq!(wallet.count(MockCall::Enable), 1);
}

// ============================================================================
// Deadlines
// ============================================================================

#[tokio::test(start_paused = true)]
async fn test_hung_signing_times_out() {
    let wallet = MockWallet::new(TESTNET)
        .with_utxo(Value::new(5_000_000))
        .hang_on(MockCall::SignTx);
    let provider = MockProvider::new().with_wallet("nami", wallet.clone());
    let mut config = ConnectorConfig::new(TESTNET);
    config.timeouts = TimeoutConfig::new().with_prompt(Duration::from_secs(5));
    let mut connector = InjectedWalletConnector::new(provider, &["Nami"], config);

    let err = connector
        .transfer_ada("Nami", &recipient_address(3, TESTNET), "2000000")
        .await
        .unwrap_err();
    assert!(matches!(err, CardanoError::Timeout { ref operation, .. } if operation == "signTx"));
    assert_eq!(wallet.count(MockCall::SubmitTx), 0);
}

#[tokio::test(start_paused = true)]
async fn test_hung_query_times_out() {
    let wallet = MockWallet::new(TESTNET).hang_on(MockCall::GetBalance);
    let provider = MockProvider::new().with_wallet("nami", wallet.clone());
    let mut config = ConnectorConfig::new(TESTNET);
    config.timeouts = TimeoutConfig::new().with_request(Duration::from_secs(2));
    let mut connector = InjectedWalletConnector::new(provider, &["Nami"], config);

    let err = connector.get_tokens_and_balance("Nami").await.unwrap_err();
    assert!(matches!(err, CardanoError::Timeout { .. }));
}
