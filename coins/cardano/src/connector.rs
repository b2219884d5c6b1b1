//! dApp-facing facade over one injected wallet provider.
//!
//! The connector remembers the last connected session, but every pipeline
//! takes its own handle to that session up front and threads it through
//! fetch, assembly and signing. Reconnecting while a transfer is in flight
//! therefore never redirects the transfer to the new wallet.

use std::fmt;
use std::rc::Rc;

use crate::address::CardanoAddress;
use crate::assembler::{TransactionAssembler, TransferRequest, UnsignedTransaction, ValidatedTransfer};
use crate::asset::{entries_from_value, AssetEntry};
use crate::config::ConnectorConfig;
use crate::error::{CardanoError, Result};
use crate::metadata::TransferMetadata;
use crate::session::{self, TxHash, WalletDescriptor, WalletProvider, WalletSession};
use crate::signing::sign_and_submit;
use crate::timeout::{Timer, TokioTimer};

pub struct InjectedWalletConnector<P: WalletProvider> {
    provider: P,
    config: ConnectorConfig,
    supporting_wallets: Vec<String>,
    supported: Vec<WalletDescriptor>,
    session: Option<Rc<WalletSession>>,
    timer: Rc<dyn Timer>,
}

impl<P: WalletProvider> fmt::Debug for InjectedWalletConnector<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InjectedWalletConnector")
            .field("config", &self.config)
            .field("supporting_wallets", &self.supporting_wallets)
            .field("supported", &self.supported)
            .field("session", &self.session)
            .finish_non_exhaustive()
    }
}

impl<P: WalletProvider> InjectedWalletConnector<P> {
    /// Connector running on the tokio clock
    pub fn new(provider: P, supporting_wallets: &[&str], config: ConnectorConfig) -> Self {
        Self::with_timer(provider, supporting_wallets, config, Rc::new(TokioTimer))
    }

    pub fn with_timer(
        provider: P,
        supporting_wallets: &[&str],
        config: ConnectorConfig,
        timer: Rc<dyn Timer>,
    ) -> Self {
        Self {
            provider,
            config,
            supporting_wallets: supporting_wallets.iter().map(|w| w.to_string()).collect(),
            supported: Vec::new(),
            session: None,
            timer,
        }
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Checks the configured candidates and returns how many are installed
    pub fn detect_supported_wallets(&mut self) -> Result<usize> {
        let candidates: Vec<&str> = self.supporting_wallets.iter().map(String::as_str).collect();
        self.supported = session::detect_supported_wallets(&self.provider, &candidates)?;
        Ok(self.supported.len())
    }

    /// Descriptors found by the last detection
    pub fn supported_wallets(&self) -> &[WalletDescriptor] {
        &self.supported
    }

    /// The last connected session, if any
    pub fn session(&self) -> Option<Rc<WalletSession>> {
        self.session.clone()
    }

    /// Enables `wallet_name` on the expected network and makes it the
    /// active session, replacing any previous one
    pub async fn connect_wallet(&mut self, wallet_name: &str) -> Result<Rc<WalletSession>> {
        let session = WalletSession::connect(
            &self.provider,
            wallet_name,
            Some(self.config.expected_network_id),
            self.config.timeouts.clone(),
            self.timer.clone(),
        )
        .await?;
        let session = Rc::new(session);
        if let Some(previous) = self.session.replace(session.clone()) {
            tracing::debug!(previous = %previous.provider_key(), current = %session.provider_key(), "replaced wallet session");
        }
        Ok(session)
    }

    /// Reuses the active session when it belongs to `wallet_name`
    async fn session_for(&mut self, wallet_name: &str) -> Result<Rc<WalletSession>> {
        match &self.session {
            Some(session) if session.provider_key() == wallet_name.to_lowercase() => {
                Ok(session.clone())
            }
            _ => self.connect_wallet(wallet_name).await,
        }
    }

    fn active_session(&self) -> Result<Rc<WalletSession>> {
        self.session.clone().ok_or_else(|| {
            tracing::error!("no wallet connected");
            CardanoError::WalletNotConnected
        })
    }

    /// Native assets held by the wallet. Connects first when nothing is
    /// connected yet.
    pub async fn get_tokens_and_balance(&mut self, wallet_identifier: &str) -> Result<Vec<AssetEntry>> {
        let session = match &self.session {
            Some(session) => session.clone(),
            None => self.connect_wallet(wallet_identifier).await?,
        };
        let value = session.balance().await?;
        let entries = entries_from_value(&value)?;
        tracing::info!(assets = entries.len(), lovelace = value.coin, "fetched balance");
        Ok(entries)
    }

    /// First asset under `policy_id` (hex), if the wallet holds one
    pub async fn get_balance_by_policy(
        &mut self,
        wallet_identifier: &str,
        policy_id: &str,
    ) -> Result<Option<AssetEntry>> {
        let entries = self.get_tokens_and_balance(wallet_identifier).await?;
        Ok(entries
            .into_iter()
            .find(|entry| entry.policy.eq_ignore_ascii_case(policy_id)))
    }

    /// Bech32 change address of the active wallet
    pub async fn get_change_address(&self) -> Result<String> {
        let session = self.active_session()?;
        change_address(&session).await?.to_bech32()
    }

    /// First used address of the active wallet
    pub async fn get_used_addresses(&self) -> Result<Option<String>> {
        let session = self.active_session()?;
        let used = session.used_addresses().await?;
        let rendered = used
            .iter()
            .map(CardanoAddress::to_bech32)
            .collect::<Result<Vec<_>>>()?;
        tracing::debug!(addresses = ?rendered, "used addresses");
        Ok(rendered.into_iter().next())
    }

    /// Sends `quantity` of the native asset `policy_hex ++ asset_name_hex`
    pub async fn transfer_tokens(
        &mut self,
        wallet_name: &str,
        recipient: &str,
        policy_hex: &str,
        asset_name_hex: &str,
        quantity: &str,
    ) -> Result<TxHash> {
        let request = TransferRequest::native(recipient, policy_hex, asset_name_hex, quantity)
            .with_strategy(self.config.token_strategy()?);
        self.transfer(wallet_name, request).await
    }

    /// Sends `lovelace` with the registration metadata attached
    pub async fn transfer_tokens_with_metadata(
        &mut self,
        wallet_name: &str,
        recipient: &str,
        lovelace: &str,
        metadata: TransferMetadata,
    ) -> Result<TxHash> {
        let request = TransferRequest::ada(recipient, lovelace)
            .with_metadata(metadata)
            .with_strategy(self.config.metadata_strategy()?);
        self.transfer(wallet_name, request).await
    }

    /// Sends `lovelace` ADA
    pub async fn transfer_ada(&mut self, wallet_name: &str, recipient: &str, lovelace: &str) -> Result<TxHash> {
        let request =
            TransferRequest::ada(recipient, lovelace).with_strategy(self.config.token_strategy()?);
        self.transfer(wallet_name, request).await
    }

    /// Validates, assembles, signs and submits one transfer
    pub async fn transfer(&mut self, wallet_name: &str, request: TransferRequest) -> Result<TxHash> {
        let transfer = request.validate().map_err(|err| {
            tracing::error!(error = %err, "rejected transfer request");
            err
        })?;

        let session = self.session_for(wallet_name).await?;
        let _pipeline = session.lock_pipeline().await;

        let unsigned = self.assemble(&session, &transfer).await?;
        let submitted = sign_and_submit(&session, unsigned).await?;
        Ok(submitted.tx_hash)
    }

    async fn assemble(
        &self,
        session: &WalletSession,
        transfer: &ValidatedTransfer,
    ) -> Result<UnsignedTransaction> {
        let change_address = change_address(session).await?;
        let utxos = session.utxos().await?;
        TransactionAssembler::new(&self.config.protocol_parameters).assemble(
            transfer,
            &utxos,
            &change_address,
        )
    }
}

/// Change address, also listing the other address kinds for the log.
/// Used addresses must load; reward and unused ones are best effort.
async fn change_address(session: &WalletSession) -> Result<CardanoAddress> {
    let change = session.change_address().await?;

    let used = session.used_addresses().await?;
    tracing::debug!(count = used.len(), "used addresses");

    let reward = session.reward_addresses().await.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "could not list reward addresses");
        Vec::new()
    });
    let unused = session.unused_addresses().await.unwrap_or_else(|err| {
        tracing::warn!(error = %err, "could not list unused addresses");
        Vec::new()
    });
    tracing::debug!(
        change = %change,
        reward = reward.len(),
        unused = unused.len(),
        "wallet addresses"
    );
    Ok(change)
}
