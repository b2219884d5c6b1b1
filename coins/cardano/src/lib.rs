//! # WalletD CIP-30
//!
//! Cardano injected-wallet (CIP-30) connector for the WalletD SDK.
//!
//! ## Features
//!
//! - Detect and enable browser wallet extensions (Nami, Eternl, Flint, ...)
//! - Decode wallet balances into native asset entries with CIP-14 fingerprints
//! - Assemble multi-asset transfers: minimum ADA, linear fees, coin
//!   selection and change
//! - Attach the fixed registration metadata map under label 1
//! - Partial signing through the wallet and submission
//!
//! ## Example
//!
//! ```rust,no_run
//! use walletd_cip30::{ConnectorConfig, InjectedWalletConnector, WalletProvider};
//!
//! async fn send<P: WalletProvider>(provider: P) -> walletd_cip30::Result<()> {
//!     let config = ConnectorConfig::new(walletd_cip30::config::TESTNET_NETWORK_ID);
//!     let mut connector = InjectedWalletConnector::new(provider, &["Nami", "Eternl"], config);
//!
//!     if connector.detect_supported_wallets()? == 0 {
//!         return Ok(());
//!     }
//!     connector.connect_wallet("Nami").await?;
//!     for asset in connector.get_tokens_and_balance("Nami").await? {
//!         println!("{} {} ({})", asset.quantity, asset.name, asset.fingerprint);
//!     }
//!
//!     let tx_hash = connector
//!         .transfer_ada("Nami", "addr_test1vqg3...", "2000000")
//!         .await?;
//!     println!("submitted {tx_hash}");
//!     Ok(())
//! }
//! ```
//!
//! ## Layout
//!
//! - [`ledger`]: CBOR ledger objects exchanged with the wallet
//! - [`builder`]: fee, minimum ADA, input selection and change
//! - [`assembler`]: one transfer request to one unsigned transaction
//! - [`session`] and [`signing`]: the wallet boundary
//! - [`connector`]: the dApp-facing operations

pub mod address;
pub mod assembler;
pub mod asset;
pub mod builder;
pub mod config;
pub mod connector;
pub mod error;
pub mod ledger;
pub mod metadata;
pub mod session;
pub mod signing;
pub mod timeout;

pub use address::{CardanoAddress, Credential};
pub use assembler::{
    AssemblyStep, TransactionAssembler, TransactionDraft, TransferAsset, TransferRequest,
    UnsignedTransaction, ValidatedTransfer,
};
pub use asset::{decode_balance, encode_multi_asset, fingerprint, AssetEntry, AssetRequest};
pub use builder::{CoinSelectionStrategy, LinearFee, TransactionBuilder, TransactionBuilderConfig};
pub use config::{AddressType, ConnectorConfig, ProtocolParameters};
pub use connector::InjectedWalletConnector;
pub use error::{CardanoError, ErrorCode, Result};
pub use metadata::{TransferMetadata, METADATA_LABEL};
pub use session::{
    detect_supported_wallets, Cip30Api, TxHash, WalletApiError, WalletApiResult,
    WalletDescriptor, WalletProvider, WalletSession,
};
pub use signing::{sign_and_submit, SigningFlow, SigningState, SubmittedTransaction};
pub use timeout::{with_timeout, TimeoutConfig, Timer, TokioTimer};
