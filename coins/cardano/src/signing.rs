//! Two-phase signing handshake.
//!
//! `Built → AwaitingSignature → Signed → Submitted`, with `Failed` reachable
//! from every step. A failed flow stays failed; starting over means
//! assembling a new transaction from fresh UTXOs.

use std::fmt;

use crate::assembler::UnsignedTransaction;
use crate::error::{CardanoError, Result};
use crate::ledger::{LedgerObject, Transaction, TransactionWitnessSet};
use crate::session::{TxHash, WalletSession};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SigningState {
    Built,
    AwaitingSignature,
    Signed,
    Submitted,
    Failed,
}

impl fmt::Display for SigningState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SigningState::Built => "built",
            SigningState::AwaitingSignature => "awaiting-signature",
            SigningState::Signed => "signed",
            SigningState::Submitted => "submitted",
            SigningState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// A transaction the wallet accepted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmittedTransaction {
    pub tx_hash: TxHash,
    pub transaction: Transaction,
}

/// Drives one unsigned transaction through signing and submission
#[derive(Debug)]
pub struct SigningFlow {
    state: SigningState,
    unsigned: UnsignedTransaction,
    signed: Option<Transaction>,
}

impl SigningFlow {
    pub fn new(unsigned: UnsignedTransaction) -> Self {
        Self {
            state: SigningState::Built,
            unsigned,
            signed: None,
        }
    }

    pub fn state(&self) -> SigningState {
        self.state
    }

    pub fn signed(&self) -> Option<&Transaction> {
        self.signed.as_ref()
    }

    fn transition(&mut self, to: SigningState) {
        tracing::debug!(from = %self.state, to = %to, "signing state");
        self.state = to;
    }

    fn expect_state(&self, expected: SigningState, action: &str) -> Result<()> {
        if self.state != expected {
            return Err(CardanoError::TransactionBuild(format!(
                "cannot {action} a transaction in state {}",
                self.state
            )));
        }
        Ok(())
    }

    /// Requests a partial witness set and composes the final transaction
    pub async fn sign(&mut self, session: &WalletSession) -> Result<&Transaction> {
        self.expect_state(SigningState::Built, "sign")?;
        self.transition(SigningState::AwaitingSignature);

        match self.request_signature(session).await {
            Ok(transaction) => {
                self.signed = Some(transaction);
                self.transition(SigningState::Signed);
                self.signed
                    .as_ref()
                    .ok_or_else(|| CardanoError::TransactionBuild("signed transaction missing".into()))
            }
            Err(err) => {
                self.transition(SigningState::Failed);
                Err(err)
            }
        }
    }

    async fn request_signature(&self, session: &WalletSession) -> Result<Transaction> {
        let body = self.unsigned.body();
        let body_hash = body.hash()?;
        let response = session
            .sign_witnesses(&self.unsigned.to_hex()?, true)
            .await?;

        let vkeys = match response.vkeys() {
            Some(vkeys) if !vkeys.is_empty() => vkeys.to_vec(),
            _ => {
                tracing::error!("wallet returned no vkey witnesses");
                return Err(CardanoError::WalletOperation {
                    operation: "signTx",
                    code: None,
                    info: "wallet returned no vkey witnesses".into(),
                });
            }
        };
        if !response.skipped_kinds().is_empty() {
            tracing::debug!(kinds = ?response.skipped_kinds(), "ignoring non-vkey witnesses");
        }
        for (index, witness) in vkeys.iter().enumerate() {
            if !witness.verify(&body_hash) {
                tracing::warn!(
                    index,
                    vkey = %hex::encode(witness.vkey),
                    "witness does not verify against the body hash"
                );
            }
        }

        let mut witness_set = TransactionWitnessSet::new();
        witness_set.set_vkeys(vkeys);
        Ok(Transaction::new(
            body.clone(),
            witness_set,
            self.unsigned.auxiliary_data().cloned(),
        ))
    }

    /// Submits the signed transaction. Never retried.
    pub async fn submit(&mut self, session: &WalletSession) -> Result<SubmittedTransaction> {
        self.expect_state(SigningState::Signed, "submit")?;
        let transaction = self
            .signed
            .clone()
            .ok_or_else(|| CardanoError::TransactionBuild("no signed transaction".into()))?;

        match Self::send(session, &transaction).await {
            Ok(tx_hash) => {
                self.transition(SigningState::Submitted);
                Ok(SubmittedTransaction {
                    tx_hash,
                    transaction,
                })
            }
            Err(err) => {
                self.transition(SigningState::Failed);
                Err(err)
            }
        }
    }

    async fn send(session: &WalletSession, transaction: &Transaction) -> Result<TxHash> {
        let tx_hash = session.submit(&transaction.to_hex()?).await?;
        let expected = transaction.body.hash_hex()?;
        if !tx_hash.as_str().eq_ignore_ascii_case(&expected) {
            tracing::warn!(returned = %tx_hash, expected = %expected, "wallet returned an unexpected tx hash");
        }
        Ok(tx_hash)
    }
}

/// Signs with `partialSign = true`, merges the vkey witnesses and submits
pub async fn sign_and_submit(
    session: &WalletSession,
    unsigned: UnsignedTransaction,
) -> Result<SubmittedTransaction> {
    let mut flow = SigningFlow::new(unsigned);
    flow.sign(session).await?;
    flow.submit(session).await
}
