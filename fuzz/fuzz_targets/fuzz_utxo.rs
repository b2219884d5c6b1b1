#![no_main]

use libfuzzer_sys::fuzz_target;
use walletd_cip30::ledger::{LedgerObject, Transaction, TransactionUnspentOutput, TransactionWitnessSet};

fuzz_target!(|data: &[u8]| {
    if let Ok(utxo) = TransactionUnspentOutput::from_bytes(data) {
        // Raw bytes are kept for signing and must match the input
        assert_eq!(utxo.raw_bytes(), data);
        let _ = utxo.coin();
    }

    let _ = TransactionWitnessSet::from_bytes(data);

    if let Ok(tx) = Transaction::from_bytes(data) {
        let _ = tx.body.hash();
        let _ = tx.size();
    }
});
