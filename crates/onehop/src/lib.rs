pub mod abi;
pub mod approval;
pub mod codec;
pub mod confirm;
pub mod contracts;
pub mod error;
pub mod events;
pub mod ledger;
pub mod quote;
pub mod rpc;
pub mod signer;
pub mod swap;
pub mod token;
pub mod units;

#[cfg(test)]
pub(crate) mod testing;

// Re-exports for convenience
pub use abi::{AbiResolver, AbiSource, EtherscanSource, StaticAbiSource};
pub use confirm::{AlwaysConfirm, Confirm, NeverConfirm, TradeSummary};
pub use error::{AbiError, CodecError, Error, LedgerError};
pub use events::{MemorySink, NullSink, ProgressSink, TradeEvent};
pub use ledger::{LedgerClient, Receipt, SubmitOptions, TxHash};
pub use quote::{Slippage, SwapQuote};
pub use rpc::HttpLedger;
pub use signer::{Signature, Signer};
pub use swap::{SwapEngine, TradeConfig, TradeError, TradeOutcome, TradeStage};
pub use token::{Address, Token};

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use num_bigint::BigUint;

    use super::*;
    use crate::approval::max_uint256;
    use crate::testing::{
        erc20_abi_json, router_abi_json, MockLedger, APPROVE_SELECTOR, SWAP_SELECTOR,
    };

    fn busd() -> Token {
        Token::new("BUSD", "0xe9e7cea3dedca5984780bafc599bd69add087d56", 18).unwrap()
    }

    fn cake() -> Token {
        Token::new("CAKE", "0x0e09fabb73bd3ade0a17ecc321fd13a19e81ce82", 18).unwrap()
    }

    fn wallet() -> Address {
        "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed".parse().unwrap()
    }

    fn abi_source() -> Arc<StaticAbiSource> {
        let source = Arc::new(StaticAbiSource::new());
        source.insert(busd().address, erc20_abi_json());
        source.insert(cake().address, erc20_abi_json());
        source.insert(swap::DEFAULT_ROUTER.parse().unwrap(), router_abi_json());
        source
    }

    /// A ledger scripted for a clean ten-BUSD swap: ample balance and a
    /// 0.5 CAKE quote.
    fn scripted_ledger() -> Arc<MockLedger> {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_balance(
            busd().address,
            wallet(),
            "100000000000000000000".parse().unwrap(),
        );
        ledger.set_balance(
            cake().address,
            wallet(),
            "500000000000000000".parse().unwrap(),
        );
        ledger.set_amounts_out(vec![
            "10000000000000000000".parse().unwrap(),
            "500000000000000000".parse().unwrap(),
        ]);
        ledger
    }

    fn engine(
        ledger: Arc<MockLedger>,
        confirm: Arc<dyn Confirm>,
        sink: Arc<MemorySink>,
    ) -> SwapEngine {
        let config = TradeConfig::new(
            "0x5aaeb6053f3e94c9b9a09f33669435e7ef1beaed",
            busd(),
            cake(),
            Slippage::from_percent("0.5").unwrap(),
        )
        .unwrap();
        SwapEngine::new(config, ledger, Arc::new(signer::StaticSigner::new(wallet())), abi_source(), confirm)
            .unwrap()
            .with_progress(sink)
    }

    /// Records the summary it was asked to confirm.
    struct RecordingConfirm {
        summaries: Mutex<Vec<TradeSummary>>,
    }

    impl RecordingConfirm {
        fn new() -> Self {
            Self {
                summaries: Mutex::new(vec![]),
            }
        }
    }

    #[async_trait]
    impl Confirm for RecordingConfirm {
        async fn confirm(&self, summary: &TradeSummary) -> bool {
            self.summaries.lock().unwrap().push(summary.clone());
            true
        }
    }

    #[tokio::test]
    async fn test_swap_with_fresh_approval() {
        let ledger = scripted_ledger();
        let sink = Arc::new(MemorySink::new());
        let engine = engine(ledger.clone(), Arc::new(AlwaysConfirm), sink.clone());

        let outcome = engine.swap("10").await.unwrap();

        match outcome {
            TradeOutcome::Completed { receipt, desired_balance, .. } => {
                assert!(receipt.status);
                assert_eq!(desired_balance, "500000000000000000".parse().unwrap());
            }
            other => panic!("expected completion, got {other:?}"),
        }

        // Allowance started at zero: one approve, then one swap
        let sent = ledger.sent_transactions();
        assert_eq!(sent.len(), 2);
        assert!(ledger.sent_with_selector(&APPROVE_SELECTOR));
        assert!(ledger.sent_with_selector(&SWAP_SELECTOR));

        let events = sink.events();
        assert!(events.iter().any(|e| matches!(e, TradeEvent::GasPrice { .. })));
        assert!(events.iter().any(|e| matches!(e, TradeEvent::TransactionSent { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, TradeEvent::TransactionConfirmed { .. })));
        assert!(events
            .iter()
            .any(|e| matches!(e, TradeEvent::BalancesUpdated { .. })));
    }

    #[tokio::test]
    async fn test_swap_skips_redundant_approval() {
        let ledger = scripted_ledger();
        ledger.set_allowance(max_uint256());
        let sink = Arc::new(MemorySink::new());
        let engine = engine(ledger.clone(), Arc::new(AlwaysConfirm), sink.clone());

        let outcome = engine.swap("10").await.unwrap();
        assert!(matches!(outcome, TradeOutcome::Completed { .. }));

        // Only the swap itself was broadcast
        assert_eq!(ledger.sent_transactions().len(), 1);
        assert!(!ledger.sent_with_selector(&APPROVE_SELECTOR));
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, TradeEvent::AllowanceSufficient { .. })));
    }

    #[tokio::test]
    async fn test_declined_confirmation_cancels_without_signing() {
        let ledger = scripted_ledger();
        ledger.set_allowance(max_uint256());
        let sink = Arc::new(MemorySink::new());
        let engine = engine(ledger.clone(), Arc::new(NeverConfirm), sink.clone());

        let outcome = engine.swap("10").await.unwrap();

        assert!(matches!(outcome, TradeOutcome::Cancelled));
        assert!(ledger.sent_transactions().is_empty());
        assert!(sink
            .events()
            .iter()
            .any(|e| matches!(e, TradeEvent::SwapCancelled)));
    }

    #[tokio::test]
    async fn test_confirmation_sees_slippage_floor() {
        let ledger = scripted_ledger();
        ledger.set_allowance(max_uint256());
        let confirm = Arc::new(RecordingConfirm::new());
        let sink = Arc::new(MemorySink::new());
        let engine = engine(ledger.clone(), confirm.clone(), sink);

        engine.swap("10").await.unwrap();

        let summaries = confirm.summaries.lock().unwrap();
        assert_eq!(summaries.len(), 1);
        let summary = &summaries[0];
        assert_eq!(summary.amount_in, "10000000000000000000".parse().unwrap());
        assert_eq!(summary.expected_out, "500000000000000000".parse().unwrap());
        // floor(0.5e18 × (1 − 0.005 − 0.0025))
        assert_eq!(summary.minimum_out, "496250000000000000".parse().unwrap());
        assert!(summary.deadline > 0);
    }

    #[tokio::test]
    async fn test_insufficient_balance_aborts_before_any_write() {
        let ledger = scripted_ledger();
        ledger.set_balance(busd().address, wallet(), BigUint::from(1u8));
        let engine = engine(ledger.clone(), Arc::new(AlwaysConfirm), Arc::new(MemorySink::new()));

        let error = engine.swap("10").await.unwrap_err();

        assert_eq!(error.stage, TradeStage::Init);
        assert!(matches!(error.source, Error::InsufficientBalance { .. }));
        assert!(ledger.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_amount_aborts() {
        let ledger = scripted_ledger();
        let engine = engine(ledger.clone(), Arc::new(AlwaysConfirm), Arc::new(MemorySink::new()));

        let error = engine.swap("ten").await.unwrap_err();
        assert_eq!(error.stage, TradeStage::Init);
        assert!(matches!(error.source, Error::InvalidAmount(_)));
        assert!(ledger.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_quote_failure_is_a_quoting_stage_error() {
        let ledger = scripted_ledger();
        ledger.set_allowance(max_uint256());
        ledger.set_amounts_out(vec![]);
        let engine = engine(ledger.clone(), Arc::new(AlwaysConfirm), Arc::new(MemorySink::new()));

        let error = engine.swap("10").await.unwrap_err();
        assert_eq!(error.stage, TradeStage::Quoting);
        assert!(ledger.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_receipt_timeout_is_a_distinct_outcome() {
        let ledger = scripted_ledger();
        ledger.set_allowance(max_uint256());
        ledger.never_mine();
        let sink = Arc::new(MemorySink::new());
        let engine = engine(ledger.clone(), Arc::new(AlwaysConfirm), sink.clone())
            .with_submit_options(SubmitOptions {
                gas_fallback: 500_000,
                receipt_timeout: Duration::from_millis(30),
                poll_interval: Duration::from_millis(10),
            });

        let outcome = engine.swap("10").await.unwrap();

        match outcome {
            TradeOutcome::TimedOut { tx_hash } => {
                // The transaction did go out
                assert_eq!(ledger.sent_transactions().len(), 1);
                assert!(sink.events().iter().any(|e| matches!(
                    e,
                    TradeEvent::ReceiptPending { hash } if *hash == tx_hash
                )));
            }
            other => panic!("expected timeout outcome, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_receipt_surfaces_as_revert() {
        let ledger = scripted_ledger();
        ledger.set_allowance(max_uint256());
        ledger.set_receipt_status(false);
        let engine = engine(ledger.clone(), Arc::new(AlwaysConfirm), Arc::new(MemorySink::new()));

        let error = engine.swap("10").await.unwrap_err();
        assert_eq!(error.stage, TradeStage::Submitting);
        assert!(matches!(
            error.source,
            Error::Ledger(LedgerError::Reverted { .. })
        ));
    }

    #[tokio::test]
    async fn test_gas_estimation_fallback() {
        let ledger = scripted_ledger();
        ledger.set_allowance(max_uint256());
        ledger.fail_gas_estimate();
        let sink = Arc::new(MemorySink::new());
        let engine = engine(ledger.clone(), Arc::new(AlwaysConfirm), sink.clone());

        let outcome = engine.swap("10").await.unwrap();
        assert!(matches!(outcome, TradeOutcome::Completed { .. }));

        // Cost was reported against the 500k fallback ceiling at 5 Gwei
        let expected: BigUint = BigUint::from(5_000_000_000u64) * 500_000u64;
        assert!(sink.events().iter().any(|e| matches!(
            e,
            TradeEvent::EstimatedGasCost { wei } if *wei == expected
        )));
    }

    #[tokio::test]
    async fn test_ledger_outage_during_reads_fails_cleanly() {
        let ledger = scripted_ledger();
        ledger.fail_reads();
        let engine = engine(ledger.clone(), Arc::new(AlwaysConfirm), Arc::new(MemorySink::new()));

        let error = engine.swap("10").await.unwrap_err();
        assert_eq!(error.stage, TradeStage::Init);
        assert!(matches!(
            error.source,
            Error::Ledger(LedgerError::Unavailable(_))
        ));
        assert!(ledger.sent_transactions().is_empty());
    }

    #[tokio::test]
    async fn test_balances_helper() {
        let ledger = scripted_ledger();
        let engine = engine(ledger, Arc::new(AlwaysConfirm), Arc::new(MemorySink::new()));

        let (base, desired) = engine.balances().await.unwrap();
        assert_eq!(base, "100000000000000000000".parse().unwrap());
        assert_eq!(desired, "500000000000000000".parse().unwrap());
    }
}
