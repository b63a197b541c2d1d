//! The trade execution pipeline: approval, quote, confirmation,
//! transaction build, sign/submit, confirmation wait, and the post-trade
//! balance report. Stages run strictly in sequence; each depends on the
//! previous step's on-chain effect or value.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use num_bigint::BigUint;
use thiserror::Error as ThisError;
use tracing::info;

use crate::abi::{AbiResolver, AbiSource};
use crate::approval::ApprovalManager;
use crate::confirm::{Confirm, TradeSummary};
use crate::contracts::{Erc20, Router};
use crate::error::{Error, LedgerError};
use crate::events::{NullSink, ProgressSink, TradeEvent};
use crate::ledger::{submit_transaction, LedgerClient, Receipt, SubmitOptions, TxHash};
use crate::quote::{self, Slippage};
use crate::signer::Signer;
use crate::token::{Address, Token};
use crate::units;

/// PancakeSwap v2 router on BNB Smart Chain.
pub const DEFAULT_ROUTER: &str = "0x10ED43C718714eb63d5aA57B78B54704E256024E";

/// How far in the future the router deadline is set.
pub const DEFAULT_DEADLINE_WINDOW: Duration = Duration::from_secs(300);

/// Where in the pipeline execution currently is, or was when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TradeStage {
    Init,
    Approving,
    Quoting,
    AwaitingConfirmation,
    Submitting,
    AwaitingReceipt,
    Done,
}

impl fmt::Display for TradeStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TradeStage::Init => "initializing",
            TradeStage::Approving => "approving",
            TradeStage::Quoting => "quoting",
            TradeStage::AwaitingConfirmation => "awaiting confirmation",
            TradeStage::Submitting => "submitting",
            TradeStage::AwaitingReceipt => "awaiting receipt",
            TradeStage::Done => "finishing",
        };
        f.write_str(name)
    }
}

/// A pipeline failure, tagged with the stage it happened in so callers
/// always know how far the trade got and whether funds moved.
#[derive(Debug, ThisError)]
#[error("swap failed while {stage}: {source}")]
pub struct TradeError {
    pub stage: TradeStage,
    #[source]
    pub source: Error,
}

/// Terminal result of a swap invocation.
#[derive(Debug)]
pub enum TradeOutcome {
    /// The swap confirmed; balances are the post-trade smallest-unit
    /// amounts of the base and desired tokens.
    Completed {
        receipt: Receipt,
        base_balance: BigUint,
        desired_balance: BigUint,
    },
    /// The confirmation callback declined; nothing was signed or sent.
    Cancelled,
    /// The transaction was broadcast but no receipt appeared within the
    /// timeout. It may still confirm; poll the hash out-of-band.
    TimedOut { tx_hash: TxHash },
}

/// Per-session trade parameters. Immutable once constructed.
#[derive(Debug, Clone)]
pub struct TradeConfig {
    pub wallet: Address,
    pub base: Token,
    pub desired: Token,
    pub slippage: Slippage,
}

impl TradeConfig {
    pub fn new(wallet: &str, base: Token, desired: Token, slippage: Slippage) -> Result<Self, Error> {
        Ok(Self {
            wallet: wallet.parse()?,
            base,
            desired,
            slippage,
        })
    }
}

/// The top-level swap orchestrator.
pub struct SwapEngine {
    config: TradeConfig,
    ledger: Arc<dyn LedgerClient>,
    signer: Arc<dyn Signer>,
    resolver: AbiResolver,
    approvals: ApprovalManager,
    confirm: Arc<dyn Confirm>,
    sink: Arc<dyn ProgressSink>,
    router_address: Address,
    deadline_window: Duration,
    submit_options: SubmitOptions,
}

impl SwapEngine {
    pub fn new(
        config: TradeConfig,
        ledger: Arc<dyn LedgerClient>,
        signer: Arc<dyn Signer>,
        abi_source: Arc<dyn AbiSource>,
        confirm: Arc<dyn Confirm>,
    ) -> Result<Self, Error> {
        Ok(Self {
            config,
            ledger,
            signer,
            resolver: AbiResolver::new(abi_source),
            approvals: ApprovalManager::new(),
            confirm,
            sink: Arc::new(NullSink),
            router_address: DEFAULT_ROUTER.parse()?,
            deadline_window: DEFAULT_DEADLINE_WINDOW,
            submit_options: SubmitOptions::default(),
        })
    }

    pub fn with_router(mut self, address: Address) -> Self {
        self.router_address = address;
        self
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_deadline_window(mut self, window: Duration) -> Self {
        self.deadline_window = window;
        self
    }

    pub fn with_submit_options(mut self, options: SubmitOptions) -> Self {
        self.submit_options = options;
        self
    }

    pub fn with_approval_floor(mut self, floor: BigUint) -> Self {
        self.approvals = ApprovalManager::with_floor(floor);
        self
    }

    /// Current smallest-unit balances of the base and desired tokens.
    pub async fn balances(&self) -> Result<(BigUint, BigUint), Error> {
        let base = Erc20::bind(&self.config.base.address, &self.resolver).await?;
        let desired = Erc20::bind(&self.config.desired.address, &self.resolver).await?;
        let base_balance = base.balance_of(&*self.ledger, &self.config.wallet).await?;
        let desired_balance = desired.balance_of(&*self.ledger, &self.config.wallet).await?;
        Ok((base_balance, desired_balance))
    }

    /// Execute one swap of `amount_in` (human-readable decimal string)
    /// of the base token for the desired token.
    pub async fn swap(&self, amount_in: &str) -> Result<TradeOutcome, TradeError> {
        let config = &self.config;
        self.sink.emit(&TradeEvent::SwapStarted {
            base_symbol: config.base.symbol.clone(),
            desired_symbol: config.desired.symbol.clone(),
            slippage_percent: config.slippage.percent_string(),
        });

        // Init: parse the amount, bind both contracts, and check the
        // balance covers the trade before anything mutates on chain.
        let amount_in_wei = units::parse_units(amount_in, config.base.decimals)
            .map_err(fail(TradeStage::Init))?;
        let base_erc20 = Erc20::bind(&config.base.address, &self.resolver)
            .await
            .map_err(Error::from)
            .map_err(fail(TradeStage::Init))?;
        let router = Router::bind(&self.router_address, &self.resolver)
            .await
            .map_err(Error::from)
            .map_err(fail(TradeStage::Init))?;

        let balance = base_erc20
            .balance_of(&*self.ledger, &config.wallet)
            .await
            .map_err(fail(TradeStage::Init))?;
        if balance < amount_in_wei {
            return Err(fail(TradeStage::Init)(Error::InsufficientBalance {
                symbol: config.base.symbol.clone(),
                required: units::format_units(&amount_in_wei, config.base.decimals),
                available: units::format_units(&balance, config.base.decimals),
            }));
        }

        // Approving: guarantee the router can spend the base token.
        self.approvals
            .ensure_allowance(
                &*self.ledger,
                &*self.signer,
                &base_erc20,
                &config.base.symbol,
                &self.router_address,
                &self.submit_options,
                &*self.sink,
            )
            .await
            .map_err(fail(TradeStage::Approving))?;

        // Quoting: expected output and the slippage-protected floor.
        let path = vec![config.base.address, config.desired.address];
        let swap_quote = quote::fetch_quote(
            &*self.ledger,
            &router,
            &amount_in_wei,
            path,
            config.slippage,
        )
        .await
        .map_err(fail(TradeStage::Quoting))?;
        self.sink.emit(&TradeEvent::QuoteReceived {
            symbol: config.desired.symbol.clone(),
            decimals: config.desired.decimals,
            expected_out: swap_quote.expected_out.clone(),
            minimum_out: swap_quote.minimum_out.clone(),
        });

        // AwaitingConfirmation: nothing is built or signed unless the
        // caller says yes.
        let deadline = now_unix() + self.deadline_window.as_secs();
        self.sink.emit(&TradeEvent::DeadlineSet { unix: deadline });

        let summary = TradeSummary {
            base: config.base.clone(),
            desired: config.desired.clone(),
            amount_in: amount_in_wei.clone(),
            expected_out: swap_quote.expected_out.clone(),
            minimum_out: swap_quote.minimum_out.clone(),
            deadline,
        };
        if !self.confirm.confirm(&summary).await {
            self.sink.emit(&TradeEvent::SwapCancelled);
            info!("trade declined by caller, nothing submitted");
            return Ok(TradeOutcome::Cancelled);
        }

        // Submitting / AwaitingReceipt.
        let calldata = router
            .swap_calldata(
                &amount_in_wei,
                &swap_quote.minimum_out,
                &swap_quote.path,
                &config.wallet,
                deadline,
            )
            .map_err(fail(TradeStage::Submitting))?;

        let receipt = match submit_transaction(
            &*self.ledger,
            &*self.signer,
            &router.address,
            calldata,
            &self.submit_options,
            &*self.sink,
        )
        .await
        {
            Ok(receipt) => receipt,
            Err(LedgerError::ConfirmationTimeout { tx_hash, .. }) => {
                // Broadcast but unconfirmed: a distinct outcome, not a
                // failure. The trade may still mine.
                self.sink.emit(&TradeEvent::ReceiptPending { hash: tx_hash });
                return Ok(TradeOutcome::TimedOut { tx_hash });
            }
            Err(e) => return Err(fail(TradeStage::Submitting)(e.into())),
        };

        // Done: report post-trade balances.
        let (base_balance, desired_balance) =
            self.balances().await.map_err(fail(TradeStage::Done))?;
        self.sink.emit(&TradeEvent::BalancesUpdated {
            base_symbol: config.base.symbol.clone(),
            base_decimals: config.base.decimals,
            base_amount: base_balance.clone(),
            desired_symbol: config.desired.symbol.clone(),
            desired_decimals: config.desired.decimals,
            desired_amount: desired_balance.clone(),
        });
        info!(block = receipt.block_number, "swap confirmed");

        Ok(TradeOutcome::Completed {
            receipt,
            base_balance,
            desired_balance,
        })
    }
}

fn fail(stage: TradeStage) -> impl FnOnce(Error) -> TradeError {
    move |source| TradeError { stage, source }
}

fn now_unix() -> u64 {
    let timestamp = time::OffsetDateTime::now_utc().unix_timestamp();
    u64::try_from(timestamp).unwrap_or(0)
}
