use crate::error::Result;
use crate::models::{Balance, LedgerEvent, TransferRequest};
use crate::observability::{mask_amount, mask_uuid};
use crate::repositories::{BalanceRepository, EventRepository};
use crate::services::{BalanceProjector, CommandValidator, EventAppender};
use metrics::counter;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::PgPool;
use uuid::Uuid;

/// Business rules the transfer path depends on.
#[derive(Debug, Clone)]
pub struct LedgerConfig {
    pub allow_overdraft: bool,
    pub max_transaction_amount: Decimal,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            allow_overdraft: false,
            max_transaction_amount: Decimal::from(1_000_000),
        }
    }
}

/// Result of a transfer attempt. Rule failures are not errors: they come
/// back with `success = false` and the accumulated reasons, while storage
/// failures surface as `AppError::Database`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferOutcome {
    pub success: bool,
    pub transaction_id: Option<Uuid>,
    pub events: Vec<LedgerEvent>,
    pub updated_balances: Vec<Balance>,
    pub errors: Vec<String>,
}

impl TransferOutcome {
    fn rejected(errors: Vec<String>) -> Self {
        Self {
            success: false,
            transaction_id: None,
            events: Vec::new(),
            updated_balances: Vec::new(),
            errors,
        }
    }

    fn settled(
        transaction_id: Uuid,
        events: Vec<LedgerEvent>,
        updated_balances: Vec<Balance>,
    ) -> Self {
        Self {
            success: true,
            transaction_id: Some(transaction_id),
            events,
            updated_balances,
            errors: Vec::new(),
        }
    }
}

/// Coordinates the transfer pipeline: validate, open a transaction, check
/// funds, append the event pair, project balances, commit.
///
/// Atomicity contract: after a failed transfer no event with its
/// transaction id exists and neither balance has moved.
pub struct LedgerService {
    pool: PgPool,
    validator: CommandValidator,
    events: EventRepository,
    balances: BalanceRepository,
    config: LedgerConfig,
}

impl LedgerService {
    pub fn new(pool: PgPool, config: LedgerConfig) -> Self {
        Self {
            validator: CommandValidator::new(pool.clone(), config.max_transaction_amount),
            events: EventRepository::new(pool.clone()),
            balances: BalanceRepository::new(pool.clone()),
            pool,
            config,
        }
    }

    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferOutcome> {
        let errors = self.validator.validate(&request).await?;
        if !errors.is_empty() {
            counter!("ledger_transfers_total", "outcome" => "rejected").increment(1);
            return Ok(TransferOutcome::rejected(errors));
        }

        let mut tx = self.pool.begin().await?;

        if !self.config.allow_overdraft {
            let available =
                BalanceRepository::available_in_tx(&mut tx, request.source_account_id).await?;
            let has_funds = available.map_or(false, |a| a >= request.amount);
            if !has_funds {
                tracing::debug!(
                    source = %mask_uuid(&request.source_account_id),
                    amount = %mask_amount(&request.amount),
                    "transfer rejected for insufficient funds"
                );
                tx.rollback().await?;
                counter!("ledger_transfers_total", "outcome" => "insufficient_funds")
                    .increment(1);
                return Ok(TransferOutcome::rejected(vec![
                    "Insufficient funds".to_string()
                ]));
            }
        }

        let (debit, credit) = EventAppender::append_transfer(
            &mut tx,
            request.source_account_id,
            request.destination_account_id,
            request.amount,
            &request.currency,
            &request.metadata,
        )
        .await?;

        let events = vec![debit, credit];
        let updated_balances = BalanceProjector::project(&mut tx, &events).await?;

        tx.commit().await?;

        let transaction_id = events[0].transaction_id;
        counter!("ledger_transfers_total", "outcome" => "settled").increment(1);
        tracing::info!(
            %transaction_id,
            currency = %request.currency,
            "transfer settled"
        );

        Ok(TransferOutcome::settled(
            transaction_id,
            events,
            updated_balances,
        ))
    }

    pub async fn account_balance(&self, account_id: Uuid) -> Result<Option<Balance>> {
        self.balances.get(account_id).await
    }

    pub async fn account_events(&self, account_id: Uuid, limit: i64) -> Result<Vec<LedgerEvent>> {
        self.events.by_account(account_id, limit).await
    }

    pub async fn transaction_events(&self, transaction_id: Uuid) -> Result<Vec<LedgerEvent>> {
        self.events.by_transaction(transaction_id).await
    }
}
