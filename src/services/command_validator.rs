use crate::error::Result;
use crate::models::TransferRequest;
use crate::repositories::AccountRepository;
use rust_decimal::Decimal;
use sqlx::PgPool;

/// Validates transfer commands before any transaction is opened.
///
/// Rules accumulate: every violated rule appears in the returned list. The
/// sufficient-funds check is deliberately absent here; it runs inside the
/// transfer transaction to avoid a check-then-debit race.
pub struct CommandValidator {
    accounts: AccountRepository,
    max_transaction_amount: Decimal,
}

impl CommandValidator {
    pub fn new(pool: PgPool, max_transaction_amount: Decimal) -> Self {
        Self {
            accounts: AccountRepository::new(pool),
            max_transaction_amount,
        }
    }

    /// Returns the full list of violated rules; empty means valid.
    pub async fn validate(&self, request: &TransferRequest) -> Result<Vec<String>> {
        let mut errors = Self::static_rules(request, self.max_transaction_amount);

        let source_exists = self.accounts.exists(request.source_account_id).await?;
        if !source_exists {
            errors.push("Source account does not exist".to_string());
        }

        let dest_exists = self.accounts.exists(request.destination_account_id).await?;
        if !dest_exists {
            errors.push("Destination account does not exist".to_string());
        }

        if source_exists && dest_exists {
            if let Some(source) = self.accounts.find_by_id(request.source_account_id).await? {
                if source.currency != request.currency {
                    errors.push(
                        "Transfer currency doesn't match source account currency".to_string(),
                    );
                }
            }
            if let Some(dest) = self
                .accounts
                .find_by_id(request.destination_account_id)
                .await?
            {
                if dest.currency != request.currency {
                    errors.push(
                        "Transfer currency doesn't match destination account currency".to_string(),
                    );
                }
            }
        }

        Ok(errors)
    }

    /// The rules that need no storage access.
    fn static_rules(request: &TransferRequest, max_amount: Decimal) -> Vec<String> {
        let mut errors = Vec::new();

        if request.amount <= Decimal::ZERO {
            errors.push("Amount must be positive".to_string());
        }

        if request.amount > max_amount {
            errors.push(format!("Amount exceeds maximum limit of {}", max_amount));
        }

        if request.source_account_id == request.destination_account_id {
            errors.push("Source and destination must not be the same account".to_string());
        }

        errors
    }
}
