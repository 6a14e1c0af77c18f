use crate::error::Result;
use crate::models::{Balance, EventType, LedgerEvent};
use crate::repositories::BalanceRepository;
use rust_decimal::Decimal;
use sqlx::{Postgres, Transaction};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Per-account delta accumulated across one event batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceDelta {
    pub currency: String,
    pub available: Decimal,
    pub pending: Decimal,
}

/// Projects event batches onto balance rows.
///
/// Deltas are aggregated per account first, then each account gets exactly
/// one upsert within the caller's transaction. A debit subtracts from its
/// source account's available balance, a credit adds to its destination's.
/// The pending delta is always zero on this path.
pub struct BalanceProjector;

impl BalanceProjector {
    /// Pure aggregation step. Events that carry no account on their active
    /// side contribute nothing.
    pub fn aggregate(events: &[LedgerEvent]) -> BTreeMap<Uuid, BalanceDelta> {
        let mut deltas: BTreeMap<Uuid, BalanceDelta> = BTreeMap::new();

        for event in events {
            let (account_id, signed_amount) = match event.event_type {
                EventType::Debit => match event.source_account_id {
                    Some(id) => (id, -event.amount),
                    None => continue,
                },
                EventType::Credit => match event.destination_account_id {
                    Some(id) => (id, event.amount),
                    None => continue,
                },
                EventType::Transfer => continue,
            };

            let delta = deltas.entry(account_id).or_insert_with(|| BalanceDelta {
                currency: event.currency.clone(),
                available: Decimal::ZERO,
                pending: Decimal::ZERO,
            });
            delta.available += signed_amount;
        }

        deltas
    }

    /// Applies the aggregated deltas. Must run in the same transaction as
    /// the event append so events and balances commit or roll back together.
    pub async fn project(
        tx: &mut Transaction<'_, Postgres>,
        events: &[LedgerEvent],
    ) -> Result<Vec<Balance>> {
        let deltas = Self::aggregate(events);
        let mut updated = Vec::with_capacity(deltas.len());

        for (account_id, delta) in deltas {
            let balance = BalanceRepository::apply_delta(
                tx,
                account_id,
                &delta.currency,
                delta.available,
                delta.pending,
            )
            .await?;
            updated.push(balance);
        }

        Ok(updated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::EventStatus;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn event(
        event_type: EventType,
        source: Option<Uuid>,
        dest: Option<Uuid>,
        amount: Decimal,
    ) -> LedgerEvent {
        LedgerEvent {
            id: Uuid::new_v4(),
            transaction_id: Uuid::new_v4(),
            timestamp: Utc::now(),
            source_account_id: source,
            destination_account_id: dest,
            amount,
            currency: "USD".to_string(),
            event_type,
            status: EventStatus::Settled,
            metadata: serde_json::json!({}),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn debit_and_credit_aggregate_with_opposite_signs() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let events = vec![
            event(EventType::Debit, Some(alice), None, dec!(100)),
            event(EventType::Credit, None, Some(bob), dec!(100)),
        ];

        let deltas = BalanceProjector::aggregate(&events);
        assert_eq!(deltas[&alice].available, dec!(-100));
        assert_eq!(deltas[&bob].available, dec!(100));
        assert_eq!(deltas[&alice].pending, Decimal::ZERO);
        assert_eq!(deltas[&bob].pending, Decimal::ZERO);
    }

    #[test]
    fn paired_events_conserve_value() {
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();
        let carol = Uuid::new_v4();
        let events = vec![
            event(EventType::Debit, Some(alice), None, dec!(40)),
            event(EventType::Credit, None, Some(bob), dec!(40)),
            event(EventType::Debit, Some(bob), None, dec!(15)),
            event(EventType::Credit, None, Some(carol), dec!(15)),
        ];

        let deltas = BalanceProjector::aggregate(&events);
        let net: Decimal = deltas.values().map(|d| d.available).sum();
        assert_eq!(net, Decimal::ZERO);
        assert_eq!(deltas[&bob].available, dec!(25));
    }

    #[test]
    fn multiple_events_same_account_collapse_to_one_delta() {
        let alice = Uuid::new_v4();
        let events = vec![
            event(EventType::Credit, None, Some(alice), dec!(100)),
            event(EventType::Debit, Some(alice), None, dec!(30)),
        ];

        let deltas = BalanceProjector::aggregate(&events);
        assert_eq!(deltas.len(), 1);
        assert_eq!(deltas[&alice].available, dec!(70));
    }

    #[test]
    fn events_without_active_account_are_skipped() {
        let events = vec![event(EventType::Debit, None, None, dec!(5))];
        assert!(BalanceProjector::aggregate(&events).is_empty());
    }
}
