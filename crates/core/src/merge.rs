use std::collections::HashMap;

use tracing::debug;

use crate::{AccountRecord, Address, Balance, PersistedFields, StakeAttributes, StakeField};

/// Document key of the account's liquid balance.
pub const BALANCE_KEY: &str = "balance";

fn persisted_balance(fields: &PersistedFields) -> Balance {
    let Some(raw) = fields.get(BALANCE_KEY) else {
        return Balance::zero();
    };

    match serde_json::from_str::<String>(raw.get()) {
        Ok(value) => Balance::parse_or_zero(&value),
        Err(_) => Balance::parse_or_zero(raw.get()),
    }
}

/// Fills in the derived totals from the sourced attributes and the account's
/// liquid balance.
pub fn with_totals(mut stake: StakeAttributes, balance: &Balance) -> StakeAttributes {
    stake.remove(StakeField::TotalStake);
    stake.remove(StakeField::TotalBalanceWithStake);

    if let Some(total) = stake.sourced_total() {
        stake.set(StakeField::TotalBalanceWithStake, balance + &total);
        stake.set(StakeField::TotalStake, total);
    }

    stake
}

/// Builds the records to write: one per account with computed stake.
///
/// Non-stake fields come unchanged from the stored document when there is
/// one; the stake block is always the freshly computed one. Stored accounts
/// without any computed stake are not emitted.
pub fn merge(
    mut existing: HashMap<Address, PersistedFields>,
    computed: HashMap<Address, StakeAttributes>,
) -> HashMap<Address, AccountRecord> {
    let mut created = 0usize;

    let records: HashMap<_, _> = computed
        .into_iter()
        .map(|(address, stake)| {
            let mut fields = existing.remove(&address).unwrap_or_else(|| {
                created += 1;
                PersistedFields::new()
            });

            fields.retain(|key, _| !StakeField::owns_key(key));

            let balance = persisted_balance(&fields);
            let stake = with_totals(stake, &balance);

            (address, AccountRecord::new(fields, stake))
        })
        .collect();

    debug!(records = records.len(), created, "merged stake into accounts");

    records
}
