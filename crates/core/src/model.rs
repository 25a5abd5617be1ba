use std::{
    collections::{BTreeMap, HashMap},
    fmt::Display,
};

use serde::{ser::SerializeMap, Serialize, Serializer};
use serde_json::value::RawValue;

use crate::Balance;

/// Canonical encoded form of an account public key.
pub type Address = String;

/// Stake attributes contributed by the sources, keyed by account.
pub type StakeMap = HashMap<Address, StakeAttributes>;

/// Non-stake fields of a stored account document, kept as raw JSON so they
/// are written back exactly as they were read.
pub type PersistedFields = BTreeMap<String, Box<RawValue>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StakeField {
    DelegationLegacyWaiting,
    DelegationLegacyActive,
    ValidatorsActive,
    ValidatorsTopUp,
    Delegation,
    LkMexStake,
    TotalStake,
    TotalBalanceWithStake,
}

impl StakeField {
    pub const ALL: [StakeField; 8] = [
        StakeField::DelegationLegacyWaiting,
        StakeField::DelegationLegacyActive,
        StakeField::ValidatorsActive,
        StakeField::ValidatorsTopUp,
        StakeField::Delegation,
        StakeField::LkMexStake,
        StakeField::TotalStake,
        StakeField::TotalBalanceWithStake,
    ];

    /// Fields populated directly by a stake source, as opposed to totals.
    pub const SOURCED: [StakeField; 6] = [
        StakeField::DelegationLegacyWaiting,
        StakeField::DelegationLegacyActive,
        StakeField::ValidatorsActive,
        StakeField::ValidatorsTopUp,
        StakeField::Delegation,
        StakeField::LkMexStake,
    ];

    /// Document key of the exact decimal value.
    pub const fn key(self) -> &'static str {
        match self {
            StakeField::DelegationLegacyWaiting => "delegationLegacyWaiting",
            StakeField::DelegationLegacyActive => "delegationLegacyActive",
            StakeField::ValidatorsActive => "validatorsActive",
            StakeField::ValidatorsTopUp => "validatorsTopUp",
            StakeField::Delegation => "delegation",
            StakeField::LkMexStake => "lkMexStake",
            StakeField::TotalStake => "totalStake",
            StakeField::TotalBalanceWithStake => "totalBalanceWithStake",
        }
    }

    /// Document key of the floating point approximation.
    pub const fn num_key(self) -> &'static str {
        match self {
            StakeField::DelegationLegacyWaiting => "delegationLegacyWaitingNum",
            StakeField::DelegationLegacyActive => "delegationLegacyActiveNum",
            StakeField::ValidatorsActive => "validatorsActiveNum",
            StakeField::ValidatorsTopUp => "validatorsTopUpNum",
            StakeField::Delegation => "delegationNum",
            StakeField::LkMexStake => "lkMexStakeNum",
            StakeField::TotalStake => "totalStakeNum",
            StakeField::TotalBalanceWithStake => "totalBalanceWithStakeNum",
        }
    }

    /// True if `key` is one of the document keys owned by the stake block.
    pub fn owns_key(key: &str) -> bool {
        Self::ALL
            .iter()
            .any(|field| field.key() == key || field.num_key() == key)
    }
}

impl Display for StakeField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.key())
    }
}

/// Sparse set of stake attributes for one account.
///
/// An absent field means no source contributed to it, which is not the same
/// as a contribution of zero.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StakeAttributes {
    fields: BTreeMap<StakeField, Balance>,
}

impl StakeAttributes {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, field: StakeField, value: Balance) -> Self {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: StakeField) -> Option<&Balance> {
        self.fields.get(&field)
    }

    pub fn set(&mut self, field: StakeField, value: Balance) {
        self.fields.insert(field, value);
    }

    pub fn remove(&mut self, field: StakeField) -> Option<Balance> {
        self.fields.remove(&field)
    }

    /// Sums `value` into the field, inserting it if absent.
    pub fn add(&mut self, field: StakeField, value: Balance) {
        match self.fields.get_mut(&field) {
            Some(current) => *current = &*current + &value,
            None => {
                self.fields.insert(field, value);
            }
        }
    }

    /// Sums every field present in `other`; fields `other` lacks stay as they are.
    pub fn absorb(&mut self, other: StakeAttributes) {
        for (field, value) in other.fields {
            self.add(field, value);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = (StakeField, &Balance)> {
        self.fields.iter().map(|(k, v)| (*k, v))
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Sum of the source-populated fields, `None` if there are none.
    pub fn sourced_total(&self) -> Option<Balance> {
        StakeField::SOURCED
            .iter()
            .filter_map(|field| self.get(*field))
            .fold(None, |acc: Option<Balance>, value| match acc {
                Some(acc) => Some(&acc + value),
                None => Some(value.clone()),
            })
    }
}

impl FromIterator<(StakeField, Balance)> for StakeAttributes {
    fn from_iter<T: IntoIterator<Item = (StakeField, Balance)>>(iter: T) -> Self {
        let mut out = StakeAttributes::new();

        for (field, value) in iter {
            out.add(field, value);
        }

        out
    }
}

impl Serialize for StakeAttributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.fields.len() * 2))?;

        for (field, value) in self.iter() {
            map.serialize_entry(field.key(), &value.exact())?;
            map.serialize_entry(field.num_key(), &value.approx())?;
        }

        map.end()
    }
}

/// The document written for one account.
#[derive(Debug, Clone, Default)]
pub struct AccountRecord {
    pub fields: PersistedFields,
    pub stake: StakeAttributes,
}

impl AccountRecord {
    pub fn new(fields: PersistedFields, stake: StakeAttributes) -> Self {
        Self { fields, stake }
    }
}

impl Serialize for AccountRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let kept = self
            .fields
            .iter()
            .filter(|(key, _)| !StakeField::owns_key(key));

        let mut map = serializer.serialize_map(None)?;

        for (key, value) in kept {
            map.serialize_entry(key, value)?;
        }

        for (field, value) in self.stake.iter() {
            map.serialize_entry(field.key(), &value.exact())?;
            map.serialize_entry(field.num_key(), &value.approx())?;
        }

        map.end()
    }
}
