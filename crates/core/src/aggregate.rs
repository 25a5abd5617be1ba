use crate::{Address, StakeMap};

/// Accumulates the partial stake maps of several sources into one view per
/// account.
///
/// Contributions to the same attribute are summed; attributes a source
/// doesn't populate are left untouched. Neither the order of the sources nor
/// the iteration order of their maps affects the result.
#[derive(Debug, Default)]
pub struct Aggregator {
    accounts: StakeMap,
}

impl Aggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn absorb(&mut self, source: StakeMap) {
        if self.accounts.is_empty() {
            self.accounts = source;
            return;
        }

        for (address, attributes) in source {
            match self.accounts.get_mut(&address) {
                Some(current) => current.absorb(attributes),
                None => {
                    self.accounts.insert(address, attributes);
                }
            }
        }
    }

    pub fn len(&self) -> usize {
        self.accounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.accounts.is_empty()
    }

    pub fn finish(self) -> StakeMap {
        self.accounts
    }
}

pub fn aggregate(sources: impl IntoIterator<Item = StakeMap>) -> StakeMap {
    let mut aggregator = Aggregator::new();

    for source in sources {
        aggregator.absorb(source);
    }

    aggregator.finish()
}

/// The accounts of `accounts`, sorted so batches are reproducible.
pub fn addresses(accounts: &StakeMap) -> Vec<Address> {
    let mut out: Vec<_> = accounts.keys().cloned().collect();
    out.sort_unstable();
    out
}
