use crate::models::key::{AccountAddress, Key, TxHash};

/// Per-key enrichment result. Every key handed to the batch scheduler
/// yields exactly one of these, falling back to the zero/undetermined
/// value when the remote call fails.
pub trait Outcome: Sized {
    type Key: Key;

    fn fallback(key: Self::Key) -> Self;

    fn key(&self) -> Self::Key;

    fn is_zero(&self) -> bool;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TxOutcome {
    pub key: TxHash,
    pub gas_used: u128,
    pub gas_price: u128,
}

impl Outcome for TxOutcome {
    type Key = TxHash;

    fn fallback(key: TxHash) -> Self {
        Self {
            key,
            gas_used: 0,
            gas_price: 0,
        }
    }

    fn key(&self) -> TxHash {
        self.key
    }

    // matches the receipt success count: a row with no gas used is a zero row
    fn is_zero(&self) -> bool {
        self.gas_used == 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AddressOutcome {
    pub key: AccountAddress,
    /// `None` when the bytecode lookup failed.
    pub is_contract: Option<bool>,
}

impl Outcome for AddressOutcome {
    type Key = AccountAddress;

    fn fallback(key: AccountAddress) -> Self {
        Self {
            key,
            is_contract: None,
        }
    }

    fn key(&self) -> AccountAddress {
        self.key
    }

    fn is_zero(&self) -> bool {
        self.is_contract.is_none()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiptSummary {
    pub processed: usize,
    pub successful: usize,
    pub zero_valued: usize,
    pub failures: usize,
}

impl ReceiptSummary {
    pub fn from_outcomes(outcomes: &[TxOutcome], failures: usize) -> Self {
        let successful = outcomes.iter().filter(|o| !o.is_zero()).count();
        Self {
            processed: outcomes.len(),
            successful,
            zero_valued: outcomes.len() - successful,
            failures,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContractSummary {
    pub registered: u64,
    pub passes: usize,
    pub processed: usize,
    pub contracts: usize,
    pub eoas: usize,
    pub undetermined: usize,
}

impl ContractSummary {
    pub fn absorb(&mut self, outcomes: &[AddressOutcome]) {
        for outcome in outcomes {
            match outcome.is_contract {
                Some(true) => self.contracts += 1,
                Some(false) => self.eoas += 1,
                None => self.undetermined += 1,
            }
        }
        self.processed += outcomes.len();
    }
}
