// src/models/mod.rs
pub mod key;
pub mod label;
pub mod outcome;

pub use key::{AccountAddress, Key, KeyError, TxHash};
pub use label::{FlowSourceSummary, DEFAULT_FLOW_SOURCE};
pub use outcome::{AddressOutcome, ContractSummary, Outcome, ReceiptSummary, TxOutcome};
