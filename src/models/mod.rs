pub mod account;
pub mod balance;
pub mod event;
pub mod recon;

pub use account::{Account, AccountType};
pub use balance::Balance;
pub use event::{EventStatus, EventType, LedgerEvent, TransferRequest};
pub use recon::{
    ExternalTxn, LedgerTxn, MatchResult, ReconJob, ReconLogEntry, ReconStatus, ReconSummary,
};
