pub mod account_service;
pub mod balance_projector;
pub mod command_validator;
pub mod event_appender;
pub mod ledger_service;

pub use account_service::AccountService;
pub use balance_projector::BalanceProjector;
pub use command_validator::CommandValidator;
pub use event_appender::EventAppender;
pub use ledger_service::{LedgerConfig, LedgerService, TransferOutcome};
