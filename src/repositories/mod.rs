pub mod account_repository;
pub mod balance_repository;
pub mod event_repository;

pub use account_repository::AccountRepository;
pub use balance_repository::BalanceRepository;
pub use event_repository::EventRepository;

use sqlx::PgPool;

/// Database connection pool type alias.
pub type DbPool = PgPool;
