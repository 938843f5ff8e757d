//! Transaction tracking core over a single-table document store.
//!
//! Records of every kind live in one logical table. [`keys`] derives the
//! primary and secondary index keys of each record, the entity modules map
//! records to and from [`Item`]s, [`Engine`] runs the repository operations
//! against a [`store::DocumentStore`], and [`analytics`] folds fetched
//! transactions into summaries.

pub use budgets::Budget;
pub use error::EngineError;
pub use item::{AttributeValue, DecodeError, Item, parse_timestamp};
pub use month::Month;
pub use ops::{BatchRetry, DEFAULT_LIST_LIMIT, DEFAULT_PAGE_SIZE, Engine, EngineBuilder, Page};
pub use transactions::{Transaction, TransactionKind};
pub use users::User;

pub mod analytics;
pub mod keys;
pub mod store;

mod budgets;
mod error;
mod item;
mod month;
mod ops;
mod transactions;
mod users;

pub type ResultEngine<T> = Result<T, EngineError>;
