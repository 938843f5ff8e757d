use std::{fmt, sync::Arc, time::Duration};

use crate::{
    EngineError, ResultEngine,
    item::{DecodeError, Item},
    store::DocumentStore,
};

mod analytics;
mod batch;
mod budgets;
mod list;
mod transactions;
mod users;

pub use list::Page;

/// Defensive cap on any single page, whatever the caller asks for.
pub const DEFAULT_LIST_LIMIT: usize = 1000;
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Retry policy of batch writes: up to `max_retries` resubmissions of the
/// unprocessed remainder, waiting `(attempt + 1) * backoff` before each.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BatchRetry {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl Default for BatchRetry {
    fn default() -> Self {
        Self {
            max_retries: 3,
            backoff: Duration::from_millis(100),
        }
    }
}

/// The repository. Stateless apart from its store handle, so one instance can
/// serve concurrent callers.
pub struct Engine {
    store: Arc<dyn DocumentStore>,
    list_limit: usize,
    default_page_size: usize,
    batch_retry: BatchRetry,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("list_limit", &self.list_limit)
            .field("default_page_size", &self.default_page_size)
            .field("batch_retry", &self.batch_retry)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Return a builder for `Engine`. Help to build the struct.
    pub fn builder() -> EngineBuilder {
        EngineBuilder::default()
    }

    /// Resolve a requested page size: 0 means the default, anything else is
    /// capped at the list limit.
    fn page_size(&self, requested: usize) -> usize {
        let size = if requested == 0 {
            self.default_page_size
        } else {
            requested
        };
        size.min(self.list_limit).max(1)
    }
}

fn require(value: &str, label: &str) -> ResultEngine<()> {
    if value.trim().is_empty() {
        return Err(EngineError::Validation(format!("{label} is required")));
    }
    Ok(())
}

/// Decode every item, logging and skipping the ones that fail.
fn decode_all<T>(items: Vec<Item>, decode: impl Fn(&Item) -> Result<T, DecodeError>) -> Vec<T> {
    items
        .iter()
        .filter_map(|item| match decode(item) {
            Ok(value) => Some(value),
            Err(err) => {
                tracing::warn!(
                    pk = item.get(crate::keys::PK).and_then(|v| v.as_str()),
                    sk = item.get(crate::keys::SK).and_then(|v| v.as_str()),
                    "skipping undecodable item: {err}"
                );
                None
            }
        })
        .collect()
}

/// The builder for `Engine`
#[derive(Default)]
pub struct EngineBuilder {
    store: Option<Arc<dyn DocumentStore>>,
    list_limit: Option<usize>,
    default_page_size: Option<usize>,
    batch_retry: BatchRetry,
}

impl EngineBuilder {
    /// Pass the required store
    pub fn store(mut self, store: Arc<dyn DocumentStore>) -> EngineBuilder {
        self.store = Some(store);
        self
    }

    pub fn list_limit(mut self, limit: usize) -> EngineBuilder {
        self.list_limit = Some(limit);
        self
    }

    pub fn default_page_size(mut self, size: usize) -> EngineBuilder {
        self.default_page_size = Some(size);
        self
    }

    pub fn batch_retry(mut self, retry: BatchRetry) -> EngineBuilder {
        self.batch_retry = retry;
        self
    }

    /// Construct `Engine`
    pub fn build(self) -> ResultEngine<Engine> {
        let store = self
            .store
            .ok_or_else(|| EngineError::Validation("a document store is required".to_string()))?;
        let list_limit = self.list_limit.unwrap_or(DEFAULT_LIST_LIMIT);
        if list_limit == 0 {
            return Err(EngineError::Validation(
                "list limit must be at least 1".to_string(),
            ));
        }
        let default_page_size = self
            .default_page_size
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, list_limit);
        Ok(Engine {
            store,
            list_limit,
            default_page_size,
            batch_retry: self.batch_retry,
        })
    }
}
