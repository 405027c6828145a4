pub mod record;
pub mod record_category;

use async_trait::async_trait;

use self::{record::Record, record_category::RecordCategory};
use crate::{errors::error::StoreResult, store::record_tags::RecordTags};

/// Encrypted record store holding the revocation registry state. Handles are
/// scoped: a [`StoreSession`] is read-only, a [`StoreTransaction`] is the
/// single writer for its lifetime and must be explicitly committed.
#[async_trait]
pub trait BaseStore: std::fmt::Debug + Send + Sync {
    async fn session(&self) -> StoreResult<Box<dyn StoreSession>>;

    async fn transaction(&self) -> StoreResult<Box<dyn StoreTransaction>>;
}

#[async_trait]
pub trait StoreSession: Send {
    /// Fetch a single record. `for_update` requests an exclusive row lock
    /// held until the enclosing transaction resolves; backends whose
    /// transactions are already fully exclusive may treat it as advisory.
    async fn fetch(
        &mut self,
        category: RecordCategory,
        name: &str,
        for_update: bool,
    ) -> StoreResult<Option<Record>>;

    /// Fetch every record of `category` whose tags satisfy `tag_filter`
    /// (equality conjunction), in a stable name order.
    async fn fetch_all(
        &mut self,
        category: RecordCategory,
        tag_filter: Option<&RecordTags>,
        limit: Option<usize>,
        for_update: bool,
    ) -> StoreResult<Vec<Record>>;
}

/// Read-write store handle. Mutations are atomic: they become visible to
/// other handles only on [`StoreTransaction::commit`], and dropping the
/// handle without committing rolls every staged mutation back.
#[async_trait]
pub trait StoreTransaction: StoreSession {
    /// Insert a new record; fails with `DuplicateRecord` if the
    /// (category, name) pair already exists.
    async fn insert(&mut self, record: Record) -> StoreResult<()>;

    /// Overwrite an existing record; fails with `RecordNotFound` if absent.
    async fn replace(&mut self, record: Record) -> StoreResult<()>;

    /// Delete an existing record; fails with `RecordNotFound` if absent.
    async fn remove(&mut self, category: RecordCategory, name: &str) -> StoreResult<()>;

    async fn commit(self: Box<Self>) -> StoreResult<()>;
}
