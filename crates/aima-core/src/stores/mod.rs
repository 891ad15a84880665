//! Store implementations for every domain.
//!
//! - [`memory`]: `tokio::sync::RwLock`-guarded vectors, insertion ordered
//! - [`file`]: JSON file of models, rewritten atomically on each mutation
//! - [`sqlite`]: WAL-mode SQLite tables for models, recipes and services

mod file;
mod memory;
mod sqlite;

pub use file::FileModelStore;
pub use memory::{MemoryModelStore, MemoryRecipeStore, MemoryServiceStore};
pub use sqlite::{SqliteDatabase, SqliteModelStore, SqliteRecipeStore, SqliteServiceStore};

/// Apply `offset`/`limit` to an already filtered list.
///
/// Returns the page and the total before pagination. `limit == 0` means
/// unlimited; an offset past the end yields an empty page.
pub(crate) fn paginate<T>(items: Vec<T>, limit: usize, offset: usize) -> (Vec<T>, usize) {
    let total = items.len();
    let page = items
        .into_iter()
        .skip(offset)
        .take(if limit == 0 { usize::MAX } else { limit })
        .collect();
    (page, total)
}
