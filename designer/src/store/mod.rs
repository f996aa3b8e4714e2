pub mod environments;
pub mod saved_queries;

pub use environments::{EnvironmentStore, InMemoryEnvironmentStore};
pub use saved_queries::{InMemorySavedQueryRepository, SavedQueryRepository, SavedQueryStore};
