mod query;
mod result;
mod saved;

pub use query::{
    DEFAULT_PRIMARY_ALIAS, FilterOperator, LogicalOperator, QueryDefinition, QueryField,
    QueryFilter, QueryJoin, QuerySort, SortDirection,
};
pub use result::{QueryColumn, QueryResult, Row};
pub use saved::{NewSavedQuery, SavedQuery, SavedQueryUpdate, parse_definition};
