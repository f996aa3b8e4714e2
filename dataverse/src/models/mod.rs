mod environment;
mod metadata;

pub use environment::{AccessToken, Environment};
pub use metadata::{
    AttributeMetadata, EntityMetadata, OptionValue, RelationshipMetadata, RelationshipType,
};
pub(crate) use metadata::{
    ODataCollection, RawAttribute, RawEntity, RawLookupTargets, RawPicklist, RawRelationship,
};
