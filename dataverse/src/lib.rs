//! Dataverse Web API access: credentials, the OData HTTP client and the
//! metadata endpoints the query designer builds on.

pub mod annotations;
pub mod auth;
pub mod client;
pub mod metadata;
pub mod models;

pub use auth::{ClientCredentialsProvider, TokenProvider};
pub use client::{DataverseApi, DataverseClient, build_http_client};
pub use metadata::{EntityAttributes, MetadataGateway};
pub use models::{
    AccessToken, AttributeMetadata, EntityMetadata, Environment, OptionValue,
    RelationshipMetadata, RelationshipType,
};
