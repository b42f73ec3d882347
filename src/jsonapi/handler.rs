// Model handler contract: the storage side of every JSON:API route

use async_trait::async_trait;
use thiserror::Error;

use super::types::{
    ItemDetails, ListDetails, NewResource, Params, RelationshipData, RelationshipDetails,
    Resource, ResourceIdentifier,
};

/// Errors a model handler may report
#[derive(Error, Debug)]
pub enum HandlerError {
    /// Structured `{error: N, message?}` failure, surfaced with status N
    #[error("handler error {status}{}", message.as_deref().map(|m| format!(": {}", m)).unwrap_or_default())]
    Status {
        status: u16,
        message: Option<String>,
    },

    /// Anything else; rendered as a 500 errors document
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl HandlerError {
    pub fn not_found() -> Self {
        HandlerError::Status {
            status: 404,
            message: None,
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        HandlerError::Status {
            status,
            message: Some(message.into()),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, HandlerError::Status { status: 404, .. })
    }
}

pub type HandlerResult<T> = Result<T, HandlerError>;

/// Storage operations behind one or more resource types.
///
/// Every id-taking operation fails with [`HandlerError::not_found`] when the
/// type, the record or the named relationship does not exist.
#[async_trait]
pub trait ModelHandler: Send + Sync {
    /// Filter, sort and paginate all records of a type
    async fn list(&self, resource_type: &str, params: &Params) -> HandlerResult<ListDetails>;

    /// Records whose string `attribute` contains `value`
    async fn search(
        &self,
        resource_type: &str,
        attribute: &str,
        value: &str,
        params: &Params,
    ) -> HandlerResult<ListDetails>;

    async fn get(&self, resource_type: &str, id: &str, params: &Params) -> HandlerResult<ItemDetails>;

    /// Traverse a relationship: to-many yields a list, to-one an item
    async fn list_relationships(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
        params: &Params,
    ) -> HandlerResult<RelationshipDetails>;

    async fn create(&self, resource_type: &str, data: NewResource) -> HandlerResult<ItemDetails>;

    async fn add_relationships(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
        identifiers: Vec<ResourceIdentifier>,
    ) -> HandlerResult<()>;

    async fn update(&self, resource_type: &str, id: &str, data: Resource) -> HandlerResult<ItemDetails>;

    /// Replace relationship linkage wholesale
    async fn update_relationships(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
        data: RelationshipData,
    ) -> HandlerResult<()>;

    async fn destroy(&self, resource_type: &str, id: &str) -> HandlerResult<()>;

    async fn destroy_relationships(
        &self,
        resource_type: &str,
        id: &str,
        relationship: &str,
        identifiers: Vec<ResourceIdentifier>,
    ) -> HandlerResult<()>;
}
