//! JSON:API protocol adapter: wire types, serializer, model handler contract,
//! in-memory handler, document rendering and the axum router.

pub mod filters;
pub mod handler;
pub mod mock;
pub mod paging;
pub mod query;
pub mod rendering;
pub mod routing;
pub mod serializer;
pub mod types;

pub use filters::{FilterValue, Filters};
pub use handler::{HandlerError, HandlerResult, ModelHandler};
pub use mock::MockHandler;
pub use rendering::{render_document, render_errors, RendererResponse};
pub use routing::{create_model_router, create_model_router_with_options, RouterOptions};
pub use serializer::Serializer;
pub use types::*;
