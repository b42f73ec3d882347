// JSON:API routes for one resource type, dispatching to a ModelHandler

use axum::{
    extract::{rejection::JsonRejection, Path, RawQuery, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::ApiError;

use super::filters::filters_from_query;
use super::handler::ModelHandler;
use super::paging::generate_paging_meta;
use super::query::{QueryString, QueryValue};
use super::rendering::{
    render_document, render_item_result, render_list_results, render_relationship_identifiers,
    render_relationship_result,
};
use super::types::{
    DataPayload, Document, Fields, NewResource, PagingMeta, PagingParams, Params,
    RelationshipData, RelationshipDetails, Resource, ResourceIdentifier, DEFAULT_PAGE_LIMIT,
};

/// Query handling knobs shared by every model router
#[derive(Debug, Clone)]
pub struct RouterOptions {
    pub default_page_limit: i64,
    pub max_page_limit: i64,
    /// Query parameters never echoed into paging links
    pub stripped_query_params: Vec<String>,
}

impl Default for RouterOptions {
    fn default() -> Self {
        Self {
            default_page_limit: DEFAULT_PAGE_LIMIT,
            max_page_limit: 1000,
            stripped_query_params: vec!["token".to_string()],
        }
    }
}

impl From<&AppConfig> for RouterOptions {
    fn from(config: &AppConfig) -> Self {
        Self {
            default_page_limit: config.api.default_page_limit,
            max_page_limit: config.api.max_page_limit,
            stripped_query_params: config.security.stripped_query_params.clone(),
        }
    }
}

#[derive(Clone)]
pub struct ModelRouterState {
    resource_type: Arc<str>,
    base: Arc<str>,
    handler: Arc<dyn ModelHandler>,
    options: Arc<RouterOptions>,
}

impl ModelRouterState {
    /// Normalize the request query into handler params.
    fn params(&self, query: &QueryString) -> Result<Params, ApiError> {
        let mut limit = query
            .nested_integer("page", "limit")?
            .unwrap_or(self.options.default_page_limit);
        // Negative offsets start from the first item
        let offset = query.nested_integer("page", "offset")?.unwrap_or(0).max(0);

        if limit > self.options.max_page_limit {
            tracing::warn!(
                "Page limit {} exceeds maximum {}, using maximum",
                limit,
                self.options.max_page_limit
            );
            limit = self.options.max_page_limit;
        }

        let fields: Fields = query
            .get("fields")
            .and_then(QueryValue::as_map)
            .map(|map| {
                map.iter()
                    .map(|(resource_type, names)| (resource_type.clone(), names.split_csv()))
                    .collect()
            })
            .unwrap_or_default();

        Ok(Params {
            page: PagingParams::new(limit, offset),
            include: csv(query, "include"),
            filters: filters_from_query(query.get("filter")),
            sort: csv(query, "sort"),
            fields,
        })
    }

    fn paging_meta(&self, total: usize, base: &str, query: &QueryString, page: &PagingParams) -> PagingMeta {
        let mut cleaned = query.entity_encoded();
        for param in &self.options.stripped_query_params {
            cleaned.remove(param);
        }
        generate_paging_meta(total, base, &cleaned, page)
    }

    fn related_base(&self, id: &str, relationship: &str) -> String {
        format!("{}/{}/{}", self.base, id, relationship)
    }

    fn relationships_base(&self, id: &str, relationship: &str) -> String {
        format!("{}/{}/relationships/{}", self.base, id, relationship)
    }
}

fn csv(query: &QueryString, name: &str) -> Vec<String> {
    query.get(name).map(QueryValue::split_csv).unwrap_or_default()
}

/// Mount list/get/create/update/delete and relationship routes at `{prefix}/{type}`.
pub fn create_model_router(
    resource_type: &str,
    handler: Arc<dyn ModelHandler>,
    prefix: &str,
) -> Router {
    create_model_router_with_options(resource_type, handler, prefix, RouterOptions::default())
}

pub fn create_model_router_with_options(
    resource_type: &str,
    handler: Arc<dyn ModelHandler>,
    prefix: &str,
    options: RouterOptions,
) -> Router {
    let base = format!("{}/{}", prefix.trim_end_matches('/'), resource_type);
    let state = ModelRouterState {
        resource_type: Arc::from(resource_type),
        base: Arc::from(base.as_str()),
        handler,
        options: Arc::new(options),
    };

    Router::new()
        .route(&base, get(list).post(create))
        .route(&format!("{}/:id", base), get(get_one).patch(update).delete(destroy))
        .route(&format!("{}/:id/:relationship", base), get(related))
        .route(
            &format!("{}/:id/relationships/:relationship", base),
            get(relationships)
                .post(add_relationships)
                .patch(update_relationships)
                .delete(destroy_relationships),
        )
        .with_state(state)
}

async fn list(
    State(state): State<ModelRouterState>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Document>, ApiError> {
    let query = QueryString::parse(raw.as_deref());
    let params = state.params(&query)?;
    tracing::debug!("GET {} with {:?}", state.base, params);

    let details = state.handler.list(&state.resource_type, &params).await?;
    let paging = state.paging_meta(details.total_items, &state.base, &query, &params.page);

    Ok(Json(render_document(
        render_list_results(details, None).with_paging(paging),
    )))
}

async fn get_one(
    State(state): State<ModelRouterState>,
    Path(id): Path<String>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Document>, ApiError> {
    let query = QueryString::parse(raw.as_deref());
    let params = state.params(&query)?;
    tracing::debug!("GET {}/{}", state.base, id);

    let details = state.handler.get(&state.resource_type, &id, &params).await?;
    Ok(Json(render_document(render_item_result(details))))
}

async fn related(
    State(state): State<ModelRouterState>,
    Path((id, relationship)): Path<(String, String)>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Document>, ApiError> {
    let query = QueryString::parse(raw.as_deref());
    let params = state.params(&query)?;
    tracing::debug!("GET {}/{}/{}", state.base, id, relationship);

    let details = state
        .handler
        .list_relationships(&state.resource_type, &id, &relationship, &params)
        .await?;

    let paging = match &details {
        RelationshipDetails::List(list) => Some(state.paging_meta(
            list.total_items,
            &state.related_base(&id, &relationship),
            &query,
            &params.page,
        )),
        RelationshipDetails::Item(_) => None,
    };

    let mut response = render_relationship_result(details);
    if let Some(paging) = paging {
        response = response.with_paging(paging);
    }
    Ok(Json(render_document(response)))
}

async fn relationships(
    State(state): State<ModelRouterState>,
    Path((id, relationship)): Path<(String, String)>,
    RawQuery(raw): RawQuery,
) -> Result<Json<Document>, ApiError> {
    let query = QueryString::parse(raw.as_deref());
    let params = state.params(&query)?;
    tracing::debug!("GET {}/{}/relationships/{}", state.base, id, relationship);

    let details = state
        .handler
        .list_relationships(&state.resource_type, &id, &relationship, &params)
        .await?;

    let paging = match &details {
        RelationshipDetails::List(list) => Some(state.paging_meta(
            list.total_items,
            &state.relationships_base(&id, &relationship),
            &query,
            &params.page,
        )),
        RelationshipDetails::Item(_) => None,
    };

    let mut response = render_relationship_identifiers(details);
    if let Some(paging) = paging {
        response = response.with_paging(paging);
    }
    Ok(Json(render_document(response)))
}

async fn create(
    State(state): State<ModelRouterState>,
    payload: Result<Json<DataPayload<NewResource>>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(payload) = payload?;
    tracing::debug!("POST {}", state.base);

    let details = state.handler.create(&state.resource_type, payload.data).await?;
    Ok((StatusCode::CREATED, Json(render_document(render_item_result(details)))))
}

async fn add_relationships(
    State(state): State<ModelRouterState>,
    Path((id, relationship)): Path<(String, String)>,
    payload: Result<Json<DataPayload<Vec<ResourceIdentifier>>>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(payload) = payload?;
    tracing::debug!("POST {}/{}/relationships/{}", state.base, id, relationship);

    state
        .handler
        .add_relationships(&state.resource_type, &id, &relationship, payload.data)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn update(
    State(state): State<ModelRouterState>,
    Path(id): Path<String>,
    payload: Result<Json<DataPayload<Resource>>, JsonRejection>,
) -> Result<Json<Document>, ApiError> {
    let Json(payload) = payload?;
    tracing::debug!("PATCH {}/{}", state.base, id);

    let details = state
        .handler
        .update(&state.resource_type, &id, payload.data)
        .await?;
    Ok(Json(render_document(render_item_result(details))))
}

async fn update_relationships(
    State(state): State<ModelRouterState>,
    Path((id, relationship)): Path<(String, String)>,
    payload: Result<Json<DataPayload<RelationshipData>>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(payload) = payload?;
    tracing::debug!("PATCH {}/{}/relationships/{}", state.base, id, relationship);

    state
        .handler
        .update_relationships(&state.resource_type, &id, &relationship, payload.data)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn destroy(
    State(state): State<ModelRouterState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    tracing::debug!("DELETE {}/{}", state.base, id);

    state.handler.destroy(&state.resource_type, &id).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn destroy_relationships(
    State(state): State<ModelRouterState>,
    Path((id, relationship)): Path<(String, String)>,
    payload: Result<Json<DataPayload<Vec<ResourceIdentifier>>>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(payload) = payload?;
    tracing::debug!("DELETE {}/{}/relationships/{}", state.base, id, relationship);

    state
        .handler
        .destroy_relationships(&state.resource_type, &id, &relationship, payload.data)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
