//! Turn handler results into JSON:API documents.
//!
//! Renderers are pure: they produce a [`RendererResponse`] (primary data plus
//! top-level extras) and [`render_document`] wraps it with the `jsonapi`
//! version member. Paging metadata is merged in by the router.

use super::types::{
    Document, DocumentExtras, ErrorObject, ItemDetails, JsonApiVersion, ListDetails, Meta,
    PagingMeta, PrimaryData, RelationshipDetails, Resource,
};

#[derive(Debug, Clone, PartialEq)]
pub struct RendererResponse {
    pub data: PrimaryData,
    pub extra: DocumentExtras,
}

impl RendererResponse {
    /// Attach `meta.page`, keeping any other meta members.
    pub fn with_paging(mut self, paging: PagingMeta) -> Self {
        self.extra.meta.get_or_insert_with(Meta::default).page = Some(paging);
        self
    }
}

pub fn render_item_result(details: ItemDetails) -> RendererResponse {
    RendererResponse {
        data: PrimaryData::One(details.item),
        extra: DocumentExtras {
            included: details.includes,
            ..Default::default()
        },
    }
}

pub fn render_list_results(details: ListDetails, additional_meta: Option<Meta>) -> RendererResponse {
    RendererResponse {
        data: PrimaryData::Many(details.page_items),
        extra: DocumentExtras {
            included: details.includes,
            meta: additional_meta.filter(|meta| !meta.is_empty()),
            ..Default::default()
        },
    }
}

pub fn render_relationship_result(details: RelationshipDetails) -> RendererResponse {
    match details {
        RelationshipDetails::Item(item) => render_item_result(item),
        RelationshipDetails::List(list) => render_list_results(list, None),
    }
}

pub fn render_list_results_as_identifiers(details: ListDetails) -> RendererResponse {
    render_list_results(
        ListDetails {
            page_items: details
                .page_items
                .iter()
                .map(Resource::to_identifier_resource)
                .collect(),
            ..details
        },
        None,
    )
}

/// Linkage for `/relationships/` routes: identifiers only, a to-one as a bare identifier.
pub fn render_relationship_identifiers(details: RelationshipDetails) -> RendererResponse {
    match details {
        RelationshipDetails::Item(item) => render_item_result(ItemDetails {
            item: item.item.as_ref().map(Resource::to_identifier_resource),
            includes: item.includes,
        }),
        RelationshipDetails::List(list) => render_list_results_as_identifiers(list),
    }
}

pub fn render_document(response: RendererResponse) -> Document {
    Document {
        jsonapi: JsonApiVersion::default(),
        data: Some(response.data),
        extra: response.extra,
    }
}

/// Errors-only document, no primary data.
pub fn render_errors(status: u16, title: impl Into<String>) -> Document {
    Document {
        jsonapi: JsonApiVersion::default(),
        data: None,
        extra: DocumentExtras {
            errors: Some(vec![ErrorObject {
                status: status.to_string(),
                title: title.into(),
            }]),
            ..Default::default()
        },
    }
}
