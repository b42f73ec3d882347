use super::query::QueryString;
use super::types::{PageLinks, PagingMeta, PagingParams, DEFAULT_PAGE_LIMIT};

/// Build `meta.page` for a list response.
///
/// `base` is the route path the links point at; `query` is the request query,
/// already entity-encoded and stripped of parameters that must not be echoed.
pub fn generate_paging_meta(
    total: usize,
    base: &str,
    query: &QueryString,
    page: &PagingParams,
) -> PagingMeta {
    let limit = page.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    let offset = page.offset.unwrap_or(0).max(0);

    let link = |offset: i64| format!("{}?{}", base, query.with_page_offset(offset).stringify());

    let links = if limit == 0 {
        PageLinks {
            first: None,
            last: None,
            prev: None,
            next: None,
        }
    } else if limit < 0 {
        PageLinks {
            first: Some(link(0)),
            last: Some(link(0)),
            prev: None,
            next: None,
        }
    } else {
        let last = (total as i64 / limit) * limit;
        let next = offset.checked_add(limit).filter(|next| *next <= last);
        let prev = offset.checked_sub(limit).filter(|prev| *prev >= 0);
        PageLinks {
            first: Some(link(0)),
            last: Some(link(last)),
            prev: prev.map(&link),
            next: next.map(&link),
        }
    };

    PagingMeta {
        offset,
        limit,
        total,
        links,
    }
}
