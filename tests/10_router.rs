mod common;

use anyhow::Result;
use axum::http::{Method, StatusCode};
use serde_json::{json, Value};

use common::{get, router, send};

fn ids(body: &Value) -> Vec<String> {
    body["data"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item["id"].as_str().map(String::from))
                .collect()
        })
        .unwrap_or_default()
}

#[tokio::test]
async fn list_uses_default_paging() -> Result<()> {
    let router = router();
    let reply = get(&router, "/rest/comments").await?;
    assert_eq!(reply.status, StatusCode::OK);

    let body = reply.json();
    assert_eq!(body["jsonapi"], json!({ "version": "1.0" }));
    assert_eq!(ids(&body), vec!["1", "2", "3", "4", "5"]);
    assert_eq!(body["included"], json!([]));
    assert_eq!(
        body["meta"]["page"],
        json!({
            "offset": 0,
            "limit": 5,
            "total": 12,
            "links": {
                "first": "/rest/comments?page[offset]=0",
                "last": "/rest/comments?page[offset]=10",
                "prev": null,
                "next": "/rest/comments?page[offset]=5"
            }
        })
    );
    Ok(())
}

#[tokio::test]
async fn middle_page_links_echo_the_query() -> Result<()> {
    let router = router();
    let body = get(&router, "/rest/comments?page%5Blimit%5D=5&page%5Boffset%5D=5")
        .await?
        .json();

    assert_eq!(ids(&body), vec!["6", "7", "8", "9", "10"]);
    let links = &body["meta"]["page"]["links"];
    assert_eq!(links["first"], "/rest/comments?page[limit]=5&page[offset]=0");
    assert_eq!(links["last"], "/rest/comments?page[limit]=5&page[offset]=10");
    assert_eq!(links["prev"], "/rest/comments?page[limit]=5&page[offset]=0");
    assert_eq!(links["next"], "/rest/comments?page[limit]=5&page[offset]=10");
    Ok(())
}

#[tokio::test]
async fn filter_and_sort_apply_before_paging() -> Result<()> {
    let router = router();
    let body = get(&router, "/rest/comments?filter%5Bstatus%5D=moderated&sort=-id")
        .await?
        .json();

    assert_eq!(ids(&body), vec!["12", "9", "6", "3"]);
    assert_eq!(body["meta"]["page"]["total"], 4);
    assert_eq!(
        body["meta"]["page"]["links"]["first"],
        "/rest/comments?filter[status]=moderated&sort=-id&page[offset]=0"
    );
    assert_eq!(body["meta"]["page"]["links"]["next"], Value::Null);
    Ok(())
}

#[tokio::test]
async fn null_filters_match_missing_relationships() -> Result<()> {
    let router = router();
    let body = get(&router, "/rest/comments?filter%5Bauthor%5D=null&page%5Blimit%5D=-1")
        .await?
        .json();

    assert_eq!(body["meta"]["page"]["total"], 11);
    assert_eq!(ids(&body).len(), 11);
    assert_eq!(body["meta"]["page"]["links"]["first"], body["meta"]["page"]["links"]["last"]);
    assert_eq!(body["meta"]["page"]["links"]["next"], Value::Null);
    Ok(())
}

#[tokio::test]
async fn zero_limit_returns_no_items_or_links() -> Result<()> {
    let router = router();
    let body = get(&router, "/rest/comments?page%5Blimit%5D=0").await?.json();

    assert_eq!(body["data"], json!([]));
    assert_eq!(body["meta"]["page"]["total"], 12);
    assert_eq!(
        body["meta"]["page"]["links"],
        json!({ "first": null, "last": null, "prev": null, "next": null })
    );
    Ok(())
}

#[tokio::test]
async fn paging_links_drop_token_and_encode_values() -> Result<()> {
    let router = router();
    let body = get(&router, "/rest/comments?token=secret&filter%5Btext%5D=%3Cb%3E")
        .await?
        .json();

    assert_eq!(body["meta"]["page"]["total"], 0);
    assert_eq!(
        body["meta"]["page"]["links"]["first"],
        "/rest/comments?filter[text]=&#x3C;b&#x3E;&page[offset]=0"
    );
    Ok(())
}

#[tokio::test]
async fn invalid_paging_is_a_bad_request() -> Result<()> {
    let router = router();
    let reply = get(&router, "/rest/comments?page%5Blimit%5D=many").await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["errors"][0]["status"], "400");
    Ok(())
}

#[tokio::test]
async fn get_renders_attributes_and_relationships() -> Result<()> {
    let router = router();
    let reply = get(&router, "/rest/articles/1").await?;
    assert_eq!(reply.status, StatusCode::OK);

    let data = &reply.json()["data"];
    assert_eq!(data["id"], "1");
    assert_eq!(data["type"], "articles");
    assert_eq!(data["attributes"], json!({ "title": "Article 1", "categoryId": "7" }));
    assert_eq!(data["links"]["self"], "/rest/articles/1");
    assert_eq!(data["relationships"]["comments"]["data"].as_array().map(Vec::len), Some(10));
    assert_eq!(
        data["relationships"]["comments"]["links"],
        json!({
            "self": "/rest/articles/1/relationships/comments",
            "related": "/rest/articles/1/comments"
        })
    );
    assert_eq!(data["relationships"]["commentCount"]["meta"], json!({ "total": 10 }));
    assert!(data["relationships"]["commentCount"].get("data").is_none());
    assert!(reply.json().get("meta").is_none());
    Ok(())
}

#[tokio::test]
async fn missing_records_are_plain_404s() -> Result<()> {
    let router = router();
    for uri in [
        "/rest/articles/99",
        "/rest/articles/99/comments",
        "/rest/articles/1/authors",
        "/rest/articles/1/relationships/authors",
    ] {
        let reply = get(&router, uri).await?;
        assert_eq!(reply.status, StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(reply.text, "", "{}", uri);
    }

    let reply = send(&router, Method::DELETE, "/rest/articles/99", None).await?;
    assert_eq!(reply.status, StatusCode::NOT_FOUND);
    Ok(())
}

#[tokio::test]
async fn includes_resolve_related_resources() -> Result<()> {
    let router = router();
    let body = get(&router, "/rest/comments/1?include=article,author").await?.json();

    let included: Vec<(String, String)> = body["included"]
        .as_array()
        .map(|items| {
            items
                .iter()
                .map(|r| (r["type"].as_str().unwrap_or_default().to_string(), r["id"].as_str().unwrap_or_default().to_string()))
                .collect()
        })
        .unwrap_or_default();
    assert_eq!(
        included,
        vec![("articles".to_string(), "1".to_string()), ("users".to_string(), "1".to_string())]
    );
    Ok(())
}

#[tokio::test]
async fn related_route_pages_full_resources() -> Result<()> {
    let router = router();
    let body = get(&router, "/rest/articles/1/comments?page%5Blimit%5D=3&sort=-id")
        .await?
        .json();

    assert_eq!(ids(&body), vec!["10", "9", "8"]);
    assert_eq!(body["data"][0]["attributes"]["text"], "Comment 10");
    assert_eq!(body["meta"]["page"]["total"], 10);
    assert_eq!(
        body["meta"]["page"]["links"]["last"],
        "/rest/articles/1/comments?page[limit]=3&page[offset]=9&sort=-id"
    );
    Ok(())
}

#[tokio::test]
async fn relationships_route_renders_identifiers() -> Result<()> {
    let router = router();
    let body = get(&router, "/rest/articles/2/relationships/comments").await?.json();
    assert_eq!(
        body["data"],
        json!([{ "id": "11", "type": "comments" }, { "id": "12", "type": "comments" }])
    );
    assert_eq!(
        body["meta"]["page"]["links"]["first"],
        "/rest/articles/2/relationships/comments?page[offset]=0"
    );

    let body = get(&router, "/rest/comments/2/relationships/article").await?.json();
    assert_eq!(body["data"], json!({ "id": "1", "type": "articles" }));
    assert!(body.get("meta").is_none());

    let body = get(&router, "/rest/comments/2/author").await?.json();
    assert_eq!(body["data"], Value::Null);
    Ok(())
}

#[tokio::test]
async fn create_returns_201_and_is_fetchable() -> Result<()> {
    let router = router();
    let reply = send(
        &router,
        Method::POST,
        "/rest/users",
        Some(json!({ "data": { "type": "users", "attributes": { "name": "Zed" } } })),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::CREATED);

    let body = reply.json();
    let id = body["data"]["id"].as_str().unwrap_or_default().to_string();
    assert!(id.starts_with("created-"), "unexpected id {}", id);
    assert!(body.get("included").is_none());

    let fetched = get(&router, &format!("/rest/users/{}", id)).await?.json();
    assert_eq!(fetched["data"]["attributes"]["name"], "Zed");

    let reply = send(
        &router,
        Method::POST,
        "/rest/users",
        Some(json!({ "data": { "type": "articles", "attributes": {} } })),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::CONFLICT);
    Ok(())
}

#[tokio::test]
async fn patch_merges_and_keeps_position() -> Result<()> {
    let router = router();
    let reply = send(
        &router,
        Method::PATCH,
        "/rest/articles/1",
        Some(json!({ "data": { "id": "1", "type": "articles", "attributes": { "title": "Renamed" } } })),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::OK);
    assert_eq!(reply.json()["data"]["attributes"]["title"], "Renamed");
    assert_eq!(reply.json()["data"]["attributes"]["categoryId"], "7");

    let body = get(&router, "/rest/articles").await?.json();
    assert_eq!(ids(&body), vec!["1", "2"]);
    assert_eq!(body["data"][0]["attributes"]["title"], "Renamed");
    Ok(())
}

#[tokio::test]
async fn delete_removes_the_record() -> Result<()> {
    let router = router();
    let reply = send(&router, Method::DELETE, "/rest/comments/12", None).await?;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    assert_eq!(get(&router, "/rest/comments/12").await?.status, StatusCode::NOT_FOUND);
    let body = get(&router, "/rest/comments").await?.json();
    assert_eq!(body["meta"]["page"]["total"], 11);
    Ok(())
}

#[tokio::test]
async fn relationship_linkage_can_be_changed() -> Result<()> {
    let router = router();

    let reply = send(
        &router,
        Method::POST,
        "/rest/articles/2/relationships/comments",
        Some(json!({ "data": [{ "id": "1", "type": "comments" }] })),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    let reply = send(
        &router,
        Method::DELETE,
        "/rest/articles/2/relationships/comments",
        Some(json!({ "data": [{ "id": "11", "type": "comments" }] })),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    let body = get(&router, "/rest/articles/2/relationships/comments").await?.json();
    assert_eq!(ids(&body), vec!["12", "1"]);

    let reply = send(
        &router,
        Method::PATCH,
        "/rest/comments/3/relationships/author",
        Some(json!({ "data": { "id": "1", "type": "users" } })),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    let body = get(&router, "/rest/comments/3/author").await?.json();
    assert_eq!(body["data"]["attributes"]["name"], "Alice");
    Ok(())
}

#[tokio::test]
async fn count_relationships_ignore_linkage_changes() -> Result<()> {
    let router = router();
    let reply = send(
        &router,
        Method::POST,
        "/rest/articles/1/relationships/commentCount",
        Some(json!({ "data": [{ "id": "12", "type": "comments" }] })),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::NO_CONTENT);

    let body = get(&router, "/rest/articles/1").await?.json();
    assert_eq!(body["data"]["relationships"]["commentCount"]["meta"]["total"], 10);
    Ok(())
}

#[tokio::test]
async fn sparse_fieldsets_trim_resources() -> Result<()> {
    let router = router();
    let body = get(&router, "/rest/articles/1?fields%5Barticles%5D=title").await?.json();

    assert_eq!(body["data"]["attributes"], json!({ "title": "Article 1" }));
    assert_eq!(body["data"]["relationships"], json!({}));
    Ok(())
}

#[tokio::test]
async fn extreme_offsets_render_without_overflow() -> Result<()> {
    let router = router();
    let reply = get(&router, "/rest/comments?page%5Boffset%5D=9223372036854775807").await?;
    assert_eq!(reply.status, StatusCode::OK);

    let body = reply.json();
    assert_eq!(body["data"], json!([]));
    assert_eq!(body["meta"]["page"]["total"], 12);
    assert_eq!(body["meta"]["page"]["links"]["next"], Value::Null);
    assert_eq!(
        body["meta"]["page"]["links"]["prev"],
        "/rest/comments?page[offset]=9223372036854775802"
    );
    Ok(())
}

#[tokio::test]
async fn negative_offsets_start_at_the_first_page() -> Result<()> {
    let router = router();
    let body = get(&router, "/rest/comments?page%5Boffset%5D=-9223372036854775808")
        .await?
        .json();

    assert_eq!(ids(&body), vec!["1", "2", "3", "4", "5"]);
    assert_eq!(body["meta"]["page"]["offset"], 0);
    assert_eq!(body["meta"]["page"]["links"]["prev"], Value::Null);
    assert_eq!(
        body["meta"]["page"]["links"]["next"],
        "/rest/comments?page[offset]=5"
    );
    Ok(())
}

#[tokio::test]
async fn unreadable_bodies_get_an_errors_document() -> Result<()> {
    let router = router();

    let reply = send(&router, Method::DELETE, "/rest/articles/1/relationships/comments", None).await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["errors"][0]["status"], "400");

    let reply = send(
        &router,
        Method::POST,
        "/rest/users",
        Some(json!({ "data": { "attributes": { "name": "No type" } } })),
    )
    .await?;
    assert_eq!(reply.status, StatusCode::BAD_REQUEST);
    assert_eq!(reply.json()["errors"][0]["status"], "400");

    let body = get(&router, "/rest/articles/1/relationships/comments").await?.json();
    assert_eq!(body["meta"]["page"]["total"], 10);
    Ok(())
}
