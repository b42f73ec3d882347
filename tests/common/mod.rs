#![allow(dead_code)]

use std::process::{Child, Command, Stdio};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use axum::body::Body;
use axum::http::{Method, Request, StatusCode as HttpStatus};
use axum::Router;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tower::ServiceExt;

use moderator_jsonapi::jsonapi::{create_model_router, MockHandler, ModelHandler, Record, Serializer};

static SERVER: OnceLock<TestServer> = OnceLock::new();

pub struct TestServer {
    pub port: u16,
    pub base_url: String,
    child: Child,
}

impl TestServer {
    fn spawn() -> Result<Self> {
        // Pick an unused port for isolation
        let port = portpicker::pick_unused_port().context("failed to pick free port")?;
        let base_url = format!("http://127.0.0.1:{}", port);

        // Cargo builds the binary before integration tests run
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_moderator-jsonapi"));
        cmd.args(["serve", "--port", &port.to_string()])
            .env("API_PREFIX", "/rest")
            .env_remove("FIXTURES_PATH")
            .stdin(Stdio::null())
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit());

        let child = cmd.spawn().context("failed to spawn server binary")?;

        Ok(Self { port, base_url, child })
    }

    async fn wait_ready(&self, timeout: Duration) -> Result<()> {
        let client = reqwest::Client::new();
        let deadline = Instant::now() + timeout;
        loop {
            if Instant::now() > deadline {
                break;
            }
            let url = format!("{}/health", self.base_url);
            if let Ok(resp) = client.get(&url).send().await {
                if resp.status() == StatusCode::OK {
                    return Ok(());
                }
            }
            tokio::time::sleep(Duration::from_millis(150)).await;
        }
        anyhow::bail!("server did not become ready on {} within {:?}", self.base_url, timeout)
    }
}

pub async fn ensure_server() -> Result<&'static TestServer> {
    let server = SERVER.get_or_init(|| TestServer::spawn().expect("failed to spawn server binary"));
    server.wait_ready(Duration::from_secs(10)).await?;
    Ok(server)
}

fn records(value: Value) -> Vec<Record> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(|r| r.as_object().cloned()).collect())
        .unwrap_or_default()
}

/// Two articles, twelve comments, one author: enough for paging and include checks.
pub fn mock_handler() -> Arc<dyn ModelHandler> {
    let mut data = indexmap::IndexMap::new();
    data.insert(
        "articles".to_string(),
        records(json!([
            {
                "id": 1,
                "type": "articles",
                "title": "Article 1",
                "categoryId": 7,
                "comments": (1..=10).map(|id| json!({ "id": id, "type": "comments" })).collect::<Vec<_>>(),
                "commentCount": 10
            },
            {
                "id": 2,
                "type": "articles",
                "title": "Article 2",
                "categoryId": 8,
                "comments": [{ "id": 11, "type": "comments" }, { "id": 12, "type": "comments" }],
                "commentCount": 2
            }
        ])),
    );
    data.insert(
        "comments".to_string(),
        records(Value::Array(
            (1..=12)
                .map(|id| {
                    let article = if id <= 10 { 1 } else { 2 };
                    json!({
                        "id": id,
                        "type": "comments",
                        "text": format!("Comment {}", id),
                        "status": if id % 3 == 0 { "moderated" } else { "new" },
                        "articleId": article,
                        "article": { "id": article, "type": "articles" },
                        "author": if id == 1 { json!({ "id": 1, "type": "users" }) } else { Value::Null }
                    })
                })
                .collect(),
        )),
    );
    data.insert(
        "users".to_string(),
        records(json!([{ "id": 1, "type": "users", "name": "Alice" }])),
    );

    let mut serializers = indexmap::IndexMap::new();
    serializers.insert(
        "articles".to_string(),
        Serializer::new("articles", "/rest/articles")
            .with_attributes(["title", "categoryId"])
            .with_relationships(["comments", "commentCount"]),
    );
    serializers.insert(
        "comments".to_string(),
        Serializer::new("comments", "/rest/comments")
            .with_attributes(["text", "status", "articleId"])
            .with_relationships(["article", "author"]),
    );
    serializers.insert(
        "users".to_string(),
        Serializer::new("users", "/rest/users").with_attributes(["name"]),
    );

    Arc::new(MockHandler::new(data, serializers))
}

/// Router with every mock type mounted under `/rest`.
pub fn router() -> Router {
    let handler = mock_handler();
    ["articles", "comments", "users"]
        .into_iter()
        .fold(Router::new(), |router, resource_type| {
            router.merge(create_model_router(resource_type, handler.clone(), "/rest"))
        })
}

pub struct Reply {
    pub status: HttpStatus,
    pub text: String,
}

impl Reply {
    pub fn json(&self) -> Value {
        serde_json::from_str(&self.text).unwrap_or(Value::Null)
    }
}

pub async fn send(router: &Router, method: Method, uri: &str, body: Option<Value>) -> Result<Reply> {
    let mut request = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(body) => {
            request = request.header("content-type", "application/json");
            Body::from(serde_json::to_vec(&body)?)
        }
        None => Body::empty(),
    };

    let response = router.clone().oneshot(request.body(body)?).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    Ok(Reply {
        status,
        text: String::from_utf8_lossy(&bytes).into_owned(),
    })
}

pub async fn get(router: &Router, uri: &str) -> Result<Reply> {
    send(router, Method::GET, uri, None).await
}
