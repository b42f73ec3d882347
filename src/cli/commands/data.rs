use anyhow::Context;
use axum::body::Body;
use axum::http::Request;
use clap::Args;
use std::sync::Arc;
use tower::ServiceExt;

use crate::cli::utils::encode_query;
use crate::config::config;
use crate::fixtures::Fixtures;
use crate::jsonapi::handler::ModelHandler;

#[derive(Args, Debug)]
pub struct QueryArgs {
    #[arg(help = "Resource type to list, e.g. comments")]
    pub resource_type: String,

    #[arg(long, help = "Filter as field=value (repeatable, nested fields as a.b=value)")]
    pub filter: Vec<String>,

    #[arg(long, allow_hyphen_values = true, help = "Comma-separated sort fields, '-' prefix for descending")]
    pub sort: Option<String>,

    #[arg(long, allow_negative_numbers = true, help = "Page size, negative for everything")]
    pub limit: Option<i64>,

    #[arg(long, help = "Page offset")]
    pub offset: Option<i64>,

    #[arg(long, help = "Comma-separated relationships to include")]
    pub include: Option<String>,

    #[arg(long, help = "Fixture file to query (defaults to FIXTURES_PATH or the demo data)")]
    pub fixtures: Option<String>,
}

impl QueryArgs {
    /// The list request URI these arguments describe
    pub fn uri(&self, prefix: &str) -> anyhow::Result<String> {
        let limit = self.limit.map(|l| l.to_string());
        let offset = self.offset.map(|o| o.to_string());

        let mut pairs: Vec<(String, &str)> = vec![];
        for filter in &self.filter {
            let (field, value) = filter
                .split_once('=')
                .with_context(|| format!("filter '{}' must look like field=value", filter))?;
            let key = field
                .split('.')
                .fold("filter".to_string(), |key, part| format!("{}[{}]", key, part));
            pairs.push((key, value));
        }
        if let Some(sort) = &self.sort {
            pairs.push(("sort".to_string(), sort));
        }
        if let Some(include) = &self.include {
            pairs.push(("include".to_string(), include));
        }
        if let Some(limit) = &limit {
            pairs.push(("page[limit]".to_string(), limit));
        }
        if let Some(offset) = &offset {
            pairs.push(("page[offset]".to_string(), offset));
        }

        let query = encode_query(pairs);
        let path = format!("{}/{}", prefix, self.resource_type);
        Ok(if query.is_empty() {
            path
        } else {
            format!("{}?{}", path, query)
        })
    }
}

/// Send the list request through the same router the server uses and print the body.
pub async fn handle(args: QueryArgs) -> anyhow::Result<()> {
    let config = config();

    let fixtures_path = args.fixtures.clone().or_else(|| config.server.fixtures_path.clone());
    let fixtures = Fixtures::load_or_demo(fixtures_path.as_deref())?;
    let types: Vec<String> = fixtures.types().map(String::from).collect();
    let handler: Arc<dyn ModelHandler> = Arc::new(fixtures.into_handler(&config.api.prefix));
    let app = crate::server::app(config, handler, types);

    let uri = args.uri(&config.api.prefix)?;
    tracing::debug!("Querying {}", uri);

    let response = app
        .oneshot(Request::builder().uri(uri.as_str()).body(Body::empty())?)
        .await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;

    if !status.is_success() {
        anyhow::bail!("{} returned {}: {}", uri, status, String::from_utf8_lossy(&bytes));
    }

    let document: serde_json::Value = serde_json::from_slice(&bytes)?;
    println!("{}", serde_json::to_string_pretty(&document)?);
    Ok(())
}
