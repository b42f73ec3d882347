use clap::Args;
use serde_json::json;
use std::path::PathBuf;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::config;
use crate::fixtures::Fixtures;

#[derive(Args, Debug)]
pub struct CheckArgs {
    #[arg(help = "Fixture JSON file to validate")]
    pub file: PathBuf,
}

pub async fn handle(args: CheckArgs, output_format: OutputFormat) -> anyhow::Result<()> {
    let fixtures = Fixtures::load(&args.file)?;
    let counts = fixtures.counts();
    let serializers = fixtures.serializers(&config().api.prefix);

    let mut types = serde_json::Map::new();
    for (resource_type, count) in &counts {
        let Some(serializer) = serializers.get(*resource_type) else {
            continue;
        };
        if let OutputFormat::Text = output_format {
            println!(
                "{:<16} {:>6}  attributes: {}  relationships: {}",
                serializer.name(),
                count,
                serializer.attributes().join(","),
                serializer.relationships().join(",")
            );
        }
        types.insert(
            serializer.name().to_string(),
            json!({
                "records": count,
                "path": serializer.prefix(),
                "attributes": serializer.attributes(),
                "relationships": serializer.relationships(),
            }),
        );
    }

    let total: usize = counts.iter().map(|(_, count)| count).sum();
    output_success(
        &output_format,
        &format!("{} is valid: {} records across {} types", args.file.display(), total, counts.len()),
        Some(json!({ "types": types })),
    )
}
