//! Browse Collections Example
//!
//! Connects to a Typesense server, lists its collections and runs a search
//! against the first one. Connection details come from the environment:
//! `TYPESENSE_HOST`, `TYPESENSE_PORT`, `TYPESENSE_PROTOCOL` and `TYPESENSE_API_KEY`.
//!
//! Run with: cargo run --example browse_collections

use std::sync::Arc;

use tsdash_server::tsdash_core::{ConnectionForm, MemoryStore, PortInput, SearchParams};
use tsdash_server::tsdash_rs::ClientProvider;

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    println!("tsdash Browse Example\n");

    let form = ConnectionForm {
        host: env_or("TYPESENSE_HOST", "localhost"),
        port: PortInput::Text(env_or("TYPESENSE_PORT", "8108")),
        protocol: env_or("TYPESENSE_PROTOCOL", "http"),
        api_key: env_or("TYPESENSE_API_KEY", "xyz"),
    };
    let config = form.validate()?;
    println!("🔌 Connecting to {}", config.base_url());

    let provider = ClientProvider::new(Arc::new(MemoryStore::new()));
    provider.save(&config).await?;
    let client = provider.get_client().await?;

    let health = client.health().await?;
    println!("   Healthy: {}\n", health.ok);

    let collections = client.list_collections().await?;
    println!("📚 {} collection(s)", collections.len());
    for collection in &collections {
        println!(
            "   {} ({} documents, {} fields)",
            collection.name,
            collection.num_documents,
            collection.fields.len()
        );
    }

    let Some(first) = collections.first() else {
        return Ok(());
    };
    let Some(query_by) = first
        .fields
        .iter()
        .find(|f| f.field_type == "string")
        .map(|f| f.name.clone())
    else {
        println!("\n{} has no string fields to search", first.name);
        return Ok(());
    };

    let params = SearchParams::new("*", query_by).page(1, 5);
    let result = client.search(&first.name, &params).await?;
    println!("\n🔍 {} hit(s) in {} ({}ms)", result.found, first.name, result.search_time_ms);
    for (i, hit) in result.hits.iter().enumerate() {
        println!("   {}. {}", i + 1, hit.document);
    }

    Ok(())
}
