//! `carebridge status` — Show configuration and data status.

use carebridge_config::AppConfig;
use carebridge_knowledge::KnowledgeIndex;

pub async fn run() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    println!("CareBridge Status");
    println!("=================");
    println!("  Config dir:    {}", AppConfig::config_dir().display());
    println!("  Provider:      {}", config.default_provider);
    println!("  Model:         {}", config.default_model);
    println!("  API key:       {}", if config.has_api_key() { "set" } else { "missing (extractive answers)" });
    println!("  Records:       {:?} at {}", config.records.backend, config.records.path.display());
    match &config.knowledge.embedding_model {
        Some(model) => println!(
            "  Embeddings:    {model} via {}",
            config
                .knowledge
                .embedding_provider
                .as_deref()
                .unwrap_or(&config.default_provider)
        ),
        None => println!("  Embeddings:    off (keyword scoring)"),
    }
    println!("  Web search:    {:?}", config.web_search.backend);
    println!("  Threshold:     {}", config.clinical.confidence_threshold);
    println!("  ID check:      {}", if config.receptionist.require_id_confirmation { "two-step" } else { "name only" });
    println!("  Gateway:       {}:{}", config.gateway.host, config.gateway.port);

    let index_path = &config.knowledge.index_path;
    if index_path.exists() {
        match KnowledgeIndex::load(index_path).await {
            Ok(index) => println!(
                "\n  ✅ Knowledge index: {} chunks from {} ({})",
                index.len(),
                index.source,
                if index.has_embeddings() { "embedded" } else { "keyword" }
            ),
            Err(e) => println!("\n  ❌ Knowledge index unreadable: {e}"),
        }
    } else {
        println!("\n  ⚠️  No knowledge index — run `carebridge ingest <file>`");
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("  ✅ Config file found");
    } else {
        println!("  ⚠️  No config file — run `carebridge onboard` first");
    }

    Ok(())
}
