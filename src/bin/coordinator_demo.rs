//! Minimal end-to-end demonstration of the coordinator wired to a toy
//! in-memory extractor. Not a scraper — a harness showing how a caller
//! plugs its own `Extractor` and `RobotsFetcher` into the core.

use std::sync::Arc;

use async_trait::async_trait;
use scrape_coordinator::{
    AlwaysAllow, Coordinator, CoordinatorConfig, DynamicSubtype, ExportFormat, ExtractError,
    Extractor, ExtractorRegistry, Task, TaskParams, TaskType,
};

struct ToyExtractor;

#[async_trait]
impl Extractor for ToyExtractor {
    async fn extract(&self, task: &Task) -> Result<serde_json::Value, ExtractError> {
        Ok(serde_json::json!({ "scraped_url": task.url, "items": [] }))
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    let tasks = vec![
        Task {
            url: "https://example.com/listado".to_string(),
            task_type: TaskType::Dynamic,
            subtype: DynamicSubtype::ECommerce,
            priority: 1,
            timeout: None,
            params: TaskParams {
                num_productos: Some(20),
                max_paginas: Some(2),
                ..TaskParams::default()
            },
        },
        Task {
            url: "https://example.com/otra-pagina".to_string(),
            task_type: TaskType::Dynamic,
            subtype: DynamicSubtype::ECommerce,
            priority: 5,
            timeout: None,
            params: TaskParams::default(),
        },
    ];

    let config = CoordinatorConfig::builder()
        .cache_dir("cache/scraping_cache.json")
        .max_workers(4)
        .show_progress(true)
        .build()?;

    let mut extractors = ExtractorRegistry::new();
    extractors.register(TaskType::Dynamic, DynamicSubtype::ECommerce, Arc::new(ToyExtractor));

    let coordinator = Coordinator::new(tasks, config, AlwaysAllow, extractors).await?;
    let envelope = coordinator.run().await;

    log::info!(
        "run finished: {} results in {:.2}s, cache_hit_rate={:.2}",
        envelope.results.len(),
        envelope.duration_secs,
        envelope.cache_hit_rate
    );

    let path = coordinator.export_results(ExportFormat::Json, None).await?;
    log::info!("exported results to {}", path.display());

    coordinator.cleanup().await;
    Ok(())
}
