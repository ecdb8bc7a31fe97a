#![allow(dead_code)]

use recipe_import::config::{GitHubConfig, ImporterConfig, PaginationConfig};
use recipe_import::db::{self, DbPool};
use recipe_import::import::Importer;
use recipe_import::search::{SearchIndex, SearchRanker};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

pub struct TestApp {
    pub pool: DbPool,
    pub index: Arc<SearchIndex>,
    pub importer: Importer,
    pub ranker: SearchRanker,
    _db_dir: TempDir,
}

pub fn importer_config() -> ImporterConfig {
    ImporterConfig {
        item_concurrency: 4,
        persist_backoff_ms: 10,
        allow_local_paths: true,
        allow_private_hosts: true,
        ..ImporterConfig::default()
    }
}

pub fn pagination() -> PaginationConfig {
    PaginationConfig {
        api_max_limit: 100,
        api_default_limit: 20,
        max_request_body_size: 1_048_576,
        max_pages: 1000,
    }
}

/// File-backed database (WAL, several connections) and an in-memory index
pub async fn setup() -> TestApp {
    setup_with(importer_config(), GitHubConfig::default()).await
}

pub async fn setup_with(config: ImporterConfig, github: GitHubConfig) -> TestApp {
    let db_dir = tempfile::tempdir().expect("Failed to create temp dir");
    let url = format!("sqlite://{}/recipes.db", db_dir.path().display());

    let pool = db::init_pool(&url)
        .await
        .expect("Failed to create database");
    db::run_migrations(&pool)
        .await
        .expect("Failed to run migrations");

    let index = Arc::new(SearchIndex::in_memory().expect("Failed to create index"));
    let importer = Importer::new(pool.clone(), index.clone(), config, github);
    let ranker = SearchRanker::new(pool.clone(), index.clone(), pagination(), 1000);

    TestApp {
        pool,
        index,
        importer,
        ranker,
        _db_dir: db_dir,
    }
}

pub fn write(dir: &Path, relative: &str, content: &str) {
    let path = dir.join(relative);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).expect("Failed to create fixture dir");
    }
    std::fs::write(path, content).expect("Failed to write fixture");
}

/// A complete JSON recipe
pub fn json_recipe(name: &str, description: &str, tags: &[&str]) -> String {
    json!({
        "name": name,
        "description": description,
        "prep_time": 10,
        "cook_time": 20,
        "servings": 4,
        "ingredients": ["1 onion", "2 cloves garlic", "1 tbsp oil"],
        "directions": ["Chop.", "Cook."],
        "tags": tags,
    })
    .to_string()
}
