use crate::api::models::ImportAccepted;
use crate::db::models::{BatchStatus, ImportBatch};
use crate::db::{self, DbPool};
use crate::import::{poll_until_terminal, PollOutcome};
use crate::search::{self, SearchIndex};
use crate::{Error, Result};
use reqwest::{Client, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Polls made by `--wait`/`--watch` before giving up
const MAX_POLLS: u32 = 1800;

/// Thin client for the service's HTTP API
pub struct ApiClient {
    client: Client,
    server_url: String,
}

impl ApiClient {
    pub fn new(server_url: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(format!("Recipe-Import-CLI/{}", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            client,
            server_url: server_url.trim_end_matches('/').to_string(),
        })
    }

    pub async fn start_import(
        &self,
        repository_url: &str,
        created_by: Option<&str>,
    ) -> Result<ImportAccepted> {
        let response = self
            .client
            .post(format!("{}/api/imports", self.server_url))
            .json(&json!({
                "repository_url": repository_url,
                "created_by": created_by,
            }))
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    pub async fn get_batch(&self, batch_id: Uuid) -> Result<ImportBatch> {
        let response = self
            .client
            .get(format!("{}/api/imports/{batch_id}", self.server_url))
            .send()
            .await?;

        Ok(check(response).await?.json().await?)
    }

    async fn search(
        &self,
        query: Option<&str>,
        tags: Option<&str>,
        limit: Option<i64>,
        page: i64,
    ) -> Result<SearchResponse> {
        let mut url = format!("{}/api/search?page={page}", self.server_url);
        if let Some(query) = query {
            url.push_str(&format!("&q={}", urlencoding::encode(query)));
        }
        if let Some(tags) = tags {
            url.push_str(&format!("&tags={}", urlencoding::encode(tags)));
        }
        if let Some(limit) = limit {
            url.push_str(&format!("&limit={limit}"));
        }

        let response = self.client.get(&url).send().await?;
        Ok(check(response).await?.json().await?)
    }
}

/// Map API error statuses onto crate errors
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let message = response
        .json::<ErrorBody>()
        .await
        .map(|body| body.error)
        .unwrap_or_else(|_| status.to_string());

    Err(match status {
        StatusCode::NOT_FOUND => Error::NotFound(message),
        StatusCode::BAD_REQUEST => Error::Validation(message),
        _ => Error::Internal(format!("Server returned {status}: {message}")),
    })
}

/// Submit an import, optionally waiting for the terminal status
pub async fn import(
    server_url: &str,
    repository_url: &str,
    created_by: Option<String>,
    wait: bool,
) -> Result<()> {
    let api = ApiClient::new(server_url)?;
    let accepted = api
        .start_import(repository_url, created_by.as_deref())
        .await?;

    println!("✓ Import accepted: {}", accepted.batch_id);

    if wait {
        watch_batch(&api, accepted.batch_id, Duration::from_secs(2)).await
    } else {
        println!("\nTo follow progress: recipe-import status {} --watch", accepted.batch_id);
        Ok(())
    }
}

/// Show a batch once, or keep polling with `watch`
pub async fn status(server_url: &str, batch_id: Uuid, watch: bool, interval: Duration) -> Result<()> {
    let api = ApiClient::new(server_url)?;

    if watch {
        watch_batch(&api, batch_id, interval).await
    } else {
        print_batch(&api.get_batch(batch_id).await?);
        Ok(())
    }
}

async fn watch_batch(api: &ApiClient, batch_id: Uuid, interval: Duration) -> Result<()> {
    let mut last_line = String::new();

    let outcome = poll_until_terminal(
        || api.get_batch(batch_id),
        interval,
        MAX_POLLS,
        |batch| {
            let line = progress_line(batch);
            if line != last_line {
                println!("  {line}");
                last_line = line;
            }
        },
    )
    .await?;

    match outcome {
        PollOutcome::Terminal(batch) => {
            println!();
            print_batch(&batch);
            Ok(())
        }
        PollOutcome::GaveUp(batch) => Err(Error::Internal(format!(
            "Batch {} still {} after {} polls",
            batch.id, batch.status, MAX_POLLS
        ))),
    }
}

/// Search recipes through the API
pub async fn search(
    server_url: &str,
    query: Option<String>,
    tags: Option<String>,
    limit: Option<i64>,
    page: i64,
) -> Result<()> {
    let api = ApiClient::new(server_url)?;
    let results = api
        .search(query.as_deref(), tags.as_deref(), limit, page)
        .await?;

    print_search_results(&results);
    Ok(())
}

/// Rebuild the search index from every stored recipe
pub async fn reindex(pool: &DbPool, index: Arc<SearchIndex>) -> Result<usize> {
    let total = db::recipes::count_all_recipes(pool).await?;
    println!("  Reindexing {total} recipes...");

    search::reindex(pool, index).await
}

// Helper functions

fn progress_line(batch: &ImportBatch) -> String {
    match batch.total_recipes {
        Some(total) => format!(
            "{}: {}/{} attempted ({} ok, {} failed)",
            batch.status,
            batch.successful_imports + batch.failed_imports,
            total,
            batch.successful_imports,
            batch.failed_imports
        ),
        None => batch.status.to_string(),
    }
}

fn print_batch(batch: &ImportBatch) {
    let mark = match batch.status {
        BatchStatus::Completed => "\x1b[32m\u{2713}\x1b[0m",
        BatchStatus::Failed => "\x1b[31m\u{2717}\x1b[0m",
        _ => "\u{2026}",
    };

    println!("{mark} Batch {}", batch.id);
    println!("  Repository: {}", batch.repository_url);
    println!("  Status: {}", batch.status);
    if let Some(total) = batch.total_recipes {
        println!("  Recipes: {total}");
    }
    println!("  Imported: {}", batch.successful_imports);
    println!("  Failed: {}", batch.failed_imports);
    println!("  Started: {}", batch.started_at.to_rfc3339());
    if let Some(completed_at) = batch.completed_at {
        println!("  Finished: {}", completed_at.to_rfc3339());
    }

    if !batch.error_log.0.is_empty() {
        println!("  Errors:");
        for entry in &batch.error_log.0 {
            println!("    - {entry}");
        }
    }
}

fn print_search_results(results: &SearchResponse) {
    if results.results.is_empty() {
        println!("No recipes found");
        return;
    }

    println!("\nFound {} recipes:\n", results.pagination.total);
    println!("{:<36} {:<40} {:<7} {:<20}", "ID", "Name", "Score", "Tags");
    println!("{}", "-".repeat(106));

    for recipe in &results.results {
        let tags = recipe.tags.join(", ");

        println!(
            "{:<36} {:<40} {:<7.2} {:<20}",
            recipe.id,
            truncate(&recipe.name, 38),
            recipe.similarity_score,
            truncate(&tags, 18)
        );
    }

    println!(
        "\nPage {} of {}",
        results.pagination.page, results.pagination.total_pages
    );
}

fn truncate(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else {
        let kept: String = s.chars().take(max_len.saturating_sub(3)).collect();
        format!("{kept}...")
    }
}

// Response types (matching API models)

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    results: Vec<RecipeCard>,
    pagination: Pagination,
}

#[derive(Debug, Deserialize)]
struct RecipeCard {
    id: Uuid,
    name: String,
    tags: Vec<String>,
    similarity_score: f32,
}

#[derive(Debug, Deserialize)]
struct Pagination {
    page: i64,
    total: i64,
    total_pages: i64,
}
