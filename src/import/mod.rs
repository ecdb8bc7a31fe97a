//! Import runs: resolve a repository, normalize every payload, persist the
//! recipes and track the batch through its lifecycle.

pub mod batch;
pub mod poller;
pub mod tracker;

pub use batch::{BatchEvent, BatchState, Transition};
pub use poller::{poll_until_terminal, PollOutcome};

use crate::config::{GitHubConfig, ImporterConfig};
use crate::db::models::{ImportBatch, NewImportBatch, NewRecipe, Recipe};
use crate::db::{batches, recipes, DbPool};
use crate::error::{Error, Result};
use crate::normalizer::Normalizer;
use crate::search::SearchIndex;
use crate::source::{PayloadEntry, RepositorySource};
use futures::stream::{self, StreamExt};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout};
use tracker::{spawn_tracker, BatchEvents};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// Retry `op` on transient errors with exponential backoff.
///
/// A transient error that outlasts every retry becomes [`Error::Persistence`].
pub(crate) async fn with_retries<T, F, Fut>(
    retries: u32,
    initial_backoff: Duration,
    mut op: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut attempt = 0;
    let mut backoff = initial_backoff;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt < retries && e.is_transient() => {
                attempt += 1;
                warn!(
                    "Write failed (attempt {}/{}): {}. Retrying in {:?}",
                    attempt,
                    retries,
                    e.log_safe(),
                    backoff
                );
                sleep(backoff).await;
                backoff *= 2;
            }
            Err(e) if e.is_transient() => {
                return Err(Error::Persistence(format!(
                    "gave up after {} attempts: {}",
                    attempt + 1,
                    e.log_safe()
                )))
            }
            Err(e) => return Err(e),
        }
    }
}

/// Starts and runs import batches
#[derive(Clone)]
pub struct Importer {
    pool: DbPool,
    index: Arc<SearchIndex>,
    config: ImporterConfig,
    github: GitHubConfig,
    normalizer: Normalizer,
}

impl Importer {
    pub fn new(
        pool: DbPool,
        index: Arc<SearchIndex>,
        config: ImporterConfig,
        github: GitHubConfig,
    ) -> Self {
        let normalizer = Normalizer::new(config.max_payload_bytes);
        Self {
            pool,
            index,
            config,
            github,
            normalizer,
        }
    }

    /// Create a batch for `repository_url` and process it in the background.
    ///
    /// Returns as soon as the batch row exists.
    pub async fn start_import(
        &self,
        repository_url: &str,
        created_by: Option<String>,
    ) -> Result<Uuid> {
        let (batch, _handle) = self.launch(repository_url, created_by).await?;
        Ok(batch.id)
    }

    /// Like [`Importer::start_import`] but waits for the terminal batch
    pub async fn import_and_wait(
        &self,
        repository_url: &str,
        created_by: Option<String>,
    ) -> Result<ImportBatch> {
        let (_, handle) = self.launch(repository_url, created_by).await?;
        handle
            .await
            .map_err(|e| Error::Internal(format!("Import task failed: {e}")))?
    }

    pub async fn get_status(&self, batch_id: Uuid) -> Result<ImportBatch> {
        batches::get_batch(&self.pool, batch_id).await
    }

    pub async fn list_batches(&self, limit: i64, offset: i64) -> Result<Vec<ImportBatch>> {
        batches::list_batches(&self.pool, limit, offset).await
    }

    async fn launch(
        &self,
        repository_url: &str,
        created_by: Option<String>,
    ) -> Result<(ImportBatch, JoinHandle<Result<ImportBatch>>)> {
        let repository_url = repository_url.trim();
        if repository_url.is_empty() {
            return Err(Error::Validation(
                "Repository URL must not be empty".to_string(),
            ));
        }

        let created_by = created_by
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());

        let batch = batches::create_batch(
            &self.pool,
            &NewImportBatch {
                repository_url: repository_url.to_string(),
                created_by,
            },
        )
        .await?;
        info!("Created import batch {} for {}", batch.id, batch.repository_url);

        let importer = self.clone();
        let snapshot = batch.clone();
        let handle = tokio::spawn(async move {
            let batch_id = snapshot.id;
            let result = importer.run_batch(snapshot).await;
            if let Err(e) = &result {
                error!("Import batch {} ended abnormally: {}", batch_id, e.log_safe());
            }
            result
        });

        Ok((batch, handle))
    }

    async fn run_batch(self, batch: ImportBatch) -> Result<ImportBatch> {
        let batch_id = batch.id;
        let repository_url = batch.repository_url.clone();

        let (events, tracker) = spawn_tracker(
            self.pool.clone(),
            batch,
            self.config.persist_retries,
            Duration::from_millis(self.config.persist_backoff_ms),
        );

        let enumeration_timeout = Duration::from_secs(self.config.enumeration_timeout_secs);
        let fatal = match timeout(enumeration_timeout, self.enumerate(&repository_url)).await {
            Ok(Ok((source, entries))) if !entries.is_empty() => {
                self.process_entries(&events, &source, entries, batch_id, &repository_url)
                    .await;
                None
            }
            Ok(Ok(_)) => Some("Repository contains no recipe payloads".to_string()),
            Ok(Err(e)) => {
                error!("Enumeration of {} failed: {}", repository_url, e.log_safe());
                Some(format!("Failed to read repository: {e}"))
            }
            Err(_) => Some(format!(
                "Repository enumeration timed out after {}s",
                enumeration_timeout.as_secs()
            )),
        };

        match fatal {
            Some(message) => {
                warn!("Batch {} failed: {}", batch_id, message);
                events.send(BatchEvent::Fatal { message }).await;
            }
            None => events.send(BatchEvent::Finished).await,
        }
        drop(events);

        tracker
            .await
            .map_err(|e| Error::Internal(format!("Batch tracker failed: {e}")))?
    }

    async fn enumerate(&self, repository_url: &str) -> Result<(RepositorySource, Vec<PayloadEntry>)> {
        let source = RepositorySource::resolve(repository_url, &self.config, &self.github)?;
        let entries = source.enumerate().await?;
        Ok((source, entries))
    }

    /// Attempt every entry, then publish the indexed recipes
    async fn process_entries(
        &self,
        events: &BatchEvents,
        source: &RepositorySource,
        entries: Vec<PayloadEntry>,
        batch_id: Uuid,
        repository_url: &str,
    ) {
        info!(
            "Batch {}: importing {} payloads from {}",
            batch_id,
            entries.len(),
            repository_url
        );
        events
            .send(BatchEvent::Enumerated {
                total: entries.len(),
            })
            .await;

        stream::iter(entries)
            .map(|entry| async move {
                match self
                    .import_entry(source, &entry, batch_id, repository_url)
                    .await
                {
                    Ok(recipe) => {
                        debug!("Imported {} as recipe {}", entry.location, recipe.id);
                        BatchEvent::ItemSucceeded {
                            location: entry.location,
                        }
                    }
                    Err(e) => {
                        warn!("Failed to import {}: {}", entry.location, e.log_safe());
                        BatchEvent::ItemFailed {
                            message: format!("{}: {}", entry.location, e),
                        }
                    }
                }
            })
            .buffer_unordered(self.config.item_concurrency.max(1))
            .for_each(|event| events.send(event))
            .await;

        let index = self.index.clone();
        match tokio::task::spawn_blocking(move || index.commit()).await {
            Ok(Ok(())) => debug!("Search index committed for batch {}", batch_id),
            Ok(Err(e)) => warn!("Failed to commit search index: {}", e.log_safe()),
            Err(e) => warn!("Search index commit task failed: {}", e),
        }
    }

    /// load -> normalize -> persist -> stage in the index
    async fn import_entry(
        &self,
        source: &RepositorySource,
        entry: &PayloadEntry,
        batch_id: Uuid,
        repository_url: &str,
    ) -> Result<Recipe> {
        let payload = source.load(entry).await?;
        let normalized = self.normalizer.normalize(&payload)?;

        let new_recipe = NewRecipe::from_normalized(
            normalized,
            Some(repository_url.to_string()),
            Some(entry.location.clone()),
            Some(batch_id),
        );

        let recipe = with_retries(
            self.config.persist_retries,
            Duration::from_millis(self.config.persist_backoff_ms),
            || recipes::create_recipe(&self.pool, &new_recipe),
        )
        .await?;

        // The writer may block while its indexing queue is full
        let index = self.index.clone();
        let staged = recipe.clone();
        match tokio::task::spawn_blocking(move || index.add_recipe(&staged)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("Recipe {} stored but not indexed: {}", recipe.id, e.log_safe()),
            Err(e) => warn!("Indexing task for recipe {} failed: {}", recipe.id, e),
        }

        Ok(recipe)
    }
}
