// Per-file ingestion pipeline and the directory sweep built on top of it.
//
// A file goes through read, header normalization, row parsing, trailer
// removal, then one game-stat upsert (and one player merge) per row. Only a
// file whose stage completed is cleaned up.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures_util::stream::{self, StreamExt};
use moneyball_core::config::{CleanupAction, Config, TrailerPolicy};
use moneyball_core::store::{Document, DocumentStore, StoreError, UpsertPolicy};
use tracing::{debug, error, info, warn};

use crate::error::IngestError;
use crate::identity::{
    derive_game_stat_key, derive_player_key, extract_player_facts, PLAYER_FIELD, SOURCE_EXTENSION,
};
use crate::report::{BatchResult, CleanupOutcome, IngestResult, RowTally};
use crate::table::{parse_table, StatRow};
use crate::trailer::apply_trailer_policy;
use crate::upsert::{upsert, UpsertOutcome};

/// Timestamp appended to archived file names.
const ARCHIVE_STAMP: &str = "%Y%m%d_%H%M%S_%3f";

/// What to do with a source file once it has been ingested.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Cleanup {
    Delete,
    Archive(PathBuf),
    Keep,
}

/// Everything the pipeline needs from configuration.
#[derive(Debug, Clone)]
pub struct IngestSettings {
    pub game_stats_collection: String,
    pub players_collection: String,
    pub placeholder_prefix: String,
    pub game_stat_policy: UpsertPolicy,
    pub trailer_policy: TrailerPolicy,
    pub max_file_bytes: u64,
    pub retry_failed_writes: bool,
    pub max_concurrent_files: usize,
    pub file_timeout: Duration,
    pub cleanup: Cleanup,
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            game_stats_collection: "gameStats".into(),
            players_collection: "playerData".into(),
            placeholder_prefix: "@/H".into(),
            game_stat_policy: UpsertPolicy::default(),
            trailer_policy: TrailerPolicy::default(),
            max_file_bytes: 5 * 1024 * 1024,
            retry_failed_writes: true,
            max_concurrent_files: 4,
            file_timeout: Duration::from_secs(120),
            cleanup: Cleanup::Delete,
        }
    }
}

impl IngestSettings {
    pub fn from_config(config: &Config) -> Self {
        let cleanup = match config.cleanup.action {
            CleanupAction::Delete => Cleanup::Delete,
            CleanupAction::Keep => Cleanup::Keep,
            CleanupAction::Archive => Cleanup::Archive(config.archive_dir()),
        };
        Self {
            game_stats_collection: config.store.game_stats_collection.clone(),
            players_collection: config.store.players_collection.clone(),
            placeholder_prefix: config.ingest.placeholder_prefix.clone(),
            game_stat_policy: config.ingest.game_stat_policy,
            trailer_policy: config.ingest.trailer_policy,
            max_file_bytes: config.ingest.max_file_bytes,
            retry_failed_writes: config.ingest.retry_failed_writes,
            max_concurrent_files: config.batch.max_concurrent_files,
            file_timeout: Duration::from_secs(config.batch.file_timeout_secs),
            cleanup,
        }
    }
}

/// Runs files through the pipeline against a caller-owned store.
pub struct Ingestor {
    store: Arc<dyn DocumentStore>,
    settings: IngestSettings,
}

impl Ingestor {
    pub fn new(store: Arc<dyn DocumentStore>, settings: IngestSettings) -> Self {
        Self { store, settings }
    }

    pub fn settings(&self) -> &IngestSettings {
        &self.settings
    }

    /// Ingest one file. `original_name` names the source for key derivation
    /// (an upload's temp path rarely carries it).
    ///
    /// Never fails as a whole: file-level errors are recorded in the result
    /// and leave the file in place.
    pub async fn ingest_file(&self, path: &Path, original_name: &str) -> IngestResult {
        let timeout = self.settings.file_timeout;
        let staged = tokio::time::timeout(timeout, self.process_file(path, original_name)).await;

        let result = match staged {
            Ok(Ok(tally)) => {
                let cleanup = self.clean_up(path).await;
                IngestResult::succeeded(original_name, tally, cleanup)
            }
            Ok(Err(e)) => IngestResult::failed(original_name, e),
            Err(_) => IngestResult::failed(
                original_name,
                IngestError::Timeout {
                    path: path.to_path_buf(),
                    after: timeout,
                },
            ),
        };

        match &result.error {
            None => info!("{}", result.summary()),
            Some(e) => error!("Ingest of {} failed: {}", original_name, e),
        }
        result
    }

    /// Ingest every pending `*.csv` file in `dir`, up to
    /// `max_concurrent_files` at a time. Results come back in file-name
    /// order. Only a failure to list the directory is an error.
    pub async fn ingest_directory(&self, dir: &Path) -> Result<BatchResult, IngestError> {
        let started_at = Utc::now();
        let pending = pending_files(dir).await?;
        info!("Sweeping {}: {} pending file(s)", dir.display(), pending.len());

        let per_file: Vec<IngestResult> = stream::iter(pending)
            .map(|path| async move {
                let name = path
                    .file_name()
                    .map(|n| n.to_string_lossy().into_owned())
                    .unwrap_or_default();
                self.ingest_file(&path, &name).await
            })
            .buffered(self.settings.max_concurrent_files.max(1))
            .collect()
            .await;

        let batch = BatchResult {
            per_file,
            started_at,
            finished_at: Utc::now(),
        };
        info!(
            "Sweep of {} done: {} ok, {} failed",
            dir.display(),
            batch.files_succeeded(),
            batch.files_failed()
        );
        Ok(batch)
    }

    async fn process_file(&self, path: &Path, file_name: &str) -> Result<RowTally, IngestError> {
        let read_err = |source| IngestError::FileRead {
            path: path.to_path_buf(),
            source,
        };

        let size = tokio::fs::metadata(path).await.map_err(read_err)?.len();
        if size > self.settings.max_file_bytes {
            return Err(IngestError::FileTooLarge {
                path: path.to_path_buf(),
                size,
                limit: self.settings.max_file_bytes,
            });
        }

        let text = tokio::fs::read_to_string(path).await.map_err(read_err)?;
        let table = parse_table(&text, &self.settings.placeholder_prefix).map_err(|source| {
            IngestError::Split {
                path: path.to_path_buf(),
                source,
            }
        })?;
        if table.headers.is_empty() {
            return Err(IngestError::MalformedHeader {
                path: path.to_path_buf(),
            });
        }

        let rows = apply_trailer_policy(table.rows, self.settings.trailer_policy);
        debug!(
            "{}: {} headers, {} data rows",
            file_name,
            table.headers.len(),
            rows.len()
        );

        let mut tally = RowTally {
            rows_total: rows.len(),
            ..RowTally::default()
        };
        for (index, row) in rows.iter().enumerate() {
            self.ingest_row(file_name, index, row, &mut tally).await;
        }
        Ok(tally)
    }

    /// One row: game-stat upsert, then the player merge. Failures are logged
    /// and counted, never propagated. A row without a date writes no game
    /// stat but still merges its player.
    async fn ingest_row(&self, file_name: &str, index: usize, row: &StatRow, tally: &mut RowTally) {
        // One retry for the whole row, whichever write needs it.
        let mut retry = self.settings.retry_failed_writes;

        match derive_game_stat_key(file_name, row) {
            Some(key) => {
                let collection = &self.settings.game_stats_collection;
                let payload = row.to_document();
                match self
                    .write(collection, &key, &payload, self.settings.game_stat_policy, &mut retry)
                    .await
                {
                    Ok(outcome) => {
                        debug!("{file_name} row {index}: {collection}/{key} {outcome}");
                        if outcome.wrote() {
                            tally.rows_written += 1;
                        } else {
                            tally.rows_skipped += 1;
                        }
                    }
                    Err(e) => {
                        warn!("{file_name} row {index}: {collection}/{key} not written: {e}");
                        tally.rows_skipped += 1;
                        tally.row_errors += 1;
                        return;
                    }
                }
            }
            None => {
                debug!("{file_name} row {index}: no date value, game stat skipped");
                tally.rows_skipped += 1;
            }
        }

        let Some(name) = row.get(PLAYER_FIELD) else {
            return;
        };
        let Some(facts) = extract_player_facts(name) else {
            return;
        };
        let player_key = derive_player_key(name);
        let players = &self.settings.players_collection;
        match self
            .write(players, &player_key, &facts.to_document(), UpsertPolicy::Merge, &mut retry)
            .await
        {
            Ok(outcome) => {
                debug!("{file_name} row {index}: {players}/{player_key} {outcome}");
                if outcome.wrote() {
                    tally.players_written += 1;
                }
            }
            Err(e) => {
                warn!("{file_name} row {index}: {players}/{player_key} not merged: {e}");
                tally.row_errors += 1;
            }
        }
    }

    /// Upsert once, and once more if `retry` is still set. A retry clears it.
    async fn write(
        &self,
        collection: &str,
        key: &str,
        payload: &Document,
        policy: UpsertPolicy,
        retry: &mut bool,
    ) -> Result<UpsertOutcome, StoreError> {
        let store = self.store.as_ref();
        match upsert(store, collection, key, payload, policy).await {
            Err(e) if std::mem::take(retry) => {
                debug!("Retrying {collection}/{key} after: {e}");
                upsert(store, collection, key, payload, policy).await
            }
            other => other,
        }
    }

    /// Delete, archive or keep an ingested file. A failure here is logged
    /// and reported but never undoes the file's success.
    async fn clean_up(&self, path: &Path) -> CleanupOutcome {
        let done = match &self.settings.cleanup {
            Cleanup::Keep => return CleanupOutcome::Kept,
            Cleanup::Delete => tokio::fs::remove_file(path)
                .await
                .map(|()| CleanupOutcome::Deleted),
            Cleanup::Archive(dir) => archive_file(path, dir)
                .await
                .map(|to| CleanupOutcome::Archived { to }),
        };
        done.unwrap_or_else(|e| {
            warn!("Cleanup of {} failed: {}", path.display(), e);
            CleanupOutcome::Failed {
                message: e.to_string(),
            }
        })
    }
}

/// Move `path` into `dir` under a timestamped name. Falls back to copy and
/// remove when a rename cannot cross filesystems.
async fn archive_file(path: &Path, dir: &Path) -> std::io::Result<PathBuf> {
    tokio::fs::create_dir_all(dir).await?;
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let stamp = Utc::now().format(ARCHIVE_STAMP);
    let to = dir.join(format!("{stem}_{stamp}{SOURCE_EXTENSION}"));

    if tokio::fs::rename(path, &to).await.is_err() {
        tokio::fs::copy(path, &to).await?;
        tokio::fs::remove_file(path).await?;
    }
    Ok(to)
}

/// Entries of `dir` whose names end in `.csv`, sorted by path.
async fn pending_files(dir: &Path) -> Result<Vec<PathBuf>, IngestError> {
    let list_err = |source| IngestError::DirectoryRead {
        path: dir.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(dir).await.map_err(list_err)?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(list_err)? {
        let is_csv = entry
            .file_name()
            .to_str()
            .is_some_and(|n| n.ends_with(SOURCE_EXTENSION));
        if is_csv {
            files.push(entry.path());
        }
    }
    files.sort();
    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use moneyball_core::store::MemoryStore;
    use serde_json::json;

    const OHTANI: &str = "Date,Player,H\n2024-05-01,Shohei Ohtani,2\nTRAILER,,\n";

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(format!("moneyball_orch_{name}_{}", std::process::id()));
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn write_file(dir: &Path, name: &str, text: &str) -> PathBuf {
        let path = dir.join(name);
        std::fs::write(&path, text).unwrap();
        path
    }

    fn keep_settings() -> IngestSettings {
        IngestSettings {
            cleanup: Cleanup::Keep,
            ..IngestSettings::default()
        }
    }

    /// Wraps a [`MemoryStore`], failing the next N writes to chosen
    /// collections. An optional delay makes every `set` slow.
    struct FlakyStore {
        inner: MemoryStore,
        failures: Mutex<HashMap<&'static str, usize>>,
        set_calls: AtomicUsize,
        delay: Option<Duration>,
    }

    impl FlakyStore {
        fn failing(collection: &'static str, failures: usize) -> Self {
            Self {
                inner: MemoryStore::new(),
                failures: Mutex::new(HashMap::from([(collection, failures)])),
                set_calls: AtomicUsize::new(0),
                delay: None,
            }
        }

        fn and_failing(self, collection: &'static str, failures: usize) -> Self {
            self.failures.lock().unwrap().insert(collection, failures);
            self
        }

        fn slow(delay: Duration) -> Self {
            Self {
                delay: Some(delay),
                ..Self::failing("none", 0)
            }
        }

        fn take_failure(&self, collection: &str) -> bool {
            match self.failures.lock().unwrap().get_mut(collection) {
                Some(left) if *left > 0 => {
                    *left -= 1;
                    true
                }
                _ => false,
            }
        }
    }

    #[async_trait]
    impl DocumentStore for FlakyStore {
        async fn exists(&self, collection: &str, key: &str) -> Result<bool, StoreError> {
            self.inner.exists(collection, key).await
        }

        async fn get(&self, collection: &str, key: &str) -> Result<Option<Document>, StoreError> {
            self.inner.get(collection, key).await
        }

        async fn set(
            &self,
            collection: &str,
            key: &str,
            payload: &Document,
            merge: bool,
        ) -> Result<(), StoreError> {
            self.set_calls.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            if self.take_failure(collection) {
                return Err(StoreError::Unavailable {
                    message: "injected failure".into(),
                });
            }
            self.inner.set(collection, key, payload, merge).await
        }

        async fn count(&self, collection: &str) -> Result<usize, StoreError> {
            self.inner.count(collection).await
        }

        async fn list_keys(&self, collection: &str) -> Result<Vec<String>, StoreError> {
            self.inner.list_keys(collection).await
        }
    }

    // -- Settings --

    #[test]
    fn settings_follow_config() {
        let text = r#"
            [store]
            game_stats_collection = "games"
            players_collection = "people"
            [ingest]
            game_stat_policy = "merge"
            trailer_policy = "detect"
            pending_dir = "inbox"
            retry_failed_writes = false
            [batch]
            max_concurrent_files = 2
            file_timeout_secs = 30
            [cleanup]
            action = "archive"
            archive_dir = "done"
            [logging]
        "#;
        let config = moneyball_core::config::parse_config(text, Path::new("ingest.toml")).unwrap();
        let settings = IngestSettings::from_config(&config);
        assert_eq!(settings.game_stats_collection, "games");
        assert_eq!(settings.players_collection, "people");
        assert_eq!(settings.game_stat_policy, UpsertPolicy::Merge);
        assert_eq!(settings.trailer_policy, TrailerPolicy::Detect);
        assert!(!settings.retry_failed_writes);
        assert_eq!(settings.max_concurrent_files, 2);
        assert_eq!(settings.file_timeout, Duration::from_secs(30));
        assert_eq!(settings.cleanup, Cleanup::Archive(PathBuf::from("done")));
    }

    // -- Single file --

    #[tokio::test]
    async fn ingests_rows_and_players() {
        let dir = scratch_dir("rows_players");
        let path = write_file(
            &dir,
            "upload.tmp",
            "Date,Player,H\n2024-05-01,Shohei Ohtani,2\n2024-05-02,Shohei Ohtani,0\nTotals,,2\n",
        );
        let store = Arc::new(MemoryStore::new());
        let ingestor = Ingestor::new(store.clone(), IngestSettings::default());

        let result = ingestor.ingest_file(&path, "ohtani.csv").await;

        assert!(result.is_success(), "{:?}", result.error);
        assert_eq!(result.rows_total(), 2);
        assert_eq!(result.rows_written(), 2);
        assert_eq!(result.tally.players_written, 1);
        assert_eq!(result.cleanup, Some(CleanupOutcome::Deleted));
        assert!(!path.exists());
        assert_eq!(
            store.list_keys("gameStats").await.unwrap(),
            vec!["ohtani_2024-05-01", "ohtani_2024-05-02"]
        );
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn row_without_date_still_merges_player() {
        let dir = scratch_dir("no_date");
        let path = write_file(&dir, "x.csv", "Date,Player,H\n,Mike Trout,1\nTRAILER,,\n");
        let store = Arc::new(MemoryStore::new());
        let ingestor = Ingestor::new(store.clone(), keep_settings());

        let result = ingestor.ingest_file(&path, "trout.csv").await;

        assert!(result.is_success());
        assert_eq!(result.rows_total(), 1);
        assert_eq!(result.rows_written(), 0);
        assert_eq!(result.rows_skipped(), 1);
        assert_eq!(result.tally.players_written, 1);
        assert_eq!(store.count("gameStats").await.unwrap(), 0);
        assert_eq!(store.list_keys("playerData").await.unwrap(), vec!["mike_trout"]);
        let player = store.get("playerData", "mike_trout").await.unwrap().unwrap();
        assert_eq!(player["first_name"], json!("Mike"));
        assert_eq!(player["last_name"], json!("Trout"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn row_without_player_writes_only_game_stat() {
        let dir = scratch_dir("no_player");
        let path = write_file(&dir, "x.csv", "Date,Player,H\n2024-05-01,,1\nTRAILER,,\n");
        let store = Arc::new(MemoryStore::new());
        let ingestor = Ingestor::new(store.clone(), keep_settings());

        let result = ingestor.ingest_file(&path, "x.csv").await;

        assert_eq!(result.rows_written(), 1);
        assert_eq!(result.tally.players_written, 0);
        assert_eq!(store.count("playerData").await.unwrap(), 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn failed_write_is_retried_once() {
        let dir = scratch_dir("retry_once");
        let path = write_file(&dir, "ohtani.csv", OHTANI);
        let store = Arc::new(FlakyStore::failing("gameStats", 1));
        let ingestor = Ingestor::new(store.clone(), keep_settings());

        let result = ingestor.ingest_file(&path, "ohtani.csv").await;

        assert!(result.is_success());
        assert_eq!(result.rows_written(), 1);
        assert_eq!(result.tally.row_errors, 0);
        assert!(store.exists("gameStats", "ohtani_2024-05-01").await.unwrap());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn write_failing_twice_skips_row_and_its_player() {
        let dir = scratch_dir("retry_exhausted");
        let path = write_file(&dir, "ohtani.csv", OHTANI);
        let store = Arc::new(FlakyStore::failing("gameStats", 2));
        let ingestor = Ingestor::new(store.clone(), IngestSettings::default());

        let result = ingestor.ingest_file(&path, "ohtani.csv").await;

        assert!(result.is_success(), "row errors stay at row level");
        assert_eq!(result.rows_written(), 0);
        assert_eq!(result.rows_skipped(), 1);
        assert_eq!(result.tally.row_errors, 1);
        assert_eq!(store.count("playerData").await.unwrap(), 0);
        assert_eq!(result.cleanup, Some(CleanupOutcome::Deleted));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn failed_row_does_not_stop_later_rows() {
        let dir = scratch_dir("later_rows");
        let path = write_file(
            &dir,
            "ohtani.csv",
            "Date,Player,H\n2024-05-01,Shohei Ohtani,2\n2024-05-02,Shohei Ohtani,1\nTRAILER,,\n",
        );
        let store = Arc::new(FlakyStore::failing("gameStats", 2));
        let ingestor = Ingestor::new(store.clone(), IngestSettings::default());

        let result = ingestor.ingest_file(&path, "ohtani.csv").await;

        assert!(result.is_success());
        assert_eq!(result.rows_total(), 2);
        assert_eq!(result.rows_written(), 1);
        assert_eq!(result.rows_skipped(), 1);
        assert_eq!(result.tally.row_errors, 1);
        assert_eq!(
            store.list_keys("gameStats").await.unwrap(),
            vec!["ohtani_2024-05-02"]
        );
        assert_eq!(result.tally.players_written, 1);
        assert_eq!(result.cleanup, Some(CleanupOutcome::Deleted));
        assert!(!path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn one_retry_is_shared_by_the_whole_row() {
        let dir = scratch_dir("row_retry");
        let path = write_file(&dir, "ohtani.csv", OHTANI);
        let store = Arc::new(FlakyStore::failing("gameStats", 1).and_failing("playerData", 1));
        let ingestor = Ingestor::new(store.clone(), keep_settings());

        let result = ingestor.ingest_file(&path, "ohtani.csv").await;

        // Game stat: fail, retry succeeds. Player: fail, no retry left.
        assert_eq!(result.rows_written(), 1);
        assert_eq!(result.tally.players_written, 0);
        assert_eq!(result.tally.row_errors, 1);
        assert_eq!(store.set_calls.load(Ordering::SeqCst), 3);
        assert_eq!(store.count("playerData").await.unwrap(), 0);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn retry_can_be_disabled() {
        let dir = scratch_dir("no_retry");
        let path = write_file(&dir, "ohtani.csv", OHTANI);
        let store = Arc::new(FlakyStore::failing("gameStats", 1));
        let settings = IngestSettings {
            retry_failed_writes: false,
            ..keep_settings()
        };
        let ingestor = Ingestor::new(store.clone(), settings);

        let result = ingestor.ingest_file(&path, "ohtani.csv").await;

        assert_eq!(result.tally.row_errors, 1);
        assert_eq!(store.set_calls.load(Ordering::SeqCst), 1);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn player_failure_keeps_the_game_stat() {
        let dir = scratch_dir("player_fail");
        let path = write_file(&dir, "ohtani.csv", OHTANI);
        let store = Arc::new(FlakyStore::failing("playerData", 2));
        let ingestor = Ingestor::new(store.clone(), keep_settings());

        let result = ingestor.ingest_file(&path, "ohtani.csv").await;

        assert_eq!(result.rows_written(), 1);
        assert_eq!(result.tally.players_written, 0);
        assert_eq!(result.tally.row_errors, 1);
        assert!(store.exists("gameStats", "ohtani_2024-05-01").await.unwrap());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn existing_game_stat_still_merges_player() {
        let dir = scratch_dir("skip_then_merge");
        let path = write_file(&dir, "ohtani.csv", OHTANI);
        let store = Arc::new(MemoryStore::new());
        store
            .set("gameStats", "ohtani_2024-05-01", &Document::new(), false)
            .await
            .unwrap();
        let ingestor = Ingestor::new(store.clone(), keep_settings());

        let result = ingestor.ingest_file(&path, "ohtani.csv").await;

        assert_eq!(result.rows_skipped(), 1);
        assert_eq!(result.tally.players_written, 1);
        let player = store.get("playerData", "shohei_ohtani").await.unwrap().unwrap();
        assert_eq!(player["first_name"], json!("Shohei"));
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn slow_file_times_out_and_is_left_in_place() {
        let dir = scratch_dir("timeout");
        let path = write_file(&dir, "ohtani.csv", OHTANI);
        let store = Arc::new(FlakyStore::slow(Duration::from_secs(5)));
        let settings = IngestSettings {
            file_timeout: Duration::from_millis(50),
            ..IngestSettings::default()
        };
        let ingestor = Ingestor::new(store, settings);

        let result = ingestor.ingest_file(&path, "ohtani.csv").await;

        assert!(matches!(result.error, Some(IngestError::Timeout { .. })));
        assert!(result.cleanup.is_none());
        assert!(path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn archive_moves_file_with_timestamp() {
        let dir = scratch_dir("archive");
        let path = write_file(&dir, "ohtani.csv", OHTANI);
        let archive = dir.join("archive");
        let settings = IngestSettings {
            cleanup: Cleanup::Archive(archive.clone()),
            ..IngestSettings::default()
        };
        let ingestor = Ingestor::new(Arc::new(MemoryStore::new()), settings);

        let result = ingestor.ingest_file(&path, "ohtani.csv").await;

        let Some(CleanupOutcome::Archived { to }) = &result.cleanup else {
            panic!("expected archive, got {:?}", result.cleanup);
        };
        assert!(!path.exists());
        assert!(to.exists());
        assert!(to.starts_with(&archive));
        let name = to.file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("ohtani_") && name.ends_with(".csv"), "{name}");
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn cleanup_failure_does_not_fail_the_file() {
        let dir = scratch_dir("cleanup_fail");
        let path = write_file(&dir, "ohtani.csv", OHTANI);
        // A regular file where the archive directory should go.
        let blocker = write_file(&dir, "blocker", "");
        let settings = IngestSettings {
            cleanup: Cleanup::Archive(blocker.join("archive")),
            ..IngestSettings::default()
        };
        let ingestor = Ingestor::new(Arc::new(MemoryStore::new()), settings);

        let result = ingestor.ingest_file(&path, "ohtani.csv").await;

        assert!(result.is_success());
        assert!(matches!(result.cleanup, Some(CleanupOutcome::Failed { .. })));
        assert!(path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_file_is_a_read_failure() {
        let ingestor = Ingestor::new(Arc::new(MemoryStore::new()), IngestSettings::default());
        let result = ingestor
            .ingest_file(Path::new("/nonexistent/moneyball/ohtani.csv"), "ohtani.csv")
            .await;
        assert!(matches!(result.error, Some(IngestError::FileRead { .. })));
        assert_eq!(result.rows_total(), 0);
    }

    // -- Sweep --

    #[tokio::test]
    async fn pending_files_are_csv_only_and_sorted() {
        let dir = scratch_dir("pending");
        write_file(&dir, "b.csv", "");
        write_file(&dir, "a.csv", "");
        write_file(&dir, "notes.txt", "");
        write_file(&dir, "c.csv.bak", "");
        std::fs::create_dir_all(dir.join("archive")).unwrap();

        let files = pending_files(&dir).await.unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
        let _ = std::fs::remove_dir_all(&dir);
    }

    #[tokio::test]
    async fn missing_directory_is_an_error() {
        let ingestor = Ingestor::new(Arc::new(MemoryStore::new()), IngestSettings::default());
        let err = ingestor
            .ingest_directory(Path::new("/nonexistent/moneyball/pending"))
            .await
            .unwrap_err();
        assert!(matches!(err, IngestError::DirectoryRead { .. }));
    }

    #[tokio::test]
    async fn sweep_keys_each_file_by_its_own_name() {
        let dir = scratch_dir("sweep_names");
        write_file(&dir, "ohtani.csv", OHTANI);
        write_file(&dir, "trout.csv", "Date,Player,H\n2024-05-01,Mike Trout,1\nTRAILER,,\n");
        let store = Arc::new(MemoryStore::new());
        let settings = IngestSettings {
            max_concurrent_files: 2,
            ..IngestSettings::default()
        };
        let ingestor = Ingestor::new(store.clone(), settings);

        let batch = ingestor.ingest_directory(&dir).await.unwrap();

        assert_eq!(batch.files_succeeded(), 2);
        assert_eq!(batch.per_file[0].file_name, "ohtani.csv");
        assert_eq!(batch.per_file[1].file_name, "trout.csv");
        assert!(batch.started_at <= batch.finished_at);
        assert_eq!(
            store.list_keys("gameStats").await.unwrap(),
            vec!["ohtani_2024-05-01", "trout_2024-05-01"]
        );
        assert_eq!(
            store.list_keys("playerData").await.unwrap(),
            vec!["mike_trout", "shohei_ohtani"]
        );
        let _ = std::fs::remove_dir_all(&dir);
    }
}
