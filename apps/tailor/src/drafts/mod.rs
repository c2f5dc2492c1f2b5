//! Draft store: versioned persistence of the in-progress tailoring session.
//!
//! Four independent records live under `tailor:{session}:*`:
//! - `job_post`: plain text
//! - `questions`: the gap questions of the current analysis
//! - `answers`: an `AnswersEnvelope` (older shapes are migrated on load)
//! - `preview`: the generated document, opaque JSON
//!
//! `job_post` and `answers` change on every keystroke, so their writes are
//! debounced: each edit cancels the record's pending write and schedules a new
//! one after the quiescence interval. `clear` and `shutdown` cancel pending
//! writes; `clear` holds the write lock while deleting, so a timer that already
//! fired cannot land stale data after a reset.

pub mod kv;
pub mod migrate;

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::models::answer::AnswerMap;
use crate::models::question::{questions_from_value, GapQuestion};
use kv::KvStore;
use migrate::{decode_answers, AnswersEnvelope, DecodedAnswers};

#[derive(Debug, Error)]
pub enum DraftError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Background write failed: {0}")]
    Task(String),

    #[error("Failed to clear draft records: {}", failures.join("; "))]
    ClearFailed { failures: Vec<String> },
}

/// Everything a session needs to resume where the user left off.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DraftState {
    pub job_post: String,
    pub questions: Vec<GapQuestion>,
    pub answers: AnswerMap,
    pub preview: Option<Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
enum Record {
    JobPost,
    Questions,
    Answers,
    Preview,
}

impl Record {
    const ALL: [Record; 4] = [
        Record::JobPost,
        Record::Questions,
        Record::Answers,
        Record::Preview,
    ];

    fn name(self) -> &'static str {
        match self {
            Record::JobPost => "job_post",
            Record::Questions => "questions",
            Record::Answers => "answers",
            Record::Preview => "preview",
        }
    }
}

struct PendingWrite {
    seq: u64,
    value: String,
    handle: JoinHandle<()>,
}

type PendingMap = Arc<Mutex<HashMap<Record, PendingWrite>>>;

#[derive(Clone)]
pub struct DraftStore {
    kv: Arc<dyn KvStore>,
    prefix: String,
    debounce: Duration,
    pending: PendingMap,
    seq: Arc<AtomicU64>,
    /// Serializes every write and delete against the key-value store.
    io_lock: Arc<tokio::sync::Mutex<()>>,
}

fn lock_pending(pending: &PendingMap) -> MutexGuard<'_, HashMap<Record, PendingWrite>> {
    pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl DraftStore {
    pub fn new(kv: Arc<dyn KvStore>, session: &str, debounce: Duration) -> Self {
        Self {
            kv,
            prefix: format!("tailor:{session}"),
            debounce,
            pending: Arc::new(Mutex::new(HashMap::new())),
            seq: Arc::new(AtomicU64::new(0)),
            io_lock: Arc::new(tokio::sync::Mutex::new(())),
        }
    }

    fn key(&self, record: Record) -> String {
        format!("{}:{}", self.prefix, record.name())
    }

    /// Loads every record. Unreadable questions/preview records are dropped and
    /// an answers record that cannot be migrated starts the answers cold.
    /// Migrated answers are written back before returning.
    pub async fn load(&self) -> Result<DraftState, DraftError> {
        let job_post = self
            .kv
            .get(&self.key(Record::JobPost))
            .await?
            .unwrap_or_default();

        let questions = match self.kv.get(&self.key(Record::Questions)).await? {
            Some(raw) => match serde_json::from_str::<Value>(&raw) {
                Ok(v) => questions_from_value(&v),
                Err(e) => {
                    warn!("Discarding unreadable questions record: {e}");
                    Vec::new()
                }
            },
            None => Vec::new(),
        };

        let answers = match self.kv.get(&self.key(Record::Answers)).await? {
            Some(raw) => match decode_answers(&raw) {
                Ok(DecodedAnswers::Current(map)) => map,
                Ok(DecodedAnswers::Migrated(map)) => {
                    info!("Migrated {} legacy answer records", map.len());
                    self.write_now(Record::Answers, encode_answers(&map)?).await?;
                    map
                }
                Err(e) => {
                    warn!("Answers record could not be migrated, starting cold: {e}");
                    let empty = AnswerMap::new();
                    self.write_now(Record::Answers, encode_answers(&empty)?).await?;
                    empty
                }
            },
            None => AnswerMap::new(),
        };

        let preview = match self.kv.get(&self.key(Record::Preview)).await? {
            Some(raw) => serde_json::from_str::<Value>(&raw)
                .map_err(|e| warn!("Discarding unreadable preview record: {e}"))
                .ok()
                .filter(|v| !v.is_null()),
            None => None,
        };

        Ok(DraftState {
            job_post,
            questions,
            answers,
            preview,
        })
    }

    /// Writes every record immediately, superseding pending debounced writes.
    pub async fn save(&self, state: &DraftState) -> Result<(), DraftError> {
        self.write_now(Record::JobPost, state.job_post.clone()).await?;
        self.save_questions(&state.questions).await?;
        self.write_now(Record::Answers, encode_answers(&state.answers)?)
            .await?;
        self.save_preview(state.preview.as_ref()).await
    }

    pub fn save_job_post(&self, text: &str) {
        self.schedule(Record::JobPost, text.to_string());
    }

    pub fn save_answers(&self, answers: &AnswerMap) -> Result<(), DraftError> {
        self.schedule(Record::Answers, encode_answers(answers)?);
        Ok(())
    }

    pub async fn save_questions(&self, questions: &[GapQuestion]) -> Result<(), DraftError> {
        self.write_now(Record::Questions, serde_json::to_string(questions)?)
            .await
    }

    /// `None` removes the record.
    pub async fn save_preview(&self, preview: Option<&Value>) -> Result<(), DraftError> {
        match preview {
            Some(v) => self.write_now(Record::Preview, serde_json::to_string(v)?).await,
            None => {
                self.cancel(Record::Preview);
                let _io = self.io_lock.lock().await;
                self.kv.delete(&self.key(Record::Preview)).await
            }
        }
    }

    /// Writes pending debounced values now.
    pub async fn flush(&self) -> Result<(), DraftError> {
        let drained: Vec<(Record, PendingWrite)> = lock_pending(&self.pending).drain().collect();
        let _io = self.io_lock.lock().await;
        for (record, write) in drained {
            write.handle.abort();
            self.kv.set(&self.key(record), &write.value).await?;
            debug!("Flushed draft record {}", record.name());
        }
        Ok(())
    }

    /// Removes every record. All deletes are attempted; failures are reported
    /// together.
    pub async fn clear(&self) -> Result<(), DraftError> {
        self.shutdown();
        let _io = self.io_lock.lock().await;

        let mut failures = Vec::new();
        for record in Record::ALL {
            let key = self.key(record);
            if let Err(e) = self.kv.delete(&key).await {
                failures.push(format!("{key}: {e}"));
            }
        }

        if failures.is_empty() {
            info!("Cleared draft records under {}", self.prefix);
            Ok(())
        } else {
            Err(DraftError::ClearFailed { failures })
        }
    }

    /// Cancels pending debounced writes without writing them.
    pub fn shutdown(&self) {
        for (_, write) in lock_pending(&self.pending).drain() {
            write.handle.abort();
        }
    }

    fn cancel(&self, record: Record) {
        if let Some(write) = lock_pending(&self.pending).remove(&record) {
            write.handle.abort();
        }
    }

    async fn write_now(&self, record: Record, value: String) -> Result<(), DraftError> {
        self.cancel(record);
        let _io = self.io_lock.lock().await;
        self.kv.set(&self.key(record), &value).await
    }

    fn schedule(&self, record: Record, value: String) {
        let seq = self.seq.fetch_add(1, Ordering::Relaxed);
        let key = self.key(record);
        let kv = Arc::clone(&self.kv);
        let pending = Arc::clone(&self.pending);
        let io_lock = Arc::clone(&self.io_lock);
        let delay = self.debounce;
        let to_write = value.clone();

        let mut slots = lock_pending(&self.pending);
        if let Some(previous) = slots.remove(&record) {
            previous.handle.abort();
        }

        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _io = io_lock.lock().await;
            // Claim the slot; a newer edit, a flush or a clear may own it now.
            {
                let mut slots = lock_pending(&pending);
                if !matches!(slots.get(&record), Some(w) if w.seq == seq) {
                    return;
                }
                slots.remove(&record);
            }
            match kv.set(&key, &to_write).await {
                Ok(()) => debug!("Persisted debounced draft record {key}"),
                Err(e) => warn!("Debounced write of {key} failed: {e}"),
            }
        });

        slots.insert(record, PendingWrite { seq, value, handle });
    }
}

fn encode_answers(answers: &AnswerMap) -> Result<String, DraftError> {
    Ok(serde_json::to_string(&AnswersEnvelope::current(
        answers.clone(),
    ))?)
}

#[cfg(test)]
mod tests {
    use super::kv::MemoryKvStore;
    use super::*;
    use crate::models::answer::AnswerRow;
    use async_trait::async_trait;
    use serde_json::json;

    const DEBOUNCE: Duration = Duration::from_millis(400);

    fn store() -> (Arc<MemoryKvStore>, DraftStore) {
        let kv = Arc::new(MemoryKvStore::new());
        let drafts = DraftStore::new(kv.clone(), "test", DEBOUNCE);
        (kv, drafts)
    }

    #[tokio::test(start_paused = true)]
    async fn test_job_post_writes_are_debounced() {
        let (kv, drafts) = store();

        drafts.save_job_post("Senior");
        tokio::time::sleep(Duration::from_millis(200)).await;
        drafts.save_job_post("Senior Rust");
        tokio::time::sleep(Duration::from_millis(399)).await;
        assert_eq!(kv.get("tailor:test:job_post").await.unwrap(), None);

        tokio::time::sleep(Duration::from_millis(2)).await;
        assert_eq!(
            kv.get("tailor:test:job_post").await.unwrap().as_deref(),
            Some("Senior Rust")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_cancels_pending_write() {
        let (kv, drafts) = store();
        kv.set("tailor:test:preview", "{}").await.unwrap();

        drafts.save_job_post("stale text");
        drafts.clear().await.unwrap();
        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(kv.get("tailor:test:job_post").await.unwrap(), None);
        assert_eq!(kv.get("tailor:test:preview").await.unwrap(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_flush_writes_immediately() {
        let (kv, drafts) = store();
        drafts.save_job_post("typed");
        drafts.flush().await.unwrap();
        assert_eq!(
            kv.get("tailor:test:job_post").await.unwrap().as_deref(),
            Some("typed")
        );
    }

    #[tokio::test]
    async fn test_save_then_load_round_trip() {
        let (_, drafts) = store();
        let mut answers = AnswerMap::new();
        answers.insert(0, vec![AnswerRow::linked_to("Leidos")]);
        let state = DraftState {
            job_post: "JD".into(),
            questions: vec![GapQuestion::from_text("Which CI?")],
            answers,
            preview: Some(json!({"resume": {"basics": {}}})),
        };

        drafts.save(&state).await.unwrap();
        assert_eq!(drafts.load().await.unwrap(), state);
    }

    #[tokio::test]
    async fn test_load_migrates_and_persists_legacy_answers() {
        let (kv, drafts) = store();
        kv.set("tailor:test:answers", r#"{"2": "Built the billing service"}"#)
            .await
            .unwrap();

        let state = drafts.load().await.unwrap();
        assert_eq!(state.answers[&2].len(), 1);
        assert_eq!(state.answers[&2][0].text, "Built the billing service");
        assert!(!state.answers[&2][0].enhance);

        let stored: Value =
            serde_json::from_str(&kv.get("tailor:test:answers").await.unwrap().unwrap()).unwrap();
        assert_eq!(stored["version"], 2);
        assert_eq!(stored["answers"]["2"][0]["text"], "Built the billing service");
    }

    #[tokio::test]
    async fn test_unmigratable_answers_start_cold() {
        let (kv, drafts) = store();
        kv.set("tailor:test:answers", "\"just a string\"").await.unwrap();
        kv.set("tailor:test:job_post", "kept").await.unwrap();

        let state = drafts.load().await.unwrap();
        assert!(state.answers.is_empty());
        assert_eq!(state.job_post, "kept");
    }

    struct FailingDeletes {
        inner: MemoryKvStore,
    }

    #[async_trait]
    impl KvStore for FailingDeletes {
        async fn get(&self, key: &str) -> Result<Option<String>, DraftError> {
            self.inner.get(key).await
        }
        async fn set(&self, key: &str, value: &str) -> Result<(), DraftError> {
            self.inner.set(key, value).await
        }
        async fn delete(&self, key: &str) -> Result<(), DraftError> {
            if key.ends_with("answers") || key.ends_with("preview") {
                return Err(DraftError::Task("disk full".into()));
            }
            self.inner.delete(key).await
        }
    }

    #[tokio::test]
    async fn test_clear_reports_every_failed_key() {
        let kv = Arc::new(FailingDeletes {
            inner: MemoryKvStore::new(),
        });
        kv.set("tailor:test:job_post", "x").await.unwrap();
        let drafts = DraftStore::new(kv.clone(), "test", DEBOUNCE);

        match drafts.clear().await {
            Err(DraftError::ClearFailed { failures }) => {
                assert_eq!(failures.len(), 2);
                assert!(failures[0].contains("answers"));
                assert!(failures[1].contains("preview"));
            }
            other => panic!("expected ClearFailed, got {other:?}"),
        }
        // the keys that could be deleted still were
        assert_eq!(kv.get("tailor:test:job_post").await.unwrap(), None);
    }
}
