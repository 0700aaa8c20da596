//! Extractor Worker (C5): turns one raw journal entry into a structured
//! [`Extraction`], per §4.5.

use std::sync::Arc;

use chrono::NaiveDate;

use journalforge_db::{Cache, Persistence};
use journalforge_llm::{ChatMessage, LlmGateway};
use journalforge_objectstore::ObjectStore;
use journalforge_types::extraction::Extraction;
use journalforge_types::hash;

use crate::common::CACHE_TTL_SECONDS;
use crate::error::{Result, WorkerError};
use crate::validate::call_and_validate;

/// One unit of extraction work: a single manifest entry.
#[derive(Debug, Clone)]
pub struct ExtractionJob {
    pub entry_date: NaiveDate,
    pub object_key: String,
    pub content_hash: String,
}

#[derive(Clone)]
pub struct ExtractorWorker {
    persistence: Persistence,
    cache: Cache,
    object_store: Arc<dyn ObjectStore>,
    gateway: Arc<dyn LlmGateway>,
}

impl ExtractorWorker {
    pub fn new(
        persistence: Persistence,
        cache: Cache,
        object_store: Arc<dyn ObjectStore>,
        gateway: Arc<dyn LlmGateway>,
    ) -> Self {
        Self {
            persistence,
            cache,
            object_store,
            gateway,
        }
    }

    /// Process one extraction job end to end (§4.5 steps 1-7): cache
    /// check, fetch-and-hash-compare, prompt, gateway call with one
    /// schema retry, persist, cache. Returns the `input_hash` the job was
    /// processed under, for the caller's job-status bookkeeping.
    pub async fn process(&self, job: &ExtractionJob) -> Result<String> {
        let date_str = job.entry_date.format("%Y-%m-%d").to_string();
        let input_hash = hash::input_hash(
            [(date_str.as_str(), job.content_hash.as_str())],
            journalforge_prompts::PROMPT_VERSION,
        );
        let cache_key = hash::extraction_cache_key(&date_str, &job.content_hash);

        if let Some(cached) = self.cache.get(&cache_key).await? {
            let extraction: Extraction = serde_json::from_str(&cached)?;
            extraction
                .validate()
                .map_err(|e| WorkerError::SchemaValidation(e.to_string()))?;
            self.persistence.store_extraction(&extraction, &input_hash).await?;
            return Ok(input_hash);
        }

        let bytes = self.object_store.get_entry_bytes(&job.object_key).await?;
        let actual_hash = hash::content_hash(&bytes);
        if actual_hash != job.content_hash {
            return Err(WorkerError::ContentDrift { date: date_str });
        }

        let content = String::from_utf8_lossy(&bytes).into_owned();
        let messages = [
            ChatMessage::system(journalforge_prompts::system_prompt()),
            ChatMessage::user(journalforge_prompts::extraction_prompt(&date_str, &content)),
        ];

        let extraction: Extraction = call_and_validate(self.gateway.as_ref(), &messages).await?;

        self.cache
            .put(&cache_key, &serde_json::to_string(&extraction)?, CACHE_TTL_SECONDS)
            .await?;
        self.persistence.store_extraction(&extraction, &input_hash).await?;
        Ok(input_hash)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use journalforge_db::DbConfig;
    use journalforge_llm::CallOptions;
    use journalforge_objectstore::Result as StoreResult;
    use journalforge_types::Manifest;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct FakeStore {
        bytes: Vec<u8>,
    }

    #[async_trait]
    impl ObjectStore for FakeStore {
        async fn get_manifest(&self) -> StoreResult<Manifest> {
            unimplemented!("not exercised by extractor tests")
        }

        async fn get_entry_bytes(&self, _key: &str) -> StoreResult<Vec<u8>> {
            Ok(self.bytes.clone())
        }
    }

    struct FakeGateway {
        responses: Mutex<Vec<String>>,
        calls: AtomicUsize,
    }

    impl FakeGateway {
        fn once(response: &str) -> Self {
            Self {
                responses: Mutex::new(vec![response.to_string()]),
                calls: AtomicUsize::new(0),
            }
        }

        fn sequence(responses: Vec<&str>) -> Self {
            Self {
                responses: Mutex::new(responses.into_iter().rev().map(str::to_string).collect()),
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl LlmGateway for FakeGateway {
        async fn call(
            &self,
            _messages: &[ChatMessage],
            _opts: &CallOptions,
        ) -> journalforge_llm::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let mut responses = self.responses.lock().unwrap();
            Ok(responses.pop().unwrap_or_else(|| "{}".to_string()))
        }
    }

    fn valid_extraction_json() -> &'static str {
        r#"{
            "mood_score": 7,
            "energy_level": 6,
            "sleep_mentioned": false,
            "sleep_quality": null,
            "medication_mentioned": false,
            "hormone_therapy_mentioned": false,
            "people_mentions": [],
            "activities": [],
            "events": [],
            "dominant_themes": [],
            "identity_markers": [],
            "key_quotes": [],
            "summary": "An ordinary day."
        }"#
    }

    async fn worker(gateway: Arc<dyn LlmGateway>, bytes: &[u8]) -> (ExtractorWorker, Persistence) {
        let (persistence, cache) = journalforge_db::open(DbConfig::sqlite_memory()).await.unwrap();
        let store: Arc<dyn ObjectStore> = Arc::new(FakeStore { bytes: bytes.to_vec() });
        (
            ExtractorWorker::new(persistence.clone(), cache, store, gateway),
            persistence,
        )
    }

    #[tokio::test]
    async fn successful_extraction_is_persisted() {
        let gateway: Arc<dyn LlmGateway> = Arc::new(FakeGateway::once(valid_extraction_json()));
        let bytes = b"Today was fine.";
        let (extractor, persistence) = worker(gateway, bytes).await;

        let job = ExtractionJob {
            entry_date: "2025-03-03".parse().unwrap(),
            object_key: "journals/2025-03-03.md".into(),
            content_hash: hash::content_hash(bytes),
        };
        extractor.process(&job).await.unwrap();

        let stored = persistence.get_extraction(job.entry_date).await.unwrap();
        assert!(stored.is_some());
        assert_eq!(stored.unwrap().summary, "An ordinary day.");
    }

    #[tokio::test]
    async fn content_drift_rejected_before_any_gateway_call() {
        let gateway: Arc<dyn LlmGateway> = Arc::new(FakeGateway::once(valid_extraction_json()));
        let bytes = b"Today was fine.";
        let (extractor, _persistence) = worker(gateway, bytes).await;

        let job = ExtractionJob {
            entry_date: "2025-03-03".parse().unwrap(),
            object_key: "journals/2025-03-03.md".into(),
            content_hash: "stale-hash-from-a-different-version".into(),
        };
        let result = extractor.process(&job).await;
        assert!(matches!(result, Err(WorkerError::ContentDrift { .. })));
    }

    #[tokio::test]
    async fn malformed_response_retried_once_then_succeeds() {
        let gateway: Arc<dyn LlmGateway> = Arc::new(FakeGateway::sequence(vec![
            "not json at all",
            valid_extraction_json(),
        ]));
        let bytes = b"Today was fine.";
        let (extractor, persistence) = worker(gateway, bytes).await;

        let job = ExtractionJob {
            entry_date: "2025-03-03".parse().unwrap(),
            object_key: "journals/2025-03-03.md".into(),
            content_hash: hash::content_hash(bytes),
        };
        extractor.process(&job).await.unwrap();
        assert!(persistence.get_extraction(job.entry_date).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn malformed_response_twice_is_dead_lettered_as_schema_validation() {
        let gateway: Arc<dyn LlmGateway> =
            Arc::new(FakeGateway::sequence(vec!["still not json", "also not json"]));
        let bytes = b"Today was fine.";
        let (extractor, _persistence) = worker(gateway, bytes).await;

        let job = ExtractionJob {
            entry_date: "2025-03-03".parse().unwrap(),
            object_key: "journals/2025-03-03.md".into(),
            content_hash: hash::content_hash(bytes),
        };
        let result = extractor.process(&job).await;
        assert!(matches!(result, Err(WorkerError::SchemaValidation(_))));
    }

    #[tokio::test]
    async fn cache_hit_skips_the_gateway_entirely() {
        let concrete = Arc::new(FakeGateway::once(valid_extraction_json()));
        let gateway: Arc<dyn LlmGateway> = concrete.clone();
        let bytes = b"Today was fine.";
        let (extractor, _persistence) = worker(gateway, bytes).await;

        let job = ExtractionJob {
            entry_date: "2025-03-03".parse().unwrap(),
            object_key: "journals/2025-03-03.md".into(),
            content_hash: hash::content_hash(bytes),
        };
        extractor.process(&job).await.unwrap();
        extractor.process(&job).await.unwrap();

        assert_eq!(
            concrete.calls.load(Ordering::SeqCst),
            1,
            "second run must hit the cache, not the gateway"
        );
    }
}
