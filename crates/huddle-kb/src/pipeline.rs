use std::sync::Arc;

use dashmap::DashMap;
use huddle_core::types::{GroupFolder, KbChunk, KbSearchHit, KbSource};
use huddle_store::Store;
use sha2::{Digest, Sha256};
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::chunk::chunk_text;
use crate::embedder::Embedder;
use crate::error::{KbError, Result};
use crate::extractor::{self, Extracted};

/// Content above this size is truncated before hashing/chunking.
const MAX_CONTENT_BYTES: usize = 4 * 1024 * 1024;

/// Default cosine-similarity floor for search hits (spec.md §4.4).
const DEFAULT_MIN_SIMILARITY: f32 = 0.7;

/// Default result cap when a caller doesn't specify `limit`.
const DEFAULT_SEARCH_LIMIT: usize = 10;

/// Ingest → update → delete → search over `huddle-store`'s `kb_sources`/
/// `kb_chunks` tables. Holds one in-process lock per group folder so
/// concurrent ingests into the same group serialize (the spec's file-based
/// mutex wording targets multi-process deployments; Huddle is single-process,
/// see DESIGN.md).
pub struct KbPipeline {
    store: Arc<Store>,
    embedder: Option<Arc<dyn Embedder>>,
    http: reqwest::Client,
    locks: DashMap<GroupFolder, Arc<AsyncMutex<()>>>,
}

impl KbPipeline {
    pub fn new(store: Arc<Store>, embedder: Option<Arc<dyn Embedder>>) -> Self {
        Self {
            store,
            embedder,
            http: reqwest::Client::new(),
            locks: DashMap::new(),
        }
    }

    fn lock_for(&self, folder: &GroupFolder) -> Arc<AsyncMutex<()>> {
        self.locks
            .entry(folder.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone()
    }

    /// Fetches and ingests a URL. Returns `AlreadyIngested` if the group has
    /// already ingested this exact URL.
    #[instrument(skip(self), fields(folder = %folder, url))]
    pub async fn ingest_url(&self, folder: &GroupFolder, url: &str) -> Result<KbSource> {
        let lock = self.lock_for(folder);
        let _guard = lock.lock().await;

        let normalized = normalize_url(url);
        if self
            .store
            .find_kb_source_by_url(folder, &normalized)?
            .is_some()
        {
            return Err(KbError::AlreadyIngested(normalized));
        }

        let (source_type, extracted) = extractor::extract(&self.http, &normalized).await?;
        self.persist_new_source(folder, Some(normalized), source_type, extracted, Vec::new())
            .await
    }

    /// Ingests pasted text directly (no URL, no fetch).
    #[instrument(skip(self, text), fields(folder = %folder))]
    pub async fn ingest_text(
        &self,
        folder: &GroupFolder,
        title: &str,
        text: &str,
        tags: Vec<String>,
    ) -> Result<KbSource> {
        let lock = self.lock_for(folder);
        let _guard = lock.lock().await;

        let (source_type, extracted) = extractor::extract_pasted_text(title, text);
        self.persist_new_source(folder, None, source_type, extracted, tags)
            .await
    }

    async fn persist_new_source(
        &self,
        folder: &GroupFolder,
        url: Option<String>,
        source_type: huddle_core::types::SourceType,
        extracted: Extracted,
        tags: Vec<String>,
    ) -> Result<KbSource> {
        let (content, truncated) = validate_and_truncate(&extracted.content);
        if content.trim().is_empty() {
            return Err(KbError::ExtractionFailed(
                "extracted content was empty".to_string(),
            ));
        }
        let content_hash = hash_content(&content);
        if self
            .store
            .find_kb_source_by_hash(folder, &content_hash)?
            .is_some()
        {
            return Err(KbError::DuplicateContent);
        }

        let now = chrono::Utc::now();
        let source = KbSource {
            id: Uuid::new_v4().to_string(),
            group_folder: folder.clone(),
            url,
            title: extracted.title,
            source_type,
            raw_content: content.clone(),
            content_hash,
            tags,
            truncated,
            created_at: now,
            updated_at: now,
        };
        self.store.create_kb_source(&source)?;

        let chunks = self.embed_chunks(&source.id, &content).await?;
        self.store.insert_kb_chunks(&chunks)?;
        info!(source_id = %source.id, chunks = chunks.len(), "ingested KB source");
        Ok(source)
    }

    /// Splits `content` into chunks and embeds them, tolerating an
    /// unavailable embeddings provider by persisting null embeddings instead
    /// of failing the whole ingest (spec.md §4.4).
    async fn embed_chunks(&self, source_id: &str, content: &str) -> Result<Vec<KbChunk>> {
        let pieces = chunk_text(content);
        let now = chrono::Utc::now();

        let embeddings: Vec<Option<Vec<f32>>> = match &self.embedder {
            None => vec![None; pieces.len()],
            Some(embedder) => match embedder.embed_batch(&pieces).await {
                Ok(vecs) => vecs.into_iter().map(Some).collect(),
                Err(e) => {
                    warn!(error = %e, "embeddings provider unavailable, storing null embeddings");
                    vec![None; pieces.len()]
                }
            },
        };

        let (provider, model) = self
            .embedder
            .as_ref()
            .map(|e| (Some(e.provider_name().to_string()), Some(e.model_name().to_string())))
            .unwrap_or((None, None));

        Ok(pieces
            .into_iter()
            .enumerate()
            .map(|(i, content)| {
                let embedding = embeddings.get(i).cloned().flatten();
                let embedding_dim = embedding.as_ref().map(|v| v.len() as u32);
                KbChunk {
                    id: Uuid::new_v4().to_string(),
                    source_id: source_id.to_string(),
                    chunk_index: i as u32,
                    content,
                    embedding,
                    embedding_dim,
                    embedding_provider: if embedding_dim.is_some() {
                        provider.clone()
                    } else {
                        None
                    },
                    embedding_model: if embedding_dim.is_some() {
                        model.clone()
                    } else {
                        None
                    },
                    created_at: now,
                }
            })
            .collect())
    }

    /// Re-ingests new content for an existing source (deletes old chunks,
    /// keeps `created_at`), or — when `new_text` is `None` — updates only
    /// title/tags in place without touching chunks.
    #[instrument(skip(self, new_text))]
    pub async fn update(
        &self,
        source_id: &str,
        title: Option<String>,
        tags: Option<Vec<String>>,
        new_text: Option<String>,
    ) -> Result<()> {
        let source = self
            .store
            .get_kb_source(source_id)?
            .ok_or_else(|| KbError::NotFound(source_id.to_string()))?;

        let lock = self.lock_for(&source.group_folder);
        let _guard = lock.lock().await;

        match new_text {
            None => {
                if title.is_none() && tags.is_none() {
                    return Err(KbError::InvalidPayload(
                        "update requires title, tags, or new content".to_string(),
                    ));
                }
                self.store
                    .update_kb_source_metadata(source_id, title.as_deref(), tags.as_deref())?;
                Ok(())
            }
            Some(text) => {
                let (content, truncated) = validate_and_truncate(&text);
                let content_hash = hash_content(&content);
                let chunks = self.embed_chunks(source_id, &content).await?;
                self.store
                    .replace_kb_source_content(source_id, &content, &content_hash, truncated, &chunks)?;
                if title.is_some() || tags.is_some() {
                    self.store
                        .update_kb_source_metadata(source_id, title.as_deref(), tags.as_deref())?;
                }
                debug!(source_id, "updated KB source content");
                Ok(())
            }
        }
    }

    /// Deletes a source; `ON DELETE CASCADE` on `kb_chunks.source_id` removes
    /// its chunks.
    pub async fn delete(&self, source_id: &str) -> Result<()> {
        self.store.delete_kb_source(source_id)?;
        Ok(())
    }

    pub fn list_sources(&self, folder: &GroupFolder) -> Result<Vec<KbSource>> {
        Ok(self.store.list_kb_sources_for_group(folder)?)
    }

    /// Brute-force cosine-similarity search across every embedded chunk in
    /// `folder`. Returns an empty result (with a warning logged) when no
    /// embeddings provider is configured, since there is nothing to compare
    /// the query against.
    #[instrument(skip(self, query))]
    pub async fn search(
        &self,
        folder: &GroupFolder,
        query: &str,
        limit: Option<usize>,
        min_similarity: Option<f32>,
        dedupe_by_source: bool,
    ) -> Result<Vec<KbSearchHit>> {
        let embedder = match &self.embedder {
            Some(e) => e,
            None => {
                warn!("KB search requested but no embeddings provider is configured");
                return Ok(Vec::new());
            }
        };
        let floor = min_similarity.unwrap_or(DEFAULT_MIN_SIMILARITY);
        let query_embedding = embedder
            .embed_batch(&[query.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| KbError::EmbeddingsUnavailable("empty embedding response".to_string()))?;

        let rows = self.store.list_kb_chunks_for_group(folder)?;
        let mut hits: Vec<KbSearchHit> = rows
            .into_iter()
            .filter_map(|(source, chunk)| {
                let embedding = chunk.embedding.as_ref()?;
                let similarity = cosine_similarity(&query_embedding, embedding);
                if similarity < floor {
                    return None;
                }
                Some(KbSearchHit {
                    chunk_id: chunk.id,
                    source_id: source.id,
                    url: source.url,
                    title: source.title,
                    source_type: source.source_type,
                    content: chunk.content,
                    similarity,
                })
            })
            .collect();

        hits.sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap());

        if dedupe_by_source {
            let mut seen = std::collections::HashSet::new();
            hits.retain(|h| seen.insert(h.source_id.clone()));
        }

        hits.truncate(limit.unwrap_or(DEFAULT_SEARCH_LIMIT));
        Ok(hits)
    }
}

/// Query params that track campaigns/referrers rather than identify content;
/// stripped so `?utm_source=x` doesn't fork a source from the same URL
/// without it.
const TRACKING_PARAM_PREFIXES: &[&str] = &["utm_"];
const TRACKING_PARAM_NAMES: &[&str] = &["fbclid", "gclid", "msclkid", "mc_cid", "mc_eid", "ref", "ref_src"];

fn is_tracking_param(name: &str) -> bool {
    let lower = name.to_lowercase();
    TRACKING_PARAM_PREFIXES.iter().any(|p| lower.starts_with(p)) || TRACKING_PARAM_NAMES.contains(&lower.as_str())
}

/// Lowercases scheme and host, strips the fragment and tracking query
/// params, and trims a trailing `/` — so e.g. `HTTP://Example.com/p?utm_
/// source=x#frag` and `http://example.com/p` dedupe to the same source.
fn normalize_url(url: &str) -> String {
    let without_fragment = url.split('#').next().unwrap_or(url);

    let (scheme_and_host, rest) = match without_fragment.split_once("://") {
        Some((scheme, rest)) => (format!("{}://", scheme.to_lowercase()), rest),
        None => (String::new(), without_fragment),
    };

    let (authority, path_and_query) = match rest.split_once('/') {
        Some((authority, path_and_query)) => (authority.to_lowercase(), format!("/{path_and_query}")),
        None => (rest.to_lowercase(), String::new()),
    };

    let (path, query) = match path_and_query.split_once('?') {
        Some((path, query)) => (path, Some(query)),
        None => (path_and_query.as_str(), None),
    };

    let kept_query = query.map(|q| {
        q.split('&')
            .filter(|pair| {
                let name = pair.split('=').next().unwrap_or(pair);
                !is_tracking_param(name)
            })
            .collect::<Vec<_>>()
            .join("&")
    });

    let mut normalized = format!("{scheme_and_host}{authority}{path}");
    if let Some(kept_query) = kept_query {
        if !kept_query.is_empty() {
            normalized.push('?');
            normalized.push_str(&kept_query);
        }
    }

    normalized.trim_end_matches('/').to_string()
}

fn hash_content(content: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hex::encode(hasher.finalize())
}

fn validate_and_truncate(content: &str) -> (String, bool) {
    if content.len() <= MAX_CONTENT_BYTES {
        return (content.to_string(), false);
    }
    let mut end = MAX_CONTENT_BYTES;
    while !content.is_char_boundary(end) {
        end -= 1;
    }
    (content[..end].to_string(), true)
}

fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let norm_a = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;

    struct FakeEmbedder;

    #[async_trait]
    impl Embedder for FakeEmbedder {
        async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.contains("cat") {
                        vec![1.0, 0.0]
                    } else {
                        vec![0.0, 1.0]
                    }
                })
                .collect())
        }
        fn provider_name(&self) -> &str {
            "fake"
        }
        fn model_name(&self) -> &str {
            "fake-model"
        }
    }

    fn pipeline_with_embedder() -> KbPipeline {
        let store = Arc::new(Store::open_in_memory().unwrap());
        KbPipeline::new(store, Some(Arc::new(FakeEmbedder)))
    }

    #[tokio::test]
    async fn ingest_text_then_search_finds_matching_chunk() {
        let pipeline = pipeline_with_embedder();
        let folder = GroupFolder::from("acme");
        pipeline
            .ingest_text(&folder, "Cats", "All about cats and their habits.", vec![])
            .await
            .unwrap();
        pipeline
            .ingest_text(&folder, "Dogs", "All about dogs and their habits.", vec![])
            .await
            .unwrap();

        let hits = pipeline
            .search(&folder, "tell me about cat behavior", None, None, false)
            .await
            .unwrap();
        assert!(!hits.is_empty());
        assert_eq!(hits[0].title, "Cats");
    }

    #[tokio::test]
    async fn duplicate_text_content_is_rejected() {
        let pipeline = pipeline_with_embedder();
        let folder = GroupFolder::from("acme");
        pipeline
            .ingest_text(&folder, "A", "identical body text", vec![])
            .await
            .unwrap();
        let err = pipeline
            .ingest_text(&folder, "B", "identical body text", vec![])
            .await
            .unwrap_err();
        assert!(matches!(err, KbError::DuplicateContent));
    }

    #[tokio::test]
    async fn update_metadata_only_leaves_chunks_untouched() {
        let pipeline = pipeline_with_embedder();
        let folder = GroupFolder::from("acme");
        let source = pipeline
            .ingest_text(&folder, "Notes", "some durable notes here", vec![])
            .await
            .unwrap();
        let before = pipeline.store.list_kb_chunks_for_source(&source.id).unwrap();

        pipeline
            .update(&source.id, Some("Renamed".to_string()), None, None)
            .await
            .unwrap();

        let after = pipeline.store.list_kb_chunks_for_source(&source.id).unwrap();
        assert_eq!(before.len(), after.len());
        let updated = pipeline.store.get_kb_source(&source.id).unwrap().unwrap();
        assert_eq!(updated.title, "Renamed");
    }

    #[tokio::test]
    async fn update_with_new_text_replaces_chunks_and_keeps_created_at() {
        let pipeline = pipeline_with_embedder();
        let folder = GroupFolder::from("acme");
        let source = pipeline
            .ingest_text(&folder, "Notes", "some durable notes here", vec![])
            .await
            .unwrap();
        let before = pipeline.store.list_kb_chunks_for_source(&source.id).unwrap();

        pipeline
            .update(&source.id, None, None, Some("entirely different body about cats".to_string()))
            .await
            .unwrap();

        let after = pipeline.store.list_kb_chunks_for_source(&source.id).unwrap();
        assert_ne!(before.iter().map(|c| c.id.clone()).collect::<Vec<_>>(), after.iter().map(|c| c.id.clone()).collect::<Vec<_>>());
        let updated = pipeline.store.get_kb_source(&source.id).unwrap().unwrap();
        assert_eq!(updated.created_at, source.created_at);
        assert!(updated.raw_content.contains("cats"));
    }

    #[tokio::test]
    async fn search_truncates_to_limit() {
        let pipeline = pipeline_with_embedder();
        let folder = GroupFolder::from("acme");
        for i in 0..5 {
            pipeline
                .ingest_text(
                    &folder,
                    &format!("Cats {i}"),
                    &format!("All about cats and their habits, take {i}."),
                    vec![],
                )
                .await
                .unwrap();
        }

        let hits = pipeline
            .search(&folder, "cat behavior", Some(2), None, false)
            .await
            .unwrap();
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn normalize_url_lowercases_and_strips_tracking_params() {
        assert_eq!(
            normalize_url("HTTP://Example.com/p?utm_source=x"),
            normalize_url("http://example.com/p")
        );
        assert_eq!(normalize_url("https://Example.com/p/"), "https://example.com/p");
        assert_eq!(
            normalize_url("https://example.com/p?a=1&utm_campaign=y&fbclid=z"),
            "https://example.com/p?a=1"
        );
    }

    #[tokio::test]
    async fn search_with_no_embedder_returns_empty() {
        let store = Arc::new(Store::open_in_memory().unwrap());
        let pipeline = KbPipeline::new(store, None);
        let folder = GroupFolder::from("acme");
        let hits = pipeline.search(&folder, "anything", None, None, false).await.unwrap();
        assert!(hits.is_empty());
    }
}
