//! Retriever - 임계값 기반 유사도 검색
//!
//! `VectorIndex::search` 위에 결과 수(k)와 최소 유사도를 고정 설정으로 묶습니다.

use std::sync::Arc;

use anyhow::{Context, Result};

use crate::embedding::EmbeddingProvider;
use crate::error::{EngineError, EngineResult};

use super::vector::{RetrievalResult, VectorIndex};

/// 검색기 설정
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetrieverConfig {
    /// 최대 결과 수
    pub k: usize,
    /// 최소 유사도 점수
    pub score_threshold: f32,
}

impl Default for RetrieverConfig {
    fn default() -> Self {
        Self {
            k: 3,
            score_threshold: 0.5,
        }
    }
}

impl RetrieverConfig {
    /// 설정 검증: k > 0, -1.0 <= score_threshold <= 1.0
    pub fn validate(&self) -> EngineResult<()> {
        if self.k == 0 {
            return Err(EngineError::configuration("k must be positive"));
        }
        if !(-1.0..=1.0).contains(&self.score_threshold) {
            return Err(EngineError::configuration(format!(
                "score_threshold must be within [-1.0, 1.0], got {}",
                self.score_threshold
            )));
        }
        Ok(())
    }
}

/// 유사도 검색기
///
/// 자체 상태 없이 임베더와 설정만 보관합니다.
#[derive(Clone)]
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    config: RetrieverConfig,
}

impl Retriever {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, config: RetrieverConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { embedder, config })
    }

    pub fn config(&self) -> &RetrieverConfig {
        &self.config
    }

    /// 질문과 관련된 패시지 검색
    pub async fn retrieve(&self, index: &VectorIndex, question: &str) -> Result<RetrievalResult> {
        if index.is_empty() {
            return Ok(Vec::new());
        }

        let query_embedding = self
            .embedder
            .embed(question)
            .await
            .with_context(|| format!("Failed to embed question with {}", self.embedder.name()))?;

        let results = index.search(&query_embedding, self.config.k, self.config.score_threshold);

        tracing::debug!(
            "Retrieved {} passages (k={}, threshold={})",
            results.len(),
            self.config.k,
            self.config.score_threshold
        );
        Ok(results)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::Passage;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// 'x' 개수와 'y' 개수로 2차원 벡터를 만드는 임베더
    #[derive(Default)]
    struct CountingEmbedder {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl EmbeddingProvider for CountingEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            let x = text.matches('x').count() as f32;
            let y = text.matches('y').count() as f32;
            Ok(vec![x, y])
        }

        fn name(&self) -> &str {
            "counting"
        }
    }

    fn passage(index: usize, text: &str) -> Passage {
        Passage {
            source_id: "doc".into(),
            page: None,
            index,
            start: 0,
            text: text.into(),
        }
    }

    #[test]
    fn test_config_validation() {
        assert!(RetrieverConfig::default().validate().is_ok());
        assert!(RetrieverConfig { k: 0, score_threshold: 0.5 }.validate().is_err());
        assert!(RetrieverConfig { k: 3, score_threshold: 1.5 }.validate().is_err());
        assert!(RetrieverConfig { k: 3, score_threshold: f32::NAN }.validate().is_err());
    }

    #[tokio::test]
    async fn test_retrieve_empty_index_skips_embedding() {
        let embedder = Arc::new(CountingEmbedder::default());
        let retriever = Retriever::new(embedder.clone(), RetrieverConfig::default()).unwrap();

        let results = retriever.retrieve(&VectorIndex::new(), "xx").await.unwrap();
        assert!(results.is_empty());
        assert_eq!(embedder.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retrieve_applies_threshold_and_k() {
        let embedder = Arc::new(CountingEmbedder::default());
        let mut index = VectorIndex::new();
        index.insert(passage(0, "xxx"), vec![3.0, 0.0]).unwrap();
        index.insert(passage(1, "yyy"), vec![0.0, 3.0]).unwrap();
        index.insert(passage(2, "xxy"), vec![2.0, 1.0]).unwrap();

        let retriever = Retriever::new(
            embedder,
            RetrieverConfig {
                k: 1,
                score_threshold: 0.5,
            },
        )
        .unwrap();

        let results = retriever.retrieve(&index, "x").await.unwrap();
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].passage.text, "xxx");
    }
}
