//! Vector Index - 인메모리 벡터 인덱스
//!
//! 패시지와 임베딩 쌍을 보관하고 코사인 유사도로 최근접 검색을 수행합니다.
//! 프로세스 재시작 시 인덱스는 유지되지 않습니다.

use anyhow::{bail, Context, Result};
use serde::Serialize;

use crate::embedding::EmbeddingProvider;

use super::document::Passage;

// ============================================================================
// Types
// ============================================================================

/// 인덱스 엔트리 (패시지 + 임베딩)
#[derive(Debug, Clone)]
pub struct IndexedPassage {
    pub passage: Passage,
    pub embedding: Vec<f32>,
}

/// 검색 결과
#[derive(Debug, Clone, Serialize)]
pub struct ScoredPassage {
    pub passage: Passage,
    /// 코사인 유사도 (-1.0 ~ 1.0, 높을수록 유사)
    pub score: f32,
}

/// 검색 결과 목록 (점수 내림차순, 최대 k개)
pub type RetrievalResult = Vec<ScoredPassage>;

// ============================================================================
// VectorIndex
// ============================================================================

/// 인메모리 벡터 인덱스
///
/// 모든 임베딩은 같은 차원이어야 합니다. 첫 엔트리가 차원을 결정합니다.
#[derive(Debug, Clone, Default)]
pub struct VectorIndex {
    entries: Vec<IndexedPassage>,
    dimension: Option<usize>,
}

impl VectorIndex {
    /// 빈 인덱스 생성
    pub fn new() -> Self {
        Self::default()
    }

    /// 패시지를 임베딩하여 인덱스 생성
    ///
    /// 패시지마다 임베딩을 하나씩 계산합니다. 하나라도 실패하면 전체가 실패합니다.
    pub async fn build(passages: Vec<Passage>, embedder: &dyn EmbeddingProvider) -> Result<Self> {
        let texts: Vec<String> = passages.iter().map(|p| p.text.clone()).collect();
        let embeddings = embedder
            .embed_batch(&texts)
            .await
            .with_context(|| format!("Failed to embed passages with {}", embedder.name()))?;

        if embeddings.len() != passages.len() {
            bail!(
                "Embedder returned {} vectors for {} passages",
                embeddings.len(),
                passages.len()
            );
        }

        let mut index = Self::new();
        for (passage, embedding) in passages.into_iter().zip(embeddings) {
            index.insert(passage, embedding)?;
        }

        tracing::debug!(
            "Built vector index: {} passages (dimension: {:?})",
            index.len(),
            index.dimension
        );
        Ok(index)
    }

    /// 엔트리 추가
    pub fn insert(&mut self, passage: Passage, embedding: Vec<f32>) -> Result<()> {
        if embedding.is_empty() {
            bail!("Empty embedding for passage {} of '{}'", passage.index, passage.source_id);
        }

        match self.dimension {
            Some(dim) if dim != embedding.len() => bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                dim,
                embedding.len()
            ),
            Some(_) => {}
            None => self.dimension = Some(embedding.len()),
        }

        self.entries.push(IndexedPassage { passage, embedding });
        Ok(())
    }

    /// 다른 인덱스의 엔트리를 모두 추가 (누적 수집)
    ///
    /// 차원이 다르면 아무것도 추가하지 않고 실패합니다.
    pub fn extend(&mut self, other: VectorIndex) -> Result<()> {
        if let (Some(mine), Some(theirs)) = (self.dimension, other.dimension) {
            if mine != theirs {
                bail!(
                    "Cannot merge indexes of different dimension ({} vs {})",
                    mine,
                    theirs
                );
            }
        }

        if self.dimension.is_none() {
            self.dimension = other.dimension;
        }
        self.entries.extend(other.entries);
        Ok(())
    }

    /// 최근접 검색
    ///
    /// 점수가 `score_threshold` 미만인 패시지는 제외하고, 상위 `k`개를 반환합니다.
    /// 조건을 만족하는 패시지가 k개보다 적으면 적게 반환합니다.
    pub fn search(&self, query_embedding: &[f32], k: usize, score_threshold: f32) -> RetrievalResult {
        if k == 0 || self.entries.is_empty() {
            return Vec::new();
        }

        let mut scored: Vec<ScoredPassage> = self
            .entries
            .iter()
            .map(|entry| ScoredPassage {
                passage: entry.passage.clone(),
                score: cosine_similarity(query_embedding, &entry.embedding),
            })
            .filter(|s| s.score >= score_threshold)
            .collect();

        // 안정 정렬: 동점이면 삽입 순서 유지
        scored.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }

    /// 패시지 수
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 임베딩 차원 (비어있으면 None)
    pub fn dimension(&self) -> Option<usize> {
        self.dimension
    }
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 결과는 -1.0 ~ 1.0 범위입니다. 길이가 다르거나 영벡터면 0.0을 반환합니다.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

// ============================================================================
// Tests
// ============================================================================
