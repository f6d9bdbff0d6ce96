//! Text Chunking Module
//!
//! 고정 크기 슬라이딩 윈도우로 텍스트를 분할합니다.
//! 길이와 위치는 바이트가 아닌 문자(char) 단위로 계산합니다.

use crate::error::{EngineError, EngineResult};

use super::document::{Document, Passage};

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkConfig {
    /// 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 이전 청크와 겹치는 문자 수
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 256,
            chunk_overlap: 50,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// 설정 검증: 0 < chunk_overlap < chunk_size
    pub fn validate(&self) -> EngineResult<()> {
        if self.chunk_size == 0 {
            return Err(EngineError::configuration("chunk_size must be positive"));
        }
        if self.chunk_overlap == 0 {
            return Err(EngineError::configuration("chunk_overlap must be positive"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(EngineError::configuration(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }

    /// 윈도우 이동 간격
    pub fn stride(&self) -> usize {
        self.chunk_size - self.chunk_overlap
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 분할된 텍스트 구간
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextWindow {
    /// 시작 위치 (문자 단위)
    pub start: usize,
    /// 구간 텍스트
    pub text: String,
}

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 텍스트를 순서대로 분할
    fn split(&self, text: &str) -> Vec<TextWindow>;

    /// 청커 이름
    fn name(&self) -> &'static str;

    /// 문서를 패시지로 분할
    ///
    /// 페이지 경계를 넘는 패시지는 만들지 않으며, 빈 페이지는 건너뜁니다.
    fn split_document(&self, document: &Document) -> Vec<Passage> {
        let mut passages = Vec::new();

        for page in &document.pages {
            if page.text.trim().is_empty() {
                continue;
            }

            for window in self.split(&page.text) {
                passages.push(Passage {
                    source_id: document.source_id.clone(),
                    page: page.number,
                    index: passages.len(),
                    start: window.start,
                    text: window.text,
                });
            }
        }

        passages
    }
}

// ============================================================================
// SlidingWindowChunker
// ============================================================================

/// 고정 크기 윈도우 청커
///
/// 각 윈도우는 `chunk_size - chunk_overlap` 문자씩 전진합니다.
/// 마지막 윈도우를 제외한 모든 청크는 정확히 `chunk_size` 문자이며,
/// 두 번째 청크부터는 이전 청크의 마지막 `chunk_overlap` 문자로 시작합니다.
#[derive(Debug, Clone)]
pub struct SlidingWindowChunker {
    config: ChunkConfig,
}

impl SlidingWindowChunker {
    /// 설정으로 생성 (잘못된 설정은 즉시 실패)
    pub fn new(config: ChunkConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }
}

impl Chunker for SlidingWindowChunker {
    fn split(&self, text: &str) -> Vec<TextWindow> {
        if text.is_empty() {
            return vec![];
        }

        // 문자 인덱스 -> 바이트 오프셋 (끝 위치 포함)
        let offsets: Vec<usize> = text
            .char_indices()
            .map(|(i, _)| i)
            .chain(std::iter::once(text.len()))
            .collect();
        let total = offsets.len() - 1;

        let mut windows = Vec::with_capacity(total / self.config.stride() + 1);
        let mut start = 0;

        loop {
            let end = (start + self.config.chunk_size).min(total);
            windows.push(TextWindow {
                start,
                text: text[offsets[start]..offsets[end]].to_string(),
            });

            if end >= total {
                break;
            }
            start += self.config.stride();
        }

        windows
    }

    fn name(&self) -> &'static str {
        "SlidingWindowChunker"
    }
}

// ============================================================================
// Tests
// ============================================================================
