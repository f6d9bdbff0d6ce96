//! Knowledge 모듈 - 수집 및 검색 파이프라인
//!
//! - Document/Passage: 문서와 검색 단위 패시지
//! - Chunker: 고정 크기 슬라이딩 윈도우 분할
//! - VectorIndex: 인메모리 코사인 유사도 인덱스
//! - Retriever: k / 임계값 기반 검색

mod chunker;
mod document;
mod retriever;
mod vector;

// Re-exports
pub use chunker::{ChunkConfig, Chunker, SlidingWindowChunker, TextWindow};
pub use document::{Document, Page, Passage};
pub use retriever::{Retriever, RetrieverConfig};
pub use vector::{
    cosine_similarity, IndexedPassage, RetrievalResult, ScoredPassage, VectorIndex,
};
