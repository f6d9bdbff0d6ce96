//! docchat-rag - 문서 기반 대화형 질의응답 엔진
//!
//! 문서를 고정 크기 패시지로 나누어 인메모리 벡터 인덱스에 임베딩하고,
//! 질문과 유사한 패시지를 검색해 언어 모델로 답변을 생성합니다.
//! 관련 패시지가 없으면 고정 응답으로 대체합니다.

pub mod cli;
pub mod collector;
pub mod config;
pub mod conversation;
pub mod embedding;
pub mod error;
pub mod extractor;
pub mod knowledge;
pub mod llm;

// Re-exports
pub use config::{get_data_dir, AppConfig, EngineConfig, OllamaConfig};
pub use conversation::{
    Answer, AnswerKind, ConversationEngine, EngineState, History, IngestReport, SessionRegistry,
    Turn,
};
pub use embedding::{EmbeddingProvider, OllamaEmbedding};
pub use error::{EngineError, EngineResult};
pub use knowledge::{
    ChunkConfig, Chunker, Document, Passage, RetrievalResult, Retriever, RetrieverConfig,
    ScoredPassage, SlidingWindowChunker, VectorIndex,
};
pub use llm::{LanguageModel, OllamaChat, PromptTemplate};
