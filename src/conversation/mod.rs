//! Conversation 모듈 - 대화형 질의응답
//!
//! - ConversationEngine: 수집/질문/초기화 상태 머신
//! - History: 질문-답변 기록
//! - SessionRegistry: 세션별 독립 엔진

mod engine;
mod history;
mod session;

// Re-exports
pub use engine::{Answer, AnswerKind, ConversationEngine, EngineState, IngestReport};
pub use history::{History, Turn};
pub use session::SessionRegistry;
