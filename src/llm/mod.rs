//! LLM 모듈 - 답변 생성
//!
//! 언어 모델 인터페이스와 Ollama 구현체, 프롬프트 템플릿을 제공합니다.

mod ollama;
mod prompt;

use anyhow::Result;
use async_trait::async_trait;

use crate::conversation::Turn;

pub use ollama::OllamaChat;
pub use prompt::{
    build_condense_prompt, format_context, format_history, PromptTemplate, CONTEXT_PLACEHOLDER,
    QUESTION_PLACEHOLDER,
};

// ============================================================================
// LanguageModel Trait
// ============================================================================

/// 언어 모델 트레이트
///
/// 지연 시간과 가용성은 구현체의 책임이며, 엔진은 실패를 그대로 전달합니다.
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// 이전 대화를 컨텍스트로 프롬프트에 대한 답변 생성
    async fn generate(&self, prompt: &str, history: &[Turn]) -> Result<String>;

    /// 이전 대화를 이용해 후속 질문을 독립 질문으로 재작성
    ///
    /// 기본 구현은 질문을 그대로 반환합니다.
    async fn condense_question(&self, question: &str, _history: &[Turn]) -> Result<String> {
        Ok(question.to_string())
    }

    /// 모델 이름
    fn name(&self) -> &str;
}
