//! 프롬프트 템플릿
//!
//! 검색된 패시지로 답변 생성 프롬프트를 만들고,
//! 이전 대화로 후속 질문을 독립 질문으로 바꾸는 프롬프트를 만듭니다.

use std::sync::OnceLock;

use regex::{Captures, Regex};

use crate::conversation::Turn;
use crate::error::{EngineError, EngineResult};
use crate::knowledge::ScoredPassage;

/// 질문 자리표시자
pub const QUESTION_PLACEHOLDER: &str = "{question}";
/// 컨텍스트 자리표시자
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// 후속 질문 재작성 프롬프트
const CONDENSE_QUESTION_TEMPLATE: &str = "\
Given the following conversation and a follow up question, rephrase the follow up question to be a standalone question, in its original language.

Chat History:
{chat_history}
Follow Up Input: {question}
Standalone question:";

fn placeholder_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{(question|context)\}").expect("Invalid regex"))
}

// ============================================================================
// PromptTemplate
// ============================================================================

/// 답변 생성 프롬프트 템플릿
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptTemplate {
    template: String,
}

impl PromptTemplate {
    /// 템플릿 생성 (`{question}`, `{context}` 모두 필요)
    pub fn new(template: &str) -> EngineResult<Self> {
        for placeholder in [QUESTION_PLACEHOLDER, CONTEXT_PLACEHOLDER] {
            if !template.contains(placeholder) {
                return Err(EngineError::configuration(format!(
                    "prompt_template must contain {}",
                    placeholder
                )));
            }
        }

        Ok(Self {
            template: template.to_string(),
        })
    }

    /// 질문과 컨텍스트로 프롬프트 생성
    ///
    /// 한 번에 치환하므로 질문 안에 `{context}` 같은 문자열이 있어도 다시 치환되지 않습니다.
    pub fn render(&self, question: &str, context: &str) -> String {
        placeholder_re()
            .replace_all(&self.template, |caps: &Captures| match &caps[1] {
                "question" => question.to_string(),
                _ => context.to_string(),
            })
            .into_owned()
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 검색된 패시지를 컨텍스트로 연결
pub fn format_context(passages: &[ScoredPassage]) -> String {
    passages
        .iter()
        .map(|p| p.passage.text.as_str())
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// 대화 기록을 텍스트로 변환
pub fn format_history(history: &[Turn]) -> String {
    history
        .iter()
        .map(|turn| format!("Human: {}\nAssistant: {}", turn.question, turn.answer))
        .collect::<Vec<_>>()
        .join("\n")
}

/// 후속 질문 재작성 프롬프트 생성
pub fn build_condense_prompt(question: &str, history: &[Turn]) -> String {
    // {chat_history}가 질문보다 앞에 있으므로 질문을 먼저 치환
    CONDENSE_QUESTION_TEMPLATE
        .replacen(QUESTION_PLACEHOLDER, question, 1)
        .replacen("{chat_history}", &format_history(history), 1)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::knowledge::Passage;

    fn scored(text: &str) -> ScoredPassage {
        ScoredPassage {
            passage: Passage {
                source_id: "doc".into(),
                page: None,
                index: 0,
                start: 0,
                text: text.into(),
            },
            score: 0.9,
        }
    }

    #[test]
    fn test_template_requires_placeholders() {
        assert!(PromptTemplate::new("Q: {question} C: {context}").is_ok());
        assert!(PromptTemplate::new("Q: {question}").is_err());
        assert!(PromptTemplate::new("C: {context}").is_err());
    }

    #[test]
    fn test_render() {
        let template = PromptTemplate::new("Question: {question}\nContext: {context}").unwrap();
        let prompt = template.render("Where?", "Paris is in France.");
        assert_eq!(prompt, "Question: Where?\nContext: Paris is in France.");
    }

    #[test]
    fn test_render_does_not_expand_placeholders_in_input() {
        let template = PromptTemplate::new("{question} | {context}").unwrap();
        let prompt = template.render("what is {context}?", "ctx");
        assert_eq!(prompt, "what is {context}? | ctx");
    }

    #[test]
    fn test_default_template_is_valid() {
        let template = PromptTemplate::new(crate::config::DEFAULT_PROMPT_TEMPLATE).unwrap();
        let prompt = template.render("Q1", "C1");
        assert!(prompt.contains("Question: Q1"));
        assert!(prompt.contains("Context: C1"));
        assert!(prompt.contains("three sentences"));
    }

    #[test]
    fn test_format_context() {
        let context = format_context(&[scored("first"), scored("second")]);
        assert_eq!(context, "first\n\nsecond");
        assert_eq!(format_context(&[]), "");
    }

    #[test]
    fn test_condense_prompt() {
        let history = vec![Turn::new("Who wrote it?", "Victor Hugo.")];
        let prompt = build_condense_prompt("When was he born?", &history);

        assert!(prompt.contains("Human: Who wrote it?\nAssistant: Victor Hugo."));
        assert!(prompt.contains("Follow Up Input: When was he born?"));
        assert!(prompt.ends_with("Standalone question:"));
    }
}
