//! 대화 기록
//!
//! 질문-답변 쌍(Turn)의 추가 전용 목록입니다.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// 질문-답변 한 쌍
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Turn {
    pub question: String,
    pub answer: String,
    /// 기록 시각
    pub asked_at: DateTime<Utc>,
}

impl Turn {
    pub fn new(question: impl Into<String>, answer: impl Into<String>) -> Self {
        Self {
            question: question.into(),
            answer: answer.into(),
            asked_at: Utc::now(),
        }
    }
}

/// 대화 기록 (추가 전용, `clear`로만 비움)
#[derive(Debug, Clone, Default)]
pub struct History {
    turns: Vec<Turn>,
}

impl History {
    pub fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }

    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn clear(&mut self) {
        self.turns.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_history_keeps_order() {
        let mut history = History::default();
        history.push(Turn::new("q1", "a1"));
        history.push(Turn::new("q2", "a2"));

        let questions: Vec<&str> = history.turns().iter().map(|t| t.question.as_str()).collect();
        assert_eq!(questions, vec!["q1", "q2"]);
        assert!(history.turns()[0].asked_at <= history.turns()[1].asked_at);

        history.clear();
        assert!(history.is_empty());
    }
}
