//! Ollama 채팅 모델
//!
//! `POST {base_url}/api/chat` 로 답변을 생성합니다.
//! 이전 대화는 user/assistant 메시지로 변환되어 프롬프트 앞에 놓입니다.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::OllamaConfig;
use crate::conversation::Turn;

use super::prompt::build_condense_prompt;
use super::LanguageModel;

// ============================================================================
// Request / Response
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

impl ChatMessage {
    fn user(content: &str) -> Self {
        Self {
            role: "user".to_string(),
            content: content.to_string(),
        }
    }

    fn assistant(content: &str) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.to_string(),
        }
    }
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    stream: bool,
    options: ChatOptions,
}

#[derive(Debug, Serialize)]
struct ChatOptions {
    temperature: f32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

/// 이전 대화 + 현재 프롬프트로 메시지 목록 구성
fn build_messages(prompt: &str, history: &[Turn]) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(history.len() * 2 + 1);
    for turn in history {
        messages.push(ChatMessage::user(&turn.question));
        messages.push(ChatMessage::assistant(&turn.answer));
    }
    messages.push(ChatMessage::user(prompt));
    messages
}

// ============================================================================
// OllamaChat
// ============================================================================

/// Ollama 채팅 모델 구현체
#[derive(Debug, Clone)]
pub struct OllamaChat {
    client: reqwest::Client,
    base_url: String,
    model: String,
    temperature: f32,
}

impl OllamaChat {
    /// 설정으로 생성
    pub fn new(config: &OllamaConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.chat_model.clone(),
            temperature: config.temperature,
        })
    }

    /// Ollama 서버 응답 여부 확인
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/api/tags", self.base_url);

        match self.client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::debug!("Ollama health check failed: {}", e);
                Ok(false)
            }
        }
    }

    /// 서버에 설치된 모델 목록
    pub async fn list_models(&self) -> Result<Vec<String>> {
        let url = format!("{}/api/tags", self.base_url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Ollama connection error (is Ollama running at {}?)", self.base_url))?;

        let status = response.status();
        if !status.is_success() {
            bail!("Ollama tags error ({})", status);
        }

        let tags: TagsResponse = response
            .json()
            .await
            .context("Failed to parse model list")?;
        Ok(tags.models.into_iter().map(|m| m.name).collect())
    }

    async fn chat(&self, messages: Vec<ChatMessage>) -> Result<String> {
        let url = format!("{}/api/chat", self.base_url);
        let request = ChatRequest {
            model: &self.model,
            messages,
            stream: false,
            options: ChatOptions {
                temperature: self.temperature,
            },
        };

        let response = self
            .client
            .post(&url)
            .json(&request)
            .send()
            .await
            .with_context(|| format!("Ollama connection error (is Ollama running at {}?)", self.base_url))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read chat response body")?;

        if !status.is_success() {
            bail!("Ollama chat error ({}): {}", status, body);
        }

        let parsed: ChatResponse =
            serde_json::from_str(&body).context("Failed to parse chat response")?;
        Ok(parsed.message.content.trim().to_string())
    }
}

#[async_trait]
impl LanguageModel for OllamaChat {
    async fn generate(&self, prompt: &str, history: &[Turn]) -> Result<String> {
        tracing::debug!(
            "Generating with {} ({} prior turns)",
            self.model,
            history.len()
        );
        self.chat(build_messages(prompt, history)).await
    }

    async fn condense_question(&self, question: &str, history: &[Turn]) -> Result<String> {
        if history.is_empty() {
            return Ok(question.to_string());
        }

        let prompt = build_condense_prompt(question, history);
        let condensed = self.chat(vec![ChatMessage::user(&prompt)]).await?;

        if condensed.is_empty() {
            tracing::warn!("Model returned an empty standalone question, using original");
            return Ok(question.to_string());
        }
        Ok(condensed)
    }

    fn name(&self) -> &str {
        &self.model
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_messages_interleaves_history() {
        let history = vec![Turn::new("q1", "a1"), Turn::new("q2", "a2")];
        let messages = build_messages("prompt", &history);

        let roles: Vec<&str> = messages.iter().map(|m| m.role.as_str()).collect();
        assert_eq!(roles, vec!["user", "assistant", "user", "assistant", "user"]);
        assert_eq!(messages[0].content, "q1");
        assert_eq!(messages[3].content, "a2");
        assert_eq!(messages[4].content, "prompt");
    }

    #[test]
    fn test_request_serialization() {
        let request = ChatRequest {
            model: "mistral",
            messages: build_messages("hi", &[]),
            stream: false,
            options: ChatOptions { temperature: 0.0 },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "model": "mistral",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": false,
                "options": {"temperature": 0.0}
            })
        );
    }

    #[test]
    fn test_parse_chat_response() {
        let body = r#"{"model":"mistral","message":{"role":"assistant","content":" Paris. "},"done":true}"#;
        let parsed: ChatResponse = serde_json::from_str(body).unwrap();
        assert_eq!(parsed.message.content, " Paris. ");
    }

    #[tokio::test]
    async fn test_condense_without_history_skips_request() {
        // 연결할 수 없는 주소여도 기록이 없으면 요청하지 않음
        let config = OllamaConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let chat = OllamaChat::new(&config).unwrap();
        let question = chat.condense_question("What is it?", &[]).await.unwrap();
        assert_eq!(question, "What is it?");
    }

    #[tokio::test]
    async fn test_health_check_unreachable() {
        let config = OllamaConfig {
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
            ..Default::default()
        };
        let chat = OllamaChat::new(&config).unwrap();
        assert!(!chat.health_check().await.unwrap());
        assert!(chat.generate("hi", &[]).await.is_err());
    }
}
