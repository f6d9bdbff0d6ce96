//! 설정 모듈
//!
//! 엔진 동작과 Ollama 연결 설정을 TOML 파일에서 읽습니다.
//! 저장 위치: <data_local_dir>/.docchat/config.toml
//!
//! ```toml
//! [engine]
//! chunk_size = 256
//! chunk_overlap = 50
//! k = 3
//! score_threshold = 0.5
//!
//! [ollama]
//! base_url = "http://localhost:11434"
//! chat_model = "mistral"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};
use crate::knowledge::{ChunkConfig, RetrieverConfig};
use crate::llm::PromptTemplate;

/// Ollama 주소 환경변수 (ollama CLI와 동일)
pub const OLLAMA_HOST_ENV: &str = "OLLAMA_HOST";

/// 기본 프롬프트 템플릿
pub const DEFAULT_PROMPT_TEMPLATE: &str = "\
[INST] You are an assistant for question-answering tasks. Use the following pieces of retrieved context \
to answer the question. If you don't know the answer, just say that you don't know. Use three sentences \
maximum and keep the answer concise. [/INST]
[INST] Question: {question}
Context: {context}
Answer: [/INST]";

/// 문서가 아직 없을 때의 응답
pub const DEFAULT_NO_INDEX_MESSAGE: &str = "Please, add a PDF document first.";

/// 관련 컨텍스트가 없을 때의 응답
pub const DEFAULT_NO_CONTEXT_MESSAGE: &str = "I'm forwarding this to the help desk.";

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.docchat/)
pub fn get_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".docchat")
}

/// 기본 설정 파일 경로
pub fn default_config_path() -> PathBuf {
    get_data_dir().join("config.toml")
}

// ============================================================================
// EngineConfig
// ============================================================================

/// 대화 엔진 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 청크 겹침 (문자 수)
    pub chunk_overlap: usize,
    /// 검색 결과 최대 개수
    pub k: usize,
    /// 최소 유사도 점수
    pub score_threshold: f32,
    /// `{question}`, `{context}` 자리표시자를 포함한 프롬프트
    pub prompt_template: String,
    /// 문서가 없을 때의 고정 응답
    pub fallback_no_index_message: String,
    /// 관련 패시지가 없을 때의 고정 응답
    pub fallback_no_context_message: String,
    /// 이전 대화를 이용해 질문을 독립 질문으로 재작성할지 여부
    pub condense_question: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let chunk = ChunkConfig::default();
        let retriever = RetrieverConfig::default();
        Self {
            chunk_size: chunk.chunk_size,
            chunk_overlap: chunk.chunk_overlap,
            k: retriever.k,
            score_threshold: retriever.score_threshold,
            prompt_template: DEFAULT_PROMPT_TEMPLATE.to_string(),
            fallback_no_index_message: DEFAULT_NO_INDEX_MESSAGE.to_string(),
            fallback_no_context_message: DEFAULT_NO_CONTEXT_MESSAGE.to_string(),
            condense_question: true,
        }
    }
}

impl EngineConfig {
    pub fn chunk_config(&self) -> ChunkConfig {
        ChunkConfig::new(self.chunk_size, self.chunk_overlap)
    }

    pub fn retriever_config(&self) -> RetrieverConfig {
        RetrieverConfig {
            k: self.k,
            score_threshold: self.score_threshold,
        }
    }

    /// 전체 설정 검증
    pub fn validate(&self) -> EngineResult<()> {
        self.chunk_config().validate()?;
        self.retriever_config().validate()?;
        PromptTemplate::new(&self.prompt_template)?;

        if self.fallback_no_index_message.trim().is_empty()
            || self.fallback_no_context_message.trim().is_empty()
        {
            return Err(EngineError::configuration("fallback messages must not be empty"));
        }
        Ok(())
    }
}

// ============================================================================
// OllamaConfig
// ============================================================================

/// Ollama 서버 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    /// 서버 주소
    pub base_url: String,
    /// 답변 생성 모델
    pub chat_model: String,
    /// 임베딩 모델
    pub embed_model: String,
    /// 생성 온도 (0이면 결정적)
    pub temperature: f32,
    /// HTTP 요청 타임아웃 (초)
    pub timeout_secs: u64,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:11434".to_string(),
            chat_model: "mistral".to_string(),
            embed_model: "nomic-embed-text".to_string(),
            temperature: 0.0,
            timeout_secs: 120,
        }
    }
}

impl OllamaConfig {
    /// OLLAMA_HOST 값 적용 ("host:port" 형식이면 http:// 추가)
    pub fn apply_host(&mut self, host: &str) {
        let host = host.trim().trim_end_matches('/');
        if host.is_empty() {
            return;
        }

        self.base_url = if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{}", host)
        };
    }
}

// ============================================================================
// AppConfig
// ============================================================================

/// 전체 애플리케이션 설정
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub ollama: OllamaConfig,
}

impl AppConfig {
    /// TOML 문자열 파싱
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(content).context("Failed to parse config")?;
        config.engine.validate()?;
        Ok(config)
    }

    /// 설정 파일 읽기
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {:?}", path))?;
        Self::from_toml(&content).with_context(|| format!("Invalid config file: {:?}", path))
    }

    /// 설정 로드
    ///
    /// 우선순위:
    /// 1. 지정된 경로 (없으면 에러)
    /// 2. 기본 경로 (~/.docchat/config.toml, 있을 때만)
    /// 3. 기본값
    ///
    /// 이후 `OLLAMA_HOST` 환경변수로 서버 주소를 덮어씁니다.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let default_path = default_config_path();
                if default_path.exists() {
                    Self::from_file(&default_path)?
                } else {
                    tracing::debug!("No config file at {:?}, using defaults", default_path);
                    Self::default()
                }
            }
        };

        if let Ok(host) = std::env::var(OLLAMA_HOST_ENV) {
            tracing::debug!("Using Ollama host from {}", OLLAMA_HOST_ENV);
            config.ollama.apply_host(&host);
        }

        Ok(config)
    }
}

// ============================================================================
// Tests
// ============================================================================
