//! 엔진 에러 타입
//!
//! 공개 연산(`ingest`, `ask`) 경계에서 반환되는 에러입니다.
//! "문서 없음", "컨텍스트 없음"은 에러가 아니라 정상 응답으로 처리됩니다.

use thiserror::Error;

/// 엔진 결과 타입
pub type EngineResult<T> = std::result::Result<T, EngineError>;

/// 대화 엔진 에러
#[derive(Debug, Error)]
pub enum EngineError {
    /// 문서 수집 실패 (빈 텍스트, 청크 없음, 임베딩/인덱스 생성 실패)
    #[error("Ingestion failed for '{source_id}': {reason}")]
    Ingestion { source_id: String, reason: String },

    /// 질문 임베딩 실패
    #[error("Retrieval failed: {0}")]
    Retrieval(String),

    /// 언어 모델 호출 실패
    #[error("Generation failed: {0}")]
    Generation(String),

    /// 잘못된 설정 (생성 시점에 즉시 실패)
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl EngineError {
    pub fn ingestion(source_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Ingestion {
            source_id: source_id.into(),
            reason: reason.into(),
        }
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// anyhow 에러 체인을 한 줄 메시지로 변환
    pub(crate) fn describe(err: &anyhow::Error) -> String {
        format!("{:#}", err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ingestion_error_message() {
        let err = EngineError::ingestion("manual.pdf", "no text extracted");
        assert_eq!(
            err.to_string(),
            "Ingestion failed for 'manual.pdf': no text extracted"
        );
    }

    #[test]
    fn test_describe_keeps_context_chain() {
        let err = anyhow::anyhow!("connection refused").context("Failed to call Ollama");
        assert_eq!(
            EngineError::describe(&err),
            "Failed to call Ollama: connection refused"
        );
    }
}
