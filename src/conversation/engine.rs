//! Conversation Engine - 검색 + 생성 오케스트레이션
//!
//! 상태:
//! - `Uninitialized`: 인덱스 없음 (문서 없음 응답)
//! - `Ready`: 인덱스 생성됨 (검색 후 답변)
//!
//! `clear`로 다시 `Uninitialized`가 됩니다.
//!
//! 인덱스 교체와 대화 기록 추가는 인스턴스별 Mutex 안에서만 일어납니다.
//! `ask`는 조회부터 기록 추가까지 락을 잡으므로 같은 엔진의 질문은 순서대로 처리됩니다.

use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;

use crate::config::EngineConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::{EngineError, EngineResult};
use crate::knowledge::{
    Chunker, Document, RetrievalResult, Retriever, SlidingWindowChunker, VectorIndex,
};
use crate::llm::{format_context, LanguageModel, PromptTemplate};

use super::history::{History, Turn};

// ============================================================================
// Types
// ============================================================================

/// 엔진 상태
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EngineState {
    /// 인덱스 없음
    Uninitialized,
    /// 질문에 답할 수 있음
    Ready,
}

/// 답변 종류
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AnswerKind {
    /// 검색된 컨텍스트로 모델이 생성
    Generated,
    /// 문서가 없어 고정 응답
    NoDocument,
    /// 임계값을 넘는 패시지가 없어 고정 응답
    NoContext,
}

/// 질문 처리 결과
#[derive(Debug, Clone, Serialize)]
pub struct Answer {
    /// 답변 텍스트
    pub text: String,
    pub kind: AnswerKind,
    /// 검색에 사용된 독립 질문 (인덱스가 없으면 None)
    pub generated_question: Option<String>,
    /// 검색된 패시지 (점수 내림차순)
    pub sources: RetrievalResult,
    pub elapsed: Duration,
}

/// 수집 결과
#[derive(Debug, Clone, Serialize)]
pub struct IngestReport {
    pub source_id: String,
    /// 이번 문서에서 생성된 패시지 수
    pub passages: usize,
    /// 인덱스 전체 패시지 수
    pub indexed_total: usize,
    pub elapsed: Duration,
}

#[derive(Default)]
struct Inner {
    index: Option<VectorIndex>,
    history: History,
}

// ============================================================================
// ConversationEngine
// ============================================================================

/// 대화형 문서 질의응답 엔진
///
/// 인스턴스 하나가 인덱스 하나와 대화 기록 하나를 소유합니다.
/// 세션별로 별도 인스턴스를 사용하면 서로 완전히 독립적입니다.
pub struct ConversationEngine {
    config: EngineConfig,
    chunker: Box<dyn Chunker>,
    retriever: Retriever,
    embedder: Arc<dyn EmbeddingProvider>,
    model: Arc<dyn LanguageModel>,
    template: PromptTemplate,
    inner: Mutex<Inner>,
}

impl ConversationEngine {
    /// 엔진 생성 (잘못된 설정은 즉시 실패)
    pub fn new(
        config: EngineConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        model: Arc<dyn LanguageModel>,
    ) -> EngineResult<Self> {
        config.validate()?;

        let chunker = Box::new(SlidingWindowChunker::new(config.chunk_config())?);
        let retriever = Retriever::new(Arc::clone(&embedder), config.retriever_config())?;
        let template = PromptTemplate::new(&config.prompt_template)?;

        Ok(Self {
            config,
            chunker,
            retriever,
            embedder,
            model,
            template,
            inner: Mutex::new(Inner::default()),
        })
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ------------------------------------------------------------------------
    // Ingestion
    // ------------------------------------------------------------------------

    /// 텍스트 문서 수집
    pub async fn ingest(&self, text: &str, source_id: &str) -> EngineResult<IngestReport> {
        self.ingest_document(&Document::from_text(source_id, text)).await
    }

    /// 문서 수집 (청킹 → 임베딩 → 인덱스 추가)
    ///
    /// 인덱스는 누적됩니다. 실패하면 기존 인덱스와 상태는 그대로 유지됩니다.
    pub async fn ingest_document(&self, document: &Document) -> EngineResult<IngestReport> {
        let started = Instant::now();
        let source_id = document.source_id.as_str();

        if document.is_blank() {
            tracing::warn!("No text extracted from {}", source_id);
            return Err(EngineError::ingestion(source_id, "document contains no text"));
        }

        let passages = self.chunker.split_document(document);
        if passages.is_empty() {
            return Err(EngineError::ingestion(source_id, "no passages produced"));
        }
        let passage_count = passages.len();
        tracing::debug!(
            "Split {} ({} chars) into {} passages ({})",
            source_id,
            document.char_count(),
            passage_count,
            self.chunker.name()
        );

        // 임베딩은 락 밖에서 계산하고, 교체만 락 안에서 수행
        let additions = VectorIndex::build(passages, self.embedder.as_ref())
            .await
            .map_err(|e| EngineError::ingestion(source_id, EngineError::describe(&e)))?;
        tracing::debug!(
            "Embedded {} passages (dimension {:?})",
            additions.len(),
            additions.dimension()
        );

        let mut guard = self.inner.lock().await;
        let indexed_total = match guard.index.as_mut() {
            Some(index) => {
                index
                    .extend(additions)
                    .map_err(|e| EngineError::ingestion(source_id, EngineError::describe(&e)))?;
                index.len()
            }
            None => {
                let total = additions.len();
                guard.index = Some(additions);
                total
            }
        };
        drop(guard);

        let elapsed = started.elapsed();
        tracing::info!(
            "Ingested {} ({} passages, {} indexed) in {:.2?}",
            source_id,
            passage_count,
            indexed_total,
            elapsed
        );

        Ok(IngestReport {
            source_id: source_id.to_string(),
            passages: passage_count,
            indexed_total,
            elapsed,
        })
    }

    // ------------------------------------------------------------------------
    // Query
    // ------------------------------------------------------------------------

    /// 질문에 답변
    pub async fn ask(&self, question: &str) -> EngineResult<String> {
        self.ask_detailed(question).await.map(|answer| answer.text)
    }

    /// 질문에 답변하고 검색 과정까지 반환
    ///
    /// 고정 응답을 포함한 모든 답변이 대화 기록에 추가됩니다.
    /// 검색이나 생성이 실패하면 기록은 변경되지 않습니다.
    pub async fn ask_detailed(&self, question: &str) -> EngineResult<Answer> {
        let started = Instant::now();
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;

        let Some(index) = inner.index.as_ref() else {
            tracing::warn!("Question received before any document was ingested");
            let text = self.config.fallback_no_index_message.clone();
            inner.history.push(Turn::new(question, text.clone()));
            return Ok(Answer {
                text,
                kind: AnswerKind::NoDocument,
                generated_question: None,
                sources: Vec::new(),
                elapsed: started.elapsed(),
            });
        };

        let prior = inner.history.turns();

        let generated_question = if self.config.condense_question && !prior.is_empty() {
            self.model
                .condense_question(question, prior)
                .await
                .map_err(|e| EngineError::Generation(EngineError::describe(&e)))?
        } else {
            question.to_string()
        };
        tracing::debug!("Generated question: {}", generated_question);

        let sources = self
            .retriever
            .retrieve(index, &generated_question)
            .await
            .map_err(|e| EngineError::Retrieval(EngineError::describe(&e)))?;

        let (text, kind) = if sources.is_empty() {
            tracing::warn!("No passage above threshold for: {}", generated_question);
            (
                self.config.fallback_no_context_message.clone(),
                AnswerKind::NoContext,
            )
        } else {
            for source in &sources {
                tracing::debug!("Source [{:.3}] {}", source.score, source.passage.citation());
            }

            let prompt = self
                .template
                .render(&generated_question, &format_context(&sources));
            let text = self
                .model
                .generate(&prompt, prior)
                .await
                .map_err(|e| EngineError::Generation(EngineError::describe(&e)))?;
            (text, AnswerKind::Generated)
        };

        inner.history.push(Turn::new(question, text.clone()));
        let history_len = inner.history.len();
        drop(guard);

        let elapsed = started.elapsed();
        tracing::info!(
            "Question answered ({:?}, {} sources, {} turns) in {:.2?}",
            kind,
            sources.len(),
            history_len,
            elapsed
        );

        Ok(Answer {
            text,
            kind,
            generated_question: Some(generated_question),
            sources,
            elapsed,
        })
    }

    /// 인덱스와 대화 기록 초기화
    pub async fn clear(&self) {
        let mut guard = self.inner.lock().await;
        guard.index = None;
        guard.history.clear();
        tracing::info!("Conversation cleared");
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    pub async fn state(&self) -> EngineState {
        if self.inner.lock().await.index.is_some() {
            EngineState::Ready
        } else {
            EngineState::Uninitialized
        }
    }

    /// 대화 기록 스냅샷
    pub async fn history(&self) -> Vec<Turn> {
        self.inner.lock().await.history.turns().to_vec()
    }

    pub async fn history_len(&self) -> usize {
        self.inner.lock().await.history.len()
    }

    /// 인덱스에 저장된 패시지 수
    pub async fn passage_count(&self) -> usize {
        self.inner
            .lock()
            .await
            .index
            .as_ref()
            .map(VectorIndex::len)
            .unwrap_or(0)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::{bail, Result};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU8, Ordering};
    use std::sync::Mutex as StdMutex;

    /// 알파벳 빈도 벡터 임베더 ('a'..='z')
    struct LetterEmbedder;

    #[async_trait]
    impl EmbeddingProvider for LetterEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            let mut v = vec![0.0; 26];
            for c in text.to_ascii_lowercase().chars() {
                if c.is_ascii_lowercase() {
                    v[(c as u8 - b'a') as usize] += 1.0;
                }
            }
            Ok(v)
        }

        fn name(&self) -> &str {
            "letters"
        }
    }

    const EMBED_LETTERS: u8 = 0;
    const EMBED_FAIL: u8 = 1;
    const EMBED_OTHER_DIMENSION: u8 = 2;

    /// 동작을 바꿀 수 있는 임베더 (알파벳 빈도 / 실패 / 3차원 벡터)
    #[derive(Default)]
    struct SwitchableEmbedder {
        mode: AtomicU8,
    }

    impl SwitchableEmbedder {
        fn set_mode(&self, mode: u8) {
            self.mode.store(mode, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl EmbeddingProvider for SwitchableEmbedder {
        async fn embed(&self, text: &str) -> Result<Vec<f32>> {
            match self.mode.load(Ordering::SeqCst) {
                EMBED_LETTERS => LetterEmbedder.embed(text).await,
                EMBED_FAIL => bail!("embedding backend unavailable"),
                _ => Ok(vec![1.0, 1.0, 1.0]),
            }
        }

        fn name(&self) -> &str {
            "switchable"
        }
    }

    /// 받은 입력을 기록하는 모델
    #[derive(Default)]
    struct RecordingModel {
        prompts: StdMutex<Vec<(String, usize)>>,
        condensed: StdMutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl LanguageModel for RecordingModel {
        async fn generate(&self, prompt: &str, history: &[Turn]) -> Result<String> {
            if self.fail {
                bail!("model crashed");
            }
            self.prompts
                .lock()
                .unwrap()
                .push((prompt.to_string(), history.len()));
            Ok(format!("answer #{}", history.len() + 1))
        }

        async fn condense_question(&self, question: &str, _history: &[Turn]) -> Result<String> {
            self.condensed.lock().unwrap().push(question.to_string());
            Ok(format!("standalone: {}", question))
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    fn config() -> EngineConfig {
        EngineConfig {
            chunk_size: 40,
            chunk_overlap: 10,
            score_threshold: 0.3,
            ..Default::default()
        }
    }

    fn engine_with(model: Arc<RecordingModel>) -> ConversationEngine {
        ConversationEngine::new(config(), Arc::new(LetterEmbedder), model).unwrap()
    }

    #[test]
    fn test_invalid_config_fails_fast() {
        let bad = EngineConfig {
            chunk_size: 10,
            chunk_overlap: 10,
            ..Default::default()
        };
        let result = ConversationEngine::new(
            bad,
            Arc::new(LetterEmbedder),
            Arc::new(RecordingModel::default()),
        );
        assert!(matches!(result, Err(EngineError::Configuration(_))));
    }

    #[tokio::test]
    async fn test_ask_uninitialized_records_fallback() {
        let model = Arc::new(RecordingModel::default());
        let engine = engine_with(model.clone());

        let answer = engine.ask_detailed("hello?").await.unwrap();
        assert_eq!(answer.kind, AnswerKind::NoDocument);
        assert_eq!(answer.text, config().fallback_no_index_message);

        let history = engine.history().await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].question, "hello?");
        assert_eq!(history[0].answer, config().fallback_no_index_message);
        assert!(model.prompts.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ingest_transitions_to_ready() {
        let engine = engine_with(Arc::new(RecordingModel::default()));
        assert_eq!(engine.state().await, EngineState::Uninitialized);

        let report = engine
            .ingest("a".repeat(100).as_str(), "letters.txt")
            .await
            .unwrap();
        assert_eq!(report.passages, 3);
        assert_eq!(report.indexed_total, 3);
        assert_eq!(engine.state().await, EngineState::Ready);
    }

    #[tokio::test]
    async fn test_ingest_accumulates() {
        let engine = engine_with(Arc::new(RecordingModel::default()));
        engine.ingest("first document", "a.txt").await.unwrap();
        let report = engine.ingest("second document", "b.txt").await.unwrap();

        assert_eq!(report.indexed_total, 2);
        assert_eq!(engine.passage_count().await, 2);
    }

    #[tokio::test]
    async fn test_ingest_empty_text_fails() {
        let engine = engine_with(Arc::new(RecordingModel::default()));
        let err = engine.ingest("   \n ", "blank.pdf").await.unwrap_err();
        assert!(matches!(err, EngineError::Ingestion { ref source_id, .. } if source_id == "blank.pdf"));
        assert_eq!(engine.state().await, EngineState::Uninitialized);
    }

    #[tokio::test]
    async fn test_failed_ingest_keeps_prior_state() {
        let embedder = Arc::new(SwitchableEmbedder::default());
        let engine = ConversationEngine::new(
            config(),
            embedder.clone(),
            Arc::new(RecordingModel::default()),
        )
        .unwrap();
        engine.ingest("hello world", "a.txt").await.unwrap();
        engine.ask("hello").await.unwrap();

        // 임베딩 실패: 인덱스와 상태 유지
        embedder.set_mode(EMBED_FAIL);
        let err = engine.ingest("second document", "b.txt").await.unwrap_err();
        assert!(matches!(err, EngineError::Ingestion { ref source_id, .. } if source_id == "b.txt"));
        assert!(err.to_string().contains("embedding backend unavailable"));
        assert_eq!(engine.state().await, EngineState::Ready);
        assert_eq!(engine.passage_count().await, 1);

        // 질문 임베딩 실패: 기록 유지
        let err = engine.ask("hello again").await.unwrap_err();
        assert!(matches!(err, EngineError::Retrieval(_)));
        assert_eq!(engine.history_len().await, 1);

        // 차원이 다른 문서는 기존 인덱스에 합쳐지지 않음
        embedder.set_mode(EMBED_OTHER_DIMENSION);
        let err = engine.ingest("third document", "c.txt").await.unwrap_err();
        assert!(matches!(err, EngineError::Ingestion { ref source_id, .. } if source_id == "c.txt"));
        assert!(err.to_string().contains("different dimension"));
        assert_eq!(engine.state().await, EngineState::Ready);
        assert_eq!(engine.passage_count().await, 1);

        embedder.set_mode(EMBED_LETTERS);
        let answer = engine.ask_detailed("hello world").await.unwrap();
        assert_eq!(answer.kind, AnswerKind::Generated);
        assert_eq!(answer.sources[0].passage.source_id, "a.txt");
        assert_eq!(engine.history_len().await, 2);
    }

    #[tokio::test]
    async fn test_generation_uses_prior_history_only() {
        let model = Arc::new(RecordingModel::default());
        let engine = engine_with(model.clone());
        engine.ingest("apple banana cherry", "fruit.txt").await.unwrap();

        let first = engine.ask_detailed("apple banana").await.unwrap();
        assert_eq!(first.kind, AnswerKind::Generated);
        assert_eq!(first.text, "answer #1");
        assert_eq!(first.generated_question.as_deref(), Some("apple banana"));

        let second = engine.ask_detailed("cherry banana").await.unwrap();
        assert_eq!(second.text, "answer #2");
        assert_eq!(
            second.generated_question.as_deref(),
            Some("standalone: cherry banana")
        );

        let prompts = model.prompts.lock().unwrap();
        assert_eq!(prompts[0].1, 0);
        assert_eq!(prompts[1].1, 1);
        assert!(prompts[1].0.contains("standalone: cherry banana"));
        assert!(prompts[1].0.contains("apple banana cherry"));

        // 첫 질문은 기록이 없으므로 재작성하지 않음
        assert_eq!(*model.condensed.lock().unwrap(), vec!["cherry banana"]);
    }

    #[tokio::test]
    async fn test_condense_disabled() {
        let model = Arc::new(RecordingModel::default());
        let config = EngineConfig {
            condense_question: false,
            ..config()
        };
        let engine = ConversationEngine::new(config, Arc::new(LetterEmbedder), model.clone()).unwrap();
        engine.ingest("apple banana cherry", "fruit.txt").await.unwrap();

        engine.ask("apple").await.unwrap();
        let answer = engine.ask_detailed("banana").await.unwrap();
        assert_eq!(answer.generated_question.as_deref(), Some("banana"));
        assert!(model.condensed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_generation_failure_leaves_history() {
        let model = Arc::new(RecordingModel {
            fail: true,
            ..Default::default()
        });
        let engine = engine_with(model);
        engine.ingest("apple banana cherry", "fruit.txt").await.unwrap();

        let err = engine.ask("apple").await.unwrap_err();
        assert!(matches!(err, EngineError::Generation(_)));
        assert_eq!(engine.history_len().await, 0);
    }

    #[tokio::test]
    async fn test_clear_is_idempotent() {
        let engine = engine_with(Arc::new(RecordingModel::default()));
        engine.ingest("apple banana", "fruit.txt").await.unwrap();
        engine.ask("apple").await.unwrap();

        for _ in 0..2 {
            engine.clear().await;
            assert_eq!(engine.state().await, EngineState::Uninitialized);
            assert_eq!(engine.history_len().await, 0);
            assert_eq!(engine.passage_count().await, 0);
        }
    }

    #[tokio::test]
    async fn test_concurrent_asks_each_record_one_turn() {
        let engine = Arc::new(engine_with(Arc::new(RecordingModel::default())));
        engine.ingest("apple banana cherry", "fruit.txt").await.unwrap();

        let mut handles = Vec::new();
        for i in 0..8 {
            let engine = Arc::clone(&engine);
            handles.push(tokio::spawn(async move {
                engine.ask(&format!("apple {}", i)).await
            }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        let history = engine.history().await;
        assert_eq!(history.len(), 8);
        // 각 답변은 직전까지의 기록 길이를 반영
        for (i, turn) in history.iter().enumerate() {
            assert_eq!(turn.answer, format!("answer #{}", i + 1));
        }
    }
}
