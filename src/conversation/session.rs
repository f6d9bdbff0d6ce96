//! 세션 레지스트리
//!
//! 세션마다 독립된 `ConversationEngine`을 하나씩 보관합니다.
//! 엔진끼리는 상태를 공유하지 않으며, 프로바이더만 `Arc`로 공유합니다.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::embedding::EmbeddingProvider;
use crate::error::EngineResult;
use crate::llm::LanguageModel;

use super::engine::ConversationEngine;

/// 세션별 엔진 저장소
pub struct SessionRegistry {
    config: EngineConfig,
    embedder: Arc<dyn EmbeddingProvider>,
    model: Arc<dyn LanguageModel>,
    sessions: RwLock<HashMap<Uuid, Arc<ConversationEngine>>>,
}

impl SessionRegistry {
    /// 레지스트리 생성 (설정은 여기서 한 번 검증)
    pub fn new(
        config: EngineConfig,
        embedder: Arc<dyn EmbeddingProvider>,
        model: Arc<dyn LanguageModel>,
    ) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            embedder,
            model,
            sessions: RwLock::new(HashMap::new()),
        })
    }

    fn new_engine(&self) -> EngineResult<Arc<ConversationEngine>> {
        let engine = ConversationEngine::new(
            self.config.clone(),
            Arc::clone(&self.embedder),
            Arc::clone(&self.model),
        )?;
        Ok(Arc::new(engine))
    }

    /// 새 세션 생성
    pub async fn create(&self) -> EngineResult<(Uuid, Arc<ConversationEngine>)> {
        let id = Uuid::new_v4();
        let engine = self.new_engine()?;
        self.sessions.write().await.insert(id, Arc::clone(&engine));
        tracing::debug!("Created session {}", id);
        Ok((id, engine))
    }

    /// 세션 조회
    pub async fn get(&self, id: &Uuid) -> Option<Arc<ConversationEngine>> {
        self.sessions.read().await.get(id).cloned()
    }

    /// 세션 조회, 없으면 생성
    pub async fn get_or_create(&self, id: Uuid) -> EngineResult<Arc<ConversationEngine>> {
        if let Some(engine) = self.get(&id).await {
            return Ok(engine);
        }

        let mut sessions = self.sessions.write().await;
        // 락을 기다리는 동안 다른 호출이 만들었을 수 있음
        if let Some(engine) = sessions.get(&id) {
            return Ok(Arc::clone(engine));
        }

        let engine = self.new_engine()?;
        sessions.insert(id, Arc::clone(&engine));
        tracing::debug!("Created session {}", id);
        Ok(engine)
    }

    /// 세션 삭제
    pub async fn remove(&self, id: &Uuid) -> bool {
        let removed = self.sessions.write().await.remove(id).is_some();
        if removed {
            tracing::debug!("Removed session {}", id);
        }
        removed
    }

    /// 세션 수
    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
