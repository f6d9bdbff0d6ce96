//! 문서 로드 모듈
//!
//! 수집된 파일에서 텍스트를 추출해 `Document`로 만듭니다.
//! - 텍스트 파일: 직접 읽기 (페이지 없음)
//! - PDF 파일: pdf-extract로 페이지별 추출

pub mod pdf;

use std::path::Path;

use anyhow::{Context, Result};

use crate::collector::{CollectedFile, FileType};
use crate::knowledge::Document;

/// 수집된 파일을 문서로 로드
pub async fn load_document(file: &CollectedFile) -> Result<Document> {
    let source_id = file.display_name();
    match file.file_type {
        FileType::Text => load_text(&file.path, source_id).await,
        FileType::Pdf => load_pdf(&file.path, source_id).await,
    }
}

/// 텍스트 파일 로드
async fn load_text(path: &Path, source_id: String) -> Result<Document> {
    let text = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read text file: {:?}", path))?;

    Ok(Document::from_text(source_id, text))
}

/// PDF 파일 로드 (페이지 번호는 1부터)
async fn load_pdf(path: &Path, source_id: String) -> Result<Document> {
    // PDF 추출은 CPU 바운드이므로 spawn_blocking 사용
    let path = path.to_path_buf();
    let pages = tokio::task::spawn_blocking(move || pdf::extract_pages_from_pdf(&path))
        .await
        .context("PDF extraction task failed")??;

    tracing::debug!("Extracted {} pages from {}", pages.len(), source_id);
    Ok(Document::from_pages(source_id, pages))
}

// ============================================================================
// Tests
// ============================================================================
