//! 문서 및 패시지 타입
//!
//! - Document: 파일 하나에서 추출된 원본 텍스트 (PDF는 페이지별)
//! - Passage: 검색 단위가 되는 문서의 연속 부분 문자열

use serde::Serialize;

// ============================================================================
// Document
// ============================================================================

/// 페이지 텍스트
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page {
    /// 페이지 번호 (1부터 시작, 일반 텍스트는 None)
    pub number: Option<usize>,
    /// 페이지 텍스트
    pub text: String,
}

/// 수집 대상 문서
///
/// 수집 시점에 생성되어 패시지를 만들 때까지만 유지됩니다.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// 문서 식별자 (파일 경로 또는 이름)
    pub source_id: String,
    /// 페이지 목록
    pub pages: Vec<Page>,
}

impl Document {
    /// 단일 텍스트로 문서 생성
    pub fn from_text(source_id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source_id: source_id.into(),
            pages: vec![Page {
                number: None,
                text: text.into(),
            }],
        }
    }

    /// 페이지별 텍스트로 문서 생성 (페이지 번호는 1부터)
    pub fn from_pages(source_id: impl Into<String>, pages: Vec<String>) -> Self {
        Self {
            source_id: source_id.into(),
            pages: pages
                .into_iter()
                .enumerate()
                .map(|(i, text)| Page {
                    number: Some(i + 1),
                    text,
                })
                .collect(),
        }
    }

    /// 공백을 제외한 텍스트가 없는지 확인
    pub fn is_blank(&self) -> bool {
        self.pages.iter().all(|p| p.text.trim().is_empty())
    }

    /// 전체 문자 수
    pub fn char_count(&self) -> usize {
        self.pages.iter().map(|p| p.text.chars().count()).sum()
    }
}

// ============================================================================
// Passage
// ============================================================================

/// 패시지 (청크)
///
/// 생성 이후 변경되지 않습니다.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Passage {
    /// 원본 문서 식별자
    pub source_id: String,
    /// 페이지 번호 (PDF)
    pub page: Option<usize>,
    /// 문서 내 순서 (0-based)
    pub index: usize,
    /// 페이지 텍스트 내 시작 위치 (문자 단위)
    pub start: usize,
    /// 패시지 텍스트
    pub text: String,
}

impl Passage {
    /// 출처 표기 ("manual.pdf, Page 3")
    pub fn citation(&self) -> String {
        match self.page {
            Some(page) => format!("{}, Page {}", self.source_id, page),
            None => self.source_id.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_pages_numbers_from_one() {
        let doc = Document::from_pages("a.pdf", vec!["first".into(), "second".into()]);
        assert_eq!(doc.pages[0].number, Some(1));
        assert_eq!(doc.pages[1].number, Some(2));
        assert_eq!(doc.char_count(), 11);
    }

    #[test]
    fn test_is_blank() {
        assert!(Document::from_text("x", "  \n\t ").is_blank());
        assert!(Document::from_pages("x", vec![String::new(), " ".into()]).is_blank());
        assert!(!Document::from_text("x", "text").is_blank());
    }

    #[test]
    fn test_citation() {
        let mut passage = Passage {
            source_id: "manual.pdf".into(),
            page: Some(3),
            index: 0,
            start: 0,
            text: "x".into(),
        };
        assert_eq!(passage.citation(), "manual.pdf, Page 3");

        passage.page = None;
        assert_eq!(passage.citation(), "manual.pdf");
    }
}
