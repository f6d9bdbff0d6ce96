//! CLI 모듈
//!
//! docchat CLI 명령어 정의 및 구현

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use futures::stream::{self, StreamExt};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::collector::{CollectedFile, CollectorConfig, FileCollector, FileType};
use crate::config::{default_config_path, get_data_dir, AppConfig};
use crate::conversation::{Answer, AnswerKind, ConversationEngine, SessionRegistry};
use crate::embedding::OllamaEmbedding;
use crate::extractor::load_document;
use crate::knowledge::ScoredPassage;
use crate::llm::OllamaChat;

/// 동시에 읽을 파일 수
const LOAD_CONCURRENCY: usize = 4;

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "docchat")]
#[command(version, about = "PDF 문서 기반 대화형 질의응답", long_about = None)]
pub struct Cli {
    /// 설정 파일 경로 (기본: 데이터 디렉토리의 config.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

/// 수집 대상 지정 옵션
#[derive(clap::Args, Debug, Clone, Default)]
pub struct SourceArgs {
    /// 수집할 파일 경로 (여러 번 지정 가능)
    #[arg(short, long)]
    pub file: Vec<PathBuf>,

    /// 수집할 폴더 경로 (재귀)
    #[arg(short, long)]
    pub dir: Option<PathBuf>,

    /// PDF 파일만 수집
    #[arg(long)]
    pub pdf_only: bool,
}

impl SourceArgs {
    fn is_empty(&self) -> bool {
        self.file.is_empty() && self.dir.is_none()
    }
}

#[derive(Subcommand)]
pub enum Commands {
    /// 문서를 수집하고 대화형 세션 시작
    Chat {
        #[command(flatten)]
        sources: SourceArgs,

        /// 답변마다 참조 패시지 표시
        #[arg(long)]
        show_sources: bool,
    },

    /// 문서를 수집하고 질문 하나에 답변
    Ask {
        /// 질문
        question: String,

        #[command(flatten)]
        sources: SourceArgs,

        /// 참조 패시지 표시
        #[arg(long)]
        show_sources: bool,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let config = AppConfig::load(cli.config.as_deref()).context("설정 로드 실패")?;

    match cli.command {
        Commands::Chat {
            sources,
            show_sources,
        } => cmd_chat(&config, &sources, show_sources).await,
        Commands::Ask {
            question,
            sources,
            show_sources,
        } => cmd_ask(&config, &question, &sources, show_sources).await,
        Commands::Status => cmd_status(&config, cli.config.as_deref()).await,
    }
}

/// Ollama 프로바이더로 세션 레지스트리 구성
fn build_registry(config: &AppConfig) -> Result<SessionRegistry> {
    let embedder = OllamaEmbedding::new(&config.ollama).context("임베딩 클라이언트 생성 실패")?;
    let model = OllamaChat::new(&config.ollama).context("채팅 클라이언트 생성 실패")?;

    let registry = SessionRegistry::new(config.engine.clone(), Arc::new(embedder), Arc::new(model))?;
    Ok(registry)
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 대화 명령어 (chat)
///
/// 문서를 수집한 뒤 표준 입력에서 질문을 읽어 답변합니다.
async fn cmd_chat(config: &AppConfig, sources: &SourceArgs, show_sources: bool) -> Result<()> {
    let registry = build_registry(config)?;
    let (session_id, engine) = registry.create().await?;
    tracing::debug!("Chat session {}", session_id);

    if !sources.is_empty() {
        ingest_sources(&engine, sources).await?;
    }

    println!();
    println!("[*] 질문을 입력하세요. 명령어: /clear, /history, /sources, /exit");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut last_answer: Option<Answer> = None;

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            "/exit" | "/quit" => break,
            "/clear" => {
                engine.clear().await;
                last_answer = None;
                println!("[OK] 대화 기록과 인덱스를 초기화했습니다.");
            }
            "/history" => print_history(&engine).await,
            "/sources" => match last_answer {
                Some(ref answer) if !answer.sources.is_empty() => print_sources(&answer.sources),
                _ => println!("[!] 표시할 참조 패시지가 없습니다."),
            },
            question => match engine.ask_detailed(question).await {
                Ok(answer) => {
                    print_answer(&answer, show_sources);
                    last_answer = Some(answer);
                }
                Err(e) => println!("[!] 오류: {}", e),
            },
        }
    }

    registry.remove(&session_id).await;
    println!("[OK] 세션 종료");
    Ok(())
}

/// 단일 질문 명령어 (ask)
async fn cmd_ask(
    config: &AppConfig,
    question: &str,
    sources: &SourceArgs,
    show_sources: bool,
) -> Result<()> {
    let registry = build_registry(config)?;
    let (_, engine) = registry.create().await?;

    if !sources.is_empty() {
        ingest_sources(&engine, sources).await?;
        println!();
    }

    let answer = engine.ask_detailed(question).await.context("답변 생성 실패")?;
    print_answer(&answer, show_sources);
    Ok(())
}

/// 상태 명령어 (status)
///
/// 설정과 Ollama 서버 상태를 확인합니다.
async fn cmd_status(config: &AppConfig, explicit_path: Option<&Path>) -> Result<()> {
    println!("docchat v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", get_data_dir().display());

    let config_path = explicit_path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);
    if config_path.exists() {
        println!("[OK] 설정 파일: {}", config_path.display());
    } else {
        println!("[*] 설정 파일 없음 (기본값 사용): {}", config_path.display());
    }

    let engine = &config.engine;
    println!(
        "     청크: {} 문자 / 중첩 {} 문자",
        engine.chunk_size, engine.chunk_overlap
    );
    println!(
        "     검색: 상위 {} 건, 임계값 {:.2}",
        engine.k, engine.score_threshold
    );
    println!(
        "     질문 재구성: {}",
        if engine.condense_question { "사용" } else { "미사용" }
    );
    println!();

    let ollama = &config.ollama;
    println!("[*] Ollama 서버: {}", ollama.base_url);

    let chat = OllamaChat::new(ollama)?;
    match chat.health_check().await {
        Ok(true) => println!("[OK] 서버 연결됨"),
        Ok(false) => {
            println!("[!] 서버에 연결할 수 없습니다.");
            println!("    실행: ollama serve");
            return Ok(());
        }
        Err(e) => {
            println!("[!] 서버 확인 실패: {}", e);
            return Ok(());
        }
    }

    match chat.list_models().await {
        Ok(models) => {
            for (role, name) in [("채팅", &ollama.chat_model), ("임베딩", &ollama.embed_model)] {
                if has_model(&models, name) {
                    println!("[OK] {} 모델: {}", role, name);
                } else {
                    println!("[!] {} 모델 없음: {}", role, name);
                    println!("    설치: ollama pull {}", name);
                }
            }
        }
        Err(e) => {
            tracing::debug!("모델 목록 조회 실패: {}", e);
        }
    }

    Ok(())
}

// ============================================================================
// Ingestion
// ============================================================================

/// 지정된 파일/폴더를 엔진에 수집
///
/// 파일 읽기는 동시에 진행하고, 인덱스 추가는 파일 순서대로 진행합니다.
/// 실패한 파일은 건너뛰며 기존 인덱스에는 영향이 없습니다.
async fn ingest_sources(engine: &ConversationEngine, sources: &SourceArgs) -> Result<()> {
    let files = collect_sources(sources)?;

    if files.is_empty() {
        println!("[!] 수집할 파일이 없습니다.");
        return Ok(());
    }

    let total_size: u64 = files.iter().map(|f| f.size).sum();
    let pdf_count = files.iter().filter(|f| f.file_type == FileType::Pdf).count();
    println!("[*] 수집 대상: {} 파일", files.len());
    println!(
        "    텍스트: {}, PDF: {}",
        files.len() - pdf_count,
        pdf_count
    );
    println!("    총 크기: {}", format_bytes(total_size));
    println!();

    let loaded: Vec<_> = stream::iter(files.iter())
        .map(|file| async move { (file, load_document(file).await) })
        .buffered(LOAD_CONCURRENCY)
        .collect()
        .await;

    let mut success_count = 0;
    let mut error_count = 0;

    for (i, (file, document)) in loaded.into_iter().enumerate() {
        let type_str = match file.file_type {
            FileType::Text => "TXT",
            FileType::Pdf => "PDF",
        };

        print!(
            "[{}/{}] [{}] {}... ",
            i + 1,
            files.len(),
            type_str,
            file.display_name()
        );

        let document = match document {
            Ok(d) => d,
            Err(e) => {
                println!("실패: {:#}", e);
                error_count += 1;
                continue;
            }
        };

        match engine.ingest_document(&document).await {
            Ok(report) => {
                println!(
                    "완료 ({} 패시지, {:.1}s)",
                    report.passages,
                    report.elapsed.as_secs_f64()
                );
                success_count += 1;
            }
            Err(e) => {
                println!("실패: {}", e);
                error_count += 1;
            }
        }
    }

    println!();
    println!(
        "[OK] 완료: 성공 {}, 실패 {} (인덱스 {} 패시지)",
        success_count,
        error_count,
        engine.passage_count().await
    );

    Ok(())
}

/// 수집 대상 파일 목록 구성
fn collect_sources(sources: &SourceArgs) -> Result<Vec<CollectedFile>> {
    let collector = FileCollector::new(CollectorConfig {
        pdf_only: sources.pdf_only,
        ..Default::default()
    });

    let mut files = Vec::new();

    for path in &sources.file {
        match collector.collect_file(path)? {
            Some(f) => files.push(f),
            None => println!("[!] 지원하지 않는 파일 형식: {:?}", path),
        }
    }

    if let Some(ref dir_path) = sources.dir {
        files.extend(collector.collect_directory(dir_path)?);
    }

    Ok(files)
}

// ============================================================================
// Output
// ============================================================================

fn print_answer(answer: &Answer, show_sources: bool) {
    println!();
    println!("{}", answer.text);

    match answer.kind {
        AnswerKind::Generated => {
            if let Some(ref q) = answer.generated_question {
                tracing::debug!("Standalone question: {}", q);
            }
            if show_sources {
                print_sources(&answer.sources);
            }
        }
        AnswerKind::NoDocument | AnswerKind::NoContext => {
            tracing::debug!("Fallback answer: {:?}", answer.kind);
        }
    }

    println!();
}

fn print_sources(sources: &[ScoredPassage]) {
    println!();
    println!("[*] 참조 ({} 건):", sources.len());
    for (i, scored) in sources.iter().enumerate() {
        println!(
            "  {}. [점수: {:.4}] {}",
            i + 1,
            scored.score,
            scored.passage.citation()
        );
        println!("     {}", truncate_text(&scored.passage.text, 120));
    }
}

async fn print_history(engine: &ConversationEngine) {
    let history = engine.history().await;
    if history.is_empty() {
        println!("[!] 대화 기록이 없습니다.");
        return;
    }

    for (i, turn) in history.iter().enumerate() {
        println!("{}. [{}] Q: {}", i + 1, turn.asked_at.format("%H:%M:%S"), turn.question);
        println!("   A: {}", truncate_text(&turn.answer, 200));
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 모델 목록에 모델이 있는지 확인 (태그 생략 시 모든 태그 허용)
fn has_model(models: &[String], name: &str) -> bool {
    models
        .iter()
        .any(|m| m == name || (!name.contains(':') && m.split(':').next() == Some(name)))
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================
