//! # Truegul 웹 서버 진입점
//!
//! 이 파일은 Truegul(글 AI 작성 여부 분석 서비스) 애플리케이션의 **시작점(entry point)**입니다.
//! Rust 프로그램은 항상 `main()` 함수에서 실행이 시작됩니다.
//!
//! 이 파일이 수행하는 작업:
//! 1. 환경변수(.env) 로딩
//! 2. 로깅(tracing) 초기화
//! 3. 설정 로딩
//! 4. SQLite 데이터베이스 연결 풀 생성
//! 5. 데이터베이스 마이그레이션 실행
//! 6. 서비스(제출 코디네이터, 콜백 처리기) 조립
//! 7. API 라우터 설정
//! 8. HTTP 서버 시작 (Ctrl+C / SIGTERM에서 정상 종료)

// ── 모듈 선언 ──
// `mod` 키워드는 다른 파일을 모듈로 가져옵니다.
// Rust에서는 파일 시스템 구조가 곧 모듈 구조입니다.
mod config;
mod db;
mod error;
mod middleware;
mod models;
mod routes;
mod services;

// 테스트 빌드에서만 포함되는 공용 도우미 (인메모리 DB, 가짜 발행기)
#[cfg(test)]
mod test_support;

use anyhow::{Context, Result}; // anyhow::Result: 어떤 에러 타입이든 담을 수 있는 범용 Result 타입
use config::Config;
use routes::AppState;
use services::{CallbackProcessor, OutboxPublisher, QuotaTracker, SubmissionCoordinator};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use tokio::signal;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt}; // 로깅 초기화 유틸리티

// #[tokio::main]: 비동기 런타임을 시작하는 **어트리뷰트 매크로**
// 이 매크로가 내부적으로 tokio 런타임을 생성하고 main을 그 안에서 실행합니다.
#[tokio::main]
async fn main() -> Result<()> {
    // ── 1단계: 환경변수 로딩 ──
    // .ok()는 Result를 Option으로 변환하여, .env 파일이 없어도 에러 없이 넘어갑니다.
    dotenvy::dotenv().ok();

    // ── 2단계: 로깅(tracing) 초기화 ──
    // EnvFilter: RUST_LOG 환경변수로 로그 레벨을 제어합니다.
    // 환경변수가 없으면 truegul, tower_http, axum 모듈을 debug 레벨로 설정
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "truegul=debug,tower_http=debug,axum=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // ── 3단계: 설정 로딩 ──
    let config = Config::from_env().context("Failed to load configuration")?;
    tracing::info!("Starting Truegul server on {}:{}", config.host, config.port);
    if config.ml_callback_secret.is_empty() {
        tracing::warn!("ML_CALLBACK_SECRET is not set; all worker requests will be rejected");
    }

    // ── 4단계: SQLite 연결 풀 생성 ──
    // create_if_missing: DB 파일이 없으면 새로 만듭니다.
    // foreign_keys: SQLite는 기본적으로 외래 키 검사를 끄므로 명시적으로 켭니다.
    // WAL + busy_timeout: 쓰기가 겹칠 때 바로 실패하지 않고 잠시 기다립니다.
    let connect_options = SqliteConnectOptions::from_str(&config.database_url)
        .context("Invalid DATABASE_URL")?
        .create_if_missing(true)
        .foreign_keys(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    let pool = SqlitePoolOptions::new()
        .max_connections(5) // 최대 5개의 동시 연결을 유지
        .connect_with(connect_options)
        .await
        .context("Failed to connect to database")?;

    // ── 5단계: 데이터베이스 마이그레이션 실행 ──
    // sqlx::migrate!는 컴파일 타임에 ./migrations 폴더의 SQL 파일들을 포함시키는 매크로
    tracing::info!("Running database migrations...");
    sqlx::migrate!("./migrations")
        .run(&pool) // 아직 실행되지 않은 마이그레이션만 순서대로 실행
        .await
        .context("Failed to run migrations")?;

    // ── 6단계: 서비스 조립 ──
    // 발행기는 트레이트 객체(Arc<dyn TaskPublisher>)로 넘기므로
    // 코디네이터는 작업이 어디로 가는지 알지 못합니다.
    let quota = QuotaTracker::new(config.max_daily_submissions);
    let publisher = Arc::new(OutboxPublisher::new(pool.clone(), config.task_stream.clone()));
    let submissions = SubmissionCoordinator::new(
        pool.clone(),
        publisher,
        quota,
        config.callback_url(),
    );
    tracing::info!(
        stream = %config.task_stream,
        lease_secs = config.task_lease.as_secs(),
        callback_url = %config.callback_url(),
        daily_limit = quota.limit(),
        "Analysis pipeline configured"
    );

    // ── 7단계: 애플리케이션 상태(State)와 라우터 ──
    // SqlitePool은 내부적으로 Arc를 사용하므로 clone해도 같은 풀을 가리킵니다.
    let state = AppState {
        pool: pool.clone(),
        jwt_secret: config.jwt_secret.clone(),
        callback_secret: config.ml_callback_secret.clone(),
        task_stream: config.task_stream.clone(),
        task_lease: config.task_lease,
        quota,
        submissions: Arc::new(submissions),
        callbacks: Arc::new(CallbackProcessor::new(pool.clone())),
    };
    let app = routes::router(state);

    // ── 8단계: 서버 시작 ──
    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;
    tracing::info!("Server listening on {}", addr);

    // 종료 신호를 받으면 진행 중인 요청을 마저 처리하고 멈춥니다.
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    pool.close().await;
    tracing::info!("Server shutdown complete");
    Ok(())
}

/// Ctrl+C 또는 SIGTERM을 기다립니다.
///
/// 신호 핸들러 설치에 실패하면 해당 신호는 기다리지 않습니다 (다른 쪽 신호로는 종료 가능).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
