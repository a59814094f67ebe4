//! # 애플리케이션 설정(Configuration) 모듈
//!
//! 환경변수에서 서버 설정값을 읽어오는 모듈입니다.
//! `.env` 파일이나 시스템 환경변수에서 값을 가져옵니다.
//!
//! 설정 항목:
//! - `DATABASE_URL`: SQLite 데이터베이스 경로 (필수)
//! - `JWT_SECRET`: JWT 토큰 서명에 사용할 비밀키 (필수)
//! - `HOST`, `PORT`: 서버 바인딩 주소와 포트
//! - `CALLBACK_BASE_URL`: 워커가 결과를 돌려보낼 서버의 외부 주소
//! - `ML_CALLBACK_SECRET`: 워커 전용 엔드포인트의 공유 비밀값
//! - `TASK_STREAM`: 분석 작업을 쌓아둘 큐(스트림) 이름
//! - `TASK_LEASE_SECS`: 워커가 가져간 작업을 콜백 없이 붙잡아 둘 수 있는 시간(초)
//! - `MAX_DAILY_SUBMISSIONS`: 사용자별 하루 제출 한도

use std::env;
use std::time::Duration;

/// 콜백 엔드포인트 경로. 작업 메시지의 `callback_url`은 `CALLBACK_BASE_URL` 뒤에 이 경로를 붙여 만듭니다.
pub const CALLBACK_PATH: &str = "/api/v1/internal/callback";

/// 애플리케이션 전체 설정을 담는 구조체
///
/// 서버 시작 시 환경변수에서 한 번 읽어온 후,
/// 애플리케이션 전체에서 공유됩니다.
#[derive(Debug, Clone)]
pub struct Config {
    /// SQLite 데이터베이스 URL (예: "sqlite:data/truegul.db?mode=rwc")
    pub database_url: String,
    /// JWT 토큰 서명/검증에 사용하는 비밀키
    pub jwt_secret: String,
    /// 서버가 바인딩할 호스트 주소 (기본값: "0.0.0.0")
    pub host: String,
    /// 서버 포트 번호 (기본값: 8080)
    pub port: u16,
    /// 워커가 볼 수 있는 이 서버의 주소 (기본값: "http://localhost:{port}")
    pub callback_base_url: String,
    /// 워커 공유 비밀값. 비어 있으면 모든 워커 요청을 거부합니다.
    pub ml_callback_secret: String,
    /// 작업 큐 이름 (기본값: "analysis_tasks")
    pub task_stream: String,
    /// 가져간 작업의 임대 시간. 지나면 다른 워커가 다시 가져갈 수 있습니다 (기본값: 300초)
    pub task_lease: Duration,
    /// 하루 제출 한도 (기본값: 5)
    pub max_daily_submissions: i64,
}

impl Config {
    /// 환경변수에서 설정값을 읽어 Config 인스턴스를 생성합니다.
    ///
    /// # 에러
    /// `DATABASE_URL`과 `JWT_SECRET`은 필수이며, 없으면 에러가 발생합니다.
    /// 나머지 설정은 기본값이 있어 환경변수가 없어도 동작합니다.
    pub fn from_env() -> Result<Self, env::VarError> {
        // 포트를 먼저 읽어야 콜백 주소의 기본값을 만들 수 있습니다.
        let port: u16 = env::var("PORT")
            .unwrap_or_else(|_| "8080".to_string())
            .parse()
            .unwrap_or(8080);

        Ok(Self {
            database_url: env::var("DATABASE_URL")?, // 필수: 없으면 에러
            jwt_secret: env::var("JWT_SECRET")?,     // 필수: 없으면 에러
            host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port,
            callback_base_url: env::var("CALLBACK_BASE_URL")
                .unwrap_or_else(|_| format!("http://localhost:{}", port)),
            ml_callback_secret: env::var("ML_CALLBACK_SECRET").unwrap_or_default(),
            task_stream: env::var("TASK_STREAM")
                .unwrap_or_else(|_| "analysis_tasks".to_string()),
            task_lease: Duration::from_secs(
                env::var("TASK_LEASE_SECS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .filter(|secs: &u64| *secs > 0)
                    .unwrap_or(300),
            ),
            max_daily_submissions: env::var("MAX_DAILY_SUBMISSIONS")
                .ok()
                .and_then(|v| v.parse().ok())
                .filter(|limit: &i64| *limit > 0)
                .unwrap_or(5),
        })
    }

    /// 작업 메시지에 실어 보낼 절대 콜백 URL
    ///
    /// 기본 주소 끝에 `/`가 붙어 있어도 경로가 `//`로 겹치지 않게 합니다.
    pub fn callback_url(&self) -> String {
        format!("{}{}", self.callback_base_url.trim_end_matches('/'), CALLBACK_PATH)
    }
}
