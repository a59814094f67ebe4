use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// `last_submit_date` 컬럼의 저장 형식 (UTC 달력 날짜)
pub const SUBMIT_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub daily_submit_count: i64,
    pub last_submit_date: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl User {
    /// Last day this user submitted, if it was recorded in a readable form.
    pub fn last_submit_day(&self) -> Option<NaiveDate> {
        self.last_submit_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, SUBMIT_DATE_FORMAT).ok())
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub email: String,
    pub created_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            created_at: user.created_at,
        }
    }
}

/// `GET /auth/me` body: the user plus today's quota usage.
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub daily_submit_count: i64,
    pub daily_submit_limit: i64,
}

#[derive(Debug, Deserialize)]
pub struct SignupRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub access_token: String,
    pub refresh_token: String,
}
