//! # 글(Writing) 모델 정의
//!
//! 사용자가 작성하는 자기소개서/에세이와 그 제출 상태를 표현합니다.
//!
//! ## 상태 흐름 (제출 관점)
//! ```text
//! draft ──(제출)──▶ submitted ──(분석 완료 콜백)──▶ analyzed
//! ```
//! 상태는 앞으로만 진행합니다. 분석이 최종 실패(failed)하면 글은 `submitted`에
//! 그대로 머무르며, 강제로 다른 최종 상태로 옮기지 않습니다.

use super::UnknownVariant;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 글 본문의 최대 길이 (문자 수 기준, 바이트가 아님)
pub const MAX_CONTENT_CHARS: usize = 2000;
/// 제목의 최대 길이 (문자 수 기준)
pub const MAX_TITLE_CHARS: usize = 255;

/// 글의 제출 상태
///
/// `Serialize`/`Deserialize`는 `"draft"`, `"submitted"`, `"analyzed"` 문자열로 변환됩니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritingStatus {
    Draft,
    Submitted,
    Analyzed,
}

impl WritingStatus {
    /// DB 컬럼에 저장되는 문자열
    pub fn as_str(self) -> &'static str {
        match self {
            WritingStatus::Draft => "draft",
            WritingStatus::Submitted => "submitted",
            WritingStatus::Analyzed => "analyzed",
        }
    }
}

impl fmt::Display for WritingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// TryFrom<String>: sqlx가 TEXT 컬럼을 읽은 뒤 이 변환으로 enum을 만듭니다.
impl TryFrom<String> for WritingStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "draft" => Ok(WritingStatus::Draft),
            "submitted" => Ok(WritingStatus::Submitted),
            "analyzed" => Ok(WritingStatus::Analyzed),
            _ => Err(UnknownVariant { kind: "writing status", value }),
        }
    }
}

/// 글의 종류. 워커는 종류에 따라 다른 피드백 프롬프트를 사용합니다.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WritingType {
    Essay,
    CoverLetter,
}

impl WritingType {
    pub fn as_str(self) -> &'static str {
        match self {
            WritingType::Essay => "essay",
            WritingType::CoverLetter => "cover_letter",
        }
    }
}

impl TryFrom<String> for WritingType {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "essay" => Ok(WritingType::Essay),
            "cover_letter" => Ok(WritingType::CoverLetter),
            _ => Err(UnknownVariant { kind: "writing type", value }),
        }
    }
}

/// 글 엔티티: DB의 `writings` 테이블 한 행에 대응합니다.
///
/// `#[sqlx(try_from = "String")]`: 컬럼을 먼저 String으로 읽고
/// `TryFrom<String>` 구현으로 enum으로 바꿉니다. 알 수 없는 값이면 디코딩 에러가 됩니다.
///
/// `type`은 Rust 예약어라서 필드 이름은 `writing_type`으로 두고,
/// `#[sqlx(rename)]`/`#[serde(rename)]`으로 컬럼/JSON 이름을 맞춥니다.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct Writing {
    pub id: String,
    /// 작성자(소유자) ID
    pub user_id: String,
    #[sqlx(rename = "type", try_from = "String")]
    #[serde(rename = "type")]
    pub writing_type: WritingType,
    pub title: String,
    pub content: String,
    #[sqlx(try_from = "String")]
    pub status: WritingStatus,
    pub created_at: String,
    pub updated_at: String,
    /// 제출 시각. 제출 전이면 None
    pub submitted_at: Option<String>,
}

/// 글 생성 요청: `POST /api/v1/writings`
#[derive(Debug, Deserialize)]
pub struct CreateWritingRequest {
    #[serde(rename = "type")]
    pub writing_type: WritingType,
    pub title: String,
    pub content: String,
}

/// 글 수정 요청: `PUT /api/v1/writings/{id}`
///
/// 포함된 필드만 바꿉니다. 상태(status)는 여기서 바꿀 수 없습니다.
#[derive(Debug, Deserialize)]
pub struct UpdateWritingRequest {
    #[serde(rename = "type")]
    pub writing_type: Option<WritingType>,
    pub title: Option<String>,
    pub content: Option<String>,
}

/// 목록 조회 쿼리스트링: `GET /api/v1/writings?page=1&limit=10`
#[derive(Debug, Deserialize)]
pub struct ListWritingsQuery {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// 목록 조회 응답 (페이지네이션 정보 포함)
#[derive(Debug, Serialize)]
pub struct WritingListResponse {
    pub writings: Vec<Writing>,
    pub total: i64,
    pub page: i64,
    pub limit: i64,
    pub total_pages: i64,
}
