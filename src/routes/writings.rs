//! # 글(Writing) 라우트 핸들러
//!
//! 로그인한 사용자가 자기 글을 만들고, 조회하고, 고치고, 지우는 핸들러입니다.
//!
//! ## 엔드포인트
//! - `GET    /api/v1/writings?page=1&limit=10` → 내 글 목록 (최근 수정순)
//! - `POST   /api/v1/writings`                 → 새 글(draft) 생성
//! - `GET    /api/v1/writings/{id}`            → 글 하나 조회
//! - `PUT    /api/v1/writings/{id}`            → 초안 수정 (부분 업데이트)
//! - `DELETE /api/v1/writings/{id}`            → 초안 삭제
//!
//! ## 소유권
//! 모든 단건 핸들러는 먼저 글을 찾고(없으면 404), 작성자가 아니면 403을 돌려줍니다.
//!
//! ## 상태는 CRUD로 바꿀 수 없음
//! 제출된 글은 분석 기록과 묶여 있으므로 수정/삭제할 수 없습니다 (400).
//! `status`는 제출 흐름과 콜백 처리에서만 바뀝니다.

use crate::{
    db,
    error::AppError,
    middleware::auth::AuthUser,
    models::*,
    routes::{validate_id, AppJson, AppPath, AppQuery, AppState},
};
use axum::{extract::State, http::StatusCode, Json};

/// 페이지 크기 기본값과 최댓값
const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

/// `GET /writings`: 내 글 목록을 페이지 단위로 조회합니다.
pub async fn list_writings(
    State(state): State<AppState>,
    auth_user: AuthUser,
    AppQuery(query): AppQuery<ListWritingsQuery>,
) -> Result<Json<WritingListResponse>, AppError> {
    let page = query.page.unwrap_or(1);
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_SIZE);
    if page < 1 {
        return Err(AppError::Validation("page must be at least 1".to_string()));
    }
    if !(1..=MAX_PAGE_SIZE).contains(&limit) {
        return Err(AppError::Validation(format!(
            "limit must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    let offset = (page - 1).saturating_mul(limit);
    let (writings, total) =
        db::writings::list_by_user(&state.pool, &auth_user.user_id, offset, limit).await?;

    // 올림 나눗셈: 글이 0개면 0페이지
    let total_pages = (total + limit - 1) / limit;

    Ok(Json(WritingListResponse {
        writings,
        total,
        page,
        limit,
        total_pages,
    }))
}

/// `POST /writings`: 새 글을 draft 상태로 만듭니다. 성공 시 201.
pub async fn create_writing(
    State(state): State<AppState>,
    auth_user: AuthUser,
    AppJson(req): AppJson<CreateWritingRequest>,
) -> Result<(StatusCode, Json<Writing>), AppError> {
    validate_title(&req.title)?;
    validate_content(&req.content)?;
    if req.content.trim().is_empty() {
        return Err(AppError::Validation("Content is required".to_string()));
    }

    let writing = db::writings::create_writing(&state.pool, &auth_user.user_id, &req).await?;
    tracing::debug!(writing_id = %writing.id, user_id = %auth_user.user_id, "Writing created");

    Ok((StatusCode::CREATED, Json(writing)))
}

/// `GET /writings/{id}`: 내 글 하나를 조회합니다.
pub async fn get_writing(
    State(state): State<AppState>,
    auth_user: AuthUser,
    AppPath(id): AppPath<String>,
) -> Result<Json<Writing>, AppError> {
    let writing = find_owned(&state, &id, &auth_user).await?;
    Ok(Json(writing))
}

/// `PUT /writings/{id}`: 초안의 종류/제목/본문을 고칩니다.
///
/// 본문에 포함된 필드만 바꿉니다. 제출된 글이면 400입니다.
pub async fn update_writing(
    State(state): State<AppState>,
    auth_user: AuthUser,
    AppPath(id): AppPath<String>,
    AppJson(req): AppJson<UpdateWritingRequest>,
) -> Result<Json<Writing>, AppError> {
    if let Some(title) = &req.title {
        validate_title(title)?;
    }
    if let Some(content) = &req.content {
        validate_content(content)?;
    }

    find_owned(&state, &id, &auth_user).await?;

    // 조회와 수정 사이에 제출되었다면 UPDATE의 status 조건에 걸려 None이 됩니다.
    let writing = db::writings::update_draft(&state.pool, &id, &req)
        .await?
        .ok_or_else(not_a_draft)?;

    Ok(Json(writing))
}

/// `DELETE /writings/{id}`: 초안을 삭제합니다. 성공 시 204.
pub async fn delete_writing(
    State(state): State<AppState>,
    auth_user: AuthUser,
    AppPath(id): AppPath<String>,
) -> Result<StatusCode, AppError> {
    find_owned(&state, &id, &auth_user).await?;

    if !db::writings::delete_draft(&state.pool, &id).await? {
        return Err(not_a_draft());
    }

    tracing::debug!(writing_id = %id, "Writing deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// 글을 찾고 소유자를 확인합니다.
///
/// ID 형식 오류(400) → 없음(404) → 남의 글(403) 순서로 검사합니다.
pub(crate) async fn find_owned(
    state: &AppState,
    id: &str,
    auth_user: &AuthUser,
) -> Result<Writing, AppError> {
    validate_id(id, "writing")?;

    let writing = db::writings::find_by_id(&state.pool, id)
        .await?
        .ok_or_else(|| AppError::NotFound("Writing not found".to_string()))?;

    if writing.user_id != auth_user.user_id {
        return Err(AppError::Forbidden("Access denied".to_string()));
    }

    Ok(writing)
}

fn validate_title(title: &str) -> Result<(), AppError> {
    let len = title.trim().chars().count();
    if len == 0 || title.chars().count() > MAX_TITLE_CHARS {
        return Err(AppError::Validation(format!(
            "Title must be between 1 and {} characters",
            MAX_TITLE_CHARS
        )));
    }
    Ok(())
}

/// 길이는 바이트가 아니라 문자(char) 수로 셉니다. 한글 한 글자도 1자입니다.
fn validate_content(content: &str) -> Result<(), AppError> {
    if content.chars().count() > MAX_CONTENT_CHARS {
        return Err(AppError::Validation(format!(
            "Content exceeds maximum length of {} characters",
            MAX_CONTENT_CHARS
        )));
    }
    Ok(())
}

fn not_a_draft() -> AppError {
    AppError::Validation("Only draft writings can be modified".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::routes::{router, testing::*};
    use crate::test_support::{seed_user, seed_writing, test_pool, RecordingPublisher};
    use serde_json::json;
    use std::sync::Arc;

    async fn app() -> (axum::Router, sqlx::SqlitePool) {
        let pool = test_pool().await;
        let app = router(state(pool.clone(), Arc::new(RecordingPublisher::default())));
        (app, pool)
    }

    #[test]
    fn content_limit_counts_characters() {
        // 2000자 한글은 6000바이트지만 허용됩니다.
        assert!(validate_content(&"가".repeat(2000)).is_ok());
        assert!(validate_content(&"가".repeat(2001)).is_err());
        assert!(validate_title("   ").is_err());
        assert!(validate_title(&"a".repeat(256)).is_err());
    }

    #[tokio::test]
    async fn create_and_list_own_writings() {
        let (app, pool) = app().await;
        let user = seed_user(&pool, "writer@example.com").await;
        let auth = bearer(&user.id);

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/writings",
            Some(&auth),
            Some(json!({ "type": "cover_letter", "title": "자기소개서", "content": "안녕하세요." })),
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body["type"], "cover_letter");
        assert_eq!(body["status"], "draft");
        assert!(body["submitted_at"].is_null());

        // 다른 사람의 글은 목록에 섞이지 않습니다.
        let other = seed_user(&pool, "other@example.com").await;
        seed_writing(&pool, &other.id).await;

        let (status, body) = send(&app, "GET", "/api/v1/writings?page=1&limit=10", Some(&auth), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["total"], 1);
        assert_eq!(body["total_pages"], 1);
        assert_eq!(body["writings"].as_array().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn rejects_bad_input() {
        let (app, pool) = app().await;
        let user = seed_user(&pool, "bad@example.com").await;
        let auth = bearer(&user.id);

        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/writings",
            Some(&auth),
            Some(json!({ "type": "essay", "title": "t", "content": "a".repeat(2001) })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        // 알 수 없는 type은 역직렬화 단계에서 걸립니다.
        let (status, body) = send(
            &app,
            "POST",
            "/api/v1/writings",
            Some(&auth),
            Some(json!({ "type": "poem", "title": "t", "content": "c" })),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");

        let (status, _) = send(&app, "GET", "/api/v1/writings?limit=101", Some(&auth), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "GET", "/api/v1/writings/not-a-uuid", Some(&auth), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn requires_login() {
        let (app, _pool) = app().await;
        let (status, body) = send(&app, "GET", "/api/v1/writings", None, None).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn other_users_writing_is_forbidden() {
        let (app, pool) = app().await;
        let owner = seed_user(&pool, "owner@example.com").await;
        let intruder = seed_user(&pool, "intruder@example.com").await;
        let writing = seed_writing(&pool, &owner.id).await;
        let uri = format!("/api/v1/writings/{}", writing.id);

        let (status, _) = send(&app, "GET", &uri, Some(&bearer(&intruder.id)), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let (status, _) = send(&app, "DELETE", &uri, Some(&bearer(&intruder.id)), None).await;
        assert_eq!(status, StatusCode::FORBIDDEN);

        let missing = format!("/api/v1/writings/{}", uuid::Uuid::now_v7());
        let (status, _) = send(&app, "GET", &missing, Some(&bearer(&owner.id)), None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn submitted_writing_is_frozen() {
        let (app, pool) = app().await;
        let user = seed_user(&pool, "frozen@example.com").await;
        let writing = seed_writing(&pool, &user.id).await;
        db::writings::conditional_update_status(
            &pool,
            &writing.id,
            WritingStatus::Draft,
            WritingStatus::Submitted,
            None,
        )
        .await
        .unwrap();
        let uri = format!("/api/v1/writings/{}", writing.id);
        let auth = bearer(&user.id);

        let (status, _) = send(&app, "PUT", &uri, Some(&auth), Some(json!({ "content": "고친 본문" }))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, "DELETE", &uri, Some(&auth), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let stored = db::writings::find_by_id(&pool, &writing.id).await.unwrap().unwrap();
        assert_eq!(stored.content, writing.content);
    }

    #[tokio::test]
    async fn draft_update_and_delete() {
        let (app, pool) = app().await;
        let user = seed_user(&pool, "draft@example.com").await;
        let writing = seed_writing(&pool, &user.id).await;
        let uri = format!("/api/v1/writings/{}", writing.id);
        let auth = bearer(&user.id);

        let (status, body) = send(&app, "PUT", &uri, Some(&auth), Some(json!({ "title": "새 제목" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["title"], "새 제목");
        assert_eq!(body["content"], writing.content);

        let (status, body) = send(&app, "DELETE", &uri, Some(&auth), None).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert!(body.is_null());
        assert!(db::writings::find_by_id(&pool, &writing.id).await.unwrap().is_none());
    }
}
