use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Extension, Json,
};
use mongodb::bson::oid::ObjectId;
use std::sync::Arc;

use crate::{
    error::ApiError,
    extractors::AppJson,
    middlewares::auth::JwtClaims,
    models::course::{CourseDetail, CourseSummary},
    models::progress::SubmitQuizRequest,
    services::{
        course_service::CourseService, progress_service::ProgressService,
        quiz_service::QuizService, AppState,
    },
};

fn caller_id(claims: &JwtClaims) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(&claims.sub).map_err(|_| ApiError::unauthorized("Invalid token subject"))
}

/// GET /api/courses - List all active courses
pub async fn list_courses(
    State(state): State<Arc<AppState>>,
) -> Result<impl IntoResponse, ApiError> {
    let service = CourseService::new(state.mongo.clone());
    let courses = service.list_active().await?;

    let summaries: Vec<CourseSummary> = courses.into_iter().map(CourseSummary::from).collect();

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "courses": summaries })),
    ))
}

/// GET /api/courses/{slug} - Course detail including content
pub async fn course_detail(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = CourseService::new(state.mongo.clone());
    let course = service
        .find_by_slug(&slug)
        .await?
        .ok_or_else(|| ApiError::not_found("Course not found"))?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "course": CourseDetail::from(course) })),
    ))
}

/// GET /api/courses/{slug}/quiz - Quiz questions for a course (protected)
pub async fn quiz_view(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = QuizService::new(state.mongo.clone());
    let quiz = service.quiz_for_course(&slug).await?;

    Ok((StatusCode::OK, Json(serde_json::json!({ "quiz": quiz }))))
}

/// POST /api/courses/{slug}/submit - Submit quiz answers (protected)
pub async fn submit_quiz(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(slug): Path<String>,
    AppJson(req): AppJson<SubmitQuizRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = caller_id(&claims)?;

    tracing::info!(
        user_id = %claims.sub,
        course_slug = %slug,
        answers = req.answers.len(),
        "Quiz submission received"
    );

    let service = QuizService::new(state.mongo.clone());
    let response = service.submit(&user_id, &slug, &req.answers).await?;

    Ok((StatusCode::OK, Json(response)))
}

/// GET /api/courses/progress - Progress across all courses (protected)
pub async fn user_progress(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = caller_id(&claims)?;

    let service = ProgressService::new(state.mongo.clone());
    let entries = service.list_for_user(&user_id).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "progress": entries })),
    ))
}
