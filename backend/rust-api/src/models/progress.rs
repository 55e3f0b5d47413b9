use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::user::{bson_datetime_as_chrono, bson_datetime_as_chrono_option};

/// Per-user, per-course progress row stored in "user_progress".
///
/// At most one row exists per (user_id, course_id); `score` holds the best
/// result achieved so far and never decreases, `completed` never reverts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProgress {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub course_id: ObjectId,
    #[serde(default)]
    pub completed: bool,
    #[serde(default)]
    pub score: i32,
    #[serde(with = "bson_datetime_as_chrono")]
    pub started_at: DateTime<Utc>,
    #[serde(default, with = "bson_datetime_as_chrono_option")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Quiz submission payload: question id (hex) -> chosen option letter.
///
/// A missing `answers` key means an empty attempt, which simply scores zero.
#[derive(Debug, Deserialize)]
pub struct SubmitQuizRequest {
    #[serde(default)]
    pub answers: HashMap<String, String>,
}

#[derive(Debug, Serialize)]
pub struct SubmitQuizResponse {
    pub success: bool,
    pub passed: bool,
    pub score: i32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_id: Option<String>,
    pub message: String,
}

/// Progress entry as returned by GET /api/courses/progress
#[derive(Debug, Serialize)]
pub struct ProgressEntry {
    pub course: ProgressCourseRef,
    pub completed: bool,
    pub score: i32,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Serialize)]
pub struct ProgressCourseRef {
    pub title: String,
    pub slug: String,
}
