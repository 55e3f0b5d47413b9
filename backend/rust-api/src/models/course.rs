use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};

use super::user::bson_datetime_as_chrono;

/// Course stored in MongoDB "courses" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub category: Category,
    pub difficulty: Difficulty,
    /// Estimated duration in minutes
    pub duration: i32,
    /// Course content in markdown or HTML
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    #[serde(default = "default_is_active")]
    pub is_active: bool,
    #[serde(with = "bson_datetime_as_chrono")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "bson_datetime_as_chrono")]
    pub updated_at: DateTime<Utc>,
}

fn default_is_active() -> bool {
    true
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Programming,
    Design,
    Blockchain,
    Business,
    Ai,
    Data,
    Other,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Beginner,
    Intermediate,
    Advanced,
}

/// Quiz stored in MongoDB "quizzes" collection (one per course)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Quiz {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub course_id: ObjectId,
    /// Percentage needed to pass
    #[serde(default = "default_passing_score")]
    pub passing_score: i32,
    /// Time limit in minutes
    #[serde(default = "default_time_limit")]
    pub time_limit: i32,
}

fn default_passing_score() -> i32 {
    70
}

fn default_time_limit() -> i32 {
    30
}

/// Question stored in MongoDB "questions" collection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub quiz_id: ObjectId,
    pub question_text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub correct_answer: AnswerOption,
    #[serde(default = "default_points")]
    pub points: i32,
}

fn default_points() -> i32 {
    1
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum AnswerOption {
    A,
    B,
    C,
    D,
}

impl AnswerOption {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnswerOption::A => "A",
            AnswerOption::B => "B",
            AnswerOption::C => "C",
            AnswerOption::D => "D",
        }
    }
}

/// Course as returned by the catalog listing
#[derive(Debug, Serialize)]
pub struct CourseSummary {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub category: Category,
    pub difficulty: Difficulty,
    pub duration: i32,
}

impl From<Course> for CourseSummary {
    fn from(course: Course) -> Self {
        CourseSummary {
            id: course.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: course.title,
            slug: course.slug,
            description: course.description,
            category: course.category,
            difficulty: course.difficulty,
            duration: course.duration,
        }
    }
}

/// Course detail including the full content body
#[derive(Debug, Serialize)]
pub struct CourseDetail {
    pub id: String,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub category: Category,
    pub difficulty: Difficulty,
    pub duration: i32,
    pub content: String,
}

impl From<Course> for CourseDetail {
    fn from(course: Course) -> Self {
        CourseDetail {
            id: course.id.map(|id| id.to_hex()).unwrap_or_default(),
            title: course.title,
            slug: course.slug,
            description: course.description,
            category: course.category,
            difficulty: course.difficulty,
            duration: course.duration,
            content: course.content,
        }
    }
}

/// Quiz as served to a learner. Never exposes correct answers.
#[derive(Debug, Serialize)]
pub struct QuizView {
    pub passing_score: i32,
    pub time_limit: i32,
    pub questions: Vec<QuestionView>,
}

impl QuizView {
    pub fn from_quiz(quiz: &Quiz, questions: Vec<Question>) -> Self {
        QuizView {
            passing_score: quiz.passing_score,
            time_limit: quiz.time_limit,
            questions: questions.into_iter().map(QuestionView::from).collect(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct QuestionView {
    pub id: String,
    pub question_text: String,
    pub option_a: String,
    pub option_b: String,
    pub option_c: String,
    pub option_d: String,
    pub points: i32,
}

impl From<Question> for QuestionView {
    fn from(question: Question) -> Self {
        QuestionView {
            id: question.id.map(|id| id.to_hex()).unwrap_or_default(),
            question_text: question.question_text,
            option_a: question.option_a,
            option_b: question.option_b,
            option_c: question.option_c,
            option_d: question.option_d,
            points: question.points,
        }
    }
}
