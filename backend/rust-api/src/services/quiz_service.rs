use crate::error::ApiError;
use crate::metrics::QUIZ_SUBMISSIONS_TOTAL;
use crate::models::course::QuizView;
use crate::models::progress::SubmitQuizResponse;
use crate::services::certificate_service::CertificateService;
use crate::services::course_service::CourseService;
use crate::services::progress_service::ProgressService;
use crate::services::scoring;
use mongodb::bson::oid::ObjectId;
use mongodb::Database;
use std::collections::HashMap;

/// Orchestrates quiz delivery and submission: grading, progress update
/// and certificate issuance in one flow.
pub struct QuizService {
    courses: CourseService,
    progress: ProgressService,
    certificates: CertificateService,
}

impl QuizService {
    pub fn new(mongo: Database) -> Self {
        Self {
            courses: CourseService::new(mongo.clone()),
            progress: ProgressService::new(mongo.clone()),
            certificates: CertificateService::new(mongo),
        }
    }

    /// Build the learner-facing quiz view for a course. Correct answers
    /// never leave the server.
    pub async fn quiz_for_course(&self, slug: &str) -> Result<QuizView, ApiError> {
        let course = self
            .courses
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| ApiError::not_found("Course not found"))?;

        let course_id = course
            .id
            .ok_or_else(|| ApiError::internal("Course document missing _id"))?;

        let quiz = self
            .courses
            .find_quiz_for_course(&course_id)
            .await?
            .ok_or_else(|| ApiError::not_found("No quiz found for this course"))?;

        let quiz_id = quiz
            .id
            .ok_or_else(|| ApiError::internal("Quiz document missing _id"))?;

        let questions = self.courses.list_questions(&quiz_id).await?;

        Ok(QuizView::from_quiz(&quiz, questions))
    }

    /// Grade a submission and apply its consequences.
    ///
    /// Always runs the full sequence: grade, record the attempt (best
    /// score wins), and on a pass mark the course completed and issue the
    /// certificate. Failed attempts after a pass change nothing.
    pub async fn submit(
        &self,
        user_id: &ObjectId,
        slug: &str,
        answers: &HashMap<String, String>,
    ) -> Result<SubmitQuizResponse, ApiError> {
        let course = self
            .courses
            .find_by_slug(slug)
            .await?
            .ok_or_else(|| ApiError::not_found("Course not found"))?;

        let course_id = course
            .id
            .ok_or_else(|| ApiError::internal("Course document missing _id"))?;

        let quiz = self
            .courses
            .find_quiz_for_course(&course_id)
            .await?
            .ok_or_else(|| ApiError::not_found("No quiz found for this course"))?;

        let quiz_id = quiz
            .id
            .ok_or_else(|| ApiError::internal("Quiz document missing _id"))?;

        let questions = self.courses.list_questions(&quiz_id).await?;
        let outcome = scoring::evaluate(&questions, answers, quiz.passing_score);

        self.progress
            .record_attempt(user_id, &course_id, outcome.score)
            .await?;

        if outcome.passed {
            self.progress.mark_completed(user_id, &course_id).await?;

            let certificate = self
                .certificates
                .issue(user_id, &course_id, outcome.score)
                .await?;

            QUIZ_SUBMISSIONS_TOTAL.with_label_values(&["passed"]).inc();
            tracing::info!(
                user_id = %user_id.to_hex(),
                course_slug = %slug,
                score = outcome.score,
                certificate_id = %certificate.certificate_id,
                "Quiz passed"
            );

            Ok(SubmitQuizResponse {
                success: true,
                passed: true,
                score: outcome.score,
                certificate_id: Some(certificate.certificate_id),
                message: "Congratulations! You passed!".to_string(),
            })
        } else {
            QUIZ_SUBMISSIONS_TOTAL.with_label_values(&["failed"]).inc();
            tracing::info!(
                user_id = %user_id.to_hex(),
                course_slug = %slug,
                score = outcome.score,
                passing_score = quiz.passing_score,
                "Quiz failed"
            );

            Ok(SubmitQuizResponse {
                success: true,
                passed: false,
                score: outcome.score,
                certificate_id: None,
                message: format!(
                    "You scored {}%. Pass mark is {}%",
                    outcome.score, quiz.passing_score
                ),
            })
        }
    }
}
