use crate::error::ApiError;
use crate::models::course::{Course, Question, Quiz};
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId};
use mongodb::Database;

/// Read access to the course catalog.
pub struct CourseService {
    mongo: Database,
}

impl CourseService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// List all active courses, newest first.
    pub async fn list_active(&self) -> Result<Vec<Course>, ApiError> {
        let collection = self.mongo.collection::<Course>("courses");

        let cursor = collection
            .find(doc! { "is_active": true })
            .sort(doc! { "created_at": -1 })
            .await?;

        let courses: Vec<Course> = cursor.try_collect().await?;
        Ok(courses)
    }

    /// Look up a course by its URL slug.
    ///
    /// Inactive courses are still resolvable here: a learner holding a direct
    /// link can finish a course after it is pulled from the catalog.
    pub async fn find_by_slug(&self, slug: &str) -> Result<Option<Course>, ApiError> {
        let collection = self.mongo.collection::<Course>("courses");
        let course = collection.find_one(doc! { "slug": slug }).await?;
        Ok(course)
    }

    /// Fetch the quiz attached to a course, if any. Each course has at most
    /// one quiz (unique index on course_id).
    pub async fn find_quiz_for_course(
        &self,
        course_id: &ObjectId,
    ) -> Result<Option<Quiz>, ApiError> {
        let collection = self.mongo.collection::<Quiz>("quizzes");
        let quiz = collection.find_one(doc! { "course_id": course_id }).await?;
        Ok(quiz)
    }

    /// Fetch all questions belonging to a quiz.
    pub async fn list_questions(&self, quiz_id: &ObjectId) -> Result<Vec<Question>, ApiError> {
        let collection = self.mongo.collection::<Question>("questions");
        let cursor = collection.find(doc! { "quiz_id": quiz_id }).await?;
        let questions: Vec<Question> = cursor.try_collect().await?;
        Ok(questions)
    }
}
