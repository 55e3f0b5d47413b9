use crate::error::ApiError;
use crate::models::course::Course;
use crate::models::progress::{ProgressCourseRef, ProgressEntry, UserProgress};
use crate::services::is_duplicate_key_error;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson};
use mongodb::options::ReturnDocument;
use mongodb::Database;
use std::collections::HashMap;

/// Tracks each learner's per-course progress ledger.
///
/// One document per (user, course) pair, enforced by a compound unique
/// index. The score only ever goes up and `completed` never flips back.
pub struct ProgressService {
    mongo: Database,
}

impl ProgressService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Record a quiz attempt, creating the progress document on first
    /// contact with the course.
    ///
    /// `$max` keeps the best score across attempts and also writes the
    /// field on insert, so it does not conflict with the `$setOnInsert`
    /// block. Returns the post-update document.
    pub async fn record_attempt(
        &self,
        user_id: &ObjectId,
        course_id: &ObjectId,
        score: i32,
    ) -> Result<UserProgress, ApiError> {
        let collection = self.mongo.collection::<UserProgress>("user_progress");

        let filter = doc! { "user_id": user_id, "course_id": course_id };
        let update = doc! {
            "$max": { "score": score },
            "$setOnInsert": {
                "user_id": user_id,
                "course_id": course_id,
                "completed": false,
                "started_at": mongodb::bson::DateTime::now(),
                "completed_at": Bson::Null,
            },
        };

        let result = collection
            .find_one_and_update(filter.clone(), update.clone())
            .upsert(true)
            .return_document(ReturnDocument::After)
            .await;

        match result {
            Ok(Some(progress)) => Ok(progress),
            Ok(None) => Err(ApiError::internal("Progress upsert returned no document")),
            // Two first attempts racing on the unique index: retry once,
            // the document now exists
            Err(e) if is_duplicate_key_error(&e) => {
                let progress = collection
                    .find_one_and_update(filter, update)
                    .return_document(ReturnDocument::After)
                    .await?
                    .ok_or_else(|| ApiError::internal("Progress document vanished after race"))?;
                Ok(progress)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Mark a course completed. Safe to call again on later passes; the
    /// completion timestamp reflects the most recent passing attempt.
    pub async fn mark_completed(
        &self,
        user_id: &ObjectId,
        course_id: &ObjectId,
    ) -> Result<(), ApiError> {
        let collection = self.mongo.collection::<UserProgress>("user_progress");

        collection
            .update_one(
                doc! { "user_id": user_id, "course_id": course_id },
                doc! { "$set": {
                    "completed": true,
                    "completed_at": mongodb::bson::DateTime::now(),
                } },
            )
            .await?;

        Ok(())
    }

    /// List all progress entries for a user with course titles joined in,
    /// newest course first.
    pub async fn list_for_user(&self, user_id: &ObjectId) -> Result<Vec<ProgressEntry>, ApiError> {
        let progress_collection = self.mongo.collection::<UserProgress>("user_progress");

        let cursor = progress_collection
            .find(doc! { "user_id": user_id })
            .sort(doc! { "started_at": -1 })
            .await?;
        let progress_rows: Vec<UserProgress> = cursor.try_collect().await?;

        if progress_rows.is_empty() {
            return Ok(Vec::new());
        }

        // Join course titles in one query instead of per-row lookups
        let course_ids: Vec<ObjectId> = progress_rows.iter().map(|p| p.course_id).collect();
        let courses_collection = self.mongo.collection::<Course>("courses");
        let cursor = courses_collection
            .find(doc! { "_id": { "$in": &course_ids } })
            .await?;
        let courses: Vec<Course> = cursor.try_collect().await?;

        let course_map: HashMap<ObjectId, &Course> = courses
            .iter()
            .filter_map(|c| c.id.map(|id| (id, c)))
            .collect();

        let entries = progress_rows
            .iter()
            .filter_map(|p| {
                course_map.get(&p.course_id).map(|course| ProgressEntry {
                    course: ProgressCourseRef {
                        title: course.title.clone(),
                        slug: course.slug.clone(),
                    },
                    completed: p.completed,
                    score: p.score,
                    started_at: p.started_at,
                    completed_at: p.completed_at,
                })
            })
            .collect();

        Ok(entries)
    }
}
