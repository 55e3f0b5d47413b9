use crate::error::ApiError;
use crate::metrics::CERTIFICATES_ISSUED_TOTAL;
use crate::models::certificate::{
    new_certificate_id, Certificate, CertificateCourse, CertificateCourseRef, CertificateDetail,
    CertificateSummary, CertificateUser, UpdateBlockchainRequest,
};
use crate::models::course::Course;
use crate::models::user::User;
use crate::services::is_duplicate_key_error;
use futures::stream::TryStreamExt;
use mongodb::bson::{doc, oid::ObjectId, Bson};
use mongodb::Database;
use std::collections::HashMap;

/// Issues and queries course completion certificates.
///
/// At most one certificate exists per (user, course) pair; the first
/// passing attempt wins and later passes return the same document.
pub struct CertificateService {
    mongo: Database,
}

impl CertificateService {
    pub fn new(mongo: Database) -> Self {
        Self { mongo }
    }

    /// Issue a certificate for a passed course, or return the existing one.
    ///
    /// `$setOnInsert` under the compound unique index makes this a single
    /// atomic get-or-create: concurrent passing submissions cannot mint
    /// two certificates. The stored score is the score of the attempt
    /// that first issued the certificate.
    pub async fn issue(
        &self,
        user_id: &ObjectId,
        course_id: &ObjectId,
        score: i32,
    ) -> Result<Certificate, ApiError> {
        let collection = self.mongo.collection::<Certificate>("certificates");

        let filter = doc! { "user_id": user_id, "course_id": course_id };
        let update = doc! {
            "$setOnInsert": {
                "user_id": user_id,
                "course_id": course_id,
                "certificate_id": new_certificate_id(),
                "score": score,
                "issued_at": mongodb::bson::DateTime::now(),
                "nft_token_id": Bson::Null,
                "transaction_hash": Bson::Null,
                "blockchain_minted": false,
            },
        };

        let upsert_result = collection
            .update_one(filter.clone(), update)
            .upsert(true)
            .await;

        match upsert_result {
            Ok(result) => {
                if let Some(upserted_id) = result.upserted_id {
                    CERTIFICATES_ISSUED_TOTAL.inc();
                    tracing::info!(
                        user_id = %user_id.to_hex(),
                        course_id = %course_id.to_hex(),
                        certificate_oid = %upserted_id,
                        score = score,
                        "Issued new certificate"
                    );
                }
            }
            // A concurrent submission inserted first; the read below
            // picks up the winner
            Err(e) if is_duplicate_key_error(&e) => {}
            Err(e) => return Err(e.into()),
        }

        collection
            .find_one(filter)
            .await?
            .ok_or_else(|| ApiError::internal("Certificate missing after upsert"))
    }

    /// List all certificates owned by a user, newest first, with course
    /// titles joined in.
    pub async fn list_for_user(
        &self,
        user_id: &ObjectId,
    ) -> Result<Vec<CertificateSummary>, ApiError> {
        let certificates_collection = self.mongo.collection::<Certificate>("certificates");

        let cursor = certificates_collection
            .find(doc! { "user_id": user_id })
            .sort(doc! { "issued_at": -1 })
            .await?;
        let certificates: Vec<Certificate> = cursor.try_collect().await?;

        if certificates.is_empty() {
            return Ok(Vec::new());
        }

        let course_ids: Vec<ObjectId> = certificates.iter().map(|c| c.course_id).collect();
        let courses_collection = self.mongo.collection::<Course>("courses");
        let cursor = courses_collection
            .find(doc! { "_id": { "$in": &course_ids } })
            .await?;
        let courses: Vec<Course> = cursor.try_collect().await?;

        let course_map: HashMap<ObjectId, &Course> = courses
            .iter()
            .filter_map(|c| c.id.map(|id| (id, c)))
            .collect();

        let summaries = certificates
            .iter()
            .filter_map(|cert| {
                course_map.get(&cert.course_id).map(|course| CertificateSummary {
                    certificate_id: cert.certificate_id.clone(),
                    course: CertificateCourseRef {
                        title: course.title.clone(),
                        slug: course.slug.clone(),
                    },
                    score: cert.score,
                    issued_at: cert.issued_at,
                    blockchain_minted: cert.blockchain_minted,
                    transaction_hash: cert.transaction_hash.clone(),
                    nft_token_id: cert.nft_token_id.clone(),
                })
            })
            .collect();

        Ok(summaries)
    }

    /// Look up a certificate by its public identifier.
    pub async fn find_by_certificate_id(
        &self,
        certificate_id: &str,
    ) -> Result<Option<Certificate>, ApiError> {
        let collection = self.mongo.collection::<Certificate>("certificates");
        let certificate = collection
            .find_one(doc! { "certificate_id": certificate_id })
            .await?;
        Ok(certificate)
    }

    /// Build the public detail view for a certificate: holder, course and
    /// blockchain metadata.
    pub async fn detail(
        &self,
        certificate_id: &str,
    ) -> Result<Option<CertificateDetail>, ApiError> {
        let certificate = match self.find_by_certificate_id(certificate_id).await? {
            Some(cert) => cert,
            None => return Ok(None),
        };

        let users_collection = self.mongo.collection::<User>("users");
        let user = users_collection
            .find_one(doc! { "_id": certificate.user_id })
            .await?
            .ok_or_else(|| ApiError::internal("Certificate references missing user"))?;

        let courses_collection = self.mongo.collection::<Course>("courses");
        let course = courses_collection
            .find_one(doc! { "_id": certificate.course_id })
            .await?
            .ok_or_else(|| ApiError::internal("Certificate references missing course"))?;

        Ok(Some(CertificateDetail {
            certificate_id: certificate.certificate_id,
            user: CertificateUser {
                username: user.username,
                wallet_address: user.wallet_address,
            },
            course: CertificateCourse {
                title: course.title,
                category: course.category,
                difficulty: course.difficulty,
            },
            score: certificate.score,
            issued_at: certificate.issued_at,
            blockchain_minted: certificate.blockchain_minted,
            transaction_hash: certificate.transaction_hash,
            nft_token_id: certificate.nft_token_id,
        }))
    }

    /// Attach on-chain mint metadata to a certificate the caller owns.
    ///
    /// Scoping the filter by owner means someone else's certificate_id
    /// behaves exactly like a nonexistent one.
    pub async fn update_blockchain(
        &self,
        user_id: &ObjectId,
        req: &UpdateBlockchainRequest,
    ) -> Result<(), ApiError> {
        let collection = self.mongo.collection::<Certificate>("certificates");

        let result = collection
            .update_one(
                doc! { "certificate_id": &req.certificate_id, "user_id": user_id },
                doc! { "$set": {
                    "transaction_hash": &req.transaction_hash,
                    "nft_token_id": &req.nft_token_id,
                    "blockchain_minted": true,
                } },
            )
            .await?;

        if result.matched_count == 0 {
            return Err(ApiError::not_found("Certificate not found"));
        }

        tracing::info!(
            certificate_id = %req.certificate_id,
            transaction_hash = %req.transaction_hash,
            "Recorded blockchain mint for certificate"
        );

        Ok(())
    }

    /// Resolve a certificate the caller owns, for the mint endpoint.
    pub async fn find_owned(
        &self,
        user_id: &ObjectId,
        certificate_id: &str,
    ) -> Result<Option<Certificate>, ApiError> {
        let collection = self.mongo.collection::<Certificate>("certificates");
        let certificate = collection
            .find_one(doc! { "certificate_id": certificate_id, "user_id": user_id })
            .await?;
        Ok(certificate)
    }
}
