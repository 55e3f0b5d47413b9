use chrono::{DateTime, Utc};
use mongodb::bson::oid::ObjectId;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::course::{Category, Difficulty};
use super::user::bson_datetime_as_chrono;

/// Certificate stored in MongoDB "certificates" collection.
///
/// Issued once per (user_id, course_id) on the first passing submission and
/// never re-issued; `certificate_id`, `score` and `issued_at` are immutable
/// after creation. The blockchain fields start empty and are populated by the
/// out-of-band metadata update.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Certificate {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    pub user_id: ObjectId,
    pub course_id: ObjectId,
    /// Public identifier, "SP-" followed by 8 uppercase hex characters
    pub certificate_id: String,
    /// Score of the submission that triggered issuance
    pub score: i32,
    #[serde(with = "bson_datetime_as_chrono")]
    pub issued_at: DateTime<Utc>,
    #[serde(default)]
    pub nft_token_id: Option<String>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
    #[serde(default)]
    pub blockchain_minted: bool,
}

/// Generate a fresh public certificate identifier
pub fn new_certificate_id() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("SP-{}", hex[..8].to_uppercase())
}

/// Certificate as returned by the per-user listing
#[derive(Debug, Serialize)]
pub struct CertificateSummary {
    pub certificate_id: String,
    pub course: CertificateCourseRef,
    pub score: i32,
    pub issued_at: DateTime<Utc>,
    pub blockchain_minted: bool,
    pub transaction_hash: Option<String>,
    pub nft_token_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CertificateCourseRef {
    pub title: String,
    pub slug: String,
}

/// Full certificate detail (public verification view)
#[derive(Debug, Serialize)]
pub struct CertificateDetail {
    pub certificate_id: String,
    pub user: CertificateUser,
    pub course: CertificateCourse,
    pub score: i32,
    pub issued_at: DateTime<Utc>,
    pub blockchain_minted: bool,
    pub transaction_hash: Option<String>,
    pub nft_token_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CertificateUser {
    pub username: String,
    pub wallet_address: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CertificateCourse {
    pub title: String,
    pub category: Category,
    pub difficulty: Difficulty,
}

/// Request to attach blockchain transaction data to an owned certificate
#[derive(Debug, Deserialize)]
pub struct UpdateBlockchainRequest {
    pub certificate_id: String,
    pub transaction_hash: String,
    pub nft_token_id: String,
}
