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
    models::certificate::UpdateBlockchainRequest,
    services::{certificate_service::CertificateService, AppState},
};

fn caller_id(claims: &JwtClaims) -> Result<ObjectId, ApiError> {
    ObjectId::parse_str(&claims.sub).map_err(|_| ApiError::unauthorized("Invalid token subject"))
}

/// GET /api/certificates - List caller's certificates (protected)
pub async fn list_certificates(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = caller_id(&claims)?;

    let service = CertificateService::new(state.mongo.clone());
    let certificates = service.list_for_user(&user_id).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "certificates": certificates })),
    ))
}

/// GET /api/certificates/{certificate_id} - Public certificate detail
pub async fn certificate_detail(
    State(state): State<Arc<AppState>>,
    Path(certificate_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = CertificateService::new(state.mongo.clone());
    let detail = service
        .detail(&certificate_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Certificate not found"))?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({ "certificate": detail })),
    ))
}

/// GET /api/certificates/verify/{certificate_id} - Public verification check
///
/// Verification failures answer with a `valid: false` body rather than the
/// generic error shape so third-party verifiers can branch on one field.
pub async fn verify_certificate(
    State(state): State<Arc<AppState>>,
    Path(certificate_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let service = CertificateService::new(state.mongo.clone());

    match service.detail(&certificate_id).await? {
        Some(detail) => Ok((
            StatusCode::OK,
            Json(serde_json::json!({
                "valid": true,
                "certificate_id": detail.certificate_id,
                "user": detail.user.username,
                "course": detail.course.title,
                "issued_at": detail.issued_at,
            })),
        )),
        None => Ok((
            StatusCode::NOT_FOUND,
            Json(serde_json::json!({
                "valid": false,
                "message": "Certificate not found"
            })),
        )),
    }
}

/// POST /api/certificates/update-blockchain - Record mint metadata (protected)
pub async fn update_blockchain(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    AppJson(req): AppJson<UpdateBlockchainRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = caller_id(&claims)?;

    let service = CertificateService::new(state.mongo.clone());
    service.update_blockchain(&user_id, &req).await?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "message": "Certificate updated with blockchain data"
        })),
    ))
}

/// POST /api/certificates/mint/{certificate_id} - Mint acknowledgement (protected)
///
/// On-chain minting happens client side through the user's wallet; this
/// endpoint only confirms the certificate exists and belongs to the caller.
pub async fn mint_certificate(
    State(state): State<Arc<AppState>>,
    Extension(claims): Extension<JwtClaims>,
    Path(certificate_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = caller_id(&claims)?;

    let service = CertificateService::new(state.mongo.clone());
    let certificate = service
        .find_owned(&user_id, &certificate_id)
        .await?
        .ok_or_else(|| ApiError::not_found("Certificate not found"))?;

    Ok((
        StatusCode::OK,
        Json(serde_json::json!({
            "success": true,
            "message": "NFT minting will be implemented with Camp Network integration",
            "certificate_id": certificate.certificate_id
        })),
    ))
}
