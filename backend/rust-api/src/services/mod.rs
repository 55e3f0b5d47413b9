use crate::config::Config;
use mongodb::{
    bson::doc, options::IndexOptions, Client as MongoClient, Database, IndexModel,
};
use redis::aio::ConnectionManager;

pub struct AppState {
    pub config: Config,
    pub mongo: Database,
    pub redis: ConnectionManager,
}

impl AppState {
    pub async fn new(
        config: Config,
        mongo_client: MongoClient,
        redis_client: redis::Client,
    ) -> anyhow::Result<Self> {
        let mongo = mongo_client.database(&config.mongo_database);

        tracing::info!("Attempting to connect to Redis...");

        // Create ConnectionManager with longer timeout
        let redis = tokio::time::timeout(
            std::time::Duration::from_secs(30),
            ConnectionManager::new(redis_client),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis connection timeout after 30s"))??;

        tracing::info!("Redis ConnectionManager created, testing with PING...");

        // Test connection
        let mut conn = redis.clone();
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            redis::cmd("PING").query_async::<String>(&mut conn),
        )
        .await
        .map_err(|_| anyhow::anyhow!("Redis PING timeout after 5s"))??;

        tracing::info!("Redis connection established successfully");

        Ok(Self {
            config,
            mongo,
            redis,
        })
    }
}

/// Create the unique indexes the data model relies on.
///
/// Uniqueness under concurrent requests is enforced here rather than by
/// check-then-insert application code; racing upserts surface as duplicate
/// key errors that callers resolve by re-reading the winner's row.
pub async fn ensure_indexes(mongo: &Database) -> anyhow::Result<()> {
    let unique = || IndexOptions::builder().unique(true).build();

    mongo
        .collection::<mongodb::bson::Document>("users")
        .create_indexes(vec![
            IndexModel::builder()
                .keys(doc! { "username": 1 })
                .options(unique())
                .build(),
            IndexModel::builder()
                .keys(doc! { "email": 1 })
                .options(unique())
                .build(),
            // Sparse: only users that linked a wallet participate in the constraint
            IndexModel::builder()
                .keys(doc! { "wallet_address": 1 })
                .options(IndexOptions::builder().unique(true).sparse(true).build())
                .build(),
        ])
        .await?;

    mongo
        .collection::<mongodb::bson::Document>("refresh_tokens")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "token_hash": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    mongo
        .collection::<mongodb::bson::Document>("courses")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "slug": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    mongo
        .collection::<mongodb::bson::Document>("quizzes")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "course_id": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    mongo
        .collection::<mongodb::bson::Document>("questions")
        .create_index(IndexModel::builder().keys(doc! { "quiz_id": 1 }).build())
        .await?;

    mongo
        .collection::<mongodb::bson::Document>("user_progress")
        .create_index(
            IndexModel::builder()
                .keys(doc! { "user_id": 1, "course_id": 1 })
                .options(unique())
                .build(),
        )
        .await?;

    mongo
        .collection::<mongodb::bson::Document>("certificates")
        .create_indexes(vec![
            IndexModel::builder()
                .keys(doc! { "user_id": 1, "course_id": 1 })
                .options(unique())
                .build(),
            IndexModel::builder()
                .keys(doc! { "certificate_id": 1 })
                .options(unique())
                .build(),
        ])
        .await?;

    tracing::info!("MongoDB indexes ensured");

    Ok(())
}

/// True when the error is a MongoDB unique index violation (E11000)
pub(crate) fn is_duplicate_key_error(err: &mongodb::error::Error) -> bool {
    match &*err.kind {
        mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(we)) => {
            we.code == 11000
        }
        mongodb::error::ErrorKind::Command(ce) => ce.code == 11000,
        _ => false,
    }
}

pub mod auth_service;
pub mod certificate_service;
pub mod course_service;
pub mod progress_service;
pub mod quiz_service;
pub mod scoring;
