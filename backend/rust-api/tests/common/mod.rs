use axum::Router;
use mongodb::bson::{doc, oid::ObjectId, Document};
use skillproof_api::{config::Config, create_router, services, services::AppState};
use std::sync::Arc;

// Fixed seed ids so parallel test binaries share one catalog
pub const RUST_COURSE_ID: &str = "65f000000000000000000c01";
pub const DESIGN_COURSE_ID: &str = "65f000000000000000000c02";
pub const ARCHIVED_COURSE_ID: &str = "65f000000000000000000c03";
pub const RUST_QUIZ_ID: &str = "65f000000000000000000d01";

pub const RUST_COURSE_SLUG: &str = "rust-fundamentals";
pub const DESIGN_COURSE_SLUG: &str = "design-basics";
pub const ARCHIVED_COURSE_SLUG: &str = "legacy-archived";

// Question ids with their correct answers: A, C, B, D, A (1 point each)
pub const QUESTION_IDS: [&str; 5] = [
    "65f000000000000000000a01",
    "65f000000000000000000a02",
    "65f000000000000000000a03",
    "65f000000000000000000a04",
    "65f000000000000000000a05",
];
pub const CORRECT_ANSWERS: [&str; 5] = ["A", "C", "B", "D", "A"];

pub async fn create_test_app() -> Router {
    // Initialize tracing for tests
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::DEBUG)
        .try_init();

    // Load test environment from .env.test
    dotenvy::from_filename(".env.test").ok();

    // Load test configuration
    let config = Config::load().expect("Failed to load test configuration");

    eprintln!("Test config loaded - Redis URI: {}", config.redis_uri);

    // Connect to test databases
    let mongo_client = mongodb::Client::with_uri_str(&config.mongo_uri)
        .await
        .expect("Failed to connect to test MongoDB");

    eprintln!("MongoDB connected");

    let redis_client =
        redis::Client::open(config.redis_uri.clone()).expect("Failed to create test Redis client");

    eprintln!("Redis client created, attempting connection...");

    // Create app state (connection is established inside)
    let app_state = Arc::new(
        AppState::new(config.clone(), mongo_client.clone(), redis_client)
            .await
            .expect("Failed to initialize test app state"),
    );

    eprintln!("AppState initialized successfully");

    // Unique indexes must exist before seeding or submitting
    services::ensure_indexes(&app_state.mongo)
        .await
        .expect("Failed to ensure test indexes");

    // Seed catalog data
    seed_catalog(&mongo_client, &config.mongo_database).await;

    // Build test router (same as main app)
    create_router(app_state)
}

async fn seed_catalog(mongo_client: &mongodb::Client, db_name: &str) {
    let db = mongo_client.database(db_name);
    let now = mongodb::bson::DateTime::now();

    let courses = db.collection::<Document>("courses");

    insert_ignore_duplicate(
        &courses,
        doc! {
            "_id": oid(RUST_COURSE_ID),
            "title": "Rust Fundamentals",
            "slug": RUST_COURSE_SLUG,
            "description": "Ownership, borrowing and the type system",
            "category": "programming",
            "difficulty": "beginner",
            "duration": 120,
            "content": "# Rust Fundamentals\n\nLet's talk about ownership.",
            "is_active": true,
            "created_at": now,
            "updated_at": now,
        },
    )
    .await;

    insert_ignore_duplicate(
        &courses,
        doc! {
            "_id": oid(DESIGN_COURSE_ID),
            "title": "Design Basics",
            "slug": DESIGN_COURSE_SLUG,
            "description": "Typography and layout for developers",
            "category": "design",
            "difficulty": "beginner",
            "duration": 60,
            "content": "# Design Basics\n\nWhitespace is not wasted space.",
            "is_active": true,
            "created_at": now,
            "updated_at": now,
        },
    )
    .await;

    insert_ignore_duplicate(
        &courses,
        doc! {
            "_id": oid(ARCHIVED_COURSE_ID),
            "title": "Legacy Archived Course",
            "slug": ARCHIVED_COURSE_SLUG,
            "description": "Retired from the catalog",
            "category": "other",
            "difficulty": "advanced",
            "duration": 45,
            "content": "# Archived\n\nThis course is no longer offered.",
            "is_active": false,
            "created_at": now,
            "updated_at": now,
        },
    )
    .await;

    let quizzes = db.collection::<Document>("quizzes");
    insert_ignore_duplicate(
        &quizzes,
        doc! {
            "_id": oid(RUST_QUIZ_ID),
            "course_id": oid(RUST_COURSE_ID),
            "passing_score": 70,
            "time_limit": 30,
        },
    )
    .await;

    let questions = db.collection::<Document>("questions");
    for (i, (question_id, correct)) in QUESTION_IDS
        .iter()
        .zip(CORRECT_ANSWERS.iter())
        .enumerate()
    {
        insert_ignore_duplicate(
            &questions,
            doc! {
                "_id": oid(question_id),
                "quiz_id": oid(RUST_QUIZ_ID),
                "question_text": format!("Question {} about Rust", i + 1),
                "option_a": "Option A",
                "option_b": "Option B",
                "option_c": "Option C",
                "option_d": "Option D",
                "correct_answer": *correct,
                "points": 1,
            },
        )
        .await;
    }
}

fn oid(hex: &str) -> ObjectId {
    ObjectId::parse_str(hex).expect("invalid seed ObjectId")
}

async fn insert_ignore_duplicate(
    collection: &mongodb::Collection<Document>,
    document: Document,
) {
    if let Err(e) = collection.insert_one(document).await {
        // Ignore duplicate key error (race condition with parallel tests)
        if let mongodb::error::ErrorKind::Write(mongodb::error::WriteFailure::WriteError(ref we)) =
            *e.kind
        {
            if we.code == 11000 {
                return;
            }
        }
        panic!("Failed to seed test data: {:?}", e);
    }
}

/// Build the answers map that scores 100% on the seeded quiz
pub fn perfect_answers() -> serde_json::Value {
    let mut answers = serde_json::Map::new();
    for (question_id, correct) in QUESTION_IDS.iter().zip(CORRECT_ANSWERS.iter()) {
        answers.insert(
            question_id.to_string(),
            serde_json::Value::String(correct.to_string()),
        );
    }
    serde_json::Value::Object(answers)
}

/// Build an answers map with exactly `correct_count` correct answers,
/// remaining questions answered wrong
pub fn partial_answers(correct_count: usize) -> serde_json::Value {
    let mut answers = serde_json::Map::new();
    for (i, (question_id, correct)) in QUESTION_IDS
        .iter()
        .zip(CORRECT_ANSWERS.iter())
        .enumerate()
    {
        let submitted = if i < correct_count {
            correct.to_string()
        } else {
            // Pick any option that is not the correct one
            if *correct == "A" { "B" } else { "A" }.to_string()
        };
        answers.insert(question_id.to_string(), serde_json::Value::String(submitted));
    }
    serde_json::Value::Object(answers)
}
