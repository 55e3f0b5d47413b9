pub mod certificate;
pub mod course;
pub mod progress;
pub mod refresh_token;
pub mod user;
