/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Staff accounts live in the external identity service, which issues UUIDs.
pub type UserId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;
