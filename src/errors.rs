use rusoto_core::RusotoError;
use rusoto_s3::PutObjectError;
use thiserror::Error;
use uuid::Uuid;

/// Enumerates high-level errors returned by this library.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Represents an SQL error.
    #[error("SQLx error")]
    Sqlx { source: sqlx::Error },

    /// Represents an error with the request.
    #[error("bad request")]
    BadRequest,

    /// Represents an error caused by missing parts in a form submission.
    #[error("missing parts in form submission")]
    PartsMissing,

    #[error("malformed form submission")]
    MalformedFormSubmission,

    #[error("malformed request body: {0}")]
    MalformedBody(#[source] serde_json::Error),

    #[error("malformed upload metadata: {0}")]
    MalformedUploadMetadata(#[source] serde_json::Error),

    /// A set measure that is neither a rep count nor a duration.
    #[error("malformed set measure: {0:?}")]
    MalformedMeasure(String),

    #[error("invalid date: {0:?}")]
    InvalidDate(String),

    #[error("invalid month: {0:?}")]
    InvalidMonth(String),

    #[error("invalid ID: {0:?}")]
    InvalidId(String),

    #[error("invalid field {field}: {reason}")]
    InvalidField {
        field: &'static str,
        reason: &'static str,
    },

    #[error("username/password is incorrect")]
    InvalidCredentials,

    #[error("not logged in")]
    Unauthenticated,

    #[error("not allowed")]
    Forbidden,

    #[error("client does not exist")]
    UnknownClient,

    #[error("client {0} does not exist")]
    NonExistentClient(String),

    #[error("session {0} does not exist")]
    NonExistentSession(Uuid),

    #[error("client already exists")]
    ClientAlreadyExists,

    #[error("exercise already exists")]
    ExerciseAlreadyExists,

    #[error("username already exists")]
    UsernameAlreadyExists,

    #[error("unsupported image format")]
    UnsupportedImageFormat,

    #[error("failed to upload image")]
    UploadFailed { source: RusotoError<PutObjectError> },

    #[error("failed to generate URL")]
    FailedToGenerateUrl { source: url::ParseError },

    #[error("unable to parse URL {url:?}")]
    UnableToParseUrl { url: String, source: url::ParseError },

    #[error("password hashing failed")]
    PasswordHashing { source: bcrypt::BcryptError },

    #[error("background task failed")]
    TaskFailed { source: tokio::task::JoinError },

    /// An in-process store was left in an inconsistent state by a
    /// panicking writer.
    #[error("storage lock poisoned")]
    LockPoisoned,
}
