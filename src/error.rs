use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Event not found: {0}")]
    EventNotFound(i32),
    #[error("Student not found: {0}")]
    StudentNotFound(i32),
    #[error("Student {student_id} is not registered for event {event_id}")]
    NotRegistered { event_id: i32, student_id: i32 },
    #[error("Malformed feed record: {0}")]
    MalformedRecord(String),
    #[error("Activity feed request failed: {0}")]
    NetworkFailure(#[from] reqwest::Error),
    #[error("Invalid feed url: {0}")]
    FeedUrl(#[from] url::ParseError),
    #[error("Database connection error: {0}")]
    DatabaseConnection(#[from] diesel::ConnectionError),
    #[error("Database error: {0}")]
    Database(#[from] diesel::result::Error),
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Spreadsheet error: {0}")]
    Spreadsheet(#[from] rust_xlsxwriter::XlsxError),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    /// Errors caused by the caller naming something that is not there, as
    /// opposed to the store or the network failing.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Error::EventNotFound(..) | Error::StudentNotFound(..) | Error::NotRegistered { .. }
        )
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
