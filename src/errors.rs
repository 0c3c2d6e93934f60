use actix_web::{
    error,
    http::{header::ContentType, StatusCode},
    HttpResponse,
};
use derive_more::{Display, Error};

use crate::views;

#[derive(Debug, Display, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[display(fmt = "unknown event link")]
    NotFound,

    #[display(fmt = "time key '{}' is already registered", key)]
    KeyConflict { key: String },

    #[display(fmt = "bad request: {}", reason)]
    BadClientData { reason: String },

    #[display(fmt = "event must have exactly one sender, found {}", senders)]
    InvalidOrganizer { senders: usize },

    #[display(fmt = "mail transport failure: {}", reason)]
    TransportFailure { reason: String },

    #[display(fmt = "persistence failure: {}", reason)]
    PersistenceFailure { reason: String },

    #[display(fmt = "timeout")]
    Timeout,
}

impl ScheduleError {
    pub fn bad_request(reason: impl Into<String>) -> Self {
        ScheduleError::BadClientData { reason: reason.into() }
    }

    pub fn transport(reason: impl ToString) -> Self {
        ScheduleError::TransportFailure { reason: reason.to_string() }
    }

    pub fn persistence(reason: impl ToString) -> Self {
        ScheduleError::PersistenceFailure { reason: reason.to_string() }
    }
}

impl From<sqlx::Error> for ScheduleError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::PoolTimedOut => ScheduleError::Timeout,
            other => ScheduleError::persistence(other),
        }
    }
}

impl error::ResponseError for ScheduleError {
    fn error_response(&self) -> HttpResponse {
        let body = match self {
            ScheduleError::NotFound => views::bad_event_link(),
            other => views::error_page(&other.to_string()),
        };
        HttpResponse::build(self.status_code())
            .insert_header(ContentType::html())
            .body(body)
    }

    fn status_code(&self) -> StatusCode {
        match *self {
            ScheduleError::NotFound => StatusCode::NOT_FOUND,
            ScheduleError::KeyConflict { .. } => StatusCode::CONFLICT,
            ScheduleError::BadClientData { .. } => StatusCode::BAD_REQUEST,
            ScheduleError::InvalidOrganizer { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            ScheduleError::TransportFailure { .. } => StatusCode::BAD_GATEWAY,
            ScheduleError::PersistenceFailure { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ScheduleError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

#[derive(Debug, Display, Error)]
pub enum ConfigError {
    #[display(fmt = "environment variable '{}' must be set", name)]
    Missing { name: &'static str },

    #[display(fmt = "environment variable '{}' has invalid value '{}'", name, value)]
    Invalid { name: &'static str, value: String },

    #[display(fmt = "failed to read secret file '{}': {}", path, reason)]
    SecretFile { path: String, reason: String },
}
