use serde::{Deserialize, Serialize};

use crate::models::EventTime;

/// Body of `POST /register-events`.
#[derive(Debug, Deserialize, Clone)]
pub struct RegisterEventsDto {
    pub times: Vec<NewTimeDto>,
    pub attendees: Vec<NewAttendeeDto>,
    pub event: NewEventDto,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewTimeDto {
    /// epoch seconds
    pub start: i64,
    pub end: i64,
    pub server_key: String,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub struct NewAttendeeDto {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub is_sender: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NewEventDto {
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
}

#[derive(Debug, Serialize)]
pub struct RegisteredEventResponse {
    pub id: uuid::Uuid,
    pub times: usize,
    pub attendees: usize,
}

/// A time option as embedded in the selection page.
#[derive(Debug, Serialize, PartialEq)]
pub struct TimeOptionView {
    pub start: i64,
    pub end: i64,
    pub key: String,
}

impl From<&EventTime> for TimeOptionView {
    fn from(time: &EventTime) -> Self {
        TimeOptionView {
            start: time.start().timestamp(),
            end: time.end().timestamp(),
            key: time.key.clone(),
        }
    }
}
