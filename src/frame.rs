//! Frame: the envelope every websocket message travels in.
//!
//! A client request names a `syscall` such as `block:create` or
//! `history:jump`; the connection routes on the part before the colon and
//! answers with a terminal `done` or `error` frame whose `parent_id` points
//! back at the request. Pushes the session originates itself
//! (`session:state`, `notify:error`, `transform:apply`) are request-status
//! frames with no parent.
//!
//! Payloads stay a flat JSON object until the handler for a prefix decodes
//! them into its own typed struct.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Error frame key holding the human-readable message.
pub const FRAME_MESSAGE: &str = "message";

/// Error frame key holding the stable `E_*` code.
pub const FRAME_CODE: &str = "code";

/// Error frame key telling the client whether a retry could succeed.
pub const FRAME_RETRYABLE: &str = "retryable";

pub type Data = HashMap<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Request,
    Done,
    Error,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    /// Unix epoch milliseconds, stamped when the frame is built.
    pub ts: i64,
    /// Story the frame concerns, when one is open.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_id: Option<String>,
    /// Sender, stamped by the server on inbound frames.
    #[serde(default)]
    pub from: Option<String>,
    pub syscall: String,
    pub status: Status,
    #[serde(default)]
    pub data: Data,
}

/// Typed errors that can be rendered as a structured error frame.
pub trait ErrorCode: std::fmt::Display {
    /// Stable `E_*` identifier clients can match on.
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

/// Wall-clock time in Unix epoch milliseconds; 0 if the clock is before
/// the epoch.
#[must_use]
pub fn now_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .ok()
        .and_then(|d| i64::try_from(d.as_millis()).ok())
        .unwrap_or(0)
}

impl Frame {
    /// Fresh request-status frame.
    pub fn request(syscall: impl Into<String>, data: Data) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: None,
            ts: now_ms(),
            story_id: None,
            from: None,
            syscall: syscall.into(),
            status: Status::Request,
            data,
        }
    }

    #[must_use]
    pub fn done(&self) -> Self {
        self.answer(Status::Done, Data::new())
    }

    #[must_use]
    pub fn done_with(&self, data: Data) -> Self {
        self.answer(Status::Done, data)
    }

    /// Error answer carrying only a message.
    #[must_use]
    pub fn error(&self, message: impl Into<String>) -> Self {
        let data = Data::from([(FRAME_MESSAGE.to_owned(), Value::String(message.into()))]);
        self.answer(Status::Error, data)
    }

    /// Error answer carrying the code, message and retry hint of `err`.
    #[must_use]
    pub fn error_from(&self, err: &(impl ErrorCode + ?Sized)) -> Self {
        let data = Data::from([
            (FRAME_CODE.to_owned(), Value::from(err.error_code())),
            (FRAME_MESSAGE.to_owned(), Value::from(err.to_string())),
            (FRAME_RETRYABLE.to_owned(), Value::from(err.retryable())),
        ]);
        self.answer(Status::Error, data)
    }

    /// Answers keep the request's syscall and story so clients can route
    /// them without a lookup table.
    fn answer(&self, status: Status, data: Data) -> Self {
        Self {
            parent_id: Some(self.id),
            story_id: self.story_id.clone(),
            status,
            ..Self::request(self.syscall.clone(), data)
        }
    }

    #[must_use]
    pub fn with_story_id(mut self, story_id: impl Into<String>) -> Self {
        self.story_id = Some(story_id.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }

    /// `block` for `block:create`; the whole syscall when it has no colon.
    #[must_use]
    pub fn prefix(&self) -> &str {
        self.syscall.split_once(':').map_or(self.syscall.as_str(), |(prefix, _)| prefix)
    }

    /// `create` for `block:create`; empty when there is no colon.
    #[must_use]
    pub fn op(&self) -> &str {
        self.syscall.split_once(':').map_or("", |(_, op)| op)
    }

    /// Decode `data` into a handler's payload type.
    ///
    /// # Errors
    ///
    /// Returns the serde error if the data does not match `T`.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        let object: serde_json::Map<String, Value> = self.data.clone().into_iter().collect();
        serde_json::from_value(Value::Object(object))
    }
}

/// Flatten a serializable value into frame data. Anything that is not a
/// JSON object is wrapped under `value`.
#[must_use]
pub fn to_data(value: &impl Serialize) -> Data {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => map.into_iter().collect(),
        Ok(other) => Data::from([("value".to_owned(), other)]),
        Err(_) => Data::new(),
    }
}
