//! The transaction as seen by processors.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use uuid::Uuid;

use crate::context::ExecutionContext;
use crate::flow::Direction;
use crate::processors::StreamType;

/// One direction of a transaction handed over by the transport.
///
/// Header names are stored lowercase.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiStream {
    #[serde(default = "new_id")]
    pub id: String,

    /// Shared by every attempt of the same logical request (retries keep it).
    #[serde(default)]
    pub sequence_id: String,

    pub direction: Direction,
    pub method: String,
    pub url: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    #[serde(default)]
    pub body: String,

    /// Upstream status; only meaningful on the response side.
    #[serde(default)]
    pub status: u16,

    #[serde(skip)]
    context: ExecutionContext,

    #[serde(skip)]
    cancel: Option<watch::Receiver<bool>>,
}

fn new_id() -> String {
    Uuid::new_v4().to_string()
}

impl ApiStream {
    pub fn request(method: impl Into<String>, url: impl Into<String>) -> Self {
        let id = new_id();
        Self {
            sequence_id: id.clone(),
            id,
            direction: Direction::Request,
            method: method.into(),
            url: url.into(),
            headers: BTreeMap::new(),
            body: String::new(),
            status: 0,
            context: ExecutionContext::default(),
            cancel: None,
        }
    }

    /// Response side of `request`, keeping its identifiers.
    pub fn response_to(request: &ApiStream, status: u16) -> Self {
        Self {
            id: request.id.clone(),
            sequence_id: request.sequence_id.clone(),
            direction: Direction::Response,
            method: request.method.clone(),
            url: request.url.clone(),
            headers: BTreeMap::new(),
            body: String::new(),
            status,
            context: ExecutionContext::default(),
            cancel: request.cancel.clone(),
        }
    }

    pub fn with_sequence_id(mut self, sequence_id: impl Into<String>) -> Self {
        self.sequence_id = sequence_id.into();
        self
    }

    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.set_header(name, value);
        self
    }

    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = body.into();
        self
    }

    /// Attach a cancellation signal; the stream counts as cancelled once it reads `true`.
    pub fn with_cancellation(mut self, cancel: watch::Receiver<bool>) -> Self {
        self.cancel = Some(cancel);
        self
    }

    /// Fill defaults and lowercase header names after deserializing.
    pub fn normalize(mut self) -> Self {
        if self.sequence_id.is_empty() {
            self.sequence_id = self.id.clone();
        }
        self.headers = std::mem::take(&mut self.headers)
            .into_iter()
            .map(|(k, v)| (k.to_lowercase(), v))
            .collect();
        self
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    pub fn set_header(&mut self, name: &str, value: impl Into<String>) {
        self.headers.insert(name.to_lowercase(), value.into());
    }

    pub fn stream_type(&self) -> StreamType {
        match self.direction {
            Direction::Request => StreamType::Request,
            Direction::Response => StreamType::Response,
        }
    }

    pub fn context(&self) -> &ExecutionContext {
        &self.context
    }

    pub(crate) fn set_context(&mut self, context: ExecutionContext) {
        self.context = context;
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map(|rx| *rx.borrow()).unwrap_or(false)
    }

    /// Resolves when the transport cancels this stream; never resolves otherwise.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.cancel else {
            return std::future::pending().await;
        };
        let mut rx = rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                // Sender gone without cancelling: nothing can cancel us anymore.
                return std::future::pending().await;
            }
        }
    }
}
