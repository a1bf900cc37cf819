//! Normalized description of an inbound request.

use std::collections::HashMap;
use std::time::Instant;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, Request};
use chrono::{DateTime, Local};
use serde::ser::{Serialize, SerializeMap, Serializer};
use std::net::SocketAddr;

/// Source used when the transport did not provide a peer address.
pub const UNKNOWN_SOURCE: &str = "unknown";

/// Header carrying the request ID assigned upstream.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Ordered parameter map; a name may carry several values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Params {
    entries: Vec<(String, Vec<String>)>,
    /// Name → position in `entries`.
    index: HashMap<String, usize>,
}

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Decode an `application/x-www-form-urlencoded` query string.
    pub fn from_query(query: &str) -> Self {
        let mut params = Self::new();
        for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
            params.push(name.into_owned(), value.into_owned());
        }
        params
    }

    /// Append a value, grouping it with earlier values of the same name.
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.index.get(&name) {
            Some(&i) => self.entries[i].1.push(value),
            None => {
                self.index.insert(name.clone(), self.entries.len());
                self.entries.push((name, vec![value]));
            }
        }
    }

    /// First value of `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.get_all(name).first().map(String::as_str)
    }

    pub fn get_all(&self, name: &str) -> &[String] {
        self.index
            .get(name)
            .map(|&i| self.entries[i].1.as_slice())
            .unwrap_or(&[])
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.entries.iter().map(|(n, v)| (n.as_str(), v.as_slice()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

// Single values serialize as strings, repeated ones as arrays.
impl Serialize for Params {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.entries.len()))?;
        for (name, values) in &self.entries {
            match values.as_slice() {
                [single] => map.serialize_entry(name, single)?,
                many => map.serialize_entry(name, many)?,
            }
        }
        map.end()
    }
}

/// Everything the inspector needs to know about one request.
#[derive(Debug, Clone)]
pub struct RequestDescriptor {
    pub source: String,
    pub endpoint: String,
    pub params: Params,
    pub user_agent: String,
    pub request_id: Option<String>,
    /// Monotonic arrival time, used for windows and expiries.
    pub received: Instant,
    /// Wall-clock arrival time.
    pub received_at: DateTime<Local>,
}

impl RequestDescriptor {
    pub fn new(source: impl Into<String>, endpoint: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            endpoint: endpoint.into(),
            params: Params::new(),
            user_agent: "-".to_string(),
            request_id: None,
            received: Instant::now(),
            received_at: Local::now(),
        }
    }

    pub fn with_param(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push(name, value);
        self
    }

    pub fn with_params(mut self, params: Params) -> Self {
        self.params = params;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    /// Override the monotonic arrival time.
    pub fn at(mut self, received: Instant) -> Self {
        self.received = received;
        self
    }

    /// Build a descriptor from an HTTP request.
    ///
    /// The source is the peer IP from `ConnectInfo`; proxies are not trusted.
    pub fn from_request(request: &Request<Body>) -> Self {
        let source = request
            .extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .unwrap_or_else(|| UNKNOWN_SOURCE.to_string());

        let user_agent = request
            .headers()
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("-");

        let request_id = request
            .headers()
            .get(X_REQUEST_ID)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);

        let params = request
            .uri()
            .query()
            .map(Params::from_query)
            .unwrap_or_default();

        let mut descriptor = Self::new(source, request.uri().path())
            .with_params(params)
            .with_user_agent(user_agent);
        descriptor.request_id = request_id;
        descriptor
    }
}
