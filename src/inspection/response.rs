//! Responses produced by the inspector itself.

use std::time::Duration;

use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};

pub const BLOCKED_DETAIL: &str = "Blocked due to suspicious activity";
pub const ESCALATED_DETAIL: &str = "Temporarily blocked due to suspicious activity";
pub const INTERNAL_ERROR_DETAIL: &str = "Internal Server Error";

/// JSON body of every inspector rejection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retry_in_seconds: Option<u64>,
}

/// Whole seconds a client should wait, rounded up so an active block never reports 0.
pub fn retry_secs(ttl: Duration) -> u64 {
    ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0)
}

/// A request the inspector answered without forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// The source was already blocked.
    Blocked { ttl: Duration },
    /// This request pushed the source over the threshold.
    Escalated,
    /// The downstream stage failed.
    InternalError,
}

impl Rejection {
    pub fn status(&self) -> StatusCode {
        match self {
            Rejection::Blocked { .. } | Rejection::Escalated => StatusCode::TOO_MANY_REQUESTS,
            Rejection::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn body(&self) -> ErrorBody {
        match self {
            Rejection::Blocked { ttl } => ErrorBody {
                detail: BLOCKED_DETAIL.to_string(),
                retry_in_seconds: Some(retry_secs(*ttl)),
            },
            Rejection::Escalated => ErrorBody {
                detail: ESCALATED_DETAIL.to_string(),
                retry_in_seconds: None,
            },
            Rejection::InternalError => ErrorBody {
                detail: INTERNAL_ERROR_DETAIL.to_string(),
                retry_in_seconds: None,
            },
        }
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        let body = self.body();
        let mut response = (self.status(), Json(&body)).into_response();
        if let Some(secs) = body.retry_in_seconds {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(secs));
        }
        response
    }
}

/// Final decision for one request.
#[derive(Debug)]
pub enum Verdict<R> {
    /// The continuation ran; its response passes through.
    Forward(R),
    Reject(Rejection),
}

impl<R> Verdict<R> {
    pub fn rejection(&self) -> Option<Rejection> {
        match self {
            Verdict::Forward(_) => None,
            Verdict::Reject(r) => Some(*r),
        }
    }

    pub fn is_forwarded(&self) -> bool {
        matches!(self, Verdict::Forward(_))
    }
}

impl<R: IntoResponse> IntoResponse for Verdict<R> {
    fn into_response(self) -> Response {
        match self {
            Verdict::Forward(response) => response.into_response(),
            Verdict::Reject(rejection) => rejection.into_response(),
        }
    }
}

/// Anything the continuation returns must expose a status code for the request log.
pub trait ResponseStatus {
    fn status_code(&self) -> u16;
}

impl<B> ResponseStatus for axum::http::Response<B> {
    fn status_code(&self) -> u16 {
        self.status().as_u16()
    }
}

/// A handler-level validation failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRejection {
    pub field: String,
}

impl IntoResponse for ValidationRejection {
    fn into_response(self) -> Response {
        let body = serde_json::json!({ "error": format!("invalid {}", self.field) });
        (StatusCode::BAD_REQUEST, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retry_secs_rounds_up() {
        assert_eq!(retry_secs(Duration::from_secs(29)), 29);
        assert_eq!(retry_secs(Duration::from_millis(28_400)), 29);
        assert_eq!(retry_secs(Duration::from_millis(1)), 1);
        assert_eq!(retry_secs(Duration::ZERO), 0);
    }

    #[test]
    fn test_bodies() {
        let blocked = serde_json::to_value(Rejection::Blocked { ttl: Duration::from_secs(29) }.body()).unwrap();
        assert_eq!(
            blocked,
            serde_json::json!({ "detail": "Blocked due to suspicious activity", "retry_in_seconds": 29 })
        );

        let escalated = serde_json::to_value(Rejection::Escalated.body()).unwrap();
        assert_eq!(escalated, serde_json::json!({ "detail": "Temporarily blocked due to suspicious activity" }));

        let internal = serde_json::to_value(Rejection::InternalError.body()).unwrap();
        assert_eq!(internal, serde_json::json!({ "detail": "Internal Server Error" }));
    }

    #[test]
    fn test_blocked_response_sets_retry_after() {
        let response = Rejection::Blocked { ttl: Duration::from_secs(12) }.into_response();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers()[header::RETRY_AFTER], "12");

        let response = Rejection::Escalated.into_response();
        assert!(response.headers().get(header::RETRY_AFTER).is_none());
    }

    #[test]
    fn test_validation_rejection() {
        let response = ValidationRejection { field: "host".into() }.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
