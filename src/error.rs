use crate::models::ApiErrorBody;
use reqwest::StatusCode;

/// Which failure a request ran into. Every variant surfaces through the one
/// [`ApiError`] type; the kind is there so callers can branch without
/// comparing status codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The client-side deadline elapsed before the exchange finished.
    Timeout,
    /// DNS failure, refused connection, reset mid-body and the like.
    Network,
    /// 401. The stored bearer token has already been cleared.
    Unauthorized,
    /// 403
    Forbidden,
    /// 404
    NotFound,
    /// Any 5xx.
    Server,
    /// Any other non-2xx.
    Request,
    /// A 2xx whose body did not match the expected shape.
    Decode,
}

#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ApiError {
    pub kind: ErrorKind,
    pub message: String,
    /// HTTP status, 0 when no response was received.
    pub status: u16,
    pub payload: Option<ApiErrorBody>,
}

impl ApiError {
    pub(crate) fn timeout() -> Self {
        Self {
            kind: ErrorKind::Timeout,
            message: "Request timed out".to_string(),
            status: StatusCode::REQUEST_TIMEOUT.as_u16(),
            payload: Some(ApiErrorBody::new(
                "Timeout",
                "The request took too long to complete. Please try again.",
            )),
        }
    }

    pub(crate) fn network() -> Self {
        Self {
            kind: ErrorKind::Network,
            message: "Network error".to_string(),
            status: 0,
            payload: Some(ApiErrorBody::new(
                "Network error",
                "Unable to connect to the server. Please check your connection.",
            )),
        }
    }

    pub(crate) fn decode(status: StatusCode, err: serde_json::Error) -> Self {
        Self {
            kind: ErrorKind::Decode,
            message: format!("Unexpected response from server: {}", err),
            status: status.as_u16(),
            payload: None,
        }
    }

    /// Maps a non-2xx response onto the error taxonomy. `body` is the raw
    /// response body; when it is not a JSON error object the payload falls
    /// back to `{ error: "Request failed", detail: "HTTP <code>" }`.
    pub(crate) fn from_response(status: StatusCode, body: &[u8]) -> Self {
        let payload = parse_error_body(status, body);
        let (kind, message) = match status.as_u16() {
            401 => (
                ErrorKind::Unauthorized,
                "Session expired. Please sign in again.".to_string(),
            ),
            403 => (
                ErrorKind::Forbidden,
                "You do not have access to this resource.".to_string(),
            ),
            404 => (
                ErrorKind::NotFound,
                "The requested resource was not found.".to_string(),
            ),
            code if code >= 500 => (
                ErrorKind::Server,
                "Server error. Please try again later.".to_string(),
            ),
            _ => (
                ErrorKind::Request,
                payload.describe().unwrap_or_else(|| "Request failed".to_string()),
            ),
        };
        Self {
            kind,
            message,
            status: status.as_u16(),
            payload: Some(payload),
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        self.kind == ErrorKind::Unauthorized
    }

    /// The backend's own explanation, when it sent one.
    pub fn detail(&self) -> Option<String> {
        self.payload.as_ref().and_then(ApiErrorBody::describe)
    }
}

fn parse_error_body(status: StatusCode, body: &[u8]) -> ApiErrorBody {
    serde_json::from_slice::<ApiErrorBody>(body).unwrap_or_else(|_| {
        ApiErrorBody::new("Request failed", &format!("HTTP {}", status.as_u16()))
    })
}
