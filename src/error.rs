/// Error type used across all modules.
///
/// Every transformer-time failure maps to a variant here; translation of a
/// request fails before the backend call is made, so a `BridgeError` from the
/// transform layer never leaves partial upstream side effects behind.
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Auth error: {0}")]
    Auth(String),
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Unsupported content part: {0}")]
    UnsupportedContent(String),
    #[error("Unsupported message role: {0}")]
    UnsupportedRole(String),
    #[error("Unsupported response_format: {0}")]
    UnsupportedResponseFormat(String),
    #[error("Unsupported tool_choice: {0}")]
    UnsupportedToolChoice(String),
    #[error("Tool call arguments are not valid JSON: {0}")]
    InvalidArguments(String),
    #[error("Unknown tool_call_id: {0}")]
    UnknownToolCallId(String),
    #[error("Duplicate result for tool_call_id: {0}")]
    DuplicateToolCallId(String),
    #[error("Tool result without a preceding assistant tool call")]
    NoPendingCalls,
    #[error("Failed to fetch remote content: {0}")]
    FetchError(String),
    /// Backend completion payload had no `candidates` field. The raw body is
    /// carried so the handler can surface it to the caller verbatim.
    #[error("Backend returned no candidates field")]
    InvalidCompletionObject { raw: bytes::Bytes },
    #[error("Upstream error: status={status}")]
    Upstream { status: u16, body: bytes::Bytes },
    #[error("Transport error: {0}")]
    Transport(String),
}

/// Broad error category for status code selection and payload typing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    InvalidRequest,
    Authentication,
    ServerError,
}

impl BridgeError {
    #[must_use]
    pub fn category(&self) -> ErrorCategory {
        match self {
            BridgeError::Auth(_) => ErrorCategory::Authentication,
            BridgeError::InvalidInput(_)
            | BridgeError::UnsupportedContent(_)
            | BridgeError::UnsupportedRole(_)
            | BridgeError::UnsupportedResponseFormat(_)
            | BridgeError::UnsupportedToolChoice(_)
            | BridgeError::InvalidArguments(_)
            | BridgeError::UnknownToolCallId(_)
            | BridgeError::DuplicateToolCallId(_)
            | BridgeError::NoPendingCalls
            | BridgeError::FetchError(_) => ErrorCategory::InvalidRequest,
            BridgeError::Config(_)
            | BridgeError::InvalidCompletionObject { .. }
            | BridgeError::Upstream { .. }
            | BridgeError::Transport(_) => ErrorCategory::ServerError,
        }
    }
}

fn http_status_for(err: &BridgeError) -> http::StatusCode {
    match err {
        BridgeError::Upstream { status, .. } => {
            http::StatusCode::from_u16(*status).unwrap_or(http::StatusCode::BAD_GATEWAY)
        }
        BridgeError::Transport(_) => http::StatusCode::BAD_GATEWAY,
        _ => match err.category() {
            ErrorCategory::InvalidRequest => http::StatusCode::BAD_REQUEST,
            ErrorCategory::Authentication => http::StatusCode::UNAUTHORIZED,
            ErrorCategory::ServerError => http::StatusCode::INTERNAL_SERVER_ERROR,
        },
    }
}

fn error_type(cat: ErrorCategory) -> &'static str {
    match cat {
        ErrorCategory::InvalidRequest => "invalid_request_error",
        ErrorCategory::Authentication => "authentication_error",
        ErrorCategory::ServerError => "server_error",
    }
}

fn error_code(cat: ErrorCategory) -> &'static str {
    match cat {
        ErrorCategory::InvalidRequest => "invalid_request",
        ErrorCategory::Authentication => "invalid_api_key",
        ErrorCategory::ServerError => "server_error",
    }
}

/// Format an error as an OpenAI-style error body, returning (status, JSON).
#[must_use]
pub fn format_error(err: &BridgeError) -> (http::StatusCode, serde_json::Value) {
    let cat = err.category();
    let status = http_status_for(err);
    let body = serde_json::json!({
        "error": {
            "message": err.to_string(),
            "type": error_type(cat),
            "code": error_code(cat),
            "param": null,
        }
    });
    (status, body)
}

impl axum::response::IntoResponse for BridgeError {
    fn into_response(self) -> axum::response::Response {
        use axum::response::IntoResponse;

        // Upstream bodies and unparseable completion payloads are forwarded
        // verbatim instead of re-shaped.
        match self {
            BridgeError::Upstream { status, body } => {
                let status = http::StatusCode::from_u16(status)
                    .unwrap_or(http::StatusCode::BAD_GATEWAY);
                (
                    status,
                    [(
                        http::header::CONTENT_TYPE,
                        http::HeaderValue::from_static("application/json"),
                    )],
                    axum::body::Body::from(body),
                )
                    .into_response()
            }
            BridgeError::InvalidCompletionObject { raw } => (
                http::StatusCode::OK,
                [(
                    http::header::CONTENT_TYPE,
                    http::HeaderValue::from_static("application/json"),
                )],
                axum::body::Body::from(raw),
            )
                .into_response(),
            other => {
                let (status, body) = format_error(&other);
                (status, axum::Json(body)).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_errors_are_400() {
        let err = BridgeError::UnsupportedRole("critic".into());
        let (status, body) = format_error(&err);
        assert_eq!(status, http::StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["type"], "invalid_request_error");
        assert!(body["error"]["message"]
            .as_str()
            .unwrap()
            .contains("critic"));
    }

    #[test]
    fn test_auth_errors_are_401() {
        let err = BridgeError::Auth("missing bearer token".into());
        let (status, body) = format_error(&err);
        assert_eq!(status, http::StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["code"], "invalid_api_key");
    }

    #[test]
    fn test_tool_pairing_errors_are_client_errors() {
        for err in [
            BridgeError::NoPendingCalls,
            BridgeError::UnknownToolCallId("call_9".into()),
            BridgeError::DuplicateToolCallId("call_9".into()),
            BridgeError::InvalidArguments("trailing comma".into()),
        ] {
            assert_eq!(err.category(), ErrorCategory::InvalidRequest);
        }
    }
}
