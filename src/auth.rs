use http::HeaderMap;

use crate::error::BridgeError;

/// Extract the client's credential from the request headers.
///
/// The bearer token on `Authorization` is the resolved backend credential:
/// the bridge forwards it to the target protocol instead of validating it
/// against a local key set. A bare `x-goog-api-key` header is accepted too
/// for clients already speaking the target protocol's header convention.
///
/// # Errors
///
/// Returns [`BridgeError::Auth`] when no non-empty credential is present.
pub fn client_credential(headers: &HeaderMap) -> Result<String, BridgeError> {
    if let Some(value) = headers.get(http::header::AUTHORIZATION) {
        let value = value
            .to_str()
            .map_err(|_| BridgeError::Auth("authorization header is not valid UTF-8".into()))?;
        let token = value
            .strip_prefix("Bearer ")
            .or_else(|| value.strip_prefix("bearer "))
            .unwrap_or(value)
            .trim();
        if !token.is_empty() {
            return Ok(token.to_string());
        }
    }

    if let Some(value) = headers.get("x-goog-api-key") {
        if let Ok(key) = value.to_str() {
            let key = key.trim();
            if !key.is_empty() {
                return Ok(key.to_string());
            }
        }
    }

    Err(BridgeError::Auth(
        "missing API key; send it as 'Authorization: Bearer <key>'".into(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bearer_token() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer sk-123".parse().unwrap());
        assert_eq!(client_credential(&headers).unwrap(), "sk-123");
    }

    #[test]
    fn test_goog_api_key_header() {
        let mut headers = HeaderMap::new();
        headers.insert("x-goog-api-key", "gk-456".parse().unwrap());
        assert_eq!(client_credential(&headers).unwrap(), "gk-456");
    }

    #[test]
    fn test_missing_credential_fails() {
        let headers = HeaderMap::new();
        assert!(matches!(
            client_credential(&headers),
            Err(BridgeError::Auth(_))
        ));
    }

    #[test]
    fn test_empty_bearer_fails() {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", "Bearer ".parse().unwrap());
        assert!(matches!(
            client_credential(&headers),
            Err(BridgeError::Auth(_))
        ));
    }
}
