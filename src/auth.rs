//! Request user identification.
//!
//! The bearer token carries the user id (issued by the surrounding platform).
//! When auth is disabled in config, requests act as the `default` user.

use axum::http::HeaderMap;

/// User assumed when authentication is disabled.
pub const DEFAULT_USER: &str = "default";

/// Extract the user id from the Authorization header.
///
/// Expected format: "Authorization: Bearer <user-token>"
pub fn extract_user(headers: &HeaderMap) -> Result<String, TokenError> {
    let auth_header = headers
        .get("authorization")
        .ok_or(TokenError::Missing)?
        .to_str()
        .map_err(|_| TokenError::InvalidFormat)?;

    parse_bearer_token(auth_header)
}

fn parse_bearer_token(header_value: &str) -> Result<String, TokenError> {
    let parts: Vec<&str> = header_value.splitn(2, ' ').collect();

    if parts.len() != 2 {
        return Err(TokenError::InvalidFormat);
    }

    if parts[0].to_lowercase() != "bearer" {
        return Err(TokenError::InvalidFormat);
    }

    let token = parts[1].trim();

    if token.is_empty() {
        return Err(TokenError::Empty);
    }

    Ok(token.to_string())
}

/// Token extraction errors
#[derive(Debug, PartialEq, Clone)]
pub enum TokenError {
    /// Authorization header not present
    Missing,
    /// Invalid format (not "Bearer <token>")
    InvalidFormat,
    /// Token is empty string
    Empty,
}

impl std::fmt::Display for TokenError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TokenError::Missing => write!(f, "Authorization token not provided"),
            TokenError::InvalidFormat => write!(f, "Invalid authorization token format"),
            TokenError::Empty => write!(f, "Authorization token is empty"),
        }
    }
}

impl std::error::Error for TokenError {}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers_with(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn test_extract_user() {
        let headers = headers_with("Bearer alice");
        assert_eq!(extract_user(&headers).unwrap(), "alice");
    }

    #[test]
    fn test_bearer_scheme_case_insensitive() {
        let headers = headers_with("bearer alice");
        assert_eq!(extract_user(&headers).unwrap(), "alice");
    }

    #[test]
    fn test_missing_header() {
        assert_eq!(extract_user(&HeaderMap::new()), Err(TokenError::Missing));
    }

    #[test]
    fn test_wrong_scheme() {
        let headers = headers_with("Basic alice");
        assert_eq!(extract_user(&headers), Err(TokenError::InvalidFormat));
    }

    #[test]
    fn test_empty_token() {
        let headers = headers_with("Bearer  ");
        assert_eq!(extract_user(&headers), Err(TokenError::Empty));
    }
}
