/// Header carrying the API key on `/apis` requests.
pub const API_KEY_HEADER: &str = "x-api-key";

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum AuthError {
    #[error("missing API key")]
    Missing,
    #[error("invalid API key")]
    Invalid,
}

/// Validates a provided API key against the configured one.
///
/// When no key is configured every request is accepted. The expected key is
/// passed in rather than read from the environment so configuration stays in
/// `main`.
pub fn validate_api_key(expected: Option<&str>, provided: Option<&str>) -> Result<(), AuthError> {
    let Some(expected) = expected else {
        return Ok(());
    };

    match provided.map(str::trim) {
        None | Some("") => Err(AuthError::Missing),
        Some(key) if constant_time_eq(key.as_bytes(), expected.as_bytes()) => Ok(()),
        Some(_) => Err(AuthError::Invalid),
    }
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_configured_key_allows_all() {
        assert_eq!(validate_api_key(None, None), Ok(()));
        assert_eq!(validate_api_key(None, Some("anything")), Ok(()));
    }

    #[test]
    fn test_configured_key_is_enforced() {
        assert_eq!(validate_api_key(Some("s3cret"), None), Err(AuthError::Missing));
        assert_eq!(validate_api_key(Some("s3cret"), Some("  ")), Err(AuthError::Missing));
        assert_eq!(validate_api_key(Some("s3cret"), Some("nope")), Err(AuthError::Invalid));
        assert_eq!(validate_api_key(Some("s3cret"), Some("s3cret")), Ok(()));
    }
}
