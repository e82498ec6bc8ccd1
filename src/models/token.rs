use serde::{Deserialize, Serialize};

/// The access/refresh credential pair issued by the backend.
///
/// The same shape is used on the wire (`{"access": .., "refresh": ..}`) and in
/// persisted storage. Both halves are always present; an incomplete pair is
/// never constructed from stored data.
#[derive(Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct TokenPair {
    access: String,
    refresh: String,
}

impl TokenPair {
    pub fn new(access: impl Into<String>, refresh: impl Into<String>) -> Self {
        TokenPair {
            access: access.into(),
            refresh: refresh.into(),
        }
    }

    pub fn access(&self) -> &str {
        &self.access
    }

    pub fn refresh(&self) -> &str {
        &self.refresh
    }

    /// Empty strings count as missing credentials.
    pub fn is_complete(&self) -> bool {
        !self.access.is_empty() && !self.refresh.is_empty()
    }
}

// Keep secrets out of debug output and logs.
impl std::fmt::Debug for TokenPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenPair")
            .field("access", &token_preview(&self.access))
            .field("refresh", &token_preview(&self.refresh))
            .finish()
    }
}

/// First 8 characters of a token, for logs.
pub fn token_preview(token: &str) -> String {
    if token.chars().count() > 12 {
        let head: String = token.chars().take(8).collect();
        format!("{head}...")
    } else {
        "***".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_uses_backend_field_names() {
        let pair: TokenPair =
            serde_json::from_str(r#"{"access": "a1", "refresh": "r1"}"#).unwrap();
        assert_eq!(pair.access(), "a1");
        assert_eq!(pair.refresh(), "r1");

        let partial = serde_json::from_str::<TokenPair>(r#"{"access": "a1"}"#);
        assert!(partial.is_err(), "a pair without refresh token must not parse");
    }

    #[test]
    fn test_empty_halves_are_incomplete() {
        assert!(TokenPair::new("a", "r").is_complete());
        assert!(!TokenPair::new("", "r").is_complete());
        assert!(!TokenPair::new("a", "").is_complete());
    }

    #[test]
    fn test_debug_hides_secrets() {
        let pair = TokenPair::new("eyJhbGciOiJIUzI1NiJ9.payload", "short");
        let rendered = format!("{:?}", pair);
        assert!(rendered.contains("eyJhbGci..."));
        assert!(!rendered.contains("payload"));
        assert!(!rendered.contains("short"));
    }
}
