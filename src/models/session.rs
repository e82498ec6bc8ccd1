use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What observers know about the current session.
///
/// `authenticated` mirrors the presence of an access token. The identity
/// fields are read from the access token's claims when it is a JWT.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionState {
    pub authenticated: bool,
    pub user_id: Option<i64>,
    pub username: Option<String>,
}

impl SessionState {
    pub fn signed_out() -> Self {
        SessionState::default()
    }

    /// Builds the authenticated state for `access_token`.
    pub fn from_access_token(access_token: &str) -> Self {
        let claims = read_unverified_claims(access_token);
        let user_id = claims
            .as_ref()
            .and_then(|c| c.get("user_id"))
            .and_then(|v| v.as_i64().or_else(|| v.as_str()?.parse().ok()));
        let username = claims
            .as_ref()
            .and_then(|c| c.get("username"))
            .and_then(Value::as_str)
            .map(str::to_string);

        SessionState {
            authenticated: true,
            user_id,
            username,
        }
    }
}

/// Decodes JWT claims without checking the signature or expiry.
/// The client never holds the signing key; these claims are display data only.
fn read_unverified_claims(token: &str) -> Option<Value> {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Value>(token, &DecodingKey::from_secret(&[]), &validation)
        .ok()
        .map(|data| data.claims)
}
