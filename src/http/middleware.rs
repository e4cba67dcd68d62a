//! Authentication middleware and JWT verification

use axum::{
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use axum_extra::headers::{authorization::Bearer, Authorization, HeaderMapExt};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use uuid::Uuid;

use crate::app::AppState;
use crate::store::users::default_display_name;
use crate::util::time::unix_secs;

type HmacSha256 = Hmac<Sha256>;

/// JWT claims from Supabase auth token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtClaims {
    /// Subject (user ID)
    pub sub: Uuid,
    /// Audience
    #[serde(default)]
    pub aud: Option<String>,
    /// Expiration time (Unix timestamp)
    pub exp: u64,
    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: u64,
    /// Display name chosen by the user
    #[serde(default)]
    pub name: Option<String>,
    /// Email (if available)
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Deserialize)]
struct JwtHeader {
    alg: String,
}

/// Verify a JWT token and extract claims
pub fn verify_jwt(token: &str, secret: &str) -> Result<JwtClaims, AuthError> {
    // Split token into parts
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return Err(AuthError::InvalidToken);
    }

    let header_b64 = parts[0];
    let payload_b64 = parts[1];
    let signature_b64 = parts[2];

    let header_json = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| AuthError::InvalidToken)?;
    let jwt_header: JwtHeader =
        serde_json::from_slice(&header_json).map_err(|_| AuthError::InvalidToken)?;
    if jwt_header.alg != "HS256" {
        return Err(AuthError::InvalidToken);
    }

    // Verify signature (HMAC-SHA256)
    let message = format!("{}.{}", header_b64, payload_b64);

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|_| AuthError::InvalidToken)?;
    mac.update(message.as_bytes());

    let provided_signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| AuthError::InvalidToken)?;

    mac.verify_slice(&provided_signature)
        .map_err(|_| AuthError::InvalidToken)?;

    // Decode payload
    let payload_json = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| AuthError::InvalidToken)?;

    let claims: JwtClaims =
        serde_json::from_slice(&payload_json).map_err(|_| AuthError::InvalidToken)?;

    if claims.exp < unix_secs() {
        return Err(AuthError::TokenExpired);
    }

    Ok(claims)
}

/// Who a verified credential belongs to
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    pub user_id: Uuid,
    pub display_name: String,
}

impl From<JwtClaims> for Identity {
    fn from(claims: JwtClaims) -> Self {
        let display_name = claims
            .name
            .filter(|n| !n.trim().is_empty())
            .or(claims.email)
            .unwrap_or_else(|| default_display_name(claims.sub));

        Self {
            user_id: claims.sub,
            display_name,
        }
    }
}

/// Turns a bearer credential into an identity
pub trait IdentityVerifier: Send + Sync {
    fn verify(&self, token: &str) -> Result<Identity, AuthError>;
}

/// HS256 verification with a shared secret
pub struct JwtVerifier {
    secret: String,
}

impl JwtVerifier {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

impl IdentityVerifier for JwtVerifier {
    fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        verify_jwt(token, &self.secret).map(Identity::from)
    }
}

/// Authentication error types
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Missing authorization header")]
    MissingHeader,

    #[error("Invalid authorization header format")]
    InvalidFormat,

    #[error("Invalid token")]
    InvalidToken,

    #[error("Token expired")]
    TokenExpired,
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let status = match &self {
            AuthError::InvalidFormat => StatusCode::BAD_REQUEST,
            AuthError::MissingHeader | AuthError::InvalidToken | AuthError::TokenExpired => {
                StatusCode::UNAUTHORIZED
            }
        };

        (status, self.to_string()).into_response()
    }
}

/// Middleware to require authentication
pub async fn require_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, AuthError> {
    if !request.headers().contains_key(header::AUTHORIZATION) {
        return Err(AuthError::MissingHeader);
    }

    let bearer = request
        .headers()
        .typed_get::<Authorization<Bearer>>()
        .ok_or(AuthError::InvalidFormat)?;

    let identity = state.identity.verify(bearer.token())?;

    // Insert into request extensions for handlers to access
    request.extensions_mut().insert(identity);

    Ok(next.run(request).await)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub const SECRET: &str = "test-secret";

    /// Sign an HS256 token the way the auth provider does
    pub fn sign(claims: &serde_json::Value, secret: &str) -> String {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
        let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).unwrap();
        mac.update(format!("{}.{}", header, payload).as_bytes());
        let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
        format!("{}.{}.{}", header, payload, signature)
    }

    pub fn token_for(user_id: Uuid, name: Option<&str>) -> String {
        let mut claims = serde_json::json!({
            "sub": user_id,
            "exp": unix_secs() + 3600,
            "aud": "authenticated",
        });
        if let Some(name) = name {
            claims["name"] = serde_json::json!(name);
        }
        sign(&claims, SECRET)
    }

    #[test]
    fn valid_token_yields_identity() {
        let id = Uuid::new_v4();
        let identity = JwtVerifier::new(SECRET)
            .verify(&token_for(id, Some("ana")))
            .unwrap();
        assert_eq!(identity.user_id, id);
        assert_eq!(identity.display_name, "ana");
    }

    #[test]
    fn missing_name_falls_back() {
        let id = Uuid::new_v4();
        let identity = JwtVerifier::new(SECRET).verify(&token_for(id, None)).unwrap();
        assert_eq!(identity.display_name, default_display_name(id));
        assert!(identity.display_name.starts_with("Player_"));
        assert_eq!(identity.display_name.len(), "Player_".len() + 8);
    }

    #[test]
    fn email_used_when_name_absent() {
        let id = Uuid::new_v4();
        let claims = serde_json::json!({
            "sub": id,
            "exp": unix_secs() + 60,
            "email": "bo@example.com",
        });
        let identity = JwtVerifier::new(SECRET).verify(&sign(&claims, SECRET)).unwrap();
        assert_eq!(identity.display_name, "bo@example.com");
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = sign(
            &serde_json::json!({ "sub": Uuid::new_v4(), "exp": unix_secs() + 60 }),
            "other-secret",
        );
        assert!(matches!(verify_jwt(&token, SECRET), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn expired_token_rejected() {
        let token = sign(
            &serde_json::json!({ "sub": Uuid::new_v4(), "exp": unix_secs() - 10 }),
            SECRET,
        );
        assert!(matches!(verify_jwt(&token, SECRET), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn malformed_tokens_rejected() {
        assert!(matches!(verify_jwt("abc", SECRET), Err(AuthError::InvalidToken)));
        assert!(matches!(verify_jwt("a.b.c", SECRET), Err(AuthError::InvalidToken)));
    }

    #[test]
    fn other_algorithms_rejected() {
        let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"none"}"#);
        let payload = URL_SAFE_NO_PAD.encode(
            serde_json::json!({ "sub": Uuid::new_v4(), "exp": unix_secs() + 60 }).to_string(),
        );
        let token = format!("{}.{}.", header, payload);
        assert!(matches!(verify_jwt(&token, SECRET), Err(AuthError::InvalidToken)));
    }
}
