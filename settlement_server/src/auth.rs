//! Bearer token authentication.
//!
//! Access tokens are issued by the marketplace's auth service. This server only validates them: the
//! [`crate::middleware::JwtMiddlewareFactory`] checks the `Authorization: Bearer <token>` header and stores the
//! [`JwtClaims`] in the request extensions, where handlers pick them up by taking `JwtClaims` as an argument.
use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::*;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use settlement_engine::{db_types::Role, order_objects::Actor};

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

const DEFAULT_TOKEN_LIFETIME: Duration = Duration::hours(24);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user id. Sent as a string, as is customary for `sub`.
    #[serde(serialize_with = "id_to_string", deserialize_with = "id_from_string_or_number")]
    pub sub: i64,
    #[serde(default)]
    pub roles: Vec<Role>,
    pub exp: i64,
    pub iat: i64,
    pub iss: String,
}

impl JwtClaims {
    pub fn user_id(&self) -> i64 {
        self.sub
    }

    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    pub fn can_read_all(&self) -> bool {
        self.has_role(Role::ReadAll) || self.has_role(Role::Admin)
    }

    pub fn actor(&self) -> Actor {
        Actor::User(self.sub)
    }
}

impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned().ok_or_else(|| {
            warn!("💻️ A handler asked for JWT claims, but the route is not behind the JWT middleware");
            ServerError::AuthenticationError(AuthError::MissingToken)
        });
        ready(claims)
    }
}

fn id_to_string<S: Serializer>(id: &i64, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&id.to_string())
}

fn id_from_string_or_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::Number(n) => n.as_i64().ok_or_else(|| serde::de::Error::custom("sub is not an integer")),
        serde_json::Value::String(s) => s.parse::<i64>().map_err(serde::de::Error::custom),
        other => Err(serde::de::Error::custom(format!("sub must be a user id, not {other}"))),
    }
}

//-------------------------------------------------  Validation  -------------------------------------------------------
#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(config: &AuthConfig) -> Self {
        let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&config.issuer]);
        validation.set_required_spec_claims(&["sub", "exp", "iat", "iss"]);
        Self { key, validation }
    }

    pub fn validate(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => AuthError::ExpiredToken,
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                AuthError::PoorlyFormattedToken(e.to_string())
            },
            _ => AuthError::ValidationError(e.to_string()),
        })?;
        trace!("🔐️ Access token validated for user #{}", data.claims.sub);
        Ok(data.claims)
    }

    /// Pulls the token out of an `Authorization` header value.
    pub fn extract_from_header(header: &str) -> Option<&str> {
        header.strip_prefix("Bearer ").map(str::trim).filter(|t| !t.is_empty())
    }
}

//-------------------------------------------------  Issuing  ----------------------------------------------------------
/// Signs access tokens with the shared secret. The auth service does this in production; the server only uses it for
/// operational tooling and tests.
pub struct TokenIssuer {
    key: EncodingKey,
    issuer: String,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        let key = EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        Self { key, issuer: config.issuer.clone() }
    }

    pub fn issue_token(&self, user_id: i64, roles: Vec<Role>, lifetime: Option<Duration>) -> Result<String, AuthError> {
        let now = Utc::now();
        let claims = JwtClaims {
            sub: user_id,
            roles,
            exp: (now + lifetime.unwrap_or(DEFAULT_TOKEN_LIFETIME)).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
        };
        encode(&Header::new(Algorithm::HS256), &claims, &self.key)
            .map_err(|e| AuthError::ValidationError(format!("Could not sign token. {e}")))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn config() -> AuthConfig {
        AuthConfig::new("a-test-secret-that-is-long-enough-for-hs256", "marketplace-auth")
    }

    #[test]
    fn issue_and_validate() {
        let token = TokenIssuer::new(&config()).issue_token(42, vec![Role::User, Role::Admin], None).unwrap();
        let claims = TokenValidator::new(&config()).validate(&token).unwrap();
        assert_eq!(claims.user_id(), 42);
        assert!(claims.has_role(Role::Admin));
        assert!(claims.can_read_all());
        assert_eq!(claims.actor(), Actor::User(42));
    }

    #[test]
    fn sub_is_a_string_on_the_wire() {
        let claims = JwtClaims { sub: 7, roles: vec![Role::User], exp: 2, iat: 1, iss: "x".into() };
        let json = serde_json::to_value(&claims).unwrap();
        assert_eq!(json["sub"], "7");
        assert_eq!(json["roles"][0], "user");
        let numeric = serde_json::json!({"sub": 7, "exp": 2, "iat": 1, "iss": "x"});
        let parsed: JwtClaims = serde_json::from_value(numeric).unwrap();
        assert_eq!(parsed.sub, 7);
        assert!(parsed.roles.is_empty());
    }

    #[test]
    fn rejects_foreign_issuer() {
        let other = AuthConfig::new("a-test-secret-that-is-long-enough-for-hs256", "somebody-else");
        let token = TokenIssuer::new(&other).issue_token(1, vec![Role::User], None).unwrap();
        let err = TokenValidator::new(&config()).validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::ValidationError(_)));
    }

    #[test]
    fn rejects_expired_tokens() {
        let token = TokenIssuer::new(&config()).issue_token(1, vec![Role::User], Some(Duration::hours(-2))).unwrap();
        let err = TokenValidator::new(&config()).validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::ExpiredToken));
    }

    #[test]
    fn rejects_wrong_secret() {
        let other = AuthConfig::new("another-secret-that-is-also-long-enough!!", "marketplace-auth");
        let token = TokenIssuer::new(&other).issue_token(1, vec![Role::User], None).unwrap();
        let err = TokenValidator::new(&config()).validate(&token).unwrap_err();
        assert!(matches!(err, AuthError::ValidationError(_)));
        assert!(matches!(TokenValidator::new(&config()).validate("not-a-token"), Err(AuthError::PoorlyFormattedToken(_))));
    }

    #[test]
    fn header_extraction() {
        assert_eq!(TokenValidator::extract_from_header("Bearer abc.def"), Some("abc.def"));
        assert_eq!(TokenValidator::extract_from_header("Bearer "), None);
        assert_eq!(TokenValidator::extract_from_header("Basic abc"), None);
    }
}
