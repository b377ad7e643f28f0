//! Bearer token verification against a JSON Web Key Set.

mod jwks;

pub use jwks::{JwkSource, RemoteJwkSet};

use jokes_common::model::auth::{Scopes, Subject};
use jsonwebtoken::{DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("Token could not be verified: {0}")]
    Invalid(#[from] jsonwebtoken::errors::Error),
    #[error("No key in the key set matches kid {0:?}")]
    UnknownKey(Option<String>),
    #[error("Key set could not be fetched: {0}")]
    JwksUnavailable(#[from] reqwest::Error),
    #[error("Key set is unavailable, fetching is paused after a failed attempt")]
    JwksBackoff,
}

/// The verified identity behind a request.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Principal {
    pub subject: Subject,
    pub scopes: Scopes,
}

/// Claim checks applied on top of the signature.
#[derive(Clone, Eq, PartialEq, Debug, Default)]
pub struct TokenValidation {
    pub issuer: Option<String>,
    pub audience: Option<String>,
    pub leeway_seconds: u64,
}

#[derive(Deserialize)]
struct Claims {
    sub: Subject,
    #[serde(default)]
    scope: Option<Scopes>,
    #[serde(default)]
    scp: Option<Scopes>,
}

pub struct TokenVerifier {
    keys: JwkSource,
    validation: TokenValidation,
}

impl TokenVerifier {
    #[must_use]
    pub fn new(keys: JwkSource, validation: TokenValidation) -> Self {
        Self { keys, validation }
    }

    pub async fn verify(&self, token: &str) -> Result<Principal, TokenError> {
        let header = decode_header(token)?;
        let jwk = self
            .keys
            .find(header.kid.as_deref())
            .await?
            .ok_or_else(|| TokenError::UnknownKey(header.kid.clone()))?;
        let key = DecodingKey::from_jwk(&jwk)?;

        let mut validation = Validation::new(header.alg);
        validation.leeway = self.validation.leeway_seconds;
        validation.set_required_spec_claims(&["exp", "sub"]);
        if let Some(issuer) = &self.validation.issuer {
            validation.set_issuer(&[issuer]);
        }
        match &self.validation.audience {
            Some(audience) => validation.set_audience(&[audience]),
            None => validation.validate_aud = false,
        }

        let claims = decode::<Claims>(token, &key, &validation)?.claims;
        debug!(subject = %claims.sub, "Verified bearer token");

        Ok(Principal {
            subject: claims.sub,
            scopes: claims.scope.or(claims.scp).unwrap_or_default(),
        })
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::auth::{JwkSource, TokenValidation, TokenVerifier};
    use jsonwebtoken::{Algorithm, EncodingKey, Header, encode, get_current_timestamp, jwk::JwkSet};
    use serde_json::{Value, json};

    pub const TEST_KID: &str = "test-key";
    pub const TEST_ISSUER: &str = "http://localhost:8080/realms/jokes";

    const SIGNING_KEY: &str = include_str!("../../testdata/signing_key.pem");
    const FOREIGN_KEY: &str = include_str!("../../testdata/foreign_key.pem");
    const JWKS: &str = include_str!("../../testdata/jwks.json");

    pub fn jwk_set() -> JwkSet {
        serde_json::from_str(JWKS).unwrap()
    }

    pub fn verifier() -> TokenVerifier {
        TokenVerifier::new(
            JwkSource::Local(jwk_set()),
            TokenValidation {
                issuer: Some(TEST_ISSUER.to_owned()),
                audience: None,
                leeway_seconds: 0,
            },
        )
    }

    pub fn claims(subject: &str, scope: Option<&str>) -> Value {
        let now = get_current_timestamp();
        let mut claims = json!({
            "iss": TEST_ISSUER,
            "sub": subject,
            "iat": now,
            "exp": now + 300,
        });
        if let Some(scope) = scope {
            claims["scope"] = json!(scope);
        }
        claims
    }

    pub fn sign(claims: &Value) -> String {
        sign_with(claims, SIGNING_KEY, Some(TEST_KID))
    }

    pub fn sign_foreign(claims: &Value) -> String {
        sign_with(claims, FOREIGN_KEY, Some(TEST_KID))
    }

    pub fn sign_with(claims: &Value, pem: &str, kid: Option<&str>) -> String {
        let mut header = Header::new(Algorithm::RS256);
        header.kid = kid.map(str::to_owned);
        let key = EncodingKey::from_rsa_pem(pem.as_bytes()).unwrap();
        encode(&header, claims, &key).unwrap()
    }

    pub fn token(subject: &str, scope: Option<&str>) -> String {
        sign(&claims(subject, scope))
    }
}

#[cfg(test)]
mod tests {
    use crate::auth::{
        JwkSource, TokenError, TokenValidation, TokenVerifier,
        test_support::{self, TEST_KID},
    };
    use jsonwebtoken::{
        Algorithm, EncodingKey, Header, encode, errors::ErrorKind, get_current_timestamp,
    };
    use serde_json::json;

    #[tokio::test]
    async fn valid_token() {
        let verifier = test_support::verifier();
        let token = test_support::token("userOne", Some("openid joker"));

        let principal = verifier.verify(&token).await.unwrap();

        assert_eq!(principal.subject.get(), "userOne");
        assert!(principal.scopes.contains("joker"));
        assert!(principal.scopes.contains("openid"));
    }

    #[tokio::test]
    async fn token_without_scope() {
        let verifier = test_support::verifier();
        let token = test_support::token("user", None);

        let principal = verifier.verify(&token).await.unwrap();

        assert_eq!(principal.subject.get(), "user");
        assert!(principal.scopes.is_empty());
    }

    #[tokio::test]
    async fn scp_claim_is_used_without_scope() {
        let verifier = test_support::verifier();
        let mut claims = test_support::claims("userOne", None);
        claims["scp"] = json!(["joker"]);

        let token = test_support::sign(&claims);

        let principal = verifier.verify(&token).await.unwrap();

        assert!(principal.scopes.contains("joker"));
    }

    #[tokio::test]
    async fn expired_token() {
        let verifier = test_support::verifier();
        let mut claims = test_support::claims("userOne", Some("joker"));
        claims["exp"] = json!(get_current_timestamp() - 600);

        let result = verifier.verify(&test_support::sign(&claims)).await;

        assert!(matches!(
            result,
            Err(TokenError::Invalid(err)) if matches!(err.kind(), ErrorKind::ExpiredSignature)
        ));
    }

    #[tokio::test]
    async fn signed_by_foreign_key() {
        let verifier = test_support::verifier();
        let claims = test_support::claims("userOne", Some("joker"));

        let result = verifier.verify(&test_support::sign_foreign(&claims)).await;

        assert!(matches!(
            result,
            Err(TokenError::Invalid(err)) if matches!(err.kind(), ErrorKind::InvalidSignature)
        ));
    }

    #[tokio::test]
    async fn wrong_issuer() {
        let verifier = test_support::verifier();
        let mut claims = test_support::claims("userOne", Some("joker"));
        claims["iss"] = json!("http://evil.example/realms/jokes");

        let result = verifier.verify(&test_support::sign(&claims)).await;

        assert!(matches!(
            result,
            Err(TokenError::Invalid(err)) if matches!(err.kind(), ErrorKind::InvalidIssuer)
        ));
    }

    #[tokio::test]
    async fn audience_is_checked_when_configured() {
        let verifier = TokenVerifier::new(
            JwkSource::Local(test_support::jwk_set()),
            TokenValidation {
                issuer: None,
                audience: Some("jokes-api".to_owned()),
                leeway_seconds: 0,
            },
        );

        let mut claims = test_support::claims("userOne", Some("joker"));
        claims["aud"] = json!("account");
        let result = verifier.verify(&test_support::sign(&claims)).await;
        assert!(matches!(
            result,
            Err(TokenError::Invalid(err)) if matches!(err.kind(), ErrorKind::InvalidAudience)
        ));

        claims["aud"] = json!(["account", "jokes-api"]);
        let token = test_support::sign(&claims);
        assert!(verifier.verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn unknown_kid() {
        let verifier = test_support::verifier();
        let claims = test_support::claims("userOne", Some("joker"));
        let token = test_support::sign_with(
            &claims,
            include_str!("../../testdata/signing_key.pem"),
            Some("rotated-key"),
        );

        let result = verifier.verify(&token).await;

        assert!(matches!(
            result,
            Err(TokenError::UnknownKey(Some(kid))) if kid == "rotated-key"
        ));
    }

    #[tokio::test]
    async fn missing_kid_uses_only_key() {
        let verifier = test_support::verifier();
        let claims = test_support::claims("userOne", Some("joker"));
        let token = test_support::sign_with(
            &claims,
            include_str!("../../testdata/signing_key.pem"),
            None,
        );

        assert!(verifier.verify(&token).await.is_ok());
    }

    #[tokio::test]
    async fn hmac_token_is_rejected() {
        let verifier = test_support::verifier();
        let claims = test_support::claims("userOne", Some("joker"));
        let mut header = Header::new(Algorithm::HS256);
        header.kid = Some(TEST_KID.to_owned());
        let key = EncodingKey::from_secret(b"secret");
        let token = encode(&header, &claims, &key).unwrap();

        assert!(matches!(verifier.verify(&token).await, Err(TokenError::Invalid(_))));
    }

    #[tokio::test]
    async fn empty_subject_is_rejected() {
        let verifier = test_support::verifier();

        let token = test_support::token("", Some("joker"));

        let result = verifier.verify(&token).await;

        assert!(matches!(result, Err(TokenError::Invalid(_))));
    }

    #[tokio::test]
    async fn garbage_token() {
        let verifier = test_support::verifier();

        assert!(matches!(verifier.verify("not-a-jwt").await, Err(TokenError::Invalid(_))));
    }
}
