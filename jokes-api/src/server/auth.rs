use crate::{
    auth::{Principal, TokenVerifier},
    server::ServerError,
};
use axum::{
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::TypedHeader;
use headers::{Authorization, authorization::Bearer};
use std::sync::Arc;

type AuthorizationHeader = TypedHeader<Authorization<Bearer>>;

/// Scope a token needs to submit jokes.
pub const JOKER_SCOPE: &str = "joker";

impl Principal {
    pub fn require_scope(&self, scope: &'static str) -> Result<(), ServerError> {
        if self.scopes.contains(scope) {
            Ok(())
        } else {
            Err(ServerError::MissingScope(scope))
        }
    }
}

impl<S> FromRequestParts<S> for Principal
where
    Arc<TokenVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            AuthorizationHeader::from_request_parts(parts, state)
                .await
                .map_err(ServerError::InvalidAuthorizationHeader)?;

        let principal = Arc::<TokenVerifier>::from_ref(state)
            .verify(bearer.token())
            .await?;

        Ok(principal)
    }
}

/// A principal holding [`JOKER_SCOPE`].
///
/// Checked while extracting, so a request without the scope is refused
/// before its body is read.
#[derive(Clone, Eq, PartialEq, Debug)]
pub struct Joker(pub Principal);

impl<S> FromRequestParts<S> for Joker
where
    Arc<TokenVerifier>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let principal = Principal::from_request_parts(parts, state).await?;
        principal.require_scope(JOKER_SCOPE)?;

        Ok(Self(principal))
    }
}
