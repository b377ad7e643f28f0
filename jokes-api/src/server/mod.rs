use crate::{
    auth::{TokenError, TokenVerifier},
    service::{JokeError, JokeService},
};
use axum::{
    Router,
    extract::{
        FromRef, Request,
        rejection::{JsonRejection, PathRejection},
    },
    http::{StatusCode, Uri},
    response::{IntoResponse, Response},
};
use axum_extra::typed_header::TypedHeaderRejection;
use json::Json;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tower_http::trace::TraceLayer;
use tracing::{error, warn};

mod auth;
mod json;
mod routes;

pub type ServerRouter = Router<ServerState>;

#[derive(Clone, FromRef)]
pub struct ServerState {
    pub jokes: Arc<JokeService>,
    pub verifier: Arc<TokenVerifier>,
}

pub fn routes() -> ServerRouter {
    routes::routes().fallback(fallback)
}

/// The complete HTTP application with request tracing.
pub fn app(state: ServerState) -> Router {
    routes()
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn fallback(request: Request) -> ServerError {
    ServerError::UnknownRoute(request.into_parts().0.uri)
}

pub type Result<T, E = ServerError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Unknown route requested: {0}")]
    UnknownRoute(Uri),
    #[error("Path rejected: {0}")]
    PathRejection(#[from] PathRejection),
    #[error("Incoming JSON rejected: {0}")]
    JsonRejection(#[from] JsonRejection),
    #[error("JSON response could not be serialized: {0}")]
    JsonResponse(#[from] serde_json::Error),
    #[error("Authorization header was missing or invalid: {0}")]
    InvalidAuthorizationHeader(TypedHeaderRejection),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error("Token lacks the {0} scope")]
    MissingScope(&'static str),
    #[error(transparent)]
    Joke(#[from] JokeError),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::UnknownRoute(_)
            | ServerError::PathRejection(_)
            | ServerError::Joke(JokeError::NotFound(_)) => StatusCode::NOT_FOUND,
            ServerError::JsonRejection(_) | ServerError::Joke(JokeError::InvalidContent(_)) => {
                StatusCode::BAD_REQUEST
            }
            ServerError::Token(TokenError::JwksUnavailable(_) | TokenError::JwksBackoff) => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ServerError::InvalidAuthorizationHeader(_) | ServerError::Token(_) => {
                StatusCode::UNAUTHORIZED
            }
            ServerError::MissingScope(_) | ServerError::Joke(JokeError::NotAuthor { .. }) => {
                StatusCode::FORBIDDEN
            }
            ServerError::JsonResponse(_) | ServerError::Joke(JokeError::Database(_)) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
struct ErrorResponse {
    status: u16,
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            error!(error = %self, %status, "Replying with error");
        } else {
            warn!(error = %self, %status, "Replying with error");
        }

        let error_response = ErrorResponse {
            status: status.as_u16(),
        };
        (status, Json(error_response)).into_response()
    }
}
