use crate::{
    auth::Principal,
    server::{
        Result, ServerError, ServerRouter,
        auth::Joker,
        json::{Created, Json},
    },
    service::JokeService,
};
use axum::{extract::State, http::StatusCode};
use axum_extra::routing::{RouterExt, TypedPath};
use jokes_common::model::{
    Id,
    joke::{Joke, JokeMarker, JokeSubmission},
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .typed_get(list_jokes)
        .typed_post(create_joke)
        .typed_get(get_joke)
        .typed_delete(delete_joke)
}

#[derive(TypedPath)]
#[typed_path("/jokes")]
struct JokesPath;

#[derive(TypedPath, Deserialize)]
#[typed_path("/jokes/{id}", rejection(ServerError))]
struct JokePath {
    id: Id<JokeMarker>,
}

async fn list_jokes(
    JokesPath: JokesPath,
    State(jokes): State<Arc<JokeService>>,
) -> Result<Json<Vec<Joke>>> {
    Ok(Json(jokes.list_jokes().await?))
}

async fn create_joke(
    JokesPath: JokesPath,
    State(jokes): State<Arc<JokeService>>,
    Joker(principal): Joker,
    Json(submission): Json<JokeSubmission>,
) -> Result<Created<Joke>> {
    let joke = jokes
        .create_joke(submission.content, &principal.subject)
        .await?;

    Ok(Created(joke))
}

async fn get_joke(
    JokePath { id }: JokePath,
    State(jokes): State<Arc<JokeService>>,
) -> Result<Json<Joke>> {
    Ok(Json(jokes.get_joke(id).await?))
}

// The path is taken as a `Result` so a request without a valid token is
// refused before a malformed id is reported.
async fn delete_joke(
    path: Result<JokePath>,
    State(jokes): State<Arc<JokeService>>,
    principal: Principal,
) -> Result<StatusCode> {
    let JokePath { id } = path?;
    jokes.delete_joke(id, &principal.subject).await?;

    Ok(StatusCode::NO_CONTENT)
}
