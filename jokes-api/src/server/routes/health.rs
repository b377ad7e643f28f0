use crate::server::{ServerRouter, json::Json};
use axum_extra::routing::{RouterExt, TypedPath};
use serde::Serialize;

pub fn routes() -> ServerRouter {
    ServerRouter::new().typed_get(health)
}

#[derive(TypedPath)]
#[typed_path("/health")]
struct HealthPath;

#[derive(Copy, Clone, Eq, PartialEq, Debug, Serialize)]
struct Health {
    status: &'static str,
}

async fn health(HealthPath: HealthPath) -> Json<Health> {
    Json(Health { status: "ok" })
}
