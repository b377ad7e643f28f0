use crate::server::ServerRouter;

mod health;
mod jokes;

pub fn routes() -> ServerRouter {
    ServerRouter::new()
        .merge(jokes::routes())
        .merge(health::routes())
}
