pub mod client;
pub mod memory;
mod record;

use async_trait::async_trait;
use jokes_common::model::{
    Id, ModelValidationError,
    joke::{CreateJoke, Joke, JokeMarker},
};
use thiserror::Error;

pub type Result<T, E = DbError> = std::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("An object in the database was invalid: {0}")]
    Data(#[from] ModelValidationError),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error("Applying migrations failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),
}

/// Persistent collection of jokes, keyed by a store-assigned id.
#[async_trait]
pub trait JokeRepository: Send + Sync + 'static {
    /// Inserts a joke and returns it with its newly assigned id.
    async fn create_joke(&self, joke: &CreateJoke) -> Result<Joke>;

    async fn fetch_joke(&self, joke_id: Id<JokeMarker>) -> Result<Option<Joke>>;

    /// All jokes, in ascending id order.
    async fn fetch_jokes(&self) -> Result<Vec<Joke>>;

    /// Returns whether a joke was actually removed.
    async fn delete_joke(&self, joke_id: Id<JokeMarker>) -> Result<bool>;
}
