use jokes_common::model::{
    Id,
    auth::Subject,
    joke::{CreateJoke, InvalidJokeContentError, Joke, JokeContent, JokeMarker},
};
use jokes_db::{DbError, JokeRepository};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum JokeError {
    #[error("Joke content was rejected: {0}")]
    InvalidContent(#[from] InvalidJokeContentError),
    #[error("Joke with id {0} was not found.")]
    NotFound(Id<JokeMarker>),
    #[error("{subject} is not the author of joke {id}")]
    NotAuthor { id: Id<JokeMarker>, subject: Subject },
    #[error(transparent)]
    Database(#[from] DbError),
}

pub struct JokeService {
    repository: Arc<dyn JokeRepository>,
}

impl JokeService {
    #[must_use]
    pub fn new(repository: Arc<dyn JokeRepository>) -> Self {
        Self { repository }
    }

    pub async fn list_jokes(&self) -> Result<Vec<Joke>, JokeError> {
        let jokes = self.repository.fetch_jokes().await?;

        debug!(count = jokes.len(), "Listed jokes");
        Ok(jokes)
    }

    pub async fn get_joke(&self, id: Id<JokeMarker>) -> Result<Joke, JokeError> {
        self.repository
            .fetch_joke(id)
            .await?
            .ok_or(JokeError::NotFound(id))
    }

    pub async fn create_joke(&self, content: String, author: &Subject) -> Result<Joke, JokeError> {
        let create_joke = CreateJoke {
            content: JokeContent::new(content)?,
            author_id: author.clone(),
        };

        let joke = self.repository.create_joke(&create_joke).await?;

        info!(joke_id = %joke.id, subject = %author, "Created joke");
        Ok(joke)
    }

    /// Deletes a joke on behalf of `requester`, who must be its author.
    ///
    /// Existence is checked first, so a missing joke is always `NotFound`
    /// regardless of who asks.
    pub async fn delete_joke(
        &self,
        id: Id<JokeMarker>,
        requester: &Subject,
    ) -> Result<(), JokeError> {
        let joke = self.get_joke(id).await?;

        if joke.author_id != *requester {
            warn!(joke_id = %id, subject = %requester, "Refused to delete joke of another author");
            return Err(JokeError::NotAuthor {
                id,
                subject: requester.clone(),
            });
        }

        if !self.repository.delete_joke(id).await? {
            // Deleted concurrently between the lookup and the delete.
            return Err(JokeError::NotFound(id));
        }

        info!(joke_id = %id, subject = %requester, "Deleted joke");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use crate::service::{JokeError, JokeService};
    use jokes_common::model::{Id, auth::Subject, joke::InvalidJokeContentError};
    use jokes_db::memory::MemoryDb;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    fn service() -> JokeService {
        JokeService::new(Arc::new(MemoryDb::new()))
    }

    fn subject(subject: &str) -> Subject {
        Subject::new(subject.to_owned()).unwrap()
    }

    #[tokio::test]
    async fn created_joke_can_be_fetched() {
        let service = service();
        let user_one = subject("userOne");

        let joke = service
            .create_joke("A new Joke".to_owned(), &user_one)
            .await
            .unwrap();

        assert_eq!(joke.author_id, user_one);
        assert_eq!(joke.content.get(), "A new Joke");
        assert_eq!(service.get_joke(joke.id).await.unwrap(), joke);
    }

    #[tokio::test]
    async fn empty_content_is_rejected() {
        let service = service();

        let user_one = subject("userOne");

        let result = service.create_joke("  ".to_owned(), &user_one).await;

        assert!(matches!(
            result,
            Err(JokeError::InvalidContent(InvalidJokeContentError::Empty))
        ));
        assert!(service.list_jokes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_joke_is_not_found() {
        let service = service();
        let missing = Id::new(999);

        assert!(matches!(
            service.get_joke(missing).await,
            Err(JokeError::NotFound(id)) if id == missing
        ));
        assert!(matches!(
            service.delete_joke(missing, &subject("userOne")).await,
            Err(JokeError::NotFound(id)) if id == missing
        ));
    }

    #[tokio::test]
    async fn only_the_author_may_delete() {
        let service = service();
        let user_one = subject("userOne");
        let user_two = subject("userTwo");
        let joke = service
            .create_joke("A new Joke".to_owned(), &user_one)
            .await
            .unwrap();

        let result = service.delete_joke(joke.id, &user_two).await;
        assert!(matches!(
            result,
            Err(JokeError::NotAuthor { id, subject }) if id == joke.id && subject == user_two
        ));
        assert_eq!(service.get_joke(joke.id).await.unwrap(), joke);

        service.delete_joke(joke.id, &user_one).await.unwrap();
        let result = service.get_joke(joke.id).await;
        assert!(matches!(result, Err(JokeError::NotFound(_))));
    }

    #[tokio::test]
    async fn deleting_twice_is_not_found() {
        let service = service();
        let user_one = subject("userOne");
        let joke = service
            .create_joke("A new Joke".to_owned(), &user_one)
            .await
            .unwrap();

        service.delete_joke(joke.id, &user_one).await.unwrap();

        assert!(matches!(
            service.delete_joke(joke.id, &user_one).await,
            Err(JokeError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn list_contains_all_jokes() {
        let service = service();
        let first = service
            .create_joke("First".to_owned(), &subject("userOne"))
            .await
            .unwrap();
        let second = service
            .create_joke("Second".to_owned(), &subject("userTwo"))
            .await
            .unwrap();

        let jokes = service.list_jokes().await.unwrap();

        assert_eq!(jokes, vec![first, second]);
        assert_eq!(jokes[0].author_id.get(), "userOne");
        assert_eq!(jokes[1].author_id.get(), "userTwo");
    }
}
