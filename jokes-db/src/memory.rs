use crate::{JokeRepository, Result};
use async_trait::async_trait;
use jokes_common::model::{
    Id,
    joke::{CreateJoke, Joke, JokeMarker},
};
use std::{collections::BTreeMap, sync::Mutex};

/// In-process joke store. Nothing survives a restart.
#[derive(Debug, Default)]
pub struct MemoryDb {
    inner: Mutex<MemoryDbInner>,
}

#[derive(Debug, Default)]
struct MemoryDbInner {
    last_id: i64,
    jokes: BTreeMap<i64, Joke>,
}

impl MemoryDb {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, MemoryDbInner> {
        // A panic while holding the lock cannot leave the map half-updated.
        self.inner
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

#[async_trait]
impl JokeRepository for MemoryDb {
    async fn create_joke(&self, joke: &CreateJoke) -> Result<Joke> {
        let mut inner = self.lock();
        inner.last_id += 1;

        let joke = Joke {
            id: Id::new(inner.last_id),
            content: joke.content.clone(),
            author_id: joke.author_id.clone(),
        };
        inner.jokes.insert(joke.id.get(), joke.clone());

        Ok(joke)
    }

    async fn fetch_joke(&self, joke_id: Id<JokeMarker>) -> Result<Option<Joke>> {
        Ok(self.lock().jokes.get(&joke_id.get()).cloned())
    }

    async fn fetch_jokes(&self) -> Result<Vec<Joke>> {
        Ok(self.lock().jokes.values().cloned().collect())
    }

    async fn delete_joke(&self, joke_id: Id<JokeMarker>) -> Result<bool> {
        Ok(self.lock().jokes.remove(&joke_id.get()).is_some())
    }
}
