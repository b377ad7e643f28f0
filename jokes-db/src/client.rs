use crate::{JokeRepository, Result, record::JokeRecord};
use async_trait::async_trait;
use jokes_common::model::{
    Id,
    joke::{CreateJoke, Joke, JokeMarker},
};
use sqlx::{PgPool, postgres::PgPoolOptions, query, query_as};
use tracing::info;

/// Postgres-backed joke store.
#[derive(Clone, Debug)]
pub struct DbClient {
    pool: PgPool,
}

impl DbClient {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!(max_connections, "Connected to database");
        Ok(Self::new(pool))
    }

    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations").run(&self.pool).await?;

        info!("Database migrations are up to date");
        Ok(())
    }
}

#[async_trait]
impl JokeRepository for DbClient {
    async fn create_joke(&self, joke: &CreateJoke) -> Result<Joke> {
        let record = query_as::<_, JokeRecord>(
            "
            INSERT INTO jokes.jokes (content, author_id)
            VALUES ($1, $2)
            RETURNING joke_id, content, author_id
            ",
        )
        .bind(joke.content.get())
        .bind(joke.author_id.get())
        .fetch_one(&self.pool)
        .await?;

        Ok(Joke::try_from(record)?)
    }

    async fn fetch_joke(&self, joke_id: Id<JokeMarker>) -> Result<Option<Joke>> {
        let record = query_as::<_, JokeRecord>(
            "
            SELECT
                jokes.joke_id,
                jokes.content,
                jokes.author_id
            FROM
                jokes.jokes
            WHERE
                jokes.joke_id = $1
            ",
        )
        .bind(joke_id.get())
        .fetch_optional(&self.pool)
        .await?;

        let joke = record.map(Joke::try_from).transpose()?;
        Ok(joke)
    }

    async fn fetch_jokes(&self) -> Result<Vec<Joke>> {
        let records = query_as::<_, JokeRecord>(
            "
            SELECT
                jokes.joke_id,
                jokes.content,
                jokes.author_id
            FROM
                jokes.jokes
            ORDER BY
                jokes.joke_id
            ",
        )
        .fetch_all(&self.pool)
        .await?;

        let jokes = records
            .into_iter()
            .map(Joke::try_from)
            .collect::<Result<_, _>>()?;
        Ok(jokes)
    }

    async fn delete_joke(&self, joke_id: Id<JokeMarker>) -> Result<bool> {
        let result = query(
            "
            DELETE FROM jokes.jokes
            WHERE jokes.joke_id = $1
            ",
        )
        .bind(joke_id.get())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
