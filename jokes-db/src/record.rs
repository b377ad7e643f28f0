use jokes_common::model::{
    ModelValidationError,
    auth::Subject,
    joke::{Joke, JokeContent},
};
use sqlx::FromRow;

#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, FromRow)]
pub(crate) struct JokeRecord {
    pub joke_id: i64,
    pub content: String,
    pub author_id: String,
}

impl TryFrom<JokeRecord> for Joke {
    type Error = ModelValidationError;

    fn try_from(value: JokeRecord) -> Result<Self, Self::Error> {
        Ok(Self {
            id: value.joke_id.into(),
            content: JokeContent::new(value.content)?,
            author_id: Subject::new(value.author_id)?,
        })
    }
}
