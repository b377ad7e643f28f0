use crate::model::{Id, auth::Subject};
use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use thiserror::Error;

pub const JOKE_CONTENT_MAX_LEN: usize = 255;

#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash)]
pub struct JokeMarker;

#[derive(Clone, Eq, PartialEq, Debug, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Joke {
    pub id: Id<JokeMarker>,
    pub content: JokeContent,
    pub author_id: Subject,
}

/// Body of a joke submission, before validation.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Deserialize, Serialize)]
pub struct JokeSubmission {
    pub content: String,
}

#[derive(Clone, Eq, PartialEq, Debug, Hash)]
pub struct CreateJoke {
    pub content: JokeContent,
    pub author_id: Subject,
}

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct JokeContent(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Error)]
pub enum InvalidJokeContentError {
    #[error("The joke content is empty")]
    Empty,
    #[error("The joke content is longer than {JOKE_CONTENT_MAX_LEN} characters: {0}")]
    TooLong(usize),
}

impl JokeContent {
    pub fn new(content: String) -> Result<Self, InvalidJokeContentError> {
        if content.trim().is_empty() {
            return Err(InvalidJokeContentError::Empty);
        }

        let len = content.chars().count();
        if len > JOKE_CONTENT_MAX_LEN {
            return Err(InvalidJokeContentError::TooLong(len));
        }

        Ok(Self(content))
    }

    #[must_use]
    pub fn get(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl<'de> Deserialize<'de> for JokeContent {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        JokeContent::new(inner.clone())
            .map_err(|_| Error::invalid_value(Unexpected::Str(&inner), &"JokeContent"))
    }
}
