use serde::{
    Deserialize, Deserializer, Serialize,
    de::{Error, Unexpected},
};
use std::{collections::BTreeSet, fmt::Display};
use thiserror::Error;

/// The `sub` claim of a verified token. Doubles as the author id of a joke.
#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Hash, Serialize)]
#[serde(transparent)]
pub struct Subject(String);

#[derive(Clone, Eq, PartialEq, Ord, PartialOrd, Debug, Default, Hash, Error)]
#[error("The subject is empty")]
pub struct InvalidSubjectError;

impl Subject {
    pub fn new(subject: String) -> Result<Self, InvalidSubjectError> {
        if subject.is_empty() {
            Err(InvalidSubjectError)
        } else {
            Ok(Self(subject))
        }
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

impl Display for Subject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        Display::fmt(&self.0, f)
    }
}

impl<'de> Deserialize<'de> for Subject {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let inner = String::deserialize(deserializer)?;
        Subject::new(inner).map_err(|_| Error::invalid_value(Unexpected::Str(""), &"Subject"))
    }
}

/// `OAuth2` scopes granted to a token.
///
/// Deserializes from the space-delimited `scope` form as well as from a list
/// of strings, which some providers emit in `scp`.
#[derive(Clone, Eq, PartialEq, Debug, Default, Hash, Serialize)]
pub struct Scopes(BTreeSet<String>);

impl Scopes {
    #[must_use]
    pub fn parse_delimited(scopes: &str) -> Self {
        scopes.split_whitespace().map(str::to_owned).collect()
    }

    #[must_use]
    pub fn contains(&self, scope: &str) -> bool {
        self.0.contains(scope)
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl<S: Into<String>> FromIterator<S> for Scopes {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self(iter.into_iter().map(Into::into).collect())
    }
}

impl<'de> Deserialize<'de> for Scopes {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum ScopeClaim {
            Delimited(String),
            List(Vec<String>),
        }

        Ok(match ScopeClaim::deserialize(deserializer)? {
            ScopeClaim::Delimited(scopes) => Scopes::parse_delimited(&scopes),
            ScopeClaim::List(scopes) => scopes
                .iter()
                .flat_map(|scope| scope.split_whitespace())
                .collect(),
        })
    }
}
