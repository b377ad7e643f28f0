use crate::auth::TokenError;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use std::time::Duration;
use tokio::{
    sync::{Mutex, RwLock},
    time::Instant,
};
use tracing::{info, warn};
use url::Url;

const FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Where verification keys come from.
pub enum JwkSource {
    Local(JwkSet),
    Remote(RemoteJwkSet),
}

impl JwkSource {
    pub(crate) async fn find(&self, kid: Option<&str>) -> Result<Option<Jwk>, TokenError> {
        match self {
            JwkSource::Local(keys) => Ok(select_key(keys, kid).cloned()),
            JwkSource::Remote(remote) => remote.find(kid).await,
        }
    }
}

/// A key set published by the identity provider, cached between requests.
///
/// A token signed with a key missing from the cache causes a refetch, so key
/// rotation is picked up without waiting for the cache to expire. Fetch
/// attempts, failed ones included, are at most one per
/// `min_refetch_interval`. When a refresh fails, keys from the previous set
/// are still served.
pub struct RemoteJwkSet {
    client: reqwest::Client,
    uri: Url,
    cache_ttl: Duration,
    min_refetch_interval: Duration,
    state: RwLock<CacheState>,
    refresh: Mutex<()>,
}

#[derive(Default)]
struct CacheState {
    keys: Option<CachedJwkSet>,
    last_attempt: Option<Instant>,
}

struct CachedJwkSet {
    keys: JwkSet,
    fetched_at: Instant,
}

enum Lookup {
    Decided(Option<Jwk>),
    Refetch,
}

impl RemoteJwkSet {
    pub fn new(
        uri: Url,
        cache_ttl: Duration,
        min_refetch_interval: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder().timeout(FETCH_TIMEOUT).build()?;

        Ok(Self {
            client,
            uri,
            cache_ttl,
            min_refetch_interval,
            state: RwLock::new(CacheState::default()),
            refresh: Mutex::new(()),
        })
    }

    async fn find(&self, kid: Option<&str>) -> Result<Option<Jwk>, TokenError> {
        let lookup = self.lookup(&*self.state.read().await, kid)?;
        if let Lookup::Decided(jwk) = lookup {
            return Ok(jwk);
        }

        // Only one fetch runs at a time. The state lock is never held across it.
        let _refresh = self.refresh.lock().await;

        let lookup = self.lookup(&*self.state.read().await, kid)?;
        if let Lookup::Decided(jwk) = lookup {
            return Ok(jwk);
        }

        self.state.write().await.last_attempt = Some(Instant::now());

        match self.fetch().await {
            Ok(keys) => {
                let jwk = select_key(&keys, kid).cloned();
                self.state.write().await.keys = Some(CachedJwkSet {
                    keys,
                    fetched_at: Instant::now(),
                });

                Ok(jwk)
            }
            Err(err) => {
                let state = self.state.read().await;
                match state
                    .keys
                    .as_ref()
                    .and_then(|cached| select_key(&cached.keys, kid))
                {
                    Some(jwk) => {
                        warn!(uri = %self.uri, "Using key from the previously fetched JWK set");
                        Ok(Some(jwk.clone()))
                    }
                    None => Err(err.into()),
                }
            }
        }
    }

    fn lookup(&self, state: &CacheState, kid: Option<&str>) -> Result<Lookup, TokenError> {
        let attempted_recently = state
            .last_attempt
            .is_some_and(|at| at.elapsed() < self.min_refetch_interval);

        match &state.keys {
            Some(cached) => {
                let jwk = select_key(&cached.keys, kid);
                let fresh = cached.fetched_at.elapsed() < self.cache_ttl;

                if (fresh && jwk.is_some()) || attempted_recently {
                    Ok(Lookup::Decided(jwk.cloned()))
                } else {
                    Ok(Lookup::Refetch)
                }
            }
            None if attempted_recently => Err(TokenError::JwksBackoff),
            None => Ok(Lookup::Refetch),
        }
    }

    async fn fetch(&self) -> Result<JwkSet, reqwest::Error> {
        let result = async {
            self.client
                .get(self.uri.clone())
                .send()
                .await?
                .error_for_status()?
                .json::<JwkSet>()
                .await
        }
        .await;

        match &result {
            Ok(keys) => info!(uri = %self.uri, keys = keys.keys.len(), "Fetched JWK set"),
            Err(err) => warn!(uri = %self.uri, error = %err, "Fetching JWK set failed"),
        }
        result
    }
}

fn select_key<'a>(keys: &'a JwkSet, kid: Option<&str>) -> Option<&'a Jwk> {
    match kid {
        Some(kid) => keys.find(kid),
        None => match keys.keys.as_slice() {
            [only] => Some(only),
            _ => None,
        },
    }
}
