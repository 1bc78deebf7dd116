//! Daily phrase serving
//!
//! Looks in the ephemeral cache first and only goes to storage on a miss,
//! caching whatever storage hands back.

use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{CacheInfo, Clock, EphemeralCache, SystemClock};
use crate::error::{PhraseError, Result};
use crate::phrase::models::Phrase;
use crate::phrase::store::PhraseStore;

pub struct PhraseService<C: Clock = SystemClock> {
    store: Arc<dyn PhraseStore>,
    cache: Arc<EphemeralCache<Phrase, C>>,
}

impl<C: Clock> Clone for PhraseService<C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            cache: Arc::clone(&self.cache),
        }
    }
}

impl PhraseService<SystemClock> {
    /// Service with its own process-wide cache
    pub fn new(store: Arc<dyn PhraseStore>) -> Self {
        Self::with_cache(store, Arc::new(EphemeralCache::new()))
    }
}

impl<C: Clock> PhraseService<C> {
    pub fn with_cache(store: Arc<dyn PhraseStore>, cache: Arc<EphemeralCache<Phrase, C>>) -> Self {
        Self { store, cache }
    }

    /// The current phrase of the day.
    ///
    /// Served from this service's cache while it is fresh. Otherwise the next
    /// phrase in rotation is taken from storage and cached. The cache lives
    /// as long as the service, so a fresh service always rotates once.
    pub async fn daily_phrase(&self) -> Result<Phrase> {
        if let Some(phrase) = self.cache.get() {
            debug!(category = %phrase.category, "Serving phrase from cache");
            return Ok(phrase);
        }

        let stored = self
            .store
            .next_for_rotation()
            .await?
            .ok_or(PhraseError::NoPhrasesAvailable)?;

        let phrase = stored.to_phrase();
        self.cache.set(phrase.clone());

        info!(id = %stored.id, category = %phrase.category, "Rotated to new daily phrase");
        Ok(phrase)
    }

    pub fn cache_info(&self) -> CacheInfo {
        self.cache.info()
    }

    /// Drop the cached phrase so the next request rotates.
    pub fn invalidate(&self) {
        self.cache.clear();
    }
}
