//! Per-installation client cache.
//!
//! Installation tokens live for an hour, so exchanging one on every webhook
//! is wasteful. [`CachedClientFactory`] keeps the client minted for each
//! installation until a TTL below the token lifetime runs out.
//!
//! Each installation has its own async lock. Concurrent requests for the same
//! installation wait on the first exchange instead of starting their own,
//! while different installations never block each other. Failed exchanges
//! leave nothing behind, so the next request tries again.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::time::Instant;
use tracing::debug;

use crate::types::InstallationId;

use super::client::InstallationClientFactory;
use super::error::GitHubApiError;

/// How long a minted client is reused. GitHub tokens expire after one hour.
pub const DEFAULT_TTL: Duration = Duration::from_secs(50 * 60);

/// Maximum number of installations tracked at once.
pub const DEFAULT_CAPACITY: usize = 1024;

struct CachedClient<C> {
    client: C,
    expires_at: Instant,
}

type Slot<C> = Arc<AsyncMutex<Option<CachedClient<C>>>>;

/// Wraps a factory and reuses its clients until they expire.
pub struct CachedClientFactory<F: InstallationClientFactory> {
    inner: F,
    ttl: Duration,
    capacity: usize,
    slots: Mutex<HashMap<InstallationId, Slot<F::Client>>>,
}

impl<F: InstallationClientFactory> CachedClientFactory<F> {
    /// Wraps `inner` with the default TTL and capacity.
    pub fn new(inner: F) -> Self {
        Self::with_limits(inner, DEFAULT_TTL, DEFAULT_CAPACITY)
    }

    /// Wraps `inner` with an explicit TTL and capacity.
    ///
    /// The capacity is a soft bound: installations whose exchange is in
    /// flight are never evicted.
    pub fn with_limits(inner: F, ttl: Duration, capacity: usize) -> Self {
        Self {
            inner,
            ttl,
            capacity: capacity.max(1),
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Number of installations currently tracked.
    pub fn len(&self) -> usize {
        self.lock_slots().len()
    }

    /// Returns true if no installation is tracked.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock_slots(&self) -> MutexGuard<'_, HashMap<InstallationId, Slot<F::Client>>> {
        // The map holds no invariants a panicking holder could break.
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the slot for `installation`, creating it if needed.
    fn slot(&self, installation: InstallationId) -> Slot<F::Client> {
        let mut slots = self.lock_slots();
        if let Some(slot) = slots.get(&installation) {
            return Arc::clone(slot);
        }

        if slots.len() >= self.capacity {
            evict(&mut slots, self.capacity);
        }

        let slot = Arc::new(AsyncMutex::new(None));
        slots.insert(installation, Arc::clone(&slot));
        slot
    }
}

/// Makes room in a full map.
///
/// Idle slots that are empty or expired go first. If the map is still full,
/// the idle entry closest to expiry is dropped. A slot is idle when the map
/// holds the only reference to it; a slot handed out by [`slot`] but not yet
/// locked is in use.
///
/// [`slot`]: CachedClientFactory::slot
fn evict<C>(slots: &mut HashMap<InstallationId, Slot<C>>, capacity: usize) {
    let now = Instant::now();

    slots.retain(|_, slot| {
        if Arc::strong_count(slot) > 1 {
            return true;
        }
        match slot.try_lock() {
            Ok(entry) => entry.as_ref().is_some_and(|c| c.expires_at > now),
            Err(_) => true,
        }
    });

    if slots.len() < capacity {
        return;
    }

    let victim = slots
        .iter()
        .filter(|(_, slot)| Arc::strong_count(slot) == 1)
        .filter_map(|(id, slot)| {
            slot.try_lock()
                .ok()
                .and_then(|entry| entry.as_ref().map(|c| (*id, c.expires_at)))
        })
        .min_by_key(|(_, expires_at)| *expires_at)
        .map(|(id, _)| id);

    if let Some(id) = victim {
        debug!(installation = %id, "Evicting cached installation client");
        slots.remove(&id);
    }
}

impl<F> InstallationClientFactory for CachedClientFactory<F>
where
    F: InstallationClientFactory + Sync,
    F::Client: Clone,
{
    type Client = F::Client;

    async fn client_for(
        &self,
        installation: InstallationId,
    ) -> Result<Self::Client, GitHubApiError> {
        let slot = self.slot(installation);
        let mut entry = slot.lock().await;

        if let Some(cached) = entry.as_ref().filter(|c| c.expires_at > Instant::now()) {
            debug!(installation = %installation, "Reusing cached installation client");
            return Ok(cached.client.clone());
        }

        let client = self.inner.client_for(installation).await?;
        *entry = Some(CachedClient {
            client: client.clone(),
            expires_at: Instant::now() + self.ttl,
        });

        Ok(client)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::FakeGitHub;

    #[tokio::test]
    async fn second_request_reuses_client() {
        let fake = FakeGitHub::new();
        let cache = CachedClientFactory::new(fake.clone());

        cache.client_for(InstallationId(1)).await.unwrap();
        cache.client_for(InstallationId(1)).await.unwrap();

        assert_eq!(fake.exchange_count(), 1);
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn installations_are_cached_independently() {
        let fake = FakeGitHub::new();
        let cache = CachedClientFactory::new(fake.clone());

        let a = cache.client_for(InstallationId(1)).await.unwrap();
        let b = cache.client_for(InstallationId(2)).await.unwrap();

        assert_eq!(a.installation(), InstallationId(1));
        assert_eq!(b.installation(), InstallationId(2));
        assert_eq!(fake.exchange_count(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn expired_entry_is_refreshed() {
        let fake = FakeGitHub::new();
        let cache = CachedClientFactory::with_limits(fake.clone(), Duration::from_secs(60), 16);

        cache.client_for(InstallationId(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        cache.client_for(InstallationId(1)).await.unwrap();
        assert_eq!(fake.exchange_count(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        cache.client_for(InstallationId(1)).await.unwrap();
        assert_eq!(fake.exchange_count(), 2);
    }

    #[tokio::test]
    async fn failed_exchange_is_not_cached() {
        let fake = FakeGitHub::new().failing_exchange();
        let cache = CachedClientFactory::new(fake.clone());

        assert!(cache.client_for(InstallationId(1)).await.is_err());
        assert!(cache.client_for(InstallationId(1)).await.is_err());

        assert_eq!(fake.exchange_count(), 2);
    }

    #[tokio::test]
    async fn concurrent_requests_share_one_exchange() {
        let fake = FakeGitHub::new().with_exchange_delay(Duration::from_millis(50));
        let cache = Arc::new(CachedClientFactory::new(fake.clone()));

        let tasks: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.client_for(InstallationId(7)).await })
            })
            .collect();

        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(fake.exchange_count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_evicts_expired_entries_first() {
        let fake = FakeGitHub::new();
        let cache = CachedClientFactory::with_limits(fake.clone(), Duration::from_secs(60), 2);

        cache.client_for(InstallationId(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        cache.client_for(InstallationId(2)).await.unwrap();
        tokio::time::advance(Duration::from_secs(31)).await;

        // Installation 1 has expired; installation 2 is still valid.
        cache.client_for(InstallationId(3)).await.unwrap();
        assert_eq!(cache.len(), 2);

        cache.client_for(InstallationId(2)).await.unwrap();
        assert_eq!(fake.exchange_count(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn full_cache_evicts_entry_closest_to_expiry() {
        let fake = FakeGitHub::new();
        let cache = CachedClientFactory::with_limits(fake.clone(), DEFAULT_TTL, 2);

        cache.client_for(InstallationId(1)).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.client_for(InstallationId(2)).await.unwrap();
        tokio::time::advance(Duration::from_secs(1)).await;
        cache.client_for(InstallationId(3)).await.unwrap();
        assert_eq!(cache.len(), 2);

        // Installation 1 was minted first, so it was evicted.
        cache.client_for(InstallationId(1)).await.unwrap();
        assert_eq!(fake.exchange_count(), 4);
    }

    #[tokio::test]
    async fn eviction_keeps_slots_handed_out_but_not_yet_locked() {
        let cache = CachedClientFactory::with_limits(FakeGitHub::new(), DEFAULT_TTL, 1);

        // Held the way client_for holds it between slot() and lock().
        let pending = cache.slot(InstallationId(1));
        let _other = cache.slot(InstallationId(2));

        let again = cache.slot(InstallationId(1));
        assert!(Arc::ptr_eq(&pending, &again));
    }

    #[tokio::test]
    async fn eviction_drops_idle_empty_slots() {
        let cache = CachedClientFactory::with_limits(FakeGitHub::new(), DEFAULT_TTL, 1);

        let first = cache.slot(InstallationId(1));
        drop(first);
        let _other = cache.slot(InstallationId(2));

        assert_eq!(cache.len(), 1);
    }
}
