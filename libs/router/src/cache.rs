//! Process-wide subscription cache.
//!
//! Subscriptions survive a router restart within the same process: the
//! registry is keyed by the router's stable name and each router's whole
//! subscription set is replaced in a single insert, so a reader during a
//! restart observes either the pre-restart or post-restart set, never a
//! partial one. Only the owning router writes its entry.
//!
//! Delivery channels are stored type-erased so the cache itself stays
//! independent of any concrete dialect; restore drops entries whose channel
//! is closed or belongs to a different dialect type.

use std::any::Any;
use std::sync::{Arc, OnceLock};

use dashmap::DashMap;
use mavswitch_codec::Message;
use tokio::sync::mpsc;

use crate::subscription::{Delivery, Subscription, SubscriptionId, SubscriptionQuery};

struct CacheEntry {
    id: u64,
    query: SubscriptionQuery,
    sender: Arc<dyn Any + Send + Sync>,
}

static CACHE: OnceLock<DashMap<String, Vec<CacheEntry>>> = OnceLock::new();

fn registry() -> &'static DashMap<String, Vec<CacheEntry>> {
    CACHE.get_or_init(DashMap::new)
}

/// Replace the cached subscription set for `name` in one atomic insert.
pub(crate) fn store<M: Message>(name: &str, subscriptions: &[Subscription<M>]) {
    let entries = subscriptions
        .iter()
        .map(|sub| CacheEntry {
            id: sub.id.0,
            query: sub.query.clone(),
            sender: Arc::new(sub.sender.clone()) as Arc<dyn Any + Send + Sync>,
        })
        .collect();
    registry().insert(name.to_string(), entries);
}

/// Rebuild live subscriptions from the cache. Entries whose consumer is
/// gone, or that were registered under a different dialect type, are
/// silently dropped.
pub(crate) fn restore<M: Message>(name: &str) -> Vec<Subscription<M>> {
    let Some(entries) = registry().get(name) else {
        return Vec::new();
    };
    entries
        .iter()
        .filter_map(|entry| {
            let sender = Arc::clone(&entry.sender)
                .downcast::<mpsc::Sender<Delivery<M>>>()
                .ok()?;
            let sender = (*sender).clone();
            if sender.is_closed() {
                return None;
            }
            Some(Subscription {
                id: SubscriptionId(entry.id),
                query: entry.query.clone(),
                sender,
            })
        })
        .collect()
}

/// Number of cached registrations for a router name. Diagnostic surface,
/// also used to verify consumer-death cleanup.
pub fn cached_subscription_count(name: &str) -> usize {
    registry().get(name).map(|e| e.len()).unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use mavswitch_common::MavMessage;

    #[test]
    fn store_then_restore_round_trips() {
        let (tx, _rx) = mpsc::channel::<Delivery<MavMessage>>(4);
        let subs = vec![Subscription {
            id: SubscriptionId(7),
            query: SubscriptionQuery {
                source_system: 3,
                ..Default::default()
            },
            sender: tx,
        }];
        store("cache-test-roundtrip", &subs);

        let restored = restore::<MavMessage>("cache-test-roundtrip");
        assert_eq!(restored.len(), 1);
        assert_eq!(restored[0].id, SubscriptionId(7));
        assert_eq!(restored[0].query.source_system, 3);
    }

    #[test]
    fn closed_consumers_are_dropped_on_restore() {
        let (tx, rx) = mpsc::channel::<Delivery<MavMessage>>(4);
        drop(rx);
        let subs = vec![Subscription {
            id: SubscriptionId(1),
            query: SubscriptionQuery::default(),
            sender: tx,
        }];
        store("cache-test-closed", &subs);

        assert_eq!(cached_subscription_count("cache-test-closed"), 1);
        assert!(restore::<MavMessage>("cache-test-closed").is_empty());
    }

    #[test]
    fn unknown_name_restores_empty() {
        assert!(restore::<MavMessage>("cache-test-unknown").is_empty());
        assert_eq!(cached_subscription_count("cache-test-unknown"), 0);
    }
}
