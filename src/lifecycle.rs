//! The broadcast lifecycle state machine: the heart of this crate.
//!
//! `decide` is a pure-ish function over `(&Broadcast, &mut BroadcastCache)`
//! that returns a [`Disposition`]. Evicting a stale cache entry is always
//! safe and happens eagerly inside `decide`; *inserting* a fresh entry is
//! deferred to [`commit_record`], which the caller must invoke only after
//! the broadcast has survived severity filtering, geospatial matching, and
//! the covid policy (spec.md §4.5: "If the broadcast would be dropped, any
//! tentative cache insertion is not performed").

use tracing::trace;

use crate::cache::BroadcastCache;
use crate::model::{Broadcast, CacheEntry, Disposition, MsgType, StoredMsgType};

/// Decide what to do with a freshly-seen `broadcast`, consulting (and, for
/// evictions only, mutating) `cache`.
///
/// See spec.md §4.5 for the full state table; this implementation follows
/// it literally, except that a `Disposition::DeliverAndRecord` result does
/// not yet write anything — the caller must call [`commit_record`] once the
/// broadcast is confirmed deliverable.
pub fn decide(broadcast: &Broadcast, cache: &mut BroadcastCache) -> Disposition {
    let id = broadcast.identifier.as_str();
    match broadcast.msgtype {
        MsgType::Cancel => {
            if cache.get(id).is_some() {
                cache.evict(id);
                trace!(identifier = id, "cancel for tracked broadcast; evicting");
            } else {
                trace!(identifier = id, "cancel for untracked broadcast");
            }
            // A Cancel is never stored, tracked or not.
            Disposition::DeliverAndEvict
        }
        MsgType::Update => match cache.get(id) {
            None => Disposition::DeliverAndRecord,
            Some(existing) => {
                if !existing.msgtype.matches(MsgType::Update) {
                    // Status transition, e.g. Alert -> Update: the old
                    // entry no longer describes the current state, so it
                    // goes regardless of whether the new one ends up
                    // recorded.
                    cache.evict(id);
                    Disposition::DeliverAndRecord
                } else if existing.sent != broadcast.sent {
                    // Newer revision of the same Update.
                    cache.evict(id);
                    Disposition::DeliverAndRecord
                } else {
                    // Same revision: already notified.
                    Disposition::Ignore
                }
            }
        },
        MsgType::Alert => match cache.get(id) {
            None => Disposition::DeliverAndRecord,
            Some(_) => Disposition::Ignore,
        },
    }
}

/// Commit the pending cache insertion for a broadcast that `decide` marked
/// as `DeliverAndRecord` and that has since survived every downstream
/// filter (severity, geospatial match, covid policy).
///
/// Calling this for any other disposition is a caller error; it's written
/// defensively (a no-op for `Cancel`) rather than panicking, since the
/// consequence of misuse here is a missed cache entry, not corruption.
pub fn commit_record(cache: &mut BroadcastCache, broadcast: &Broadcast) {
    if let Some(msgtype) = StoredMsgType::from_msgtype(broadcast.msgtype) {
        cache.put(
            broadcast.identifier.clone(),
            CacheEntry {
                msgtype,
                sent: broadcast.sent.clone(),
            },
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::BroadcastCache;
    use std::time::Duration;

    fn broadcast(id: &str, msgtype: MsgType, sent: &str) -> Broadcast {
        Broadcast {
            identifier: id.to_owned(),
            msgtype,
            sent: sent.to_owned(),
            status: None,
            info: vec![],
        }
    }

    fn cache() -> BroadcastCache {
        BroadcastCache::new(Duration::from_secs(8 * 3600))
    }

    /// Drive `decide` the way the scheduler does: commit the pending insert
    /// whenever the disposition calls for one.
    fn decide_and_commit(broadcast: &Broadcast, cache: &mut BroadcastCache) -> Disposition {
        let disposition = decide(broadcast, cache);
        if disposition == Disposition::DeliverAndRecord {
            commit_record(cache, broadcast);
        }
        disposition
    }

    /// Property 1: an unchanged Alert observed twice delivers exactly once.
    #[test]
    fn alert_idempotence() {
        let mut cache = cache();
        let b = broadcast("DE-1", MsgType::Alert, "T1");
        assert_eq!(decide_and_commit(&b, &mut cache), Disposition::DeliverAndRecord);
        assert_eq!(decide_and_commit(&b, &mut cache), Disposition::Ignore);
    }

    /// Property 2: Update re-notification, with the cache ending up at
    /// `(Update, T2)`.
    #[test]
    fn update_renotifies_on_status_or_revision_change() {
        let mut cache = cache();
        let alert = broadcast("DE-1", MsgType::Alert, "T1");
        assert_eq!(decide_and_commit(&alert, &mut cache), Disposition::DeliverAndRecord);

        let update = broadcast("DE-1", MsgType::Update, "T2");
        assert_eq!(decide_and_commit(&update, &mut cache), Disposition::DeliverAndRecord);
        assert_eq!(
            cache.get("DE-1"),
            Some(CacheEntry {
                msgtype: StoredMsgType::Update,
                sent: "T2".to_owned(),
            })
        );

        // Same Update revision again: ignored.
        assert_eq!(decide_and_commit(&update, &mut cache), Disposition::Ignore);

        // A later revision of the same Update: re-notify.
        let update2 = broadcast("DE-1", MsgType::Update, "T3");
        assert_eq!(decide_and_commit(&update2, &mut cache), Disposition::DeliverAndRecord);
    }

    /// Property 3: Cancel is always one-shot and never cached.
    #[test]
    fn cancel_is_one_shot_and_uncached() {
        let mut cache = cache();
        let update = broadcast("DE-1", MsgType::Update, "T1");
        decide_and_commit(&update, &mut cache);

        let cancel = broadcast("DE-1", MsgType::Cancel, "T2");
        assert_eq!(decide_and_commit(&cancel, &mut cache), Disposition::DeliverAndEvict);
        assert_eq!(cache.get("DE-1"), None);

        // Cancel for an identifier that was never tracked still delivers,
        // and still doesn't enter the cache.
        let other = broadcast("DE-2", MsgType::Cancel, "T1");
        assert_eq!(decide_and_commit(&other, &mut cache), Disposition::DeliverAndEvict);
        assert_eq!(cache.get("DE-2"), None);
    }

    #[test]
    fn update_with_no_prior_entry_records() {
        let mut cache = cache();
        let update = broadcast("DE-1", MsgType::Update, "T1");
        assert_eq!(decide_and_commit(&update, &mut cache), Disposition::DeliverAndRecord);
        assert_eq!(
            cache.get("DE-1"),
            Some(CacheEntry {
                msgtype: StoredMsgType::Update,
                sent: "T1".to_owned(),
            })
        );
    }

    /// A `DeliverAndRecord` disposition whose broadcast is later dropped by
    /// severity/geospatial/covid filtering must not leave an entry behind.
    #[test]
    fn uncommitted_insert_leaves_no_trace() {
        let mut cache = cache();
        let alert = broadcast("DE-1", MsgType::Alert, "T1");
        assert_eq!(decide(&alert, &mut cache), Disposition::DeliverAndRecord);
        // Caller decides not to commit (e.g. severity too low).
        assert_eq!(cache.get("DE-1"), None);

        // The next cycle sees the same broadcast as brand new.
        assert_eq!(decide(&alert, &mut cache), Disposition::DeliverAndRecord);
    }
}
