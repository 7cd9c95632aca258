//! Per-meeting exclusive claims.
//!
//! A processing run holds its meeting's claim from generation through the
//! post-commit hooks. Runs for different meetings never contend.
//!
//! Two layers: an in-process keyed mutex serializes threads sharing one
//! registry, and a `meeting_claims` row serializes every process that opens
//! the same database file. The row records the holder's pid and is deleted
//! when the claim drops. A row older than [`CLAIM_STALE_AFTER_MINS`] is
//! assumed to belong to a crashed run and is taken over.

use std::sync::Arc;
use std::thread;
use std::time::Duration as StdDuration;

use chrono::{Duration, Utc};
use dashmap::DashMap;
use parking_lot::lock_api::ArcMutexGuard;
use parking_lot::{Mutex, RawMutex};

use crate::db::{DbError, LedgerDb};
use crate::util::new_id;

pub const CLAIM_STALE_AFTER_MINS: i64 = 15;

const CLAIM_POLL: StdDuration = StdDuration::from_millis(100);

/// Keyed mutex registry, one lock per meeting id.
pub struct MeetingClaims {
    /// Identifies this registry's rows in `meeting_claims`.
    holder: String,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl Default for MeetingClaims {
    fn default() -> Self {
        Self {
            holder: new_id(),
            locks: DashMap::new(),
        }
    }
}

/// Held for the duration of a run. Dropping it releases the meeting.
pub struct MeetingClaim<'a> {
    db: &'a LedgerDb,
    holder: &'a str,
    meeting_id: String,
    _guard: ArcMutexGuard<RawMutex, ()>,
}

impl MeetingClaim<'_> {
    pub fn meeting_id(&self) -> &str {
        &self.meeting_id
    }
}

impl Drop for MeetingClaim<'_> {
    fn drop(&mut self) {
        // Row goes first; the in-process guard is released after this returns
        if let Err(e) = self.db.delete_meeting_claim(&self.meeting_id, self.holder) {
            log::warn!("Failed to release claim on meeting {}: {}", self.meeting_id, e);
        }
    }
}

impl MeetingClaims {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_for(&self, meeting_id: &str) -> Arc<Mutex<()>> {
        // Clone the Arc out so the shard lock is released before we block
        let entry = self
            .locks
            .entry(meeting_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())));
        Arc::clone(entry.value())
    }

    fn take_row(&self, db: &LedgerDb, meeting_id: &str) -> Result<bool, DbError> {
        let now = Utc::now();
        db.try_insert_meeting_claim(
            meeting_id,
            &self.holder,
            std::process::id(),
            now,
            now - Duration::minutes(CLAIM_STALE_AFTER_MINS),
        )
    }

    /// Block until the meeting is free, then claim it.
    ///
    /// Must not be called while `db` has a transaction open.
    pub fn claim<'a>(
        &'a self,
        db: &'a LedgerDb,
        meeting_id: &str,
    ) -> Result<MeetingClaim<'a>, DbError> {
        let lock = self.lock_for(meeting_id);
        if lock.is_locked() {
            log::debug!("Waiting for in-flight run on meeting {}", meeting_id);
        }
        let guard = lock.lock_arc();

        let mut announced = false;
        while !self.take_row(db, meeting_id)? {
            if !announced {
                if let Some(held) = db.get_meeting_claim(meeting_id)? {
                    log::info!(
                        "Meeting {} is being processed by pid {} since {}, waiting",
                        meeting_id,
                        held.pid,
                        held.claimed_at
                    );
                }
                announced = true;
            }
            thread::sleep(CLAIM_POLL);
        }

        Ok(MeetingClaim {
            db,
            holder: &self.holder,
            meeting_id: meeting_id.to_string(),
            _guard: guard,
        })
    }

    /// Claim the meeting only if no other run, in any process, holds it.
    pub fn try_claim<'a>(
        &'a self,
        db: &'a LedgerDb,
        meeting_id: &str,
    ) -> Result<Option<MeetingClaim<'a>>, DbError> {
        let guard = match self.lock_for(meeting_id).try_lock_arc() {
            Some(guard) => guard,
            None => return Ok(None),
        };
        if !self.take_row(db, meeting_id)? {
            return Ok(None);
        }
        Ok(Some(MeetingClaim {
            db,
            holder: &self.holder,
            meeting_id: meeting_id.to_string(),
            _guard: guard,
        }))
    }
}
