//! Per-resource sync session bookkeeping.
//!
//! Each syncable sub-resource (participants, items) carries a dirty flag, a
//! monotonic revision counter, and at most one in-flight session. Callers
//! that arrive while a session is pending attach to it instead of issuing a
//! second network call; the revision captured when a session begins decides
//! whether the dirty flag may be cleared on completion.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use crate::api::ApiError;

type SessionResult = Option<Result<(), ApiError>>;

#[derive(Debug)]
struct SlotState {
    dirty: bool,
    revision: u64,
    in_flight: Option<watch::Receiver<SessionResult>>,
}

/// Dirty/revision tracking plus the in-flight session handle for one
/// sub-resource. All critical sections are short and contain no awaits,
/// so a std mutex is sufficient.
#[derive(Debug, Clone)]
pub(crate) struct SyncSlot {
    state: Arc<Mutex<SlotState>>,
}

/// What a caller should do after asking to sync.
pub(crate) enum SyncTicket {
    /// Nothing to send and nothing pending.
    Clean,
    /// A session is already in flight; await its published result.
    Attach(watch::Receiver<SessionResult>),
    /// The caller owns a new session and must `finish` it.
    Begin(SessionGuard),
}

impl SyncSlot {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(SlotState {
                dirty: false,
                revision: 0,
                in_flight: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, SlotState> {
        // Recover rather than propagate poisoning; the state is a pair of
        // plain integers and stays consistent.
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Record a local mutation: set dirty and advance the revision.
    pub fn mark_dirty(&self) {
        let mut state = self.lock();
        state.dirty = true;
        state.revision += 1;
    }

    pub fn is_dirty(&self) -> bool {
        self.lock().dirty
    }

    /// Clear all tracking, e.g. after a wholesale refetch replaced the
    /// local state the dirty flag referred to.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.dirty = false;
        state.in_flight = None;
    }

    /// Decide how a sync call should proceed. At most one `Begin` ticket
    /// exists at a time; it is retired by `SessionGuard::finish` or by the
    /// guard being dropped.
    pub fn begin(&self) -> SyncTicket {
        let mut state = self.lock();
        if let Some(rx) = state.in_flight.clone() {
            return SyncTicket::Attach(rx);
        }
        if !state.dirty {
            return SyncTicket::Clean;
        }
        let (tx, rx) = watch::channel(None);
        state.in_flight = Some(rx);
        SyncTicket::Begin(SessionGuard {
            slot: self.clone(),
            tx,
            revision: state.revision,
            finished: false,
        })
    }

    /// Await an in-flight session's published result.
    pub async fn attach(mut rx: watch::Receiver<SessionResult>) -> Result<(), ApiError> {
        let outcome = rx
            .wait_for(|v| v.is_some())
            .await
            .map(|v| v.clone())
            .unwrap_or(None);
        match outcome {
            Some(result) => result,
            // Sender vanished without publishing: the owning task was
            // cancelled mid-flight. Dirty is still set, so a retry will
            // issue a fresh request.
            None => Err(ApiError::Network("sync session interrupted".to_string())),
        }
    }
}

/// Owns one in-flight sync session.
pub(crate) struct SessionGuard {
    slot: SyncSlot,
    tx: watch::Sender<SessionResult>,
    revision: u64,
    finished: bool,
}

impl SessionGuard {
    /// Complete the session: clear dirty only if no mutation advanced the
    /// revision while the request was in flight, release the in-flight
    /// handle, and publish the result to attached waiters.
    pub fn finish(mut self, result: &Result<(), ApiError>) {
        {
            let mut state = self.slot.lock();
            if result.is_ok() && state.revision == self.revision {
                state.dirty = false;
            }
            state.in_flight = None;
        }
        let _ = self.tx.send(Some(result.clone()));
        self.finished = true;
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        // The owning task was cancelled before finishing. Release the slot
        // and wake attached waiters so nobody hangs on a dead session.
        {
            let mut state = self.slot.lock();
            state.in_flight = None;
        }
        let _ = self
            .tx
            .send(Some(Err(ApiError::Network(
                "sync session interrupted".to_string(),
            ))));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn expect_begin(slot: &SyncSlot) -> SessionGuard {
        match slot.begin() {
            SyncTicket::Begin(guard) => guard,
            _ => panic!("expected a Begin ticket"),
        }
    }

    #[test]
    fn clean_slot_yields_clean_ticket() {
        let slot = SyncSlot::new();
        assert!(matches!(slot.begin(), SyncTicket::Clean));
    }

    #[test]
    fn mark_dirty_advances_revision() {
        let slot = SyncSlot::new();
        slot.mark_dirty();
        let g1 = expect_begin(&slot);
        assert_eq!(g1.revision, 1);
        g1.finish(&Ok(()));
        slot.mark_dirty();
        slot.mark_dirty();
        let g2 = expect_begin(&slot);
        assert_eq!(g2.revision, 3);
        g2.finish(&Ok(()));
    }

    #[test]
    fn finish_clears_dirty_when_revision_unchanged() {
        let slot = SyncSlot::new();
        slot.mark_dirty();
        let guard = expect_begin(&slot);
        guard.finish(&Ok(()));
        assert!(!slot.is_dirty());
        assert!(matches!(slot.begin(), SyncTicket::Clean));
    }

    #[test]
    fn finish_keeps_dirty_when_mutation_landed_mid_flight() {
        let slot = SyncSlot::new();
        slot.mark_dirty();
        let guard = expect_begin(&slot);
        // A mutation arrives while the request is outstanding.
        slot.mark_dirty();
        guard.finish(&Ok(()));
        assert!(slot.is_dirty());
        // A follow-up sync gets a fresh session.
        assert!(matches!(slot.begin(), SyncTicket::Begin(_)));
    }

    #[test]
    fn failure_keeps_dirty_even_without_new_mutations() {
        let slot = SyncSlot::new();
        slot.mark_dirty();
        let guard = expect_begin(&slot);
        guard.finish(&Err(ApiError::Network("down".to_string())));
        assert!(slot.is_dirty());
    }

    #[test]
    fn second_caller_attaches_while_in_flight() {
        let slot = SyncSlot::new();
        slot.mark_dirty();
        let _guard = expect_begin(&slot);
        // Attaches even though the slot still looks dirty.
        assert!(matches!(slot.begin(), SyncTicket::Attach(_)));
    }

    #[tokio::test]
    async fn attached_waiters_get_the_published_result() {
        let slot = SyncSlot::new();
        slot.mark_dirty();
        let guard = expect_begin(&slot);
        let rx = match slot.begin() {
            SyncTicket::Attach(rx) => rx,
            _ => panic!("expected Attach"),
        };
        let waiter = tokio::spawn(SyncSlot::attach(rx));
        guard.finish(&Ok(()));
        assert!(waiter.await.unwrap().is_ok());
    }

    #[tokio::test]
    async fn dropped_guard_wakes_waiters_with_an_error() {
        let slot = SyncSlot::new();
        slot.mark_dirty();
        let guard = expect_begin(&slot);
        let rx = match slot.begin() {
            SyncTicket::Attach(rx) => rx,
            _ => panic!("expected Attach"),
        };
        let waiter = tokio::spawn(SyncSlot::attach(rx));
        drop(guard);
        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(ApiError::Network(_))));
        // Slot is usable again and still dirty.
        assert!(slot.is_dirty());
        assert!(matches!(slot.begin(), SyncTicket::Begin(_)));
    }
}
