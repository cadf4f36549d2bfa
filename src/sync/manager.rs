//! The draft synchronization manager.
//!
//! [`SplitStore`] owns the current in-memory draft, applies optimistic local
//! mutations, and converges that state with the remote authority. The
//! guarantees it maintains:
//!
//! - at most one network request per sub-resource in flight at a time
//!   (concurrent callers attach to the pending session),
//! - no lost updates: a sync only clears the dirty flag if no mutation
//!   advanced the revision counter while the request was outstanding,
//! - participants are always synchronized before items, since the items
//!   payload references participant ids as consumers.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::session::{SyncSlot, SyncTicket};
use crate::api::{
    ApiError, Calculation, CreateSplitRequest, ItemPayload, PayRequest, PaymentStatus, SplitApi,
    SplitPatch,
};
use crate::model::{Draft, Extra, Item, Participant, SplitStatus};

/// Number of default participants the server seeds a new split with.
const DEFAULT_PEOPLE_COUNT: u32 = 2;

/// Quiet period after the last item mutation before the coalesced sync fires.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(1000);

const MSG_CONSUMERS_NOT_SYNCED: &str =
    "Participants are not yet synchronized with the server, please retry in a moment";
const MSG_SAVE_FAILED: &str = "Failed to save your changes, check your connection";

/// Outcome of a payment request.
#[derive(Debug, Clone, PartialEq)]
pub enum PayOutcome {
    /// Payment settled; local status was updated to PAID.
    Paid,
    /// Payment awaits user action; presentation data for the UI.
    Pending {
        qr_code: Option<String>,
        copy_paste: Option<String>,
        payment_id: Option<String>,
    },
}

#[derive(Debug, Default)]
struct StoreState {
    draft: Option<Draft>,
    /// Human-readable error for the UI when loading a draft failed.
    load_error: Option<String>,
    /// Human-readable error for the UI when a background save failed.
    save_error: Option<String>,
    /// True from the moment an item sync is scheduled until it settles.
    saving: bool,
}

struct Inner {
    api: Arc<dyn SplitApi>,
    state: RwLock<StoreState>,
    participants: SyncSlot,
    items: SyncSlot,
    /// The currently scheduled (not yet fired) debounced item flush.
    pending_flush: Mutex<Option<JoinHandle<()>>>,
    /// Bumped on every scheduled flush; only the latest flush may clear
    /// the saving flag when it settles.
    flush_epoch: AtomicU64,
    debounce: Duration,
}

/// Cheaply clonable handle to the one shared store.
#[derive(Clone)]
pub struct SplitStore {
    inner: Arc<Inner>,
}

impl SplitStore {
    pub fn new(api: Arc<dyn SplitApi>) -> Self {
        Self::with_debounce(api, DEFAULT_DEBOUNCE)
    }

    pub fn with_debounce(api: Arc<dyn SplitApi>, debounce: Duration) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                state: RwLock::new(StoreState::default()),
                participants: SyncSlot::new(),
                items: SyncSlot::new(),
                pending_flush: Mutex::new(None),
                flush_epoch: AtomicU64::new(0),
                debounce,
            }),
        }
    }

    // ---- lifecycle ----------------------------------------------------

    /// Create a split remotely and adopt the server's version of it
    /// (including server-assigned participant ids) as the current draft.
    ///
    /// On failure the local draft remains unset.
    pub async fn create_draft(&self, name: &str) -> Result<String, ApiError> {
        let created = self
            .inner
            .api
            .create_split(&CreateSplitRequest {
                name: name.to_string(),
                people_count: DEFAULT_PEOPLE_COUNT,
            })
            .await?;
        let draft = self.inner.api.fetch_split(&created.id).await?;
        info!(split_id = %created.id, "created split");

        let mut state = self.inner.state.write().await;
        state.draft = Some(draft);
        state.load_error = None;
        state.save_error = None;
        drop(state);
        self.inner.participants.reset();
        self.inner.items.reset();
        Ok(created.id)
    }

    /// Replace the in-memory draft wholesale with server state. Last full
    /// fetch wins; concurrent local edits are not merged. Failures set the
    /// load error instead of propagating.
    pub async fn fetch_draft(&self, id: &str) -> bool {
        match self.inner.api.fetch_split(id).await {
            Ok(draft) => {
                let mut state = self.inner.state.write().await;
                state.draft = Some(draft);
                state.load_error = None;
                drop(state);
                self.inner.participants.reset();
                self.inner.items.reset();
                true
            }
            Err(e) => {
                warn!(split_id = %id, error = %e, "failed to load split");
                self.inner.state.write().await.load_error = Some(e.to_string());
                false
            }
        }
    }

    pub async fn list_drafts(&self) -> Result<Vec<crate::api::DraftSummary>, ApiError> {
        self.inner.api.list_splits().await
    }

    /// Delete a split remotely; clears local state if it was current.
    pub async fn delete_draft(&self, id: &str) -> Result<(), ApiError> {
        self.inner.api.delete_split(id).await?;
        let mut state = self.inner.state.write().await;
        if state.draft.as_ref().is_some_and(|d| d.id == id) {
            state.draft = None;
            drop(state);
            self.inner.participants.reset();
            self.inner.items.reset();
        }
        Ok(())
    }

    /// Rename the current draft, remotely and locally.
    pub async fn rename_draft(&self, name: &str) -> Result<(), ApiError> {
        let Some(id) = self.current_id().await else {
            return Ok(());
        };
        let patch = SplitPatch {
            name: Some(name.to_string()),
            ..Default::default()
        };
        self.inner.api.update_split(&id, &patch).await?;
        if let Some(draft) = self.inner.state.write().await.draft.as_mut() {
            draft.name = name.to_string();
        }
        Ok(())
    }

    /// Update the current draft's place metadata, remotely and locally.
    pub async fn set_place(&self, patch: SplitPatch) -> Result<(), ApiError> {
        let Some(id) = self.current_id().await else {
            return Ok(());
        };
        self.inner.api.update_split(&id, &patch).await?;
        if let Some(draft) = self.inner.state.write().await.draft.as_mut() {
            if patch.latitude.is_some() {
                draft.latitude = patch.latitude;
            }
            if patch.longitude.is_some() {
                draft.longitude = patch.longitude;
            }
            if patch.place_provider.is_some() {
                draft.place_provider = patch.place_provider;
            }
            if patch.place_id.is_some() {
                draft.place_id = patch.place_id;
            }
            if patch.place_name.is_some() {
                draft.place_name = patch.place_name;
            }
            if patch.place_display_name.is_some() {
                draft.place_display_name = patch.place_display_name;
            }
        }
        Ok(())
    }

    // ---- participant mutations ----------------------------------------

    /// Add a participant with a client-generated id. Returns the id, or
    /// None when no draft is loaded.
    pub async fn add_participant(&self, name: &str) -> Option<String> {
        let id = {
            let mut state = self.inner.state.write().await;
            let draft = state.draft.as_mut()?;
            let participant = Participant {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.to_string(),
                sort_order: draft.participants.len() as i32,
            };
            let id = participant.id.clone();
            draft.participants.push(participant);
            id
        };
        self.inner.participants.mark_dirty();
        self.spawn_participant_sync();
        Some(id)
    }

    /// Remove a participant, cascading removal of their shares.
    pub async fn remove_participant(&self, participant_id: &str) {
        let removed = {
            let mut state = self.inner.state.write().await;
            match state.draft.as_mut() {
                Some(draft) => draft.remove_participant(participant_id),
                None => false,
            }
        };
        if !removed {
            return;
        }
        self.inner.participants.mark_dirty();
        self.spawn_participant_sync();
    }

    pub async fn rename_participant(&self, participant_id: &str, name: &str) {
        let renamed = {
            let mut state = self.inner.state.write().await;
            state
                .draft
                .as_mut()
                .and_then(|d| d.participants.iter_mut().find(|p| p.id == participant_id))
                .map(|p| p.name = name.to_string())
                .is_some()
        };
        if !renamed {
            return;
        }
        self.inner.participants.mark_dirty();
        self.spawn_participant_sync();
    }

    // ---- item and share mutations -------------------------------------

    /// Add an item with a client-generated id. Shares start empty; the
    /// caller selects consumers explicitly. Returns the id, or None when
    /// no draft is loaded.
    pub async fn add_item(&self, name: &str, amount_cents: i64) -> Option<String> {
        let id = {
            let mut state = self.inner.state.write().await;
            let draft = state.draft.as_mut()?;
            let item = Item {
                id: uuid::Uuid::new_v4().to_string(),
                name: name.to_string(),
                amount_cents,
            };
            let id = item.id.clone();
            draft.items.push(item);
            id
        };
        self.inner.items.mark_dirty();
        self.schedule_item_sync().await;
        Some(id)
    }

    /// Delete an item, cascading removal of its shares.
    pub async fn delete_item(&self, item_id: &str) {
        let removed = {
            let mut state = self.inner.state.write().await;
            match state.draft.as_mut() {
                Some(draft) => draft.remove_item(item_id),
                None => false,
            }
        };
        if !removed {
            return;
        }
        self.inner.items.mark_dirty();
        self.schedule_item_sync().await;
    }

    /// Toggle one participant's share on an item. Ignored when either
    /// entity is missing, keeping the share invariant intact.
    pub async fn toggle_share(&self, item_id: &str, participant_id: &str) {
        let mutated = {
            let mut state = self.inner.state.write().await;
            match state.draft.as_mut() {
                Some(draft) => {
                    if !draft.has_item(item_id) || !draft.has_participant(participant_id) {
                        warn!(item_id, participant_id, "toggle_share on unknown entity");
                        false
                    } else {
                        draft.toggle_share(item_id, participant_id);
                        true
                    }
                }
                None => false,
            }
        };
        if !mutated {
            return;
        }
        self.inner.items.mark_dirty();
        self.schedule_item_sync().await;
    }

    /// Replace the entire share subset for an item. Unknown participant
    /// ids are dropped to keep the share invariant intact.
    pub async fn set_all_shares(&self, item_id: &str, participant_ids: &[String]) {
        let mutated = {
            let mut state = self.inner.state.write().await;
            match state.draft.as_mut() {
                Some(draft) if draft.has_item(item_id) => {
                    let known: Vec<String> = participant_ids
                        .iter()
                        .filter(|pid| draft.has_participant(pid))
                        .cloned()
                        .collect();
                    if known.len() != participant_ids.len() {
                        warn!(item_id, "set_all_shares dropped unknown participant ids");
                    }
                    draft.set_all_shares(item_id, &known);
                    true
                }
                _ => false,
            }
        };
        if !mutated {
            return;
        }
        self.inner.items.mark_dirty();
        self.schedule_item_sync().await;
    }

    /// Remove all shares for an item.
    pub async fn clear_shares(&self, item_id: &str) {
        let mutated = {
            let mut state = self.inner.state.write().await;
            match state.draft.as_mut() {
                Some(draft) if draft.has_item(item_id) => {
                    draft.clear_shares(item_id);
                    true
                }
                _ => false,
            }
        };
        if !mutated {
            return;
        }
        self.inner.items.mark_dirty();
        self.schedule_item_sync().await;
    }

    // ---- extras (client-local, no remote persistence) -----------------

    /// Add an extra charge. Extras are not persisted remotely; no network
    /// call is made.
    pub async fn add_extra(&self, extra: Extra) {
        if let Some(draft) = self.inner.state.write().await.draft.as_mut() {
            draft.extras.push(extra);
        }
    }

    pub async fn remove_extra(&self, extra_id: &str) {
        if let Some(draft) = self.inner.state.write().await.draft.as_mut() {
            draft.extras.retain(|e| e.id != extra_id);
        }
    }

    // ---- synchronization ----------------------------------------------

    /// Converge the participant list with the server.
    ///
    /// Idempotent: clean with nothing in flight is a no-op; a pending
    /// session is awaited rather than duplicated. The dirty flag is only
    /// cleared if no mutation landed while the request was outstanding.
    pub async fn sync_participants(&self) -> Result<(), ApiError> {
        match self.inner.participants.begin() {
            SyncTicket::Clean => Ok(()),
            SyncTicket::Attach(rx) => SyncSlot::attach(rx).await,
            SyncTicket::Begin(guard) => {
                let snapshot = {
                    let state = self.inner.state.read().await;
                    state
                        .draft
                        .as_ref()
                        .map(|d| (d.id.clone(), d.participants.clone()))
                };
                let Some((split_id, participants)) = snapshot else {
                    // Draft was unloaded since the mutation; nothing to send.
                    guard.finish(&Ok(()));
                    return Ok(());
                };
                debug!(split_id = %split_id, count = participants.len(), "syncing participants");
                let result = self
                    .inner
                    .api
                    .put_participants(&split_id, &participants)
                    .await;
                guard.finish(&result);
                match &result {
                    Ok(()) => self.clear_save_error().await,
                    Err(e) => self.record_save_error(self.generic_save_message(e)).await,
                }
                result
            }
        }
    }

    /// Converge the item list (with consumer ids) with the server.
    ///
    /// Participants are always settled first, even when already clean:
    /// the server must know every participant id the payload references.
    pub async fn sync_items(&self) -> Result<(), ApiError> {
        self.ensure_participants_synced().await?;

        match self.inner.items.begin() {
            SyncTicket::Clean => Ok(()),
            SyncTicket::Attach(rx) => SyncSlot::attach(rx).await,
            SyncTicket::Begin(guard) => {
                let snapshot = {
                    let state = self.inner.state.read().await;
                    state
                        .draft
                        .as_ref()
                        .map(|d| (d.id.clone(), ItemPayload::from_draft(d)))
                };
                let Some((split_id, items)) = snapshot else {
                    guard.finish(&Ok(()));
                    return Ok(());
                };
                debug!(split_id = %split_id, count = items.len(), "syncing items");
                let result = self.inner.api.put_items(&split_id, &items).await;
                guard.finish(&result);
                match &result {
                    Ok(()) => self.clear_save_error().await,
                    Err(e) => {
                        let message = if e.is_invalid_consumers() {
                            self.with_correlation(MSG_CONSUMERS_NOT_SYNCED, e)
                        } else {
                            self.generic_save_message(e)
                        };
                        self.record_save_error(message).await;
                    }
                }
                result
            }
        }
    }

    /// Flush participants, then once more only if new dirtiness appeared
    /// during the first pass. Bounded to two passes.
    pub async fn ensure_participants_synced(&self) -> Result<(), ApiError> {
        self.sync_participants().await?;
        if self.inner.participants.is_dirty() {
            self.sync_participants().await?;
        }
        Ok(())
    }

    /// Flush items, then once more only if new dirtiness appeared during
    /// the first pass. Bounded to two passes.
    pub async fn ensure_items_synced(&self) -> Result<(), ApiError> {
        self.sync_items().await?;
        if self.inner.items.is_dirty() {
            self.sync_items().await?;
        }
        Ok(())
    }

    /// Debounced item flush: cancel any still-pending scheduled flush and
    /// schedule a new one after the quiet window. An already-running
    /// network request is never cancelled; its result is validated post
    /// hoc by the revision check.
    pub async fn schedule_item_sync(&self) {
        self.inner.state.write().await.saving = true;
        let epoch = self.inner.flush_epoch.fetch_add(1, Ordering::SeqCst) + 1;

        let mut pending = self.inner.pending_flush.lock().await;
        if let Some(handle) = pending.take() {
            handle.abort();
        }
        let store = self.clone();
        *pending = Some(tokio::spawn(async move {
            tokio::time::sleep(store.inner.debounce).await;
            // Run the flush outside the abortable window so a later
            // reschedule cannot cancel an in-flight request.
            tokio::spawn(async move {
                let _ = store.sync_items().await;
                // An older flush finishing late says nothing about newer
                // scheduled work; only the latest one settles the flag.
                if store.inner.flush_epoch.load(Ordering::SeqCst) == epoch {
                    store.inner.state.write().await.saving = false;
                }
            });
        }));
    }

    /// Request the server-side settlement. Both resources are flushed
    /// first so the calculation never runs against stale server state.
    /// Failures are non-fatal: logged and collapsed to None.
    pub async fn compute_review(&self) -> Option<Calculation> {
        let id = self.current_id().await?;
        if let Err(e) = self.ensure_participants_synced().await {
            warn!(error = %e, "compute_review: participant sync failed");
            return None;
        }
        if let Err(e) = self.ensure_items_synced().await {
            warn!(error = %e, "compute_review: item sync failed");
            return None;
        }
        match self.inner.api.compute_review(&id).await {
            Ok(calculation) => Some(calculation),
            Err(e) => {
                warn!(error = %e, "compute_review failed");
                None
            }
        }
    }

    /// Request payment processing. PAID updates local status; PENDING
    /// returns the payment presentation data untouched.
    pub async fn pay_split(
        &self,
        topup_cents: i64,
        pay_with_wallet: bool,
    ) -> Result<PayOutcome, ApiError> {
        let Some(id) = self.current_id().await else {
            return Err(ApiError::Network("no draft loaded".to_string()));
        };
        let resp = self
            .inner
            .api
            .pay(
                &id,
                &PayRequest {
                    topup_cents,
                    pay_with_wallet,
                },
            )
            .await?;
        match resp.status {
            PaymentStatus::Paid => {
                if let Some(draft) = self.inner.state.write().await.draft.as_mut() {
                    draft.status = SplitStatus::Paid;
                }
                info!(split_id = %id, "split paid");
                Ok(PayOutcome::Paid)
            }
            PaymentStatus::Pending => Ok(PayOutcome::Pending {
                qr_code: resp.qr_code,
                copy_paste: resp.copy_paste,
                payment_id: resp.payment_id,
            }),
        }
    }

    // ---- read accessors ------------------------------------------------

    /// Snapshot of the current draft.
    pub async fn draft(&self) -> Option<Draft> {
        self.inner.state.read().await.draft.clone()
    }

    /// Participant ids consuming the given item.
    pub async fn item_consumers(&self, item_id: &str) -> Vec<String> {
        self.inner
            .state
            .read()
            .await
            .draft
            .as_ref()
            .map(|d| d.consumer_ids(item_id))
            .unwrap_or_default()
    }

    pub fn participants_dirty(&self) -> bool {
        self.inner.participants.is_dirty()
    }

    pub fn items_dirty(&self) -> bool {
        self.inner.items.is_dirty()
    }

    pub async fn is_saving(&self) -> bool {
        self.inner.state.read().await.saving
    }

    pub async fn save_error(&self) -> Option<String> {
        self.inner.state.read().await.save_error.clone()
    }

    pub async fn load_error(&self) -> Option<String> {
        self.inner.state.read().await.load_error.clone()
    }

    // ---- internals -----------------------------------------------------

    async fn current_id(&self) -> Option<String> {
        self.inner
            .state
            .read()
            .await
            .draft
            .as_ref()
            .map(|d| d.id.clone())
    }

    /// Background participant flush after a mutation. Errors are recorded
    /// in shared state, never surfaced to the mutating caller.
    fn spawn_participant_sync(&self) {
        let store = self.clone();
        tokio::spawn(async move {
            let _ = store.sync_participants().await;
        });
    }

    fn generic_save_message(&self, e: &ApiError) -> String {
        self.with_correlation(MSG_SAVE_FAILED, e)
    }

    fn with_correlation(&self, message: &str, e: &ApiError) -> String {
        match e.correlation_id() {
            Some(id) => format!("{} (ref: {})", message, id),
            None => message.to_string(),
        }
    }

    async fn record_save_error(&self, message: String) {
        self.inner.state.write().await.save_error = Some(message);
    }

    async fn clear_save_error(&self) {
        self.inner.state.write().await.save_error = None;
    }
}
