//! Remote API contract and the reqwest-backed client.

pub mod error;
pub mod http;
pub mod types;

use async_trait::async_trait;

use crate::model::{Draft, Participant};

pub use error::ApiError;
pub use http::{EnvToken, HttpSplitApi, StaticToken, TokenProvider};
pub use types::{
    Calculation, ComputeReviewResponse, CreateSplitRequest, CreatedSplit, DraftSummary,
    ItemPayload, ParticipantTotal, PayRequest, PayResponse, PaymentStatus, SplitPatch,
};

/// The remote authority the sync manager converges against.
///
/// One production implementation exists (`HttpSplitApi`); tests substitute
/// their own to observe and gate network calls.
#[async_trait]
pub trait SplitApi: Send + Sync {
    /// `POST /splits`: create a split; the server seeds default participants.
    async fn create_split(&self, req: &CreateSplitRequest) -> Result<CreatedSplit, ApiError>;

    /// `GET /splits/:id`: fetch the full draft.
    async fn fetch_split(&self, id: &str) -> Result<Draft, ApiError>;

    /// `GET /splits`: list drafts for the current user.
    async fn list_splits(&self) -> Result<Vec<DraftSummary>, ApiError>;

    /// `DELETE /splits/:id`.
    async fn delete_split(&self, id: &str) -> Result<(), ApiError>;

    /// `PATCH /splits/:id`: partial update of name and place fields.
    async fn update_split(&self, id: &str, patch: &SplitPatch) -> Result<(), ApiError>;

    /// `PUT /splits/:id/participants`: replace the participant list.
    async fn put_participants(
        &self,
        id: &str,
        participants: &[Participant],
    ) -> Result<(), ApiError>;

    /// `PUT /splits/:id/items`: replace the item list, consumer ids included.
    async fn put_items(&self, id: &str, items: &[ItemPayload]) -> Result<(), ApiError>;

    /// `POST /splits/:id/compute-review`: server-side settlement.
    async fn compute_review(&self, id: &str) -> Result<Calculation, ApiError>;

    /// `POST /splits/:id/pay`.
    async fn pay(&self, id: &str, req: &PayRequest) -> Result<PayResponse, ApiError>;
}
