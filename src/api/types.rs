//! Wire payloads for the splits API. All JSON is camelCase.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::model::{Draft, SplitStatus};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSplitRequest {
    pub name: String,
    /// Number of default participants the server seeds the split with.
    pub people_count: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedSplit {
    pub id: String,
}

/// One row of `GET /splits`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DraftSummary {
    pub id: String,
    pub name: String,
    pub created_at: DateTime<Utc>,
    pub status: SplitStatus,
}

/// Partial update for `PATCH /splits/:id`. Absent fields are untouched.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SplitPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_provider: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub place_display_name: Option<String>,
}

/// One item in the `PUT /splits/:id/items` payload. Shares are not sent
/// independently: they ride along as each item's consumer ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPayload {
    pub id: String,
    pub name: String,
    pub amount_cents: i64,
    pub consumer_ids: Vec<String>,
}

impl ItemPayload {
    /// Project the items payload from a draft: for each item, the list of
    /// participant ids holding a share on it.
    pub fn from_draft(draft: &Draft) -> Vec<Self> {
        draft
            .items
            .iter()
            .map(|item| ItemPayload {
                id: item.id.clone(),
                name: item.name.clone(),
                amount_cents: item.amount_cents,
                consumer_ids: draft.consumer_ids(&item.id),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PayRequest {
    pub topup_cents: i64,
    pub pay_with_wallet: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Paid,
    Pending,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayResponse {
    pub status: PaymentStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub qr_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub copy_paste: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payment_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeReviewResponse {
    pub calculation: Calculation,
}

/// Server-computed settlement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Calculation {
    pub total_cents: i64,
    pub participant_totals: Vec<ParticipantTotal>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantTotal {
    pub participant_id: String,
    pub amount_cents: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Item, Participant, SplitStatus};

    #[test]
    fn item_payload_projects_consumers_from_shares() {
        let mut draft = Draft {
            id: "s1".to_string(),
            name: "Dinner".to_string(),
            latitude: None,
            longitude: None,
            place_provider: None,
            place_id: None,
            place_name: None,
            place_display_name: None,
            participants: vec![
                Participant {
                    id: "alice".to_string(),
                    name: "Alice".to_string(),
                    sort_order: 0,
                },
                Participant {
                    id: "bob".to_string(),
                    name: "Bob".to_string(),
                    sort_order: 1,
                },
            ],
            items: vec![
                Item {
                    id: "pizza".to_string(),
                    name: "Pizza".to_string(),
                    amount_cents: 5000,
                },
                Item {
                    id: "soda".to_string(),
                    name: "Soda".to_string(),
                    amount_cents: 800,
                },
            ],
            shares: vec![],
            extras: vec![],
            created_at: chrono::Utc::now(),
            status: SplitStatus::Open,
        };
        draft.set_all_shares("pizza", &["alice".to_string(), "bob".to_string()]);
        draft.toggle_share("soda", "bob");

        let payload = ItemPayload::from_draft(&draft);
        assert_eq!(payload.len(), 2);
        assert_eq!(payload[0].consumer_ids, vec!["alice", "bob"]);
        assert_eq!(payload[1].consumer_ids, vec!["bob"]);
    }

    #[test]
    fn item_payload_serializes_consumer_ids_camel_case() {
        let payload = ItemPayload {
            id: "i1".to_string(),
            name: "Pizza".to_string(),
            amount_cents: 5000,
            consumer_ids: vec!["p1".to_string()],
        };
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["amountCents"], 5000);
        assert_eq!(json["consumerIds"][0], "p1");
    }

    #[test]
    fn split_patch_omits_absent_fields() {
        let patch = SplitPatch {
            name: Some("Brunch".to_string()),
            ..Default::default()
        };
        let json = serde_json::to_string(&patch).unwrap();
        assert_eq!(json, r#"{"name":"Brunch"}"#);
    }

    #[test]
    fn pay_response_parses_pending_with_qr() {
        let json = r#"{"status": "PENDING", "qrCode": "00020126...", "paymentId": "pay-1"}"#;
        let resp: PayResponse = serde_json::from_str(json).unwrap();
        assert_eq!(resp.status, PaymentStatus::Pending);
        assert!(resp.qr_code.is_some());
        assert!(resp.copy_paste.is_none());
    }
}
