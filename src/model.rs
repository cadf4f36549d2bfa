//! Domain model for a split draft.
//!
//! A `Draft` is the aggregate root: participants, purchased items, the
//! shares connecting them, and client-local extra charges. All money is
//! integer cents; percentages are integer basis points. Mutation helpers
//! keep the share invariant: every share references an item and a
//! participant that are currently present in the draft.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle status of a split.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SplitStatus {
    Open,
    Paid,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    pub id: String,
    pub name: String,
    /// Display and allocation order within the draft.
    pub sort_order: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Item {
    pub id: String,
    pub name: String,
    /// Price in minor currency units. Never floating point.
    pub amount_cents: i64,
}

/// "This participant consumes this item." No duplicate pairs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Share {
    pub item_id: String,
    pub participant_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExtraKind {
    Fixed,
    ServicePercent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AllocationMode {
    Equal,
    Proportional,
}

/// A fixed or percentage-based additional charge (service fee, tip).
///
/// Extras are client-local: they are not persisted remotely.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Extra {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ExtraKind,
    pub allocation_mode: AllocationMode,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_cents: Option<i64>,
    /// Basis points (1/100 of a percent), e.g. 1000 = 10%.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_percent_bp: Option<i64>,
}

impl Extra {
    /// Amount this extra contributes, given the items subtotal.
    ///
    /// Percentage extras round to the nearest cent.
    pub fn amount_cents(&self, subtotal_cents: i64) -> i64 {
        match self.kind {
            ExtraKind::Fixed => self.value_cents.unwrap_or(0),
            ExtraKind::ServicePercent => {
                let bp = self.value_percent_bp.unwrap_or(0);
                (subtotal_cents * bp + 5_000) / 10_000
            }
        }
    }
}

/// The aggregate root. Exactly one draft is current in memory at a time,
/// owned by the sync manager; everything else reads snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Draft {
    pub id: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_provider: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub place_display_name: Option<String>,
    #[serde(default)]
    pub participants: Vec<Participant>,
    #[serde(default)]
    pub items: Vec<Item>,
    #[serde(default)]
    pub shares: Vec<Share>,
    #[serde(default)]
    pub extras: Vec<Extra>,
    pub created_at: DateTime<Utc>,
    pub status: SplitStatus,
}

impl Draft {
    /// Participant ids holding a share on `item_id`, in share insertion order.
    pub fn consumer_ids(&self, item_id: &str) -> Vec<String> {
        self.shares
            .iter()
            .filter(|s| s.item_id == item_id)
            .map(|s| s.participant_id.clone())
            .collect()
    }

    pub fn has_participant(&self, id: &str) -> bool {
        self.participants.iter().any(|p| p.id == id)
    }

    pub fn has_item(&self, id: &str) -> bool {
        self.items.iter().any(|i| i.id == id)
    }

    /// Toggle a share: remove it if present, insert it otherwise.
    /// Returns true if the share is present afterwards.
    pub fn toggle_share(&mut self, item_id: &str, participant_id: &str) -> bool {
        let existing = self
            .shares
            .iter()
            .position(|s| s.item_id == item_id && s.participant_id == participant_id);
        match existing {
            Some(idx) => {
                self.shares.remove(idx);
                false
            }
            None => {
                self.shares.push(Share {
                    item_id: item_id.to_string(),
                    participant_id: participant_id.to_string(),
                });
                true
            }
        }
    }

    /// Replace the entire share subset for one item.
    pub fn set_all_shares(&mut self, item_id: &str, participant_ids: &[String]) {
        self.shares.retain(|s| s.item_id != item_id);
        for pid in participant_ids {
            self.shares.push(Share {
                item_id: item_id.to_string(),
                participant_id: pid.clone(),
            });
        }
    }

    /// Remove all shares for one item.
    pub fn clear_shares(&mut self, item_id: &str) {
        self.shares.retain(|s| s.item_id != item_id);
    }

    /// Remove a participant and cascade removal of their shares.
    /// Returns false if no such participant exists.
    pub fn remove_participant(&mut self, participant_id: &str) -> bool {
        let before = self.participants.len();
        self.participants.retain(|p| p.id != participant_id);
        if self.participants.len() == before {
            return false;
        }
        self.shares.retain(|s| s.participant_id != participant_id);
        true
    }

    /// Remove an item and cascade removal of its shares.
    /// Returns false if no such item exists.
    pub fn remove_item(&mut self, item_id: &str) -> bool {
        let before = self.items.len();
        self.items.retain(|i| i.id != item_id);
        if self.items.len() == before {
            return false;
        }
        self.shares.retain(|s| s.item_id != item_id);
        true
    }

    /// Sum of all item amounts.
    pub fn subtotal_cents(&self) -> i64 {
        self.items.iter().map(|i| i.amount_cents).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn draft_with(participants: &[&str], items: &[&str]) -> Draft {
        Draft {
            id: "split-1".to_string(),
            name: "Dinner".to_string(),
            latitude: None,
            longitude: None,
            place_provider: None,
            place_id: None,
            place_name: None,
            place_display_name: None,
            participants: participants
                .iter()
                .enumerate()
                .map(|(i, id)| Participant {
                    id: id.to_string(),
                    name: format!("Person {}", i),
                    sort_order: i as i32,
                })
                .collect(),
            items: items
                .iter()
                .map(|id| Item {
                    id: id.to_string(),
                    name: "Item".to_string(),
                    amount_cents: 1000,
                })
                .collect(),
            shares: vec![],
            extras: vec![],
            created_at: Utc::now(),
            status: SplitStatus::Open,
        }
    }

    #[test]
    fn toggle_share_inserts_then_removes() {
        let mut draft = draft_with(&["p1"], &["i1"]);
        assert!(draft.toggle_share("i1", "p1"));
        assert_eq!(draft.shares.len(), 1);
        assert!(!draft.toggle_share("i1", "p1"));
        assert!(draft.shares.is_empty());
    }

    #[test]
    fn set_all_shares_replaces_subset_atomically() {
        let mut draft = draft_with(&["p1", "p2", "p3"], &["i1", "i2"]);
        draft.toggle_share("i1", "p1");
        draft.toggle_share("i2", "p1");
        draft.set_all_shares("i1", &["p2".to_string(), "p3".to_string()]);

        assert_eq!(draft.consumer_ids("i1"), vec!["p2", "p3"]);
        // Other items' shares are untouched
        assert_eq!(draft.consumer_ids("i2"), vec!["p1"]);
    }

    #[test]
    fn deleting_participant_cascades_shares() {
        let mut draft = draft_with(&["p1", "p2"], &["i1", "i2"]);
        draft.toggle_share("i1", "p1");
        draft.toggle_share("i2", "p1");
        draft.toggle_share("i1", "p2");

        assert!(draft.remove_participant("p1"));
        assert!(draft.shares.iter().all(|s| s.participant_id != "p1"));
        assert_eq!(draft.consumer_ids("i1"), vec!["p2"]);
    }

    #[test]
    fn deleting_item_cascades_shares() {
        let mut draft = draft_with(&["p1", "p2"], &["i1", "i2"]);
        draft.toggle_share("i1", "p1");
        draft.toggle_share("i1", "p2");
        draft.toggle_share("i2", "p2");

        assert!(draft.remove_item("i1"));
        assert!(draft.shares.iter().all(|s| s.item_id != "i1"));
        assert_eq!(draft.consumer_ids("i2"), vec!["p2"]);
    }

    #[test]
    fn remove_missing_entity_returns_false() {
        let mut draft = draft_with(&["p1"], &["i1"]);
        assert!(!draft.remove_participant("nope"));
        assert!(!draft.remove_item("nope"));
    }

    #[test]
    fn extras_percent_rounds_to_nearest_cent() {
        let service = Extra {
            id: "e1".to_string(),
            kind: ExtraKind::ServicePercent,
            allocation_mode: AllocationMode::Proportional,
            value_cents: None,
            value_percent_bp: Some(1000), // 10%
        };
        assert_eq!(service.amount_cents(5000), 500);
        // 10% of 33.33 = 3.333 -> 3.33
        assert_eq!(service.amount_cents(3333), 333);
        // 12.5% of 0.99 = 0.12375 -> 0.12
        let odd = Extra {
            value_percent_bp: Some(1250),
            ..service.clone()
        };
        assert_eq!(odd.amount_cents(99), 12);
    }

    #[test]
    fn extras_fixed_ignores_subtotal() {
        let tip = Extra {
            id: "e2".to_string(),
            kind: ExtraKind::Fixed,
            allocation_mode: AllocationMode::Equal,
            value_cents: Some(250),
            value_percent_bp: None,
        };
        assert_eq!(tip.amount_cents(0), 250);
        assert_eq!(tip.amount_cents(99999), 250);
    }

    #[test]
    fn draft_deserializes_camel_case_wire_format() {
        let json = r#"{
            "id": "s1",
            "name": "Lunch",
            "placeName": "Corner Cafe",
            "participants": [{"id": "p1", "name": "Alice", "sortOrder": 0}],
            "items": [{"id": "i1", "name": "Pizza", "amountCents": 5000}],
            "shares": [{"itemId": "i1", "participantId": "p1"}],
            "extras": [],
            "createdAt": "2026-01-15T12:00:00Z",
            "status": "OPEN"
        }"#;
        let draft: Draft = serde_json::from_str(json).unwrap();
        assert_eq!(draft.items[0].amount_cents, 5000);
        assert_eq!(draft.participants[0].sort_order, 0);
        assert_eq!(draft.place_name.as_deref(), Some("Corner Cafe"));
        assert_eq!(draft.status, SplitStatus::Open);
        assert_eq!(draft.consumer_ids("i1"), vec!["p1"]);
    }
}
