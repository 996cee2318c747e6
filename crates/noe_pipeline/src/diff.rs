//! crates/noe_pipeline/src/diff.rs
//! Seat movements between two published orders.
//!
//! Every candidate whose seat changed, who entered, or who left is listed.
//! Moves are sorted by new seat; leavers follow, sorted by previous seat.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use noe_core::{CandidateId, NominationOrder};

/// One candidate's movement. `None` means "not seated" on that side.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeatMove {
    pub candidate_id: CandidateId,
    pub previous_seat: Option<u32>,
    pub new_seat: Option<u32>,
}

impl SeatMove {
    pub fn entered(&self) -> bool {
        self.previous_seat.is_none()
    }

    pub fn left(&self) -> bool {
        self.new_seat.is_none()
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderDiff {
    /// `None` when there was no previous order.
    pub from_version: Option<u64>,
    pub to_version: u64,
    pub moves: Vec<SeatMove>,
}

impl OrderDiff {
    pub fn is_empty(&self) -> bool {
        self.moves.is_empty()
    }

    pub fn move_of(&self, id: &CandidateId) -> Option<&SeatMove> {
        self.moves.iter().find(|m| &m.candidate_id == id)
    }
}

/// Diff `next` against `prev` (or against nothing).
pub fn diff_orders(prev: Option<&NominationOrder>, next: &NominationOrder) -> OrderDiff {
    let before: BTreeMap<&CandidateId, u32> = prev.map(NominationOrder::seat_index).unwrap_or_default();

    let mut moves: Vec<SeatMove> = next
        .entries
        .iter()
        .filter(|e| before.get(&e.candidate_id) != Some(&e.seat))
        .map(|e| SeatMove {
            candidate_id: e.candidate_id.clone(),
            previous_seat: before.get(&e.candidate_id).copied(),
            new_seat: Some(e.seat),
        })
        .collect();

    if let Some(prev) = prev {
        // prev.entries are seat-ordered, so leavers come out sorted.
        moves.extend(prev.entries.iter().filter(|e| next.seat_of(&e.candidate_id).is_none()).map(|e| SeatMove {
            candidate_id: e.candidate_id.clone(),
            previous_seat: Some(e.seat),
            new_seat: None,
        }));
    }

    OrderDiff { from_version: prev.map(|p| p.version), to_version: next.version, moves }
}
