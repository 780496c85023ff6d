use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use thiserror::Error;

// Type aliases for clarity
pub type StudentId = u32;
pub type SeatId = String;
pub type DeskId = String;

/// A student on the class roster. Owned by the roster collaborator and
/// read-only to the engine.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    #[serde(default)]
    pub gender: Option<Gender>,
    /// Resolved once at the roster boundary; absent means `false`.
    #[serde(default)]
    pub special_needs: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Girl,
    Boy,
}

/// An unordered pair of students that must never share a double desk.
/// `(A, B)` and `(B, A)` are equivalent.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Conflict {
    pub student_id_a: StudentId,
    pub student_id_b: StudentId,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeskType {
    Single,
    Double,
}

impl DeskType {
    pub fn seats_per_desk(self) -> u32 {
        match self {
            DeskType::Single => 1,
            DeskType::Double => 2,
        }
    }
}

/// Grid configuration for one run. Immutable input.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GridConfig {
    pub rows: u32,
    pub cols: u32,
    pub desk_type: DeskType,
    /// Rows 1..=front_rows count as "front" for special-needs placement.
    pub front_rows: u32,
}

impl GridConfig {
    pub fn capacity(&self) -> usize {
        (self.rows * self.cols * self.desk_type.seats_per_desk()) as usize
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SeatPosition {
    Left,
    Right,
    Single,
}

/// One seat in the expanded grid topology.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Seat {
    pub id: SeatId,
    pub row: u32,
    pub col: u32,
    pub position: SeatPosition,
    pub is_front: bool,
    pub desk_id: DeskId,
}

/// Gender-alternation mode supplied by the rules collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SeatingMode {
    #[default]
    Free,
    GirlBoy,
}

/// A prior plan whose pinned seat bindings should survive regeneration.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExistingPlan {
    #[serde(default)]
    pub assignments: BTreeMap<SeatId, StudentId>,
    #[serde(default)]
    pub pinned_seat_ids: BTreeSet<SeatId>,
    #[serde(default)]
    pub manual_moves: u32,
}

/// The complete input for one generation run.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SeatingInput {
    pub roster: Vec<Student>,
    #[serde(default)]
    pub conflicts: Vec<Conflict>,
    pub grid: GridConfig,
    #[serde(default)]
    pub mode: SeatingMode,
    #[serde(default)]
    pub existing_plan: Option<ExistingPlan>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ViolationKind {
    Conflict,
    SpecialNeeds,
}

impl fmt::Display for ViolationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ViolationKind::Conflict => write!(f, "conflict"),
            ViolationKind::SpecialNeeds => write!(f, "specialNeeds"),
        }
    }
}

/// A constraint the finished plan could not satisfy. Violations are data,
/// not errors; the engine always returns a best-effort plan alongside them.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Violation {
    #[serde(rename = "type")]
    pub kind: ViolationKind,
    pub seat_id: SeatId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub neighbor_seat_id: Option<SeatId>,
    pub student_id: StudentId,
    pub message: String,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)
    }
}

/// Tallies for reporting; `unplaced` should stay 0 once the capacity
/// check has passed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStats {
    pub total_students: usize,
    pub placed: usize,
    pub unplaced: usize,
    pub conflicts_violated: usize,
    pub special_needs_violations: usize,
}

/// The finished seating plan. Immutable once produced; regenerating
/// yields a fresh plan.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Plan {
    /// Rotation seed that drove this run, kept for reproduction.
    pub seed: u32,
    pub assignments: BTreeMap<SeatId, StudentId>,
    pub pinned_seat_ids: BTreeSet<SeatId>,
    pub manual_moves: u32,
    pub seats: Vec<Seat>,
    pub stats: PlanStats,
    pub violations: Vec<Violation>,
}

/// Pre-condition failures detected before any placement work begins.
/// Everything else degrades to violations or empty seats.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SolveError {
    #[error("roster is empty")]
    EmptyRoster,
    #[error("insufficient capacity: {students} students, {seats} seats")]
    InsufficientCapacity { students: usize, seats: usize },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_deserializes_with_defaults() {
        let json = r#"{
            "roster": [
                {"id": 1, "name": "Ada", "gender": "girl"},
                {"id": 2, "name": "Boris", "specialNeeds": true}
            ],
            "grid": {"rows": 2, "cols": 3, "deskType": "double", "frontRows": 1}
        }"#;
        let input: SeatingInput = serde_json::from_str(json).unwrap();
        assert_eq!(input.roster.len(), 2);
        assert_eq!(input.roster[0].gender, Some(Gender::Girl));
        assert!(!input.roster[0].special_needs);
        assert!(input.roster[1].special_needs);
        assert!(input.conflicts.is_empty());
        assert_eq!(input.mode, SeatingMode::Free);
        assert!(input.existing_plan.is_none());
        assert_eq!(input.grid.capacity(), 12);
    }

    #[test]
    fn mode_uses_snake_case_names() {
        let mode: SeatingMode = serde_json::from_str("\"girl_boy\"").unwrap();
        assert_eq!(mode, SeatingMode::GirlBoy);
    }

    #[test]
    fn solve_error_messages() {
        assert_eq!(SolveError::EmptyRoster.to_string(), "roster is empty");
        let err = SolveError::InsufficientCapacity {
            students: 5,
            seats: 4,
        };
        assert_eq!(err.to_string(), "insufficient capacity: 5 students, 4 seats");
    }

    #[test]
    fn violation_display_includes_kind() {
        let v = Violation {
            kind: ViolationKind::SpecialNeeds,
            seat_id: "R2-C1-L".to_string(),
            neighbor_seat_id: None,
            student_id: 7,
            message: "Ada has a special-needs profile and must sit in a front row".to_string(),
        };
        assert!(v.to_string().starts_with("[specialNeeds]"));
    }
}
