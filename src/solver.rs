use crate::data::{
    Conflict, DeskType, ExistingPlan, GridConfig, Plan, PlanStats, Seat, SeatId, SeatPosition,
    SeatingInput, SeatingMode, SolveError, Student, StudentId, Violation, ViolationKind,
};
use crate::rng::{Lcg, rotation_seed};
use chrono::NaiveDate;
use itertools::Itertools;
use log::{info, trace};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::time::Instant;

/// Generates a seating plan for the given input.
///
/// `as_of` drives the weekly rotation seed; the production caller passes the
/// current date, tests pass a fixed one. The run is a pure computation: the
/// only state is the seeded random stream.
pub fn generate(input: &SeatingInput, as_of: NaiveDate) -> Result<Plan, SolveError> {
    let start_time = Instant::now();
    let seed = rotation_seed(as_of);
    let mut random = Lcg::new(seed);
    info!(
        "Starting seating generation... Mode: {:?}, Seed: {}",
        input.mode, seed
    );

    if input.roster.is_empty() {
        return Err(SolveError::EmptyRoster);
    }
    if input.roster.len() > input.grid.capacity() {
        return Err(SolveError::InsufficientCapacity {
            students: input.roster.len(),
            seats: input.grid.capacity(),
        });
    }

    let grid = build_grid(&input.grid);
    trace!(
        "Expanded grid: {} desks, {} seats, {} front rows",
        grid.desks.len(),
        grid.seats.len(),
        input.grid.front_rows
    );

    // lookups
    let roster_map: HashMap<StudentId, &Student> =
        input.roster.iter().map(|s| (s.id, s)).collect();
    let checker = CompatChecker::new(&input.conflicts, input.mode);

    let carried = carry_over_pins(input.existing_plan.as_ref(), &roster_map, &grid);
    let mut assignments = carried.assignments;
    let mut placed = carried.placed;

    let mut pool = build_pool(&input.roster, &placed, &mut random);
    trace!("Pool prepared: {} students left to place", pool.remaining());

    fill_seats(&grid, &roster_map, &checker, &mut pool, &mut assignments, &mut placed);

    let violations = validate_plan(&assignments, &grid, &roster_map, &checker);
    for violation in &violations {
        trace!("{violation}");
    }
    let stats = collect_stats(&input.roster, &placed, &violations);
    info!(
        "Plan generated in {:.2?}: {} placed, {} unplaced, {} violations",
        start_time.elapsed(),
        stats.placed,
        stats.unplaced,
        violations.len()
    );

    Ok(Plan {
        seed,
        assignments,
        pinned_seat_ids: carried.pinned_seat_ids,
        manual_moves: input
            .existing_plan
            .as_ref()
            .map(|p| p.manual_moves)
            .unwrap_or(0),
        seats: grid.seats,
        stats,
        violations,
    })
}

/// A desk groups one seat (single) or two seats (double) at a grid cell.
/// Fields index into the seat arena built alongside it.
#[derive(Debug)]
struct Desk {
    left: usize,
    right: Option<usize>,
}

#[derive(Debug)]
struct Grid {
    seats: Vec<Seat>,
    desks: Vec<Desk>,
}

/// Expands the grid configuration into seats and desks in row-major,
/// front-to-back order. Pure expansion; capacity is checked by the caller.
fn build_grid(config: &GridConfig) -> Grid {
    let mut seats = Vec::with_capacity(config.capacity());
    let mut desks = Vec::with_capacity((config.rows * config.cols) as usize);

    for row in 1..=config.rows {
        for col in 1..=config.cols {
            let is_front = row <= config.front_rows;
            let desk_id = format!("D-R{row}-C{col}");
            let left = seats.len();
            match config.desk_type {
                DeskType::Double => {
                    seats.push(Seat {
                        id: format!("R{row}-C{col}-L"),
                        row,
                        col,
                        position: SeatPosition::Left,
                        is_front,
                        desk_id: desk_id.clone(),
                    });
                    seats.push(Seat {
                        id: format!("R{row}-C{col}-R"),
                        row,
                        col,
                        position: SeatPosition::Right,
                        is_front,
                        desk_id,
                    });
                    desks.push(Desk {
                        left,
                        right: Some(left + 1),
                    });
                }
                DeskType::Single => {
                    seats.push(Seat {
                        id: format!("R{row}-C{col}"),
                        row,
                        col,
                        position: SeatPosition::Single,
                        is_front,
                        desk_id,
                    });
                    desks.push(Desk { left, right: None });
                }
            }
        }
    }

    Grid { seats, desks }
}

#[derive(Debug, Default)]
struct CarriedPins {
    assignments: BTreeMap<SeatId, StudentId>,
    pinned_seat_ids: BTreeSet<SeatId>,
    placed: BTreeSet<StudentId>,
}

/// Re-applies pinned bindings from a prior plan. A pin survives only if its
/// seat still exists in the current grid and its student is still on the
/// roster; stale pins are pruned silently as a recovery policy, not a
/// failure. Pins without a binding are dropped so that the pinned set stays
/// a subset of the assignment keys.
fn carry_over_pins(
    existing: Option<&ExistingPlan>,
    roster_map: &HashMap<StudentId, &Student>,
    grid: &Grid,
) -> CarriedPins {
    let mut carried = CarriedPins::default();
    let Some(prior) = existing else {
        return carried;
    };

    let seat_ids: HashSet<&str> = grid.seats.iter().map(|s| s.id.as_str()).collect();
    for seat_id in &prior.pinned_seat_ids {
        if !seat_ids.contains(seat_id.as_str()) {
            trace!("Dropping pin {seat_id}: seat no longer exists");
            continue;
        }
        match prior.assignments.get(seat_id) {
            Some(student_id) if roster_map.contains_key(student_id) => {
                carried.assignments.insert(seat_id.clone(), *student_id);
                carried.placed.insert(*student_id);
                carried.pinned_seat_ids.insert(seat_id.clone());
            }
            _ => trace!("Dropping pin {seat_id}: student removed from roster"),
        }
    }
    carried
}

/// Priority-ordered placement pool.
///
/// Special-needs students come first, then the normal bucket sorted by name
/// and shuffled with the shared random stream. Draining moves an index
/// cursor over the immutable ordering instead of removing elements.
struct Pool<'a> {
    order: Vec<&'a Student>,
    taken: Vec<bool>,
    remaining: usize,
}

impl<'a> Pool<'a> {
    fn remaining(&self) -> usize {
        self.remaining
    }

    fn is_empty(&self) -> bool {
        self.remaining == 0
    }

    /// Removes and returns the highest-priority student still in the pool.
    fn pop_front(&mut self) -> Option<&'a Student> {
        self.take_first(|_| true)
    }

    /// Removes and returns the first remaining student matching `pred`.
    fn take_first(&mut self, pred: impl Fn(&Student) -> bool) -> Option<&'a Student> {
        for i in 0..self.order.len() {
            if !self.taken[i] && pred(self.order[i]) {
                self.taken[i] = true;
                self.remaining -= 1;
                return Some(self.order[i]);
            }
        }
        None
    }
}

fn build_pool<'a>(
    roster: &'a [Student],
    placed: &BTreeSet<StudentId>,
    random: &mut Lcg,
) -> Pool<'a> {
    let (special, mut normal): (Vec<&Student>, Vec<&Student>) = roster
        .iter()
        .filter(|s| !placed.contains(&s.id))
        .partition(|s| s.special_needs);

    // Name sort gives a stable baseline before the seeded shuffle.
    normal.sort_by(|a, b| a.name.cmp(&b.name));

    // Fisher-Yates over the shared random stream.
    for i in (1..normal.len()).rev() {
        let j = (random.next_f64() * (i + 1) as f64) as usize;
        normal.swap(i, j);
    }

    let order: Vec<&Student> = special.into_iter().chain(normal).collect();
    let remaining = order.len();
    Pool {
        taken: vec![false; order.len()],
        order,
        remaining,
    }
}

/// Outcome of a pairing check. `hard` marks a registered conflict; a soft
/// failure is a same-gender pairing under girl/boy mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Compat {
    ok: bool,
    hard: bool,
}

struct CompatChecker {
    conflict_pairs: HashSet<(StudentId, StudentId)>,
    mode: SeatingMode,
}

impl CompatChecker {
    fn new(conflicts: &[Conflict], mode: SeatingMode) -> Self {
        let conflict_pairs = conflicts
            .iter()
            .map(|c| ordered_pair(c.student_id_a, c.student_id_b))
            .collect();
        Self {
            conflict_pairs,
            mode,
        }
    }

    fn conflicts(&self, a: StudentId, b: StudentId) -> bool {
        self.conflict_pairs.contains(&ordered_pair(a, b))
    }

    fn check(&self, a: Option<&Student>, b: Option<&Student>) -> Compat {
        let (Some(a), Some(b)) = (a, b) else {
            // A missing operand is vacuously compatible.
            return Compat {
                ok: true,
                hard: false,
            };
        };
        if self.conflicts(a.id, b.id) {
            return Compat {
                ok: false,
                hard: true,
            };
        }
        if self.mode == SeatingMode::GirlBoy {
            if let (Some(ga), Some(gb)) = (a.gender, b.gender) {
                if ga == gb {
                    return Compat {
                        ok: false,
                        hard: false,
                    };
                }
            }
        }
        Compat {
            ok: true,
            hard: false,
        }
    }
}

fn ordered_pair(a: StudentId, b: StudentId) -> (StudentId, StudentId) {
    if a <= b { (a, b) } else { (b, a) }
}

/// Two-pass partner search over the pool: full compatibility first, then
/// relaxing the soft gender constraint while still refusing hard conflicts.
fn find_partner<'a>(
    pool: &mut Pool<'a>,
    anchor: Option<&Student>,
    checker: &CompatChecker,
) -> Option<&'a Student> {
    if let Some(partner) = pool.take_first(|c| checker.check(anchor, Some(c)).ok) {
        return Some(partner);
    }
    pool.take_first(|c| !checker.check(anchor, Some(c)).hard)
}

/// Greedy front-to-back fill. Desks are visited once and never revisited;
/// an early pairing is never undone even when it forces a later seat to
/// stay empty.
fn fill_seats<'a>(
    grid: &Grid,
    roster_map: &HashMap<StudentId, &'a Student>,
    checker: &CompatChecker,
    pool: &mut Pool<'a>,
    assignments: &mut BTreeMap<SeatId, StudentId>,
    placed: &mut BTreeSet<StudentId>,
) {
    for desk in &grid.desks {
        let left = &grid.seats[desk.left];

        let Some(right_index) = desk.right else {
            // Single desk: fill it unless a pin already did.
            if assignments.contains_key(&left.id) || pool.is_empty() {
                continue;
            }
            if let Some(student) = pool.pop_front() {
                bind(assignments, placed, &left.id, student);
            }
            continue;
        };
        let right = &grid.seats[right_index];

        let left_bound = assignments.get(&left.id).copied();
        let right_bound = assignments.get(&right.id).copied();

        match (left_bound, right_bound) {
            (Some(_), Some(_)) => {}
            (Some(pinned_id), None) | (None, Some(pinned_id)) => {
                let free_seat = if left_bound.is_some() { right } else { left };
                let pinned = roster_map.get(&pinned_id).copied();
                if let Some(partner) = find_partner(pool, pinned, checker) {
                    bind(assignments, placed, &free_seat.id, partner);
                }
                // Every remaining candidate hard-conflicts with the pinned
                // occupant: the seat stays empty. A gap beats a known
                // conflict pair.
            }
            (None, None) => {
                if pool.is_empty() {
                    continue;
                }
                if pool.remaining() == 1 {
                    // Lone leftover sits alone in the left seat. No
                    // redistribution with already-paired later desks; that
                    // would change observable seating outcomes.
                    if let Some(lone) = pool.pop_front() {
                        bind(assignments, placed, &left.id, lone);
                    }
                    continue;
                }
                let Some(first) = pool.pop_front() else {
                    continue;
                };
                match find_partner(pool, Some(first), checker) {
                    Some(partner) => {
                        bind(assignments, placed, &left.id, first);
                        bind(assignments, placed, &right.id, partner);
                    }
                    None => {
                        // First pick hard-conflicts with everyone remaining.
                        bind(assignments, placed, &left.id, first);
                    }
                }
            }
        }
    }
}

fn bind(
    assignments: &mut BTreeMap<SeatId, StudentId>,
    placed: &mut BTreeSet<StudentId>,
    seat_id: &SeatId,
    student: &Student,
) {
    assignments.insert(seat_id.clone(), student.id);
    placed.insert(student.id);
}

/// Re-scans the finished assignment for residual violations, regardless of
/// whether a binding came from a pin, the fill pass, or carry-over.
fn validate_plan(
    assignments: &BTreeMap<SeatId, StudentId>,
    grid: &Grid,
    roster_map: &HashMap<StudentId, &Student>,
    checker: &CompatChecker,
) -> Vec<Violation> {
    let mut violations = Vec::new();
    let seat_map: HashMap<&str, &Seat> = grid.seats.iter().map(|s| (s.id.as_str(), s)).collect();

    // Special-needs students must sit in a front row.
    for (seat_id, student_id) in assignments {
        let Some(student) = roster_map.get(student_id) else {
            continue;
        };
        let Some(seat) = seat_map.get(seat_id.as_str()) else {
            continue;
        };
        if student.special_needs && !seat.is_front {
            violations.push(Violation {
                kind: ViolationKind::SpecialNeeds,
                seat_id: seat_id.clone(),
                neighbor_seat_id: None,
                student_id: *student_id,
                message: format!(
                    "{} has a special-needs profile and must sit in a front row",
                    student.name
                ),
            });
        }
    }

    // Conflict pairs, checked once per desk from the left seat so the tally
    // is not doubled.
    for desk in &grid.desks {
        let Some(right_index) = desk.right else {
            continue;
        };
        let left = &grid.seats[desk.left];
        let right = &grid.seats[right_index];
        let (Some(&a), Some(&b)) = (assignments.get(&left.id), assignments.get(&right.id)) else {
            continue;
        };
        if checker.conflicts(a, b) {
            let name = |id: StudentId| {
                roster_map
                    .get(&id)
                    .map(|s| s.name.as_str())
                    .unwrap_or("unknown")
            };
            violations.push(Violation {
                kind: ViolationKind::Conflict,
                seat_id: left.id.clone(),
                neighbor_seat_id: Some(right.id.clone()),
                student_id: a,
                message: format!(
                    "{} and {} are a registered conflict pair but share a desk",
                    name(a),
                    name(b)
                ),
            });
        }
    }

    violations
}

fn collect_stats(
    roster: &[Student],
    placed: &BTreeSet<StudentId>,
    violations: &[Violation],
) -> PlanStats {
    let counts = violations.iter().counts_by(|v| v.kind);
    PlanStats {
        total_students: roster.len(),
        placed: placed.len(),
        unplaced: roster.len() - placed.len(),
        conflicts_violated: counts.get(&ViolationKind::Conflict).copied().unwrap_or(0),
        special_needs_violations: counts
            .get(&ViolationKind::SpecialNeeds)
            .copied()
            .unwrap_or(0),
    }
}
