use std::collections::BTreeMap;

use chrono::NaiveDate;
use tracing::{debug, warn};

use super::generic::UnitCandidates;
use super::types::{DayBook, Move, Status, StatusPriority};

/// Picks the most disruptive unit on `from` and plans moving it to `to`.
/// Returns None if `from` has nobody assigned.
pub fn find_move(
    book: &DayBook,
    from: NaiveDate,
    to: NaiveDate,
    units: &BTreeMap<&str, &UnitCandidates>,
    priority: &StatusPriority,
) -> Option<Move> {
    // First of the worst keeps the loop deterministic
    let worst = book
        .day(&from)
        .iter()
        .enumerate()
        .max_by(|(i, a), (j, b)| {
            priority
                .rank(a.status)
                .cmp(&priority.rank(b.status))
                .then(j.cmp(i))
        })
        .map(|(_, assignment)| assignment)?;

    let status = units
        .get(worst.unit.as_str())
        .and_then(|candidates| candidates.status_on(&to))
        .unwrap_or(Status::Vacant);

    Some(Move {
        unit: worst.unit.clone(),
        from,
        to,
        status,
    })
}

pub fn apply_move(mv: &Move, book: &mut DayBook) {
    if book.take(&mv.unit, &mv.from).is_some() {
        book.place(&mv.unit, mv.to, mv.status);
    } else {
        warn!("Unit {} is not assigned to {}, move ignored", mv.unit, mv.from);
    }
}

/// Moves units from the busiest to the quietest day until loads differ by at
/// most one, or `max_moves` moves have been made
pub fn rebalance(
    book: &mut DayBook,
    units: &BTreeMap<&str, &UnitCandidates>,
    priority: &StatusPriority,
    max_moves: usize,
) -> Vec<Move> {
    let mut moves = Vec::new();

    while let Some((busiest, quietest)) = book.extremes() {
        if book.load(&busiest) <= book.load(&quietest) + 1 {
            return moves;
        }
        if moves.len() >= max_moves {
            warn!(
                "Rebalancing stopped after {} moves with loads {} and {}",
                moves.len(),
                book.load(&busiest),
                book.load(&quietest)
            );
            return moves;
        }

        let Some(mv) = find_move(book, busiest, quietest, units, priority) else {
            return moves;
        };
        debug!(
            "Moving {} from {} to {} ({})",
            mv.unit, mv.from, mv.to, mv.status
        );
        apply_move(&mv, book);
        moves.push(mv);
    }

    moves
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(offset: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2026, 10, 5 + offset).unwrap()
    }

    fn candidates(unit: &str) -> UnitCandidates {
        UnitCandidates {
            unit: unit.to_string(),
            ..Default::default()
        }
    }

    #[test]
    fn worst_status_leaves_the_busiest_day() {
        let mut book = DayBook::new([day(0), day(1)]);
        book.place("A", day(0), Status::Vacant);
        book.place("B", day(0), Status::Occupied);
        book.place("C", day(0), Status::Arrival);

        let mut b = candidates("B");
        b.departing = vec![day(1)];
        let a = candidates("A");
        let c = candidates("C");
        let units: BTreeMap<&str, &UnitCandidates> =
            [("A", &a), ("B", &b), ("C", &c)].into_iter().collect();

        let moves = rebalance(&mut book, &units, &StatusPriority::default(), 3);
        assert_eq!(moves.len(), 1);
        assert_eq!(moves[0].unit, "B");
        assert_eq!(moves[0].status, Status::Departure);
        assert_eq!(book.load(&day(0)), 2);
        assert_eq!(book.load(&day(1)), 1);
    }

    #[test]
    fn ties_move_the_first_assigned_unit() {
        let mut book = DayBook::new([day(0), day(1)]);
        book.place("A", day(0), Status::Occupied);
        book.place("B", day(0), Status::Occupied);

        let a = candidates("A");
        let b = candidates("B");
        let units: BTreeMap<&str, &UnitCandidates> = [("A", &a), ("B", &b)].into_iter().collect();

        let mv = find_move(&book, day(0), day(1), &units, &StatusPriority::default()).unwrap();
        assert_eq!(mv.unit, "A");
        assert_eq!(mv.status, Status::Vacant);
    }

    #[test]
    fn cap_stops_rebalancing() {
        let mut book = DayBook::new([day(0), day(1), day(2)]);
        for unit in ["A", "B", "C", "D", "E", "F"] {
            book.place(unit, day(0), Status::Occupied);
        }
        let units = BTreeMap::new();

        let moves = rebalance(&mut book, &units, &StatusPriority::default(), 1);
        assert_eq!(moves.len(), 1);
        assert_eq!(book.load(&day(0)), 5);
    }

    #[test]
    fn balanced_book_is_left_alone() {
        let mut book = DayBook::new([day(0), day(1)]);
        book.place("A", day(0), Status::Vacant);
        let units = BTreeMap::new();
        assert!(rebalance(&mut book, &units, &StatusPriority::default(), 5).is_empty());
    }

    #[test]
    fn moving_an_absent_unit_changes_nothing() {
        let mut book = DayBook::new([day(0), day(1)]);
        book.place("A", day(0), Status::Vacant);
        let mv = Move {
            unit: "Z".to_string(),
            from: day(0),
            to: day(1),
            status: Status::Vacant,
        };
        apply_move(&mv, &mut book);
        assert_eq!(book.load(&day(0)), 1);
        assert_eq!(book.load(&day(1)), 0);
    }
}
