use time::OffsetDateTime;
use uuid::Uuid;

use crate::state::game::{Board, GameRecord, GridSize};

/// High-level phases a round can be in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RoundPhase {
    /// Board is dealt but hidden; only clicking `1` starts the round.
    NotStarted,
    /// Round is running; the timer accrues and clicks are validated.
    InProgress,
    /// Every value was clicked in order. Terminal until reset.
    Completed,
    /// A wrong value was clicked. Terminal until reset.
    Failed,
}

impl RoundPhase {
    /// Whether the round has ended, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(self, RoundPhase::Completed | RoundPhase::Failed)
    }
}

/// Result of applying one click to the state machine.
///
/// Out-of-state clicks are deliberately not errors: a click on a hidden cell
/// before the round starts, or on anything after it ended, resolves to
/// [`ClickOutcome::Ignored`] so an exploring player is never penalised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickOutcome {
    /// The click had no effect in the current phase.
    Ignored,
    /// Clicking `1` started the round.
    Started {
        /// The value the player must click next (always 2 here).
        next_expected: u16,
    },
    /// A correct mid-round click advanced the sequence.
    Advanced {
        /// The value the player must click next.
        next_expected: u16,
    },
    /// The final value was clicked; the round is won.
    Completed {
        /// Summary handed to the persistence layer by the caller.
        record: GameRecord,
    },
    /// A wrong value was clicked; the round is lost.
    Failed {
        /// The value that was expected.
        expected: u16,
        /// The value that was actually clicked.
        clicked: u16,
    },
}

impl ClickOutcome {
    /// Whether this click was a correct one, i.e. the kind that plays the
    /// click cue. Failures and ignored clicks stay silent.
    pub fn is_correct(&self) -> bool {
        matches!(
            self,
            ClickOutcome::Started { .. }
                | ClickOutcome::Advanced { .. }
                | ClickOutcome::Completed { .. }
        )
    }
}

/// Read-only view of the round handed to observers on every change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoundSnapshot {
    /// Board size of the current round.
    pub grid_size: GridSize,
    /// Cell values in board order.
    pub cells: Vec<u16>,
    /// Next value the player must click; `N² + 1` once the round is won.
    pub next_expected: u16,
    /// Whether the round has been started (stays `true` after it ends).
    pub started: bool,
    /// Whether the round has ended, successfully or not.
    pub over: bool,
    /// Exact phase, for callers that need more than the two flags.
    pub phase: RoundPhase,
}

/// State machine for a single round: a shuffled board, a progress pointer,
/// and the `NotStarted → InProgress → Completed | Failed` lifecycle.
#[derive(Debug, Clone)]
pub struct RoundMachine {
    grid_size: GridSize,
    board: Board,
    next_expected: u16,
    phase: RoundPhase,
    started_at: Option<OffsetDateTime>,
}

impl RoundMachine {
    /// Deal a fresh, not-yet-started round on the given board size.
    pub fn new(grid_size: GridSize) -> Self {
        Self {
            grid_size,
            board: Board::generate(grid_size),
            next_expected: 1,
            phase: RoundPhase::NotStarted,
            started_at: None,
        }
    }

    /// Current board size.
    pub fn grid_size(&self) -> GridSize {
        self.grid_size
    }

    /// Current phase.
    pub fn phase(&self) -> RoundPhase {
        self.phase
    }

    /// The value the player must click next.
    pub fn next_expected(&self) -> u16 {
        self.next_expected
    }

    /// Cell values in board order.
    pub fn cells(&self) -> &[u16] {
        self.board.cells()
    }

    /// Snapshot the round for observers.
    pub fn snapshot(&self) -> RoundSnapshot {
        RoundSnapshot {
            grid_size: self.grid_size,
            cells: self.board.cells().to_vec(),
            next_expected: self.next_expected,
            started: !matches!(self.phase, RoundPhase::NotStarted),
            over: self.phase.is_terminal(),
            phase: self.phase,
        }
    }

    /// Apply one click and return what it did.
    ///
    /// Only clicking `1` leaves `NotStarted`; a correct click in
    /// `InProgress` advances or completes; a wrong one fails the round;
    /// everything else is a no-op. The caller is responsible for side
    /// effects (timer, cue, persistence) based on the returned outcome.
    pub fn apply_click(&mut self, value: u16) -> ClickOutcome {
        match self.phase {
            RoundPhase::NotStarted if value == 1 => {
                self.started_at = Some(OffsetDateTime::now_utc());
                self.next_expected = 2;
                self.phase = RoundPhase::InProgress;
                ClickOutcome::Started { next_expected: 2 }
            }
            RoundPhase::NotStarted => ClickOutcome::Ignored,
            RoundPhase::InProgress if value == self.next_expected => {
                if value == self.grid_size.cell_count() {
                    self.complete(value)
                } else {
                    self.next_expected = value + 1;
                    ClickOutcome::Advanced {
                        next_expected: self.next_expected,
                    }
                }
            }
            RoundPhase::InProgress => {
                let expected = self.next_expected;
                self.phase = RoundPhase::Failed;
                ClickOutcome::Failed {
                    expected,
                    clicked: value,
                }
            }
            // Terminal phases only leave via reset; the view disables the
            // grid but stray clicks must be rejected here too.
            RoundPhase::Completed | RoundPhase::Failed => ClickOutcome::Ignored,
        }
    }

    /// Replace the round with a fresh one on the same board size.
    pub fn reset(&mut self) {
        *self = Self::new(self.grid_size);
    }

    /// Switch board size. Always resets; any confirmation prompt belongs to
    /// the caller, not the state machine.
    pub fn change_grid_size(&mut self, grid_size: GridSize) {
        *self = Self::new(grid_size);
    }

    fn complete(&mut self, value: u16) -> ClickOutcome {
        let ended_at = OffsetDateTime::now_utc();
        self.phase = RoundPhase::Completed;
        // N² + 1 marks the sequence as exhausted.
        self.next_expected = value + 1;

        // `InProgress` implies a start timestamp by construction; fall back
        // to a zero-length round rather than panicking on the game path.
        let started_at = self.started_at.unwrap_or(ended_at);
        ClickOutcome::Completed {
            record: GameRecord {
                id: Uuid::new_v4(),
                grid_size: self.grid_size,
                started_at,
                ended_at,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started_machine(grid_size: GridSize) -> RoundMachine {
        let mut machine = RoundMachine::new(grid_size);
        assert_eq!(
            machine.apply_click(1),
            ClickOutcome::Started { next_expected: 2 }
        );
        machine
    }

    #[test]
    fn fresh_round_is_not_started() {
        let machine = RoundMachine::new(GridSize::Four);
        assert_eq!(machine.phase(), RoundPhase::NotStarted);
        assert_eq!(machine.next_expected(), 1);

        let snapshot = machine.snapshot();
        assert!(!snapshot.started);
        assert!(!snapshot.over);
        assert_eq!(snapshot.cells.len(), 16);
    }

    #[test]
    fn clicking_one_starts_the_round() {
        let machine = started_machine(GridSize::Four);
        assert_eq!(machine.phase(), RoundPhase::InProgress);
        assert_eq!(machine.next_expected(), 2);
        assert!(machine.snapshot().started);
    }

    #[test]
    fn clicking_anything_else_before_start_is_ignored() {
        let mut machine = RoundMachine::new(GridSize::Four);
        for value in [2, 7, 16] {
            assert_eq!(machine.apply_click(value), ClickOutcome::Ignored);
            assert_eq!(machine.phase(), RoundPhase::NotStarted);
            assert_eq!(machine.next_expected(), 1);
        }
    }

    #[test]
    fn correct_clicks_advance_the_sequence() {
        let mut machine = started_machine(GridSize::Four);
        for value in 2..=15 {
            assert_eq!(
                machine.apply_click(value),
                ClickOutcome::Advanced {
                    next_expected: value + 1
                }
            );
            assert_eq!(machine.phase(), RoundPhase::InProgress);
        }
        assert_eq!(machine.next_expected(), 16);
    }

    #[test]
    fn wrong_click_fails_the_round() {
        let mut machine = started_machine(GridSize::Four);
        machine.apply_click(2);

        assert_eq!(
            machine.apply_click(7),
            ClickOutcome::Failed {
                expected: 3,
                clicked: 7
            }
        );
        assert_eq!(machine.phase(), RoundPhase::Failed);
        assert!(machine.snapshot().over);
    }

    #[test]
    fn completing_click_emits_exactly_one_record() {
        let mut machine = started_machine(GridSize::Four);
        for value in 2..=15 {
            machine.apply_click(value);
        }

        let outcome = machine.apply_click(16);
        let ClickOutcome::Completed { record } = outcome else {
            panic!("expected completion, got {outcome:?}");
        };
        assert_eq!(record.grid_size, GridSize::Four);
        assert!(record.ended_at >= record.started_at);

        assert_eq!(machine.phase(), RoundPhase::Completed);
        assert_eq!(machine.next_expected(), 17);
    }

    #[test]
    fn terminal_phases_ignore_further_clicks() {
        let mut failed = started_machine(GridSize::Four);
        failed.apply_click(9);
        assert_eq!(failed.phase(), RoundPhase::Failed);
        for value in [1, 2, 16] {
            assert_eq!(failed.apply_click(value), ClickOutcome::Ignored);
            assert_eq!(failed.phase(), RoundPhase::Failed);
        }

        let mut completed = started_machine(GridSize::Four);
        for value in 2..=16 {
            completed.apply_click(value);
        }
        assert_eq!(completed.phase(), RoundPhase::Completed);
        assert_eq!(completed.apply_click(1), ClickOutcome::Ignored);
        assert_eq!(completed.phase(), RoundPhase::Completed);
    }

    #[test]
    fn reset_returns_to_a_fresh_round_from_any_phase() {
        let mut machines = vec![
            RoundMachine::new(GridSize::Four),
            started_machine(GridSize::Four),
        ];
        let mut failed = started_machine(GridSize::Four);
        failed.apply_click(12);
        machines.push(failed);
        let mut completed = started_machine(GridSize::Four);
        for value in 2..=16 {
            completed.apply_click(value);
        }
        machines.push(completed);

        for machine in &mut machines {
            machine.reset();
            assert_eq!(machine.phase(), RoundPhase::NotStarted);
            assert_eq!(machine.next_expected(), 1);
            assert_eq!(machine.cells().len(), 16);
        }
    }

    #[test]
    fn changing_grid_size_always_resets() {
        let mut machine = started_machine(GridSize::Four);
        machine.apply_click(2);

        machine.change_grid_size(GridSize::Six);
        assert_eq!(machine.grid_size(), GridSize::Six);
        assert_eq!(machine.phase(), RoundPhase::NotStarted);
        assert_eq!(machine.next_expected(), 1);
        assert_eq!(machine.cells().len(), 36);
    }

    #[test]
    fn full_run_works_on_every_grid_size() {
        for size in GridSize::ALL {
            let mut machine = RoundMachine::new(size);
            let last = size.cell_count();
            for value in 1..=last {
                let outcome = machine.apply_click(value);
                if value == last {
                    assert!(matches!(outcome, ClickOutcome::Completed { .. }));
                } else {
                    assert!(outcome.is_correct());
                }
            }
            assert_eq!(machine.next_expected(), last + 1);
        }
    }
}
