use thiserror::Error;
use tracing::debug;

use crate::model::DateKey;

use super::state::BoardState;

#[derive(Error, Debug, PartialEq, Eq)]
pub enum RangeError {
    #[error("end date {end} is before start date {start}")]
    EndBeforeStart { start: DateKey, end: DateKey },
}

/// The dates the board can show, ascending and duplicate-free, with one in focus
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DateRange {
    dates: Vec<DateKey>,
    current: usize,
}

impl DateRange {
    /// Sorts and de-duplicates `dates`; focus starts on the first one
    pub fn new(mut dates: Vec<DateKey>) -> Self {
        dates.sort();
        dates.dedup();
        Self { dates, current: 0 }
    }

    /// Every day from `start` to `end`, inclusive
    pub fn from_bounds(start: DateKey, end: DateKey) -> Result<Self, RangeError> {
        if end < start {
            return Err(RangeError::EndBeforeStart { start, end });
        }
        let mut dates = vec![start];
        let mut cursor = start;
        while cursor < end {
            match cursor.succ() {
                Some(next) => {
                    dates.push(next);
                    cursor = next;
                }
                None => break,
            }
        }
        Ok(Self { dates, current: 0 })
    }

    pub fn dates(&self) -> &[DateKey] {
        &self.dates
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn current_index(&self) -> usize {
        self.current
    }

    pub fn current(&self) -> Option<DateKey> {
        self.dates.get(self.current).copied()
    }

    pub fn contains(&self, date: &DateKey) -> bool {
        self.dates.binary_search(date).is_ok()
    }

    /// Moves focus one day back. No-op on the first date.
    pub fn step_prev(&mut self) -> bool {
        if self.current == 0 {
            return false;
        }
        self.current -= 1;
        true
    }

    /// Moves focus one day forward. No-op on the last date.
    pub fn step_next(&mut self) -> bool {
        if self.current + 1 >= self.dates.len() {
            return false;
        }
        self.current += 1;
        true
    }

    /// Adds `date` in order (if missing), gives it a full board, and focuses it
    pub fn extend_and_focus(&mut self, date: DateKey, board: &mut BoardState) -> usize {
        let position = match self.dates.binary_search(&date) {
            Ok(position) => position,
            Err(position) => {
                self.dates.insert(position, date);
                debug!(%date, position, "date range extended");
                position
            }
        };
        board.ensure_date(date);
        self.current = position;
        position
    }
}
