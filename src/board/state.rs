use std::collections::{BTreeMap, HashSet};

use tracing::debug;

use crate::config::BoardConfig;
use crate::model::{AppointmentId, DateKey, Slot, Truck};

use super::index::AppointmentIndex;
use super::types::{BoardSnapshot, MoveResult, Placement, SlotKey};

type DayBoard = BTreeMap<SlotKey, Vec<AppointmentId>>;

/// Per-date (truck, slot) lists of appointment ids.
///
/// Every date the board knows about carries an entry for every (truck, slot)
/// pair, and an id sits in at most one list per date. Unassigned appointments
/// are whatever is left over; they are never stored.
#[derive(Debug, Clone)]
pub struct BoardState {
    config: BoardConfig,
    days: BTreeMap<DateKey, DayBoard>,
}

impl BoardState {
    pub fn new(config: BoardConfig) -> Self {
        Self {
            config,
            days: BTreeMap::new(),
        }
    }

    pub fn config(&self) -> &BoardConfig {
        &self.config
    }

    pub fn trucks(&self) -> &[Truck] {
        &self.config.trucks
    }

    pub fn slots(&self) -> &[Slot] {
        &self.config.slots
    }

    /// Every (truck, slot) pair, trucks outermost, in configuration order
    pub fn slot_keys(&self) -> impl Iterator<Item = SlotKey> + '_ {
        self.config.trucks.iter().flat_map(move |truck| {
            self.config
                .slots
                .iter()
                .map(move |slot| SlotKey::new(truck.name.clone(), slot.label.clone()))
        })
    }

    /// Whether the key names a configured truck and slot
    pub fn knows(&self, key: &SlotKey) -> bool {
        self.config.truck(&key.truck).is_some() && self.config.slot(&key.slot).is_some()
    }

    pub fn dates(&self) -> impl Iterator<Item = &DateKey> {
        self.days.keys()
    }

    pub fn has_date(&self, date: &DateKey) -> bool {
        self.days.contains_key(date)
    }

    /// Creates empty lists for every (truck, slot) pair on `date`. Idempotent.
    pub fn ensure_date(&mut self, date: DateKey) {
        let keys: Vec<SlotKey> = self.slot_keys().collect();
        let day = self.days.entry(date).or_default();
        for key in keys {
            day.entry(key).or_default();
        }
    }

    /// Current occupants of a cell, in placement order
    pub fn list(&self, date: &DateKey, key: &SlotKey) -> &[AppointmentId] {
        self.days
            .get(date)
            .and_then(|day| day.get(key))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Which cell holds `id` on `date`
    pub fn placement_of(&self, date: &DateKey, id: &str) -> Placement {
        self.days
            .get(date)
            .and_then(|day| day.iter().find(|(_, ids)| ids.iter().any(|i| i == id)))
            .map(|(key, _)| Placement::Slot(key.clone()))
            .unwrap_or(Placement::Unassigned)
    }

    /// Moves `id` out of `from` and into `to` at `target_index` (clamped to the list length).
    ///
    /// Moving into `Unassigned` only removes. The id is taken out of every list
    /// on the date, so `from` only shows up in the log.
    /// Legality is the caller's business; this never fails.
    pub fn move_placement(
        &mut self,
        date: DateKey,
        id: &str,
        from: &Placement,
        to: &Placement,
        target_index: usize,
        index: &AppointmentIndex,
    ) -> MoveResult {
        self.ensure_date(date);
        let Some(day) = self.days.get_mut(&date) else {
            return MoveResult { ids: Vec::new(), weight: 0.0 };
        };

        for ids in day.values_mut() {
            ids.retain(|i| i != id);
        }

        match to {
            Placement::Unassigned => {
                debug!(%date, id, %from, "appointment unassigned");
                MoveResult { ids: Vec::new(), weight: 0.0 }
            }
            Placement::Slot(key) => {
                let ids = day.entry(key.clone()).or_default();
                let at = target_index.min(ids.len());
                ids.insert(at, id.to_string());
                debug!(%date, id, %from, to = %key, at, "appointment placed");

                let ids = ids.clone();
                let weight = sum_weights(&ids, index);
                MoveResult { ids, weight }
            }
        }
    }

    /// Sum of `max_weight` over the cell's current occupants
    pub fn weight_of(&self, date: &DateKey, key: &SlotKey, index: &AppointmentIndex) -> f64 {
        sum_weights(self.list(date, key), index)
    }

    /// Appointments dated `date` that sit in no list, in collection order
    pub fn unassigned_for(&self, date: &DateKey, index: &AppointmentIndex) -> Vec<AppointmentId> {
        let placed: HashSet<&str> = self
            .days
            .get(date)
            .map(|day| day.values().flatten().map(String::as_str).collect())
            .unwrap_or_default();

        index
            .iter()
            .filter(|appt| appt.date_key().as_ref() == Some(date))
            .filter(|appt| !placed.contains(appt.id.as_str()))
            .map(|appt| appt.id.clone())
            .collect()
    }

    /// Drops `id` from every list on every date. Returns whether it was placed anywhere.
    pub fn remove_everywhere(&mut self, id: &str) -> bool {
        let mut removed = false;
        for day in self.days.values_mut() {
            for ids in day.values_mut() {
                let before = ids.len();
                ids.retain(|i| i != id);
                removed |= ids.len() != before;
            }
        }
        removed
    }

    /// The persisted representation of every known date
    pub fn serialize(&self) -> BoardSnapshot {
        self.days
            .iter()
            .map(|(date, day)| {
                let cells = day
                    .iter()
                    .map(|(key, ids)| (key.wire_key(), ids.clone()))
                    .collect();
                (*date, cells)
            })
            .collect()
    }

    /// Restores saved lists for dates the board already knows.
    ///
    /// Cells for unconfigured trucks or slots, ids missing from `index`, and
    /// repeat placements of an id on the same date are skipped. Returns how
    /// many placements were skipped.
    pub fn restore(&mut self, snapshot: &BoardSnapshot, index: &AppointmentIndex) -> usize {
        let mut skipped = 0;
        for (date, cells) in snapshot {
            if !self.has_date(date) {
                skipped += cells.values().map(Vec::len).sum::<usize>();
                continue;
            }

            let mut seen: HashSet<&str> = HashSet::new();
            let mut restored: Vec<(SlotKey, Vec<AppointmentId>)> = Vec::new();
            for (wire, ids) in cells {
                let key = match SlotKey::parse(wire) {
                    Some(key) if self.knows(&key) => key,
                    _ => {
                        skipped += ids.len();
                        continue;
                    }
                };
                let mut kept = Vec::with_capacity(ids.len());
                for id in ids {
                    if index.contains(id) && seen.insert(id.as_str()) {
                        kept.push(id.clone());
                    } else {
                        skipped += 1;
                    }
                }
                restored.push((key, kept));
            }

            if let Some(day) = self.days.get_mut(date) {
                for (key, ids) in restored {
                    day.insert(key, ids);
                }
            }
        }

        if skipped > 0 {
            debug!(skipped, "dropped stale placements while restoring board");
        }
        skipped
    }
}

fn sum_weights(ids: &[AppointmentId], index: &AppointmentIndex) -> f64 {
    ids.iter()
        .filter_map(|id| index.get(id))
        .map(|appt| appt.load_weight())
        .fold(0.0, |total, w| total + w)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Appointment;

    fn day(s: &str) -> DateKey {
        s.parse().unwrap()
    }

    fn appt(id: &str, start: &str, max_weight: Option<f64>) -> Appointment {
        Appointment {
            id: id.to_string(),
            agency_number: "100".to_string(),
            account_name: format!("Account {}", id),
            area: "East".to_string(),
            min_weight: Some(0.0),
            max_weight,
            start_time: start.to_string(),
            end_time: start.to_string(),
        }
    }

    fn fixture() -> (BoardState, AppointmentIndex) {
        let index = AppointmentIndex::from_records(vec![
            appt("a", "2024-01-01T08:00:00", Some(1000.0)),
            appt("b", "2024-01-01T09:00:00", Some(2500.0)),
            appt("c", "2024-01-01T12:00:00", None),
            appt("d", "2024-01-02T08:00:00", Some(400.0)),
        ]);
        let mut board = BoardState::new(BoardConfig::default());
        board.ensure_date(day("2024-01-01"));
        board.ensure_date(day("2024-01-02"));
        (board, index)
    }

    fn t1a() -> Placement {
        Placement::slot("Trailer 1", "A")
    }

    #[test]
    fn ensure_date_is_idempotent() {
        let (mut board, index) = fixture();
        let d = day("2024-01-01");
        board.move_placement(d, "a", &Placement::Unassigned, &t1a(), 0, &index);
        board.ensure_date(d);
        assert_eq!(board.list(&d, &SlotKey::new("Trailer 1", "A")), ["a".to_string()]);
        assert_eq!(board.serialize()[&d].len(), 16);
    }

    #[test]
    fn fresh_board_serializes_to_empty_grid() {
        let (board, _) = fixture();
        let snapshot = board.serialize();
        assert_eq!(snapshot.len(), 2);
        for cells in snapshot.values() {
            assert_eq!(cells.len(), 8 * 2);
            assert!(cells.values().all(Vec::is_empty));
            assert!(cells.contains_key("Straight 4_B"));
        }
    }

    #[test]
    fn moves_never_duplicate_an_id() {
        let (mut board, index) = fixture();
        let d = day("2024-01-01");
        let t2b = Placement::slot("Trailer 2", "B");
        let s1a = Placement::slot("Straight 1", "A");

        board.move_placement(d, "a", &Placement::Unassigned, &t1a(), 0, &index);
        board.move_placement(d, "a", &t1a(), &t2b, 0, &index);
        // stale origin: the event claims "a" came from unassigned
        board.move_placement(d, "a", &Placement::Unassigned, &s1a, 0, &index);
        board.move_placement(d, "b", &Placement::Unassigned, &s1a, 0, &index);
        board.move_placement(d, "a", &s1a, &s1a, 5, &index);

        let snapshot = board.serialize();
        let mut seen = HashSet::new();
        for ids in snapshot[&d].values() {
            for id in ids {
                assert!(seen.insert(id.clone()), "{} placed twice", id);
            }
        }
        assert_eq!(board.list(&d, &SlotKey::new("Straight 1", "A")), ["b".to_string(), "a".to_string()]);
        assert_eq!(board.placement_of(&d, "a"), s1a);
    }

    #[test]
    fn insert_position_is_respected_and_clamped() {
        let (mut board, index) = fixture();
        let d = day("2024-01-01");
        board.move_placement(d, "a", &Placement::Unassigned, &t1a(), 0, &index);
        board.move_placement(d, "b", &Placement::Unassigned, &t1a(), 0, &index);
        let result = board.move_placement(d, "c", &Placement::Unassigned, &t1a(), 99, &index);
        assert_eq!(result.ids, vec!["b", "a", "c"]);
        assert_eq!(result.weight, 3500.0);
    }

    #[test]
    fn weight_is_recomputed_from_occupants() {
        let (mut board, mut index) = fixture();
        let d = day("2024-01-01");
        let key = SlotKey::new("Trailer 1", "A");
        board.move_placement(d, "a", &Placement::Unassigned, &t1a(), 0, &index);
        board.move_placement(d, "b", &Placement::Unassigned, &t1a(), 1, &index);
        assert_eq!(board.weight_of(&d, &key, &index), 3500.0);

        index.upsert(appt("b", "2024-01-01T09:00:00", Some(100.0)));
        assert_eq!(board.weight_of(&d, &key, &index), 1100.0);

        board.move_placement(d, "a", &t1a(), &Placement::Unassigned, 0, &index);
        assert_eq!(board.weight_of(&d, &key, &index), 100.0);

        // empty cells weigh +0.0, never -0.0
        board.move_placement(d, "b", &t1a(), &Placement::Unassigned, 0, &index);
        let empty = board.weight_of(&d, &key, &index);
        assert_eq!(empty, 0.0);
        assert!(empty.is_sign_positive());
        assert_eq!(format!("{}", empty), "0");
    }

    #[test]
    fn unassigned_is_derived_per_date() {
        let (mut board, index) = fixture();
        let d = day("2024-01-01");
        assert_eq!(board.unassigned_for(&d, &index), vec!["a", "b", "c"]);
        board.move_placement(d, "b", &Placement::Unassigned, &t1a(), 0, &index);
        assert_eq!(board.unassigned_for(&d, &index), vec!["a", "c"]);
        assert_eq!(board.unassigned_for(&day("2024-01-02"), &index), vec!["d"]);
    }

    #[test]
    fn move_into_unknown_date_creates_it() {
        let (mut board, index) = fixture();
        let d = day("2024-02-01");
        board.move_placement(d, "a", &Placement::Unassigned, &t1a(), 0, &index);
        assert!(board.has_date(&d));
        assert_eq!(board.serialize()[&d].len(), 16);
    }

    #[test]
    fn remove_everywhere_clears_all_dates() {
        let (mut board, index) = fixture();
        board.move_placement(day("2024-01-01"), "a", &Placement::Unassigned, &t1a(), 0, &index);
        board.move_placement(day("2024-01-02"), "a", &Placement::Unassigned, &t1a(), 0, &index);
        assert!(board.remove_everywhere("a"));
        assert!(!board.remove_everywhere("a"));
        let snapshot = board.serialize();
        assert!(snapshot.values().flat_map(|c| c.values()).all(|ids| !ids.contains(&"a".to_string())));
    }

    #[test]
    fn restore_reproduces_serialized_state() {
        let (mut board, index) = fixture();
        let d = day("2024-01-01");
        board.move_placement(d, "a", &Placement::Unassigned, &t1a(), 0, &index);
        board.move_placement(d, "b", &Placement::Unassigned, &t1a(), 1, &index);
        board.move_placement(d, "c", &Placement::Unassigned, &Placement::slot("Straight 2", "B"), 0, &index);
        let saved = board.serialize();
        let json = serde_json::to_string(&saved).unwrap();

        let (mut reloaded, _) = fixture();
        let snapshot: BoardSnapshot = serde_json::from_str(&json).unwrap();
        assert_eq!(reloaded.restore(&snapshot, &index), 0);
        assert_eq!(reloaded.serialize(), saved);
    }

    #[test]
    fn restore_skips_stale_entries() {
        let (mut board, index) = fixture();
        let json = r#"{
            "2024-01-01": {
                "Trailer 1_A": ["a", "ghost"],
                "Trailer 2_A": ["a", "b"],
                "Rocket_A": ["c"]
            },
            "2030-01-01": {"Trailer 1_A": ["d"]}
        }"#;
        let snapshot: BoardSnapshot = serde_json::from_str(json).unwrap();
        assert_eq!(board.restore(&snapshot, &index), 4);

        let d = day("2024-01-01");
        assert_eq!(board.list(&d, &SlotKey::new("Trailer 1", "A")), ["a".to_string()]);
        assert_eq!(board.list(&d, &SlotKey::new("Trailer 2", "A")), ["b".to_string()]);
        assert!(!board.has_date(&day("2030-01-01")));
    }
}
