use std::collections::HashMap;

use crate::model::{Appointment, AppointmentId};

/// The appointment collection plus a by-id lookup over it.
///
/// `records` is authoritative; `positions` is rebuilt from it on every
/// structural change so the two can't disagree.
#[derive(Debug, Clone, Default)]
pub struct AppointmentIndex {
    records: Vec<Appointment>,
    positions: HashMap<AppointmentId, usize>,
}

impl AppointmentIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds an index from a collection. Later records replace earlier ones with the same id.
    pub fn from_records(records: impl IntoIterator<Item = Appointment>) -> Self {
        let mut index = Self::new();
        for appt in records {
            index.upsert(appt);
        }
        index
    }

    /// Inserts or replaces by id, returning the replaced record
    pub fn upsert(&mut self, appointment: Appointment) -> Option<Appointment> {
        match self.positions.get(&appointment.id) {
            Some(&pos) => Some(std::mem::replace(&mut self.records[pos], appointment)),
            None => {
                self.positions.insert(appointment.id.clone(), self.records.len());
                self.records.push(appointment);
                None
            }
        }
    }

    pub fn remove(&mut self, id: &str) -> Option<Appointment> {
        let pos = self.positions.remove(id)?;
        let removed = self.records.remove(pos);
        // Everything after the hole shifted down by one
        for (offset, appt) in self.records[pos..].iter().enumerate() {
            self.positions.insert(appt.id.clone(), pos + offset);
        }
        Some(removed)
    }

    pub fn get(&self, id: &str) -> Option<&Appointment> {
        self.positions.get(id).map(|&pos| &self.records[pos])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.positions.contains_key(id)
    }

    /// Records in collection order
    pub fn iter(&self) -> impl Iterator<Item = &Appointment> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn appt(id: &str, account: &str) -> Appointment {
        Appointment {
            id: id.to_string(),
            agency_number: "1".to_string(),
            account_name: account.to_string(),
            area: "North".to_string(),
            min_weight: Some(0.0),
            max_weight: Some(100.0),
            start_time: "2024-01-01T08:00:00".to_string(),
            end_time: "2024-01-01T09:00:00".to_string(),
        }
    }

    #[test]
    fn upsert_replaces_by_id() {
        let mut index = AppointmentIndex::new();
        assert!(index.upsert(appt("a", "First")).is_none());
        let old = index.upsert(appt("a", "Second")).unwrap();
        assert_eq!(old.account_name, "First");
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("a").unwrap().account_name, "Second");
    }

    #[test]
    fn remove_keeps_lookup_consistent() {
        let mut index = AppointmentIndex::from_records(vec![appt("a", "A"), appt("b", "B"), appt("c", "C")]);
        assert_eq!(index.remove("a").unwrap().account_name, "A");
        assert!(index.remove("a").is_none());

        assert_eq!(index.get("b").unwrap().account_name, "B");
        assert_eq!(index.get("c").unwrap().account_name, "C");
        let ids: Vec<&str> = index.iter().map(|a| a.id.as_str()).collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn duplicate_ids_collapse_to_last() {
        let index = AppointmentIndex::from_records(vec![appt("a", "Old"), appt("a", "New")]);
        assert_eq!(index.len(), 1);
        assert_eq!(index.get("a").unwrap().account_name, "New");
    }
}
