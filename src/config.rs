use std::collections::HashSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::{Slot, Truck};

/// Truck roster used when no configuration file is given
pub const DEFAULT_TRUCKS: [&str; 8] = [
    "Trailer 1", "Trailer 2", "Trailer 3", "Trailer 4",
    "Straight 1", "Straight 2", "Straight 3", "Straight 4",
];

/// Environment variable holding the persistence service base URL
pub const SERVICE_URL_ENV: &str = "DISPATCH_SERVICE_URL";
pub const DEFAULT_SERVICE_URL: &str = "http://127.0.0.1:8080";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("no trucks configured")]
    NoTrucks,

    #[error("no slots configured")]
    NoSlots,

    #[error("duplicate truck name: {0}")]
    DuplicateTruck(String),

    #[error("duplicate slot label: {0}")]
    DuplicateSlot(String),

    #[error("slot label {0:?} must be non-empty and must not contain '_'")]
    BadSlotLabel(String),

    #[error("slot {label} has an empty window [{start_hour}, {end_hour})")]
    EmptyWindow {
        label: String,
        start_hour: f64,
        end_hour: f64,
    },
}

/// Trucks and slots that make up the board grid. Read-only once loaded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoardConfig {
    pub trucks: Vec<Truck>,
    pub slots: Vec<Slot>,
}

impl Default for BoardConfig {
    fn default() -> Self {
        Self {
            trucks: DEFAULT_TRUCKS.iter().map(|name| Truck::new(*name)).collect(),
            slots: vec![Slot::new("A", 7.0, 11.0), Slot::new("B", 11.0, 14.0)],
        }
    }
}

impl BoardConfig {
    /// Loads and validates a JSON board configuration:
    /// `{"trucks": ["Trailer 1", ...], "slots": [{"label": "A", "start_hour": 7, "end_hour": 11}]}`
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let config: BoardConfig = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Loads from `path` when given, otherwise falls back to the built-in roster
    pub fn load_or_default<P: AsRef<Path>>(path: Option<P>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => Self::from_file(path),
            None => Ok(Self::default()),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.trucks.is_empty() {
            return Err(ConfigError::NoTrucks);
        }
        if self.slots.is_empty() {
            return Err(ConfigError::NoSlots);
        }

        let mut names = HashSet::new();
        for truck in &self.trucks {
            if !names.insert(truck.name.as_str()) {
                return Err(ConfigError::DuplicateTruck(truck.name.clone()));
            }
        }

        // Slot keys are "<truck>_<label>" split on the last '_', so the label
        // itself can't carry one.
        let mut labels = HashSet::new();
        for slot in &self.slots {
            if slot.label.is_empty() || slot.label.contains('_') {
                return Err(ConfigError::BadSlotLabel(slot.label.clone()));
            }
            if !labels.insert(slot.label.as_str()) {
                return Err(ConfigError::DuplicateSlot(slot.label.clone()));
            }
            if !(slot.start_hour < slot.end_hour) {
                return Err(ConfigError::EmptyWindow {
                    label: slot.label.clone(),
                    start_hour: slot.start_hour,
                    end_hour: slot.end_hour,
                });
            }
        }

        Ok(())
    }

    pub fn truck(&self, name: &str) -> Option<&Truck> {
        self.trucks.iter().find(|t| t.name == name)
    }

    pub fn slot(&self, label: &str) -> Option<&Slot> {
        self.slots.iter().find(|s| s.label == label)
    }
}

/// Where the sync client sends its requests
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub service_url: String,
}

impl ClientConfig {
    pub fn new(service_url: impl Into<String>) -> Self {
        let service_url: String = service_url.into();
        Self {
            service_url: service_url.trim_end_matches('/').to_string(),
        }
    }

    /// Reads `DISPATCH_SERVICE_URL`, falling back to the local dev service
    pub fn from_env() -> Self {
        let url = std::env::var(SERVICE_URL_ENV).unwrap_or_else(|_| DEFAULT_SERVICE_URL.to_string());
        Self::new(url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn default_roster_is_valid() {
        let config = BoardConfig::default();
        config.validate().unwrap();
        assert_eq!(config.trucks.len(), 8);
        assert_eq!(config.slot("B").map(|s| s.start_hour), Some(11.0));
        assert!(config.truck("Straight 4").is_some());
    }

    #[test]
    fn rejects_underscore_in_slot_label() {
        let config = BoardConfig {
            trucks: vec![Truck::new("Trailer 1")],
            slots: vec![Slot::new("late_pm", 14.0, 18.0)],
        };
        assert!(matches!(config.validate(), Err(ConfigError::BadSlotLabel(_))));
    }

    #[test]
    fn rejects_duplicates_and_empty_windows() {
        let dup_truck = BoardConfig {
            trucks: vec![Truck::new("Van"), Truck::new("Van")],
            slots: vec![Slot::new("A", 7.0, 11.0)],
        };
        assert!(matches!(dup_truck.validate(), Err(ConfigError::DuplicateTruck(_))));

        let empty = BoardConfig {
            trucks: vec![Truck::new("Van")],
            slots: vec![Slot::new("A", 11.0, 11.0)],
        };
        assert!(matches!(empty.validate(), Err(ConfigError::EmptyWindow { .. })));
    }

    #[test]
    fn loads_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"trucks": ["Trailer 9", "Pickup"], "slots": [{{"label": "AM", "start_hour": 6.5, "end_hour": 12}}]}}"#
        )
        .unwrap();

        let config = BoardConfig::from_file(file.path()).unwrap();
        assert_eq!(config.trucks.len(), 2);
        assert_eq!(config.slots[0].start_hour, 6.5);
    }

    #[test]
    fn client_url_drops_trailing_slash() {
        assert_eq!(ClientConfig::new("http://host:9000/").service_url, "http://host:9000");
    }
}
