use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Server-issued appointment identity
pub type AppointmentId = String;

/// Fixed capacity for trucks whose name starts with "Trailer"
pub const TRAILER_CAPACITY: f64 = 25_000.0;
/// Fixed capacity for trucks whose name starts with "Straight"
pub const STRAIGHT_CAPACITY: f64 = 15_000.0;

/// Timestamp layout used when the client normalizes times before sending them
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A delivery appointment as stored by the persistence service
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: AppointmentId,
    #[serde(default)]
    pub agency_number: String,
    #[serde(default)]
    pub account_name: String,
    #[serde(default)]
    pub area: String,
    #[serde(default, deserialize_with = "lenient_weight")]
    pub min_weight: Option<f64>,
    #[serde(default, deserialize_with = "lenient_weight")]
    pub max_weight: Option<f64>,
    pub start_time: String,
    pub end_time: String,
}

impl Appointment {
    /// Decimal hour of the start time, `None` when the timestamp is unreadable
    pub fn start_hour(&self) -> Option<f64> {
        decimal_hour(&self.start_time)
    }

    /// Calendar date this appointment belongs to
    pub fn date_key(&self) -> Option<DateKey> {
        date_key_of(&self.start_time)
    }

    /// Weight counted against truck capacity (0 when missing or unparsable)
    pub fn load_weight(&self) -> f64 {
        self.max_weight.filter(|w| w.is_finite()).unwrap_or(0.0)
    }
}

/// Appointment fields without an id, as sent on create and update
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentFields {
    pub agency_number: String,
    pub account_name: String,
    pub area: String,
    pub min_weight: f64,
    pub max_weight: f64,
    pub start_time: String,
    pub end_time: String,
}

impl AppointmentFields {
    /// Attaches a server-issued id
    pub fn into_appointment(self, id: AppointmentId) -> Appointment {
        Appointment {
            id,
            agency_number: self.agency_number,
            account_name: self.account_name,
            area: self.area,
            min_weight: Some(self.min_weight),
            max_weight: Some(self.max_weight),
            start_time: self.start_time,
            end_time: self.end_time,
        }
    }
}

/// Weights arrive as numbers, numeric strings, blanks or nulls depending on
/// where the record came from. Anything that is not a finite number becomes `None`.
fn lenient_weight<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    }
    .filter(|w| w.is_finite()))
}

/// How much a truck may carry
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Capacity {
    Bounded(f64),
    Unbounded,
}

impl Capacity {
    /// Whether a total load stays within this capacity
    pub fn admits(&self, total: f64) -> bool {
        match self {
            Capacity::Bounded(limit) => total <= *limit,
            Capacity::Unbounded => true,
        }
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Capacity::Bounded(limit) => write!(f, "{}", limit),
            Capacity::Unbounded => write!(f, "unbounded"),
        }
    }
}

/// Derives the capacity class from a truck's display name
pub fn capacity_of(truck_name: &str) -> Capacity {
    if truck_name.starts_with("Trailer") {
        Capacity::Bounded(TRAILER_CAPACITY)
    } else if truck_name.starts_with("Straight") {
        Capacity::Bounded(STRAIGHT_CAPACITY)
    } else {
        Capacity::Unbounded
    }
}

/// A truck, identified by its display name
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Truck {
    pub name: String,
}

impl Truck {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn capacity(&self) -> Capacity {
        capacity_of(&self.name)
    }
}

/// A labelled half-open time window `[start_hour, end_hour)` within a day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    pub label: String,
    pub start_hour: f64,
    pub end_hour: f64,
}

impl Slot {
    pub fn new(label: impl Into<String>, start_hour: f64, end_hour: f64) -> Self {
        Self {
            label: label.into(),
            start_hour,
            end_hour,
        }
    }

    /// Half-open window membership
    pub fn contains(&self, hour: f64) -> bool {
        self.start_hour <= hour && hour < self.end_hour
    }
}

/// Parses the timestamp shapes that appear in appointment records.
/// Offsets are dropped and the local wall-clock time is kept.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    const LAYOUTS: [&str; 6] = [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M:%S",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ];
    for layout in LAYOUTS {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(raw, layout) {
            return Some(parsed);
        }
    }

    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed.naive_local());
    }

    // Bare dates count as midnight
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Re-renders a timestamp in the canonical `YYYY-MM-DDTHH:MM:SS` layout
pub fn normalize_timestamp(raw: &str) -> Option<String> {
    parse_timestamp(raw).map(|ts| ts.format(TIMESTAMP_FORMAT).to_string())
}

/// Hour of day as a decimal (13:30 -> 13.5). Seconds are ignored.
pub fn decimal_hour(timestamp: &str) -> Option<f64> {
    parse_timestamp(timestamp).map(|ts| ts.hour() as f64 + ts.minute() as f64 / 60.0)
}

/// Calendar date of a timestamp
pub fn date_key_of(timestamp: &str) -> Option<DateKey> {
    parse_timestamp(timestamp).map(|ts| DateKey(ts.date()))
}

/// A calendar day, rendered as `YYYY-MM-DD`
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DateKey(NaiveDate);

impl DateKey {
    pub fn new(date: NaiveDate) -> Self {
        Self(date)
    }

    pub fn date(&self) -> NaiveDate {
        self.0
    }

    /// The following calendar day
    pub fn succ(&self) -> Option<DateKey> {
        self.0.succ_opt().map(DateKey)
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%Y-%m-%d"))
    }
}

impl FromStr for DateKey {
    type Err = chrono::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        NaiveDate::parse_from_str(s.trim(), "%Y-%m-%d").map(DateKey)
    }
}

impl Serialize for DateKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for DateKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}
