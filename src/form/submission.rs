use serde::{Deserialize, Deserializer};
use thiserror::Error;

use crate::model::{normalize_timestamp, parse_timestamp, AppointmentFields};

/// Every problem found in a submitted appointment form
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}", .0.join("; "))]
pub struct FormError(pub Vec<String>);

/// Appointment form as the dispatcher filled it in. Every field is raw text;
/// numbers in JSON bodies are accepted and turned into text.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AppointmentForm {
    #[serde(default, deserialize_with = "text")]
    pub agency_number: String,
    #[serde(default, deserialize_with = "text")]
    pub account_name: String,
    #[serde(default, deserialize_with = "text")]
    pub area: String,
    #[serde(default, deserialize_with = "text")]
    pub min_weight: String,
    #[serde(default, deserialize_with = "text")]
    pub max_weight: String,
    #[serde(default, deserialize_with = "text")]
    pub start_time: String,
    #[serde(default, deserialize_with = "text")]
    pub end_time: String,
}

fn text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s,
        other => other.to_string(),
    })
}

impl From<&AppointmentFields> for AppointmentForm {
    fn from(fields: &AppointmentFields) -> Self {
        Self {
            agency_number: fields.agency_number.clone(),
            account_name: fields.account_name.clone(),
            area: fields.area.clone(),
            min_weight: fields.min_weight.to_string(),
            max_weight: fields.max_weight.to_string(),
            start_time: fields.start_time.clone(),
            end_time: fields.end_time.clone(),
        }
    }
}

/// Blank means 0; anything else must be a non-negative number
fn parse_weight(raw: &str, label: &str, errors: &mut Vec<String>) -> f64 {
    if raw.is_empty() {
        return 0.0;
    }
    match raw.parse::<f64>() {
        Ok(w) if w.is_finite() && w >= 0.0 => w,
        _ => {
            errors.push(format!("{} must be a non-negative number.", label));
            0.0
        }
    }
}

impl AppointmentForm {
    /// Validates the form, collecting every problem rather than stopping at the first
    pub fn validate(&self) -> Result<AppointmentFields, FormError> {
        let mut errors = Vec::new();

        let agency_number = self.agency_number.trim();
        let account_name = self.account_name.trim();
        let area = self.area.trim();
        if agency_number.is_empty() {
            errors.push("Agency Number is required.".to_string());
        }
        if account_name.is_empty() {
            errors.push("Account Name is required.".to_string());
        }
        if area.is_empty() {
            errors.push("Area is required.".to_string());
        }

        let min_weight = parse_weight(self.min_weight.trim(), "Minimum Weight", &mut errors);
        let max_weight = parse_weight(self.max_weight.trim(), "Maximum Weight", &mut errors);

        let start = parse_timestamp(&self.start_time);
        if start.is_none() {
            errors.push("Start Time is required and must be in correct format.".to_string());
        }
        let end = parse_timestamp(&self.end_time);
        if end.is_none() {
            errors.push("End Time is required and must be in correct format.".to_string());
        }
        if let (Some(start), Some(end)) = (start, end) {
            if end <= start {
                errors.push("End Time must be after Start Time.".to_string());
            }
        }

        if !errors.is_empty() {
            return Err(FormError(errors));
        }

        Ok(AppointmentFields {
            agency_number: agency_number.to_string(),
            account_name: account_name.to_string(),
            area: area.to_string(),
            min_weight,
            max_weight,
            start_time: normalize_timestamp(&self.start_time).unwrap_or_default(),
            end_time: normalize_timestamp(&self.end_time).unwrap_or_default(),
        })
    }
}

/// Re-checks fields built in code before they are sent anywhere
pub fn validate_fields(fields: &AppointmentFields) -> Result<AppointmentFields, FormError> {
    AppointmentForm::from(fields).validate()
}
