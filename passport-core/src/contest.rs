//! Lucky-draw contest entries submitted from the welcome banner.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ContestError {
    #[error("a name is required")]
    MissingName,
    #[error("`{0}` is not an email address")]
    InvalidEmail(String),
    #[error("the entry could not be saved: {0}")]
    Write(String),
    #[error("the welcome banner is not open")]
    BannerClosed,
}

/// What the visitor typed into the banner form.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ContestForm {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: String,
}

impl ContestForm {
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
            phone: phone.into(),
        }
    }

    /// # Errors
    ///
    /// Rejects a blank name or an email without `@`.
    pub fn validate(&self) -> Result<(), ContestError> {
        if self.name.trim().is_empty() {
            return Err(ContestError::MissingName);
        }
        let email = self.email.trim();
        if !email.contains('@') {
            return Err(ContestError::InvalidEmail(email.to_string()));
        }
        Ok(())
    }

    /// Stamp the form with progress and submission time.
    #[must_use]
    pub fn into_entry(self, stamps_collected: usize, created_at: DateTime<Utc>) -> ContestEntry {
        ContestEntry {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            phone: self.phone.trim().to_string(),
            stamps_collected,
            created_at,
        }
    }
}

/// Row written to the `bookings` table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContestEntry {
    pub name: String,
    pub email: String,
    pub phone: String,
    pub stamps_collected: usize,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn validation_rules() {
        assert_eq!(
            ContestForm::new("  ", "a@b.tw", "").validate(),
            Err(ContestError::MissingName)
        );
        assert_eq!(
            ContestForm::new("Mei", "mei.example.tw", "").validate(),
            Err(ContestError::InvalidEmail("mei.example.tw".into()))
        );
        assert!(ContestForm::new("Mei", "mei@example.tw", "").validate().is_ok());
    }

    #[test]
    fn entry_serializes_with_rfc3339_timestamp() {
        let at = Utc.with_ymd_and_hms(2025, 2, 1, 8, 30, 0).unwrap();
        let entry = ContestForm::new(" Mei ", "mei@example.tw", "0912").into_entry(7, at);
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["name"], "Mei");
        assert_eq!(json["stamps_collected"], 7);
        assert_eq!(json["created_at"], "2025-02-01T08:30:00Z");
    }
}
