//! Destination and visa type selection

use crate::error::SessionError;
use serde::{Deserialize, Serialize};

/// A complete (jurisdiction, visa type) choice, fixed once the user proceeds
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JurisdictionVisaType {
    pub jurisdiction: String,
    pub visa_type: String,
}

/// In-progress selection. The visa type depends on the jurisdiction.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Selection {
    jurisdiction: Option<String>,
    visa_type: Option<String>,
}

impl Selection {
    pub fn jurisdiction(&self) -> Option<&str> {
        self.jurisdiction.as_deref()
    }

    pub fn visa_type(&self) -> Option<&str> {
        self.visa_type.as_deref()
    }

    /// Set the jurisdiction, clearing the visa type when it changes.
    ///
    /// Keys compare case-insensitively, like the catalog lookup. A code and a
    /// display name are different keys here even when they name the same
    /// jurisdiction. Returns true if a previously chosen visa type was cleared.
    pub fn select_jurisdiction(&mut self, code: &str) -> bool {
        let code = code.trim();
        if self
            .jurisdiction
            .as_deref()
            .is_some_and(|current| current.eq_ignore_ascii_case(code))
        {
            return false;
        }
        self.jurisdiction = Some(code.to_string());
        self.visa_type.take().is_some()
    }

    pub fn select_visa_type(&mut self, label: &str) -> Result<(), SessionError> {
        if self.jurisdiction.is_none() {
            return Err(SessionError::JurisdictionNotSelected);
        }
        self.visa_type = Some(label.trim().to_string());
        Ok(())
    }

    /// The full pair, if both halves are chosen
    pub fn complete(&self) -> Option<JurisdictionVisaType> {
        match (&self.jurisdiction, &self.visa_type) {
            (Some(jurisdiction), Some(visa_type)) => Some(JurisdictionVisaType {
                jurisdiction: jurisdiction.clone(),
                visa_type: visa_type.clone(),
            }),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visa_type_requires_jurisdiction() {
        let mut selection = Selection::default();
        assert_eq!(
            selection.select_visa_type("Work Permit"),
            Err(SessionError::JurisdictionNotSelected)
        );
        assert!(selection.visa_type().is_none());
    }

    #[test]
    fn test_changing_jurisdiction_clears_visa_type() {
        let mut selection = Selection::default();
        selection.select_jurisdiction("CA");
        selection.select_visa_type("Work Permit").unwrap();

        assert!(selection.select_jurisdiction("UK"));
        assert_eq!(selection.jurisdiction(), Some("UK"));
        assert!(selection.visa_type().is_none());
    }

    #[test]
    fn test_reselecting_same_jurisdiction_keeps_visa_type() {
        let mut selection = Selection::default();
        selection.select_jurisdiction("CA");
        selection.select_visa_type("Work Permit").unwrap();

        assert!(!selection.select_jurisdiction(" CA "));
        assert_eq!(selection.visa_type(), Some("Work Permit"));
    }

    #[test]
    fn test_reselecting_in_other_case_keeps_visa_type() {
        let mut selection = Selection::default();
        selection.select_jurisdiction("Canada");
        selection.select_visa_type("Work Permit").unwrap();

        assert!(!selection.select_jurisdiction("CANADA"));
        assert!(!selection.select_jurisdiction("canada"));
        assert_eq!(selection.jurisdiction(), Some("Canada"));
        assert_eq!(selection.visa_type(), Some("Work Permit"));
    }

    #[test]
    fn test_complete_needs_both() {
        let mut selection = Selection::default();
        assert!(selection.complete().is_none());
        selection.select_jurisdiction("SCHENGEN");
        assert!(selection.complete().is_none());
        selection.select_visa_type("Family Visit").unwrap();
        assert_eq!(
            selection.complete(),
            Some(JurisdictionVisaType {
                jurisdiction: "SCHENGEN".to_string(),
                visa_type: "Family Visit".to_string(),
            })
        );
    }
}
