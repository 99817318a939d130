//! Locale table for every caption the driver looks for.
//!
//! Control flow never carries literal captions; it asks the table for the
//! strings recognised for a semantic label and tries them in order.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiLabel {
    AddRow,
    Save,
    Cancel,
    Ok,
    Yes,
    Delete,
    /// Title of the zoom icon that opens a row's detail dialog
    MoreDetails,
    /// Menu entry opening the weekly timesheet
    TimesheetMenu,
    PeriodField,
    CostCodeField,
    ActivityField,
    DescriptionField,
    TicketField,
    /// Header of the collapsible per-day hours section
    TimeDetails,
    /// Status captions meaning the period is submitted and read-only
    LockedStatuses,
    /// Title or heading fragments that identify the login page
    LoginIndicators,
}

impl UiLabel {
    pub const ALL: [UiLabel; 16] = [
        UiLabel::AddRow,
        UiLabel::Save,
        UiLabel::Cancel,
        UiLabel::Ok,
        UiLabel::Yes,
        UiLabel::Delete,
        UiLabel::MoreDetails,
        UiLabel::TimesheetMenu,
        UiLabel::PeriodField,
        UiLabel::CostCodeField,
        UiLabel::ActivityField,
        UiLabel::DescriptionField,
        UiLabel::TicketField,
        UiLabel::TimeDetails,
        UiLabel::LockedStatuses,
        UiLabel::LoginIndicators,
    ];

    fn defaults(self) -> &'static [&'static str] {
        match self {
            UiLabel::AddRow => &["Add", "Ergänzen"],
            UiLabel::Save => &["Save", "Speichern"],
            UiLabel::Cancel => &["Cancel", "Abbrechen"],
            UiLabel::Ok => &["OK"],
            UiLabel::Yes => &["Yes", "Ja"],
            UiLabel::Delete => &["Delete", "Löschen"],
            UiLabel::MoreDetails => &["Click to see more details", "Klicken für weitere Details"],
            UiLabel::TimesheetMenu => &["Timesheets - standard", "Zeiterfassung - Standard"],
            UiLabel::PeriodField => &["Period*", "Woche*"],
            UiLabel::CostCodeField => &["Work order", "Arbeitsauftrag"],
            UiLabel::ActivityField => &["Activity", "Aktivität"],
            UiLabel::DescriptionField => &["Description", "Text"],
            UiLabel::TicketField => &["Ticketno", "Ticketnr"],
            UiLabel::TimeDetails => &["Time details", "Zeitdetails"],
            UiLabel::LockedStatuses => &[
                "Ready",
                "Transferred",
                "Sent",
                "Bereit",
                "Transferiert",
                "Gesendet",
            ],
            UiLabel::LoginIndicators => &["Login", "Anmelden", "Sign in"],
        }
    }
}

/// Captions per semantic label, defaults overridable from configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Labels {
    overrides: HashMap<UiLabel, Vec<String>>,
}

impl Labels {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the captions recognised for `label`.
    pub fn with(mut self, label: UiLabel, captions: Vec<String>) -> Self {
        self.overrides.insert(label, captions);
        self
    }

    pub fn get(&self, label: UiLabel) -> Vec<String> {
        match self.overrides.get(&label) {
            Some(captions) if !captions.is_empty() => captions.clone(),
            _ => label.defaults().iter().map(|s| s.to_string()).collect(),
        }
    }

    /// The first caption, used in log lines.
    pub fn primary(&self, label: UiLabel) -> String {
        self.get(label).into_iter().next().unwrap_or_default()
    }

    /// Whether `text` contains any caption recognised for `label`.
    pub fn mentions(&self, label: UiLabel, text: &str) -> bool {
        self.get(label).iter().any(|c| text.contains(c.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_label_has_defaults() {
        let labels = Labels::new();
        for label in UiLabel::ALL {
            assert!(!labels.get(label).is_empty(), "{label:?} has no captions");
        }
    }

    #[test]
    fn test_overrides_replace_defaults() {
        let labels = Labels::new().with(UiLabel::AddRow, vec!["Ajouter".into()]);
        assert_eq!(labels.get(UiLabel::AddRow), vec!["Ajouter".to_string()]);
        assert_eq!(labels.primary(UiLabel::Save), "Save");
    }

    #[test]
    fn test_overrides_deserialise_from_snake_case_keys() {
        let labels: Labels =
            serde_json::from_str(r#"{"locked_statuses": ["Envoyé"], "ok": []}"#).unwrap();
        assert_eq!(labels.get(UiLabel::LockedStatuses), vec!["Envoyé".to_string()]);
        // empty override falls back to defaults
        assert_eq!(labels.get(UiLabel::Ok), vec!["OK".to_string()]);
    }

    #[test]
    fn test_login_detection_matches_fragments() {
        let labels = Labels::new();
        assert!(labels.mentions(UiLabel::LoginIndicators, "Unit4 ERP - Anmelden"));
        assert!(!labels.mentions(UiLabel::LoginIndicators, "Unit4 ERP - Timesheets"));
    }
}
