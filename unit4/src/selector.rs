use serde::{Deserialize, Serialize};

/// Represents ways to locate an element inside a frame (or inside another element).
///
/// Selectors are serialised to JSON and evaluated by the in-page helper, so every
/// variant here has a counterpart in `cdp/dom_helpers.js`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Selector {
    /// Form control by its accessible label (`label[for]`, wrapping label, `aria-label`)
    Label { text: String, exact: bool },
    /// Element whose own text equals (exact) or contains the given text
    Text { text: String, exact: bool },
    /// Element whose own text matches a regular expression
    TextMatches { pattern: String },
    /// Clickable element (button, link, input button) with the given caption or value
    Button { text: String },
    /// Any element whose attribute contains the value
    AttrContains { name: String, value: String },
    /// Any element whose attribute equals the value
    AttrEquals { name: String, value: String },
    /// Table cell whose tooltip contains the value
    TitledCell { value: String },
    /// `input` element whose id contains the fragment
    IdContains { fragment: String },
    /// `input` element whose name contains the fragment
    NameContains { fragment: String },
    /// Elements with one of the given tag names
    Tags { names: Vec<String> },
    /// First `tag` element following, in document order, the element whose text is `anchor`
    Following { anchor: String, tag: String },
    /// Controls inside the nearest ancestor of the `anchor` text element that holds a control
    NearestControl { anchor: String },
    /// Table rows whose text contains the given text
    RowContaining { text: String },
    /// Checkbox inputs
    Checkbox,
    /// Direct `td` children of a row
    Cells,
    /// The element holding keyboard focus
    Focused,
    /// Inputs that are neither readonly nor disabled, optionally with a `data-type`
    EditableInput { data_type: Option<String> },
    /// Represents an invalid selector string, with a reason.
    Invalid { reason: String },
}

impl Selector {
    pub fn label(text: impl Into<String>) -> Self {
        Selector::Label {
            text: text.into(),
            exact: true,
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Selector::Text {
            text: text.into(),
            exact: true,
        }
    }

    pub fn has_text(text: impl Into<String>) -> Self {
        Selector::Text {
            text: text.into(),
            exact: false,
        }
    }

    pub fn button(text: impl Into<String>) -> Self {
        Selector::Button { text: text.into() }
    }

    pub fn title_contains(value: impl Into<String>) -> Self {
        Selector::AttrContains {
            name: "title".to_string(),
            value: value.into(),
        }
    }

    pub fn matches(pattern: impl Into<String>) -> Self {
        Selector::TextMatches {
            pattern: pattern.into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Selector::Invalid { .. })
    }
}

impl std::fmt::Display for Selector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Selector::Label { text, exact: true } => write!(f, "label:{text}"),
            Selector::Label { text, exact: false } => write!(f, "label~:{text}"),
            Selector::Text { text, exact: true } => write!(f, "text:{text}"),
            Selector::Text { text, exact: false } => write!(f, "has-text:{text}"),
            Selector::TextMatches { pattern } => write!(f, "/{pattern}/"),
            Selector::Button { text } => write!(f, "button:{text}"),
            Selector::AttrContains { name, value } => write!(f, "[{name}*='{value}']"),
            Selector::AttrEquals { name, value } => write!(f, "[{name}='{value}']"),
            Selector::TitledCell { value } => write!(f, "td[title*='{value}']"),
            Selector::IdContains { fragment } => write!(f, "input[id*='{fragment}']"),
            Selector::NameContains { fragment } => write!(f, "input[name*='{fragment}']"),
            Selector::Tags { names } => write!(f, "{}", names.join(", ")),
            Selector::Following { anchor, tag } => write!(f, "text:{anchor} >> following::{tag}"),
            Selector::NearestControl { anchor } => write!(f, "text:{anchor} >> nearest-control"),
            Selector::RowContaining { text } => write!(f, "tr:has-text('{text}')"),
            Selector::Checkbox => write!(f, "input[type='checkbox']"),
            Selector::Cells => write!(f, ":scope > td"),
            Selector::Focused => write!(f, "input:focus"),
            Selector::EditableInput { data_type: None } => {
                write!(f, "input:not([readonly]):not([disabled])")
            }
            Selector::EditableInput {
                data_type: Some(t),
            } => write!(f, "input[data-type='{t}']:not([readonly]):not([disabled])"),
            Selector::Invalid { reason } => write!(f, "<invalid: {reason}>"),
        }
    }
}

impl From<&str> for Selector {
    fn from(s: &str) -> Self {
        let s = s.trim();
        let lower = s.to_lowercase();

        match s {
            _ if lower.starts_with("label~:") => Selector::Label {
                text: s["label~:".len()..].to_string(),
                exact: false,
            },
            _ if lower.starts_with("label:") => Selector::label(&s["label:".len()..]),
            _ if lower.starts_with("has-text:") => Selector::has_text(&s["has-text:".len()..]),
            _ if lower.starts_with("text:") => Selector::text(&s["text:".len()..]),
            _ if lower.starts_with("button:") => Selector::button(&s["button:".len()..]),
            _ if lower.starts_with("title:") => Selector::title_contains(&s["title:".len()..]),
            _ if lower.starts_with("id*=") => Selector::IdContains {
                fragment: s["id*=".len()..].to_string(),
            },
            _ if lower.starts_with("name*=") => Selector::NameContains {
                fragment: s["name*=".len()..].to_string(),
            },
            _ if lower.starts_with("tags:") => Selector::Tags {
                names: s["tags:".len()..]
                    .split(',')
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect(),
            },
            _ if s.len() > 2 && s.starts_with('/') && s.ends_with('/') => {
                let pattern = &s[1..s.len() - 1];
                match regex::Regex::new(pattern) {
                    Ok(_) => Selector::matches(pattern),
                    Err(e) => Selector::Invalid {
                        reason: format!("Invalid text pattern '{pattern}': {e}"),
                    },
                }
            }
            "checkbox" => Selector::Checkbox,
            "focused" => Selector::Focused,
            "cells" => Selector::Cells,
            _ => Selector::Invalid {
                reason: format!(
                    "Unknown selector format: \"{s}\". Use prefixes like 'label:', 'text:', 'has-text:', 'button:', 'title:', 'id*=', 'name*=' or '/regex/'."
                ),
            },
        }
    }
}
