//! Global issue setting: lifecycle states and custom field declarations.

use serde::{Deserialize, Serialize};

use crate::{Result, TrackerError};

/// Kind of value a custom field holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    /// One of a fixed list of choices.
    Choice,
    /// A user name.
    User,
    /// Free text.
    Text,
}

/// Declaration of a custom issue field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSpec {
    /// Field name, unique within the setting.
    pub name: String,
    /// Kind of value the field holds.
    pub kind: FieldKind,
    /// Whether the field may be left empty.
    pub allow_empty: bool,
    /// Label shown for the empty value.
    pub name_of_empty_value: Option<String>,
    /// Legal values for choice fields.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub choices: Vec<String>,
}

impl FieldSpec {
    /// Declares a choice field.
    pub fn choice<I, S>(name: impl Into<String>, choices: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            kind: FieldKind::Choice,
            allow_empty: false,
            name_of_empty_value: None,
            choices: choices.into_iter().map(Into::into).collect(),
        }
    }

    /// Declares a user field.
    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::User,
            allow_empty: true,
            name_of_empty_value: None,
            choices: Vec::new(),
        }
    }

    /// Declares a free text field.
    pub fn text(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind: FieldKind::Text,
            allow_empty: true,
            name_of_empty_value: None,
            choices: Vec::new(),
        }
    }

    /// Allows the field to be empty, displaying `label` for the empty value.
    pub fn with_empty_value(mut self, label: impl Into<String>) -> Self {
        self.allow_empty = true;
        self.name_of_empty_value = Some(label.into());
        self
    }

    /// Returns true if `value` is one of the declared choices.
    pub fn has_choice(&self, value: &str) -> bool {
        self.choices.iter().any(|c| c == value)
    }
}

/// A lifecycle state an issue can be in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateSpec {
    /// State name.
    pub name: String,
    /// Whether issues in this state count as closed.
    pub closed: bool,
}

impl StateSpec {
    /// Declares an open-like state.
    pub fn open(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            closed: false,
        }
    }

    /// Declares a closed-like state.
    pub fn closed(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            closed: true,
        }
    }
}

/// The tracker-wide issue setting.
///
/// The first declared state is the initial state of new issues.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssueSetting {
    state_specs: Vec<StateSpec>,
    field_specs: Vec<FieldSpec>,
}

impl IssueSetting {
    /// Creates a setting from states and fields.
    ///
    /// # Errors
    ///
    /// Returns [`TrackerError::Validation`] if no state is declared and
    /// [`TrackerError::FieldExists`] if two fields share a name.
    pub fn new(state_specs: Vec<StateSpec>, field_specs: Vec<FieldSpec>) -> Result<Self> {
        if state_specs.is_empty() {
            return Err(TrackerError::Validation(
                "at least one issue state must be declared".to_string(),
            ));
        }

        let mut setting = Self {
            state_specs,
            field_specs: Vec::with_capacity(field_specs.len()),
        };
        for spec in field_specs {
            setting.add_field_spec(spec)?;
        }
        Ok(setting)
    }

    /// Name of the state new issues start in.
    pub fn initial_state(&self) -> Option<&str> {
        self.state_specs.first().map(|s| s.name.as_str())
    }

    /// Declared state specs, initial state first.
    pub fn state_specs(&self) -> &[StateSpec] {
        &self.state_specs
    }

    /// Returns true if `name` is a declared state.
    pub fn has_state(&self, name: &str) -> bool {
        self.state_specs.iter().any(|s| s.name == name)
    }

    /// Declared field specs in declaration order.
    pub fn field_specs(&self) -> &[FieldSpec] {
        &self.field_specs
    }

    /// Looks up a field spec by name.
    pub fn field_spec(&self, name: &str) -> Option<&FieldSpec> {
        self.field_specs.iter().find(|f| f.name == name)
    }

    /// Declares a new field.
    pub fn add_field_spec(&mut self, spec: FieldSpec) -> Result<()> {
        if self.field_spec(&spec.name).is_some() {
            return Err(TrackerError::FieldExists { name: spec.name });
        }
        self.field_specs.push(spec);
        Ok(())
    }

    /// Every `field::value` pair a choice field can take.
    pub fn field_value_choices(&self) -> Vec<String> {
        self.field_specs
            .iter()
            .filter(|f| f.kind == FieldKind::Choice)
            .flat_map(|f| f.choices.iter().map(move |c| format!("{}::{c}", f.name)))
            .collect()
    }
}

impl Default for IssueSetting {
    fn default() -> Self {
        Self {
            state_specs: vec![StateSpec::open("Open"), StateSpec::closed("Closed")],
            field_specs: vec![
                FieldSpec::choice("Type", ["Bug", "New Feature", "Task", "Improvement"]),
                FieldSpec::choice("Priority", ["Minor", "Normal", "Major", "Critical"]),
                FieldSpec::user("Assignees"),
            ],
        }
    }
}
