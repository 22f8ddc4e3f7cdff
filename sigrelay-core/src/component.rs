//! Component names and the naming convention shared by actions and events.

use compact_str::CompactString;
use convert_case::{Case, Casing};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NameError {
    #[error("component name is empty")]
    Empty,
    #[error("component name must start with an uppercase letter: {0}")]
    NotCapitalized(String),
    #[error("component name {name} contains illegal character {found:?}")]
    IllegalCharacter { name: String, found: char },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ComponentKind {
    Action,
    Event,
}

impl ComponentKind {
    fn package(&self) -> &'static str {
        match self {
            ComponentKind::Action => "actions",
            ComponentKind::Event => "events",
        }
    }
}

impl std::fmt::Display for ComponentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ComponentKind::Action => f.write_str("action"),
            ComponentKind::Event => f.write_str("event"),
        }
    }
}

/// A validated PascalCase component name such as `BinanceFutures`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct ComponentName(CompactString);

impl ComponentName {
    const ILLEGAL: [char; 3] = ['_', ' ', '-'];

    pub fn parse(name: &str) -> Result<Self, NameError> {
        let first = name.chars().next().ok_or(NameError::Empty)?;
        if !first.is_uppercase() {
            return Err(NameError::NotCapitalized(name.to_string()));
        }
        if let Some(found) = name.chars().find(|c| Self::ILLEGAL.contains(c)) {
            return Err(NameError::IllegalCharacter {
                name: name.to_string(),
                found,
            });
        }
        Ok(Self(CompactString::from(name)))
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// `actions::binance_futures` for the action `BinanceFutures`.
    pub fn module_path(&self, kind: ComponentKind) -> String {
        format!("{}::{}", kind.package(), self.0.as_str().to_case(Case::Snake))
    }
}

impl std::fmt::Display for ComponentName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for ComponentName {
    type Err = NameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq<str> for ComponentName {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for ComponentName {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}
