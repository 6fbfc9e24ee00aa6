//! Controller and line identities
//!
//! Controllers are named by a single capital letter ('A'..'Z'), which keeps
//! scenario wiring and log output readable. Lines carry free-form string
//! names ("L1", "bus0", ...).

use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::IdentityError;

/// Identity of one controller ('A'..'Z')
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ControllerId(pub char);

impl ControllerId {
    /// Create a new controller identity from a capital letter
    pub fn new(c: char) -> Option<Self> {
        if c.is_ascii_uppercase() {
            Some(Self(c))
        } else {
            None
        }
    }

    /// Generate all identities from 'A' to the given letter (inclusive)
    pub fn range_to(end: char) -> Vec<Self> {
        ('A'..=end).filter_map(Self::new).collect()
    }

    /// Get the underlying character
    pub fn as_char(&self) -> char {
        self.0
    }
}

impl Display for ControllerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ControllerId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => {
                Self::new(c).ok_or_else(|| IdentityError::InvalidController(s.to_string()))
            }
            _ => Err(IdentityError::InvalidController(s.to_string())),
        }
    }
}

/// Name of one shared line
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct LineName(pub String);

impl LineName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for LineName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for LineName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

impl From<String> for LineName {
    fn from(name: String) -> Self {
        Self(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_controller_id_creation() {
        assert!(ControllerId::new('A').is_some());
        assert!(ControllerId::new('Z').is_some());
        assert!(ControllerId::new('a').is_none());
        assert!(ControllerId::new('1').is_none());
    }

    #[test]
    fn test_controller_id_range() {
        let ids = ControllerId::range_to('C');
        assert_eq!(ids.len(), 3);
        assert_eq!(ids[0].as_char(), 'A');
        assert_eq!(ids[2].as_char(), 'C');
    }

    #[test]
    fn test_controller_id_parse() {
        assert_eq!("B".parse::<ControllerId>().unwrap(), ControllerId('B'));
        assert!("b".parse::<ControllerId>().is_err());
        assert!("AB".parse::<ControllerId>().is_err());
        assert!("".parse::<ControllerId>().is_err());
    }

    #[test]
    fn test_line_name_from() {
        let name: LineName = "L1".into();
        assert_eq!(name.as_str(), "L1");
        assert_eq!(name.to_string(), "L1");
    }
}
