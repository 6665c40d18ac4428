//! Coffee menu entries and property parsing.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

use crate::error::DomainError;

/// Name of the refreshable property holding the menu.
pub const COFFEES_PROPERTY: &str = "cart.coffees";

/// Separator between coffee names in the `cart.coffees` property.
pub const COFFEE_DELIMITER: char = ';';

/// A coffee on the menu.
///
/// Identity is the name: two coffees with the same name are equal regardless
/// of their storage id, and coffees sort lexicographically by name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Coffee {
    pub id: Option<i32>,
    pub name: String,
}

impl Coffee {
    /// Creates an unsaved coffee, trimming the name.
    pub fn new(name: impl AsRef<str>) -> Result<Self, DomainError> {
        let name = name.as_ref().trim();
        if name.is_empty() {
            return Err(DomainError::EmptyCoffeeName);
        }
        Ok(Self {
            id: None,
            name: name.to_string(),
        })
    }

    /// Returns a copy carrying the id assigned by the store.
    pub fn with_id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }
}

impl PartialEq for Coffee {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
    }
}

impl Eq for Coffee {}

impl Hash for Coffee {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
    }
}

impl PartialOrd for Coffee {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Coffee {
    fn cmp(&self, other: &Self) -> Ordering {
        self.name.cmp(&other.name)
    }
}

impl std::fmt::Display for Coffee {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.id {
            Some(id) => write!(f, "Coffee(id={id}, name={})", self.name),
            None => write!(f, "Coffee(name={})", self.name),
        }
    }
}

/// An immutable, name-ordered set of coffees.
pub type Menu = BTreeSet<Coffee>;

/// Parses the semicolon-delimited `cart.coffees` value into a menu.
///
/// Tokens are trimmed, empty tokens are dropped and duplicates collapse.
/// A missing or whitespace-only value yields [`DomainError::MenuConfigMissing`].
pub fn parse_coffees(raw: Option<&str>) -> Result<Menu, DomainError> {
    let raw = match raw {
        Some(value) if !value.trim().is_empty() => value,
        _ => {
            return Err(DomainError::MenuConfigMissing {
                property: COFFEES_PROPERTY,
            });
        }
    };

    Ok(raw
        .split(COFFEE_DELIMITER)
        .filter_map(|token| Coffee::new(token).ok())
        .collect())
}
