//! Full-factorial product profile space.
//!
//! A catalog lists attributes in a fixed order, each with an ordered list of
//! levels. Enumeration walks the Cartesian product with the first attribute
//! as the outermost loop and the last attribute as the innermost, so the
//! resulting profile IDs are stable across runs.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Largest full factorial a catalog may describe.
pub const MAX_PROFILES: usize = 1_000_000;

// =============================================================================
// Catalog
// =============================================================================

/// One attribute axis and its allowed levels.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    pub name: String,
    pub levels: Vec<String>,
}

impl Attribute {
    pub fn new<I, S>(name: impl Into<String>, levels: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            levels: levels.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ordered attribute catalog. Axis order determines enumeration order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributeCatalog {
    pub attributes: Vec<Attribute>,
}

impl AttributeCatalog {
    pub fn new(attributes: Vec<Attribute>) -> Self {
        Self { attributes }
    }

    /// The laptop catalog used by the survey: 2×3×2×3×3 = 108 profiles.
    pub fn laptops() -> Self {
        Self::new(vec![
            Attribute::new("Brand", ["Dell", "Apple"]),
            Attribute::new("Price", ["$800", "$1200", "$1600"]),
            Attribute::new("Size", ["13-inch", "15-inch"]),
            Attribute::new("RAM", ["8GB", "16GB", "32GB"]),
            Attribute::new("Storage", ["256GB", "512GB", "1TB"]),
        ])
    }

    /// Load a catalog from a JSON file and check its size.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog: Self = serde_json::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// Reject catalogs whose full factorial exceeds [`MAX_PROFILES`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        match self.profile_count() {
            Some(n) if n <= MAX_PROFILES => Ok(()),
            _ => Err(ConfigError::Invalid(format!(
                "catalog describes more than {MAX_PROFILES} profiles"
            ))),
        }
    }

    /// Number of profiles in the full factorial, or `None` on overflow.
    pub fn profile_count(&self) -> Option<usize> {
        if self.attributes.is_empty() {
            return Some(0);
        }
        self.attributes
            .iter()
            .try_fold(1usize, |acc, a| acc.checked_mul(a.levels.len()))
    }
}

// =============================================================================
// Profiles
// =============================================================================

/// A fully specified product configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
    pub id: String,
    /// `(attribute name, level)` in catalog order.
    pub values: Vec<(String, String)>,
}

impl Profile {
    /// Level of the named attribute, if the profile has it.
    pub fn value(&self, attribute: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(name, _)| name == attribute)
            .map(|(_, level)| level.as_str())
    }
}

/// Enumerate every combination of levels.
///
/// The first attribute varies slowest and the last fastest. IDs are `P1..Pn`
/// in that order. An empty catalog, or any attribute with no levels, yields
/// no profiles. So does a catalog too large to count; `from_path` rejects those.
pub fn generate_profiles(catalog: &AttributeCatalog) -> Vec<Profile> {
    let total = catalog.profile_count().unwrap_or(0);
    let mut profiles = Vec::with_capacity(total);

    // Odometer over level indices; the last axis ticks first.
    let mut cursor = vec![0usize; catalog.attributes.len()];
    for n in 0..total {
        let values = catalog
            .attributes
            .iter()
            .zip(&cursor)
            .map(|(attr, &i)| (attr.name.clone(), attr.levels[i].clone()))
            .collect();
        profiles.push(Profile {
            id: format!("P{}", n + 1),
            values,
        });

        for (axis, attr) in catalog.attributes.iter().enumerate().rev() {
            cursor[axis] += 1;
            if cursor[axis] < attr.levels.len() {
                break;
            }
            cursor[axis] = 0;
        }
    }

    profiles
}

/// Enumerated profiles of a catalog, addressable by ID.
#[derive(Debug, Clone)]
pub struct ProfileSpace {
    profiles: Vec<Profile>,
}

impl ProfileSpace {
    pub fn new(catalog: AttributeCatalog) -> Self {
        Self {
            profiles: generate_profiles(&catalog),
        }
    }

    pub fn profiles(&self) -> &[Profile] {
        &self.profiles
    }

    pub fn ids(&self) -> Vec<&str> {
        self.profiles.iter().map(|p| p.id.as_str()).collect()
    }

    pub fn get(&self, id: &str) -> Option<&Profile> {
        self.profiles.iter().find(|p| p.id == id)
    }

    pub fn len(&self) -> usize {
        self.profiles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.profiles.is_empty()
    }
}
