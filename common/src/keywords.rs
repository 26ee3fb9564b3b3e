//! Keyword → category table
//!
//! Drives the keyword-category matching tier: when a keyword occurs inside a
//! normalized product name, only images filed under the mapped categories are
//! considered. The table is plain data; a custom one can be loaded from JSON
//! (`{"coffee": ["Coffee", "Beverages"], ...}`).

use crate::error::{Error, Result};
use crate::normalizer::normalize;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// One keyword and the categories it points at
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeywordRule {
    /// Normalized keyword
    pub keyword: String,
    /// Normalized category names
    pub categories: Vec<String>,
}

/// Ordered keyword table
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeywordTable {
    rules: Vec<KeywordRule>,
}

impl KeywordTable {
    /// Build from `(keyword, categories)` pairs. Keywords and categories are
    /// normalized; rules whose keyword normalizes to nothing are dropped.
    pub fn from_pairs<K, C, I>(pairs: I) -> Self
    where
        K: AsRef<str>,
        C: AsRef<str>,
        I: IntoIterator<Item = (K, Vec<C>)>,
    {
        let mut merged: BTreeMap<String, BTreeSet<String>> = BTreeMap::new();

        for (keyword, categories) in pairs {
            let keyword = normalize(keyword.as_ref());
            if keyword.is_empty() {
                continue;
            }
            let slot = merged.entry(keyword).or_default();
            for category in categories {
                let category = normalize(category.as_ref());
                if !category.is_empty() {
                    slot.insert(category);
                }
            }
        }

        let rules = merged
            .into_iter()
            .map(|(keyword, categories)| KeywordRule {
                keyword,
                categories: categories.into_iter().collect(),
            })
            .collect();

        Self { rules }
    }

    /// Parse a `{"keyword": ["Category", ...]}` document.
    pub fn from_json(json: &str) -> Result<Self> {
        Self::from_raw(serde_json::from_str(json)?)
    }

    /// Load a table from a JSON file. Errors carry the file path.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| Error::KeywordTableRead {
            path: path.to_path_buf(),
            source,
        })?;
        let raw = serde_json::from_str(&content).map_err(|source| Error::KeywordTableParse {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_raw(raw)
    }

    fn from_raw(raw: BTreeMap<String, Vec<String>>) -> Result<Self> {
        let table = Self::from_pairs(raw);
        if table.is_empty() {
            return Err(Error::EmptyKeywordTable);
        }
        Ok(table)
    }

    /// Built-in grocery table
    pub fn builtin() -> Self {
        Self::from_pairs(vec![
            ("coffee", vec!["Coffee", "Beverages"]),
            ("tea", vec!["Tea", "Beverages"]),
            ("juice", vec!["Juices", "Beverages"]),
            ("soda", vec!["Beverages", "Soft Drinks"]),
            ("malt", vec!["Beverages", "Soft Drinks"]),
            ("water", vec!["Beverages"]),
            ("rice", vec!["Rice & Grains"]),
            ("flour", vec!["Flour & Baking", "Baking"]),
            ("fufu", vec!["Flour & Baking", "African Foods"]),
            ("garri", vec!["Flour & Baking", "African Foods"]),
            ("plantain", vec!["Produce", "Frozen Foods"]),
            ("cassava", vec!["Produce", "Frozen Foods"]),
            ("yam", vec!["Produce", "Frozen Foods"]),
            ("frozen", vec!["Frozen Foods"]),
            ("sauce", vec!["Sauces & Condiments"]),
            ("ketchup", vec!["Sauces & Condiments"]),
            ("vinegar", vec!["Sauces & Condiments"]),
            ("jerk", vec!["Sauces & Condiments", "Spices & Seasonings"]),
            ("seasoning", vec!["Spices & Seasonings"]),
            ("curry", vec!["Spices & Seasonings"]),
            ("pepper", vec!["Spices & Seasonings", "Sauces & Condiments"]),
            ("oil", vec!["Oils"]),
            ("beans", vec!["Canned Goods", "Beans & Peas"]),
            ("peas", vec!["Canned Goods", "Beans & Peas"]),
            ("ackee", vec!["Canned Goods"]),
            ("saltfish", vec!["Seafood", "Frozen Foods"]),
            ("fish", vec!["Seafood", "Frozen Foods"]),
            ("chicken", vec!["Meat", "Frozen Foods"]),
            ("goat", vec!["Meat", "Frozen Foods"]),
            ("biscuit", vec!["Snacks"]),
            ("crackers", vec!["Snacks"]),
            ("chips", vec!["Snacks"]),
            ("candy", vec!["Snacks"]),
            ("soap", vec!["Household"]),
            ("hair", vec!["Beauty"]),
        ])
    }

    pub fn rules(&self) -> &[KeywordRule] {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rules whose keyword occurs as a substring of an already normalized name.
    pub fn matching_rules<'a>(&'a self, normalized_name: &'a str) -> impl Iterator<Item = &'a KeywordRule> + 'a {
        self.rules
            .iter()
            .filter(move |rule| !normalized_name.is_empty() && normalized_name.contains(&rule.keyword))
    }

    /// Union of the categories selected by the keywords found in the name.
    pub fn categories_for(&self, normalized_name: &str) -> BTreeSet<String> {
        self.matching_rules(normalized_name)
            .flat_map(|rule| rule.categories.iter().cloned())
            .collect()
    }

    /// How many keywords found in the name map to `category`.
    pub fn keyword_hits(&self, normalized_name: &str, category: &str) -> usize {
        let category = normalize(category);
        self.matching_rules(normalized_name)
            .filter(|rule| rule.categories.iter().any(|c| *c == category))
            .count()
    }
}
