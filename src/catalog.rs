//! Catalog document I/O
//!
//! The catalog is a JSON document holding an ordered list of products,
//! either as a bare array or wrapped in an object under `products`, `items`
//! or `catalog`. The layout and every field the engine does not own are
//! written back as they were read: key order per record, number text, and
//! records that could not be read at all.

use crate::error::{ReconError, Result};
use catalog_recon_common::{CatalogEntry, DecisionStatus, EntryOrigin, MatchDecision};
use serde_json::{Map, Value};
use std::path::Path;
use tracing::warn;

/// Keys probed, in order, when the document is an object.
const PRODUCT_KEYS: &[&str] = &["products", "items", "catalog"];

#[derive(Debug, Clone, PartialEq)]
pub enum CatalogLayout {
    /// `[ {...}, {...} ]`
    Array,
    /// `{ "products": [...], ...other fields }`; `document` keeps the other
    /// fields and the position of `key`.
    Wrapped { key: String, document: Map<String, Value> },
}

/// A product record that is not an object or whose known fields have the
/// wrong type. Reported as an error and written back untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct RejectedItem {
    /// Index in the product list
    pub position: usize,
    pub value: Value,
    pub reason: String,
}

impl RejectedItem {
    /// The record's `id` when it is a string or number, else `#position`.
    pub fn label(&self) -> String {
        match self.value.get("id") {
            Some(Value::String(id)) => id.clone(),
            Some(Value::Number(id)) => id.to_string(),
            _ => format!("#{}", self.position),
        }
    }

    pub fn decision(&self) -> MatchDecision {
        let name = self.value.get("name").and_then(Value::as_str).unwrap_or_default();
        MatchDecision::without_image(
            &self.label(),
            name,
            DecisionStatus::Error,
            format!("unreadable product record: {}", self.reason),
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CatalogDocument {
    pub layout: CatalogLayout,
    pub entries: Vec<CatalogEntry>,
    /// Unreadable records in position order
    pub rejected: Vec<RejectedItem>,
}

impl CatalogDocument {
    pub fn from_entries(entries: Vec<CatalogEntry>) -> Self {
        Self {
            layout: CatalogLayout::Array,
            entries,
            rejected: Vec::new(),
        }
    }

    /// Read and parse a catalog file. Both failures are fatal for a run.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ReconError::CatalogRead {
            path: path.display().to_string(),
            source,
        })?;

        Self::parse(&content).map_err(|reason| ReconError::CatalogParse {
            path: path.display().to_string(),
            reason,
        })
    }

    /// Parse a catalog. Only a document that is not JSON, or holds no
    /// product list, is an error; bad records end up in `rejected`.
    pub fn parse(content: &str) -> std::result::Result<Self, String> {
        let value: Value = serde_json::from_str(content).map_err(|e| e.to_string())?;

        match value {
            Value::Array(items) => Ok(Self::with_items(CatalogLayout::Array, items)),
            Value::Object(mut document) => {
                let key = PRODUCT_KEYS
                    .iter()
                    .find(|key| matches!(document.get(**key), Some(Value::Array(_))))
                    .ok_or_else(|| {
                        format!("expected an array or an object with one of {:?}", PRODUCT_KEYS)
                    })?
                    .to_string();

                // Leave the key in place so the rewrite keeps its position.
                let items = match document.insert(key.clone(), Value::Null) {
                    Some(Value::Array(items)) => items,
                    _ => Vec::new(),
                };

                Ok(Self::with_items(CatalogLayout::Wrapped { key, document }, items))
            }
            other => Err(format!("expected an array of products, found {}", json_kind(&other))),
        }
    }

    fn with_items(layout: CatalogLayout, items: Vec<Value>) -> Self {
        let mut entries = Vec::with_capacity(items.len());
        let mut rejected = Vec::new();

        for (position, item) in items.into_iter().enumerate() {
            match read_entry(position, &item) {
                Ok(entry) => entries.push(entry),
                Err(reason) => {
                    warn!(position, reason = %reason, "unreadable product record kept as is");
                    rejected.push(RejectedItem {
                        position,
                        value: item,
                        reason,
                    });
                }
            }
        }

        Self {
            layout,
            entries,
            rejected,
        }
    }

    /// Decisions for the rejected records, for merging into a run's decisions.
    pub fn rejected_decisions(&self) -> impl Iterator<Item = (usize, MatchDecision)> + '_ {
        self.rejected.iter().map(|item| (item.position, item.decision()))
    }

    /// Product list with rejected records back at their positions.
    fn items(&self) -> serde_json::Result<Vec<Value>> {
        let mut items = Vec::with_capacity(self.entries.len() + self.rejected.len());
        let mut rejected = self.rejected.iter().peekable();

        for entry in &self.entries {
            let position = entry.origin.as_ref().map_or(usize::MAX, |o| o.position);
            while let Some(item) = rejected.next_if(|r| r.position < position) {
                items.push(item.value.clone());
            }
            items.push(entry_value(entry)?);
        }
        items.extend(rejected.map(|r| r.value.clone()));

        Ok(items)
    }

    pub fn to_value(&self) -> serde_json::Result<Value> {
        let entries = Value::Array(self.items()?);
        Ok(match &self.layout {
            CatalogLayout::Array => entries,
            CatalogLayout::Wrapped { key, document } => {
                let mut document = document.clone();
                document.insert(key.clone(), entries);
                Value::Object(document)
            }
        })
    }

    /// Pretty JSON with a trailing newline.
    pub fn to_json(&self) -> serde_json::Result<String> {
        let mut json = serde_json::to_string_pretty(&self.to_value()?)?;
        json.push('\n');
        Ok(json)
    }

    /// Readable entries; rejected records are not counted.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn read_entry(position: usize, item: &Value) -> std::result::Result<CatalogEntry, String> {
    let Value::Object(fields) = item else {
        return Err(format!("product #{} is {}, not an object", position, json_kind(item)));
    };

    let mut entry: CatalogEntry =
        serde_json::from_value(item.clone()).map_err(|e| format!("product #{}: {}", position, e))?;
    entry.origin = Some(EntryOrigin {
        position,
        field_order: fields.keys().cloned().collect(),
    });
    Ok(entry)
}

/// Serialize an entry with its keys in the order they were read. Keys the
/// record did not have before (a newly attached `image`) go last.
fn entry_value(entry: &CatalogEntry) -> serde_json::Result<Value> {
    let fields = match serde_json::to_value(entry)? {
        Value::Object(fields) => fields,
        other => return Ok(other),
    };
    let Some(origin) = entry.origin.as_ref() else {
        return Ok(Value::Object(fields));
    };

    let mut ordered = Map::with_capacity(fields.len());
    for key in &origin.field_order {
        if let Some(value) = fields.get(key) {
            ordered.insert(key.clone(), value.clone());
        }
    }
    for (key, value) in fields {
        if !ordered.contains_key(&key) {
            ordered.insert(key, value);
        }
    }
    Ok(Value::Object(ordered))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use catalog_recon_common::EntryId;
    use tempfile::tempdir;

    #[test]
    fn test_parse_array_layout() {
        let doc = CatalogDocument::parse(r#"[{"id":1,"name":"Yam"},{"id":"2","name":"Cassava"}]"#).unwrap();
        assert_eq!(doc.layout, CatalogLayout::Array);
        assert_eq!(doc.len(), 2);
        assert_eq!(doc.entries[0].id, Some(EntryId::Number(1)));
        assert_eq!(doc.entries[1].id, Some(EntryId::Text("2".into())));
    }

    #[test]
    fn test_wrapped_layout_round_trip_keeps_key_order() {
        let json = r#"{"version":3,"products":[{"id":"1","name":"Yam"}],"updatedAt":"2026-01-01"}"#;
        let doc = CatalogDocument::parse(json).unwrap();
        assert!(matches!(&doc.layout, CatalogLayout::Wrapped { key, .. } if key == "products"));

        let value = doc.to_value().unwrap();
        let keys: Vec<&String> = value.as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["version", "products", "updatedAt"]);
        assert_eq!(value["products"][0]["name"], "Yam");
    }

    #[test]
    fn test_missing_name_is_not_a_parse_error() {
        let doc = CatalogDocument::parse(r#"[{"id":"1"}]"#).unwrap();
        assert_eq!(doc.entries[0].name, None);
    }

    #[test]
    fn test_unreadable_products_are_kept_raw() {
        let json = r#"[{"id":"1","name":"Yam"}, 42, {"id":2,"name":42}, {"id":3,"images":"x.jpg"}, {"id":"4","name":"Cassava"}]"#;
        let doc = CatalogDocument::parse(json).unwrap();

        assert_eq!(doc.len(), 2);
        let positions: Vec<usize> = doc.rejected.iter().map(|r| r.position).collect();
        assert_eq!(positions, vec![1, 2, 3]);
        assert!(doc.rejected[0].reason.contains("not an object"));
        assert_eq!(doc.rejected[0].label(), "#1");
        assert_eq!(doc.rejected[1].label(), "2");

        let decision = doc.rejected[1].decision();
        assert_eq!(decision.status, DecisionStatus::Error);
        assert!(decision.rationale.starts_with("unreadable product record"));

        // Written back untouched and in place
        let original: Value = serde_json::from_str(json).unwrap();
        assert_eq!(doc.to_value().unwrap(), original);
    }

    #[test]
    fn test_rejected_records_stay_put_when_entries_are_dropped() {
        let json = r#"[{"id":1,"name":"Yam"},{"id":2,"name":"Yam"},"junk",{"id":3,"name":"Ackee"}]"#;
        let mut doc = CatalogDocument::parse(json).unwrap();
        doc.entries.remove(1);

        let value = doc.to_value().unwrap();
        assert_eq!(value, serde_json::json!([{"id":1,"name":"Yam"},"junk",{"id":3,"name":"Ackee"}]));
    }

    #[test]
    fn test_rewrite_keeps_key_order_and_number_text() {
        let json = r#"[{"price":4.10,"id":"5","sku":"ACV-500","name":"Apple Cider Vinegar","image":"/old.jpg"}]"#;
        let mut doc = CatalogDocument::parse(json).unwrap();
        doc.entries[0].set_sole_image("/images/New/Apple Cider Vinegar.jpg".into());

        let value = doc.to_value().unwrap();
        let keys: Vec<&String> = value[0].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["price", "id", "sku", "name", "image"]);

        let text = doc.to_json().unwrap();
        assert!(text.contains(r#""price": 4.10"#));
    }

    #[test]
    fn test_attached_field_goes_last() {
        let mut doc = CatalogDocument::parse(r#"[{"name":"Yam","id":1,"unit":"lb"}]"#).unwrap();
        doc.entries[0].set_sole_image("/images/Produce/Yam.jpg".into());

        let value = doc.to_value().unwrap();
        let keys: Vec<&String> = value[0].as_object().unwrap().keys().collect();
        assert_eq!(keys, vec!["name", "id", "unit", "image"]);
    }

    #[test]
    fn test_object_without_products_is_rejected() {
        assert!(CatalogDocument::parse(r#"{"version":1}"#).is_err());
        assert!(CatalogDocument::parse("\"just a string\"").is_err());
    }

    #[test]
    fn test_load_reports_read_and_parse_errors() {
        let dir = tempdir().unwrap();
        let missing = CatalogDocument::load(&dir.path().join("missing.json"));
        assert!(matches!(missing, Err(ReconError::CatalogRead { .. })));

        let broken = dir.path().join("broken.json");
        std::fs::write(&broken, "{ not json").unwrap();
        assert!(matches!(CatalogDocument::load(&broken), Err(ReconError::CatalogParse { .. })));
    }

    #[test]
    fn test_to_json_ends_with_newline() {
        let doc = CatalogDocument::from_entries(vec![CatalogEntry::new("1", "Yam")]);
        let json = doc.to_json().unwrap();
        assert!(json.ends_with("]\n"));

        let parsed = CatalogDocument::parse(&json).unwrap();
        assert_eq!(parsed.entries[0].id, doc.entries[0].id);
        assert_eq!(parsed.entries[0].name, doc.entries[0].name);
        assert!(parsed.rejected.is_empty());
    }
}
