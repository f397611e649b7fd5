//! # Entity Module
//!
//! Business records (pharmacies) identified only by name and address, and the
//! loader that reads them from a delimiter-separated table.
//!
//! The table is decoded with a configurable text encoding before it is handed
//! to the `csv` reader, because the source lists are commonly exported as
//! Windows-1252. Rows with an empty required field are dropped; the data-row
//! index of every remaining row becomes the entity id.

use encoding_rs::Encoding;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;
use tracing::{debug, warn};

use crate::error::Error as CrateError;
use crate::slug::entity_slug;

/// A business being researched
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Row index in the source table
    #[serde(alias = "_id")]
    pub id: usize,

    /// Business name
    pub name: String,

    /// Street and house number
    pub street: String,

    /// Postal code, kept as text to preserve leading zeros
    #[serde(alias = "zip")]
    pub postal_code: String,

    /// City
    pub city: String,
}

impl Entity {
    /// Create a new entity
    pub fn new(
        id: usize,
        name: impl Into<String>,
        street: impl Into<String>,
        postal_code: impl Into<String>,
        city: impl Into<String>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            street: street.into(),
            postal_code: postal_code.into(),
            city: city.into(),
        }
    }

    /// Filesystem-safe identifier, `slug(name)-slug(city)`
    pub fn slug(&self) -> String {
        entity_slug(&self.name, &self.city)
    }

    /// The four identifying fields, in validation order
    pub fn identifying_fields(&self) -> [&str; 4] {
        [&self.name, &self.street, &self.postal_code, &self.city]
    }
}

/// Error type for loading the entity table
#[derive(Debug, Error)]
pub enum InputError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Unknown text encoding: {0}")]
    UnknownEncoding(String),

    #[error("Missing column: {0}")]
    MissingColumn(&'static str),
}

impl From<InputError> for CrateError {
    fn from(err: InputError) -> Self {
        match err {
            InputError::Io(e) => CrateError::Io(e),
            _ => CrateError::Input(err.to_string()),
        }
    }
}

/// Options for reading the entity table
#[derive(Debug, Clone)]
pub struct InputOptions {
    /// Field delimiter
    pub delimiter: u8,

    /// WHATWG label of the file encoding, e.g. `windows-1252` or `utf-8`
    pub encoding: String,
}

impl Default for InputOptions {
    fn default() -> Self {
        Self {
            delimiter: b';',
            encoding: "windows-1252".to_string(),
        }
    }
}

/// Read every complete entity row from `path`
pub fn load_entities(path: &Path, options: &InputOptions) -> Result<Vec<Entity>, InputError> {
    let bytes = std::fs::read(path)?;
    parse_entities(&bytes, options)
}

/// Parse entity rows from raw table bytes
pub fn parse_entities(bytes: &[u8], options: &InputOptions) -> Result<Vec<Entity>, InputError> {
    let encoding = Encoding::for_label(options.encoding.as_bytes())
        .ok_or_else(|| InputError::UnknownEncoding(options.encoding.clone()))?;
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        warn!("Entity table contains bytes invalid in {}", encoding.name());
    }

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .flexible(true)
        .from_reader(text.as_bytes());

    let headers = reader.headers()?.clone();
    let column = |name: &'static str| {
        headers
            .iter()
            .position(|h| h.trim().eq_ignore_ascii_case(name))
            .ok_or(InputError::MissingColumn(name))
    };
    let name_col = column("name")?;
    let street_col = column("street")?;
    let zip_col = column("zip")?;
    let city_col = column("city")?;

    let mut entities = Vec::new();
    for (index, record) in reader.records().enumerate() {
        let record = record?;
        let field = |col: usize| record.get(col).map(str::trim).unwrap_or_default();

        let (name, street, zip, city) = (
            field(name_col),
            field(street_col),
            field(zip_col),
            field(city_col),
        );
        if [name, street, zip, city].iter().any(|f| f.is_empty()) {
            debug!("Skipping incomplete row {}", index);
            continue;
        }

        entities.push(Entity::new(index, name, street, zip, city));
    }

    Ok(entities)
}

/// Keep entities whose id lies in `start..=end`; `end` defaults to the last id
pub fn select_range(entities: Vec<Entity>, start: usize, end: Option<usize>) -> Vec<Entity> {
    entities
        .into_iter()
        .filter(|e| e.id >= start && end.is_none_or(|end| e.id <= end))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_windows_1252_table() {
        // 0xF6 is "ö" in Windows-1252
        let mut bytes = b"name;street;zip;city\n".to_vec();
        bytes.extend_from_slice(b"Apotheke am Markt;Hauptstr. 1;01234;K\xF6ln\n");
        bytes.extend_from_slice(b"Acme Pharmacy;1 Main St;12345;Springfield\n");

        let entities = parse_entities(&bytes, &InputOptions::default()).unwrap();
        assert_eq!(entities.len(), 2);
        assert_eq!(entities[0].city, "Köln");
        assert_eq!(entities[0].postal_code, "01234");
        assert_eq!(entities[1], Entity::new(1, "Acme Pharmacy", "1 Main St", "12345", "Springfield"));
    }

    #[test]
    fn test_incomplete_rows_are_dropped_but_keep_ids() {
        let table = "name;street;zip;city\nA;S;1;C\nB;;2;C\nD;S;3;C\n";
        let options = InputOptions {
            encoding: "utf-8".to_string(),
            ..Default::default()
        };
        let entities = parse_entities(table.as_bytes(), &options).unwrap();
        let ids: Vec<usize> = entities.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![0, 2]);
    }

    #[test]
    fn test_missing_column() {
        let options = InputOptions {
            encoding: "utf-8".to_string(),
            ..Default::default()
        };
        let result = parse_entities(b"name;street;city\nA;B;C\n", &options);
        assert!(matches!(result, Err(InputError::MissingColumn("zip"))));
    }

    #[test]
    fn test_unknown_encoding() {
        let options = InputOptions {
            encoding: "klingon".to_string(),
            ..Default::default()
        };
        let result = parse_entities(b"name;street;zip;city\n", &options);
        assert!(matches!(result, Err(InputError::UnknownEncoding(_))));
    }

    #[test]
    fn test_select_range_is_inclusive() {
        let entities: Vec<Entity> = (0..5).map(|i| Entity::new(i, "n", "s", "z", "c")).collect();
        let ids: Vec<usize> = select_range(entities.clone(), 1, Some(3))
            .iter()
            .map(|e| e.id)
            .collect();
        assert_eq!(ids, vec![1, 2, 3]);
        assert_eq!(select_range(entities, 3, None).len(), 2);
    }

    #[test]
    fn test_entity_slug_and_fields() {
        let entity = Entity::new(0, "Acme Pharmacy", "1 Main St", "12345", "Springfield");
        assert_eq!(entity.slug(), "acme-pharmacy-springfield");
        assert_eq!(entity.identifying_fields()[2], "12345");
    }
}
