use serde_json::Value;
use shared::NUTRITION_PLACEHOLDER;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum NutritionError {
    #[error("Failed to read nutrition data {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("Malformed nutrition data: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Nutrition data must be a JSON array of records")]
    NotAnArray,
}

/// Read-only lookup from food label to its nutrition record.
#[derive(Debug, Clone, Default)]
pub struct NutritionStore {
    records: HashMap<String, Value>,
}

impl NutritionStore {
    /// Loads the document at `path`. A missing file gives an empty store.
    pub fn load(path: &Path) -> Result<Self, NutritionError> {
        let contents = match std::fs::read_to_string(path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::error!(
                    "Nutrition data {} not found; every lookup will return the placeholder",
                    path.display()
                );
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(NutritionError::Read {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };
        Self::from_json(&contents)
    }

    /// Indexes an array of records by their `name` field. Later duplicates win.
    pub fn from_json(contents: &str) -> Result<Self, NutritionError> {
        let document: Value = serde_json::from_str(contents)?;
        let Value::Array(items) = document else {
            return Err(NutritionError::NotAnArray);
        };

        let mut records = HashMap::with_capacity(items.len());
        for item in items {
            match item.get("name").and_then(Value::as_str) {
                Some(name) => {
                    records.insert(name.to_string(), item.clone());
                }
                None => log::warn!("Skipping nutrition record without a name: {}", item),
            }
        }
        log::info!("Loaded {} nutrition records", records.len());
        Ok(Self { records })
    }

    pub fn get(&self, label: &str) -> Option<&Value> {
        self.records.get(label)
    }

    /// The stored record for `label`, or the placeholder string.
    pub fn record_or_placeholder(&self, label: &str) -> Value {
        self.get(label)
            .cloned()
            .unwrap_or_else(|| Value::String(NUTRITION_PLACEHOLDER.to_string()))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const DOCUMENT: &str = r#"[
        {"name": "pizza", "calories": 266, "protein": 11},
        {"name": "sushi", "calories": 150},
        {"calories": 10},
        {"name": "pizza", "calories": 285}
    ]"#;

    #[test]
    fn known_label_returns_stored_record() {
        let store = NutritionStore::from_json(DOCUMENT).unwrap();
        assert_eq!(store.len(), 2);
        assert_eq!(
            store.record_or_placeholder("sushi"),
            json!({"name": "sushi", "calories": 150})
        );
    }

    #[test]
    fn duplicate_names_keep_the_last_record() {
        let store = NutritionStore::from_json(DOCUMENT).unwrap();
        assert_eq!(store.get("pizza").unwrap()["calories"], json!(285));
    }

    #[test]
    fn absent_label_returns_placeholder() {
        let store = NutritionStore::from_json(DOCUMENT).unwrap();
        assert_eq!(
            store.record_or_placeholder("waffles"),
            json!("Details not found.")
        );
        assert_eq!(
            NutritionStore::default().record_or_placeholder("pizza"),
            json!(NUTRITION_PLACEHOLDER)
        );
    }

    #[test]
    fn missing_file_yields_empty_store() {
        let dir = tempfile::tempdir().unwrap();
        let store = NutritionStore::load(&dir.path().join("food_data.json")).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn malformed_document_is_an_error() {
        assert!(matches!(
            NutritionStore::from_json("{not json"),
            Err(NutritionError::Parse(_))
        ));
        assert!(matches!(
            NutritionStore::from_json(r#"{"name": "pizza"}"#),
            Err(NutritionError::NotAnArray)
        ));
    }

    #[test]
    fn load_reads_file_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("food_data.json");
        std::fs::write(&path, DOCUMENT).unwrap();
        let store = NutritionStore::load(&path).unwrap();
        assert!(store.get("sushi").is_some());
    }
}
