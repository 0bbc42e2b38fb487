//! JSON array sources (AOP-Wiki `aops.json`).

use anyhow::{Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

pub fn read_json_array<T: DeserializeOwned>(path: &Path) -> Result<Vec<T>> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    serde_json::from_reader(BufReader::new(file))
        .with_context(|| format!("{}: expected a JSON array", path.display()))
}

/// Numeric or string identifier, compared by its text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum JsonId {
    Number(u64),
    Text(String),
}

impl JsonId {
    pub fn text(&self) -> String {
        match self {
            JsonId::Number(n) => n.to_string(),
            JsonId::Text(s) => s.clone(),
        }
    }
}

/// One entry of `aops.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AopEntry {
    pub id: JsonId,
    pub title: String,
    #[serde(default)]
    pub short_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_numeric_and_string_ids() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("aops.json");
        std::fs::write(
            &path,
            r#"[{"id": 1, "title": "AhR activation", "short_name": "AhR"},
                {"id": "2", "title": "Second"}]"#,
        )
        .unwrap();
        let aops: Vec<AopEntry> = read_json_array(&path).unwrap();
        assert_eq!(aops[0].id.text(), "1");
        assert_eq!(aops[1].id.text(), "2");
        assert_eq!(aops[1].short_name, None);
    }

    #[test]
    fn missing_file_names_the_path() {
        let err = read_json_array::<AopEntry>(Path::new("/nonexistent/aops.json")).unwrap_err();
        assert!(err.to_string().contains("aops.json"));
    }
}
