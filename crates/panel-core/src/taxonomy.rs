//! Test categories and definitions.

use serde::{Deserialize, Serialize};

/// A grouping of tests ("Login", "Server Browser", "CM Friends", ...).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestCategory {
    /// Database id.
    pub id: i64,
    /// Display name.
    pub name: String,
    /// Position within the battery.
    pub sort_order: i64,
}

/// One entry in the test battery.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestDefinition {
    /// Stable key the tool reports against ("1" .. "28", with letter
    /// suffixes for split tests like "12a").
    pub test_key: String,
    /// Display name.
    pub name: String,
    /// What a passing run looks like.
    pub description: String,
    /// Owning category, if any.
    pub category_id: Option<i64>,
    /// Denormalized category name for API responses.
    #[serde(default = "uncategorized")]
    pub category_name: String,
    /// Position within the category.
    pub sort_order: i64,
    /// Disabled tests stay in the database but leave the battery.
    pub is_enabled: bool,
}

fn uncategorized() -> String {
    "Uncategorized".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_definition_deserializes_without_category_name() {
        let def: TestDefinition = serde_json::from_str(
            r#"{"test_key": "1", "name": "Install", "description": "Client installs",
                "category_id": null, "sort_order": 0, "is_enabled": true}"#,
        )
        .expect("valid definition");
        assert_eq!(def.category_name, "Uncategorized");
        assert!(def.category_id.is_none());
    }
}
