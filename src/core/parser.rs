//! Recipe document parsing.
//!
//! A rendered recipe is a YAML mapping. The reserved `includes` key lists
//! other recipes; every other top-level key is a step declaration.

use super::error::RecipeError;
use super::types::{yaml_type_name, RecipeName};
use indexmap::IndexMap;
use serde_yaml_ng::Value;

/// Reserved key naming included recipes.
pub const INCLUDES_KEY: &str = "includes";

/// A parsed recipe document (untyped, order-preserving).
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecipeDocument {
    entries: IndexMap<String, Value>,
}

impl RecipeDocument {
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.entries.get(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Step declarations: every entry except `includes`.
    pub fn steps(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.entries.iter().filter(|(k, _)| k.as_str() != INCLUDES_KEY)
    }

    /// The recipes named under `includes`.
    ///
    /// An absent key is an empty list. Anything other than a list of strings
    /// is an error naming the offending type.
    pub fn includes(&self) -> Result<Vec<RecipeName>, RecipeError> {
        let Some(value) = self.entries.get(INCLUDES_KEY) else {
            return Ok(Vec::new());
        };
        let Value::Sequence(items) = value else {
            return Err(RecipeError::InvalidIncludes {
                found: yaml_type_name(value),
            });
        };
        items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(RecipeName::from(s.as_str())),
                other => Err(RecipeError::InvalidIncludes {
                    found: yaml_type_name(other),
                }),
            })
            .collect()
    }
}

/// Parse rendered recipe text. `name` is used in diagnostics only.
pub fn parse_document(name: &str, rendered: &str) -> Result<RecipeDocument, RecipeError> {
    let value: Value = serde_yaml_ng::from_str(rendered).map_err(|source| RecipeError::Parse {
        name: name.to_string(),
        source,
    })?;

    let mapping = match value {
        Value::Null => return Ok(RecipeDocument::default()),
        Value::Mapping(m) => m,
        other => {
            return Err(RecipeError::NotAMapping {
                name: name.to_string(),
                found: yaml_type_name(&other),
            })
        }
    };

    let mut entries = IndexMap::with_capacity(mapping.len());
    for (key, value) in mapping {
        match key {
            Value::String(k) => {
                entries.insert(k, value);
            }
            other => {
                return Err(RecipeError::NonStringKey {
                    name: name.to_string(),
                    found: yaml_type_name(&other),
                })
            }
        }
    }
    Ok(RecipeDocument { entries })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parser_includes_list() {
        let doc = parse_document(
            "web.nginx",
            r#"
includes:
  - common.base
  - common.users
nginx-pkg:
  file.absent:
    name: /tmp/x
"#,
        )
        .unwrap();
        let inc = doc.includes().unwrap();
        assert_eq!(
            inc,
            vec![RecipeName::from("common.base"), RecipeName::from("common.users")]
        );
        let steps: Vec<_> = doc.steps().map(|(k, _)| k.as_str()).collect();
        assert_eq!(steps, vec!["nginx-pkg"]);
    }

    #[test]
    fn test_parser_includes_absent() {
        let doc = parse_document("r", "step: {}\n").unwrap();
        assert!(doc.includes().unwrap().is_empty());
    }

    #[test]
    fn test_parser_includes_empty_list() {
        let doc = parse_document("r", "includes: []\n").unwrap();
        assert!(doc.includes().unwrap().is_empty());
        assert_eq!(doc.len(), 1);
    }

    #[test]
    fn test_parser_includes_not_a_list() {
        let doc = parse_document("r", "includes: common.base\n").unwrap();
        match doc.includes() {
            Err(RecipeError::InvalidIncludes { found }) => assert_eq!(found, "string"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parser_includes_non_string_item() {
        let doc = parse_document("r", "includes: [common.base, 42]\n").unwrap();
        match doc.includes() {
            Err(RecipeError::InvalidIncludes { found }) => assert_eq!(found, "number"),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_parser_includes_mapping() {
        let doc = parse_document("r", "includes: {a: b}\n").unwrap();
        assert!(matches!(
            doc.includes(),
            Err(RecipeError::InvalidIncludes { found: "mapping" })
        ));
    }

    #[test]
    fn test_parser_empty_document() {
        let doc = parse_document("r", "").unwrap();
        assert!(doc.is_empty());
        assert!(doc.includes().unwrap().is_empty());
    }

    #[test]
    fn test_parser_not_a_mapping() {
        let err = parse_document("r", "- a\n- b\n").unwrap_err();
        assert!(matches!(err, RecipeError::NotAMapping { found: "sequence", .. }));
    }

    #[test]
    fn test_parser_non_string_key() {
        let err = parse_document("r", "1: a\n").unwrap_err();
        assert!(matches!(err, RecipeError::NonStringKey { found: "number", .. }));
    }

    #[test]
    fn test_parser_invalid_yaml() {
        let err = parse_document("r", "not: [valid: yaml: {{").unwrap_err();
        assert!(matches!(err, RecipeError::Parse { .. }));
    }

    #[test]
    fn test_parser_preserves_order() {
        let doc = parse_document("r", "zeta: 1\nalpha: 2\nmid: 3\n").unwrap();
        let keys: Vec<_> = doc.steps().map(|(k, _)| k.clone()).collect();
        assert_eq!(keys, vec!["zeta", "alpha", "mid"]);
        let two: Value = serde_yaml_ng::from_str("2").unwrap();
        assert_eq!(doc.get("alpha"), Some(&two));
    }
}
