//! Typed extraction of step parameters.

use super::error::CookError;
use super::types::{yaml_type_name, Params};
use serde_yaml_ng::Value;

/// Read-only view over a step's parameters with typed accessors.
///
/// Required keys that are absent, empty or mistyped yield the caller's
/// sentinel error. Optional keys that are present with the wrong type yield
/// `InvalidParam`; an explicit `null` counts as absent.
#[derive(Debug, Clone, Copy)]
pub struct ParamReader<'a> {
    params: &'a Params,
}

impl<'a> ParamReader<'a> {
    pub fn new(params: &'a Params) -> Self {
        Self { params }
    }

    /// Raw value of a key, with `null` treated as absent.
    pub fn raw(&self, key: &str) -> Option<&'a Value> {
        match self.params.get(key) {
            Some(Value::Null) | None => None,
            Some(v) => Some(v),
        }
    }

    pub fn required_str(&self, key: &str, sentinel: CookError) -> Result<&'a str, CookError> {
        match self.raw(key) {
            Some(Value::String(s)) if !s.is_empty() => Ok(s.as_str()),
            _ => Err(sentinel),
        }
    }

    pub fn optional_str(&self, key: &str) -> Result<Option<&'a str>, CookError> {
        match self.raw(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.as_str())),
            Some(other) => Err(invalid(key, "string", other)),
        }
    }

    pub fn optional_bool(&self, key: &str) -> Result<Option<bool>, CookError> {
        match self.raw(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(other) => Err(invalid(key, "bool", other)),
        }
    }

    /// A bool that defaults to false.
    pub fn flag(&self, key: &str) -> Result<bool, CookError> {
        Ok(self.optional_bool(key)?.unwrap_or(false))
    }

    pub fn optional_str_list(&self, key: &str) -> Result<Option<Vec<&'a str>>, CookError> {
        let Some(value) = self.raw(key) else {
            return Ok(None);
        };
        let Value::Sequence(items) = value else {
            return Err(invalid(key, "[]string", value));
        };
        items
            .iter()
            .map(|item| match item {
                Value::String(s) => Ok(s.as_str()),
                other => Err(invalid(key, "[]string", other)),
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Some)
    }
}

fn invalid(key: &str, expected: &'static str, found: &Value) -> CookError {
    CookError::InvalidParam {
        key: key.to_string(),
        expected,
        found: yaml_type_name(found),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(yaml: &str) -> Params {
        serde_yaml_ng::from_str(yaml).unwrap()
    }

    #[test]
    fn test_params_required_str() {
        let p = params("name: /tmp/x\nempty: ''\nnum: 3\n");
        let r = ParamReader::new(&p);
        assert_eq!(r.required_str("name", CookError::MissingName).unwrap(), "/tmp/x");
        assert!(matches!(
            r.required_str("empty", CookError::MissingName),
            Err(CookError::MissingName)
        ));
        assert!(matches!(
            r.required_str("num", CookError::MissingName),
            Err(CookError::MissingName)
        ));
        assert!(matches!(
            r.required_str("absent", CookError::MissingSource),
            Err(CookError::MissingSource)
        ));
    }

    #[test]
    fn test_params_optional_str() {
        let p = params("user: www\nnothing: null\nbad: [1]\n");
        let r = ParamReader::new(&p);
        assert_eq!(r.optional_str("user").unwrap(), Some("www"));
        assert_eq!(r.optional_str("nothing").unwrap(), None);
        assert_eq!(r.optional_str("absent").unwrap(), None);
        match r.optional_str("bad") {
            Err(CookError::InvalidParam { key, expected, found }) => {
                assert_eq!(key, "bad");
                assert_eq!(expected, "string");
                assert_eq!(found, "sequence");
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[test]
    fn test_params_bool_and_flag() {
        let p = params("recurse: true\nmakedirs: false\nbad: yes-please\n");
        let r = ParamReader::new(&p);
        assert_eq!(r.optional_bool("recurse").unwrap(), Some(true));
        assert!(!r.flag("makedirs").unwrap());
        assert!(!r.flag("absent").unwrap());
        assert!(r.flag("bad").is_err());
    }

    #[test]
    fn test_params_str_list() {
        let p = params("text: [a, b]\nmixed: [a, 1]\nscalar: a\n");
        let r = ParamReader::new(&p);
        assert_eq!(r.optional_str_list("text").unwrap(), Some(vec!["a", "b"]));
        assert_eq!(r.optional_str_list("absent").unwrap(), None);
        assert!(matches!(
            r.optional_str_list("mixed"),
            Err(CookError::InvalidParam { found: "number", .. })
        ));
        assert!(matches!(
            r.optional_str_list("scalar"),
            Err(CookError::InvalidParam { found: "string", .. })
        ));
    }
}
