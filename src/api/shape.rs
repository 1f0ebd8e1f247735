//! Response-shape sniffing.
//!
//! The admin API is inconsistent about envelopes: a list may arrive as a bare
//! array, as `{ "categories": [...] }`, or as `{ "data": [...] }`; a single
//! record may be bare or wrapped. Nothing beyond "array or known wrapper key"
//! is checked here.

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::ApiError;

/// Generic wrapper keys tried after the resource-specific one.
const GENERIC_LIST_KEYS: &[&str] = &["data", "items", "results"];

/// Pull the list out of a response body.
///
/// Tries, in order: a bare array; `body[resource]`; each generic key; and the
/// same lookups one level down inside `body["data"]`.
pub(crate) fn extract_list(body: Value, resource: &str) -> Result<Vec<Value>, ApiError> {
    match body {
        Value::Array(items) => Ok(items),
        Value::Object(mut map) => {
            for key in std::iter::once(resource).chain(GENERIC_LIST_KEYS.iter().copied()) {
                match map.remove(key) {
                    Some(Value::Array(items)) => return Ok(items),
                    Some(nested @ Value::Object(_)) if key == "data" => {
                        return extract_list(nested, resource);
                    }
                    Some(other) => {
                        map.insert(key.to_owned(), other);
                    }
                    None => {}
                }
            }
            Err(ApiError::UnexpectedShape {
                resource: resource.to_owned(),
                found: describe(&Value::Object(map)),
            })
        }
        other => Err(ApiError::UnexpectedShape {
            resource: resource.to_owned(),
            found: describe(&other),
        }),
    }
}

/// Pull a single record out of a response body: `body[resource]`, `body["data"]`,
/// or the body itself when it is an object.
pub(crate) fn extract_record(body: Value, resource: &str) -> Result<Value, ApiError> {
    match body {
        Value::Object(mut map) => {
            for key in [resource, "data"] {
                if let Some(Value::Object(_)) = map.get(key) {
                    if let Some(record) = map.remove(key) {
                        return Ok(record);
                    }
                }
            }
            Ok(Value::Object(map))
        }
        other => Err(ApiError::UnexpectedShape {
            resource: resource.to_owned(),
            found: describe(&other),
        }),
    }
}

pub(crate) fn decode_list<T: DeserializeOwned>(body: Value, resource: &str) -> Result<Vec<T>, ApiError> {
    extract_list(body, resource)?
        .into_iter()
        .map(|item| {
            serde_json::from_value(item).map_err(|source| ApiError::Decode {
                resource: resource.to_owned(),
                source,
            })
        })
        .collect()
}

pub(crate) fn decode_record<T: DeserializeOwned>(body: Value, resource: &str) -> Result<T, ApiError> {
    let record = extract_record(body, resource)?;
    serde_json::from_value(record).map_err(|source| ApiError::Decode {
        resource: resource.to_owned(),
        source,
    })
}

/// Short description of a JSON value for error messages.
fn describe(value: &Value) -> String {
    match value {
        Value::Null => "null".to_owned(),
        Value::Bool(_) => "boolean".to_owned(),
        Value::Number(_) => "number".to_owned(),
        Value::String(_) => "string".to_owned(),
        Value::Array(_) => "array".to_owned(),
        Value::Object(map) => {
            let keys: Vec<&str> = map.keys().map(String::as_str).collect();
            format!("object with keys [{}]", keys.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_bare_array() {
        let items = extract_list(json!([1, 2]), "categories").unwrap();
        assert_eq!(items, vec![json!(1), json!(2)]);
    }

    #[test]
    fn test_resource_key_wins_over_generic_keys() {
        let body = json!({ "categories": [1], "data": [2] });
        assert_eq!(extract_list(body, "categories").unwrap(), vec![json!(1)]);
    }

    #[test]
    fn test_generic_wrapper_keys() {
        for key in ["data", "items", "results"] {
            let body = json!({ key: [{ "id": 1 }], "total": 1 });
            assert_eq!(extract_list(body, "products").unwrap().len(), 1, "key {key}");
        }
    }

    #[test]
    fn test_nested_under_data() {
        let body = json!({ "success": true, "data": { "subcategories": [1, 2, 3] } });
        assert_eq!(extract_list(body, "subcategories").unwrap().len(), 3);
    }

    #[test]
    fn test_unknown_shape_rejected() {
        let err = extract_list(json!({ "rows": [] }), "categories").unwrap_err();
        assert!(matches!(err, ApiError::UnexpectedShape { .. }));
        assert!(err.to_string().contains("rows"));

        assert!(extract_list(json!("nope"), "categories").is_err());
    }

    #[test]
    fn test_record_unwrapping() {
        let wrapped = json!({ "message": "created", "category": { "id": "1" } });
        assert_eq!(extract_record(wrapped, "category").unwrap(), json!({ "id": "1" }));

        let data = json!({ "data": { "id": "2" } });
        assert_eq!(extract_record(data, "category").unwrap(), json!({ "id": "2" }));

        let bare = json!({ "id": "3", "name": "x" });
        assert_eq!(extract_record(bare.clone(), "category").unwrap(), bare);
    }

    #[test]
    fn test_record_must_be_object() {
        assert!(extract_record(json!([]), "category").is_err());
    }
}
