use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ============================================================================
// Records returned by the API
// ============================================================================

/// A top-level product category.
///
/// Field names are accepted in both snake_case and the camelCase the admin API
/// emits; ids may arrive as strings, numbers or `_id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawCategory")]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// A subcategory belonging to exactly one [`Category`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawSubcategory")]
pub struct Subcategory {
    pub id: String,
    pub name: String,
    /// Parent id. The API may send a bare id or a populated category object.
    pub category_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

/// The slice of a product the category screen cares about.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawProduct")]
pub struct Product {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
}

// ============================================================================
// Wire shapes
// ============================================================================

// Records can carry both spellings of a field (`_id` next to `id`, or
// `categoryId` next to a populated `category`). Serde aliases reject that as a
// duplicate field, so every spelling gets its own slot and the first present
// one wins.

#[derive(Deserialize)]
struct RawCategory {
    #[serde(rename = "_id")]
    mongo_id: Option<Value>,
    id: Option<Value>,
    name: String,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "isActive")]
    is_active_camel: Option<bool>,
    is_active: Option<bool>,
    #[serde(rename = "createdAt")]
    created_at_camel: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RawSubcategory {
    #[serde(rename = "_id")]
    mongo_id: Option<Value>,
    id: Option<Value>,
    name: String,
    #[serde(rename = "categoryId")]
    category_id_camel: Option<Value>,
    category_id: Option<Value>,
    category: Option<Value>,
    #[serde(default)]
    description: Option<String>,
    #[serde(rename = "isActive")]
    is_active_camel: Option<bool>,
    is_active: Option<bool>,
    #[serde(rename = "createdAt")]
    created_at_camel: Option<DateTime<Utc>>,
    created_at: Option<DateTime<Utc>>,
}

#[derive(Deserialize)]
struct RawProduct {
    #[serde(rename = "_id")]
    mongo_id: Option<Value>,
    id: Option<Value>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    price: Option<f64>,
}

impl TryFrom<RawCategory> for Category {
    type Error = String;

    fn try_from(raw: RawCategory) -> Result<Self, Self::Error> {
        Ok(Self {
            id: first_id("id", [raw.mongo_id, raw.id])?,
            name: raw.name,
            description: raw.description,
            is_active: raw.is_active_camel.or(raw.is_active).unwrap_or(true),
            created_at: raw.created_at_camel.or(raw.created_at),
        })
    }
}

impl TryFrom<RawSubcategory> for Subcategory {
    type Error = String;

    fn try_from(raw: RawSubcategory) -> Result<Self, Self::Error> {
        Ok(Self {
            id: first_id("id", [raw.mongo_id, raw.id])?,
            name: raw.name,
            category_id: first_id(
                "category id",
                [raw.category_id_camel, raw.category_id, raw.category],
            )?,
            description: raw.description,
            is_active: raw.is_active_camel.or(raw.is_active).unwrap_or(true),
            created_at: raw.created_at_camel.or(raw.created_at),
        })
    }
}

impl TryFrom<RawProduct> for Product {
    type Error = String;

    fn try_from(raw: RawProduct) -> Result<Self, Self::Error> {
        Ok(Self {
            id: first_id("id", [raw.mongo_id, raw.id])?,
            name: raw.name,
            price: raw.price,
        })
    }
}

// ============================================================================
// Request bodies
// ============================================================================

/// Body for creating or updating a category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
}

/// Body for creating or updating a subcategory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubcategoryDraft {
    pub name: String,
    pub category_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_active: bool,
}

impl From<&Category> for CategoryDraft {
    fn from(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            description: category.description.clone(),
            is_active: category.is_active,
        }
    }
}

impl From<&Subcategory> for SubcategoryDraft {
    fn from(subcategory: &Subcategory) -> Self {
        Self {
            name: subcategory.name.clone(),
            category_id: subcategory.category_id.clone(),
            description: subcategory.description.clone(),
            is_active: subcategory.is_active,
        }
    }
}

/// Decode the first present candidate. `null` counts as absent.
fn first_id<const N: usize>(field: &str, candidates: [Option<Value>; N]) -> Result<String, String> {
    let value = candidates
        .into_iter()
        .flatten()
        .find(|v| !v.is_null())
        .ok_or_else(|| format!("missing {field}"))?;
    id_from_value(&value).ok_or_else(|| format!("invalid {field}: {value}"))
}

/// Accept `"abc"`, `42`, or `{ "_id": ... }` / `{ "id": ... }` as an id.
fn id_from_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => map.get("_id").or_else(|| map.get("id")).and_then(id_from_value),
        _ => None,
    }
}
