use serde::{Deserialize, Deserializer, Serialize};

use crate::identifier::{derive_id, is_blank_id};

/// One inventory record as seen by clients.
///
/// `quantidade` in the aggregated view is the sum over every row, in any
/// partition, that shares this `id`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StockItem {
    pub id: String,
    pub marca: String,
    pub modelo: String,
    pub tamanho: String,
    pub cor: String,
    pub quantidade: u64,
}

impl StockItem {
    /// The identifier derived from this item's descriptive fields.
    pub fn derived_id(&self) -> String {
        derive_id(&self.marca, &self.modelo, &self.tamanho, &self.cor)
    }
}

/// Payload of `addItem`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewItem {
    #[serde(default, deserialize_with = "deserialize_opt_text")]
    pub id: Option<String>,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub marca: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub modelo: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub tamanho: String,
    #[serde(default, deserialize_with = "deserialize_text")]
    pub cor: String,
    #[serde(default, deserialize_with = "deserialize_quantity")]
    pub quantidade: u64,
}

impl NewItem {
    pub fn new(
        marca: impl Into<String>,
        modelo: impl Into<String>,
        tamanho: impl Into<String>,
        cor: impl Into<String>,
        quantidade: u64,
    ) -> Self {
        Self {
            id: None,
            marca: marca.into(),
            modelo: modelo.into(),
            tamanho: tamanho.into(),
            cor: cor.into(),
            quantidade,
        }
    }

    /// The client-supplied id, or the derived one when it is absent or blank.
    pub fn effective_id(&self) -> String {
        match &self.id {
            Some(id) if !is_blank_id(id) => id.clone(),
            _ => derive_id(&self.marca, &self.modelo, &self.tamanho, &self.cor),
        }
    }

    /// Trimmed, case-folded descriptive tuple used for duplicate detection.
    pub(crate) fn match_key(&self) -> [String; 4] {
        [
            fold(&self.marca),
            fold(&self.modelo),
            fold(&self.tamanho),
            fold(&self.cor),
        ]
    }
}

/// Payload of `updateItem`. Fields other than `id` and `quantidade` are ignored.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuantityUpdate {
    #[serde(default, deserialize_with = "deserialize_text")]
    pub id: String,
    #[serde(default, deserialize_with = "deserialize_quantity")]
    pub quantidade: u64,
}

/// Payload of `deleteItem`. Only `id` takes part in the lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRef {
    #[serde(default, deserialize_with = "deserialize_text")]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deserialize_opt_text")]
    pub marca: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deserialize_opt_text")]
    pub modelo: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deserialize_opt_text")]
    pub tamanho: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none", deserialize_with = "deserialize_opt_text")]
    pub cor: Option<String>,
}

impl ItemRef {
    pub fn by_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Self::default()
        }
    }
}

impl From<&StockItem> for ItemRef {
    fn from(item: &StockItem) -> Self {
        Self {
            id: item.id.clone(),
            marca: Some(item.marca.clone()),
            modelo: Some(item.modelo.clone()),
            tamanho: Some(item.tamanho.clone()),
            cor: Some(item.cor.clone()),
        }
    }
}

pub(crate) fn fold(s: &str) -> String {
    s.trim().to_lowercase()
}

/// Coerce free text to a quantity.
///
/// Leading whitespace is skipped, then an optional sign and the leading run
/// of ASCII digits are read; trailing garbage is ignored. No digits gives 0,
/// and negative values clamp to 0.
pub fn parse_quantity(text: &str) -> u64 {
    let s = text.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    let end = digits
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(digits.len());
    if end == 0 || negative {
        return 0;
    }
    digits[..end].parse().unwrap_or(u64::MAX)
}

/// Coerce a floating point cell value to a quantity (truncating).
pub fn quantity_from_f64(n: f64) -> u64 {
    if n.is_finite() && n >= 1.0 {
        n.trunc() as u64
    } else {
        0
    }
}

/// Accept a JSON number, numeric string or null for `quantidade`.
pub fn deserialize_quantity<'de, D>(deserializer: D) -> Result<u64, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(match value {
        serde_json::Value::Number(n) => match n.as_u64() {
            Some(q) => q,
            None => n.as_f64().map(quantity_from_f64).unwrap_or(0),
        },
        serde_json::Value::String(s) => parse_quantity(&s),
        _ => 0,
    })
}

/// Render a scalar JSON value as text; null is `None`.
fn value_text(value: serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::Null => None,
        serde_json::Value::String(s) => Some(s),
        serde_json::Value::Number(n) if n.is_f64() => n.as_f64().map(|f| f.to_string()),
        other => Some(other.to_string()),
    }
}

/// Accept a string, number or boolean for a text field; null is empty.
pub fn deserialize_text<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_text(serde_json::Value::deserialize(deserializer)?).unwrap_or_default())
}

/// Like [`deserialize_text`] for optional fields.
pub fn deserialize_opt_text<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(value_text(serde_json::Value::deserialize(deserializer)?))
}
