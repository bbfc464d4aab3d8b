use crate::error::{Error, Result};
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer};
use std::borrow::Cow;
use std::collections::HashMap;

// =====
// Input
// =====

// {
//     "data": [
//         {
//             "id": "146_quant_rating",
//             "type": "metric",                      # or "ticker_metric_grade"
//             "attributes": { "value": 3.5, "meaningful": true },
//             "relationships": {
//                 "ticker": { "data": { "id": "146", "type": "ticker" } },
//                 "metric_type": { "data": { "id": "7", "type": "metric_type" } }
//             }
//         },
//         ...
//     ],
//     "included": [
//         { "id": "146", "type": "ticker", "attributes": { "slug": "aapl", "companyName": ... } },
//         { "id": "7", "type": "metric_type", "attributes": { "field": "quant_rating" } },
//         ...
//     ]
// }
#[derive(Clone, Debug, Default, Deserialize)]
pub struct MetricsResponse {
    #[serde(default)]
    pub data: Vec<MetricItem>,
    #[serde(default)]
    pub included: Vec<MetaItem>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MetricItem {
    #[serde(default, deserialize_with = "de_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Attributes,
    #[serde(default)]
    pub relationships: Relationships,
}

#[derive(Clone, Debug, Deserialize)]
pub struct MetaItem {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub attributes: Attributes,
}

#[derive(Clone, Debug, Default, Deserialize)]
pub struct Relationships {
    pub ticker: Option<Relationship>,
    pub metric_type: Option<Relationship>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct Relationship {
    pub data: Option<RelationshipData>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct RelationshipData {
    #[serde(deserialize_with = "de_id")]
    pub id: String,
}

impl Relationships {
    pub fn ticker_id(&self) -> Option<&str> {
        Self::id_of(&self.ticker)
    }

    pub fn metric_type_id(&self) -> Option<&str> {
        Self::id_of(&self.metric_type)
    }

    fn id_of(relationship: &Option<Relationship>) -> Option<&str> {
        relationship
            .as_ref()
            .and_then(|rel| rel.data.as_ref())
            .map(|data| data.id.as_str())
            .filter(|id| !id.is_empty())
    }
}

// screener
// -------------------------------------------------------------------------------------------------

// {
//     "data": [ { "id": "146", "type": "ticker", "attributes": { "slug": "aapl", ... } }, ... ],
//     "meta": { "count": 4213 }
// }
#[derive(Clone, Debug, Deserialize)]
pub struct ScreenerResponse {
    #[serde(default)]
    pub data: Vec<ScreenerItem>,
    pub meta: ScreenerMeta,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScreenerItem {
    pub attributes: ScreenerAttributes,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScreenerAttributes {
    pub slug: String,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ScreenerMeta {
    pub count: u64,
}

/// Identifiers arrive as strings, but occasionally as bare numbers.
fn de_id<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    struct IdVisitor;

    impl<'de> Visitor<'de> for IdVisitor {
        type Value = String;

        fn expecting(&self, formatter: &mut std::fmt::Formatter) -> std::fmt::Result {
            formatter.write_str("a string or integer identifier")
        }

        fn visit_str<E: de::Error>(self, v: &str) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> std::result::Result<String, E> {
            Ok(v.to_string())
        }
    }

    deserializer.deserialize_any(IdVisitor)
}

// attributes
// -------------------------------------------------------------------------------------------------

/// Loosely-typed attribute map of a payload entry.
#[derive(Clone, Debug, Default, Deserialize)]
#[serde(transparent)]
pub struct Attributes(HashMap<String, serde_json::Value>);

impl Attributes {
    pub fn get(&self, key: &str) -> AttrValue<'_> {
        match self.0.get(key) {
            None | Some(serde_json::Value::Null) => AttrValue::Absent,
            Some(serde_json::Value::Bool(b)) => AttrValue::Bool(*b),
            Some(serde_json::Value::Number(n)) => match n.as_f64() {
                Some(n) => AttrValue::Number(n),
                None => AttrValue::Str(Cow::Owned(n.to_string())),
            },
            Some(serde_json::Value::String(s)) => AttrValue::Str(Cow::Borrowed(s.as_str())),
            Some(other) => AttrValue::Str(Cow::Owned(other.to_string())),
        }
    }

    /// `true` only when the `meaningful` flag is present and set.
    pub fn is_meaningful(&self) -> bool {
        matches!(self.get("meaningful"), AttrValue::Bool(true))
    }
}

impl<K: Into<String>> FromIterator<(K, serde_json::Value)> for Attributes {
    fn from_iter<I: IntoIterator<Item = (K, serde_json::Value)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// A single dynamic attribute value.
#[derive(Clone, Debug, PartialEq)]
pub enum AttrValue<'a> {
    Absent,
    Bool(bool),
    Number(f64),
    Str(Cow<'a, str>),
}

impl AttrValue<'_> {
    pub fn type_name(&self) -> &'static str {
        match self {
            AttrValue::Absent => "absent",
            AttrValue::Bool(_) => "boolean",
            AttrValue::Number(_) => "number",
            AttrValue::Str(_) => "string",
        }
    }

    pub fn as_f64(&self, field: &str) -> Result<f64> {
        match self {
            AttrValue::Number(n) => Ok(*n),
            other => Err(other.mismatch(field, "f64")),
        }
    }

    pub fn as_f32(&self, field: &str) -> Result<f32> {
        self.as_f64(field)
            .map(|n| n as f32)
            .map_err(|_| self.mismatch(field, "f32"))
    }

    /// Whole-number coercion; fractional parts are truncated, non-finite values refused.
    pub fn as_i64(&self, field: &str) -> Result<i64> {
        match self {
            AttrValue::Number(n) if n.is_finite() => Ok(n.trunc() as i64),
            other => Err(other.mismatch(field, "i64")),
        }
    }

    pub fn as_bool(&self, field: &str) -> Result<bool> {
        match self {
            AttrValue::Bool(b) => Ok(*b),
            other => Err(other.mismatch(field, "bool")),
        }
    }

    pub fn as_str(&self, field: &str) -> Result<&str> {
        match self {
            AttrValue::Str(s) => Ok(s.as_ref()),
            other => Err(other.mismatch(field, "string")),
        }
    }

    fn mismatch(&self, field: &str, target: &'static str) -> Error {
        Error::FieldCoercionFailure {
            field: field.to_string(),
            found: self.type_name(),
            target,
        }
    }
}

//////////////////////////////////////////////////////////////
// -- TESTS --
//////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn payload_ids_accept_numbers_and_strings() {
        let payload: MetricsResponse = serde_json::from_value(json!({
            "data": [{
                "id": "1",
                "type": "metric",
                "attributes": { "value": 1.5, "meaningful": true },
                "relationships": {
                    "ticker": { "data": { "id": 12, "type": "ticker" } },
                    "metric_type": { "data": { "id": "A", "type": "metric_type" } }
                }
            }],
            "included": [{ "id": 12, "type": "ticker", "attributes": { "slug": "aapl" } }]
        }))
        .unwrap();

        let item = &payload.data[0];
        assert_eq!(item.relationships.ticker_id(), Some("12"));
        assert_eq!(item.relationships.metric_type_id(), Some("A"));
        assert_eq!(payload.included[0].id, "12");
    }

    #[test]
    fn missing_relationships_resolve_to_none() {
        let item: MetricItem = serde_json::from_value(json!({
            "id": "1",
            "type": "metric",
            "relationships": { "ticker": { "data": null } }
        }))
        .unwrap();
        assert_eq!(item.relationships.ticker_id(), None);
        assert_eq!(item.relationships.metric_type_id(), None);
    }

    #[test]
    fn coercion_never_defaults() {
        let attrs: Attributes = [
            ("value", json!("n/a")),
            ("grade", json!(2.0)),
            ("meaningful", json!("true")),
        ]
        .into_iter()
        .collect();

        assert!(matches!(
            attrs.get("value").as_f64("pe_ratio"),
            Err(Error::FieldCoercionFailure { found: "string", .. })
        ));
        assert!(matches!(
            attrs.get("missing").as_f32("pe_ratio"),
            Err(Error::FieldCoercionFailure { found: "absent", target: "f32", .. })
        ));
        assert_eq!(attrs.get("grade").as_f32("growth_category").unwrap(), 2.0);
        assert_eq!(attrs.get("grade").as_i64("shares").unwrap(), 2);
        // a stringly "true" is not a meaningful flag
        assert!(!attrs.is_meaningful());
    }

    #[test]
    fn screener_response_decodes() {
        let response: ScreenerResponse = serde_json::from_value(json!({
            "data": [
                { "id": "146", "type": "ticker", "attributes": { "slug": "aapl", "name": "AAPL" } },
                { "id": "1", "type": "ticker", "attributes": { "slug": "brk.b" } }
            ],
            "meta": { "count": 4213 }
        }))
        .unwrap();
        assert_eq!(response.meta.count, 4213);
        assert_eq!(response.data[1].attributes.slug, "brk.b");
    }
}
