use std::fmt;

use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};

/// Group identifier used by the portal to scope saved sources.
pub type GroupId = i64;

/// Opaque source identifier: the portal returns strings, older fixtures use integers.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize)]
#[serde(untagged)]
pub enum SourceId {
    Int(i64),
    Text(String),
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceId::Int(id) => write!(f, "{id}"),
            SourceId::Text(id) => f.write_str(id),
        }
    }
}

impl From<&str> for SourceId {
    fn from(value: &str) -> Self {
        SourceId::Text(value.to_string())
    }
}

/// One saved source as returned by the list-sources endpoint.
///
/// Only the fields the enrichment reads are decoded; everything else the
/// portal sends is ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct SourceRecord {
    pub id: SourceId,
    pub ra: f64,
    pub dec: f64,
    #[serde(default)]
    pub t0: Option<Value>,
    #[serde(default)]
    pub altdata: Option<Value>,
    #[serde(default)]
    pub redshift: Option<f64>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub annotations: Vec<Annotation>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub classifications: Vec<Classification>,
}

impl SourceRecord {
    /// Minimal record at a sky position, used by callers that build records by hand.
    pub fn at(id: impl Into<SourceId>, ra: f64, dec: f64) -> Self {
        Self {
            id: id.into(),
            ra,
            dec,
            t0: None,
            altdata: None,
            redshift: None,
            annotations: Vec::new(),
            classifications: Vec::new(),
        }
    }

    /// The auxiliary data when it is a key-value mapping; scalars and arrays are ignored.
    pub fn altdata_map(&self) -> Option<&Map<String, Value>> {
        self.altdata.as_ref().and_then(Value::as_object)
    }
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Annotation {
    #[serde(default, deserialize_with = "null_as_default")]
    pub data: Map<String, Value>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
pub struct Classification {
    #[serde(default)]
    pub classification: Option<String>,
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Converts a loosely typed JSON value to a finite float.
///
/// Numbers and numeric strings convert; anything else, and NaN or infinities,
/// yield `None`.
pub fn finite_number(value: &Value) -> Option<f64> {
    let number = match value {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    number.is_finite().then_some(number)
}
