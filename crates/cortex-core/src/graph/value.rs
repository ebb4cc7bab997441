//! Driver-native values and their normalization into plain JSON rows

use serde_json::{Map, Number, Value};

/// A normalized result row keyed by the query's RETURN aliases
pub type Row = Map<String, Value>;

/// Query parameters
pub type Params = Map<String, Value>;

/// A value as returned by a graph driver session, before normalization
#[derive(Debug, Clone, PartialEq)]
pub enum StoreValue {
    Node(NodeValue),
    Relationship(RelationshipValue),
    List(Vec<StoreValue>),
    Map(Vec<(String, StoreValue)>),
    Scalar(ScalarValue),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Null,
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct NodeValue {
    pub id: String,
    pub labels: Vec<String>,
    pub properties: Vec<(String, StoreValue)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RelationshipValue {
    pub id: String,
    pub rel_type: String,
    pub start_node_id: String,
    pub end_node_id: String,
    pub properties: Vec<(String, StoreValue)>,
}

impl StoreValue {
    pub fn null() -> Self {
        Self::Scalar(ScalarValue::Null)
    }

    pub fn string(value: impl Into<String>) -> Self {
        Self::Scalar(ScalarValue::String(value.into()))
    }

    pub fn integer(value: i64) -> Self {
        Self::Scalar(ScalarValue::Integer(value))
    }

    pub fn float(value: f64) -> Self {
        Self::Scalar(ScalarValue::Float(value))
    }

    pub fn bool(value: bool) -> Self {
        Self::Scalar(ScalarValue::Bool(value))
    }

    /// Normalize into a JSON value.
    ///
    /// Nodes flatten to `{id, labels, ...properties}` and relationships to
    /// `{id, type, startNodeId, endNodeId, ...properties}`. Lists and maps are
    /// normalized element-wise. Non-finite floats become `null`.
    pub fn normalize(&self) -> Value {
        match self {
            Self::Node(node) => {
                let mut object = Map::new();
                object.insert("id".to_string(), Value::String(node.id.clone()));
                object.insert(
                    "labels".to_string(),
                    Value::Array(node.labels.iter().cloned().map(Value::String).collect()),
                );
                merge_properties(&mut object, &node.properties);
                Value::Object(object)
            }
            Self::Relationship(rel) => {
                let mut object = Map::new();
                object.insert("id".to_string(), Value::String(rel.id.clone()));
                object.insert("type".to_string(), Value::String(rel.rel_type.clone()));
                object.insert("startNodeId".to_string(), Value::String(rel.start_node_id.clone()));
                object.insert("endNodeId".to_string(), Value::String(rel.end_node_id.clone()));
                merge_properties(&mut object, &rel.properties);
                Value::Object(object)
            }
            Self::List(items) => Value::Array(items.iter().map(StoreValue::normalize).collect()),
            Self::Map(entries) => {
                let mut object = Map::new();
                merge_properties(&mut object, entries);
                Value::Object(object)
            }
            Self::Scalar(scalar) => match scalar {
                ScalarValue::Null => Value::Null,
                ScalarValue::Bool(b) => Value::Bool(*b),
                ScalarValue::Integer(i) => Value::Number((*i).into()),
                ScalarValue::Float(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
                ScalarValue::String(s) => Value::String(s.clone()),
            },
        }
    }
}

// Properties never overwrite the structural keys already present.
fn merge_properties(object: &mut Map<String, Value>, properties: &[(String, StoreValue)]) {
    for (key, value) in properties {
        object.entry(key.clone()).or_insert_with(|| value.normalize());
    }
}

impl From<&str> for StoreValue {
    fn from(value: &str) -> Self {
        Self::string(value)
    }
}

impl From<String> for StoreValue {
    fn from(value: String) -> Self {
        Self::string(value)
    }
}

impl From<i64> for StoreValue {
    fn from(value: i64) -> Self {
        Self::integer(value)
    }
}

impl From<f64> for StoreValue {
    fn from(value: f64) -> Self {
        Self::float(value)
    }
}

impl From<bool> for StoreValue {
    fn from(value: bool) -> Self {
        Self::bool(value)
    }
}

impl<T: Into<StoreValue>> From<Vec<T>> for StoreValue {
    fn from(values: Vec<T>) -> Self {
        Self::List(values.into_iter().map(Into::into).collect())
    }
}

impl From<NodeValue> for StoreValue {
    fn from(node: NodeValue) -> Self {
        Self::Node(node)
    }
}

impl From<RelationshipValue> for StoreValue {
    fn from(rel: RelationshipValue) -> Self {
        Self::Relationship(rel)
    }
}

impl NodeValue {
    pub fn new(id: impl Into<String>, label: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            labels: vec![label.into()],
            properties: Vec::new(),
        }
    }

    pub fn with_property(mut self, key: impl Into<String>, value: impl Into<StoreValue>) -> Self {
        self.properties.push((key.into(), value.into()));
        self
    }
}

/// One record from a driver session, in RETURN order
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Record {
    fields: Vec<(String, StoreValue)>,
}

impl Record {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<StoreValue>) -> Self {
        self.fields.push((key.into(), value.into()));
        self
    }

    pub fn push(&mut self, key: impl Into<String>, value: StoreValue) {
        self.fields.push((key.into(), value));
    }

    pub fn get(&self, key: &str) -> Option<&StoreValue> {
        self.fields.iter().find(|(k, _)| k == key).map(|(_, v)| v)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn into_row(self) -> Row {
        self.fields
            .into_iter()
            .map(|(key, value)| {
                let normalized = value.normalize();
                (key, normalized)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_node_flattens_properties() {
        let node = NodeValue::new("4:abc:1", "Concept")
            .with_property("name", "security")
            .with_property("mention_count", 3i64);

        assert_eq!(
            StoreValue::Node(node).normalize(),
            json!({"id": "4:abc:1", "labels": ["Concept"], "name": "security", "mention_count": 3})
        );
    }

    #[test]
    fn test_relationship_normalization() {
        let rel = RelationshipValue {
            id: "7".to_string(),
            rel_type: "MENTIONS".to_string(),
            start_node_id: "1".to_string(),
            end_node_id: "2".to_string(),
            properties: vec![("weight".to_string(), StoreValue::float(0.5))],
        };

        assert_eq!(
            StoreValue::Relationship(rel).normalize(),
            json!({"id": "7", "type": "MENTIONS", "startNodeId": "1", "endNodeId": "2", "weight": 0.5})
        );
    }

    #[test]
    fn test_structural_keys_win_over_properties() {
        let node = NodeValue::new("internal", "File").with_property("id", "user-supplied");
        let value = StoreValue::Node(node).normalize();
        assert_eq!(value["id"], "internal");
    }

    #[test]
    fn test_nested_collections() {
        let value = StoreValue::List(vec![
            StoreValue::Map(vec![
                ("type".to_string(), StoreValue::string("SENT")),
                ("target".to_string(), StoreValue::null()),
            ]),
            StoreValue::Node(NodeValue::new("1", "Agent")),
        ]);

        assert_eq!(
            value.normalize(),
            json!([{"type": "SENT", "target": null}, {"id": "1", "labels": ["Agent"]}])
        );
    }

    #[test]
    fn test_non_finite_float_is_null() {
        assert_eq!(StoreValue::float(f64::NAN).normalize(), Value::Null);
    }

    #[test]
    fn test_record_into_row() {
        let row = Record::new()
            .with("concept", "neo4j")
            .with("activity", 4i64)
            .into_row();

        assert_eq!(row.get("concept"), Some(&json!("neo4j")));
        assert_eq!(row.get("activity"), Some(&json!(4)));
    }
}
