use crate::external_connections::ExternalConnectivity;
use serde_json::Value;
use std::cmp::Ordering;

/// Field name → value map of a schema-less document
pub type Fields = serde_json::Map<String, Value>;

/// A document read back from the store together with the identifier the store assigned to it
#[derive(Debug, Clone, PartialEq)]
pub struct StoredDocument {
    pub id: String,
    pub fields: Fields,
}

/// Equality filter on a single field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: &'static str,
    pub equals: Value,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Ascending,
    Descending,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderBy {
    pub field: &'static str,
    pub direction: Direction,
}

pub mod driven_ports {
    use super::*;

    /// A hosted document database grouping documents into named collections
    pub trait DocumentStore {
        /// Stores a new document and returns the identifier the store assigned to it
        async fn insert(
            &self,
            collection: &str,
            fields: Fields,
            ext_cxn: &impl ExternalConnectivity,
        ) -> Result<String, anyhow::Error>;

        /// Merges [fields] into the identified document, leaving every other field alone
        async fn partial_update(
            &self,
            collection: &str,
            id: &str,
            fields: Fields,
            ext_cxn: &impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;

        /// Removes the identified document. Removing a missing document is not an error.
        async fn delete(
            &self,
            collection: &str,
            id: &str,
            ext_cxn: &impl ExternalConnectivity,
        ) -> Result<(), anyhow::Error>;

        async fn query(
            &self,
            collection: &str,
            filter: &FieldFilter,
            order_by: &OrderBy,
            ext_cxn: &impl ExternalConnectivity,
        ) -> Result<Vec<StoredDocument>, anyhow::Error>;
    }
}

/// Runs a filtered, ordered query over documents held in process. Missing fields compare as null
/// and documents with equal sort keys keep the order they were given in.
pub fn evaluate_query<'docs>(
    documents: impl IntoIterator<Item = &'docs StoredDocument>,
    filter: &FieldFilter,
    order_by: &OrderBy,
) -> Vec<StoredDocument> {
    let mut matching: Vec<StoredDocument> = documents
        .into_iter()
        .filter(|doc| doc.fields.get(filter.field) == Some(&filter.equals))
        .cloned()
        .collect();

    matching.sort_by(|left, right| {
        let ordering = compare_values(
            left.fields.get(order_by.field),
            right.fields.get(order_by.field),
        );
        match order_by.direction {
            Direction::Ascending => ordering,
            Direction::Descending => ordering.reverse(),
        }
    });

    matching
}

/// Orders values the way the hosted store does across types: null, booleans, numbers, strings
fn compare_values(left: Option<&Value>, right: Option<&Value>) -> Ordering {
    fn type_rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    let left = left.unwrap_or(&Value::Null);
    let right = right.unwrap_or(&Value::Null);
    match (left, right) {
        (Value::Bool(l), Value::Bool(r)) => l.cmp(r),
        (Value::Number(l), Value::Number(r)) => match (l.as_i64(), r.as_i64()) {
            (Some(l), Some(r)) => l.cmp(&r),
            _ => l
                .as_f64()
                .unwrap_or(f64::NAN)
                .total_cmp(&r.as_f64().unwrap_or(f64::NAN)),
        },
        (Value::String(l), Value::String(r)) => l.cmp(r),
        _ => type_rank(left).cmp(&type_rank(right)),
    }
}
