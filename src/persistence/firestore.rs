use crate::config::FirebaseConfig;
use crate::domain::store::driven_ports::DocumentStore;
use crate::domain::store::{Direction, FieldFilter, Fields, OrderBy, StoredDocument};
use crate::external_connections::ExternalConnectivity;
use crate::persistence::firebase_auth::FirebaseTokenSource;
use anyhow::{Context, anyhow};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Number, Value};
use std::collections::BTreeMap;
use tracing::debug;

/// A value in Firestore's typed JSON encoding
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
enum FirestoreValue {
    NullValue(()),
    BooleanValue(bool),
    /// 64-bit integers travel as decimal strings
    IntegerValue(String),
    DoubleValue(f64),
    StringValue(String),
    TimestampValue(String),
    ReferenceValue(String),
    BytesValue(String),
    GeoPointValue(Value),
    ArrayValue(ArrayValue),
    MapValue(MapValue),
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
struct ArrayValue {
    #[serde(default)]
    values: Vec<FirestoreValue>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Default)]
struct MapValue {
    #[serde(default)]
    fields: BTreeMap<String, FirestoreValue>,
}

impl From<Value> for FirestoreValue {
    fn from(value: Value) -> Self {
        match value {
            Value::Null => FirestoreValue::NullValue(()),
            Value::Bool(flag) => FirestoreValue::BooleanValue(flag),
            Value::Number(number) => match number.as_i64() {
                Some(integer) => FirestoreValue::IntegerValue(integer.to_string()),
                None => FirestoreValue::DoubleValue(number.as_f64().unwrap_or(f64::NAN)),
            },
            Value::String(text) => FirestoreValue::StringValue(text),
            Value::Array(values) => FirestoreValue::ArrayValue(ArrayValue {
                values: values.into_iter().map(FirestoreValue::from).collect(),
            }),
            Value::Object(fields) => FirestoreValue::MapValue(MapValue {
                fields: encode_fields(fields),
            }),
        }
    }
}

impl TryFrom<FirestoreValue> for Value {
    type Error = anyhow::Error;

    fn try_from(value: FirestoreValue) -> Result<Self, Self::Error> {
        let decoded = match value {
            FirestoreValue::NullValue(()) => Value::Null,
            FirestoreValue::BooleanValue(flag) => Value::Bool(flag),
            FirestoreValue::IntegerValue(digits) => Value::from(
                digits
                    .parse::<i64>()
                    .with_context(|| format!("reading integer value \"{digits}\""))?,
            ),
            FirestoreValue::DoubleValue(double) => Number::from_f64(double)
                .map(Value::Number)
                .unwrap_or(Value::Null),
            FirestoreValue::StringValue(text)
            | FirestoreValue::TimestampValue(text)
            | FirestoreValue::ReferenceValue(text)
            | FirestoreValue::BytesValue(text) => Value::String(text),
            FirestoreValue::GeoPointValue(point) => point,
            FirestoreValue::ArrayValue(array) => Value::Array(
                array
                    .values
                    .into_iter()
                    .map(Value::try_from)
                    .collect::<Result<_, _>>()?,
            ),
            FirestoreValue::MapValue(map) => Value::Object(decode_fields(map.fields)?),
        };

        Ok(decoded)
    }
}

fn encode_fields(fields: Fields) -> BTreeMap<String, FirestoreValue> {
    fields
        .into_iter()
        .map(|(name, value)| (name, FirestoreValue::from(value)))
        .collect()
}

fn decode_fields(fields: BTreeMap<String, FirestoreValue>) -> Result<Fields, anyhow::Error> {
    fields
        .into_iter()
        .map(|(name, value)| Ok((name, Value::try_from(value)?)))
        .collect()
}

#[derive(Serialize)]
struct DocumentBody {
    fields: BTreeMap<String, FirestoreValue>,
}

#[derive(Deserialize, Debug)]
struct DocumentResponse {
    /// Full resource name, ending in the document id
    name: String,
    #[serde(default)]
    fields: BTreeMap<String, FirestoreValue>,
}

impl TryFrom<DocumentResponse> for StoredDocument {
    type Error = anyhow::Error;

    fn try_from(value: DocumentResponse) -> Result<Self, Self::Error> {
        Ok(StoredDocument {
            id: document_id(&value.name)?.to_owned(),
            fields: decode_fields(value.fields)?,
        })
    }
}

fn document_id(resource_name: &str) -> Result<&str, anyhow::Error> {
    resource_name
        .rsplit('/')
        .next()
        .filter(|id| !id.is_empty())
        .ok_or_else(|| anyhow!("document name \"{resource_name}\" has no id"))
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct RunQueryRequest<'query> {
    structured_query: StructuredQuery<'query>,
}

#[derive(Serialize)]
struct StructuredQuery<'query> {
    from: [CollectionSelector<'query>; 1],
    #[serde(rename = "where")]
    filter: QueryFilter<'query>,
    #[serde(rename = "orderBy")]
    order_by: [QueryOrder<'query>; 1],
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct CollectionSelector<'query> {
    collection_id: &'query str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct FieldReference<'query> {
    field_path: &'query str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryFilter<'query> {
    field_filter: FieldFilterBody<'query>,
}

#[derive(Serialize)]
struct FieldFilterBody<'query> {
    field: FieldReference<'query>,
    op: &'static str,
    value: FirestoreValue,
}

#[derive(Serialize)]
struct QueryOrder<'query> {
    field: FieldReference<'query>,
    direction: &'static str,
}

impl<'query> RunQueryRequest<'query> {
    fn new(collection: &'query str, filter: &'query FieldFilter, order_by: &'query OrderBy) -> Self {
        RunQueryRequest {
            structured_query: StructuredQuery {
                from: [CollectionSelector {
                    collection_id: collection,
                }],
                filter: QueryFilter {
                    field_filter: FieldFilterBody {
                        field: FieldReference {
                            field_path: filter.field,
                        },
                        op: "EQUAL",
                        value: FirestoreValue::from(filter.equals.clone()),
                    },
                },
                order_by: [QueryOrder {
                    field: FieldReference {
                        field_path: order_by.field,
                    },
                    direction: match order_by.direction {
                        Direction::Ascending => "ASCENDING",
                        Direction::Descending => "DESCENDING",
                    },
                }],
            },
        }
    }
}

/// One streamed element of a runQuery response. Elements without a document only report progress.
#[derive(Deserialize, Debug)]
struct RunQueryResponseItem {
    document: Option<DocumentResponse>,
}

fn documents_from_run_query(
    items: Vec<RunQueryResponseItem>,
) -> Result<Vec<StoredDocument>, anyhow::Error> {
    items
        .into_iter()
        .filter_map(|item| item.document)
        .map(StoredDocument::try_from)
        .collect()
}

/// Cloud Firestore over its REST API
pub struct FirestoreStore {
    documents_root: String,
    tokens: FirebaseTokenSource,
}

impl FirestoreStore {
    pub fn new(config: &FirebaseConfig, tokens: FirebaseTokenSource) -> FirestoreStore {
        FirestoreStore {
            documents_root: format!(
                "{}/projects/{}/databases/(default)/documents",
                config.firestore_base_url, config.project_id
            ),
            tokens,
        }
    }

    fn collection_url(&self, collection: &str) -> String {
        format!("{}/{}", self.documents_root, collection)
    }

    fn document_url(&self, collection: &str, id: &str) -> String {
        format!("{}/{}/{}", self.documents_root, collection, id)
    }

    fn run_query_url(&self) -> String {
        format!("{}:runQuery", self.documents_root)
    }

    /// Attaches the signed-in user's ID token, if there is one
    async fn authorized(
        &self,
        request: reqwest_middleware::RequestBuilder,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<reqwest_middleware::RequestBuilder, anyhow::Error> {
        let request = match self.tokens.id_token(ext_cxn).await? {
            Some(token) => request.bearer_auth(token),
            None => request,
        };

        Ok(request)
    }
}

impl DocumentStore for FirestoreStore {
    #[tracing::instrument(skip(self, fields, ext_cxn))]
    async fn insert(
        &self,
        collection: &str,
        fields: Fields,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<String, anyhow::Error> {
        let request = ext_cxn
            .http_client()
            .post(self.collection_url(collection))
            .json(&DocumentBody {
                fields: encode_fields(fields),
            });
        let response = self
            .authorized(request, ext_cxn)
            .await?
            .send()
            .await
            .context("sending document create request")?;
        let created: DocumentResponse = super::ensure_success(response, "creating a document")
            .await?
            .json()
            .await
            .context("reading created document")?;

        let id = document_id(&created.name)?.to_owned();
        debug!(%id, "Created document");
        Ok(id)
    }

    #[tracing::instrument(skip(self, fields, ext_cxn))]
    async fn partial_update(
        &self,
        collection: &str,
        id: &str,
        fields: Fields,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<(), anyhow::Error> {
        let mut query: Vec<(&str, &str)> = fields
            .keys()
            .map(|name| ("updateMask.fieldPaths", name.as_str()))
            .collect();
        query.push(("currentDocument.exists", "true"));

        let request = ext_cxn
            .http_client()
            .patch(self.document_url(collection, id))
            .query(&query)
            .json(&DocumentBody {
                fields: encode_fields(fields.clone()),
            });
        let response = self
            .authorized(request, ext_cxn)
            .await?
            .send()
            .await
            .context("sending document update request")?;
        super::ensure_success(response, "updating a document").await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, ext_cxn))]
    async fn delete(
        &self,
        collection: &str,
        id: &str,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<(), anyhow::Error> {
        let request = ext_cxn
            .http_client()
            .delete(self.document_url(collection, id));
        let response = self
            .authorized(request, ext_cxn)
            .await?
            .send()
            .await
            .context("sending document delete request")?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!("Document was already gone");
            return Ok(());
        }
        super::ensure_success(response, "deleting a document").await?;

        Ok(())
    }

    #[tracing::instrument(skip(self, filter, order_by, ext_cxn))]
    async fn query(
        &self,
        collection: &str,
        filter: &FieldFilter,
        order_by: &OrderBy,
        ext_cxn: &impl ExternalConnectivity,
    ) -> Result<Vec<StoredDocument>, anyhow::Error> {
        let request = ext_cxn
            .http_client()
            .post(self.run_query_url())
            .json(&RunQueryRequest::new(collection, filter, order_by));
        let response = self
            .authorized(request, ext_cxn)
            .await?
            .send()
            .await
            .context("sending query request")?;
        let items: Vec<RunQueryResponseItem> = super::ensure_success(response, "querying documents")
            .await?
            .json()
            .await
            .context("reading query results")?;

        let documents = documents_from_run_query(items)?;
        debug!(count = documents.len(), "Query returned documents");
        Ok(documents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FirebaseConfig;
    use crate::persistence::firebase_auth::FirebaseIdentity;
    use serde_json::json;
    use speculoos::prelude::*;

    fn config() -> FirebaseConfig {
        FirebaseConfig {
            api_key: "key".to_owned(),
            project_id: "demo-todo".to_owned(),
            firestore_base_url: "https://firestore.googleapis.com/v1".to_owned(),
            identity_toolkit_base_url: "https://identitytoolkit.googleapis.com/v1".to_owned(),
            secure_token_base_url: "https://securetoken.googleapis.com/v1".to_owned(),
        }
    }

    fn store() -> FirestoreStore {
        let config = config();
        let identity = FirebaseIdentity::new(&config);
        FirestoreStore::new(&config, identity.token_source())
    }

    mod encoding {
        use super::*;

        #[test]
        fn to_do_fields_use_typed_values() {
            let Value::Object(fields) = json!({
                "content": "buy milk",
                "isFinished": false,
                "createdTime": 1_700_000_000,
                "ownerId": "u1",
            }) else {
                unreachable!()
            };

            let encoded = serde_json::to_value(DocumentBody {
                fields: encode_fields(fields),
            })
            .expect("serializes");

            assert_eq!(
                json!({"fields": {
                    "content": {"stringValue": "buy milk"},
                    "isFinished": {"booleanValue": false},
                    "createdTime": {"integerValue": "1700000000"},
                    "ownerId": {"stringValue": "u1"},
                }}),
                encoded
            );
        }

        #[test]
        fn nested_values_and_nulls() {
            let encoded = serde_json::to_value(FirestoreValue::from(json!({
                "tags": ["a", 1.5],
                "note": null,
            })))
            .expect("serializes");

            assert_eq!(
                json!({"mapValue": {"fields": {
                    "note": {"nullValue": null},
                    "tags": {"arrayValue": {"values": [
                        {"stringValue": "a"},
                        {"doubleValue": 1.5},
                    ]}},
                }}}),
                encoded
            );
        }

        #[test]
        fn malformed_integer_is_an_error() {
            let decoded = Value::try_from(FirestoreValue::IntegerValue("12x".to_owned()));
            assert_that!(decoded).is_err();
        }

        #[test]
        fn empty_array_and_map_decode() {
            let decoded: FirestoreValue =
                serde_json::from_value(json!({"arrayValue": {}})).expect("parses");
            assert_that!(Value::try_from(decoded))
                .is_ok()
                .is_equal_to(json!([]));

            let decoded: FirestoreValue =
                serde_json::from_value(json!({"mapValue": {}})).expect("parses");
            assert_that!(Value::try_from(decoded))
                .is_ok()
                .is_equal_to(json!({}));
        }
    }

    mod run_query {
        use super::*;
        use crate::domain::todo;
        use crate::domain::identity::UserId;

        #[test]
        fn builds_owner_filtered_newest_first_query() {
            let owner = UserId::new("u1").expect("valid user id");
            let filter = todo::owned_by(&owner);
            let order_by = todo::newest_first();

            let body = serde_json::to_value(RunQueryRequest::new(
                todo::COLLECTION,
                &filter,
                &order_by,
            ))
            .expect("serializes");

            assert_eq!(
                json!({"structuredQuery": {
                    "from": [{"collectionId": "todoItem"}],
                    "where": {"fieldFilter": {
                        "field": {"fieldPath": "ownerId"},
                        "op": "EQUAL",
                        "value": {"stringValue": "u1"},
                    }},
                    "orderBy": [{
                        "field": {"fieldPath": "createdTime"},
                        "direction": "DESCENDING",
                    }],
                }}),
                body
            );
        }

        #[test]
        fn reads_documents_and_skips_progress_entries() {
            let items: Vec<RunQueryResponseItem> = serde_json::from_value(json!([
                {
                    "document": {
                        "name": "projects/demo-todo/databases/(default)/documents/todoItem/abc123",
                        "fields": {
                            "content": {"stringValue": "b"},
                            "isFinished": {"booleanValue": true},
                            "createdTime": {"integerValue": "20"},
                            "ownerId": {"stringValue": "u1"},
                        },
                        "createTime": "2024-01-01T00:00:00Z",
                        "updateTime": "2024-01-01T00:00:00Z",
                    },
                    "readTime": "2024-01-01T00:00:01Z",
                },
                {"readTime": "2024-01-01T00:00:01Z"},
            ]))
            .expect("parses");

            let documents = documents_from_run_query(items);

            assert_that!(documents).is_ok().matches(|documents| {
                matches!(documents.as_slice(), [
                    StoredDocument { id, fields }
                ] if id == "abc123"
                    && fields.get("createdTime") == Some(&json!(20))
                    && fields.get("isFinished") == Some(&json!(true)))
            });
        }
    }

    #[test]
    fn builds_rest_urls() {
        let store = store();

        assert_eq!(
            "https://firestore.googleapis.com/v1/projects/demo-todo/databases/(default)/documents/todoItem",
            store.collection_url("todoItem")
        );
        assert_eq!(
            "https://firestore.googleapis.com/v1/projects/demo-todo/databases/(default)/documents/todoItem/abc",
            store.document_url("todoItem", "abc")
        );
        assert_eq!(
            "https://firestore.googleapis.com/v1/projects/demo-todo/databases/(default)/documents:runQuery",
            store.run_query_url()
        );
    }

    #[test]
    fn document_id_is_last_path_segment() {
        assert_that!(document_id("projects/p/databases/(default)/documents/todoItem/xyz"))
            .is_ok()
            .is_equal_to("xyz");
        assert_that!(document_id("projects/p/documents/")).is_err();
    }
}
