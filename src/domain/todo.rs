use crate::domain::identity::UserId;
use crate::domain::store::{Direction, FieldFilter, Fields, OrderBy, StoredDocument};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use validator::{Validate, ValidationError};

/// Name of the collection holding every user's to-do items
pub const COLLECTION: &str = "todoItem";

/// Field names of a stored to-do item
pub mod fields {
    pub const CONTENT: &str = "content";
    pub const IS_FINISHED: &str = "isFinished";
    pub const CREATED_TIME: &str = "createdTime";
    pub const OWNER_ID: &str = "ownerId";
}

/// A to-do item as last read from the store
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct TodoItem {
    pub id: String,
    pub content: String,
    pub is_finished: bool,
    pub created_time: i64,
    pub owner_id: UserId,
}

/// Text the user submitted for a new to-do item
#[derive(Validate)]
#[cfg_attr(test, derive(Clone))]
pub struct NewTodoItem {
    #[validate(custom = "not_blank")]
    pub content: String,
}

fn not_blank(content: &str) -> Result<(), ValidationError> {
    if content.trim().is_empty() {
        return Err(ValidationError::new("blank"));
    }

    Ok(())
}

/// Stored shape of a to-do item
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TodoRecord {
    #[serde(default)]
    content: String,
    #[serde(default)]
    is_finished: bool,
    #[serde(default)]
    created_time: i64,
    owner_id: UserId,
}

impl NewTodoItem {
    /// Builds the fields of a freshly created, unfinished item
    pub fn into_fields(self, owner: &UserId, created_time: i64) -> Fields {
        let mut values = Fields::new();
        values.insert(fields::CONTENT.into(), Value::String(self.content));
        values.insert(fields::IS_FINISHED.into(), Value::Bool(false));
        values.insert(fields::CREATED_TIME.into(), Value::from(created_time));
        values.insert(
            fields::OWNER_ID.into(),
            Value::String(owner.as_str().to_owned()),
        );
        values
    }
}

impl TryFrom<StoredDocument> for TodoItem {
    type Error = serde_json::Error;

    fn try_from(value: StoredDocument) -> Result<Self, Self::Error> {
        let record: TodoRecord = serde_json::from_value(Value::Object(value.fields))?;

        Ok(TodoItem {
            id: value.id,
            content: record.content,
            is_finished: record.is_finished,
            created_time: record.created_time,
            owner_id: record.owner_id,
        })
    }
}

/// Partial update flipping an item's finished flag
pub fn toggled_fields(item: &TodoItem) -> Fields {
    let mut values = Fields::new();
    values.insert(fields::IS_FINISHED.into(), Value::Bool(!item.is_finished));
    values
}

/// Filter matching every item owned by [owner]
pub fn owned_by(owner: &UserId) -> FieldFilter {
    FieldFilter {
        field: fields::OWNER_ID,
        equals: Value::String(owner.as_str().to_owned()),
    }
}

/// Newest items come first
pub fn newest_first() -> OrderBy {
    OrderBy {
        field: fields::CREATED_TIME,
        direction: Direction::Descending,
    }
}

/// Converts query results into items, skipping documents that don't look like to-do items
pub fn items_from_documents(documents: Vec<StoredDocument>) -> Vec<TodoItem> {
    documents
        .into_iter()
        .filter_map(|document| {
            let id = document.id.clone();
            match TodoItem::try_from(document) {
                Ok(item) => Some(item),
                Err(err) => {
                    warn!(%id, "Skipping malformed to-do item: {err}");
                    None
                }
            }
        })
        .collect()
}
