//! Data models for the ToolCrib application.
//!
//! Documents are camelCase JSON maps in the store; these typed structs form
//! the serialize/deserialize boundary. Missing fields decode to explicit
//! defaults rather than propagating nulls into business logic.

mod consumable;
mod ledger;
mod staff;
mod tool;

pub use consumable::*;
pub use ledger::*;
pub use staff::*;
pub use tool::*;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::errors::AppError;
use crate::store::Document;

/// Decode a stored document into a typed entity.
pub fn from_doc<T: DeserializeOwned>(doc: &Document) -> Result<T, AppError> {
    serde_json::from_value(Value::Object(doc.data.clone()))
        .map_err(|e| AppError::Store(format!("Corrupt document {}: {}", doc.id, e)))
}

/// Serialize a typed entity into a store field map.
pub fn to_fields<T: Serialize>(value: &T) -> Result<Map<String, Value>, AppError> {
    match serde_json::to_value(value) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Err(AppError::Internal(
            "entity did not serialize to an object".to_string(),
        )),
        Err(e) => Err(AppError::Internal(format!("serialize error: {}", e))),
    }
}
