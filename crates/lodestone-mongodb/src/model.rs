//! Model trait and the base fields shared by every stored document.
//!
//! Models are plain serde types. Embedding [`ModelBase`] with
//! `#[serde(flatten)]` gives them the `_id`, `createdAt` and `updatedAt`
//! fields; the timestamps are written by the library, not by callers.
//!
//! ```ignore
//! use lodestone_mongodb::{relations, Model, ModelBase, Relation};
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct Post {
//!     #[serde(flatten)]
//!     base: ModelBase,
//!     title: String,
//!     author_id: ObjectId,
//!     #[serde(default, skip_serializing_if = "Option::is_none")]
//!     author: Option<User>,
//! }
//!
//! impl Model for Post {
//!     fn type_name() -> &'static str { "Post" }
//!     fn id(&self) -> Option<ObjectId> { self.base.id }
//!     fn relations() -> &'static [Relation] {
//!         relations![
//!             "Author" => { local: "author_id", foreign: "_id", just_one: true },
//!         ]
//!     }
//! }
//! ```

use bson::{oid::ObjectId, DateTime, Document as BsonDocument};
use chrono::Utc;
use lodestone_common::{LodestoneError, Result};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use crate::relation::Relation;

/// Document key of the identifier
pub const ID_FIELD: &str = "_id";
/// Document key of the creation timestamp
pub const CREATED_AT_FIELD: &str = "createdAt";
/// Document key of the last-update timestamp
pub const UPDATED_AT_FIELD: &str = "updatedAt";

/// Identifier and timestamps carried by every model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelBase {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<ObjectId>,
    #[serde(rename = "createdAt", default = "epoch")]
    pub created_at: DateTime,
    #[serde(rename = "updatedAt", default = "epoch")]
    pub updated_at: DateTime,
}

impl Default for ModelBase {
    fn default() -> Self {
        Self {
            id: None,
            created_at: epoch(),
            updated_at: epoch(),
        }
    }
}

impl ModelBase {
    /// Creation time as a chrono value
    pub fn created_at_utc(&self) -> chrono::DateTime<Utc> {
        self.created_at.to_chrono()
    }

    /// Last update time as a chrono value
    pub fn updated_at_utc(&self) -> chrono::DateTime<Utc> {
        self.updated_at.to_chrono()
    }
}

fn epoch() -> DateTime {
    DateTime::from_millis(0)
}

/// Current wall-clock time as a BSON datetime
pub fn now() -> DateTime {
    DateTime::from_chrono(Utc::now())
}

/// Default collection name for an entity: lower-cased name plus `s`
pub fn default_collection_name(type_name: &str) -> String {
    format!("{}s", type_name.to_lowercase())
}

/// A type that can be stored in and decoded from a collection
pub trait Model: Serialize + DeserializeOwned + Send + Sync + Unpin + 'static {
    /// Entity name, e.g. `"User"`
    fn type_name() -> &'static str;

    /// Collection used when this model is the source of a populate query
    fn collection_name() -> String {
        default_collection_name(Self::type_name())
    }

    /// The document identifier, if the model has been stored
    fn id(&self) -> Option<ObjectId>;

    /// Relations that can be populated on this model
    fn relations() -> &'static [Relation] {
        &[]
    }

    /// Serialize to a BSON document
    fn to_document(&self) -> Result<BsonDocument> {
        bson::to_document(self).map_err(|e| LodestoneError::Serialization(e.to_string()))
    }

    /// Decode from a BSON document
    fn from_document(doc: BsonDocument) -> Result<Self> {
        bson::from_document(doc).map_err(|e| LodestoneError::Deserialization(e.to_string()))
    }
}
