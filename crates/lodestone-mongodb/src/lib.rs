//! MongoDB convenience layer for lodestone
//!
//! Typed collection handles over the official driver, with a fluent query
//! builder, CRUD helpers that maintain document timestamps, and virtual
//! populate: cross-collection joins declared per model and executed as an
//! aggregation pipeline on the server.
//!
//! ```ignore
//! let conn = Connection::connect("mongodb://localhost:27017", "blog").await?;
//! let posts = conn.collection::<Post>("posts")?;
//!
//! let id = posts.create(&post).await?;
//! let post = posts
//!     .find_one(doc! { "_id": id })
//!     .populate(["Author"])
//!     .exec()
//!     .await?
//!     .into_one()?;
//! ```

pub mod collection;
pub mod connection;
pub mod context;
pub mod crud;
pub mod model;
pub mod populate;
pub mod query;
pub mod relation;
pub mod settings;
pub mod validation;

pub use collection::ModelCollection;
pub use connection::{Connection, PoolConfig};
pub use context::OpContext;
pub use crud::{stamp_update, to_update_document};
pub use lodestone_common::{LodestoneError, Result};
pub use model::{Model, ModelBase};
pub use populate::build_pipeline;
pub use query::{QueryBuilder, QueryMode, QueryResult};
pub use relation::Relation;
pub use settings::Settings;
pub use validation::{validate_query, ValidatedCollectionName};
