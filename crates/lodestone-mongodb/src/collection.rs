//! Binding a model type to a collection

use std::fmt;
use std::marker::PhantomData;

use bson::{Bson, Document as BsonDocument};
use lodestone_common::Result;
use mongodb::{Collection, Database};
use tracing::debug;

use crate::connection::Connection;
use crate::context::OpContext;
use crate::model::Model;
use crate::query::QueryBuilder;
use crate::relation::validate_relations;
use crate::validation::{validate_query, ValidatedCollectionName};

/// A collection handle typed by the model stored in it.
///
/// Produced by [`Connection::collection`]. Not cached; build one where it
/// is needed. Cloning shares the underlying driver handle.
pub struct ModelCollection<M: Model> {
    collection: Collection<BsonDocument>,
    database: Database,
    name: ValidatedCollectionName,
    ctx: OpContext,
    validate_queries: bool,
    _model: PhantomData<fn() -> M>,
}

impl<M: Model> ModelCollection<M> {
    pub(crate) fn bind(conn: &Connection, name: &str) -> Result<Self> {
        let name = ValidatedCollectionName::new(name)?;
        if !M::relations().is_empty() {
            ValidatedCollectionName::new(&M::collection_name())?;
        }
        validate_relations(M::type_name(), M::relations())?;

        debug!(
            collection = name.as_str(),
            model = M::type_name(),
            relations = M::relations().len(),
            "Bound model to collection"
        );

        Ok(Self {
            collection: conn.database().collection(name.as_str()),
            database: conn.database().clone(),
            name,
            ctx: OpContext::background(),
            validate_queries: conn.validates_queries(),
            _model: PhantomData,
        })
    }

    /// Same collection, with every call bounded by `ctx`
    pub fn with_context(&self, ctx: OpContext) -> Self {
        Self {
            ctx,
            ..self.clone()
        }
    }

    pub fn name(&self) -> &str {
        self.name.as_str()
    }

    pub fn context(&self) -> &OpContext {
        &self.ctx
    }

    /// The untyped driver collection
    pub fn inner(&self) -> &Collection<BsonDocument> {
        &self.collection
    }

    /// Collection that populate pipelines run against
    pub(crate) fn source_collection(&self) -> Collection<BsonDocument> {
        self.database.collection(&M::collection_name())
    }

    /// Reject server-side JavaScript when query screening is enabled
    pub(crate) fn screen(&self, doc: &BsonDocument) -> Result<()> {
        if self.validate_queries {
            validate_query(&Bson::Document(doc.clone()))?;
        }
        Ok(())
    }

    pub(crate) fn screen_pipeline(&self, pipeline: &[BsonDocument]) -> Result<()> {
        if self.validate_queries {
            for stage in pipeline {
                validate_query(&Bson::Document(stage.clone()))?;
            }
        }
        Ok(())
    }

    /// Fresh query over every document in the collection
    pub fn query(&self) -> QueryBuilder<M> {
        QueryBuilder::new(self.clone())
    }

    /// Start a multi-document query; `None` matches everything
    pub fn find(&self, filter: impl Into<Option<BsonDocument>>) -> QueryBuilder<M> {
        self.query().find(filter)
    }

    /// Start a single-document query
    pub fn find_one(&self, filter: BsonDocument) -> QueryBuilder<M> {
        self.query().find_one(filter)
    }
}

impl<M: Model> Clone for ModelCollection<M> {
    fn clone(&self) -> Self {
        Self {
            collection: self.collection.clone(),
            database: self.database.clone(),
            name: self.name.clone(),
            ctx: self.ctx.clone(),
            validate_queries: self.validate_queries,
            _model: PhantomData,
        }
    }
}

impl<M: Model> fmt::Debug for ModelCollection<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelCollection")
            .field("name", &self.name.as_str())
            .field("model", &M::type_name())
            .field("ctx", &self.ctx)
            .finish()
    }
}
