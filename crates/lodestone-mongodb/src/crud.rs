//! CRUD helpers on a bound collection.
//!
//! Each helper is a single driver call run under the collection's
//! [`OpContext`](crate::OpContext). Writes maintain the `createdAt` and
//! `updatedAt` fields; callers never set them.

use bson::{doc, oid::ObjectId, Bson, DateTime, Document as BsonDocument};
use futures::TryStreamExt;
use lodestone_common::{LodestoneError, Result};
use mongodb::options::{FindOneAndDeleteOptions, FindOneAndUpdateOptions, ReturnDocument};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::collection::ModelCollection;
use crate::model::{now, Model, CREATED_AT_FIELD, UPDATED_AT_FIELD};

/// Serialize any value into a flat document usable as an update payload
pub fn to_update_document<T: Serialize + ?Sized>(data: &T) -> Result<BsonDocument> {
    Ok(bson::to_document(data)?)
}

/// Add `updatedAt` to an update.
///
/// A plain field document becomes `{ $set: { ...fields, updatedAt } }`.
/// An operator document keeps its operators and gets `updatedAt` merged
/// into its `$set`, which is created when missing. Mixing plain fields and
/// operators at the top level is rejected.
pub fn stamp_update(update: BsonDocument, at: DateTime) -> Result<BsonDocument> {
    let operators = update.keys().filter(|k| k.starts_with('$')).count();

    if operators == 0 {
        let mut set = update;
        set.insert(UPDATED_AT_FIELD, at);
        return Ok(doc! { "$set": set });
    }

    if operators != update.len() {
        return Err(LodestoneError::Validation(
            "update mixes operators and plain fields at the top level".to_string(),
        ));
    }

    let mut stamped = update;
    match stamped.get_mut("$set") {
        Some(Bson::Document(set)) => {
            set.insert(UPDATED_AT_FIELD, at);
        }
        Some(other) => {
            return Err(LodestoneError::Validation(format!(
                "$set must be a document, got {:?}",
                other.element_type()
            )));
        }
        None => {
            let mut set = BsonDocument::new();
            set.insert(UPDATED_AT_FIELD, at);
            stamped.insert("$set", set);
        }
    }
    Ok(stamped)
}

impl<M: Model> ModelCollection<M> {
    /// Insert a model, stamping both timestamps; returns the generated id
    #[instrument(skip(self, model), fields(collection = %self.name()))]
    pub async fn create(&self, model: &M) -> Result<ObjectId> {
        let mut document = model.to_document()?;
        let stamp = now();
        document.insert(CREATED_AT_FIELD, stamp);
        document.insert(UPDATED_AT_FIELD, stamp);

        let inner = self.inner().clone();
        let result = self
            .context()
            .run(async move { Ok::<_, LodestoneError>(inner.insert_one(document).await?) })
            .await?;

        let id = result
            .inserted_id
            .as_object_id()
            .ok_or_else(|| LodestoneError::Database("Invalid inserted ID".to_string()))?;
        debug!(%id, "Inserted document");
        Ok(id)
    }

    /// Delete the first document matching `filter`; true if one was removed
    #[instrument(skip(self, filter), fields(collection = %self.name()))]
    pub async fn delete(&self, filter: BsonDocument) -> Result<bool> {
        self.screen(&filter)?;
        let inner = self.inner().clone();
        let result = self
            .context()
            .run(async move { Ok::<_, LodestoneError>(inner.delete_one(filter).await?) })
            .await?;
        Ok(result.deleted_count > 0)
    }

    /// Delete every document matching `filter`; returns how many were removed
    #[instrument(skip(self, filter), fields(collection = %self.name()))]
    pub async fn delete_many(&self, filter: BsonDocument) -> Result<u64> {
        self.screen(&filter)?;
        let inner = self.inner().clone();
        let result = self
            .context()
            .run(async move { Ok::<_, LodestoneError>(inner.delete_many(filter).await?) })
            .await?;
        debug!(deleted = result.deleted_count, "Deleted documents");
        Ok(result.deleted_count)
    }

    /// Update every document matching `filter`; returns the modified count.
    ///
    /// See [`stamp_update`] for how `update` is combined with `updatedAt`.
    #[instrument(skip(self, filter, update), fields(collection = %self.name()))]
    pub async fn update(&self, filter: BsonDocument, update: BsonDocument) -> Result<u64> {
        self.screen(&filter)?;
        let update = stamp_update(update, now())?;
        let inner = self.inner().clone();
        let result = self
            .context()
            .run(async move { Ok::<_, LodestoneError>(inner.update_many(filter, update).await?) })
            .await?;
        Ok(result.modified_count)
    }

    /// Update the first document matching `filter`; true if it was modified
    #[instrument(skip(self, filter, update), fields(collection = %self.name()))]
    pub async fn update_one(&self, filter: BsonDocument, update: BsonDocument) -> Result<bool> {
        self.screen(&filter)?;
        let update = stamp_update(update, now())?;
        let inner = self.inner().clone();
        let result = self
            .context()
            .run(async move { Ok::<_, LodestoneError>(inner.update_one(filter, update).await?) })
            .await?;
        Ok(result.modified_count > 0)
    }

    /// Update the first match and return it as it is after the update.
    ///
    /// Fails with [`LodestoneError::NotFound`] when nothing matches.
    #[instrument(skip(self, filter, update), fields(collection = %self.name()))]
    pub async fn find_one_and_update(
        &self,
        filter: BsonDocument,
        update: BsonDocument,
    ) -> Result<M> {
        self.screen(&filter)?;
        let update = stamp_update(update, now())?;

        let mut options = FindOneAndUpdateOptions::default();
        options.return_document = Some(ReturnDocument::After);

        let inner = self.inner().clone();
        let found = self
            .context()
            .run(async move {
                Ok::<_, LodestoneError>(
                    inner
                        .find_one_and_update(filter, update)
                        .with_options(options)
                        .await?,
                )
            })
            .await?;

        match found {
            Some(doc) => M::from_document(doc),
            None => Err(LodestoneError::NotFound),
        }
    }

    /// Delete the first match and return it without its `_id`.
    ///
    /// No match is `Ok(None)`, not an error.
    #[instrument(skip(self, filter), fields(collection = %self.name()))]
    pub async fn find_one_and_remove(&self, filter: BsonDocument) -> Result<Option<M>> {
        self.screen(&filter)?;

        let mut options = FindOneAndDeleteOptions::default();
        options.projection = Some(doc! { "_id": 0 });

        let inner = self.inner().clone();
        let removed = self
            .context()
            .run(async move {
                Ok::<_, LodestoneError>(
                    inner
                        .find_one_and_delete(filter)
                        .with_options(options)
                        .await?,
                )
            })
            .await?;

        removed.map(M::from_document).transpose()
    }

    /// Run an aggregation pipeline on this collection and collect the output
    #[instrument(skip(self, pipeline), fields(collection = %self.name(), stages = pipeline.len()))]
    pub async fn aggregate(&self, pipeline: Vec<BsonDocument>) -> Result<Vec<BsonDocument>> {
        self.screen_pipeline(&pipeline)?;
        let inner = self.inner().clone();
        self.context()
            .run(async move {
                let cursor = inner.aggregate(pipeline).await?;
                Ok::<_, LodestoneError>(cursor.try_collect::<Vec<_>>().await?)
            })
            .await
    }
}
