//! Virtual populate: join related collections through an aggregation pipeline.
//!
//! For a model `M`, a filter and a list of relation names, the pipeline is
//!
//! ```text
//! { $match: filter }
//! { $lookup: { from, localField, foreignField, as } }         per field
//! { $addFields: { as: { $arrayElemAt: ["$as", 0] } } }        just_one fields
//! { $addFields: { as: { $size: "$as" } } }                    count fields
//! ```
//!
//! run against `M::collection_name()`. Only one level is resolved; documents
//! pulled in by a `$lookup` are not populated themselves.

use bson::{doc, Document as BsonDocument};
use futures::TryStreamExt;
use lodestone_common::{LodestoneError, Result};
use tracing::{debug, instrument};

use crate::collection::ModelCollection;
use crate::model::Model;
use crate::relation::{find_relation, Relation};

/// Build the populate pipeline for `fields` on model `M`.
///
/// # Errors
/// [`LodestoneError::FieldNotFound`](lodestone_common::LodestoneError::FieldNotFound)
/// for the first field without a declared relation.
pub fn build_pipeline<M, S>(filter: BsonDocument, fields: &[S]) -> Result<Vec<BsonDocument>>
where
    M: Model,
    S: AsRef<str>,
{
    let mut pipeline = Vec::with_capacity(1 + fields.len() * 2);
    pipeline.push(doc! { "$match": filter });

    for field in fields {
        let relation = find_relation(M::relations(), M::type_name(), field.as_ref())?;
        push_relation_stages(&mut pipeline, relation);
    }

    Ok(pipeline)
}

fn push_relation_stages(pipeline: &mut Vec<BsonDocument>, relation: &Relation) {
    let alias = relation.alias();

    pipeline.push(doc! {
        "$lookup": {
            "from": relation.from_collection(),
            "localField": relation.local_field,
            "foreignField": relation.foreign_field,
            "as": alias.as_str(),
        }
    });

    let reference = format!("${}", alias);
    let reduced = if relation.count {
        doc! { "$size": reference }
    } else if relation.collapses_to_one() {
        // $arrayElemAt past the end yields a missing field, not null
        doc! { "$arrayElemAt": [reference, 0] }
    } else {
        return;
    };

    let mut set = BsonDocument::new();
    set.insert(alias, reduced);
    pipeline.push(doc! { "$addFields": set });
}

impl<M: Model> ModelCollection<M> {
    /// Run the populate pipeline and return the first matching document, raw
    #[instrument(skip(self, filter, fields), fields(collection = %M::collection_name(), relations = fields.len()))]
    pub async fn populate_document<S: AsRef<str>>(
        &self,
        filter: BsonDocument,
        fields: &[S],
    ) -> Result<Option<BsonDocument>> {
        let pipeline = build_pipeline::<M, S>(filter, fields)?;
        self.screen_pipeline(&pipeline)?;
        debug!(stages = pipeline.len(), "Built populate pipeline");

        let collection = self.source_collection();
        self.context()
            .run(async move {
                let mut cursor = collection.aggregate(pipeline).await?;
                Ok::<_, LodestoneError>(cursor.try_next().await?)
            })
            .await
    }

    /// Populate and decode the first matching document
    pub async fn populate_first<S: AsRef<str>>(
        &self,
        filter: BsonDocument,
        fields: &[S],
    ) -> Result<Option<M>> {
        match self.populate_document(filter, fields).await? {
            Some(doc) => Ok(Some(M::from_document(doc)?)),
            None => Ok(None),
        }
    }

    /// Enrich `target` with the relations named in `fields`.
    ///
    /// Fields present in the pipeline result overwrite those of `target`;
    /// everything else is kept. When nothing matches `filter` the target is
    /// returned unchanged.
    pub async fn populate<S: AsRef<str>>(
        &self,
        target: M,
        filter: BsonDocument,
        fields: &[S],
    ) -> Result<M> {
        match self.populate_document(filter, fields).await? {
            Some(found) => {
                let mut merged = target.to_document()?;
                for (key, value) in found {
                    merged.insert(key, value);
                }
                M::from_document(merged)
            }
            None => Ok(target),
        }
    }
}
