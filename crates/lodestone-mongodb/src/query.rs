//! Query builder for MongoDB find operations

use bson::{doc, Document as BsonDocument};
use futures::TryStreamExt;
use lodestone_common::{LodestoneError, Result};
use mongodb::options::{FindOneOptions, FindOptions};
use tracing::{debug, instrument};

use crate::collection::ModelCollection;
use crate::model::Model;

/// Which terminal behavior `exec` takes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryMode {
    /// Single document; no match is an error
    One,
    /// Every matching document, in cursor order
    #[default]
    Many,
}

/// Output of [`QueryBuilder::exec`]
#[derive(Debug, Clone, PartialEq)]
pub enum QueryResult<M> {
    One(M),
    Many(Vec<M>),
}

impl<M> QueryResult<M> {
    /// The single document of a `find_one` query
    pub fn into_one(self) -> Result<M> {
        match self {
            QueryResult::One(model) => Ok(model),
            QueryResult::Many(_) => Err(LodestoneError::Query(
                "expected a single document, the query was a multi-document find".to_string(),
            )),
        }
    }

    /// All documents; a single result becomes a one-element list
    pub fn into_many(self) -> Vec<M> {
        match self {
            QueryResult::One(model) => vec![model],
            QueryResult::Many(models) => models,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            QueryResult::One(_) => 1,
            QueryResult::Many(models) => models.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Query builder for MongoDB find operations.
///
/// Setters may be called in any order and are not validated; values reach
/// the server as given. A skip or limit of zero leaves the option unset.
pub struct QueryBuilder<M: Model> {
    collection: ModelCollection<M>,
    filter: BsonDocument,
    sort: Option<BsonDocument>,
    skip: Option<u64>,
    limit: Option<i64>,
    projection: Option<BsonDocument>,
    mode: QueryMode,
    populate: Option<Vec<String>>,
}

impl<M: Model> QueryBuilder<M> {
    /// Create a new query builder matching every document
    pub fn new(collection: ModelCollection<M>) -> Self {
        Self {
            collection,
            filter: BsonDocument::new(),
            sort: None,
            skip: None,
            limit: None,
            projection: None,
            mode: QueryMode::Many,
            populate: None,
        }
    }

    /// Multi-document mode; `None` keeps the current filter
    pub fn find(mut self, filter: impl Into<Option<BsonDocument>>) -> Self {
        if let Some(filter) = filter.into() {
            self.filter = filter;
        }
        self.mode = QueryMode::Many;
        self
    }

    /// Single-document mode
    pub fn find_one(mut self, filter: BsonDocument) -> Self {
        self.filter = filter;
        self.mode = QueryMode::One;
        self
    }

    /// Set the filter document
    pub fn filter(mut self, filter: BsonDocument) -> Self {
        self.filter = filter;
        self
    }

    /// Set the sort order
    pub fn sort(mut self, sort: BsonDocument) -> Self {
        self.sort = Some(sort);
        self
    }

    /// Set the number of documents to skip
    pub fn skip(mut self, skip: u64) -> Self {
        self.skip = (skip != 0).then_some(skip);
        self
    }

    /// Set the maximum number of documents to return
    pub fn limit(mut self, limit: i64) -> Self {
        self.limit = (limit != 0).then_some(limit);
        self
    }

    /// Set the projection
    pub fn projection(mut self, projection: BsonDocument) -> Self {
        self.projection = Some(projection);
        self
    }

    /// Resolve these relations on every returned document
    pub fn populate<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.populate = Some(fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn get_filter(&self) -> &BsonDocument {
        &self.filter
    }

    pub fn get_sort(&self) -> Option<&BsonDocument> {
        self.sort.as_ref()
    }

    pub fn get_skip(&self) -> Option<u64> {
        self.skip
    }

    pub fn get_limit(&self) -> Option<i64> {
        self.limit
    }

    pub fn get_projection(&self) -> Option<&BsonDocument> {
        self.projection.as_ref()
    }

    pub fn get_mode(&self) -> QueryMode {
        self.mode
    }

    pub fn get_populate(&self) -> Option<&[String]> {
        self.populate.as_deref()
    }

    /// Execute the query.
    ///
    /// `One` mode fails with [`LodestoneError::NotFound`] when nothing
    /// matches. With populate fields set, `One` mode runs the populate
    /// pipeline on the filter and ignores projection, sort and skip.
    /// `Many` mode returns every document, populated one by one when
    /// populate fields are set; an empty result is not an error.
    #[instrument(skip(self))]
    pub async fn exec(self) -> Result<QueryResult<M>> {
        self.collection.screen(&self.filter)?;
        debug!(
            collection = self.collection.name(),
            mode = ?self.mode,
            populate = self.populate.as_ref().map_or(0, Vec::len),
            "Executing query"
        );

        match self.mode {
            QueryMode::One => self.fetch_one().await.map(QueryResult::One),
            QueryMode::Many => self.fetch_many().await.map(QueryResult::Many),
        }
    }

    /// Execute and return every document as a list
    pub async fn to_list(self) -> Result<Vec<M>> {
        Ok(self.exec().await?.into_many())
    }

    async fn fetch_one(self) -> Result<M> {
        let QueryBuilder {
            collection,
            filter,
            sort,
            skip,
            projection,
            populate,
            ..
        } = self;

        if let Some(fields) = populate {
            return collection
                .populate_first(filter, fields.as_slice())
                .await?
                .ok_or(LodestoneError::NotFound);
        }

        let mut options = FindOneOptions::default();
        options.projection = projection;
        options.sort = sort;
        options.skip = skip;

        let inner = collection.inner().clone();
        let found = collection
            .context()
            .run(async move {
                Ok::<_, LodestoneError>(inner.find_one(filter).with_options(options).await?)
            })
            .await?;

        match found {
            Some(doc) => M::from_document(doc),
            None => Err(LodestoneError::NotFound),
        }
    }

    async fn fetch_many(self) -> Result<Vec<M>> {
        let QueryBuilder {
            collection,
            filter,
            sort,
            skip,
            limit,
            projection,
            populate,
            ..
        } = self;

        let mut options = FindOptions::default();
        options.projection = projection;
        options.sort = sort;
        options.skip = skip;
        options.limit = limit;

        let results = collection
            .context()
            .run(async {
                // the cursor is dropped, and closed server-side, on every return path
                let mut cursor = collection.inner().find(filter).with_options(options).await?;

                let mut results = Vec::new();
                while let Some(doc) = cursor.try_next().await? {
                    let model = M::from_document(doc)?;
                    let model = match &populate {
                        Some(fields) => {
                            let id = model.id().ok_or_else(|| {
                                LodestoneError::Query(format!(
                                    "cannot populate a {} without an _id",
                                    M::type_name()
                                ))
                            })?;
                            collection.populate(model, doc! { "_id": id }, fields.as_slice()).await?
                        }
                        None => model,
                    };
                    results.push(model);
                }
                Ok::<_, LodestoneError>(results)
            })
            .await?;

        debug!(count = results.len(), "Query returned documents");
        Ok(results)
    }
}

impl<M: Model> std::fmt::Debug for QueryBuilder<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("QueryBuilder")
            .field("collection", &self.collection.name())
            .field("filter", &self.filter)
            .field("sort", &self.sort)
            .field("skip", &self.skip)
            .field("limit", &self.limit)
            .field("projection", &self.projection)
            .field("mode", &self.mode)
            .field("populate", &self.populate)
            .finish()
    }
}
