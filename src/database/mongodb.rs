use futures_util::TryStreamExt;
use mongodb::{
    bson::{self, Bson, Document},
    options::FindOptions,
    Collection, Database,
};
use serde::de::DeserializeOwned;

use crate::error::Result;

#[derive(Debug, Clone)]
pub struct MongoDatabase {
    database: Database,
}

impl MongoDatabase {
    pub fn new(db: &Database) -> Self {
        Self {
            database: db.clone(),
        }
    }

    pub fn typed_collection<T>(&self, name: &str) -> Collection<T> {
        self.database.collection(name)
    }

    pub async fn collection_names(&self) -> Result<Vec<String>> {
        let mut names = self.database.list_collection_names(None).await?;
        names.sort();
        Ok(names)
    }

    /// Run an aggregation and deserialize every output document as `R`.
    pub async fn query<T, R>(&self, collection: &Collection<T>, stages: Vec<Document>) -> Result<Vec<R>>
    where
        R: DeserializeOwned,
    {
        let mut results: Vec<R> = Vec::new();
        let mut cursor = collection.aggregate(stages, None).await?;

        while cursor.advance().await? {
            let doc = cursor.deserialize_current()?;
            results.push(bson::from_bson(Bson::Document(doc))?);
        }

        Ok(results)
    }

    /// Run an aggregation, keeping raw documents.
    pub async fn query_docs<T>(
        &self,
        collection: &Collection<T>,
        stages: Vec<Document>,
    ) -> Result<Vec<Document>> {
        self.query(collection, stages).await
    }

    /// At most `limit` documents matching `filter`, sorted by `sort`.
    pub async fn find<T>(
        &self,
        collection: &Collection<T>,
        filter: Document,
        sort: Option<Document>,
        limit: Option<i64>,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned + Unpin + Send + Sync,
    {
        let options = FindOptions::builder().sort(sort).limit(limit).build();
        let cursor = collection.find(filter, options).await?;

        Ok(cursor.try_collect().await?)
    }
}
