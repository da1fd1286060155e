use std::sync::Arc;
use std::time::Duration;

use anyhow::Context as _;
use async_trait::async_trait;
use mongodb::bson::{doc, Document};
use mongodb::options::ClientOptions;
use mongodb::{Client, Collection, IndexModel};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::record::LogRecord;
use crate::store::LogStore;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Connection settings for the MongoDB-backed store; resolved by the
/// embedding application.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MongoLogConfig {
    pub uri: String,
    pub database: String,
    pub collection: String,
}

/// [`LogStore`] backed by a MongoDB collection.
///
/// Construction probes the deployment with a ping and fails outright rather
/// than degrade into a sink that can never write; callers keep the stdout
/// handler and skip the remote layer when this returns an error.
pub struct MongoStore {
    collection: Collection<Document>,
}

impl MongoStore {
    pub async fn from_config(config: &MongoLogConfig) -> anyhow::Result<Arc<Self>> {
        Self::connect(&config.uri, &config.database, &config.collection).await
    }

    pub async fn connect(uri: &str, database: &str, collection: &str) -> anyhow::Result<Arc<Self>> {
        let mut options = ClientOptions::parse(uri)
            .await
            .context("log: parse mongo uri")?;
        options.connect_timeout = Some(CONNECT_TIMEOUT);
        options.server_selection_timeout = Some(CONNECT_TIMEOUT);

        let client = Client::with_options(options).context("log: build mongo client")?;
        let db = client.database(database);
        db.run_command(doc! { "ping": 1 }, None)
            .await
            .context("log: ping mongo")?;
        info!(database, collection, "log: connected to document store");

        let collection = db.collection::<Document>(collection);

        // Time-descending index so recent-first queries stay cheap.
        let index = IndexModel::builder().keys(doc! { "time": -1 }).build();
        let _ = collection.create_index(index, None).await;

        Ok(Arc::new(Self { collection }))
    }
}

#[async_trait]
impl LogStore for MongoStore {
    async fn insert_batch(&self, batch: &[LogRecord]) -> anyhow::Result<()> {
        let documents: Vec<Document> = batch.iter().map(to_document).collect();
        self.collection
            .insert_many(documents, None)
            .await
            .context("log: insert batch")?;
        Ok(())
    }
}

fn to_document(record: &LogRecord) -> Document {
    let mut document = doc! {
        "time": mongodb::bson::DateTime::from_chrono(record.time),
        "level": record.level,
        "msg": record.msg.as_str(),
    };
    if let Some(request_id) = &record.request_id {
        document.insert("request_id", request_id.as_str());
    }
    if !record.attrs.is_empty() {
        if let Ok(attrs) = mongodb::bson::to_bson(&record.attrs) {
            document.insert("attrs", attrs);
        }
    }
    document
}
