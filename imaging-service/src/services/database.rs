use crate::config::MongoConfig;
use crate::services::store::ImageStore;
use async_trait::async_trait;
use futures::stream::TryStreamExt;
use metrics::counter;
use mongodb::{
    bson::{doc, Document},
    options::{ClientOptions, Tls, TlsOptions},
    Client as MongoClient, Collection,
};
use secrecy::ExposeSecret;
use service_core::error::AppError;
use std::path::PathBuf;
use std::sync::Arc;

const APP_NAME: &str = "imaging-service";

/// MongoDB-backed image store bound to one database and collection.
#[derive(Clone)]
pub struct MongoImageStore {
    client: MongoClient,
    images: Collection<Document>,
}

impl MongoImageStore {
    /// Builds the client and confirms the deployment answers a `ping`.
    ///
    /// The driver connects lazily, so without the ping an unreachable server
    /// would only surface on the first request.
    pub async fn connect(config: &MongoConfig) -> Result<Self, AppError> {
        tracing::info!(
            database = %config.database,
            collection = %config.collection,
            tls_ca_file = ?config.tls_ca_file,
            "Connecting to MongoDB"
        );

        let mut options = ClientOptions::parse(config.uri.expose_secret()).await?;
        options.app_name = Some(APP_NAME.to_string());
        options.server_selection_timeout = Some(config.server_selection_timeout());

        if let Some(ca_file) = &config.tls_ca_file {
            options.tls = Some(Tls::Enabled(
                TlsOptions::builder()
                    .ca_file_path(PathBuf::from(ca_file))
                    .build(),
            ));
        }

        let client = MongoClient::with_options(options)?;
        let images = client
            .database(&config.database)
            .collection::<Document>(&config.collection);

        let store = Self { client, images };
        store.health_check().await?;

        tracing::info!(database = %config.database, "Successfully connected to MongoDB database");
        Ok(store)
    }

    async fn aggregate(
        &self,
        operation: &'static str,
        pipeline: Vec<Document>,
    ) -> Result<Vec<Document>, AppError> {
        let result = async {
            let cursor = self.images.aggregate(pipeline, None).await?;
            cursor.try_collect::<Vec<_>>().await
        }
        .await;

        record_query(operation, result.is_ok());
        Ok(result?)
    }
}

fn record_query(operation: &'static str, ok: bool) {
    let outcome = if ok { "ok" } else { "error" };
    counter!("image_store_queries_total", "operation" => operation, "outcome" => outcome)
        .increment(1);
}

#[async_trait]
impl ImageStore for MongoImageStore {
    async fn find_by_index(&self, index: i64) -> Result<Option<Document>, AppError> {
        let result = self
            .images
            .find_one(doc! { "original_index": index }, None)
            .await;

        record_query("find_by_index", result.is_ok());
        Ok(result?)
    }

    async fn sample(&self, count: u32) -> Result<Vec<Document>, AppError> {
        self.aggregate("sample", vec![doc! { "$sample": { "size": i64::from(count) } }])
            .await
    }

    async fn sample_with_mask(&self, count: u32) -> Result<Vec<Document>, AppError> {
        self.aggregate(
            "sample_with_mask",
            vec![
                doc! { "$match": { "has_mask": 1 } },
                doc! { "$sample": { "size": i64::from(count) } },
            ],
        )
        .await
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                AppError::from(e)
            })?;
        Ok(())
    }
}

/// Opens the process-wide store, or reports it unavailable.
///
/// A failed connection does not abort startup: the service keeps serving and
/// every data request answers with a database connection error.
pub async fn connect_image_store(config: &MongoConfig) -> Option<Arc<dyn ImageStore>> {
    match MongoImageStore::connect(config).await {
        Ok(store) => Some(Arc::new(store)),
        Err(e) => {
            tracing::error!(error = %e, "Failed to connect to MongoDB, serving without a database");
            None
        }
    }
}
