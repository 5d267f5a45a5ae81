use crate::dtos::{CountPath, IndexPath, SampleRequest};
use crate::models::ImageRecord;
use crate::startup::AppState;
use axum::{
    extract::{Path, State},
    Json,
};
use mongodb::bson::Document;
use service_core::error::AppError;
use tracing::instrument;

/// `GET /image/index/:index_id/`: the record whose `original_index` matches.
#[instrument(skip(state), fields(handler = "get_image_by_index"))]
pub async fn get_image_by_index(
    State(state): State<AppState>,
    Path(path): Path<IndexPath>,
) -> Result<Json<ImageRecord>, AppError> {
    let index = path.parse()?;
    let store = state.store()?;

    let document = store.find_by_index(index).await?.ok_or_else(|| {
        AppError::NotFound(anyhow::anyhow!("No document found with index {}", index))
    })?;

    Ok(Json(ImageRecord::from(document)))
}

/// `GET /images/random/:count/`: up to `count` records drawn at random.
#[instrument(skip(state), fields(handler = "get_random_images"))]
pub async fn get_random_images(
    State(state): State<AppState>,
    Path(path): Path<CountPath>,
) -> Result<Json<Vec<ImageRecord>>, AppError> {
    let store = state.store()?;
    let request = SampleRequest::try_from(&path)?;

    let documents = store.sample(request.size()).await?;
    tracing::debug!(requested = request.count, returned = documents.len(), "Sampled images");

    to_records(documents, "No documents found")
}

/// `GET /images/random_tumor/:count/`: like [`get_random_images`], restricted
/// to records with a tumor mask.
#[instrument(skip(state), fields(handler = "get_random_tumor_images"))]
pub async fn get_random_tumor_images(
    State(state): State<AppState>,
    Path(path): Path<CountPath>,
) -> Result<Json<Vec<ImageRecord>>, AppError> {
    let store = state.store()?;
    let request = SampleRequest::try_from(&path)?;

    let documents = store.sample_with_mask(request.size()).await?;
    tracing::debug!(requested = request.count, returned = documents.len(), "Sampled tumor images");

    to_records(documents, "No documents with tumors found")
}

fn to_records(
    documents: Vec<Document>,
    empty_message: &'static str,
) -> Result<Json<Vec<ImageRecord>>, AppError> {
    if documents.is_empty() {
        return Err(AppError::NotFound(anyhow::anyhow!(empty_message)));
    }

    Ok(Json(documents.into_iter().map(ImageRecord::from).collect()))
}
