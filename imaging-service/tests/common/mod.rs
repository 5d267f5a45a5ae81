#![allow(dead_code)]

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use imaging_service::config::{AllowedOrigins, HttpConfig};
use imaging_service::services::{ImageStore, MockImageStore};
use imaging_service::{build_router, AppState};
use mongodb::bson::{doc, oid::ObjectId, Document};
use std::sync::Arc;
use tower::util::ServiceExt;

pub const STORE_SIZE: i32 = 20;

/// A stored slice as written by the ingestion job. Every fourth index has a tumor mask.
pub fn sample_document(index: i32) -> Document {
    let has_mask = i32::from(index % 4 == 0);
    let mask_pixel = 255 * has_mask;
    let patient_id = format!("TCGA_CS_{:04}", index);
    doc! {
        "_id": ObjectId::new(),
        "original_index": index,
        "has_mask": has_mask,
        "patient_id": patient_id,
        "prediction_resnet50": { "0": 0.1, "1": 0.9 },
        "prediction_alexnet": { "0": 0.3, "1": 0.7 },
        "mri_image_64x64": [[index, 0], [0, index]],
        "mask_image_64x64": [[mask_pixel, 0], [0, 0]],
    }
}

pub fn populated_store() -> MockImageStore {
    MockImageStore::new((0..STORE_SIZE).map(sample_document).collect())
}

pub fn http_config() -> HttpConfig {
    HttpConfig {
        allowed_origins: AllowedOrigins::List(vec!["http://viewer.test".to_string()]),
        static_dir: None,
    }
}

pub fn app_with(store: impl ImageStore + 'static) -> Router {
    let store: Arc<dyn ImageStore> = Arc::new(store);
    build_router(AppState::new(Some(store)), &http_config())
}

pub fn unavailable_app() -> Router {
    build_router(AppState::unavailable(), &http_config())
}

pub async fn get(app: &Router, uri: &str) -> (StatusCode, serde_json::Value) {
    let response = app
        .clone()
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(serde_json::Value::Null)
    };

    (status, json)
}
