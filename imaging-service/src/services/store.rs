use async_trait::async_trait;
use mongodb::bson::{Bson, Document};
use rand::seq::SliceRandom;
use service_core::error::AppError;

/// Read-only access to the collection of image records.
///
/// Sampling semantics are delegated to the implementation; callers only rely
/// on receiving at most `count` documents drawn from the candidate set.
#[async_trait]
pub trait ImageStore: Send + Sync {
    async fn find_by_index(&self, index: i64) -> Result<Option<Document>, AppError>;
    async fn sample(&self, count: u32) -> Result<Vec<Document>, AppError>;
    /// Like [`ImageStore::sample`] but restricted to records with `has_mask == 1`.
    async fn sample_with_mask(&self, count: u32) -> Result<Vec<Document>, AppError>;
    async fn health_check(&self) -> Result<(), AppError>;
}

/// In-memory store used by tests and local runs without MongoDB.
#[derive(Default)]
pub struct MockImageStore {
    records: Vec<Document>,
    failure: Option<String>,
}

impl MockImageStore {
    pub fn new(records: Vec<Document>) -> Self {
        Self {
            records,
            failure: None,
        }
    }

    /// Every query fails with `message`, as a broken connection would.
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            records: Vec::new(),
            failure: Some(message.into()),
        }
    }

    fn check(&self) -> Result<(), AppError> {
        match &self.failure {
            Some(message) => Err(AppError::DatabaseError(anyhow::anyhow!(message.clone()))),
            None => Ok(()),
        }
    }

    fn choose(&self, candidates: Vec<&Document>, count: u32) -> Vec<Document> {
        let mut rng = rand::thread_rng();
        candidates
            .choose_multiple(&mut rng, count as usize)
            .map(|doc| (*doc).clone())
            .collect()
    }
}

/// Numeric value of `key`, compared across BSON number types the way
/// MongoDB's equality match does (`1`, `1_i64` and `1.0` are all equal).
fn numeric_field(doc: &Document, key: &str) -> Option<f64> {
    match doc.get(key)? {
        Bson::Int32(v) => Some(f64::from(*v)),
        Bson::Int64(v) => Some(*v as f64),
        Bson::Double(v) => Some(*v),
        _ => None,
    }
}

#[async_trait]
impl ImageStore for MockImageStore {
    async fn find_by_index(&self, index: i64) -> Result<Option<Document>, AppError> {
        self.check()?;
        Ok(self
            .records
            .iter()
            .find(|doc| numeric_field(doc, "original_index") == Some(index as f64))
            .cloned())
    }

    async fn sample(&self, count: u32) -> Result<Vec<Document>, AppError> {
        self.check()?;
        Ok(self.choose(self.records.iter().collect(), count))
    }

    async fn sample_with_mask(&self, count: u32) -> Result<Vec<Document>, AppError> {
        self.check()?;
        let candidates = self
            .records
            .iter()
            .filter(|doc| numeric_field(doc, "has_mask") == Some(1.0))
            .collect();
        Ok(self.choose(candidates, count))
    }

    async fn health_check(&self) -> Result<(), AppError> {
        self.check()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::doc;
    use std::collections::HashSet;

    fn store() -> MockImageStore {
        MockImageStore::new(
            (0..10)
                .map(|i| doc! { "original_index": i, "has_mask": i32::from(i % 3 == 0) })
                .collect(),
        )
    }

    #[tokio::test]
    async fn test_find_by_index() {
        let store = store();
        let found = store.find_by_index(4).await.unwrap().unwrap();
        assert_eq!(found.get_i32("original_index").unwrap(), 4);
        assert!(store.find_by_index(99).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_sample_has_no_duplicates_and_is_bounded() {
        let store = store();
        let sample = store.sample(6).await.unwrap();
        assert_eq!(sample.len(), 6);

        let distinct: HashSet<i32> = sample
            .iter()
            .map(|d| d.get_i32("original_index").unwrap())
            .collect();
        assert_eq!(distinct.len(), 6);

        assert_eq!(store.sample(50).await.unwrap().len(), 10);
    }

    #[tokio::test]
    async fn test_sample_with_mask_filters() {
        let sample = store().sample_with_mask(10).await.unwrap();
        assert_eq!(sample.len(), 4);
        assert!(sample.iter().all(|d| d.get_i32("has_mask").unwrap() == 1));
    }

    #[tokio::test]
    async fn test_matching_ignores_numeric_type() {
        let store = MockImageStore::new(vec![
            doc! { "original_index": 5.0, "has_mask": 1.0 },
            doc! { "original_index": 6_i64 },
        ]);

        assert!(store.find_by_index(5).await.unwrap().is_some());
        assert!(store.find_by_index(6).await.unwrap().is_some());

        let masked = store.sample_with_mask(10).await.unwrap();
        assert_eq!(masked.len(), 1);
    }

    #[tokio::test]
    async fn test_failing_store() {
        let store = MockImageStore::failing("server selection timeout");
        assert!(matches!(
            store.find_by_index(1).await,
            Err(AppError::DatabaseError(_))
        ));
        assert!(store.health_check().await.is_err());
    }
}
