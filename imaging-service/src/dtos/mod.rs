use serde::Deserialize;
use service_core::error::AppError;
use validator::Validate;

/// Path parameter of the point lookup, kept raw so that a non-integer yields a
/// JSON 400 instead of axum's plain-text rejection.
#[derive(Debug, Deserialize)]
pub struct IndexPath {
    pub index_id: String,
}

impl IndexPath {
    pub fn parse(&self) -> Result<i64, AppError> {
        self.index_id
            .trim()
            .parse()
            .map_err(|_| AppError::ValidationError("Index must be an integer".to_string()))
    }
}

#[derive(Debug, Deserialize)]
pub struct CountPath {
    pub count: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Validate)]
pub struct SampleRequest {
    #[validate(range(min = 1, message = "Count must be at least 1"))]
    pub count: i64,
}

impl SampleRequest {
    /// Requests beyond `u32::MAX` are clamped; the store never holds that many.
    pub fn size(&self) -> u32 {
        u32::try_from(self.count).unwrap_or(u32::MAX)
    }
}

impl TryFrom<&CountPath> for SampleRequest {
    type Error = AppError;

    fn try_from(path: &CountPath) -> Result<Self, Self::Error> {
        let count = path
            .count
            .trim()
            .parse()
            .map_err(|_| AppError::ValidationError("Count must be an integer".to_string()))?;

        let request = SampleRequest { count };
        request.validate()?;
        Ok(request)
    }
}
