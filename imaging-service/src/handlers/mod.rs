pub mod health;
pub mod images;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use images::{get_image_by_index, get_random_images, get_random_tumor_images};
