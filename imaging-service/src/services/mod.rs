pub mod database;
pub mod metrics;
pub mod store;

pub use database::{connect_image_store, MongoImageStore};
pub use self::metrics::{get_metrics, init_metrics};
pub use store::{ImageStore, MockImageStore};
