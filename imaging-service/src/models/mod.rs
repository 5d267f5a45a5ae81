pub mod image_record;

pub use image_record::{encode_document, ImageRecord};
