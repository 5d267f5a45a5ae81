use mongodb::bson::{Bson, Document};
use serde::Serialize;
use serde_json::{Map, Value};

/// One stored MRI slice together with its mask and model predictions, as it
/// leaves the service.
///
/// The stored document is passed through field for field; only `_id` is
/// rewritten (see [`encode_document`]). BSON-specific values are rendered as
/// plain JSON rather than extended JSON.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(transparent)]
pub struct ImageRecord(Map<String, Value>);

impl From<Document> for ImageRecord {
    fn from(doc: Document) -> Self {
        ImageRecord(
            encode_document(doc)
                .into_iter()
                .map(|(key, value)| (key, to_plain_json(value)))
                .collect(),
        )
    }
}

/// Replaces the store-assigned `_id` with its string form so the record can
/// leave the service as plain JSON. Documents without `_id` are returned as-is.
pub fn encode_document(mut doc: Document) -> Document {
    if let Some(id) = doc.get("_id") {
        let id = match id {
            Bson::ObjectId(oid) => oid.to_hex(),
            Bson::String(s) => s.clone(),
            other => other.to_string(),
        };
        doc.insert("_id", id);
    }
    doc
}

/// Object ids become hex strings and dates RFC 3339 strings; types with no
/// plain JSON counterpart fall back to relaxed extended JSON.
fn to_plain_json(value: Bson) -> Value {
    match value {
        Bson::Null | Bson::Undefined => Value::Null,
        Bson::Boolean(b) => Value::Bool(b),
        Bson::Int32(v) => Value::from(v),
        Bson::Int64(v) => Value::from(v),
        // NaN and infinities have no JSON number form.
        Bson::Double(v) => Value::from(v),
        Bson::String(s) => Value::String(s),
        Bson::ObjectId(oid) => Value::String(oid.to_hex()),
        Bson::DateTime(dt) => match dt.try_to_rfc3339_string() {
            Ok(s) => Value::String(s),
            Err(_) => Value::from(dt.timestamp_millis()),
        },
        Bson::Array(items) => Value::Array(items.into_iter().map(to_plain_json).collect()),
        Bson::Document(doc) => Value::Object(
            doc.into_iter()
                .map(|(key, value)| (key, to_plain_json(value)))
                .collect(),
        ),
        other => other.into_relaxed_extjson(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mongodb::bson::{doc, oid::ObjectId, DateTime};

    fn json(record: &ImageRecord) -> Value {
        serde_json::to_value(record).unwrap()
    }

    #[test]
    fn test_object_id_becomes_hex_string() {
        let oid = ObjectId::new();
        let encoded = encode_document(doc! { "_id": oid, "original_index": 623 });

        assert_eq!(encoded.get_str("_id").unwrap(), oid.to_hex());
        assert_eq!(encoded.get_i32("original_index").unwrap(), 623);
    }

    #[test]
    fn test_missing_id_passes_through() {
        let original = doc! { "original_index": 1, "has_mask": 0 };
        assert_eq!(encode_document(original.clone()), original);
    }

    #[test]
    fn test_string_and_numeric_ids() {
        let encoded = encode_document(doc! { "_id": "already-a-string" });
        assert_eq!(encoded.get_str("_id").unwrap(), "already-a-string");

        let encoded = encode_document(doc! { "_id": 42_i32 });
        assert_eq!(encoded.get_str("_id").unwrap(), "42");
    }

    #[test]
    fn test_record_keeps_every_field() {
        let oid = ObjectId::new();
        let record = ImageRecord::from(doc! {
            "_id": oid,
            "original_index": 623_i64,
            "has_mask": 1,
            "patient_id": "TCGA_CS_4941_19960909",
            "prediction_resnet50": { "0": 0.02, "1": 0.98 },
            "mask_image_64x64": [[0, 255], [255, 0]],
        });

        let json = json(&record);
        assert_eq!(json["_id"], oid.to_hex());
        assert_eq!(json["original_index"], 623);
        assert_eq!(json["has_mask"], 1);
        assert_eq!(json["patient_id"], "TCGA_CS_4941_19960909");
        assert_eq!(json["prediction_resnet50"]["1"], 0.98);
        assert_eq!(json["mask_image_64x64"][0][1], 255);
    }

    #[test]
    fn test_numeric_fields_keep_their_stored_type() {
        let record = ImageRecord::from(doc! { "original_index": 5.0, "has_mask": 1.0 });

        let json = json(&record);
        assert_eq!(json["original_index"], 5.0);
        assert_eq!(json["has_mask"], 1.0);
    }

    #[test]
    fn test_absent_fields_are_not_invented() {
        let record = ImageRecord::from(doc! { "patient_id": "TCGA_CS_0001" });

        let json = json(&record);
        assert!(json.get("has_mask").is_none());
        assert!(json.get("original_index").is_none());
        assert!(json.get("_id").is_none());
    }

    #[test]
    fn test_nested_bson_values_are_plain_json() {
        let nested = ObjectId::new();
        let record = ImageRecord::from(doc! {
            "ingested_at": DateTime::from_millis(0),
            "source": { "scan_id": nested, "tags": [nested] },
        });

        let json = json(&record);
        assert_eq!(json["ingested_at"], "1970-01-01T00:00:00Z");
        assert_eq!(json["source"]["scan_id"], nested.to_hex());
        assert_eq!(json["source"]["tags"][0], nested.to_hex());
    }
}
