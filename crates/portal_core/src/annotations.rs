use serde_json::Value;

use crate::record::Annotation;

/// Annotation values the extractor reports, first-seen across the annotation list.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct AnnotationFields {
    pub photo_z: Option<Value>,
    pub w1mpro: Option<Value>,
    pub w2mpro: Option<Value>,
    pub w3mpro: Option<Value>,
}

/// Scans annotations in order; the first annotation carrying a key wins and is never overwritten.
///
/// A JSON `null` leaves the field open for a later annotation.
pub fn extract_annotation_fields(annotations: &[Annotation]) -> AnnotationFields {
    let mut fields = AnnotationFields::default();
    for annotation in annotations {
        let data = &annotation.data;
        for (key, slot) in [
            ("photo_z", &mut fields.photo_z),
            ("w1mpro", &mut fields.w1mpro),
            ("w2mpro", &mut fields.w2mpro),
            ("w3mpro", &mut fields.w3mpro),
        ] {
            if slot.is_none() {
                if let Some(value) = data.get(key).filter(|value| !value.is_null()) {
                    *slot = Some(value.clone());
                }
            }
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn annotation(data: Value) -> Annotation {
        serde_json::from_value(json!({ "data": data })).unwrap()
    }

    #[test]
    fn first_annotation_with_key_wins() {
        let annotations = vec![
            annotation(json!({"photo_z": 0.12})),
            annotation(json!({"photo_z": 0.5, "w1mpro": 14.5, "w2mpro": 14.0})),
            annotation(json!({"w1mpro": 99.0, "w3mpro": "12.1"})),
        ];
        let fields = extract_annotation_fields(&annotations);
        assert_eq!(fields.photo_z, Some(json!(0.12)));
        assert_eq!(fields.w1mpro, Some(json!(14.5)));
        assert_eq!(fields.w2mpro, Some(json!(14.0)));
        assert_eq!(fields.w3mpro, Some(json!("12.1")));
    }

    #[test]
    fn null_values_do_not_claim_the_field() {
        let annotations = vec![
            annotation(json!({"photo_z": null})),
            annotation(json!({"photo_z": 0.3})),
        ];
        assert_eq!(extract_annotation_fields(&annotations).photo_z, Some(json!(0.3)));
    }

    #[test]
    fn missing_keys_stay_empty() {
        let fields = extract_annotation_fields(&[annotation(json!({"other": 1}))]);
        assert_eq!(fields, AnnotationFields::default());
    }
}
