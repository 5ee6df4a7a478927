//! Record shapes that structured language-model output must conform to.
//!
//! - [`Location`]: a place mentioned by an article
//! - [`DisasterEvent`]: the pipeline's terminal artifact, one per relevant article
//!
//! Decoding is strict: [`decode`] parses the backend's raw JSON into the
//! target type and then runs [`StructuredOutput::validate`]. Type
//! mismatches, missing required fields, unknown fields and out-of-range
//! values are reported as [`SchemaViolation`] and never coerced.
//!
//! Schemas are derived from the structs with `schemars`, so the schema
//! sent to the backend and the decoder always agree on field names.

use crate::error::SchemaViolation;
use crate::utils::{looks_truncated, strip_code_blocks};
use schemars::{JsonSchema, schema_for};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A type the backend can be asked to produce as structured output.
pub trait StructuredOutput: JsonSchema + DeserializeOwned {
    /// Schema name sent alongside the JSON schema.
    const NAME: &'static str;

    /// JSON schema in the strict form OpenAI-compatible backends accept:
    /// every property listed in `required`, optional ones nullable,
    /// `additionalProperties: false` on every object and no `$ref`s.
    fn json_schema() -> Value {
        let mut value = serde_json::to_value(schema_for!(Self)).unwrap_or_default();
        fix_object_schemas(&mut value);
        inline_refs(&mut value);
        if let Value::Object(map) = &mut value {
            map.remove("definitions");
            map.remove("$schema");
        }
        value
    }

    /// Range checks the JSON schema cannot express reliably.
    fn validate(&self) -> Result<(), SchemaViolation> {
        Ok(())
    }
}

/// Close every object schema and mark all of its properties required.
fn fix_object_schemas(value: &mut Value) {
    match value {
        Value::Object(map) => {
            if map.get("type") == Some(&Value::String("object".to_string())) {
                map.insert("additionalProperties".to_string(), Value::Bool(false));
                if let Some(Value::Object(props)) = map.get("properties") {
                    let all_keys: Vec<Value> =
                        props.keys().map(|k| Value::String(k.clone())).collect();
                    map.insert("required".to_string(), Value::Array(all_keys));
                }
            }
            for (_, v) in map.iter_mut() {
                fix_object_schemas(v);
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                fix_object_schemas(item);
            }
        }
        _ => {}
    }
}

/// Replace `#/definitions/...` references with the definitions themselves.
fn inline_refs(value: &mut Value) {
    let definitions = match value {
        Value::Object(map) => map.get("definitions").cloned(),
        _ => None,
    };
    if let Some(defs) = definitions {
        inline_refs_recursive(value, &defs);
    }
}

fn inline_refs_recursive(value: &mut Value, definitions: &Value) {
    match value {
        Value::Object(map) => {
            let def = match map.get("$ref") {
                Some(Value::String(ref_path)) => ref_path
                    .strip_prefix("#/definitions/")
                    .and_then(|name| definitions.get(name))
                    .cloned(),
                _ => None,
            };
            if let Some(def) = def {
                *value = def;
                inline_refs_recursive(value, definitions);
                return;
            }
            for (_, v) in map.iter_mut() {
                inline_refs_recursive(v, definitions);
            }
        }
        Value::Array(arr) => {
            for item in arr.iter_mut() {
                inline_refs_recursive(item, definitions);
            }
        }
        _ => {}
    }
}

/// Parse and validate a raw structured response.
pub fn decode<T: StructuredOutput>(raw: &str) -> Result<T, SchemaViolation> {
    let value: T = serde_json::from_str(strip_code_blocks(raw)).map_err(|e| {
        if looks_truncated(&e) {
            SchemaViolation::Truncated {
                schema: T::NAME,
                message: e.to_string(),
            }
        } else {
            SchemaViolation::Decode {
                schema: T::NAME,
                message: e.to_string(),
            }
        }
    })?;
    value.validate()?;
    Ok(value)
}

/// A geographic location detected in an article.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct Location {
    /// Name of the city/region/country mentioned.
    pub name: String,
    /// The country if known or inferred.
    pub country: Option<String>,
    /// Latitude if the model can infer it.
    pub latitude: Option<f64>,
    /// Longitude if the model can infer it.
    pub longitude: Option<f64>,
}

impl Location {
    /// A location with only a name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            country: None,
            latitude: None,
            longitude: None,
        }
    }

    /// Both coordinates, or `None` when the pair is incomplete or not a
    /// valid position on the globe.
    pub fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lon))
                if (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lon) =>
            {
                Some((lat, lon))
            }
            _ => None,
        }
    }
}

/// Structured information extracted from a news article describing a disaster.
///
/// `is_disaster_related` alone decides confirmation; `confidence` is a
/// calibration signal in `[0.0, 1.0]`, not itself a filter.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DisasterEvent {
    /// The original title of the news article.
    pub title: Option<String>,
    /// Whether this article is truly about a natural disaster.
    pub is_disaster_related: bool,
    /// Type of disaster (e.g., 'Flood', 'Wildfire', 'Earthquake', 'Landslide', 'Storm', etc.).
    pub disaster_type: Option<String>,
    /// List of geographic locations mentioned in the article.
    #[serde(default)]
    pub locations: Vec<Location>,
    /// Short summary of the event, including the impact and location.
    pub summary: String,
    /// Date of the disaster (if detected).
    pub event_date: Option<String>,
    /// Reported casualties or injuries, if any.
    pub casualties: Option<String>,
    /// Confidence score (0.0 to 1.0) on whether this is a real, specific disaster event.
    pub confidence: f64,
    /// The source URL of the news article.
    pub source_url: Option<String>,
}

impl StructuredOutput for DisasterEvent {
    const NAME: &'static str = "DisasterEvent";

    fn validate(&self) -> Result<(), SchemaViolation> {
        if !self.confidence.is_finite() || !(0.0..=1.0).contains(&self.confidence) {
            return Err(SchemaViolation::OutOfRange {
                schema: Self::NAME,
                field: "confidence",
                reason: format!("must be within [0.0, 1.0], got {}", self.confidence),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    const FLOOD: &str = r#"{
        "title": "Flood hits coastal town",
        "is_disaster_related": true,
        "disaster_type": "Flood",
        "locations": [{"name": "coastal town", "country": null, "latitude": null, "longitude": null}],
        "summary": "Flooding inundated a coastal town.",
        "event_date": null,
        "casualties": "2 injured",
        "confidence": 0.9,
        "source_url": "https://example.com/flood"
    }"#;

    #[test]
    fn test_decode_valid_event() {
        let event: DisasterEvent = decode(FLOOD).unwrap();
        assert!(event.is_disaster_related);
        assert_eq!(event.disaster_type.as_deref(), Some("Flood"));
        assert_eq!(event.locations, vec![Location::named("coastal town")]);
        assert_eq!(event.casualties.as_deref(), Some("2 injured"));
        assert_eq!(event.confidence, 0.9);
    }

    #[test]
    fn test_optional_fields_may_be_omitted() {
        let raw = r#"{"is_disaster_related": false, "summary": "Budget talks.", "confidence": 0.1}"#;
        let event: DisasterEvent = decode(raw).unwrap();
        assert!(!event.is_disaster_related);
        assert!(event.locations.is_empty());
        assert_eq!(event.disaster_type, None);
        assert_eq!(event.source_url, None);
    }

    #[test]
    fn test_decode_strips_code_fence() {
        let fenced = format!("```json\n{FLOOD}\n```");
        assert!(decode::<DisasterEvent>(&fenced).is_ok());
    }

    #[test]
    fn test_confidence_above_one_is_rejected() {
        let raw = r#"{"is_disaster_related": true, "summary": "Quake.", "confidence": 1.5}"#;
        let err = decode::<DisasterEvent>(raw).unwrap_err();
        assert!(matches!(
            err,
            SchemaViolation::OutOfRange {
                field: "confidence",
                ..
            }
        ));
    }

    #[test]
    fn test_missing_required_field_is_rejected() {
        let raw = r#"{"is_disaster_related": true, "confidence": 0.5}"#;
        let err = decode::<DisasterEvent>(raw).unwrap_err();
        match err {
            SchemaViolation::Decode { schema, message } => {
                assert_eq!(schema, "DisasterEvent");
                assert!(message.contains("summary"));
            }
            other => panic!("unexpected violation: {other:?}"),
        }
    }

    #[test]
    fn test_wrong_type_is_not_coerced() {
        let raw = r#"{"is_disaster_related": "yes", "summary": "s", "confidence": 0.5}"#;
        assert!(matches!(
            decode::<DisasterEvent>(raw),
            Err(SchemaViolation::Decode { .. })
        ));

        let raw = r#"{"is_disaster_related": true, "summary": "s", "confidence": "0.5"}"#;
        assert!(matches!(
            decode::<DisasterEvent>(raw),
            Err(SchemaViolation::Decode { .. })
        ));
    }

    #[test]
    fn test_cut_off_response_is_truncated() {
        let cut = &FLOOD[..FLOOD.len() / 2];
        assert!(matches!(
            decode::<DisasterEvent>(cut),
            Err(SchemaViolation::Truncated { schema: "DisasterEvent", .. })
        ));
    }

    #[test]
    fn test_not_json_is_rejected() {
        assert!(matches!(
            decode::<DisasterEvent>("relevant"),
            Err(SchemaViolation::Decode { .. })
        ));
    }

    #[test]
    fn test_single_coordinate_is_unknown() {
        let mut loc = Location::named("Valencia");
        loc.latitude = Some(39.47);
        assert_eq!(loc.coordinates(), None);

        loc.latitude = None;
        loc.longitude = Some(-0.37);
        assert_eq!(loc.coordinates(), None);

        loc.latitude = Some(39.47);
        assert_eq!(loc.coordinates(), Some((39.47, -0.37)));
    }

    #[test]
    fn test_out_of_globe_coordinates_are_unknown() {
        let loc = Location {
            name: "Nowhere".into(),
            country: None,
            latitude: Some(123.0),
            longitude: Some(10.0),
        };
        assert_eq!(loc.coordinates(), None);
    }

    #[test]
    fn test_schema_is_strict() {
        let schema = <DisasterEvent as StructuredOutput>::json_schema();
        assert_eq!(schema["additionalProperties"], json!(false));
        let required = schema["required"].as_array().unwrap();
        let properties = schema["properties"].as_object().unwrap();
        assert_eq!(required.len(), properties.len());
        for key in properties.keys() {
            assert!(required.contains(&json!(key)), "{key} not required");
        }

        let items = &schema["properties"]["locations"]["items"];
        assert!(items.get("$ref").is_none(), "Location should be inlined");
        assert_eq!(items["type"], json!("object"));
        assert_eq!(items["additionalProperties"], json!(false));
        assert_eq!(items["required"].as_array().unwrap().len(), 4);

        assert!(schema.get("definitions").is_none());
        assert!(schema.get("$schema").is_none());
    }

    #[test]
    fn test_schema_follows_struct_fields() {
        let event: DisasterEvent = decode(FLOOD).unwrap();
        let serialized = serde_json::to_value(&event).unwrap();
        let schema = <DisasterEvent as StructuredOutput>::json_schema();

        let mut fields: Vec<&String> = serialized.as_object().unwrap().keys().collect();
        let mut properties: Vec<&String> = schema["properties"].as_object().unwrap().keys().collect();
        fields.sort();
        properties.sort();
        assert_eq!(fields, properties);

        let location = serde_json::to_value(&event.locations[0]).unwrap();
        let mut fields: Vec<&String> = location.as_object().unwrap().keys().collect();
        let mut properties: Vec<&String> = schema["properties"]["locations"]["items"]["properties"]
            .as_object()
            .unwrap()
            .keys()
            .collect();
        fields.sort();
        properties.sort();
        assert_eq!(fields, properties);
    }

    #[test]
    fn test_optional_fields_are_nullable_in_schema() {
        let schema = <DisasterEvent as StructuredOutput>::json_schema();
        let properties = &schema["properties"];
        assert_eq!(properties["title"]["type"], json!(["string", "null"]));
        assert_eq!(properties["summary"]["type"], json!("string"));
        assert_eq!(properties["confidence"]["type"], json!("number"));
        assert_eq!(properties["locations"]["type"], json!("array"));
        assert_eq!(
            properties["locations"]["items"]["properties"]["latitude"]["type"],
            json!(["number", "null"])
        );
        assert_eq!(
            properties["locations"]["description"],
            json!("List of geographic locations mentioned in the article.")
        );
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let raw = r#"{"is_disaster_related": true, "summary": "s", "confidence": 0.5, "severity": "high"}"#;
        match decode::<DisasterEvent>(raw).unwrap_err() {
            SchemaViolation::Decode { message, .. } => assert!(message.contains("severity")),
            other => panic!("unexpected violation: {other:?}"),
        }

        let raw = r#"{"is_disaster_related": true, "summary": "s", "confidence": 0.5,
                      "locations": [{"name": "x", "elevation": 3}]}"#;
        match decode::<DisasterEvent>(raw).unwrap_err() {
            SchemaViolation::Decode { message, .. } => assert!(message.contains("elevation")),
            other => panic!("unexpected violation: {other:?}"),
        }
    }

    proptest! {
        #[test]
        fn prop_confidence_accepted_iff_in_unit_interval(confidence in -2.0f64..3.0) {
            let raw = json!({
                "is_disaster_related": true,
                "summary": "s",
                "confidence": confidence,
            })
            .to_string();
            let decoded = decode::<DisasterEvent>(&raw);
            if (0.0..=1.0).contains(&confidence) {
                prop_assert!(decoded.is_ok());
                prop_assert!((0.0..=1.0).contains(&decoded.unwrap().confidence));
            } else {
                prop_assert!(decoded.is_err());
            }
        }
    }
}
