//! Field metadata derived from an entity's JSON Schema document.
//!
//! The same document feeds two consumers: [`FieldMeta`] drives catalog
//! construction, and the compiled validator checks write payloads, so a form
//! built from the catalog can never drift from what the validator accepts.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use chrono::{NaiveDateTime, TimeZone, Utc};
use jsonschema::JSONSchema;
use serde_json::{Map, Value};

use super::descriptor::FieldValue;
use super::error::RepresentationError;

/// Strict RFC 3339 timestamp, used as the text pattern for `date-time` fields.
/// Month, day, hour, minute and second ranges match what the `date-time`
/// format check accepts; leap seconds are refused.
pub const DATE_TIME_PATTERN: &str = r"^\d{4}-(0[1-9]|1[0-2])-(0[1-9]|[12]\d|3[01])T([01]\d|2[0-3]):[0-5]\d:[0-5]\d(\.\d+)?(Z|[+-]([01]\d|2[0-3]):[0-5]\d)$";

#[derive(Debug, Clone, PartialEq)]
pub enum DeclaredType {
    String,
    Integer,
    Number,
    Boolean,
    Array,
    Object,
    Other(String),
}

impl DeclaredType {
    fn parse(s: &str) -> Self {
        match s {
            "string" => DeclaredType::String,
            "integer" => DeclaredType::Integer,
            "number" => DeclaredType::Number,
            "boolean" => DeclaredType::Boolean,
            "array" => DeclaredType::Array,
            "object" => DeclaredType::Object,
            other => DeclaredType::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            DeclaredType::String => "string",
            DeclaredType::Integer => "integer",
            DeclaredType::Number => "number",
            DeclaredType::Boolean => "boolean",
            DeclaredType::Array => "array",
            DeclaredType::Object => "object",
            DeclaredType::Other(s) => s,
        }
    }
}

impl fmt::Display for DeclaredType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct FieldConstraints {
    pub pattern: Option<String>,
    pub min_length: Option<u64>,
    pub max_length: Option<u64>,
    pub minimum: Option<f64>,
    pub maximum: Option<f64>,
}

/// Metadata for one declared property, in declaration order.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldMeta {
    pub name: String,
    pub title: Option<String>,
    pub declared: DeclaredType,
    pub format: Option<String>,
    /// Absent from `required`, or its type admits `null`.
    pub nullable: bool,
    /// The type itself admits `null`.
    pub accepts_null: bool,
    pub default: Option<FieldValue>,
    pub constraints: FieldConstraints,
    pub allowed_values: Vec<String>,
    pub long_form: bool,
    pub hidden: bool,
    pub system_managed: bool,
    pub filterable: bool,
    pub value: Option<FieldValue>,
}

impl FieldMeta {
    /// A minimal string field; handy for callers assembling metadata by hand.
    pub fn new(name: impl Into<String>, declared: DeclaredType) -> Self {
        Self {
            name: name.into(),
            title: None,
            declared,
            format: None,
            nullable: true,
            accepts_null: false,
            default: None,
            constraints: FieldConstraints::default(),
            allowed_values: Vec::new(),
            long_form: false,
            hidden: false,
            system_managed: false,
            filterable: true,
            value: None,
        }
    }

    pub fn is_date_time(&self) -> bool {
        self.format.as_deref() == Some("date-time")
    }

    fn from_property(name: &str, prop: &Value, required: bool) -> Self {
        let (declared, accepts_null) = match prop.get("type") {
            Some(Value::String(t)) => (DeclaredType::parse(t), t == "null"),
            Some(Value::Array(types)) => {
                let names: Vec<&str> = types.iter().filter_map(Value::as_str).collect();
                let accepts_null = names.contains(&"null");
                let declared = names
                    .iter()
                    .find(|t| **t != "null")
                    .map(|t| DeclaredType::parse(t))
                    .unwrap_or_else(|| DeclaredType::Other("null".to_string()));
                (declared, accepts_null)
            }
            // An untyped enum of strings still reads as a string field
            None if prop.get("enum").is_some() => (DeclaredType::String, false),
            _ => (DeclaredType::Other("any".to_string()), false),
        };
        let accepts_null = accepts_null || prop.get("nullable") == Some(&Value::Bool(true));

        let flag = |key: &str| prop.get(key).and_then(Value::as_bool);

        Self {
            name: name.to_string(),
            title: prop.get("title").and_then(Value::as_str).map(String::from),
            declared,
            format: prop.get("format").and_then(Value::as_str).map(String::from),
            nullable: accepts_null || !required,
            accepts_null,
            default: prop.get("default").and_then(FieldValue::from_json),
            constraints: FieldConstraints {
                pattern: prop.get("pattern").and_then(Value::as_str).map(String::from),
                min_length: prop.get("minLength").and_then(Value::as_u64),
                max_length: prop.get("maxLength").and_then(Value::as_u64),
                minimum: prop.get("minimum").and_then(Value::as_f64),
                maximum: prop.get("maximum").and_then(Value::as_f64),
            },
            allowed_values: prop
                .get("enum")
                .and_then(Value::as_array)
                .map(|values| values.iter().filter_map(Value::as_str).map(String::from).collect())
                .unwrap_or_default(),
            long_form: flag("x-long-form").unwrap_or(false),
            hidden: flag("x-hidden").unwrap_or(false),
            system_managed: flag("readOnly").unwrap_or(false),
            filterable: flag("x-filter").unwrap_or(true),
            value: None,
        }
    }
}

/// Parsed metadata plus the compiled validator for one entity type.
#[derive(Clone)]
pub struct EntitySchema {
    entity_type: String,
    fields: Vec<FieldMeta>,
    validator: Arc<JSONSchema>,
}

impl fmt::Debug for EntitySchema {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntitySchema")
            .field("entity_type", &self.entity_type)
            .field("fields", &self.fields)
            .finish_non_exhaustive()
    }
}

impl EntitySchema {
    pub fn from_json(
        entity_type: impl Into<String>,
        document: &Value,
    ) -> Result<Self, RepresentationError> {
        let entity_type = entity_type.into();
        let invalid = |reason: String| RepresentationError::InvalidSchema {
            entity_type: entity_type.clone(),
            reason,
        };

        let properties = document
            .get("properties")
            .and_then(Value::as_object)
            .ok_or_else(|| invalid("missing 'properties' object".to_string()))?;
        let required: Vec<&str> = document
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let fields = properties
            .iter()
            .map(|(name, prop)| FieldMeta::from_property(name, prop, required.contains(&name.as_str())))
            .collect();

        let validator = JSONSchema::compile(document).map_err(|e| invalid(e.to_string()))?;

        Ok(Self {
            entity_type,
            fields,
            validator: Arc::new(validator),
        })
    }

    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    pub fn fields(&self) -> &[FieldMeta] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldMeta> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// A copy whose field `name` accepts only `values`. The compiled validator
    /// is shared and unchanged; the restriction only shapes generated forms.
    pub fn with_allowed_values(&self, name: &str, values: Vec<String>) -> Self {
        let mut schema = self.clone();
        if let Some(field) = schema.fields.iter_mut().find(|f| f.name == name) {
            field.allowed_values = values;
        }
        schema
    }

    /// A copy carrying current values, e.g. the filter values of a request.
    pub fn with_values<I>(&self, values: I) -> Self
    where
        I: IntoIterator<Item = (String, FieldValue)>,
    {
        let mut schema = self.clone();
        for (name, value) in values {
            if let Some(field) = schema.fields.iter_mut().find(|f| f.name == name) {
                field.value = Some(value);
            }
        }
        schema
    }

    /// Fill in declared defaults for keys the payload leaves out.
    pub fn apply_defaults(&self, payload: &Map<String, Value>) -> Map<String, Value> {
        let mut filled = payload.clone();
        for field in &self.fields {
            if let Some(default) = &field.default {
                filled
                    .entry(field.name.clone())
                    .or_insert_with(|| default.to_json());
            }
        }
        filled
    }

    /// Validate a write payload against the schema. Defaults are applied first,
    /// so a field the template marks optional because of its default never
    /// fails a `required` check.
    pub fn validate(&self, payload: &Map<String, Value>) -> Result<Map<String, Value>, Vec<String>> {
        let filled = self.apply_defaults(payload);
        let instance = Value::Object(filled.clone());
        if let Err(errors) = self.validator.validate(&instance) {
            return Err(errors.map(|e| e.to_string()).collect());
        }
        Ok(filled)
    }

    /// Filter values from a query string that the query catalog can carry.
    /// Unknown names, blanks and values outside an enumeration are dropped.
    pub fn filter_values(&self, params: &HashMap<String, String>) -> Vec<(String, FieldValue)> {
        self.scalar_values(params, |f| f.filterable && !f.system_managed)
    }

    /// Submitted form values to echo back into a template after a failed write.
    pub fn form_values(&self, form: &HashMap<String, String>) -> Vec<(String, FieldValue)> {
        self.scalar_values(form, |f| !f.system_managed)
    }

    fn scalar_values(
        &self,
        params: &HashMap<String, String>,
        keep: impl Fn(&FieldMeta) -> bool,
    ) -> Vec<(String, FieldValue)> {
        self.fields
            .iter()
            .filter(|f| keep(f))
            .filter_map(|f| {
                let raw = params.get(&f.name)?.trim();
                if raw.is_empty() {
                    return None;
                }
                if !f.allowed_values.is_empty() && !f.allowed_values.iter().any(|v| v == raw) {
                    return None;
                }
                Some((f.name.clone(), FieldValue::from(raw)))
            })
            .collect()
    }

    /// Turn an HTML form submission into a typed JSON payload. Only writable
    /// declared fields are read; anything else (e.g. the CSRF token) is ignored.
    pub fn coerce_form(&self, form: &HashMap<String, String>) -> Map<String, Value> {
        let mut payload = Map::new();
        for field in self.fields.iter().filter(|f| !f.system_managed) {
            let raw = form.get(&field.name).map(|s| s.trim());

            if field.declared == DeclaredType::Boolean {
                // Checkbox semantics: presence means true
                let checked = matches!(raw, Some("on" | "true" | "1"));
                payload.insert(field.name.clone(), Value::Bool(checked));
                continue;
            }

            let Some(raw) = raw else { continue };
            if raw.is_empty() {
                if field.accepts_null {
                    payload.insert(field.name.clone(), Value::Null);
                } else if !field.nullable {
                    payload.insert(field.name.clone(), Value::String(String::new()));
                }
                continue;
            }

            let value = match field.declared {
                DeclaredType::Integer => raw
                    .parse::<i64>()
                    .map(Value::from)
                    .unwrap_or_else(|_| Value::String(raw.to_string())),
                DeclaredType::Number => raw
                    .parse::<f64>()
                    .ok()
                    .and_then(serde_json::Number::from_f64)
                    .map(Value::Number)
                    .unwrap_or_else(|| Value::String(raw.to_string())),
                _ if field.is_date_time() => Value::String(normalize_date_time(raw)),
                _ => Value::String(raw.to_string()),
            };
            payload.insert(field.name.clone(), value);
        }
        payload
    }
}

/// Browser `datetime-local` inputs submit `YYYY-MM-DDTHH:MM`; read those as UTC.
fn normalize_date_time(raw: &str) -> String {
    if chrono::DateTime::parse_from_rfc3339(raw).is_ok() {
        return raw.to_string();
    }
    ["%Y-%m-%dT%H:%M", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| Utc.from_utc_datetime(&naive).to_rfc3339())
        .unwrap_or_else(|| raw.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn note_schema() -> EntitySchema {
        EntitySchema::from_json(
            "note",
            &json!({
                "type": "object",
                "required": ["title", "pinned"],
                "properties": {
                    "id": { "type": "string", "readOnly": true },
                    "title": { "type": "string", "minLength": 1, "maxLength": 80 },
                    "pinned": { "type": "boolean", "default": false },
                    "body": { "type": ["string", "null"], "x-long-form": true },
                    "rank": { "type": "integer", "minimum": 0 },
                    "due": { "type": ["string", "null"], "format": "date-time" }
                }
            }),
        )
        .unwrap()
    }

    #[test]
    fn fields_keep_declaration_order() {
        let schema = note_schema();
        let names: Vec<&str> = schema.fields().iter().map(|f| f.name.as_str()).collect();
        assert_eq!(names, ["id", "title", "pinned", "body", "rank", "due"]);
    }

    #[test]
    fn nullability_from_required_and_type() {
        let schema = note_schema();
        assert!(!schema.field("title").unwrap().nullable);
        assert!(schema.field("body").unwrap().nullable);
        assert!(schema.field("body").unwrap().accepts_null);
        assert!(schema.field("rank").unwrap().nullable);
        assert!(!schema.field("rank").unwrap().accepts_null);
    }

    #[test]
    fn missing_properties_is_invalid() {
        let err = EntitySchema::from_json("broken", &json!({ "type": "object" })).unwrap_err();
        assert!(matches!(err, RepresentationError::InvalidSchema { .. }));
    }

    #[test]
    fn validate_applies_defaults() {
        let schema = note_schema();
        let mut payload = Map::new();
        payload.insert("title".into(), json!("Groceries"));
        let filled = schema.validate(&payload).unwrap();
        assert_eq!(filled.get("pinned"), Some(&json!(false)));
    }

    #[test]
    fn validate_reports_violations() {
        let schema = note_schema();
        let mut payload = Map::new();
        payload.insert("title".into(), json!(""));
        payload.insert("rank".into(), json!(-1));
        let errors = schema.validate(&payload).unwrap_err();
        assert_eq!(errors.len(), 2);
    }

    #[test]
    fn coerce_form_types_values() {
        let schema = note_schema();
        let form: HashMap<String, String> = [
            ("title", "Groceries"),
            ("rank", "3"),
            ("body", ""),
            ("due", "2025-06-01T09:30"),
            ("csrf_token", "abc"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let payload = schema.coerce_form(&form);
        assert_eq!(payload.get("title"), Some(&json!("Groceries")));
        assert_eq!(payload.get("rank"), Some(&json!(3)));
        assert_eq!(payload.get("pinned"), Some(&json!(false)));
        assert_eq!(payload.get("body"), Some(&Value::Null));
        assert_eq!(payload.get("due"), Some(&json!("2025-06-01T09:30:00+00:00")));
        assert!(payload.get("csrf_token").is_none());
        assert!(schema.validate(&payload).is_ok());
    }

    #[test]
    fn filter_values_drop_unknown_and_blank() {
        let schema = note_schema().with_allowed_values("title", vec!["a".into(), "b".into()]);
        let params: HashMap<String, String> = [("title", "zzz"), ("rank", "2"), ("id", "n1"), ("body", " ")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let values = schema.filter_values(&params);
        assert_eq!(values, vec![("rank".to_string(), FieldValue::from("2"))]);
    }

    #[test]
    fn form_values_keep_writable_fields() {
        let schema = note_schema();
        let form: HashMap<String, String> = [("title", "Draft"), ("id", "n1"), ("csrf_token", "abc")]
            .into_iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        assert_eq!(schema.form_values(&form), vec![("title".to_string(), FieldValue::from("Draft"))]);
    }

    #[test]
    fn with_allowed_values_only_touches_named_field() {
        let schema = note_schema().with_allowed_values("title", vec!["a".into(), "b".into()]);
        assert_eq!(schema.field("title").unwrap().allowed_values, ["a", "b"]);
        assert!(schema.field("body").unwrap().allowed_values.is_empty());
    }

    #[test]
    fn date_time_pattern_agrees_with_the_validator() {
        let schema = note_schema();
        let pattern = regex::Regex::new(DATE_TIME_PATTERN).unwrap();
        let candidates = [
            "2025-01-01T00:00:00Z",
            "2025-12-31T23:59:59Z",
            "2024-02-29T12:30:00.250+02:00",
            "1999-06-15T08:05:09-11:30",
            "2025-13-45T99:99:99Z",
            "2025-00-10T10:00:00Z",
            "2025-01-32T10:00:00Z",
            "2025-01-10T24:00:00Z",
            "2025-01-10T10:60:00Z",
            "2025-01-10T10:00:60Z",
            "2025-01-10T10:00:00+24:00",
            "2025-01-10 10:00:00Z",
        ];
        let mut accepted = 0;
        for raw in candidates {
            if !pattern.is_match(raw) {
                continue;
            }
            accepted += 1;
            let payload = json!({ "title": "Dated", "pinned": false, "due": raw });
            assert!(
                schema.validate(payload.as_object().unwrap()).is_ok(),
                "{raw} matches the pattern but fails validation"
            );
        }
        assert_eq!(accepted, 4);
        assert!(!pattern.is_match("2025-13-45T99:99:99Z"));
    }
}
