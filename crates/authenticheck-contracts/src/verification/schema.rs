use serde_json::{json, Value};

use super::result::ProductStatus;

/// Output contract every verification request is constrained to. Sent to the
/// remote model as `responseSchema` and reused by [`validate`].
pub fn verification_schema() -> Value {
    let statuses: Vec<&str> = ProductStatus::ALL.iter().map(|status| status.as_str()).collect();
    json!({
        "type": "OBJECT",
        "properties": {
            "status": {
                "type": "STRING",
                "enum": statuses,
                "description": "The verification status of the product.",
            },
            "confidence": {
                "type": "NUMBER",
                "description": "The confidence score of the verification, from 0 to 100.",
            },
            "brand": {
                "type": "STRING",
                "description": "The brand name of the product identified from the image.",
            },
            "model": {
                "type": "STRING",
                "description": "The model name or identifier of the product.",
            },
            "reasons": {
                "type": "ARRAY",
                "description": "A list of reasons supporting the verification status.",
                "items": {
                    "type": "OBJECT",
                    "properties": {
                        "title": {
                            "type": "STRING",
                            "description": "A short title for the analysis point (e.g., \"Logo Authenticity\").",
                        },
                        "details": {
                            "type": "STRING",
                            "description": "A detailed explanation of the finding for this point.",
                        },
                        "passed": {
                            "type": "BOOLEAN",
                            "description": "Whether this specific check passed (true) or failed (false).",
                        },
                    },
                    "required": ["title", "details", "passed"],
                },
            },
        },
        "required": ["status", "confidence", "brand", "model", "reasons"],
    })
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    pub path: String,
    pub message: String,
}

impl std::fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Checks `value` against `schema`: declared types, required fields and enum
/// membership, recursing into object properties and array items. Returns
/// every violation found; an empty list means the value conforms.
pub fn validate(schema: &Value, value: &Value) -> Vec<SchemaViolation> {
    let mut violations = Vec::new();
    validate_node(schema, value, "", &mut violations);
    violations
}

fn validate_node(schema: &Value, value: &Value, path: &str, out: &mut Vec<SchemaViolation>) {
    let declared = schema
        .get("type")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_ascii_uppercase();
    if !declared.is_empty() && !matches_type(&declared, value) {
        out.push(SchemaViolation {
            path: path.to_string(),
            message: format!("expected {}, found {}", declared.to_ascii_lowercase(), type_name(value)),
        });
        return;
    }

    if let Some(allowed) = schema.get("enum").and_then(Value::as_array) {
        if !allowed.contains(value) {
            let options = allowed
                .iter()
                .filter_map(Value::as_str)
                .collect::<Vec<&str>>()
                .join(", ");
            out.push(SchemaViolation {
                path: path.to_string(),
                message: format!("{value} is not one of [{options}]"),
            });
        }
    }

    if let Some(object) = value.as_object() {
        if let Some(required) = schema.get("required").and_then(Value::as_array) {
            for field in required.iter().filter_map(Value::as_str) {
                if !object.contains_key(field) {
                    out.push(SchemaViolation {
                        path: join_path(path, field),
                        message: "required field missing".to_string(),
                    });
                }
            }
        }
        if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
            for (field, field_schema) in properties {
                if let Some(field_value) = object.get(field) {
                    validate_node(field_schema, field_value, &join_path(path, field), out);
                }
            }
        }
    }

    if let (Some(items), Some(item_schema)) = (value.as_array(), schema.get("items")) {
        for (idx, item) in items.iter().enumerate() {
            validate_node(item_schema, item, &format!("{path}[{idx}]"), out);
        }
    }
}

fn matches_type(declared: &str, value: &Value) -> bool {
    match declared {
        "OBJECT" => value.is_object(),
        "ARRAY" => value.is_array(),
        "STRING" => value.is_string(),
        "NUMBER" => value.is_number(),
        "INTEGER" => value.is_i64() || value.is_u64(),
        "BOOLEAN" => value.is_boolean(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

fn join_path(parent: &str, field: &str) -> String {
    if parent.is_empty() {
        field.to_string()
    } else {
        format!("{parent}.{field}")
    }
}
