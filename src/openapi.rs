//! REST/OpenAPI extractor.
//!
//! Walks every path × HTTP verb of an OpenAPI/Swagger document and produces
//! one [`ResourceDescriptor`] per operation. Request/response shapes are
//! flattened into bounded-depth field trees: recursion into `properties`,
//! `items`, and `oneOf`/`anyOf`/`allOf` branches is guarded by a visited set
//! keyed on a structural fingerprint of each schema node, so self-referential
//! schemas terminate.
//!
//! Local `#/` refs are resolved lazily during the walk. A dangling ref inside
//! one operation fails only that operation (the descriptor then carries an
//! `error` detail); a document that cannot be parsed at all yields an empty
//! resource list.

use std::collections::HashSet;

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use crate::config::Dialect;
use crate::error::SourceError;
use crate::models::{DetailEntry, FieldDetail, ResourceDescriptor, ResourceKind};

const HTTP_VERBS: [(&str, ResourceKind); 5] = [
    ("get", ResourceKind::Get),
    ("post", ResourceKind::Post),
    ("put", ResourceKind::Put),
    ("delete", ResourceKind::Delete),
    ("patch", ResourceKind::Patch),
];

/// Parses raw OpenAPI document text, accepting JSON or YAML.
pub fn parse_document(text: &str) -> Result<Value, SourceError> {
    if let Ok(value) = serde_json::from_str(text) {
        return Ok(value);
    }
    serde_yaml::from_str(text).map_err(|e| SourceError::parse(Dialect::Rest, e))
}

/// Extracts one descriptor per path × verb. Malformed documents (no object
/// `paths`) yield an empty list; a single operation failing extraction
/// yields a descriptor carrying only `detail.error`.
pub fn extract_resources(doc: &Value) -> Vec<ResourceDescriptor> {
    let Some(paths) = doc.get("paths").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut resources = Vec::new();
    for (path, path_item) in paths {
        let Some(path_item) = path_item.as_object() else {
            continue;
        };

        for (verb, kind) in HTTP_VERBS {
            let Some(operation) = path_item.get(verb).and_then(Value::as_object) else {
                continue;
            };

            let name = format!("{} {}", kind.as_str(), path);
            let summary = operation
                .get("summary")
                .or_else(|| operation.get("description"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();

            let detail = match build_operation_detail(operation, doc) {
                Ok(detail) => detail,
                Err(reason) => DetailEntry::from_error(reason),
            };

            resources.push(ResourceDescriptor {
                name,
                resource_kind: kind,
                summary,
                detail,
            });
        }
    }

    resources
}

/// Builds the headers/request/response bundle for one operation. Any
/// resolution failure aborts this operation only.
fn build_operation_detail(
    operation: &Map<String, Value>,
    doc: &Value,
) -> Result<DetailEntry, String> {
    let mut header_fields = Vec::new();
    let mut param_fields = Vec::new();

    if let Some(params) = operation.get("parameters").and_then(Value::as_array) {
        for param in params {
            let param = resolve_ref(doc, param)?;
            let Some(name) = param.get("name").and_then(Value::as_str) else {
                continue;
            };

            let schema = param.get("schema").unwrap_or(&Value::Null);
            let mut field = FieldDetail::new(name, render_type(schema, doc));
            field.description = param
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string);
            field.required = Some(
                param
                    .get("required")
                    .and_then(Value::as_bool)
                    .unwrap_or(false),
            );

            let nested = extract_schema_fields(schema, doc, &HashSet::new())?;
            if !nested.is_empty() {
                field.fields = Some(nested);
            }

            let location = param.get("in").and_then(Value::as_str).unwrap_or("");
            if location == "header" {
                header_fields.push(field);
            } else {
                param_fields.push(field);
            }
        }
    }

    let mut request_body = Map::new();
    if let Some(body) = operation.get("requestBody") {
        let body = resolve_ref(doc, body)?;
        if let Some(content) = body.get("content").and_then(Value::as_object) {
            for (content_type, media) in content {
                let schema = media.get("schema").unwrap_or(&Value::Null);
                request_body.insert(
                    content_type.clone(),
                    schema_description(schema, doc)?,
                );
            }
        }
    }

    let mut response = Map::new();
    if let Some(responses) = operation.get("responses").and_then(Value::as_object) {
        for (status, response_obj) in responses {
            let response_obj = resolve_ref(doc, response_obj)?;
            let described = match first_content_schema(response_obj) {
                Some(schema) => schema_description(schema, doc)?,
                // No declared body for this status code.
                None => serde_json::json!({ "type": "empty" }),
            };
            response.insert(status.clone(), described);
        }
    }

    let mut detail = DetailEntry::default();
    if !header_fields.is_empty() {
        detail.headers = Some(encode(&header_fields)?);
    }
    if !param_fields.is_empty() || !request_body.is_empty() {
        let mut request = Map::new();
        if !param_fields.is_empty() {
            request.insert("parameters".into(), encode_value(&param_fields)?);
        }
        if !request_body.is_empty() {
            request.insert("body".into(), Value::Object(request_body));
        }
        detail.request = Some(encode(&Value::Object(request))?);
    }
    if !response.is_empty() {
        detail.response = Some(encode(&Value::Object(response))?);
    }

    Ok(detail)
}

/// The first declared content schema of a response object, if any.
fn first_content_schema(response_obj: &Value) -> Option<&Value> {
    response_obj
        .get("content")
        .and_then(Value::as_object)
        .and_then(|content| content.values().next())
        .and_then(|media| media.get("schema"))
}

/// `{type, fields?}` description of one schema node.
fn schema_description(schema: &Value, doc: &Value) -> Result<Value, String> {
    let mut described = Map::new();
    described.insert("type".into(), Value::String(render_type(schema, doc)));

    let fields = extract_schema_fields(schema, doc, &HashSet::new())?;
    if !fields.is_empty() {
        described.insert("fields".into(), encode_value(&fields)?);
    }

    Ok(Value::Object(described))
}

/// Flattens a schema node into a field list.
///
/// Arrays are flattened one level (the element's fields replace the array's
/// own list) and composition branches are concatenated. The visited set keys
/// schema nodes by structural fingerprint within one recursive descent;
/// a repeated node stops expansion.
fn extract_schema_fields(
    schema: &Value,
    doc: &Value,
    visited: &HashSet<String>,
) -> Result<Vec<FieldDetail>, String> {
    let schema = resolve_ref(doc, schema)?;
    if !schema.is_object() {
        return Ok(Vec::new());
    }

    let print = fingerprint(schema);
    if visited.contains(&print) {
        return Ok(Vec::new());
    }
    let mut visited = visited.clone();
    visited.insert(print);

    let mut out = Vec::new();

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        let required: HashSet<&str> = schema
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        for (name, prop) in properties {
            let prop_resolved = resolve_ref(doc, prop)?;

            let mut field = FieldDetail::new(name, render_type(prop, doc));
            field.description = prop_resolved
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string);
            field.required = Some(required.contains(name.as_str()));

            if let Some(values) = enum_values(prop_resolved) {
                field.enum_values = Some(values);
            }

            let nested = extract_schema_fields(prop, doc, &visited)?;
            if !nested.is_empty() {
                field.fields = Some(nested);
            }

            out.push(field);
        }
    }

    if let Some(items) = schema.get("items") {
        out.extend(extract_schema_fields(items, doc, &visited)?);
    }

    for key in ["oneOf", "anyOf", "allOf"] {
        if let Some(branches) = schema.get(key).and_then(Value::as_array) {
            for branch in branches {
                out.extend(extract_schema_fields(branch, doc, &visited)?);
            }
        }
    }

    Ok(out)
}

/// Renders a schema node's type name.
///
/// Arrays render as `[T]`, composition as `oneOf<A | B>` / `anyOf<A | B>` /
/// `allOf<A & B>`, primitives with a format as `type(format)`, anything
/// unrecognized as `unknown`.
fn render_type(schema: &Value, doc: &Value) -> String {
    render_type_guarded(schema, doc, &HashSet::new())
}

fn render_type_guarded(schema: &Value, doc: &Value, visited: &HashSet<String>) -> String {
    let Ok(schema) = resolve_ref(doc, schema) else {
        return "unknown".to_string();
    };
    if !schema.is_object() {
        return "unknown".to_string();
    }

    let print = fingerprint(schema);
    if visited.contains(&print) {
        return "unknown".to_string();
    }
    let mut visited = visited.clone();
    visited.insert(print);

    for (key, separator) in [("oneOf", " | "), ("anyOf", " | "), ("allOf", " & ")] {
        if let Some(branches) = schema.get(key).and_then(Value::as_array) {
            let rendered: Vec<String> = branches
                .iter()
                .map(|b| render_type_guarded(b, doc, &visited))
                .collect();
            return format!("{key}<{}>", rendered.join(separator));
        }
    }

    let ty = schema.get("type").and_then(Value::as_str);
    if ty == Some("array") {
        let element = match schema.get("items") {
            Some(items) => render_type_guarded(items, doc, &visited),
            None => "unknown".to_string(),
        };
        return format!("[{element}]");
    }

    if let Some(ty) = ty {
        return match schema.get("format").and_then(Value::as_str) {
            Some(format) => format!("{ty}({format})"),
            None => ty.to_string(),
        };
    }

    if schema.get("properties").is_some() {
        return "object".to_string();
    }

    "unknown".to_string()
}

/// Declared enum values of a schema node, stringified.
fn enum_values(schema: &Value) -> Option<Vec<String>> {
    let values = schema.get("enum")?.as_array()?;
    Some(
        values
            .iter()
            .map(|v| match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect(),
    )
}

/// Follows `$ref` chains to the referenced node. Only local (`#/`) refs are
/// supported; anything else is an extraction error for the operation that
/// touched it.
fn resolve_ref<'a>(doc: &'a Value, schema: &'a Value) -> Result<&'a Value, String> {
    let mut current = schema;
    let mut hops = 0;
    while let Some(reference) = current.get("$ref").and_then(Value::as_str) {
        hops += 1;
        if hops > 32 {
            return Err(format!("$ref chain too deep at {reference}"));
        }
        let pointer = reference
            .strip_prefix('#')
            .ok_or_else(|| format!("unsupported non-local $ref {reference}"))?;
        current = doc
            .pointer(pointer)
            .ok_or_else(|| format!("unresolvable $ref {reference}"))?;
    }
    Ok(current)
}

/// Structural fingerprint of a schema node: the SHA-256 of its canonical
/// JSON text. Keys nodes rather than names, since dereferenced documents may
/// repeat anonymous shapes.
fn fingerprint(schema: &Value) -> String {
    let mut hasher = Sha256::new();
    hasher.update(schema.to_string().as_bytes());
    format!("{:x}", hasher.finalize())
}

fn encode<T: serde::Serialize>(value: &T) -> Result<String, String> {
    serde_json::to_string(value).map_err(|e| e.to_string())
}

fn encode_value<T: serde::Serialize>(value: &T) -> Result<Value, String> {
    serde_json::to_value(value).map_err(|e| e.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn users_doc() -> Value {
        json!({
            "openapi": "3.0.0",
            "info": { "title": "Users", "version": "1.0.0" },
            "paths": {
                "/users": {
                    "get": {
                        "summary": "Get all users",
                        "parameters": [
                            { "name": "x-trace-id", "in": "header",
                              "schema": { "type": "string" } },
                            { "name": "limit", "in": "query", "required": true,
                              "schema": { "type": "integer", "format": "int32" } }
                        ],
                        "responses": {
                            "200": {
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "type": "array",
                                            "items": { "$ref": "#/components/schemas/User" }
                                        }
                                    }
                                }
                            },
                            "204": { "description": "nothing" }
                        }
                    },
                    "post": {
                        "description": "Create a user",
                        "requestBody": {
                            "content": {
                                "application/json": {
                                    "schema": { "$ref": "#/components/schemas/User" }
                                }
                            }
                        },
                        "responses": {}
                    }
                }
            },
            "components": {
                "schemas": {
                    "User": {
                        "type": "object",
                        "required": ["id"],
                        "properties": {
                            "id": { "type": "string", "format": "uuid" },
                            "role": { "type": "string", "enum": ["admin", "member"] }
                        }
                    }
                }
            }
        })
    }

    #[test]
    fn emits_one_descriptor_per_path_and_verb() {
        let resources = extract_resources(&users_doc());
        let names: Vec<&str> = resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["GET /users", "POST /users"]);

        let get = &resources[0];
        assert_eq!(get.resource_kind, ResourceKind::Get);
        assert_eq!(get.summary, "Get all users");
        assert_eq!(resources[1].summary, "Create a user");
    }

    #[test]
    fn splits_header_and_query_parameters() {
        let resources = extract_resources(&users_doc());
        let detail = &resources[0].detail;

        let headers: Vec<FieldDetail> =
            serde_json::from_str(detail.headers.as_ref().unwrap()).unwrap();
        assert_eq!(headers.len(), 1);
        assert_eq!(headers[0].name, "x-trace-id");
        assert_eq!(headers[0].required, Some(false));

        let request: Value = serde_json::from_str(detail.request.as_ref().unwrap()).unwrap();
        let params = request["parameters"].as_array().unwrap();
        assert_eq!(params.len(), 1);
        assert_eq!(params[0]["name"], "limit");
        assert_eq!(params[0]["type"], "integer(int32)");
        assert_eq!(params[0]["required"], true);
    }

    #[test]
    fn renders_array_responses_and_empty_placeholder() {
        let resources = extract_resources(&users_doc());
        let response: Value =
            serde_json::from_str(resources[0].detail.response.as_ref().unwrap()).unwrap();

        assert_eq!(response["200"]["type"], "[object]");
        let fields = response["200"]["fields"].as_array().unwrap();
        assert_eq!(fields[0]["name"], "id");
        assert_eq!(fields[0]["type"], "string(uuid)");
        assert_eq!(fields[0]["required"], true);
        assert_eq!(
            fields[1]["enumValues"],
            json!(["admin", "member"])
        );

        assert_eq!(response["204"]["type"], "empty");
    }

    #[test]
    fn request_body_fields_appear_per_content_type() {
        let resources = extract_resources(&users_doc());
        let request: Value =
            serde_json::from_str(resources[1].detail.request.as_ref().unwrap()).unwrap();

        let body = &request["body"]["application/json"];
        assert_eq!(body["type"], "object");
        assert_eq!(body["fields"].as_array().unwrap().len(), 2);
    }

    #[test]
    fn self_referential_schema_terminates() {
        let doc = json!({
            "paths": {
                "/tree": {
                    "get": {
                        "responses": {
                            "200": {
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Node" }
                                    }
                                }
                            }
                        }
                    }
                }
            },
            "components": {
                "schemas": {
                    "Node": {
                        "type": "object",
                        "properties": {
                            "value": { "type": "string" },
                            "children": {
                                "type": "array",
                                "items": { "$ref": "#/components/schemas/Node" }
                            }
                        }
                    }
                }
            }
        });

        let resources = extract_resources(&doc);
        assert_eq!(resources.len(), 1);

        let response: Value =
            serde_json::from_str(resources[0].detail.response.as_ref().unwrap()).unwrap();
        let fields = response["200"]["fields"].as_array().unwrap();
        assert!(fields.iter().any(|f| f["name"] == "value"));

        // The repeated Node is already open on this path; no further nesting.
        let children = fields.iter().find(|f| f["name"] == "children").unwrap();
        assert_eq!(children["type"], "[object]");
        assert!(children.get("fields").is_none());
    }

    #[test]
    fn renders_composition_types() {
        let doc = json!({
            "paths": {
                "/pets": {
                    "get": {
                        "responses": {
                            "200": {
                                "content": {
                                    "application/json": {
                                        "schema": {
                                            "oneOf": [
                                                { "type": "string" },
                                                { "type": "integer" }
                                            ]
                                        }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        });

        let resources = extract_resources(&doc);
        let response: Value =
            serde_json::from_str(resources[0].detail.response.as_ref().unwrap()).unwrap();
        assert_eq!(response["200"]["type"], "oneOf<string | integer>");
    }

    #[test]
    fn dangling_ref_fails_only_that_operation() {
        let doc = json!({
            "paths": {
                "/ok": {
                    "get": { "responses": { "200": { "description": "fine" } } }
                },
                "/broken": {
                    "get": {
                        "responses": {
                            "200": {
                                "content": {
                                    "application/json": {
                                        "schema": { "$ref": "#/components/schemas/Missing" }
                                    }
                                }
                            }
                        }
                    }
                }
            }
        });

        let resources = extract_resources(&doc);
        assert_eq!(resources.len(), 2);

        let broken = resources.iter().find(|r| r.name == "GET /broken").unwrap();
        assert!(broken.detail.error.as_ref().unwrap().contains("Missing"));
        assert!(broken.detail.request.is_none());
        assert!(broken.detail.response.is_none());

        let ok = resources.iter().find(|r| r.name == "GET /ok").unwrap();
        assert!(ok.detail.error.is_none());
    }

    #[test]
    fn malformed_document_yields_no_resources() {
        assert!(extract_resources(&json!({ "paths": "nope" })).is_empty());
        assert!(extract_resources(&json!({ "openapi": "3.0.0" })).is_empty());
    }

    #[test]
    fn parses_yaml_documents() {
        let text = "openapi: 3.0.0\npaths:\n  /ping:\n    get:\n      summary: Ping\n";
        let doc = parse_document(text).unwrap();
        let resources = extract_resources(&doc);
        assert_eq!(resources[0].name, "GET /ping");
        assert_eq!(resources[0].summary, "Ping");
    }
}
