//! GraphQL extractor.
//!
//! Normalizes a GraphQL schema — obtained from an introspection response or
//! an SDL file — into one [`ResourceDescriptor`] per query, mutation, and
//! subscription root field. Return types are flattened into field trees;
//! recursion is guarded by a per-traversal set of visited type names, so
//! self-referential type graphs (`Comment.replies: [Comment]`) terminate.

use std::collections::BTreeMap;
use std::collections::HashSet;

use serde::Deserialize;

use crate::config::Dialect;
use crate::error::SourceError;
use crate::models::{DetailEntry, FieldDetail, ResourceDescriptor, ResourceKind};

/// A possibly wrapped reference to a named type.
#[derive(Debug, Clone)]
pub enum TypeRef {
    Named(String),
    NonNull(Box<TypeRef>),
    List(Box<TypeRef>),
}

impl TypeRef {
    /// External rendering: `!` for non-null and `[...]` for list, re-applied
    /// in the nesting order they were encountered.
    pub fn render(&self) -> String {
        match self {
            TypeRef::Named(name) => name.clone(),
            TypeRef::NonNull(inner) => format!("{}!", inner.render()),
            TypeRef::List(inner) => format!("[{}]", inner.render()),
        }
    }

    /// The named type at the bottom of the wrapper stack.
    pub fn unwrap_named(&self) -> &str {
        match self {
            TypeRef::Named(name) => name,
            TypeRef::NonNull(inner) | TypeRef::List(inner) => inner.unwrap_named(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GqlField {
    pub name: String,
    pub description: Option<String>,
    pub args: Vec<GqlInputValue>,
    pub ty: TypeRef,
}

#[derive(Debug, Clone)]
pub struct GqlInputValue {
    pub name: String,
    pub description: Option<String>,
    pub ty: TypeRef,
}

#[derive(Debug, Clone)]
pub enum GqlTypeKind {
    Object { fields: Vec<GqlField> },
    InputObject { fields: Vec<GqlInputValue> },
    Enum { values: Vec<String> },
    /// Scalars, interfaces, and unions: never expanded into field trees.
    Opaque,
}

#[derive(Debug, Clone)]
pub struct GqlType {
    pub description: Option<String>,
    pub kind: GqlTypeKind,
}

/// Uniform schema model built from either an introspection response or SDL
/// text.
#[derive(Debug, Clone, Default)]
pub struct GqlSchema {
    types: BTreeMap<String, GqlType>,
    query: Option<String>,
    mutation: Option<String>,
    subscription: Option<String>,
}

impl GqlSchema {
    fn type_description(&self, name: &str) -> Option<String> {
        self.types.get(name).and_then(|t| t.description.clone())
    }
}

// ---------------------------------------------------------------------------
// Introspection JSON

#[derive(Deserialize)]
struct IntrospectionRoot {
    #[serde(rename = "__schema")]
    schema: IntrospectionSchema,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntrospectionSchema {
    query_type: Option<IntrospectionNamedRef>,
    mutation_type: Option<IntrospectionNamedRef>,
    subscription_type: Option<IntrospectionNamedRef>,
    types: Vec<IntrospectionType>,
}

#[derive(Deserialize)]
struct IntrospectionNamedRef {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntrospectionType {
    kind: String,
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    fields: Option<Vec<IntrospectionField>>,
    #[serde(default)]
    input_fields: Option<Vec<IntrospectionInputValue>>,
    #[serde(default)]
    enum_values: Option<Vec<IntrospectionEnumValue>>,
}

#[derive(Deserialize)]
struct IntrospectionField {
    name: String,
    description: Option<String>,
    #[serde(default)]
    args: Vec<IntrospectionInputValue>,
    #[serde(rename = "type")]
    ty: IntrospectionTypeRef,
}

#[derive(Deserialize)]
struct IntrospectionInputValue {
    name: String,
    description: Option<String>,
    #[serde(rename = "type")]
    ty: IntrospectionTypeRef,
}

#[derive(Deserialize)]
struct IntrospectionEnumValue {
    name: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IntrospectionTypeRef {
    kind: String,
    name: Option<String>,
    of_type: Option<Box<IntrospectionTypeRef>>,
}

impl IntrospectionTypeRef {
    fn to_type_ref(&self) -> TypeRef {
        match (self.kind.as_str(), &self.of_type) {
            ("NON_NULL", Some(inner)) => TypeRef::NonNull(Box::new(inner.to_type_ref())),
            ("LIST", Some(inner)) => TypeRef::List(Box::new(inner.to_type_ref())),
            _ => TypeRef::Named(self.name.clone().unwrap_or_else(|| "Unknown".to_string())),
        }
    }
}

/// Builds the schema model from an introspection payload. Accepts both the
/// raw `{"__schema": ...}` shape and a `{"data": {"__schema": ...}}`
/// response wrapper.
pub fn schema_from_introspection(value: &serde_json::Value) -> Result<GqlSchema, SourceError> {
    let unwrapped = value.get("data").unwrap_or(value);
    let root: IntrospectionRoot = serde_json::from_value(unwrapped.clone())
        .map_err(|e| SourceError::parse(Dialect::GraphQl, e))?;

    let mut schema = GqlSchema {
        query: root.schema.query_type.map(|t| t.name),
        mutation: root.schema.mutation_type.map(|t| t.name),
        subscription: root.schema.subscription_type.map(|t| t.name),
        ..GqlSchema::default()
    };

    for ty in root.schema.types {
        let Some(name) = ty.name else { continue };
        if name.starts_with("__") {
            continue;
        }

        let kind = match ty.kind.as_str() {
            "OBJECT" => GqlTypeKind::Object {
                fields: ty
                    .fields
                    .unwrap_or_default()
                    .into_iter()
                    .map(|f| GqlField {
                        name: f.name,
                        description: f.description,
                        args: f.args.into_iter().map(input_value_from_intro).collect(),
                        ty: f.ty.to_type_ref(),
                    })
                    .collect(),
            },
            "INPUT_OBJECT" => GqlTypeKind::InputObject {
                fields: ty
                    .input_fields
                    .unwrap_or_default()
                    .into_iter()
                    .map(input_value_from_intro)
                    .collect(),
            },
            "ENUM" => GqlTypeKind::Enum {
                values: ty
                    .enum_values
                    .unwrap_or_default()
                    .into_iter()
                    .map(|v| v.name)
                    .collect(),
            },
            _ => GqlTypeKind::Opaque,
        };

        schema.types.insert(
            name,
            GqlType {
                description: ty.description,
                kind,
            },
        );
    }

    Ok(schema)
}

fn input_value_from_intro(value: IntrospectionInputValue) -> GqlInputValue {
    GqlInputValue {
        name: value.name,
        description: value.description,
        ty: value.ty.to_type_ref(),
    }
}

// ---------------------------------------------------------------------------
// SDL

/// Builds the schema model from SDL text.
pub fn schema_from_sdl(text: &str) -> Result<GqlSchema, SourceError> {
    use graphql_parser::schema::{Definition, Type, TypeDefinition};

    let document = graphql_parser::schema::parse_schema::<String>(text)
        .map_err(|e| SourceError::parse(Dialect::GraphQl, e))?;

    fn convert_type(ty: &Type<'_, String>) -> TypeRef {
        match ty {
            Type::NamedType(name) => TypeRef::Named(name.clone()),
            Type::ListType(inner) => TypeRef::List(Box::new(convert_type(inner))),
            Type::NonNullType(inner) => TypeRef::NonNull(Box::new(convert_type(inner))),
        }
    }

    let mut schema = GqlSchema::default();
    let mut roots_declared = false;

    for definition in &document.definitions {
        match definition {
            Definition::SchemaDefinition(def) => {
                roots_declared = true;
                schema.query = def.query.clone();
                schema.mutation = def.mutation.clone();
                schema.subscription = def.subscription.clone();
            }
            Definition::TypeDefinition(TypeDefinition::Object(object)) => {
                let fields = object
                    .fields
                    .iter()
                    .map(|f| GqlField {
                        name: f.name.clone(),
                        description: f.description.clone(),
                        args: f
                            .arguments
                            .iter()
                            .map(|a| GqlInputValue {
                                name: a.name.clone(),
                                description: a.description.clone(),
                                ty: convert_type(&a.value_type),
                            })
                            .collect(),
                        ty: convert_type(&f.field_type),
                    })
                    .collect();
                schema.types.insert(
                    object.name.clone(),
                    GqlType {
                        description: object.description.clone(),
                        kind: GqlTypeKind::Object { fields },
                    },
                );
            }
            Definition::TypeDefinition(TypeDefinition::InputObject(input)) => {
                let fields = input
                    .fields
                    .iter()
                    .map(|f| GqlInputValue {
                        name: f.name.clone(),
                        description: f.description.clone(),
                        ty: convert_type(&f.value_type),
                    })
                    .collect();
                schema.types.insert(
                    input.name.clone(),
                    GqlType {
                        description: input.description.clone(),
                        kind: GqlTypeKind::InputObject { fields },
                    },
                );
            }
            Definition::TypeDefinition(TypeDefinition::Enum(en)) => {
                schema.types.insert(
                    en.name.clone(),
                    GqlType {
                        description: en.description.clone(),
                        kind: GqlTypeKind::Enum {
                            values: en.values.iter().map(|v| v.name.clone()).collect(),
                        },
                    },
                );
            }
            Definition::TypeDefinition(other) => {
                let (name, description) = match other {
                    TypeDefinition::Scalar(s) => (s.name.clone(), s.description.clone()),
                    TypeDefinition::Interface(i) => (i.name.clone(), i.description.clone()),
                    TypeDefinition::Union(u) => (u.name.clone(), u.description.clone()),
                    _ => continue,
                };
                schema.types.insert(
                    name,
                    GqlType {
                        description,
                        kind: GqlTypeKind::Opaque,
                    },
                );
            }
            _ => {}
        }
    }

    // Without an explicit schema block the conventional root names apply.
    if !roots_declared {
        for (slot, conventional) in [
            (&mut schema.query, "Query"),
            (&mut schema.mutation, "Mutation"),
            (&mut schema.subscription, "Subscription"),
        ] {
            if schema.types.contains_key(conventional) {
                *slot = Some(conventional.to_string());
            }
        }
    }

    Ok(schema)
}

// ---------------------------------------------------------------------------
// Extraction

/// Emits one descriptor per root-type field. Absent root types contribute
/// nothing.
pub fn extract_resources(schema: &GqlSchema) -> Vec<ResourceDescriptor> {
    let roots = [
        (schema.query.as_deref(), ResourceKind::Query),
        (schema.mutation.as_deref(), ResourceKind::Mutation),
        (schema.subscription.as_deref(), ResourceKind::Subscription),
    ];

    let mut resources = Vec::new();
    for (root, kind) in roots {
        let Some(GqlType {
            kind: GqlTypeKind::Object { fields },
            ..
        }) = root.and_then(|name| schema.types.get(name))
        else {
            continue;
        };

        for field in fields {
            resources.push(build_root_field(field, kind, schema));
        }
    }

    resources
}

fn build_root_field(field: &GqlField, kind: ResourceKind, schema: &GqlSchema) -> ResourceDescriptor {
    let request: Vec<FieldDetail> = field
        .args
        .iter()
        .map(|arg| build_field_detail(&arg.name, &arg.ty, arg.description.clone(), schema))
        .collect();

    let mut response = serde_json::Map::new();
    response.insert("type".into(), field.ty.render().into());
    response.insert(
        "description".into(),
        schema
            .type_description(field.ty.unwrap_named())
            .map(serde_json::Value::String)
            .unwrap_or(serde_json::Value::Null),
    );

    let response_fields = extract_type_fields(&field.ty, schema, &HashSet::new());
    if !response_fields.is_empty() {
        response.insert(
            "fields".into(),
            serde_json::to_value(&response_fields).unwrap_or_default(),
        );
    }

    ResourceDescriptor {
        name: field.name.clone(),
        resource_kind: kind,
        summary: field.description.clone().unwrap_or_default(),
        detail: DetailEntry {
            request: serde_json::to_string(&request).ok(),
            response: serde_json::to_string(&serde_json::Value::Object(response)).ok(),
            ..DetailEntry::default()
        },
    }
}

fn build_field_detail(
    name: &str,
    ty: &TypeRef,
    description: Option<String>,
    schema: &GqlSchema,
) -> FieldDetail {
    let mut detail = FieldDetail::new(name, ty.render());
    detail.description = description;

    if let Some(values) = enum_values(ty, schema) {
        detail.enum_values = Some(values);
    }

    let fields = extract_type_fields(ty, schema, &HashSet::new());
    if !fields.is_empty() {
        detail.fields = Some(fields);
    }

    detail
}

/// Expands the named type behind `ty` into a field list. Only object and
/// input-object types expand; the visited set (type names, scoped to one
/// top-level traversal) stops a type already open on the current path.
fn extract_type_fields(ty: &TypeRef, schema: &GqlSchema, visited: &HashSet<String>) -> Vec<FieldDetail> {
    let type_name = ty.unwrap_named();
    if visited.contains(type_name) {
        return Vec::new();
    }
    let mut visited = visited.clone();
    visited.insert(type_name.to_string());

    match schema.types.get(type_name).map(|t| &t.kind) {
        Some(GqlTypeKind::Object { fields }) => fields
            .iter()
            .map(|f| nested_field_detail(&f.name, &f.ty, f.description.clone(), schema, &visited))
            .collect(),
        Some(GqlTypeKind::InputObject { fields }) => fields
            .iter()
            .map(|f| nested_field_detail(&f.name, &f.ty, f.description.clone(), schema, &visited))
            .collect(),
        _ => Vec::new(),
    }
}

fn nested_field_detail(
    name: &str,
    ty: &TypeRef,
    description: Option<String>,
    schema: &GqlSchema,
    visited: &HashSet<String>,
) -> FieldDetail {
    let mut detail = FieldDetail::new(name, ty.render());
    detail.description = description;

    if let Some(values) = enum_values(ty, schema) {
        detail.enum_values = Some(values);
    }

    if !visited.contains(ty.unwrap_named()) {
        let nested = extract_type_fields(ty, schema, visited);
        if !nested.is_empty() {
            detail.fields = Some(nested);
        }
    }

    detail
}

fn enum_values(ty: &TypeRef, schema: &GqlSchema) -> Option<Vec<String>> {
    match schema.types.get(ty.unwrap_named()).map(|t| &t.kind) {
        Some(GqlTypeKind::Enum { values }) => Some(values.clone()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const SDL: &str = r#"
        "User lookups"
        type Query {
            "Fetch one user"
            user(id: ID!): User
            users: [User!]!
        }

        type Mutation {
            createUser(input: CreateUserInput!): User
        }

        type User {
            id: ID!
            name: String
            status: Status
            manager: User
        }

        input CreateUserInput {
            name: String!
            status: Status
        }

        enum Status {
            ACTIVE
            SUSPENDED
        }
    "#;

    #[test]
    fn emits_one_descriptor_per_root_field() {
        let schema = schema_from_sdl(SDL).unwrap();
        let resources = extract_resources(&schema);

        let names: Vec<&str> = resources.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["user", "users", "createUser"]);
        assert_eq!(resources[0].resource_kind, ResourceKind::Query);
        assert_eq!(resources[2].resource_kind, ResourceKind::Mutation);
        assert_eq!(resources[0].summary, "Fetch one user");
    }

    #[test]
    fn request_lists_arguments_with_wrapped_types() {
        let schema = schema_from_sdl(SDL).unwrap();
        let resources = extract_resources(&schema);

        let request: serde_json::Value =
            serde_json::from_str(resources[0].detail.request.as_ref().unwrap()).unwrap();
        let args = request.as_array().unwrap();
        assert_eq!(args.len(), 1);
        assert_eq!(args[0]["name"], "id");
        assert_eq!(args[0]["type"], "ID!");

        let users: serde_json::Value =
            serde_json::from_str(resources[1].detail.response.as_ref().unwrap()).unwrap();
        assert_eq!(users["type"], "[User!]!");
    }

    #[test]
    fn response_fields_carry_enum_values_and_stop_on_cycles() {
        let schema = schema_from_sdl(SDL).unwrap();
        let resources = extract_resources(&schema);

        let response: serde_json::Value =
            serde_json::from_str(resources[0].detail.response.as_ref().unwrap()).unwrap();
        let fields = response["fields"].as_array().unwrap();

        let status = fields.iter().find(|f| f["name"] == "status").unwrap();
        assert_eq!(status["enumValues"], json!(["ACTIVE", "SUSPENDED"]));

        // manager: User recurs; it renders its type but expands no further.
        let manager = fields.iter().find(|f| f["name"] == "manager").unwrap();
        assert_eq!(manager["type"], "User");
        assert!(manager.get("fields").is_none());
    }

    #[test]
    fn input_object_arguments_expand() {
        let schema = schema_from_sdl(SDL).unwrap();
        let resources = extract_resources(&schema);

        let request: serde_json::Value =
            serde_json::from_str(resources[2].detail.request.as_ref().unwrap()).unwrap();
        let input = &request.as_array().unwrap()[0];
        assert_eq!(input["type"], "CreateUserInput!");
        let fields = input["fields"].as_array().unwrap();
        assert_eq!(fields[0]["name"], "name");
        assert_eq!(fields[0]["type"], "String!");
    }

    #[test]
    fn self_referential_list_terminates() {
        let sdl = r#"
            type Query { comments: [Comment] }
            type Comment { body: String replies: [Comment] }
        "#;
        let schema = schema_from_sdl(sdl).unwrap();
        let resources = extract_resources(&schema);

        let response: serde_json::Value =
            serde_json::from_str(resources[0].detail.response.as_ref().unwrap()).unwrap();
        let fields = response["fields"].as_array().unwrap();
        let replies = fields.iter().find(|f| f["name"] == "replies").unwrap();
        assert_eq!(replies["type"], "[Comment]");
        assert!(replies.get("fields").is_none());
    }

    #[test]
    fn builds_from_introspection_with_data_wrapper() {
        let introspection = json!({
            "data": {
                "__schema": {
                    "queryType": { "name": "Query" },
                    "mutationType": null,
                    "subscriptionType": null,
                    "types": [
                        {
                            "kind": "OBJECT",
                            "name": "Query",
                            "description": null,
                            "fields": [
                                {
                                    "name": "user",
                                    "description": "Fetch one user",
                                    "args": [
                                        {
                                            "name": "id",
                                            "description": null,
                                            "type": {
                                                "kind": "NON_NULL",
                                                "name": null,
                                                "ofType": { "kind": "SCALAR", "name": "ID" }
                                            }
                                        }
                                    ],
                                    "type": { "kind": "OBJECT", "name": "User" }
                                }
                            ]
                        },
                        {
                            "kind": "OBJECT",
                            "name": "User",
                            "description": "A user record",
                            "fields": [
                                {
                                    "name": "id",
                                    "description": null,
                                    "args": [],
                                    "type": {
                                        "kind": "NON_NULL",
                                        "name": null,
                                        "ofType": { "kind": "SCALAR", "name": "ID" }
                                    }
                                }
                            ]
                        },
                        {
                            "kind": "OBJECT",
                            "name": "__Schema",
                            "description": "introspection machinery",
                            "fields": []
                        }
                    ]
                }
            }
        });

        let schema = schema_from_introspection(&introspection).unwrap();
        let resources = extract_resources(&schema);
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].name, "user");
        assert_eq!(resources[0].summary, "Fetch one user");

        let request: serde_json::Value =
            serde_json::from_str(resources[0].detail.request.as_ref().unwrap()).unwrap();
        assert_eq!(request[0]["type"], "ID!");

        let response: serde_json::Value =
            serde_json::from_str(resources[0].detail.response.as_ref().unwrap()).unwrap();
        assert_eq!(response["type"], "User");
        assert_eq!(response["description"], "A user record");
    }

    #[test]
    fn absent_roots_contribute_nothing() {
        let schema = schema_from_sdl("type Mutation { ping: String }").unwrap();
        let resources = extract_resources(&schema);
        assert_eq!(resources.len(), 1);
        assert_eq!(resources[0].resource_kind, ResourceKind::Mutation);
    }
}
