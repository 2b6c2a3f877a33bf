//! gRPC extractor.
//!
//! Normalizes protobuf service definitions into [`ResourceDescriptor`]s,
//! one per service method. Descriptors come from two origins: a local
//! `.proto` entry point compiled with `protox` (imports are resolved
//! against the file's directory), or a server-reflection endpoint queried
//! over a `tonic` channel. Both yield a `FileDescriptorSet`, so extraction
//! is shared.
//!
//! Message field trees are expanded recursively with a per-traversal
//! visited-type set, so self-referential messages (`TreeNode.children:
//! repeated TreeNode`) terminate after one level.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use prost::Message;
use prost_types::field_descriptor_proto::{Label, Type};
use prost_types::{
    DescriptorProto, EnumDescriptorProto, FieldDescriptorProto, FileDescriptorProto,
    FileDescriptorSet,
};
use tonic::transport::{Channel, ClientTlsConfig, Endpoint};
use tonic_reflection::pb::v1alpha::server_reflection_client::ServerReflectionClient;
use tonic_reflection::pb::v1alpha::server_reflection_request::MessageRequest;
use tonic_reflection::pb::v1alpha::server_reflection_response::MessageResponse;
use tonic_reflection::pb::v1alpha::ServerReflectionRequest;
use tracing::warn;

use crate::config::Dialect;
use crate::error::SourceError;
use crate::fetch::FETCH_TIMEOUT;
use crate::models::{DetailEntry, FieldDetail, ResourceDescriptor, ResourceKind};

/// Namespace of the reflection protocol's own services; never listed.
const REFLECTION_NAMESPACE: &str = "grpc.reflection";

/// Compiles a local `.proto` entry point into a descriptor set. Imports are
/// resolved transitively against the entry point's directory.
pub fn compile_proto_file(path: &Path) -> Result<FileDescriptorSet, SourceError> {
    let path = path.canonicalize().map_err(|e| SourceError::Read {
        path: path.to_path_buf(),
        source: e,
    })?;
    let include = path
        .parent()
        .map(Path::to_path_buf)
        .unwrap_or_else(|| ".".into());

    protox::compile([&path], [&include]).map_err(|e| SourceError::parse(Dialect::Grpc, e))
}

/// Queries a server-reflection endpoint for every exposed service's file
/// descriptors. TLS is used when the URL is https or an `authorization`
/// header is configured for the source. A service whose descriptor fetch
/// fails is skipped; its siblings still load.
pub async fn load_reflection_descriptors(
    url: &str,
    headers: &HashMap<String, String>,
) -> Result<FileDescriptorSet, SourceError> {
    let endpoint_url = if url.contains("://") {
        url.to_string()
    } else {
        format!("http://{url}")
    };
    let use_tls = endpoint_url.starts_with("https://") || headers.contains_key("authorization");

    let mut endpoint = Endpoint::from_shared(endpoint_url.clone())
        .map_err(|e| SourceError::fetch(url, e))?
        .timeout(FETCH_TIMEOUT)
        .connect_timeout(FETCH_TIMEOUT);
    if use_tls {
        endpoint = endpoint
            .tls_config(ClientTlsConfig::new().with_native_roots())
            .map_err(|e| SourceError::fetch(url, e))?;
    }

    let channel = endpoint
        .connect()
        .await
        .map_err(|e| SourceError::fetch(url, e))?;
    let mut client = ServerReflectionClient::new(channel);

    let services = match reflection_call(&mut client, url, MessageRequest::ListServices(String::new()))
        .await?
    {
        MessageResponse::ListServicesResponse(list) => list.service,
        _ => {
            return Err(SourceError::fetch(
                url,
                "unexpected reflection response to list_services",
            ))
        }
    };

    let mut set = FileDescriptorSet::default();
    let mut seen_files = HashSet::new();

    for service in services {
        if service.name.starts_with(REFLECTION_NAMESPACE) {
            continue;
        }

        let response = match reflection_call(
            &mut client,
            url,
            MessageRequest::FileContainingSymbol(service.name.clone()),
        )
        .await
        {
            Ok(response) => response,
            Err(e) => {
                warn!(service = %service.name, error = %e, "skipping service: descriptor fetch failed");
                continue;
            }
        };

        let MessageResponse::FileDescriptorResponse(files) = response else {
            warn!(service = %service.name, "skipping service: unexpected reflection response");
            continue;
        };

        for bytes in files.file_descriptor_proto {
            let file = FileDescriptorProto::decode(bytes.as_slice())
                .map_err(|e| SourceError::parse(Dialect::Grpc, e))?;
            if seen_files.insert(file.name().to_string()) {
                set.file.push(file);
            }
        }
    }

    Ok(set)
}

/// One reflection round trip: open a request stream carrying a single
/// message and read the single response.
async fn reflection_call(
    client: &mut ServerReflectionClient<Channel>,
    url: &str,
    request: MessageRequest,
) -> Result<MessageResponse, SourceError> {
    let request = ServerReflectionRequest {
        host: String::new(),
        message_request: Some(request),
    };

    let mut responses = client
        .server_reflection_info(tokio_stream::once(request))
        .await
        .map_err(|s| SourceError::fetch(url, s))?
        .into_inner();

    let response = responses
        .message()
        .await
        .map_err(|s| SourceError::fetch(url, s))?
        .ok_or_else(|| SourceError::fetch(url, "reflection stream closed without a response"))?;

    match response.message_response {
        Some(MessageResponse::ErrorResponse(err)) => {
            Err(SourceError::fetch(url, err.error_message))
        }
        Some(message) => Ok(message),
        None => Err(SourceError::fetch(url, "empty reflection response")),
    }
}

/// Emits one descriptor per service method across the descriptor set.
pub fn extract_resources(set: &FileDescriptorSet) -> Vec<ResourceDescriptor> {
    let registry = TypeRegistry::build(set);

    let mut resources = Vec::new();
    for file in &set.file {
        let package = file.package();

        for service in &file.service {
            let service_name = qualified(package, service.name());
            if service_name.starts_with(REFLECTION_NAMESPACE) {
                continue;
            }

            for method in &service.method {
                let client_streaming = method.client_streaming();
                let server_streaming = method.server_streaming();

                resources.push(ResourceDescriptor {
                    name: format!("{service_name}.{}", method.name()),
                    resource_kind: ResourceKind::Grpc,
                    summary: streaming_summary(client_streaming, server_streaming).to_string(),
                    detail: DetailEntry {
                        request: message_detail(method.input_type(), client_streaming, &registry),
                        response: message_detail(method.output_type(), server_streaming, &registry),
                        ..DetailEntry::default()
                    },
                });
            }
        }
    }

    resources
}

fn streaming_summary(client_streaming: bool, server_streaming: bool) -> &'static str {
    match (client_streaming, server_streaming) {
        (true, true) => "Bidirectional Streaming",
        (true, false) => "Client Streaming",
        (false, true) => "Server Streaming",
        (false, false) => "Unary",
    }
}

/// `{type, stream, fields}` bundle for a method's request or response
/// message.
fn message_detail(type_name: &str, stream: bool, registry: &TypeRegistry<'_>) -> Option<String> {
    let qualified_name = type_name.trim_start_matches('.');
    let short_name = qualified_name
        .rsplit('.')
        .next()
        .unwrap_or(qualified_name);

    let fields = extract_message_fields(qualified_name, registry, &HashSet::new());
    serde_json::to_string(&serde_json::json!({
        "type": short_name,
        "stream": stream,
        "fields": fields,
    }))
    .ok()
}

/// Recursively expands a message type's fields. The visited set (type
/// names, scoped to one field-tree traversal) stops a message already open
/// on the current path.
fn extract_message_fields(
    type_name: &str,
    registry: &TypeRegistry<'_>,
    visited: &HashSet<String>,
) -> Vec<FieldDetail> {
    if visited.contains(type_name) {
        return Vec::new();
    }
    let mut visited = visited.clone();
    visited.insert(type_name.to_string());

    let Some(message) = registry.messages.get(type_name) else {
        return Vec::new();
    };

    let mut fields = Vec::new();
    for field in &message.field {
        let mut detail = FieldDetail::new(field.name(), field_type_name(field));
        detail.required = Some(field.label() == Label::Required);
        detail.repeated = Some(field.label() == Label::Repeated);

        if !field.type_name().is_empty() {
            let referenced = field.type_name().trim_start_matches('.');
            match field.r#type() {
                Type::Enum => {
                    if let Some(en) = registry.enums.get(referenced) {
                        detail.enum_values =
                            Some(en.value.iter().map(|v| v.name().to_string()).collect());
                    }
                }
                Type::Message => {
                    if !visited.contains(referenced) {
                        let nested = extract_message_fields(referenced, registry, &visited);
                        if !nested.is_empty() {
                            detail.fields = Some(nested);
                        }
                    }
                }
                _ => {}
            }
        }

        fields.push(detail);
    }

    fields
}

/// Wire type name for a field, per the canonical protobuf names. Fields
/// referencing a user type render the referenced type's qualified name;
/// repeated fields are prefixed.
fn field_type_name(field: &FieldDescriptorProto) -> String {
    let base = match field.r#type() {
        Type::Double => "double",
        Type::Float => "float",
        Type::Int64 => "int64",
        Type::Uint64 => "uint64",
        Type::Int32 => "int32",
        Type::Fixed64 => "fixed64",
        Type::Fixed32 => "fixed32",
        Type::Bool => "bool",
        Type::String => "string",
        Type::Group => "group",
        Type::Message => "message",
        Type::Bytes => "bytes",
        Type::Uint32 => "uint32",
        Type::Enum => "enum",
        Type::Sfixed32 => "sfixed32",
        Type::Sfixed64 => "sfixed64",
        Type::Sint32 => "sint32",
        Type::Sint64 => "sint64",
    };

    let base = if field.type_name().is_empty() {
        base.to_string()
    } else {
        field.type_name().trim_start_matches('.').to_string()
    };

    if field.label() == Label::Repeated {
        format!("repeated {base}")
    } else {
        base
    }
}

fn qualified(package: &str, name: &str) -> String {
    if package.is_empty() {
        name.to_string()
    } else {
        format!("{package}.{name}")
    }
}

/// Lookup tables from fully qualified type name to descriptor, covering
/// nested message and enum declarations.
struct TypeRegistry<'a> {
    messages: HashMap<String, &'a DescriptorProto>,
    enums: HashMap<String, &'a EnumDescriptorProto>,
}

impl<'a> TypeRegistry<'a> {
    fn build(set: &'a FileDescriptorSet) -> Self {
        let mut registry = Self {
            messages: HashMap::new(),
            enums: HashMap::new(),
        };

        for file in &set.file {
            for message in &file.message_type {
                registry.add_message(file.package(), message);
            }
            for en in &file.enum_type {
                registry
                    .enums
                    .insert(qualified(file.package(), en.name()), en);
            }
        }

        registry
    }

    fn add_message(&mut self, prefix: &str, message: &'a DescriptorProto) {
        let name = qualified(prefix, message.name());
        for nested in &message.nested_type {
            self.add_message(&name, nested);
        }
        for en in &message.enum_type {
            self.enums.insert(qualified(&name, en.name()), en);
        }
        self.messages.insert(name, message);
    }
}
