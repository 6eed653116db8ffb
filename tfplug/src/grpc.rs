//! gRPC service implementation
//!
//! [`ProviderService`] adapts a [`FunctionProvider`] to the generated
//! tfplugin6 service trait. Framework types are converted to their protobuf
//! form here and nowhere else. Resource, data source, ephemeral resource
//! and identity methods are refused with `not supported`: a function
//! provider has none of them.

use crate::context::Context;
use crate::function::{CallFunctionRequest, FunctionDefinition, Parameter};
use crate::proto;
use crate::proto::provider_server::{Provider as ProtoProvider, ProviderServer as ProtoProviderServer};
use crate::provider::{ConfigureRequest, FunctionProvider, ValidateConfigRequest};
use crate::schema::{Attribute, Schema, StringKind};
use crate::server::{self, ServerConfig};
use crate::types::{
    AttributePath, AttributePathStep, Diagnostic, DiagnosticSeverity, Diagnostics, DynamicValue,
    FunctionError, ServerCapabilities,
};
use crate::{Result, TfplugError};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;
use tonic::{Request, Response, Status};

/// Serves one provider over gRPC until the host disconnects or the process
/// is interrupted.
pub struct ProviderServer<P: FunctionProvider> {
    provider: Arc<P>,
    config: ServerConfig,
}

impl<P: FunctionProvider + 'static> ProviderServer<P> {
    pub fn new(provider: P, config: ServerConfig) -> Self {
        Self {
            provider: Arc::new(provider),
            config,
        }
    }

    pub async fn run(self) -> Result<()> {
        server::check_magic_cookie()?;
        server::install_crypto_provider();

        let tls = server::tls_setup(&self.config).await?;

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let bound_addr = listener.local_addr()?;

        let service = ProtoProviderServer::new(ProviderService::new(
            self.provider.clone(),
            self.config.call_timeout,
        ))
        .max_decoding_message_size(self.config.max_message_size)
        .max_encoding_message_size(self.config.max_message_size);

        let mut builder = Server::builder();
        if let Some(tls_config) = tls.server_config {
            builder = builder.tls_config(tls_config)?;
        }

        // The handshake line must be the first thing on stdout.
        println!("{}", server::handshake_line(bound_addr.port(), tls.certificate.as_deref()));
        tracing::info!(
            port = bound_addr.port(),
            tls = tls.certificate.is_some() || self.config.has_static_tls(),
            "Provider server started"
        );

        let provider = self.provider.clone();
        let shutdown = async move {
            server::shutdown_signal().await;
            tracing::info!("Shutting down provider server");
            if let Err(e) = provider.stop(Context::new()).await {
                tracing::warn!(error = %e, "Provider stop failed");
            }
        };

        builder
            .add_service(service)
            .serve_with_incoming_shutdown(TcpListenerStream::new(listener), shutdown)
            .await?;

        Ok(())
    }
}

pub(crate) struct ProviderService<P: FunctionProvider> {
    provider: Arc<P>,
    call_timeout: Option<Duration>,
}

impl<P: FunctionProvider> ProviderService<P> {
    pub(crate) fn new(provider: Arc<P>, call_timeout: Option<Duration>) -> Self {
        Self {
            provider,
            call_timeout,
        }
    }

    fn call_context(&self) -> Context {
        match self.call_timeout {
            Some(timeout) => Context::new().with_timeout(timeout),
            None => Context::new(),
        }
    }
}

#[tonic::async_trait]
impl<P: FunctionProvider + 'static> ProtoProvider for ProviderService<P> {
    async fn get_metadata(
        &self,
        _request: Request<proto::get_metadata::Request>,
    ) -> std::result::Result<Response<proto::get_metadata::Response>, Status> {
        tracing::debug!("GetMetadata");
        let response = self.provider.metadata(Context::new()).await;
        let mut functions = response.functions;
        functions.sort();

        Ok(Response::new(proto::get_metadata::Response {
            server_capabilities: Some(encode_capabilities(&response.server_capabilities)),
            diagnostics: encode_diagnostics(&response.diagnostics),
            data_sources: vec![],
            resources: vec![],
            functions: functions
                .into_iter()
                .map(|name| proto::get_metadata::FunctionMetadata { name })
                .collect(),
            ephemeral_resources: vec![],
        }))
    }

    async fn get_provider_schema(
        &self,
        _request: Request<proto::get_provider_schema::Request>,
    ) -> std::result::Result<Response<proto::get_provider_schema::Response>, Status> {
        tracing::debug!("GetProviderSchema");
        let response = self.provider.schema(Context::new()).await;

        Ok(Response::new(proto::get_provider_schema::Response {
            provider: Some(encode_schema(&response.provider)),
            resource_schemas: HashMap::new(),
            data_source_schemas: HashMap::new(),
            functions: encode_functions(&response.functions),
            ephemeral_resource_schemas: HashMap::new(),
            diagnostics: encode_diagnostics(&response.diagnostics),
            provider_meta: None,
            server_capabilities: Some(encode_capabilities(&response.server_capabilities)),
        }))
    }

    async fn validate_provider_config(
        &self,
        request: Request<proto::validate_provider_config::Request>,
    ) -> std::result::Result<Response<proto::validate_provider_config::Response>, Status> {
        tracing::debug!("ValidateProviderConfig");
        let req = request.into_inner();
        let response = self
            .provider
            .validate_config(
                Context::new(),
                ValidateConfigRequest {
                    config: decode_dynamic_value(req.config),
                },
            )
            .await;

        Ok(Response::new(proto::validate_provider_config::Response {
            diagnostics: encode_diagnostics(&response.diagnostics),
        }))
    }

    async fn configure_provider(
        &self,
        request: Request<proto::configure_provider::Request>,
    ) -> std::result::Result<Response<proto::configure_provider::Response>, Status> {
        let req = request.into_inner();
        tracing::info!(terraform_version = %req.terraform_version, "ConfigureProvider");

        let response = self
            .provider
            .configure(
                Context::new(),
                ConfigureRequest {
                    terraform_version: req.terraform_version,
                    config: decode_dynamic_value(req.config),
                },
            )
            .await;

        if response.diagnostics.has_errors() {
            tracing::warn!(
                errors = response.diagnostics.errors.len(),
                "Provider configuration failed"
            );
        }

        Ok(Response::new(proto::configure_provider::Response {
            diagnostics: encode_diagnostics(&response.diagnostics),
        }))
    }

    async fn stop_provider(
        &self,
        _request: Request<proto::stop_provider::Request>,
    ) -> std::result::Result<Response<proto::stop_provider::Response>, Status> {
        tracing::debug!("StopProvider");
        let error = match self.provider.stop(Context::new()).await {
            Ok(()) => String::new(),
            Err(e) => e.to_string(),
        };
        Ok(Response::new(proto::stop_provider::Response { error }))
    }

    async fn get_functions(
        &self,
        _request: Request<proto::get_functions::Request>,
    ) -> std::result::Result<Response<proto::get_functions::Response>, Status> {
        let response = self.provider.functions(Context::new()).await;
        tracing::debug!(count = response.functions.len(), "GetFunctions");

        Ok(Response::new(proto::get_functions::Response {
            functions: encode_functions(&response.functions),
            diagnostics: encode_diagnostics(&response.diagnostics),
        }))
    }

    async fn call_function(
        &self,
        request: Request<proto::call_function::Request>,
    ) -> std::result::Result<Response<proto::call_function::Response>, Status> {
        let req = request.into_inner();
        tracing::debug!(function = %req.name, args = req.arguments.len(), "CallFunction");

        let call = CallFunctionRequest {
            arguments: req
                .arguments
                .into_iter()
                .map(|arg| decode_dynamic_value(Some(arg)))
                .collect(),
        };

        match self
            .provider
            .call_function(self.call_context(), &req.name, call)
            .await
        {
            Ok(response) => {
                if let Some(err) = &response.error {
                    tracing::debug!(function = %req.name, error = %err, "Function returned an error");
                }
                Ok(Response::new(proto::call_function::Response {
                    result: response.result.map(encode_dynamic_value),
                    error: response.error.map(encode_function_error),
                }))
            }
            Err(e) => {
                tracing::warn!(function = %req.name, error = %e, "CallFunction failed");
                Err(to_status(e))
            }
        }
    }

    async fn validate_resource_config(
        &self,
        _request: Request<proto::validate_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_resource_config::Response>, Status> {
        Err(not_supported("ValidateResourceConfig"))
    }

    async fn validate_data_resource_config(
        &self,
        _request: Request<proto::validate_data_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_data_resource_config::Response>, Status>
    {
        Err(not_supported("ValidateDataResourceConfig"))
    }

    async fn upgrade_resource_state(
        &self,
        _request: Request<proto::upgrade_resource_state::Request>,
    ) -> std::result::Result<Response<proto::upgrade_resource_state::Response>, Status> {
        Err(not_supported("UpgradeResourceState"))
    }

    async fn get_resource_identity_schemas(
        &self,
        _request: Request<proto::get_resource_identity_schemas::Request>,
    ) -> std::result::Result<Response<proto::get_resource_identity_schemas::Response>, Status>
    {
        Err(not_supported("GetResourceIdentitySchemas"))
    }

    async fn upgrade_resource_identity(
        &self,
        _request: Request<proto::upgrade_resource_identity::Request>,
    ) -> std::result::Result<Response<proto::upgrade_resource_identity::Response>, Status> {
        Err(not_supported("UpgradeResourceIdentity"))
    }

    async fn read_resource(
        &self,
        _request: Request<proto::read_resource::Request>,
    ) -> std::result::Result<Response<proto::read_resource::Response>, Status> {
        Err(not_supported("ReadResource"))
    }

    async fn plan_resource_change(
        &self,
        _request: Request<proto::plan_resource_change::Request>,
    ) -> std::result::Result<Response<proto::plan_resource_change::Response>, Status> {
        Err(not_supported("PlanResourceChange"))
    }

    async fn apply_resource_change(
        &self,
        _request: Request<proto::apply_resource_change::Request>,
    ) -> std::result::Result<Response<proto::apply_resource_change::Response>, Status> {
        Err(not_supported("ApplyResourceChange"))
    }

    async fn import_resource_state(
        &self,
        _request: Request<proto::import_resource_state::Request>,
    ) -> std::result::Result<Response<proto::import_resource_state::Response>, Status> {
        Err(not_supported("ImportResourceState"))
    }

    async fn move_resource_state(
        &self,
        _request: Request<proto::move_resource_state::Request>,
    ) -> std::result::Result<Response<proto::move_resource_state::Response>, Status> {
        Err(not_supported("MoveResourceState"))
    }

    async fn read_data_source(
        &self,
        _request: Request<proto::read_data_source::Request>,
    ) -> std::result::Result<Response<proto::read_data_source::Response>, Status> {
        Err(not_supported("ReadDataSource"))
    }

    async fn validate_ephemeral_resource_config(
        &self,
        _request: Request<proto::validate_ephemeral_resource_config::Request>,
    ) -> std::result::Result<Response<proto::validate_ephemeral_resource_config::Response>, Status>
    {
        Err(not_supported("ValidateEphemeralResourceConfig"))
    }

    async fn open_ephemeral_resource(
        &self,
        _request: Request<proto::open_ephemeral_resource::Request>,
    ) -> std::result::Result<Response<proto::open_ephemeral_resource::Response>, Status> {
        Err(not_supported("OpenEphemeralResource"))
    }

    async fn renew_ephemeral_resource(
        &self,
        _request: Request<proto::renew_ephemeral_resource::Request>,
    ) -> std::result::Result<Response<proto::renew_ephemeral_resource::Response>, Status> {
        Err(not_supported("RenewEphemeralResource"))
    }

    async fn close_ephemeral_resource(
        &self,
        _request: Request<proto::close_ephemeral_resource::Request>,
    ) -> std::result::Result<Response<proto::close_ephemeral_resource::Response>, Status> {
        Err(not_supported("CloseEphemeralResource"))
    }
}

// Helper functions

fn not_supported(method: &str) -> Status {
    tracing::debug!(method, "Refusing unsupported method");
    Status::unknown("not supported")
}

fn to_status(err: TfplugError) -> Status {
    match err {
        TfplugError::GrpcError(status) => *status,
        other => Status::unknown(other.to_string()),
    }
}

fn decode_dynamic_value(value: Option<proto::DynamicValue>) -> DynamicValue {
    value
        .map(|v| DynamicValue {
            msgpack: v.msgpack,
            json: v.json,
        })
        .unwrap_or_default()
}

fn encode_dynamic_value(value: DynamicValue) -> proto::DynamicValue {
    proto::DynamicValue {
        msgpack: value.msgpack,
        json: value.json,
    }
}

fn encode_function_error(err: FunctionError) -> proto::FunctionError {
    proto::FunctionError {
        text: err.text,
        function_argument: err.function_argument,
    }
}

fn encode_capabilities(caps: &ServerCapabilities) -> proto::ServerCapabilities {
    proto::ServerCapabilities {
        plan_destroy: caps.plan_destroy,
        get_provider_schema_optional: caps.get_provider_schema_optional,
        move_resource_state: caps.move_resource_state,
    }
}

fn encode_string_kind(kind: StringKind) -> i32 {
    match kind {
        StringKind::Plain => proto::StringKind::Plain as i32,
        StringKind::Markdown => proto::StringKind::Markdown as i32,
    }
}

fn encode_schema(schema: &Schema) -> proto::Schema {
    proto::Schema {
        version: schema.version,
        block: Some(proto::schema::Block {
            version: schema.block.version,
            attributes: schema.block.attributes.iter().map(encode_attribute).collect(),
            block_types: vec![],
            description: schema.block.description.clone(),
            description_kind: encode_string_kind(schema.block.description_kind),
            deprecated: schema.block.deprecated,
        }),
    }
}

fn encode_attribute(attr: &Attribute) -> proto::schema::Attribute {
    proto::schema::Attribute {
        name: attr.name.clone(),
        r#type: attr.r#type.encode(),
        nested_type: None,
        description: attr.description.clone(),
        required: attr.required,
        optional: attr.optional,
        computed: attr.computed,
        sensitive: attr.sensitive,
        description_kind: encode_string_kind(attr.description_kind),
        deprecated: attr.deprecated,
        write_only: false,
    }
}

fn encode_parameter(param: &Parameter) -> proto::function::Parameter {
    proto::function::Parameter {
        name: param.name.clone(),
        r#type: param.type_.encode(),
        allow_null_value: param.allow_null_value,
        allow_unknown_values: param.allow_unknown_values,
        description: param.description.clone(),
        description_kind: proto::StringKind::Plain as i32,
    }
}

fn encode_function(def: &FunctionDefinition) -> proto::Function {
    proto::Function {
        parameters: def.parameters.iter().map(encode_parameter).collect(),
        variadic_parameter: def.variadic_parameter.as_ref().map(encode_parameter),
        r#return: Some(proto::function::Return {
            r#type: def.return_type.type_.encode(),
        }),
        summary: def.summary.clone(),
        description: def.description.clone(),
        description_kind: proto::StringKind::Plain as i32,
        deprecation_message: def.deprecation_message.clone().unwrap_or_default(),
    }
}

fn encode_functions(
    functions: &HashMap<String, FunctionDefinition>,
) -> HashMap<String, proto::Function> {
    functions
        .iter()
        .map(|(name, def)| (name.clone(), encode_function(def)))
        .collect()
}

fn encode_attribute_path(path: &AttributePath) -> proto::AttributePath {
    use proto::attribute_path::{step::Selector, Step};

    proto::AttributePath {
        steps: path
            .steps
            .iter()
            .map(|step| Step {
                selector: Some(match step {
                    AttributePathStep::AttributeName(name) => Selector::AttributeName(name.clone()),
                    AttributePathStep::ElementKeyString(key) => {
                        Selector::ElementKeyString(key.clone())
                    }
                    AttributePathStep::ElementKeyInt(idx) => Selector::ElementKeyInt(*idx),
                }),
            })
            .collect(),
    }
}

fn encode_diagnostic(diag: &Diagnostic) -> proto::Diagnostic {
    let severity = match diag.severity {
        DiagnosticSeverity::Invalid => proto::diagnostic::Severity::Invalid,
        DiagnosticSeverity::Error => proto::diagnostic::Severity::Error,
        DiagnosticSeverity::Warning => proto::diagnostic::Severity::Warning,
    };
    proto::Diagnostic {
        severity: severity as i32,
        summary: diag.summary.clone(),
        detail: diag.detail.clone(),
        attribute: diag.attribute.as_ref().map(encode_attribute_path),
    }
}

fn encode_diagnostics(diags: &Diagnostics) -> Vec<proto::Diagnostic> {
    diags.iter().map(encode_diagnostic).collect()
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)]
mod tests {
    use super::*;
    use crate::attribute_type::AttributeType;
    use crate::function::{CallFunctionResponse, Function};
    use crate::provider::{ConfigureResponse, FunctionsResponse, MetadataResponse, SchemaResponse};
    use crate::schema::{AttributeBuilder, SchemaBuilder};
    use crate::types::Dynamic;
    use async_trait::async_trait;
    use tokio::sync::Mutex;

    struct Upper {
        definition: FunctionDefinition,
    }

    impl Upper {
        fn new() -> Self {
            Self {
                definition: FunctionDefinition::new(
                    vec![Parameter::new("input", AttributeType::String)],
                    AttributeType::String,
                )
                .with_summary("Uppercase a string"),
            }
        }
    }

    #[async_trait]
    impl Function for Upper {
        fn definition(&self) -> &FunctionDefinition {
            &self.definition
        }

        async fn call(&self, _ctx: Context, request: CallFunctionRequest) -> CallFunctionResponse {
            let Some(arg) = request.arguments.first() else {
                return FunctionError::new("expected 1 argument").into();
            };
            match arg.unmarshal(&AttributeType::String) {
                Ok(Dynamic::String(s)) => CallFunctionResponse::ok(
                    DynamicValue::new(&AttributeType::String, &Dynamic::String(s.to_uppercase()))
                        .unwrap(),
                ),
                Ok(other) => FunctionError::argument(0, format!("unexpected {}", other.type_name()))
                    .into(),
                Err(e) => FunctionError::argument(0, e.to_string()).into(),
            }
        }
    }

    struct TestProvider {
        upper: Upper,
        configured_with: Mutex<Option<String>>,
    }

    impl TestProvider {
        fn new() -> Self {
            Self {
                upper: Upper::new(),
                configured_with: Mutex::new(None),
            }
        }
    }

    #[async_trait]
    impl FunctionProvider for TestProvider {
        async fn metadata(&self, _ctx: Context) -> MetadataResponse {
            MetadataResponse {
                functions: vec!["upper".to_string()],
                server_capabilities: ServerCapabilities {
                    get_provider_schema_optional: true,
                    ..Default::default()
                },
                diagnostics: Diagnostics::new(),
            }
        }

        async fn schema(&self, _ctx: Context) -> SchemaResponse {
            SchemaResponse {
                provider: SchemaBuilder::new()
                    .attribute(AttributeBuilder::string("go").required().build())
                    .build(),
                functions: HashMap::from([(
                    "upper".to_string(),
                    self.upper.definition().clone(),
                )]),
                server_capabilities: ServerCapabilities::default(),
                diagnostics: Diagnostics::new(),
            }
        }

        async fn configure(&self, _ctx: Context, request: ConfigureRequest) -> ConfigureResponse {
            let mut diagnostics = Diagnostics::new();
            let ty = AttributeType::map(AttributeType::String);
            match request.config.unmarshal(&ty) {
                Ok(Dynamic::Map(values)) => {
                    let go = values.get("go").and_then(Dynamic::as_str).map(str::to_string);
                    *self.configured_with.lock().await = go;
                }
                Ok(_) => diagnostics.add_error("Invalid configure payload", None::<String>),
                Err(e) => diagnostics.add_error("Invalid configure payload", Some(e.to_string())),
            }
            ConfigureResponse { diagnostics }
        }

        async fn functions(&self, ctx: Context) -> FunctionsResponse {
            let schema = self.schema(ctx).await;
            FunctionsResponse {
                functions: schema.functions,
                diagnostics: Diagnostics::new(),
            }
        }

        async fn call_function(
            &self,
            ctx: Context,
            name: &str,
            request: CallFunctionRequest,
        ) -> Result<CallFunctionResponse> {
            match name {
                "upper" => Ok(self.upper.call(ctx, request).await),
                _ => Err(TfplugError::FunctionNotFound(name.to_string())),
            }
        }
    }

    fn service() -> ProviderService<TestProvider> {
        ProviderService::new(Arc::new(TestProvider::new()), None)
    }

    fn msgpack<T: serde::Serialize>(value: &T) -> proto::DynamicValue {
        proto::DynamicValue {
            msgpack: rmp_serde::to_vec(value).unwrap(),
            json: vec![],
        }
    }

    #[tokio::test]
    async fn metadata_lists_functions_and_capabilities() {
        let response = service()
            .get_metadata(Request::new(proto::get_metadata::Request {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.functions[0].name, "upper");
        assert!(response.server_capabilities.unwrap().get_provider_schema_optional);
        assert!(response.resources.is_empty());
    }

    #[tokio::test]
    async fn provider_schema_encodes_types_as_json() {
        let response = service()
            .get_provider_schema(Request::new(proto::get_provider_schema::Request {}))
            .await
            .unwrap()
            .into_inner();

        let block = response.provider.unwrap().block.unwrap();
        assert_eq!(block.attributes[0].name, "go");
        assert_eq!(block.attributes[0].r#type, b"\"string\"");
        assert!(block.attributes[0].required);

        let upper = &response.functions["upper"];
        assert_eq!(upper.parameters[0].r#type, b"\"string\"");
        assert_eq!(upper.r#return.as_ref().unwrap().r#type, b"\"string\"");
        assert_eq!(upper.summary, "Uppercase a string");
    }

    #[tokio::test]
    async fn configure_passes_payload_and_returns_diagnostics() {
        let svc = service();
        let config = msgpack(&HashMap::from([("go", "package lib")]));
        let response = svc
            .configure_provider(Request::new(proto::configure_provider::Request {
                terraform_version: "1.8.0".to_string(),
                config: Some(config),
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.diagnostics.is_empty());
        assert_eq!(
            svc.provider.configured_with.lock().await.as_deref(),
            Some("package lib")
        );

        let response = svc
            .configure_provider(Request::new(proto::configure_provider::Request {
                terraform_version: String::new(),
                config: Some(msgpack(&42)),
                client_capabilities: None,
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.diagnostics.len(), 1);
        assert_eq!(
            response.diagnostics[0].severity,
            proto::diagnostic::Severity::Error as i32
        );
        assert_eq!(response.diagnostics[0].summary, "Invalid configure payload");
    }

    #[tokio::test]
    async fn call_function_round_trips_values() {
        let response = service()
            .call_function(Request::new(proto::call_function::Request {
                name: "upper".to_string(),
                arguments: vec![msgpack(&"hello")],
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.error.is_none());
        let result: String = rmp_serde::from_slice(&response.result.unwrap().msgpack).unwrap();
        assert_eq!(result, "HELLO");
    }

    #[tokio::test]
    async fn function_errors_carry_argument_index() {
        let response = service()
            .call_function(Request::new(proto::call_function::Request {
                name: "upper".to_string(),
                arguments: vec![msgpack(&true)],
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(response.result.is_none());
        let err = response.error.unwrap();
        assert_eq!(err.function_argument, Some(0));
        assert!(err.text.contains("expected string"));
    }

    #[tokio::test]
    async fn unknown_function_is_an_rpc_error() {
        let status = service()
            .call_function(Request::new(proto::call_function::Request {
                name: "nope".to_string(),
                arguments: vec![],
            }))
            .await
            .unwrap_err();
        assert_eq!(status.message(), "unknown function nope");
    }

    #[tokio::test]
    async fn resource_methods_are_not_supported() {
        let svc = service();
        let status = svc
            .read_resource(Request::new(proto::read_resource::Request::default()))
            .await
            .unwrap_err();
        assert_eq!(status.message(), "not supported");

        let status = svc
            .read_data_source(Request::new(proto::read_data_source::Request::default()))
            .await
            .unwrap_err();
        assert_eq!(status.message(), "not supported");

        let status = svc
            .open_ephemeral_resource(Request::new(
                proto::open_ephemeral_resource::Request::default(),
            ))
            .await
            .unwrap_err();
        assert_eq!(status.message(), "not supported");
    }

    #[tokio::test]
    async fn stop_and_validate_succeed_quietly() {
        let svc = service();
        let stop = svc
            .stop_provider(Request::new(proto::stop_provider::Request {}))
            .await
            .unwrap()
            .into_inner();
        assert!(stop.error.is_empty());

        let validate = svc
            .validate_provider_config(Request::new(proto::validate_provider_config::Request {
                config: Some(msgpack(&HashMap::from([("go", "x")]))),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(validate.diagnostics.is_empty());
    }

    #[test]
    fn diagnostics_keep_attribute_paths() {
        let diag = Diagnostic::error("bad", "detail").with_attribute(AttributePath::new("go").index(2));
        let encoded = encode_diagnostic(&diag);
        let path = encoded.attribute.unwrap();
        assert_eq!(path.steps.len(), 2);
        assert_eq!(
            path.steps[1].selector,
            Some(proto::attribute_path::step::Selector::ElementKeyInt(2))
        );
    }
}
