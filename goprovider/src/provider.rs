//! The Go function provider
//!
//! Functions come from two catalogs. Static functions are fixed when the
//! provider is built and are visible before configuration. Dynamic functions
//! are loaded from the `go` attribute on every configure and published as a
//! whole; a failed configure leaves the previous catalog in place.

use crate::configure::{self, Catalog, SOURCE_ATTRIBUTE};
use async_trait::async_trait;
use golite::Options;
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::provider::{
    ConfigureRequest, ConfigureResponse, FunctionsResponse, MetadataResponse, SchemaResponse,
};
use tfplug::{
    AttributeBuilder, CallFunctionRequest, CallFunctionResponse, Context, Diagnostics, Function,
    FunctionDefinition, FunctionProvider, Schema, SchemaBuilder, ServerCapabilities, TfplugError,
};
use tokio::sync::RwLock;

/// Registry address the provider is published under
pub const PROVIDER_ADDRESS: &str = "registry.opentofu.org/opentofu/go";

pub struct GoProvider {
    options: Options,
    static_functions: Catalog,
    dynamic_functions: RwLock<Arc<Catalog>>,
}

impl Default for GoProvider {
    fn default() -> Self {
        Self::new(Options::default())
    }
}

impl GoProvider {
    pub fn new(options: Options) -> Self {
        Self {
            options,
            static_functions: Catalog::new(),
            dynamic_functions: RwLock::new(Arc::new(Catalog::new())),
        }
    }

    /// Functions available without configuration. They take precedence
    /// over configured functions of the same name. Names are lowercased
    /// like configured ones.
    pub fn with_static_function(mut self, name: impl Into<String>, f: Arc<dyn Function>) -> Self {
        self.static_functions.insert(name.into().to_lowercase(), f);
        self
    }

    fn capabilities() -> ServerCapabilities {
        ServerCapabilities {
            get_provider_schema_optional: true,
            ..Default::default()
        }
    }

    fn provider_schema() -> Schema {
        SchemaBuilder::new()
            .description("Exposes the exported functions of a Go package as provider functions.")
            .attribute(
                AttributeBuilder::string(SOURCE_ATTRIBUTE)
                    .description(
                        "Source of a Go file declaring package lib. Its exported functions \
                         become provider functions under their lowercased names.",
                    )
                    .required()
                    .build(),
            )
            .build()
    }

    fn definitions(catalog: &Catalog) -> HashMap<String, FunctionDefinition> {
        catalog
            .iter()
            .map(|(name, f)| (name.clone(), f.definition().clone()))
            .collect()
    }

    async fn dynamic(&self) -> Arc<Catalog> {
        self.dynamic_functions.read().await.clone()
    }

    async fn lookup(&self, name: &str) -> Option<Arc<dyn Function>> {
        if let Some(f) = self.static_functions.get(name) {
            return Some(f.clone());
        }
        self.dynamic().await.get(name).cloned()
    }
}

#[async_trait]
impl FunctionProvider for GoProvider {
    async fn metadata(&self, _ctx: Context) -> MetadataResponse {
        let mut functions: Vec<String> = self.static_functions.keys().cloned().collect();
        functions.sort();
        MetadataResponse {
            functions,
            server_capabilities: Self::capabilities(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn schema(&self, _ctx: Context) -> SchemaResponse {
        SchemaResponse {
            provider: Self::provider_schema(),
            functions: Self::definitions(&self.static_functions),
            server_capabilities: Self::capabilities(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn configure(&self, _ctx: Context, request: ConfigureRequest) -> ConfigureResponse {
        tracing::info!(terraform_version = %request.terraform_version, "Configuring Go provider");

        let options = self.options;
        let config = request.config;
        let loaded = tokio::task::spawn_blocking(move || configure::load(options, &config)).await;

        let mut diagnostics = Diagnostics::new();
        match loaded {
            Ok(Ok(catalog)) => {
                *self.dynamic_functions.write().await = Arc::new(catalog);
            }
            Ok(Err(diag)) => {
                tracing::error!(summary = %diag.summary, detail = %diag.detail, "Configure failed");
                diagnostics.push(diag);
            }
            Err(err) => {
                diagnostics.add_error("Failed to evaluate Go code", Some(err.to_string()));
            }
        }
        ConfigureResponse { diagnostics }
    }

    async fn functions(&self, _ctx: Context) -> FunctionsResponse {
        let dynamic = self.dynamic().await;
        let mut functions = Self::definitions(&*dynamic);
        functions.extend(Self::definitions(&self.static_functions));
        FunctionsResponse {
            functions,
            diagnostics: Diagnostics::new(),
        }
    }

    async fn call_function(
        &self,
        ctx: Context,
        name: &str,
        request: CallFunctionRequest,
    ) -> tfplug::Result<CallFunctionResponse> {
        match self.lookup(name).await {
            Some(f) => Ok(f.call(ctx, request).await),
            None => Err(TfplugError::FunctionNotFound(name.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tfplug::{AttributeType, Dynamic, DynamicValue};

    struct Constant(FunctionDefinition);

    impl Constant {
        fn new() -> Self {
            Self(FunctionDefinition::new(Vec::new(), AttributeType::String))
        }
    }

    #[async_trait]
    impl Function for Constant {
        fn definition(&self) -> &FunctionDefinition {
            &self.0
        }

        async fn call(&self, _ctx: Context, _request: CallFunctionRequest) -> CallFunctionResponse {
            CallFunctionResponse::ok(
                DynamicValue::new(&AttributeType::String, &Dynamic::String("fixed".into()))
                    .unwrap(),
            )
        }
    }

    fn request(src: &str) -> ConfigureRequest {
        let ty = AttributeType::object([(SOURCE_ATTRIBUTE, AttributeType::String)]);
        ConfigureRequest {
            terraform_version: "1.9.0".to_string(),
            config: DynamicValue::new(
                &ty,
                &Dynamic::Map(BTreeMap::from([(
                    SOURCE_ATTRIBUTE.to_string(),
                    Dynamic::String(src.to_string()),
                )])),
            )
            .unwrap(),
        }
    }

    #[tokio::test]
    async fn schema_has_required_go_attribute() {
        let provider = GoProvider::default();
        let schema = provider.schema(Context::new()).await;
        let attrs = &schema.provider.block.attributes;
        assert_eq!(attrs.len(), 1);
        assert_eq!(attrs[0].name, "go");
        assert!(attrs[0].required);
        assert!(schema.functions.is_empty());
        assert!(schema.server_capabilities.get_provider_schema_optional);
    }

    #[tokio::test]
    async fn unconfigured_provider_has_no_functions() {
        let provider = GoProvider::default();
        assert!(provider.metadata(Context::new()).await.functions.is_empty());
        assert!(provider.functions(Context::new()).await.functions.is_empty());
        let err = provider
            .call_function(Context::new(), "anything", CallFunctionRequest::default())
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "unknown function anything");
    }

    #[tokio::test]
    async fn functions_merge_configured_and_static_catalogs() {
        let provider = GoProvider::default().with_static_function("fixed", Arc::new(Constant::new()));
        let response = provider
            .configure(
                Context::new(),
                request("package lib\nfunc Twice(n int) int { return n * 2 }\n"),
            )
            .await;
        assert!(response.diagnostics.is_empty(), "{:?}", response.diagnostics);

        let mut names: Vec<_> = provider
            .functions(Context::new())
            .await
            .functions
            .into_keys()
            .collect();
        names.sort();
        assert_eq!(names, ["fixed", "twice"]);
    }

    #[tokio::test]
    async fn static_function_names_are_lowercased() {
        let provider = GoProvider::default().with_static_function("Fixed", Arc::new(Constant::new()));
        assert_eq!(provider.metadata(Context::new()).await.functions, ["fixed"]);
        assert!(provider.schema(Context::new()).await.functions.contains_key("fixed"));

        let response = provider
            .call_function(Context::new(), "fixed", CallFunctionRequest::default())
            .await
            .unwrap();
        assert!(response.error.is_none(), "{:?}", response.error);
        assert!(provider
            .call_function(Context::new(), "Fixed", CallFunctionRequest::default())
            .await
            .is_err());
    }
}
