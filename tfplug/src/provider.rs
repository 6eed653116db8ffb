//! Provider trait for function-only providers
//!
//! All methods take `&self`: the gRPC server dispatches requests
//! concurrently, so implementations keep their mutable state behind their
//! own synchronisation.

use crate::context::Context;
use crate::function::{CallFunctionRequest, CallFunctionResponse, FunctionDefinition};
use crate::schema::Schema;
use crate::types::{Diagnostics, DynamicValue, ServerCapabilities};
use crate::Result;
use async_trait::async_trait;
use std::collections::HashMap;

#[async_trait]
pub trait FunctionProvider: Send + Sync {
    /// Names known without configuring the provider
    async fn metadata(&self, ctx: Context) -> MetadataResponse;

    /// Provider configuration schema and the functions known up front
    async fn schema(&self, ctx: Context) -> SchemaResponse;

    async fn validate_config(
        &self,
        ctx: Context,
        request: ValidateConfigRequest,
    ) -> ValidateConfigResponse {
        let _ = ctx;
        ValidateConfigResponse {
            prepared_config: request.config,
            diagnostics: Diagnostics::new(),
        }
    }

    async fn configure(&self, ctx: Context, request: ConfigureRequest) -> ConfigureResponse;

    /// Every function currently callable
    async fn functions(&self, ctx: Context) -> FunctionsResponse;

    /// Returns [`TfplugError::FunctionNotFound`](crate::TfplugError::FunctionNotFound)
    /// for names that are not published.
    async fn call_function(
        &self,
        ctx: Context,
        name: &str,
        request: CallFunctionRequest,
    ) -> Result<CallFunctionResponse>;

    async fn stop(&self, ctx: Context) -> Result<()> {
        let _ = ctx;
        Ok(())
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetadataResponse {
    pub functions: Vec<String>,
    pub server_capabilities: ServerCapabilities,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone)]
pub struct SchemaResponse {
    pub provider: Schema,
    pub functions: HashMap<String, FunctionDefinition>,
    pub server_capabilities: ServerCapabilities,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Default)]
pub struct ValidateConfigRequest {
    pub config: DynamicValue,
}

#[derive(Debug, Clone, Default)]
pub struct ValidateConfigResponse {
    pub prepared_config: DynamicValue,
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigureRequest {
    pub terraform_version: String,
    pub config: DynamicValue,
}

#[derive(Debug, Clone, Default)]
pub struct ConfigureResponse {
    pub diagnostics: Diagnostics,
}

#[derive(Debug, Clone, Default)]
pub struct FunctionsResponse {
    pub functions: HashMap<String, FunctionDefinition>,
    pub diagnostics: Diagnostics,
}
