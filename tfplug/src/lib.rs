//! tfplug - Terraform Plugin Framework for Rust
//!
//! A framework for building function-only Terraform providers in Rust,
//! implementing the Terraform Plugin Protocol v6.9.

// Core modules
pub mod attribute_type;
pub mod context;
pub mod error;
pub mod schema;
pub mod types;

// Provider API modules
pub mod function;
pub mod provider;

// Framework implementation modules
pub mod grpc;
pub mod proto;
pub mod server;

// Re-exports for convenience
pub use attribute_type::AttributeType;
pub use context::Context;
pub use error::{Result, TfplugError};
pub use function::{
    CallFunctionRequest, CallFunctionResponse, Function, FunctionDefinition, Parameter, ReturnType,
};
pub use provider::FunctionProvider;
pub use schema::{AttributeBuilder, Schema, SchemaBuilder};
pub use server::{serve, LogLevel, ServerConfig};
pub use types::{
    Diagnostic, DiagnosticSeverity, Diagnostics, Dynamic, DynamicValue, FunctionError, Number,
    ServerCapabilities,
};

