//! Function trait for provider functions

use crate::attribute_type::AttributeType;
use crate::context::Context;
use crate::types::{DynamicValue, FunctionError};
use async_trait::async_trait;

/// A provider function. The definition is fixed once the function is
/// published; calls may run concurrently.
#[async_trait]
pub trait Function: Send + Sync {
    /// Signature and documentation
    fn definition(&self) -> &FunctionDefinition;

    /// Execute the function
    async fn call(&self, ctx: Context, request: CallFunctionRequest) -> CallFunctionResponse;
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionDefinition {
    pub parameters: Vec<Parameter>,
    pub variadic_parameter: Option<Parameter>,
    pub return_type: ReturnType,
    pub summary: String,
    pub description: String,
    pub deprecation_message: Option<String>,
}

impl FunctionDefinition {
    pub fn new(parameters: Vec<Parameter>, return_type: AttributeType) -> Self {
        Self {
            parameters,
            variadic_parameter: None,
            return_type: ReturnType { type_: return_type },
            summary: String::new(),
            description: String::new(),
            deprecation_message: None,
        }
    }

    pub fn with_summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = summary.into();
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    pub name: String,
    pub type_: AttributeType,
    pub allow_null_value: bool,
    pub allow_unknown_values: bool,
    pub description: String,
}

impl Parameter {
    pub fn new(name: impl Into<String>, type_: AttributeType) -> Self {
        Self {
            name: name.into(),
            type_,
            allow_null_value: false,
            allow_unknown_values: false,
            description: String::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ReturnType {
    pub type_: AttributeType,
}

#[derive(Debug, Clone, Default)]
pub struct CallFunctionRequest {
    pub arguments: Vec<DynamicValue>,
}

/// Exactly one of `result` and `error` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct CallFunctionResponse {
    pub result: Option<DynamicValue>,
    pub error: Option<FunctionError>,
}

impl CallFunctionResponse {
    pub fn ok(result: DynamicValue) -> Self {
        Self {
            result: Some(result),
            error: None,
        }
    }

    pub fn error(error: FunctionError) -> Self {
        Self {
            result: None,
            error: Some(error),
        }
    }
}

impl From<FunctionError> for CallFunctionResponse {
    fn from(error: FunctionError) -> Self {
        Self::error(error)
    }
}
