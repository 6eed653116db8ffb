//! Protocol buffer types for Terraform Plugin Protocol v6.9
//!
//! Generated at build time by tonic-build from `proto/tfplugin6.9.proto`.
//! Only the server side is generated.
//!
//! Some protobuf types have the same names as framework types
//! (`DynamicValue`, `Diagnostic`, `FunctionError`). Always refer to these
//! through the `proto::` prefix.
//!
//! - RPC methods have nested `Request` and `Response` types in snake_case
//!   modules (`call_function::Request`, `get_functions::Response`)
//! - Nested messages live in sub-modules (`diagnostic::Severity`,
//!   `function::Parameter`)
//! - The gRPC service trait is `provider_server::Provider`

include!(concat!(env!("OUT_DIR"), "/tfplugin6.rs"));

pub use provider_server::{Provider as ProviderService, ProviderServer};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn function_messages_are_generated() {
        let func = Function {
            parameters: vec![function::Parameter {
                name: "arg0".to_string(),
                r#type: b"\"string\"".to_vec(),
                ..Default::default()
            }],
            r#return: Some(function::Return {
                r#type: b"\"string\"".to_vec(),
            }),
            ..Default::default()
        };
        assert_eq!(func.parameters.len(), 1);

        let err = FunctionError {
            text: "boom".to_string(),
            function_argument: Some(1),
        };
        assert_eq!(err.function_argument, Some(1));
    }

    #[test]
    fn nested_types_accessible() {
        let _ = diagnostic::Severity::Error;
        let _ = attribute_path::step::Selector::AttributeName("go".to_string());
        let _ = call_function::Request::default();
        let _ = get_functions::Response::default();
        let _ = StringKind::Plain;
    }
}
