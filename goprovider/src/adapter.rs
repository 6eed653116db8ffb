//! Adapts a Go function into a provider function
//!
//! The signature is checked and mapped once, when the function is adapted.
//! Calls then only decode arguments, run the interpreter and encode the
//! result.

use crate::codec;
use crate::mapper::{to_attribute_type, to_parameter};
use async_trait::async_trait;
use tfplug::{
    AttributeType, CallFunctionRequest, CallFunctionResponse, Context, Diagnostic, DynamicValue,
    Function, FunctionDefinition, FunctionError,
};

/// A Go function published under a Terraform name
pub struct GoFunction {
    function: golite::Function,
    definition: FunctionDefinition,
}

impl std::fmt::Debug for GoFunction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoFunction")
            .field("function", &self.function)
            .finish()
    }
}

/// Build the definition of `function`, or the diagnostic explaining why
/// its signature cannot be expressed in Terraform.
pub fn adapt(function: golite::Function) -> Result<GoFunction, Diagnostic> {
    let ty = function.ty().clone();

    let mut parameters = Vec::with_capacity(ty.num_in());
    for (i, param) in ty.params.iter().enumerate() {
        let mut parameter = to_parameter(param).map_err(|err| {
            Diagnostic::error(
                "Failed to convert Argument type to TF type",
                format!("argument {}: {}", i, err),
            )
        })?;
        parameter.name = format!("arg{}", i);
        parameters.push(parameter);
    }

    let output = match ty.results.as_slice() {
        [] => return Err(Diagnostic::error("Function must return a value", "")),
        [output] => output,
        [output, err] if err.is_error() => output,
        [_, _] => {
            return Err(Diagnostic::error(
                "Second return value, if exists, must be an error",
                "",
            ))
        }
        _ => {
            return Err(Diagnostic::error(
                "Function must return at most two values",
                "",
            ))
        }
    };

    let return_type = to_attribute_type(output).map_err(|err| {
        Diagnostic::error(
            "Failed to convert Function output type to TF type",
            err.to_string(),
        )
    })?;

    let definition = FunctionDefinition::new(parameters, return_type)
        .with_summary(format!("Go function {}", function.name()))
        .with_description(format!("{} {}", function.name(), ty));

    Ok(GoFunction {
        function,
        definition,
    })
}

impl GoFunction {
    pub fn name(&self) -> &str {
        self.function.name()
    }
}

#[async_trait]
impl Function for GoFunction {
    fn definition(&self) -> &FunctionDefinition {
        &self.definition
    }

    async fn call(&self, ctx: Context, request: CallFunctionRequest) -> CallFunctionResponse {
        let expected = self.definition.parameters.len();
        if request.arguments.len() != expected {
            return FunctionError::new(format!(
                "expected {} arguments, got {}",
                expected,
                request.arguments.len()
            ))
            .into();
        }

        tracing::debug!(function = %self.function.name(), "Calling Go function");

        let function = self.function.clone();
        let parameters: Vec<AttributeType> = self
            .definition
            .parameters
            .iter()
            .map(|p| p.type_.clone())
            .collect();
        let output = self.definition.return_type.type_.clone();

        // Interpreter values are single-threaded, so decoding, the call and
        // encoding all happen on the blocking thread.
        let task = tokio::task::spawn_blocking(move || {
            invoke(&function, &parameters, &output, request.arguments)
        });

        tokio::select! {
            joined = task => match joined {
                Ok(Ok(result)) => CallFunctionResponse::ok(result),
                Ok(Err(err)) => {
                    tracing::debug!(error = %err, "Go function failed");
                    err.into()
                }
                Err(err) => FunctionError::new(format!("function call failed: {}", err)).into(),
            },
            _ = ctx.done() => {
                tracing::warn!(function = %self.function.name(), "Go function call cancelled");
                FunctionError::new("function call cancelled").into()
            }
        }
    }
}

fn invoke(
    function: &golite::Function,
    parameters: &[AttributeType],
    output: &AttributeType,
    arguments: Vec<DynamicValue>,
) -> Result<DynamicValue, FunctionError> {
    let args = function
        .ty()
        .params
        .iter()
        .zip(parameters)
        .zip(&arguments)
        .enumerate()
        .map(|(i, ((ty, attr), raw))| {
            codec::decode(ty, attr, raw).map_err(|err| FunctionError::argument(i, err.to_string()))
        })
        .collect::<Result<Vec<_>, _>>()?;

    let results = function
        .call(args)
        .map_err(|err| FunctionError::new(err.to_string()))?;

    if let Some(message) = results.get(1).and_then(|err| err.as_error()) {
        return Err(FunctionError::new(message));
    }

    let result = results
        .first()
        .ok_or_else(|| FunctionError::new("function returned no value"))?;
    codec::encode(output, result).map_err(|err| FunctionError::new(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use golite::{Interpreter, Options};
    use tfplug::{Dynamic, Number};

    fn function(src: &str, name: &str) -> golite::Function {
        let mut interp = Interpreter::new(Options::default());
        interp.use_stdlib().unwrap();
        interp.eval(src).unwrap();
        interp.symbols("lib")[name].as_function().cloned().unwrap()
    }

    fn number(n: i64) -> DynamicValue {
        DynamicValue::new(&AttributeType::Number, &Dynamic::Number(Number::Int(n))).unwrap()
    }

    fn string(s: &str) -> DynamicValue {
        DynamicValue::new(&AttributeType::String, &Dynamic::String(s.to_string())).unwrap()
    }

    #[test]
    fn definition_names_parameters_positionally() {
        let f = adapt(function(
            "package lib\nfunc Join(a string, b *string, n int) string { return a }",
            "Join",
        ))
        .unwrap();
        let params = &f.definition().parameters;
        assert_eq!(
            params.iter().map(|p| p.name.as_str()).collect::<Vec<_>>(),
            ["arg0", "arg1", "arg2"]
        );
        assert!(!params[0].allow_null_value);
        assert!(params[1].allow_null_value);
        assert_eq!(params[2].type_, AttributeType::Number);
        assert_eq!(f.definition().return_type.type_, AttributeType::String);
        assert_eq!(f.name(), "Join");
    }

    #[test]
    fn signature_rules_are_enforced() {
        let cases = [
            ("func F() {}", "Function must return a value"),
            (
                "func F() (int, int, error) { return 0, 0, nil }",
                "Function must return at most two values",
            ),
            (
                "func F() (int, string) { return 0, \"\" }",
                "Second return value, if exists, must be an error",
            ),
            (
                "func F(x any) int { return 0 }",
                "Failed to convert Argument type to TF type",
            ),
            (
                "func F() map[int]string { return nil }",
                "Failed to convert Function output type to TF type",
            ),
        ];
        for (body, summary) in cases {
            let src = format!("package lib\n{}", body);
            let err = adapt(function(&src, "F")).unwrap_err();
            assert_eq!(err.summary, summary, "{}", body);
        }
    }

    #[test]
    fn argument_conversion_detail_names_the_argument() {
        let err = adapt(function(
            "package lib\nfunc F(a int, b func()) int { return a }",
            "F",
        ))
        .unwrap_err();
        assert!(err.detail.starts_with("argument 1: "), "{}", err.detail);
    }

    #[tokio::test]
    async fn call_decodes_invokes_and_encodes() {
        let f = adapt(function(
            "package lib\nfunc Add(a, b int) int { return a + b }",
            "Add",
        ))
        .unwrap();
        let response = f
            .call(
                Context::new(),
                CallFunctionRequest {
                    arguments: vec![number(2), number(3)],
                },
            )
            .await;
        assert!(response.error.is_none());
        assert_eq!(
            response.result.unwrap().unmarshal(&AttributeType::Number).unwrap(),
            Dynamic::Number(Number::Int(5))
        );
    }

    #[tokio::test]
    async fn arity_mismatch_is_a_function_error() {
        let f = adapt(function(
            "package lib\nfunc Add(a, b int) int { return a + b }",
            "Add",
        ))
        .unwrap();
        let response = f
            .call(
                Context::new(),
                CallFunctionRequest {
                    arguments: vec![number(2)],
                },
            )
            .await;
        let err = response.error.unwrap();
        assert_eq!(err.text, "expected 2 arguments, got 1");
        assert_eq!(err.function_argument, None);
    }

    #[tokio::test]
    async fn decode_failure_names_the_argument() {
        let f = adapt(function(
            "package lib\nfunc Twice(n int) int { return n * 2 }",
            "Twice",
        ))
        .unwrap();
        let response = f
            .call(
                Context::new(),
                CallFunctionRequest {
                    arguments: vec![DynamicValue::from_msgpack(vec![0xc1])],
                },
            )
            .await;
        let err = response.error.unwrap();
        assert_eq!(err.function_argument, Some(0));
        assert!(response.result.is_none());
    }

    #[tokio::test]
    async fn returned_error_becomes_function_error() {
        let f = adapt(function(
            r#"package lib
import "errors"
func Check(s string) (string, error) {
    if s == "" {
        return "", errors.New("empty input")
    }
    return s, nil
}"#,
            "Check",
        ))
        .unwrap();
        let failed = f
            .call(
                Context::new(),
                CallFunctionRequest {
                    arguments: vec![string("")],
                },
            )
            .await;
        assert!(failed.result.is_none());
        assert_eq!(failed.error.unwrap().text, "empty input");

        let ok = f
            .call(
                Context::new(),
                CallFunctionRequest {
                    arguments: vec![string("x")],
                },
            )
            .await;
        assert_eq!(
            ok.result.unwrap().unmarshal(&AttributeType::String).unwrap(),
            Dynamic::String("x".to_string())
        );
    }

    #[tokio::test]
    async fn panics_become_function_errors() {
        let f = adapt(function(
            "package lib\nfunc Boom(n int) int { panic(\"boom\") }",
            "Boom",
        ))
        .unwrap();
        let response = f
            .call(
                Context::new(),
                CallFunctionRequest {
                    arguments: vec![number(1)],
                },
            )
            .await;
        assert!(response.error.unwrap().text.contains("boom"));
    }
}
