//! Exercises the public provider API the way a function provider uses it

#![allow(clippy::disallowed_methods)] // Allow unwrap() in tests for clarity

use async_trait::async_trait;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tfplug::provider::{
    ConfigureRequest, ConfigureResponse, FunctionsResponse, MetadataResponse, SchemaResponse,
    ValidateConfigRequest,
};
use tfplug::{
    AttributeBuilder, AttributeType, CallFunctionRequest, CallFunctionResponse, Context, Diagnostics,
    Dynamic, DynamicValue, Function, FunctionDefinition, FunctionError, FunctionProvider, Number,
    Parameter, SchemaBuilder, ServerCapabilities, TfplugError,
};
use tokio::sync::RwLock;

/// Sleeps for the given number of milliseconds, racing the context.
struct Sleep {
    definition: FunctionDefinition,
}

impl Sleep {
    fn new() -> Self {
        Self {
            definition: FunctionDefinition::new(
                vec![Parameter::new("millis", AttributeType::Number)],
                AttributeType::Bool,
            ),
        }
    }
}

#[async_trait]
impl Function for Sleep {
    fn definition(&self) -> &FunctionDefinition {
        &self.definition
    }

    async fn call(&self, ctx: Context, request: CallFunctionRequest) -> CallFunctionResponse {
        let millis = match request.arguments[0].unmarshal(&AttributeType::Number) {
            Ok(Dynamic::Number(n)) => n.as_i64() as u64,
            _ => return FunctionError::argument(0, "expected a number").into(),
        };
        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(millis)) => {
                CallFunctionResponse::ok(
                    DynamicValue::new(&AttributeType::Bool, &Dynamic::Bool(true)).unwrap(),
                )
            }
            _ = ctx.done() => FunctionError::new("function call cancelled").into(),
        }
    }
}

#[derive(Default)]
struct Catalog {
    functions: RwLock<HashMap<String, Arc<dyn Function>>>,
}

#[async_trait]
impl FunctionProvider for Catalog {
    async fn metadata(&self, _ctx: Context) -> MetadataResponse {
        MetadataResponse::default()
    }

    async fn schema(&self, _ctx: Context) -> SchemaResponse {
        SchemaResponse {
            provider: SchemaBuilder::new()
                .attribute(AttributeBuilder::string("go").required().build())
                .build(),
            functions: HashMap::new(),
            server_capabilities: ServerCapabilities {
                get_provider_schema_optional: true,
                ..Default::default()
            },
            diagnostics: Diagnostics::new(),
        }
    }

    async fn configure(&self, _ctx: Context, _request: ConfigureRequest) -> ConfigureResponse {
        let sleep: Arc<dyn Function> = Arc::new(Sleep::new());
        self.functions
            .write()
            .await
            .insert("sleep".to_string(), sleep);
        ConfigureResponse::default()
    }

    async fn functions(&self, _ctx: Context) -> FunctionsResponse {
        FunctionsResponse {
            functions: self
                .functions
                .read()
                .await
                .iter()
                .map(|(name, f)| (name.clone(), f.definition().clone()))
                .collect(),
            diagnostics: Diagnostics::new(),
        }
    }

    async fn call_function(
        &self,
        ctx: Context,
        name: &str,
        request: CallFunctionRequest,
    ) -> tfplug::Result<CallFunctionResponse> {
        let function = self.functions.read().await.get(name).cloned();
        match function {
            Some(f) => Ok(f.call(ctx, request).await),
            None => Err(TfplugError::FunctionNotFound(name.to_string())),
        }
    }
}

fn number(n: i64) -> DynamicValue {
    DynamicValue::new(&AttributeType::Number, &Dynamic::Number(Number::Int(n))).unwrap()
}

#[tokio::test]
async fn default_validate_config_echoes_payload() {
    let provider = Catalog::default();
    let config = DynamicValue::from_msgpack(rmp_serde::to_vec(&HashMap::from([("go", "x")])).unwrap());
    let response = provider
        .validate_config(
            Context::new(),
            ValidateConfigRequest {
                config: config.clone(),
            },
        )
        .await;
    assert_eq!(response.prepared_config, config);
    assert!(response.diagnostics.is_empty());
    assert!(provider.stop(Context::new()).await.is_ok());
}

#[tokio::test]
async fn functions_appear_after_configure() {
    let provider = Catalog::default();
    assert!(provider.functions(Context::new()).await.functions.is_empty());

    let err = provider
        .call_function(Context::new(), "sleep", CallFunctionRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.to_string(), "unknown function sleep");

    provider
        .configure(Context::new(), ConfigureRequest::default())
        .await;
    let functions = provider.functions(Context::new()).await.functions;
    let sleep = &functions["sleep"];
    assert_eq!(sleep.parameters[0].type_, AttributeType::Number);
    assert_eq!(sleep.return_type.type_, AttributeType::Bool);
}

#[tokio::test]
async fn call_deadline_cancels_slow_functions() {
    let provider = Catalog::default();
    provider
        .configure(Context::new(), ConfigureRequest::default())
        .await;

    let fast = provider
        .call_function(
            Context::new().with_timeout(Duration::from_secs(5)),
            "sleep",
            CallFunctionRequest {
                arguments: vec![number(1)],
            },
        )
        .await
        .unwrap();
    assert_eq!(
        fast.result.unwrap().unmarshal(&AttributeType::Bool).unwrap(),
        Dynamic::Bool(true)
    );

    let slow = provider
        .call_function(
            Context::new().with_timeout(Duration::from_millis(20)),
            "sleep",
            CallFunctionRequest {
                arguments: vec![number(10_000)],
            },
        )
        .await
        .unwrap();
    assert!(slow.result.is_none());
    assert_eq!(slow.error.unwrap().text, "function call cancelled");
}

#[test]
fn nested_values_survive_the_wire() {
    let ty = AttributeType::object([
        ("name", AttributeType::String),
        ("ports", AttributeType::list(AttributeType::Number)),
        ("labels", AttributeType::map(AttributeType::String)),
    ]);
    let value = Dynamic::Map(BTreeMap::from([
        ("name".to_string(), Dynamic::String("web".to_string())),
        (
            "ports".to_string(),
            Dynamic::List(vec![
                Dynamic::Number(Number::Int(80)),
                Dynamic::Number(Number::Float(8.5)),
            ]),
        ),
        (
            "labels".to_string(),
            Dynamic::Map(BTreeMap::from([(
                "tier".to_string(),
                Dynamic::String("front".to_string()),
            )])),
        ),
    ]));

    let encoded = DynamicValue::new(&ty, &value).unwrap();
    assert!(encoded.json.is_empty());
    assert_eq!(encoded.unmarshal(&ty).unwrap(), value);

    let json = DynamicValue::from_json(
        br#"{"name":"web","ports":[80,8.5],"labels":{"tier":"front"}}"#.to_vec(),
    );
    assert_eq!(json.unmarshal(&ty).unwrap(), value);
}
