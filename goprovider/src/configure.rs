//! Turns a provider configuration into a catalog of Go functions
//!
//! The `go` attribute carries a complete `package lib` source file. It is
//! evaluated in a fresh interpreter and every exported function is adapted.
//! Any failure aborts the whole load, so a catalog is either complete or
//! not produced at all.

use crate::adapter::adapt;
use golite::{Interpreter, Options};
use std::collections::HashMap;
use std::sync::Arc;
use tfplug::{AttributeType, Diagnostic, Dynamic, DynamicValue, Function};

/// Package whose exported functions are published
pub const LIB_PACKAGE: &str = "lib";

/// Configuration attribute holding the Go source
pub const SOURCE_ATTRIBUTE: &str = "go";

pub type Catalog = HashMap<String, Arc<dyn Function>>;

pub fn load(options: Options, config: &DynamicValue) -> Result<Catalog, Diagnostic> {
    let source = source(config)?;

    let mut interp = Interpreter::new(options);
    interp
        .use_stdlib()
        .map_err(|e| Diagnostic::error("Failed to load Go standard library", e.to_string()))?;
    interp
        .eval(&source)
        .map_err(|e| Diagnostic::error("Failed to evaluate Go code", e.to_string()))?;

    let mut catalog = Catalog::new();
    let mut origins: HashMap<String, String> = HashMap::new();
    for (name, symbol) in interp.symbols(LIB_PACKAGE) {
        let Some(function) = symbol.as_function() else {
            tracing::trace!(symbol = %name, kind = %symbol.kind(), "Skipping non-function symbol");
            continue;
        };
        let adapted = adapt(function.clone())?;
        let tf_name = name.to_lowercase();
        if let Some(previous) = origins.insert(tf_name.clone(), name.clone()) {
            return Err(Diagnostic::error(
                "Duplicate function name",
                format!(
                    "functions {} and {} are both published as {}",
                    previous, name, tf_name
                ),
            ));
        }
        tracing::debug!(function = %name, published = %tf_name, "Adapted Go function");
        catalog.insert(tf_name, Arc::new(adapted));
    }

    tracing::info!(functions = catalog.len(), "Loaded Go functions");
    Ok(catalog)
}

fn source(config: &DynamicValue) -> Result<String, Diagnostic> {
    let invalid = |detail: String| Diagnostic::error("Invalid configure payload", detail);

    let value = config
        .unmarshal(&AttributeType::map(AttributeType::String))
        .map_err(|e| invalid(e.to_string()))?;
    let attrs = match value {
        Dynamic::Map(attrs) => attrs,
        other => {
            return Err(invalid(format!(
                "expected an object, got {}",
                other.type_name()
            )))
        }
    };
    match attrs.get(SOURCE_ATTRIBUTE) {
        Some(Dynamic::String(source)) => Ok(source.clone()),
        Some(Dynamic::Unknown) => Err(invalid(format!(
            "attribute {:?} must be known during configuration",
            SOURCE_ATTRIBUTE
        ))),
        _ => Err(invalid(format!(
            "attribute {:?} must be set to a string",
            SOURCE_ATTRIBUTE
        ))),
    }
}
