//! Built-in handler modules.

use serde_json::Value;

use crate::apidoc;
use crate::dispatch::HandlerError;
use crate::registry::{MethodSpec, ModuleSpec, ParamDescriptor, ParamType, Registry, RegistryError};

/// Path of the documentation module.
pub const DOC_MODULE: &str = "ext/Doc";

/// Module exposing the API listing as callable methods.
///
/// - `modules()` lists registered module paths;
/// - `apis(module = "")` lists methods, optionally restricted to one module.
#[must_use]
pub fn doc_module() -> ModuleSpec {
    ModuleSpec::new(DOC_MODULE)
        .method(
            MethodSpec::new("modules", |context, _| {
                to_value(apidoc::modules(context.registry()))
            })
            .summary("Lists registered module paths."),
        )
        .method(
            MethodSpec::new("apis", |context, args| {
                let module = args.str("module")?;
                let filter = Some(module).filter(|module| !module.is_empty());
                to_value(apidoc::list(context.registry(), filter))
            })
            .param(ParamDescriptor::optional(
                "module",
                ParamType::String,
                Value::String(String::new()),
            ))
            .summary("Lists callable methods with their parameters."),
        )
}

/// Registry served by the stand-alone binary.
///
/// # Errors
///
/// Returns [`RegistryError`] when a built-in module fails to register.
pub fn registry() -> Result<Registry, RegistryError> {
    Registry::new().with_module(&doc_module())
}

fn to_value(listing: impl serde::Serialize) -> Result<Value, HandlerError> {
    serde_json::to_value(listing).map_err(|error| HandlerError::fault(error.to_string()))
}
