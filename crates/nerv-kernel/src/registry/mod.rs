//! Explicit handler registry.
//!
//! Handlers are plain closures grouped into modules addressed by a path such
//! as `a/B`. Each method carries its parameter descriptors so the binder can
//! map request data onto arguments without runtime reflection. The registry
//! is built once at startup from [`HandlerModule`] implementations and is
//! read-only while requests are served.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use strum::{Display, EnumString};
use thiserror::Error;

use crate::binder::Arguments;
use crate::dispatch::{HandlerContext, HandlerError};
use crate::router::grammar;

/// Callable entry point of a registered method.
pub type HandlerFn =
    dyn Fn(&mut HandlerContext<'_>, &Arguments) -> Result<Value, HandlerError> + Send + Sync;

/// Declared type of a handler parameter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, EnumString, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum ParamType {
    /// 64-bit signed integer.
    Int,
    /// 64-bit float.
    Float,
    /// Boolean flag.
    Bool,
    /// UTF-8 string.
    String,
    /// JSON array.
    Array,
    /// JSON object.
    Object,
    /// Any value, passed through untouched.
    Any,
}

/// Declared parameter of a handler method.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ParamDescriptor {
    name: String,
    #[serde(rename = "type")]
    ty: ParamType,
    #[serde(skip_serializing_if = "Option::is_none")]
    default: Option<Value>,
    variadic: bool,
}

impl ParamDescriptor {
    /// A parameter that must be present in the request data.
    #[must_use]
    pub fn required(name: impl Into<String>, ty: ParamType) -> Self {
        Self {
            name: name.into(),
            ty,
            default: None,
            variadic: false,
        }
    }

    /// A parameter that falls back to `default` when absent.
    #[must_use]
    pub fn optional(name: impl Into<String>, ty: ParamType, default: Value) -> Self {
        Self {
            name: name.into(),
            ty,
            default: Some(default),
            variadic: false,
        }
    }

    /// A trailing parameter collecting every unclaimed data entry.
    #[must_use]
    pub fn variadic(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ty: ParamType::Object,
            default: None,
            variadic: true,
        }
    }

    /// Parameter name used for lookup in the request data.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared type.
    #[must_use]
    pub const fn ty(&self) -> ParamType {
        self.ty
    }

    /// Returns `true` when a default value is declared.
    #[must_use]
    pub const fn has_default(&self) -> bool {
        self.default.is_some()
    }

    /// Declared default value.
    #[must_use]
    pub const fn default_value(&self) -> Option<&Value> {
        self.default.as_ref()
    }

    /// Returns `true` for the trailing collector parameter.
    #[must_use]
    pub const fn is_variadic(&self) -> bool {
        self.variadic
    }
}

/// A method exposed by a handler module.
#[derive(Clone)]
pub struct MethodSpec {
    name: String,
    summary: Option<String>,
    params: Vec<ParamDescriptor>,
    handler: Arc<HandlerFn>,
}

impl MethodSpec {
    /// Creates a method with no parameters.
    #[must_use]
    pub fn new<F>(name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(&mut HandlerContext<'_>, &Arguments) -> Result<Value, HandlerError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            name: name.into(),
            summary: None,
            params: Vec::new(),
            handler: Arc::new(handler),
        }
    }

    /// Appends a declared parameter.
    #[must_use]
    pub fn param(mut self, param: ParamDescriptor) -> Self {
        self.params.push(param);
        self
    }

    /// Attaches a one-line description shown in API listings.
    #[must_use]
    pub fn summary(mut self, summary: impl Into<String>) -> Self {
        self.summary = Some(summary.into());
        self
    }

    /// Method name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Declared description, if any.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.summary.as_deref()
    }

    /// Declared parameters in positional order.
    #[must_use]
    pub fn params(&self) -> &[ParamDescriptor] {
        &self.params
    }

    pub(crate) fn handler(&self) -> &HandlerFn {
        self.handler.as_ref()
    }
}

impl fmt::Debug for MethodSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MethodSpec")
            .field("name", &self.name)
            .field("summary", &self.summary)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

/// Source of handler methods registered under one module path.
pub trait HandlerModule {
    /// Module path such as `a/B`.
    fn path(&self) -> &str;

    /// Methods exposed by the module.
    fn methods(&self) -> Vec<MethodSpec>;
}

/// Module assembled from closures.
#[derive(Debug, Clone)]
pub struct ModuleSpec {
    path: String,
    methods: Vec<MethodSpec>,
}

impl ModuleSpec {
    /// Starts an empty module at `path`.
    #[must_use]
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            methods: Vec::new(),
        }
    }

    /// Adds a method.
    #[must_use]
    pub fn method(mut self, method: MethodSpec) -> Self {
        self.methods.push(method);
        self
    }
}

impl HandlerModule for ModuleSpec {
    fn path(&self) -> &str {
        &self.path
    }

    fn methods(&self) -> Vec<MethodSpec> {
        self.methods.clone()
    }
}

/// Errors raised while registering handler modules.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    /// The module path is not addressable by a command string.
    #[error("invalid module path '{path}'")]
    InvalidModulePath { path: String },
    /// The method name is not a valid identifier.
    #[error("invalid method name '{method}' in module '{module}'")]
    InvalidMethodName { module: String, method: String },
    /// The method shadows a framework method.
    #[error("method '{method}' in module '{module}' is reserved by the framework")]
    ReservedMethod { module: String, method: String },
    /// The method is already registered.
    #[error("method '{module}/{method}' is already registered")]
    DuplicateMethod { module: String, method: String },
    /// The parameter list is inconsistent.
    #[error("invalid parameters for '{module}/{method}': {message}")]
    InvalidParams {
        module: String,
        method: String,
        message: String,
    },
}

/// Registry of handler methods keyed by module path and method name.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    modules: BTreeMap<String, BTreeMap<String, Arc<MethodSpec>>>,
}

impl Registry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers every method of `module`.
    ///
    /// Registering the same module path twice merges the method sets.
    ///
    /// # Errors
    ///
    /// Returns [`RegistryError`] when the path or a method is not addressable,
    /// a method is reserved or duplicated, or its parameters are inconsistent.
    /// Nothing is registered when an error is returned.
    pub fn register(&mut self, module: &dyn HandlerModule) -> Result<(), RegistryError> {
        let path = module.path();
        if !grammar::is_module_path(path) {
            return Err(RegistryError::InvalidModulePath {
                path: path.to_owned(),
            });
        }

        let existing = self.modules.get(path);
        let mut staged: BTreeMap<String, Arc<MethodSpec>> = BTreeMap::new();
        for method in module.methods() {
            validate_method(path, &method)?;
            let name = method.name().to_owned();
            let taken = existing.is_some_and(|methods| methods.contains_key(&name));
            if taken || staged.contains_key(&name) {
                return Err(RegistryError::DuplicateMethod {
                    module: path.to_owned(),
                    method: name,
                });
            }
            staged.insert(name, Arc::new(method));
        }

        self.modules.entry(path.to_owned()).or_default().extend(staged);
        Ok(())
    }

    /// Builder-style variant of [`Registry::register`].
    ///
    /// # Errors
    ///
    /// See [`Registry::register`].
    pub fn with_module(mut self, module: &dyn HandlerModule) -> Result<Self, RegistryError> {
        self.register(module)?;
        Ok(self)
    }

    /// Looks up a method.
    #[must_use]
    pub fn lookup(&self, module: &str, method: &str) -> Option<Arc<MethodSpec>> {
        self.modules.get(module)?.get(method).cloned()
    }

    /// Registered module paths in sorted order.
    pub fn modules(&self) -> impl Iterator<Item = &str> {
        self.modules.keys().map(String::as_str)
    }

    /// Methods of `module` in sorted order.
    pub fn methods(&self, module: &str) -> impl Iterator<Item = &MethodSpec> {
        self.modules
            .get(module)
            .into_iter()
            .flat_map(|methods| methods.values().map(AsRef::as_ref))
    }

    /// Number of registered methods across all modules.
    #[must_use]
    pub fn len(&self) -> usize {
        self.modules.values().map(BTreeMap::len).sum()
    }

    /// Returns `true` when nothing is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn validate_method(module: &str, method: &MethodSpec) -> Result<(), RegistryError> {
    let name = method.name();
    if !grammar::is_method_name(name) {
        return Err(RegistryError::InvalidMethodName {
            module: module.to_owned(),
            method: name.to_owned(),
        });
    }
    if grammar::is_framework_method(name) {
        return Err(RegistryError::ReservedMethod {
            module: module.to_owned(),
            method: name.to_owned(),
        });
    }

    let invalid = |message: String| RegistryError::InvalidParams {
        module: module.to_owned(),
        method: name.to_owned(),
        message,
    };

    let params = method.params();
    let mut seen: Vec<&str> = Vec::with_capacity(params.len());
    for (index, param) in params.iter().enumerate() {
        if seen.contains(&param.name()) {
            return Err(invalid(format!("duplicate parameter '{}'", param.name())));
        }
        seen.push(param.name());
        if param.is_variadic() && index + 1 != params.len() {
            return Err(invalid(format!(
                "variadic parameter '{}' must be last",
                param.name()
            )));
        }
    }
    Ok(())
}
