//! API listing built from registry metadata.

use serde::Serialize;
use serde_json::Value;

use crate::registry::{MethodSpec, ParamDescriptor, ParamType, Registry};
use crate::router::grammar::{self, PATH_SEPARATOR};

/// One callable method as shown in API listings.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiEntry {
    /// Full command path such as `a/B/c`.
    pub api: String,
    /// One-line description declared at registration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    /// Declared parameters in positional order.
    pub params: Vec<ApiParam>,
}

/// Parameter metadata of an [`ApiEntry`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiParam {
    /// Data key the parameter binds from.
    pub name: String,
    /// Declared type.
    #[serde(rename = "type")]
    pub ty: ParamType,
    /// `true` when binding fails without the parameter.
    pub required: bool,
    /// Value used when the parameter is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// `true` for the trailing collector parameter.
    pub variadic: bool,
}

impl From<&ParamDescriptor> for ApiParam {
    fn from(param: &ParamDescriptor) -> Self {
        Self {
            name: param.name().to_owned(),
            ty: param.ty(),
            required: !param.has_default() && !param.is_variadic(),
            default: param.default_value().cloned(),
            variadic: param.is_variadic(),
        }
    }
}

fn entry(module: &str, method: &MethodSpec) -> ApiEntry {
    ApiEntry {
        api: format!("{module}{PATH_SEPARATOR}{}", method.name()),
        summary: method.description().map(str::to_owned),
        params: method.params().iter().map(ApiParam::from).collect(),
    }
}

/// Registered module paths in sorted order.
#[must_use]
pub fn modules(registry: &Registry) -> Vec<String> {
    registry.modules().map(str::to_owned).collect()
}

/// Lists callable methods sorted by path.
///
/// When `module` is given only that module's methods are listed; an unknown
/// module yields an empty listing.
#[must_use]
pub fn list(registry: &Registry, module: Option<&str>) -> Vec<ApiEntry> {
    let mut entries: Vec<ApiEntry> = registry
        .modules()
        .filter(|path| module.is_none_or(|wanted| wanted == *path))
        .flat_map(|path| {
            registry
                .methods(path)
                .filter(|method| !grammar::is_framework_method(method.name()))
                .map(move |method| entry(path, method))
        })
        .collect();
    entries.sort_by(|left, right| left.api.cmp(&right.api));
    entries
}
