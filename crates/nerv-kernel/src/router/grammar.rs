//! Lexical rules for command strings.
//!
//! ```text
//! command := group ("," group)*
//! group   := segment ("/" segment)* "/" method ("-" method)*
//! ```
//!
//! The same rules validate handler registrations, so anything the registry
//! accepts is addressable and nothing the router rejects can be registered.

/// Separates independent invocations inside one command string.
pub const GROUP_DELIMITER: char = ',';

/// Separates module path segments from each other and from the method.
pub const PATH_SEPARATOR: char = '/';

/// Chains several methods of the same module.
pub const METHOD_CHAIN: char = '-';

/// Top-level namespaces owned by the kernel itself.
pub const FRAMEWORK_NAMESPACES: &[&str] = &["core"];

/// Methods every handler inherits from the framework base type.
pub const FRAMEWORK_METHODS: &[&str] = &["new"];

/// A syntactically valid group split into its module path and methods.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GroupPath<'a> {
    pub(crate) module: &'a str,
    pub(crate) methods: Vec<&'a str>,
}

/// Yields the non-empty groups of a command string in source order.
pub(crate) fn split_groups(command: &str) -> impl Iterator<Item = &str> {
    command
        .split(GROUP_DELIMITER)
        .map(str::trim)
        .filter(|group| !group.is_empty())
}

/// Splits a group into module path and method chain.
///
/// Returns `None` for anything that is not a well-formed, non-reserved
/// identifier: empty or dot segments, a leading or trailing separator,
/// characters outside the segment alphabet, a framework namespace or a
/// framework method.
pub(crate) fn parse_group(group: &str) -> Option<GroupPath<'_>> {
    let (module, methods) = group.rsplit_once(PATH_SEPARATOR)?;
    if !is_module_path(module) {
        return None;
    }

    let methods: Vec<&str> = methods.split(METHOD_CHAIN).collect();
    if methods
        .iter()
        .any(|method| !is_method_name(method) || is_framework_method(method))
    {
        return None;
    }

    Some(GroupPath { module, methods })
}

/// Validates a module path such as `a/B`.
pub(crate) fn is_module_path(path: &str) -> bool {
    let mut segments = path.split(PATH_SEPARATOR);
    let Some(first) = segments.next() else {
        return false;
    };
    is_segment(first) && !is_framework_namespace(first) && segments.all(is_segment)
}

/// Segment alphabet: ASCII letters, digits and underscores.
pub(crate) fn is_segment(segment: &str) -> bool {
    !segment.is_empty()
        && segment
            .bytes()
            .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
}

/// Method names follow identifier rules.
pub(crate) fn is_method_name(name: &str) -> bool {
    let mut bytes = name.bytes();
    match bytes.next() {
        Some(first) if first.is_ascii_alphabetic() || first == b'_' => {
            bytes.all(|byte| byte.is_ascii_alphanumeric() || byte == b'_')
        }
        _ => false,
    }
}

/// Methods inherited from the framework base type are never addressable.
pub(crate) fn is_framework_method(name: &str) -> bool {
    name.starts_with("__") || FRAMEWORK_METHODS.contains(&name)
}

pub(crate) fn is_framework_namespace(segment: &str) -> bool {
    FRAMEWORK_NAMESPACES
        .iter()
        .any(|reserved| reserved.eq_ignore_ascii_case(segment))
}

/// Validates a name looked up in the CLI whitelist.
///
/// CLI names may additionally contain dashes (`db-backup`), but the same
/// traversal rules apply.
pub(crate) fn is_cli_name(name: &str) -> bool {
    !name.is_empty()
        && name.split(PATH_SEPARATOR).all(|segment| {
            !segment.is_empty()
                && segment != "."
                && segment != ".."
                && segment
                    .bytes()
                    .all(|byte| byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'-')
        })
}
