//! Handler modules shared by the kernel test suites.

use serde_json::{Value, json};

use crate::dispatch::HandlerError;
use crate::registry::{MethodSpec, ModuleSpec, ParamDescriptor, ParamType, Registry};

/// Module `a/B` used throughout the lifecycle scenarios.
///
/// - `c(x: int)` doubles `x`;
/// - `d()` returns `2`;
/// - `fail()` returns a 500 handler error;
/// - `panic()` panics;
/// - `halt(reason: int = 0)` stops the pipeline and returns `"halted"`;
/// - `mark()` writes `marked = true` into the request data;
/// - `seen()` reports whether `marked` is set.
#[must_use]
pub fn sample_module() -> ModuleSpec {
    ModuleSpec::new("a/B")
        .method(
            MethodSpec::new("c", |_, args| Ok(json!(args.int("x")? * 2)))
                .param(ParamDescriptor::required("x", ParamType::Int))
                .summary("Doubles x."),
        )
        .method(MethodSpec::new("d", |_, _| Ok(json!(2))))
        .method(MethodSpec::new("fail", |_, _| {
            Err(HandlerError::fault("intentional failure"))
        }))
        .method(MethodSpec::new("panic", |_, _| panic!("handler blew up")))
        .method(
            MethodSpec::new("halt", |context, args| {
                let reason = u16::try_from(args.int("reason")?)
                    .map_err(|_| HandlerError::invalid_argument("reason", "out of range"))?;
                context.stop(reason);
                Ok(json!("halted"))
            })
            .param(ParamDescriptor::optional("reason", ParamType::Int, json!(0))),
        )
        .method(MethodSpec::new("mark", |context, _| {
            context.data_mut().insert("marked".to_owned(), Value::Bool(true));
            Ok(Value::Null)
        }))
        .method(MethodSpec::new("seen", |context, _| {
            Ok(Value::Bool(context.data().contains_key("marked")))
        }))
}

/// Module `boot/Auth` providing an INIT command.
///
/// `verify()` reads `token` from the raw request input, succeeding for
/// `"secret"` and failing with 401 otherwise.
#[must_use]
pub fn auth_module() -> ModuleSpec {
    ModuleSpec::new("boot/Auth").method(MethodSpec::new("verify", |context, _| {
        if context.input().get("token").and_then(Value::as_str) == Some("secret") {
            Ok(Value::Bool(true))
        } else {
            Err(HandlerError::new(401, "token rejected"))
        }
    }))
}

/// Registry containing [`sample_module`] and [`auth_module`].
#[must_use]
pub fn sample_registry() -> Registry {
    Registry::new()
        .with_module(&sample_module())
        .and_then(|registry| registry.with_module(&auth_module()))
        .expect("sample modules register")
}
