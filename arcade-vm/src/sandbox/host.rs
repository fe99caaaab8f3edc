//! Host side of a realm: the JS prelude, native bindings and the outcome
//! protocol spoken between Rust and the prelude.
//!
//! The prelude evaluates to its protocol object instead of publishing it on
//! the global object. Rust keeps the protocol functions as [`JsFunction`]
//! handles, so agent code has no way to reach or replace them.

use crate::config::SandboxOptions;
use crate::error::{Error, Result};
use boa_engine::object::builtins::JsFunction;
use boa_engine::{js_string, Context, JsArgs, JsObject, JsResult, JsString, JsValue, NativeFunction, Source};
use serde::Deserialize;
use tracing::{debug, error, info, warn};

const RUNTIME: &str = include_str!("js/runtime.js");

/// Host libraries, each a script evaluating to its factory.
const LIBRARIES: &[(&str, &str)] = &[
    ("react", include_str!("js/react.js")),
    ("react/jsx-runtime", include_str!("js/jsx-runtime.js")),
];

/// Result of one embedder call into the realm.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub(super) enum Outcome {
    Ok {
        #[serde(default)]
        text: String,
        #[serde(default)]
        html: String,
    },
    Pending,
    Failed {
        error: String,
    },
    Missing {
        export: String,
    },
}

/// `Err` carries the text of an error the prelude could not catch, such as
/// an exceeded loop limit.
pub(super) type CallResult = std::result::Result<Outcome, String>;

/// The embedder calls of one installed realm.
pub(super) struct Protocol {
    instantiate: JsFunction,
    render: JsFunction,
    settle: JsFunction,
    cleanup: JsFunction,
}

impl Protocol {
    /// Run `code` as the scene's module body and bind its entry points.
    pub(super) fn instantiate(&self, context: &mut Context, code: &str) -> CallResult {
        invoke(&self.instantiate, &[JsString::from(code).into()], context)
    }

    /// Render one state; both arguments are JSON text.
    pub(super) fn render(&self, context: &mut Context, state: &str, previous: &str) -> CallResult {
        invoke(&self.render, &[JsString::from(state).into(), JsString::from(previous).into()], context)
    }

    /// Collect the result of the last call that returned `pending`.
    pub(super) fn settle(&self, context: &mut Context) -> CallResult {
        invoke(&self.settle, &[], context)
    }

    pub(super) fn cleanup(&self, context: &mut Context) -> CallResult {
        invoke(&self.cleanup, &[], context)
    }
}

/// Prepare a fresh context: limits, console binding, prelude, library table.
pub(super) fn install(context: &mut Context, options: &SandboxOptions) -> Result<Protocol> {
    if let Some(limit) = options.loop_iteration_limit {
        context.runtime_limits_mut().set_loop_iteration_limit(limit);
    }

    // The prelude takes this binding and deletes it from the global object.
    context
        .register_global_builtin_callable(js_string!("__arcade_log"), 2, NativeFunction::from_fn_ptr(console))
        .map_err(|e| Error::unexpected(format!("cannot bind console: {}", e)))?;

    let host = context
        .eval(Source::from_bytes(RUNTIME.as_bytes()))
        .map_err(|e| Error::unexpected(format!("prelude failed: {}", e)).with_operation("sandbox::install"))?;
    let host = host
        .as_object()
        .cloned()
        .ok_or_else(|| Error::unexpected("prelude did not return its protocol").with_operation("sandbox::install"))?;

    let define = method(&host, "define", context)?;
    for (id, source) in LIBRARIES {
        let factory = context
            .eval(Source::from_bytes(source.as_bytes()))
            .map_err(|e| Error::unexpected(format!("library {} failed: {}", id, e)).with_operation("sandbox::install"))?;
        define
            .call(&JsValue::undefined(), &[JsString::from(*id).into(), factory], context)
            .map_err(|e| Error::unexpected(format!("cannot define {}: {}", id, e)))?;
    }

    let config = serde_json::json!({
        "externals": options.externals,
        "render": options.render_export,
        "cleanup": options.cleanup_export,
    });
    method(&host, "configure", context)?
        .call(&JsValue::undefined(), &[JsString::from(config.to_string()).into()], context)
        .map_err(|e| Error::unexpected(format!("cannot configure realm: {}", e)))?;

    Ok(Protocol {
        instantiate: method(&host, "instantiate", context)?,
        render: method(&host, "render", context)?,
        settle: method(&host, "settle", context)?,
        cleanup: method(&host, "cleanup", context)?,
    })
}

fn method(host: &JsObject, name: &str, context: &mut Context) -> Result<JsFunction> {
    host.get(JsString::from(name), context)
        .ok()
        .and_then(|value| value.as_object().cloned())
        .and_then(JsFunction::from_object)
        .ok_or_else(|| Error::unexpected(format!("prelude has no '{}' function", name)).with_operation("sandbox::install"))
}

fn invoke(function: &JsFunction, args: &[JsValue], context: &mut Context) -> CallResult {
    let value = function
        .call(&JsValue::undefined(), args, context)
        .map_err(|e| e.to_string())?;
    let text = value
        .as_string()
        .map(|s| s.to_std_string_escaped())
        .ok_or_else(|| "realm returned a non-string outcome".to_string())?;
    serde_json::from_str(&text).map_err(|e| format!("malformed realm outcome: {}", e))
}

/// `console.*` from agent code, re-emitted under the `arcade::console` target.
fn console(_this: &JsValue, args: &[JsValue], context: &mut Context) -> JsResult<JsValue> {
    let level = args.get_or_undefined(0).to_string(context)?.to_std_string_escaped();
    let text = args.get_or_undefined(1).to_string(context)?.to_std_string_escaped();
    match level.as_str() {
        "error" => error!(target: "arcade::console", "{}", text),
        "warn" => warn!(target: "arcade::console", "{}", text),
        "debug" => debug!(target: "arcade::console", "{}", text),
        _ => info!(target: "arcade::console", "{}", text),
    }
    Ok(JsValue::undefined())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn realm() -> (Context, Protocol) {
        let mut context = Context::default();
        let protocol = install(&mut context, &SandboxOptions::default()).unwrap();
        (context, protocol)
    }

    fn eval_text(context: &mut Context, script: &str) -> String {
        let value = context.eval(Source::from_bytes(script.as_bytes())).unwrap();
        value.as_string().unwrap().to_std_string_escaped()
    }

    #[test]
    fn test_outcome_decoding() {
        let ok: Outcome = serde_json::from_str(r#"{"status":"ok","text":"a","html":"<b>a</b>"}"#).unwrap();
        assert_eq!(ok, Outcome::Ok { text: "a".into(), html: "<b>a</b>".into() });
        let bare: Outcome = serde_json::from_str(r#"{"status":"ok"}"#).unwrap();
        assert_eq!(bare, Outcome::Ok { text: String::new(), html: String::new() });
        let missing: Outcome = serde_json::from_str(r#"{"status":"missing","export":"renderGame"}"#).unwrap();
        assert_eq!(missing, Outcome::Missing { export: "renderGame".into() });
    }

    #[test]
    fn test_require_only_knows_configured_libraries() {
        let (mut context, protocol) = realm();
        let code = "var r = require('react'); var x = require('fs');\
                    exports.renderGame = function (c) { c.textContent = typeof r.createElement + ':' + Object.keys(x).length; };";
        assert_eq!(
            protocol.instantiate(&mut context, code).unwrap(),
            Outcome::Ok { text: String::new(), html: String::new() }
        );
        let outcome = protocol.render(&mut context, "{}", "null").unwrap();
        assert_eq!(outcome, Outcome::Ok { text: "function:0".into(), html: "function:0".into() });
    }

    #[test]
    fn test_prelude_hides_host_bindings() {
        let (mut context, _protocol) = realm();
        assert_eq!(
            eval_text(&mut context, "typeof __arcade_log + ',' + typeof __arcade + ',' + typeof console.log"),
            "undefined,undefined,function"
        );
    }

    #[test]
    fn test_agent_code_cannot_reach_protocol() {
        let (mut context, protocol) = realm();
        let code = "exports.renderGame = function (c) {\
                      var found = [];\
                      for (var n of Object.getOwnPropertyNames(globalThis)) {\
                        var v = globalThis[n];\
                        if (v && typeof v.settle === 'function') found.push(n);\
                      }\
                      c.textContent = typeof __arcade + ':' + found.length;\
                    };";
        protocol.instantiate(&mut context, code).unwrap();
        let outcome = protocol.render(&mut context, "{}", "null").unwrap();
        assert_eq!(outcome, Outcome::Ok { text: "undefined:0".into(), html: "undefined:0".into() });
    }

    #[test]
    fn test_static_markup() {
        let (mut context, protocol) = realm();
        let code = "var j = require('react/jsx-runtime');\
                    exports.renderGame = function (c, s) {\
                      return j.jsxs('ul', { className: 'list', children: s.items.map(function (i) { return j.jsx('li', { children: i }, i); }) });\
                    };";
        protocol.instantiate(&mut context, code).unwrap();
        let outcome = protocol.render(&mut context, r#"{"items":["a","<b>"]}"#, "null").unwrap();
        assert_eq!(
            outcome,
            Outcome::Ok {
                text: "a<b>".into(),
                html: "<ul class=\"list\"><li>a</li><li>&lt;b&gt;</li></ul>".into()
            }
        );
    }
}
