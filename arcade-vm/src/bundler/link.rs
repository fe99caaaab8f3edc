//! Flatten transformed modules into one CommonJS body.
//!
//! The linked text is a function body over `require`, `module` and
//! `exports`. Every bundled file becomes an entry of a module table keyed by
//! its path and is loaded once, on first `__require`. Externals stay as the
//! free `require` supplied by the host.

/// Runtime helpers shared by every bundled module.
const HELPERS: &str = concat!(
    "var __cache={};",
    "function __load(id){var c=__cache[id];if(c)return c.exports;",
    "var m={exports:{}};__cache[id]=m;__modules[id].call(m.exports,__load,m,m.exports);return m.exports}",
    "function __export(t,all){for(var k in all)Object.defineProperty(t,k,{get:all[k],enumerable:true})}",
    "function __bind(t,k,mod){Object.defineProperty(t,k,{get:function(){return mod[k]},enumerable:true})}",
    "function __reExport(t,mod){for(var k in mod)if(k!==\"default\"&&!Object.prototype.hasOwnProperty.call(t,k))__bind(t,k,mod)}",
    "function __toESM(mod){if(mod&&mod.__esModule)return mod;var ns={};",
    "if(mod!=null&&(typeof mod===\"object\"||typeof mod===\"function\"))",
    "for(var k in mod)if(k!==\"default\"&&Object.prototype.hasOwnProperty.call(mod,k))__bind(ns,k,mod);",
    "Object.defineProperty(ns,\"default\",{value:mod,enumerable:true});return ns}",
);

/// One module ready for linking.
#[derive(Debug, Clone)]
pub struct LinkedModule {
    pub path: String,
    pub code: String,
}

/// Join `modules` into the final artifact text. `modules` must be in a
/// deterministic order and contain `entry`.
pub fn link(entry: &str, modules: &[LinkedModule], minify: bool) -> String {
    let nl = if minify { "" } else { "\n" };
    let mut out = String::new();
    out.push_str("var __modules={");
    out.push_str(nl);
    for (i, module) in modules.iter().enumerate() {
        if i > 0 {
            out.push(',');
            out.push_str(nl);
        }
        out.push_str(&quote(&module.path));
        out.push_str(":function(__require,module,exports){");
        out.push_str(nl);
        out.push_str(&module.code);
        out.push_str(nl);
        out.push('}');
    }
    out.push_str(nl);
    out.push_str("};");
    out.push_str(nl);
    out.push_str(HELPERS);
    out.push_str(nl);
    out.push_str(&format!("module.exports=__load({});", quote(entry)));
    out
}

fn quote(text: &str) -> String {
    super::jsx::quote(text)
}
