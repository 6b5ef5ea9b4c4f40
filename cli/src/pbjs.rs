//! Invocation glue for the external protobufjs toolchain (`pbjs` and
//! `pbts`), plus the text rewrites applied to their output before it is
//! written out. The serialization code itself comes entirely from those
//! tools; the table generator only needs the type names they emit.

use std::collections::BTreeMap;
use std::path::Path;
use std::process::Command;

use anyhow::{bail, Context, Result};
use serde_json::Value;
use tracing::info;

/// Build the pbjs argument vector from the config options map. `cmt*`
/// keys are comments; `true` booleans become bare flags, strings become
/// `key value` pairs.
pub fn pbjs_args(
    options: &BTreeMap<String, Value>,
    proto_root: &Path,
    proto_files: &[String],
    out_file: &Path,
) -> Vec<String> {
    let mut args = Vec::new();
    for (key, value) in options {
        if key.starts_with("cmt") {
            continue;
        }
        match value {
            Value::Bool(true) => args.push(key.clone()),
            Value::Bool(false) | Value::Null => {}
            Value::String(s) => {
                args.push(key.clone());
                args.push(s.clone());
            }
            _ => {}
        }
    }
    args.push("-p".to_string());
    args.push(proto_root.display().to_string());
    args.extend(proto_files.iter().cloned());
    args.push("-o".to_string());
    args.push(out_file.display().to_string());
    args
}

pub fn run_tool(tool: &str, args: &[String]) -> Result<()> {
    info!(tool, "invoking external schema compiler");
    let output = Command::new(tool)
        .args(args)
        .output()
        .with_context(|| format!("failed to launch {}", tool))?;
    if !output.status.success() {
        bail!("{} failed: {}", tool, String::from_utf8_lossy(&output.stderr));
    }
    Ok(())
}

/// Browser builds get the window shim prepended; nodejs builds are left
/// as pbjs emitted them.
pub fn postprocess_js(js: &str, nodejs_mode: bool) -> String {
    if nodejs_mode {
        js.to_string()
    } else {
        format!(
            "var $protobuf = window.protobuf;\n$protobuf.roots.default=window;\n{}",
            js
        )
    }
}

/// Rewrites for the pbts declaration output: `Long` references point at
/// the protobuf namespace, and browser builds lose the module wrappers.
pub fn postprocess_dts(dts: &str, nodejs_mode: bool) -> String {
    let mut out = dts
        .replace(": Long;", ": protobuf.Long;")
        .replace("number|Long", "(number|protobuf.Long)")
        .replace("$protobuf", "protobuf");
    if nodejs_mode {
        out = format!("/// <reference types='protobufjs' />\n\n{}", out);
    } else {
        out = out
            .replace("export namespace", "declare namespace")
            .replace("export class", "declare class")
            .replace("export interface", "interface");
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_pbjs_args_skip_comments_and_false_flags() {
        let mut options = BTreeMap::new();
        options.insert("cmt01".to_string(), Value::String("ignored".into()));
        options.insert("-t".to_string(), Value::String("static".into()));
        options.insert("--no-create".to_string(), Value::Bool(false));
        options.insert("--no-verify".to_string(), Value::Bool(true));
        let args = pbjs_args(
            &options,
            &PathBuf::from("proto"),
            &["a.proto".to_string(), "b.proto".to_string()],
            &PathBuf::from("/tmp/out.js"),
        );
        assert_eq!(
            args,
            vec![
                "--no-verify",
                "-t",
                "static",
                "-p",
                "proto",
                "a.proto",
                "b.proto",
                "-o",
                "/tmp/out.js"
            ]
        );
    }

    #[test]
    fn test_postprocess_js_browser_shim() {
        let out = postprocess_js("code();", false);
        assert!(out.starts_with("var $protobuf = window.protobuf;\n"));
        assert!(out.ends_with("code();"));
        assert_eq!(postprocess_js("code();", true), "code();");
    }

    #[test]
    fn test_postprocess_dts_browser_mode() {
        let dts = "export namespace Foo {\nexport class Bar {\nx: Long;\n}\n}\n";
        let out = postprocess_dts(dts, false);
        assert!(out.contains("declare namespace Foo"));
        assert!(out.contains("declare class Bar"));
        assert!(out.contains("x: protobuf.Long;"));
    }

    #[test]
    fn test_postprocess_dts_nodejs_mode() {
        let out = postprocess_dts("export class A {}", true);
        assert!(out.starts_with("/// <reference types='protobufjs' />"));
        assert!(out.contains("export class A {}"));
    }
}
