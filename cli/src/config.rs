//! `build_config.json` loading.
//!
//! The config keeps the historical JSON shape: an `options` map passed
//! through to pbjs verbatim, a `defOptions` block steering table
//! generation, and the source/output paths. Keys in `options` starting
//! with `cmt` are inline comments and ignored.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildConfig {
    /// Pass-through flags for the external pbjs invocation.
    #[serde(default)]
    pub options: BTreeMap<String, Value>,
    pub def_options: DefOptions,
    pub source_root: String,
    pub output_file: String,
    #[serde(default, rename = "outputTSFile")]
    pub output_ts_file: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct DefOptions {
    #[serde(rename = "GenMode")]
    pub gen_mode: String,
    #[serde(rename = "packageCmdFmt", default)]
    pub package_cmd_fmt: String,
    #[serde(rename = "rootModule", default)]
    pub root_module: String,
    #[serde(rename = "nodejsMode", default)]
    pub nodejs_mode: bool,
    #[serde(rename = "importPath", default)]
    pub import_path: Option<String>,
    /// Path of the generated dispatch-table artifact; empty disables it.
    #[serde(rename = "outTSFile", default)]
    pub out_ts_file: Option<String>,
}

impl BuildConfig {
    pub fn load(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("build config file {} not found", path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("invalid build config {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_original_config_shape() {
        let text = r#"{
            "options": {
                "cmt01": ["target format"],
                "-t": "static",
                "--no-create": false,
                "--no-verify": true
            },
            "defOptions": {
                "GenMode": "PackageCmd",
                "packageCmdFmt": "%d%04d",
                "rootModule": "sproto",
                "nodejsMode": true,
                "importPath": "protobufjs",
                "outTSFile": "client/proto/sproto.ts"
            },
            "sourceRoot": "/proto",
            "outputFile": "client/proto/protobuf-static.js",
            "outputTSFile": "client/proto/protobuf-static.d.ts"
        }"#;
        let cfg: BuildConfig = serde_json::from_str(text).unwrap();
        assert_eq!(cfg.def_options.gen_mode, "PackageCmd");
        assert_eq!(cfg.def_options.package_cmd_fmt, "%d%04d");
        assert!(cfg.def_options.nodejs_mode);
        assert_eq!(cfg.source_root, "/proto");
        assert_eq!(
            cfg.output_ts_file.as_deref(),
            Some("client/proto/protobuf-static.d.ts")
        );
        assert_eq!(cfg.options.len(), 4);
    }

    #[test]
    fn test_minimal_config() {
        let text = r#"{
            "defOptions": { "GenMode": "Normal" },
            "sourceRoot": "proto",
            "outputFile": "out/static.js"
        }"#;
        let cfg: BuildConfig = serde_json::from_str(text).unwrap();
        assert_eq!(cfg.def_options.gen_mode, "Normal");
        assert_eq!(cfg.def_options.package_cmd_fmt, "");
        assert!(!cfg.def_options.nodejs_mode);
        assert!(cfg.options.is_empty());
    }
}
