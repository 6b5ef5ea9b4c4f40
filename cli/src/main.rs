mod config;
mod pbjs;

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use protodef_compiler::{
    build_table, prevalidate, render, GenMode, IdFormat, ProtodefError, RenderContext, SchemaFile,
};

use config::BuildConfig;

#[derive(Parser)]
#[command(name = "protodef")]
#[command(about = "Generate TypeScript dispatch tables from //$-annotated proto files", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the full pipeline: pbjs/pbts plus the dispatch-table artifact
    Generate {
        /// Project root the config paths are resolved against
        #[arg(long, default_value = ".")]
        root: PathBuf,

        /// Path to build_config.json, relative to the root
        #[arg(short, long, default_value = "build_config.json")]
        config: PathBuf,

        /// Directory holding the per-mode `.fmt` templates
        #[arg(long, default_value = "fmt")]
        fmt_dir: PathBuf,

        /// Override the config's sourceRoot
        source: Option<String>,

        /// Override the config's outputFile
        out_js: Option<String>,

        /// Override the config's outTSFile
        out_ts: Option<String>,

        /// Skip the external pbjs/pbts invocation
        #[arg(long)]
        skip_pbjs: bool,
    },

    /// Parse and validate the proto sources without writing anything
    Check {
        #[arg(long, default_value = ".")]
        root: PathBuf,

        #[arg(short, long, default_value = "build_config.json")]
        config: PathBuf,
    },

    /// Print the normalized dispatch table as JSON
    Table {
        #[arg(long, default_value = ".")]
        root: PathBuf,

        #[arg(short, long, default_value = "build_config.json")]
        config: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Generate {
            root,
            config,
            fmt_dir,
            source,
            out_js,
            out_ts,
            skip_pbjs,
        } => cmd_generate(&root, &config, &fmt_dir, source, out_js, out_ts, skip_pbjs),
        Commands::Check { root, config } => cmd_check(&root, &config),
        Commands::Table { root, config } => cmd_table(&root, &config),
    }
}

struct Workspace {
    root:  PathBuf,
    cfg:   BuildConfig,
    files: Vec<SchemaFile>,
    mode:  GenMode,
}

fn load_workspace(root: &Path, config: &Path) -> Result<Workspace> {
    load_workspace_with_overrides(root, config, None, None, None)
}

/// Config paths are written Unix-style and may carry a leading slash
/// meaning "under the project root".
fn join_config_path(root: &Path, value: &str) -> PathBuf {
    root.join(value.trim_start_matches('/'))
}

fn load_sources(proto_root: &Path) -> Result<Vec<SchemaFile>> {
    let mut paths = Vec::new();
    let entries = fs::read_dir(proto_root)
        .with_context(|| format!("cannot read proto dir {}", proto_root.display()))?;
    for entry in entries {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) == Some("proto") {
            paths.push(path);
        }
    }
    // directory order is OS-dependent; sort so reruns are byte-identical
    paths.sort();
    if paths.is_empty() {
        bail!("{} *.proto not found!", proto_root.display());
    }
    let mut files = Vec::new();
    for path in paths {
        let text = fs::read_to_string(&path)
            .with_context(|| format!("cannot read {}", path.display()))?;
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        files.push(SchemaFile::from_text(name, &text));
    }
    Ok(files)
}

fn build_context(cfg: &BuildConfig, mode: GenMode, reference_path: Option<String>) -> Result<RenderContext> {
    let id_format = if cfg.def_options.package_cmd_fmt.trim().is_empty() {
        None
    } else {
        Some(IdFormat::parse(&cfg.def_options.package_cmd_fmt)?)
    };
    Ok(RenderContext {
        mode,
        id_format,
        root_module: cfg.def_options.root_module.clone(),
        nodejs_mode: cfg.def_options.nodejs_mode,
        import_path: cfg.def_options.import_path.clone(),
        reference_path,
    })
}

/// Relative import path from the dispatch-table file to the pbjs
/// module, slash-separated regardless of platform.
fn relative_path(from_dir: &Path, to: &Path) -> String {
    let from: Vec<_> = from_dir.components().collect();
    let to_parts: Vec<_> = to.components().collect();
    let common = from
        .iter()
        .zip(&to_parts)
        .take_while(|(a, b)| a == b)
        .count();
    let mut parts: Vec<String> = vec!["..".to_string(); from.len() - common];
    parts.extend(
        to_parts[common..]
            .iter()
            .map(|c| c.as_os_str().to_string_lossy().into_owned()),
    );
    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

fn format_size(size: usize) -> String {
    if size < 1024 {
        format!("{}B", size)
    } else if size <= 1024 * 1024 {
        format!("{:.2}KB", size as f64 / 1024.0)
    } else {
        format!("{:.2}MB", size as f64 / (1024.0 * 1024.0))
    }
}

fn write_artifact(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    fs::write(path, content).with_context(|| format!("cannot write {}", path.display()))?;
    info!(file = %path.display(), size = %format_size(content.len()), "wrote artifact");
    Ok(())
}

fn cmd_generate(
    root: &Path,
    config: &Path,
    fmt_dir: &Path,
    source: Option<String>,
    out_js: Option<String>,
    out_ts: Option<String>,
    skip_pbjs: bool,
) -> Result<()> {
    let mut ws = load_workspace_with_overrides(root, config, source, out_js, out_ts)?;

    prevalidate(&ws.files, ws.mode)?;

    if !skip_pbjs {
        run_pbjs_chain(&ws)?;
    }

    let out_ts_file = ws
        .cfg
        .def_options
        .out_ts_file
        .take()
        .filter(|p| !p.trim().is_empty());
    if let Some(out_ts_file) = out_ts_file {
        let template_path = root.join(fmt_dir).join(format!("{}.fmt", ws.mode.as_str()));
        let template_text = fs::read_to_string(&template_path).map_err(|_| {
            ProtodefError::Config(format!("fmt file {} not found", template_path.display()))
        })?;
        let reference = relative_path(
            Path::new(out_ts_file.trim_start_matches('/'))
                .parent()
                .unwrap_or_else(|| Path::new("")),
            Path::new(ws.cfg.output_file.trim_start_matches('/')),
        );
        let ctx = build_context(&ws.cfg, ws.mode, Some(reference))?;
        let table = build_table(&ws.files, ws.mode)?;
        let content = render(&table, &ctx, &template_text)?;
        write_artifact(&join_config_path(&ws.root, &out_ts_file), &content)?;
    }

    info!("done with all");
    Ok(())
}

fn load_workspace_with_overrides(
    root: &Path,
    config: &Path,
    source: Option<String>,
    out_js: Option<String>,
    out_ts: Option<String>,
) -> Result<Workspace> {
    let mut cfg = BuildConfig::load(&root.join(config))?;
    if let Some(source) = source {
        cfg.source_root = source;
    }
    if let Some(out_js) = out_js {
        cfg.output_file = out_js;
    }
    if let Some(out_ts) = out_ts {
        cfg.def_options.out_ts_file = Some(out_ts);
    }
    let mode: GenMode = cfg.def_options.gen_mode.parse::<GenMode>()?;
    let proto_root = join_config_path(root, &cfg.source_root);
    let files = load_sources(&proto_root)?;
    info!(count = files.len(), dir = %proto_root.display(), "found .proto files");
    Ok(Workspace {
        root: root.to_path_buf(),
        cfg,
        files,
        mode,
    })
}

fn run_pbjs_chain(ws: &Workspace) -> Result<()> {
    let proto_root = join_config_path(&ws.root, &ws.cfg.source_root);
    let names: Vec<String> = ws.files.iter().map(|f| f.name.clone()).collect();
    let tmp = std::env::temp_dir().join(format!("protodef_{}.tmp", std::process::id()));

    let args = pbjs::pbjs_args(&ws.cfg.options, &proto_root, &names, &tmp);
    pbjs::run_tool("pbjs", &args)?;
    let js = fs::read_to_string(&tmp).context("pbjs produced no output")?;
    let js = pbjs::postprocess_js(&js, ws.cfg.def_options.nodejs_mode);
    let js_out = join_config_path(&ws.root, &ws.cfg.output_file);
    write_artifact(&js_out, &js)?;

    let pbts_args = vec![
        "--main".to_string(),
        js_out.display().to_string(),
        "-o".to_string(),
        tmp.display().to_string(),
    ];
    pbjs::run_tool("pbts", &pbts_args)?;
    let dts = fs::read_to_string(&tmp).context("pbts produced no output")?;
    let dts = pbjs::postprocess_dts(&dts, ws.cfg.def_options.nodejs_mode);
    let dts_out = match ws.cfg.output_ts_file.as_deref().filter(|p| !p.trim().is_empty()) {
        Some(p) => join_config_path(&ws.root, p),
        None => js_out.with_extension("d.ts"),
    };
    write_artifact(&dts_out, &dts)?;

    let _ = fs::remove_file(&tmp);
    Ok(())
}

fn cmd_check(root: &Path, config: &Path) -> Result<()> {
    let ws = load_workspace(root, config)?;
    prevalidate(&ws.files, ws.mode)?;
    let table = build_table(&ws.files, ws.mode)?;
    let members: usize = table.namespaces.iter().map(|ns| ns.members.len()).sum();
    println!(
        "ok: {} file(s), {} namespace(s), {} message(s)",
        ws.files.len(),
        table.namespaces.len(),
        members
    );
    Ok(())
}

fn cmd_table(root: &Path, config: &Path) -> Result<()> {
    let ws = load_workspace(root, config)?;
    prevalidate(&ws.files, ws.mode)?;
    let table = build_table(&ws.files, ws.mode)?;
    println!("{}", serde_json::to_string_pretty(&table)?);
    Ok(())
}
