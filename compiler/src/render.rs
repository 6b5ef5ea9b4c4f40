//! The four table renderers.
//!
//! Each mode projects the normalized table into a handful of text
//! fragments and splices them into that mode's template. The fragment
//! strings are built here byte for byte; the templates only decide what
//! surrounds them, so the same table and context always render the same
//! artifact.

use tracing::debug;

use crate::{
    error::ProtodefError,
    idfmt::{self, IdFormat},
    table::{MemberEntry, NamespaceEntry, NormalizedTable},
    template,
    types::GenMode,
    utils::quote,
};

/// Name of the const enum emitted by the PackageCmdFast renderer. The
/// mode's template declares it and the generated map keys refer to it.
pub const MSG_ID_ENUM: &str = "EMsgId";

/// Everything a renderer needs besides the table itself.
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub mode:           GenMode,
    /// Composite-id template; required by the modes that emit composite
    /// keys (PackageCmdFast, EnumCmd).
    pub id_format:      Option<IdFormat>,
    /// Module the generated declarations are wrapped in; empty for none.
    pub root_module:    String,
    /// Emit module-scoped `export`s instead of browser globals.
    pub nodejs_mode:    bool,
    /// Import path of the protobuf runtime (nodejs mode).
    pub import_path:    Option<String>,
    /// Relative import path of the generated pbjs module (nodejs mode);
    /// generated type references are prefixed `p.` when set.
    pub reference_path: Option<String>,
}

pub fn render(
    table: &NormalizedTable,
    ctx: &RenderContext,
    template_text: &str,
) -> Result<String, ProtodefError> {
    debug!(mode = ctx.mode.as_str(), "rendering dispatch table");
    match ctx.mode {
        GenMode::Normal => render_normal(table, ctx, template_text),
        GenMode::PackageCmd => render_package_cmd(table, ctx, template_text),
        GenMode::PackageCmdFast => render_package_cmd_fast(table, ctx, template_text),
        GenMode::EnumCmd => render_enum_cmd(table, ctx, template_text),
    }
}

/// The shared shell fragments: imports, module wrapper, export keywords.
struct Shell {
    import_content:    String,
    reference_content: String,
    module_head:       String,
    module_tail:       &'static str,
    export_module:     &'static str,
    has_module:        bool,
    pimport:           &'static str,
}

impl Shell {
    fn new(ctx: &RenderContext) -> Self {
        let import_path = ctx
            .import_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .filter(|_| ctx.nodejs_mode);
        let reference_path = ctx
            .reference_path
            .as_deref()
            .filter(|p| !p.trim().is_empty())
            .filter(|_| ctx.nodejs_mode);
        let has_module = !ctx.root_module.trim().is_empty();
        let export = if ctx.nodejs_mode { "export " } else { "" };
        Shell {
            import_content: import_path
                .map(|p| format!("import * as protobuf from '{}';protobuf;\n", p))
                .unwrap_or_default(),
            reference_content: reference_path
                .map(|p| format!("import * as p from '{}';\n", p))
                .unwrap_or_default(),
            module_head: if has_module {
                format!("{}module {} {{\n", export, ctx.root_module)
            } else {
                String::new()
            },
            module_tail: if has_module { "}\n" } else { "" },
            export_module: if has_module || ctx.nodejs_mode { "export " } else { "" },
            has_module,
            pimport: if import_path.is_some() { "p." } else { "" },
        }
    }

    /// Normal mode only exports its declarations when module-wrapped.
    fn export_module_normal(&self) -> &'static str {
        if self.has_module {
            "export "
        } else {
            ""
        }
    }
}

fn comment_line(comment: &Option<String>, indent: &str) -> String {
    match comment {
        Some(c) => format!("{}{}\n", indent, c),
        None => String::new(),
    }
}

fn comment_suffix(comment: &Option<String>) -> String {
    match comment {
        Some(c) => format!("\t{}", c),
        None => String::new(),
    }
}

fn namespace_parts(ns: &NamespaceEntry) -> Result<(&str, u32), ProtodefError> {
    match (ns.name.as_deref(), ns.id) {
        (Some(name), Some(id)) => Ok((name, id)),
        _ => Err(ProtodefError::Config(format!(
            "namespace {} carries no numeric id for an id-keyed mode",
            quote(ns.display_name())
        ))),
    }
}

fn member_id(ns: &NamespaceEntry, member: &MemberEntry) -> Result<u32, ProtodefError> {
    member.id.ok_or_else(|| {
        ProtodefError::Config(format!(
            "message {}.{} carries no numeric id for an id-keyed mode",
            ns.display_name(),
            member.name
        ))
    })
}

fn composite_format(ctx: &RenderContext) -> Result<&IdFormat, ProtodefError> {
    ctx.id_format.as_ref().ok_or_else(|| {
        ProtodefError::Config(format!(
            "packageCmdFmt is required for {} mode",
            ctx.mode.as_str()
        ))
    })
}

/// Normal mode: a type map and a string enum keyed by message name,
/// namespace-prefixed only when more than two namespaces are in play.
fn render_normal(
    table: &NormalizedTable,
    ctx: &RenderContext,
    template_text: &str,
) -> Result<String, ProtodefError> {
    let shell = Shell::new(ctx);
    let prefixed = table.namespaces.len() > 2;
    let mut itype = String::new();
    let mut ntype = String::new();

    for ns in &table.namespaces {
        match ns.name.as_deref() {
            Some(pname) => {
                for m in &ns.members {
                    let key = if prefixed {
                        format!("{}_{}", pname, m.name)
                    } else {
                        m.name.clone()
                    };
                    itype.push_str(&format!(
                        "\t'{}': {}{}.{},{}\n",
                        key,
                        shell.pimport,
                        pname,
                        m.iname,
                        comment_suffix(&m.comment)
                    ));
                    ntype.push_str(&format!(
                        "{}\t{}: '{}',\n",
                        comment_line(&m.comment, "\t"),
                        key,
                        key
                    ));
                }
            }
            None => {
                for m in &ns.members {
                    itype.push_str(&format!("\t'{}': {}{},\n", m.name, shell.pimport, m.iname));
                    ntype.push_str(&format!(
                        "{}\t{}: '{}',\n",
                        comment_line(&m.comment, "\t"),
                        m.name,
                        m.name
                    ));
                }
            }
        }
    }

    Ok(template::expand(
        template_text,
        &[
            &shell.import_content,
            &shell.reference_content,
            &shell.module_head,
            &itype,
            &ntype,
            shell.module_tail,
            shell.export_module_normal(),
        ],
    ))
}

/// PackageCmd mode: maps keyed by quoted package id then message id,
/// plus a handler map carrying string and numeric id forms so runtimes
/// can compare integers on the wire.
fn render_package_cmd(
    table: &NormalizedTable,
    ctx: &RenderContext,
    template_text: &str,
) -> Result<String, ProtodefError> {
    let shell = Shell::new(ctx);
    let mut imsg = String::new();
    let mut schandler = String::new();
    let mut handler = String::new();

    for ns in &table.namespaces {
        let (pname, sysid) = namespace_parts(ns)?;
        imsg.push_str(&format!("\t'{}': {{\n", sysid));
        schandler.push_str(&format!("\t'{}': {{\n", sysid));
        handler.push_str(&format!(
            "{}\t{}: {{\n",
            comment_line(&ns.comment, "\t"),
            pname
        ));
        for m in &ns.members {
            let cmdid = member_id(ns, m)?;
            imsg.push_str(&format!(
                "\t\t'{}': {}{}.{},\n",
                cmdid, shell.pimport, pname, m.iname
            ));
            schandler.push_str(&format!(
                "\t\t'{}': {}{}.{},\n",
                cmdid, shell.pimport, pname, m.name
            ));
            handler.push_str(&format!(
                "{}\t\t{}: <IHandler<'{}', '{}'>>{{s: '{}', c: '{}', ns: {}, nc: {}, pt: {}{}.{} }},\n",
                comment_line(&m.comment, "\t\t"),
                m.name,
                sysid,
                cmdid,
                sysid,
                cmdid,
                sysid,
                cmdid,
                shell.pimport,
                pname,
                m.name
            ));
        }
        imsg.push_str("\t},\n");
        schandler.push_str("\t},\n");
        handler.push_str("\t},\n");
    }

    Ok(template::expand(
        template_text,
        &[
            &shell.import_content,
            &shell.reference_content,
            &shell.module_head,
            &imsg,
            &schandler,
            &handler,
            shell.module_tail,
            shell.export_module,
        ],
    ))
}

/// PackageCmdFast mode: one const enum of composite routing ids, with
/// the maps keyed by its enumerants instead of sid/id string pairs.
fn render_package_cmd_fast(
    table: &NormalizedTable,
    ctx: &RenderContext,
    template_text: &str,
) -> Result<String, ProtodefError> {
    let shell = Shell::new(ctx);
    let fmt = composite_format(ctx)?;
    idfmt::check_injective(fmt, table)?;
    let mut id_enum = String::new();
    let mut imsg = String::new();
    let mut schandler = String::new();
    let mut handler = String::new();

    for ns in &table.namespaces {
        let (pname, sysid) = namespace_parts(ns)?;
        id_enum.push_str(&format!(
            "\t// {}\n{}",
            pname,
            comment_line(&ns.comment, "\t")
        ));
        imsg.push_str(&format!("\t// {}\n", pname));
        schandler.push_str(&format!("\t// {}\n", pname));
        handler.push_str(&format!(
            "\t// {}\n{}\t{}: {{\n",
            pname,
            comment_line(&ns.comment, "\t"),
            pname
        ));
        for m in &ns.members {
            let cmdid = member_id(ns, m)?;
            let key = format!("{}_{}", pname, m.name);
            let id = fmt.compose_id(sysid, cmdid)?;
            id_enum.push_str(&format!(
                "{}\t{} = {},\n",
                comment_line(&m.comment, "\t"),
                key,
                id
            ));
            imsg.push_str(&format!(
                "\t[{}.{}]: {}{}.{},\n",
                MSG_ID_ENUM, key, shell.pimport, pname, m.iname
            ));
            schandler.push_str(&format!(
                "\t[{}.{}]: {}{}.{},\n",
                MSG_ID_ENUM, key, shell.pimport, pname, m.name
            ));
            handler.push_str(&format!(
                "{}\t\t{}: <IHandler<{}.{}>>{{id: {}.{}, pt: {}{}.{} }},\n",
                comment_line(&m.comment, "\t\t"),
                m.name,
                MSG_ID_ENUM,
                key,
                MSG_ID_ENUM,
                key,
                shell.pimport,
                pname,
                m.name
            ));
        }
        handler.push_str("\t},\n");
    }

    Ok(template::expand(
        template_text,
        &[
            &shell.import_content,
            &shell.reference_content,
            &shell.module_head,
            &id_enum,
            &imsg,
            &schandler,
            &handler,
            shell.module_tail,
            shell.export_module,
        ],
    ))
}

/// EnumCmd mode: one map keyed by package name, one keyed by numeric
/// package id; a member with no backing proto renders `null`.
fn render_enum_cmd(
    table: &NormalizedTable,
    ctx: &RenderContext,
    template_text: &str,
) -> Result<String, ProtodefError> {
    let shell = Shell::new(ctx);
    let fmt = composite_format(ctx)?;
    idfmt::check_injective(fmt, table)?;
    let mut imsg = String::new();
    let mut schandler = String::new();
    let mut handler = String::new();

    for ns in &table.namespaces {
        let (pname, sysid) = namespace_parts(ns)?;
        imsg.push_str(&format!(
            "{}\t'{}': {{\n",
            comment_line(&ns.comment, "\t"),
            pname
        ));
        schandler.push_str(&format!(
            "{}\t'{}': {{\n",
            comment_line(&ns.comment, "\t"),
            sysid
        ));
        handler.push_str(&format!(
            "{}\t{}: {{\n",
            comment_line(&ns.comment, "\t"),
            pname
        ));
        for m in &ns.members {
            let cmdid = member_id(ns, m)?;
            let pt = match m.proto.as_deref() {
                Some(proto) => format!("{}{}", shell.pimport, proto),
                None => "null".to_string(),
            };
            imsg.push_str(&format!(
                "\t\t'{}': {},{}\n",
                m.name,
                pt,
                comment_suffix(&m.comment)
            ));
            schandler.push_str(&format!(
                "\t\t'{}': {},{}\n",
                cmdid,
                pt,
                comment_suffix(&m.comment)
            ));
            let sid = fmt.compose_sid(sysid, cmdid);
            let mid = fmt.compose_id(sysid, cmdid)?;
            handler.push_str(&format!(
                "\t\t{}: <IHandler<'{}', '{}'>>{{p: '{}', m: '{}', sid: '{}', mid: {}, pt: {} }},{}\n",
                m.name,
                pname,
                m.name,
                pname,
                m.name,
                sid,
                mid,
                pt,
                comment_suffix(&m.comment)
            ));
        }
        imsg.push_str("\t},\n");
        schandler.push_str("\t},\n");
        handler.push_str("\t},\n");
    }

    Ok(template::expand(
        template_text,
        &[
            &shell.import_content,
            &shell.reference_content,
            &shell.module_head,
            &imsg,
            "",
            &schandler,
            &handler,
            shell.module_tail,
            shell.export_module,
        ],
    ))
}
