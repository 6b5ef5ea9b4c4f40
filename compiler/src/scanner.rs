//! The annotation scanner: one pass per file, producing the ordered
//! landmark stream the table builder consumes.
//!
//! Only three syntactic shapes are recognized — the `package` clause,
//! `message` declaration lines, and (EnumCmd mode) an `enum EMessageDef`
//! block. Everything else in the file is skipped, so the scanner never
//! needs the full proto grammar. Scanning is an index cursor over the
//! immutable line array; the preceding line doubles as an optional
//! comment annotation.

use tracing::debug;

use crate::{
    error::ProtodefError,
    sentinel,
    types::{EnumMemberDecl, GenMode, Landmark, MessageDecl, PackageDecl, SchemaFile},
    utils::parse_error,
};

pub const PACKAGE_KEYWORD: &str = "package";
pub const MESSAGE_KEYWORD: &str = "message";
const ENUM_HEADER: &str = "enum EMessageDef";

pub fn scan_file(file: &SchemaFile, mode: GenMode) -> Result<Vec<Landmark>, ProtodefError> {
    let landmarks = match mode {
        GenMode::Normal => scan_normal(file)?,
        GenMode::PackageCmd | GenMode::PackageCmdFast => scan_id_based(file)?,
        GenMode::EnumCmd => scan_enum(file)?,
    };
    debug!(file = %file.name, count = landmarks.len(), "scanned landmarks");
    Ok(landmarks)
}

/// The line above `idx`, when it is a comment line.
fn comment_above(file: &SchemaFile, idx: usize) -> Option<String> {
    if idx == 0 {
        return None;
    }
    let prev = file.lines[idx - 1].trim();
    prev.starts_with("//").then(|| prev.to_string())
}

/// Package name out of `package <Name>;`, after the keyword was matched.
fn package_name(file: &SchemaFile, idx: usize, line: &str) -> Result<String, ProtodefError> {
    let rest = line[PACKAGE_KEYWORD.len()..].trim();
    let semi = rest
        .find(';')
        .ok_or_else(|| parse_error(&file.name, idx + 1, "package declaration missing ';'"))?;
    Ok(rest[..semi].trim().to_string())
}

/// PackageCmd / PackageCmdFast: package line carries a mandatory
/// `//$<id>`; message lines without a sentinel stay out of the table.
fn scan_id_based(file: &SchemaFile) -> Result<Vec<Landmark>, ProtodefError> {
    let mut landmarks = Vec::new();
    let mut pkg_idx = None;

    for (idx, raw) in file.lines.iter().enumerate() {
        let line = raw.trim();
        if !line.starts_with(PACKAGE_KEYWORD) {
            continue;
        }
        let Some(payload) = sentinel::payload(line) else {
            return Err(parse_error(
                &file.name,
                idx + 1,
                "package id not found (expected trailing //$<id>)",
            ));
        };
        let id = sentinel::parse_id(payload).ok_or_else(|| {
            parse_error(&file.name, idx + 1, "package id is not a valid integer")
        })?;
        landmarks.push(Landmark::Package(PackageDecl {
            name:    package_name(file, idx, line)?,
            id:      Some(id),
            comment: comment_above(file, idx),
            line:    idx + 1,
        }));
        pkg_idx = Some(idx);
        break;
    }

    let Some(start) = pkg_idx else {
        return Err(ProtodefError::MissingPackage(file.name.clone()));
    };

    for idx in start + 1..file.lines.len() {
        let line = file.lines[idx].trim();
        if !line.starts_with(MESSAGE_KEYWORD) {
            continue;
        }
        let Some(payload) = sentinel::payload(line) else {
            // untagged messages are outside the routing scheme
            continue;
        };
        let id = sentinel::parse_id(payload).ok_or_else(|| {
            parse_error(&file.name, idx + 1, "message id is not a valid integer")
        })?;
        let rest = line[MESSAGE_KEYWORD.len()..].trim();
        let name = rest[..sentinel::ident_run_end(rest, "", 0)].to_string();
        if name.is_empty() {
            return Err(parse_error(&file.name, idx + 1, "message name missing"));
        }
        landmarks.push(Landmark::Message(MessageDecl {
            name,
            id: Some(id),
            comment: comment_above(file, idx),
            line: idx + 1,
        }));
    }

    Ok(landmarks)
}

/// Normal mode: no sentinels. A file without a package clause drops its
/// messages into the no-namespace bucket, rescanning from the top.
fn scan_normal(file: &SchemaFile) -> Result<Vec<Landmark>, ProtodefError> {
    let mut landmarks = Vec::new();
    let mut start = 0;

    for (idx, raw) in file.lines.iter().enumerate() {
        let line = raw.trim();
        if !line.starts_with(PACKAGE_KEYWORD) {
            continue;
        }
        landmarks.push(Landmark::Package(PackageDecl {
            name:    package_name(file, idx, line)?,
            id:      None,
            comment: comment_above(file, idx),
            line:    idx + 1,
        }));
        start = idx + 1;
        break;
    }

    for idx in start..file.lines.len() {
        let line = file.lines[idx].trim();
        if !line.starts_with(MESSAGE_KEYWORD) {
            continue;
        }
        let rest = line[MESSAGE_KEYWORD.len()..].trim();
        let name = rest[..sentinel::ident_run_end(rest, "", 0)].to_string();
        if name.is_empty() {
            continue;
        }
        landmarks.push(Landmark::Message(MessageDecl {
            name,
            id: None,
            comment: comment_above(file, idx),
            line: idx + 1,
        }));
    }

    Ok(landmarks)
}

fn collapse_ws(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut in_space = false;
    for c in s.chars() {
        if c == ' ' || c == '\t' {
            if !in_space {
                out.push(' ');
            }
            in_space = true;
        } else {
            out.push(c);
            in_space = false;
        }
    }
    out
}

fn strip_leading_comment(s: &str) -> &str {
    s.strip_prefix("//").map(str::trim_start).unwrap_or(s)
}

/// EnumCmd mode: the namespace is declared by an `enum EMessageDef`
/// header tagged `//$<Name>:<Id>`; its members carry the message ids. A
/// commented-out header or member still counts, matching the original
/// convention of keeping routing tags inside comments.
fn scan_enum(file: &SchemaFile) -> Result<Vec<Landmark>, ProtodefError> {
    let mut landmarks = Vec::new();
    let mut header_idx = None;

    for (idx, raw) in file.lines.iter().enumerate() {
        let collapsed = collapse_ws(raw.trim());
        let line = strip_leading_comment(&collapsed);
        if !line.starts_with(ENUM_HEADER) {
            continue;
        }
        let payload = sentinel::payload(line).ok_or_else(|| {
            parse_error(&file.name, idx + 1, "enum EMessageDef requires //$<Name>:<Id>")
        })?;
        let (name, id) = sentinel::parse_name_id(payload).ok_or_else(|| {
            parse_error(&file.name, idx + 1, "malformed //$<Name>:<Id> tag")
        })?;
        if id == 0 {
            return Err(parse_error(&file.name, idx + 1, "package id must be positive"));
        }
        landmarks.push(Landmark::Package(PackageDecl {
            name,
            id: Some(id),
            comment: comment_above(file, idx),
            line: idx + 1,
        }));
        header_idx = Some(idx);
        break;
    }

    // A file with no message-def enum contributes nothing.
    let Some(start) = header_idx else {
        return Ok(landmarks);
    };

    let mut last_id: i64 = -1;
    for idx in start + 1..file.lines.len() {
        let raw = file.lines[idx].trim();
        let line = strip_leading_comment(raw);
        if line.starts_with('}') {
            break;
        }
        let Some(semi) = line.find(';') else {
            continue;
        };
        if line.len() <= 2 {
            continue;
        }
        let head = &line[..semi];
        let (name_part, value_part) = match head.split_once('=') {
            Some((n, v)) => (n, Some(v)),
            None => (head, None),
        };
        let name = name_part.trim().to_string();
        if name.is_empty() {
            continue;
        }
        let id = match value_part {
            Some(v) => sentinel::parse_id(v).ok_or_else(|| {
                parse_error(&file.name, idx + 1, "enum member id is not a valid integer")
            })?,
            None => (last_id + 1) as u32,
        };
        last_id = i64::from(id);
        let tail = &line[semi + 1..];
        let (proto, comment) = match tail.find("//") {
            Some(ci) => {
                let (proto, cleaned) = sentinel::split_proto_ref(&tail[ci..]);
                (proto, (!cleaned.is_empty()).then_some(cleaned))
            }
            None => (None, None),
        };
        landmarks.push(Landmark::EnumMember(EnumMemberDecl {
            name,
            id,
            proto,
            comment,
            line: idx + 1,
        }));
    }

    Ok(landmarks)
}
