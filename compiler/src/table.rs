//! The table builder: folds the per-file landmark streams into one
//! normalized dispatch table, enforcing id/name uniqueness as it goes.
//!
//! Files are processed strictly in list order and lines in file order,
//! so a well-formed input set always yields the same table. For the
//! id-keyed modes the finished table is sorted by ascending numeric id,
//! which is the order the generated maps use.

use std::thread;

use serde::Serialize;
use tracing::debug;

use crate::{
    error::ProtodefError,
    scanner::{self, PACKAGE_KEYWORD},
    types::{EnumMemberDecl, GenMode, Landmark, MessageDecl, PackageDecl, SchemaFile},
    utils::quote,
};

#[derive(Debug, Clone, Serialize)]
pub struct MemberEntry {
    pub name:    String,
    /// Interface-variant type name (`I` + message name) used by the
    /// type-map fragments.
    pub iname:   String,
    pub id:      Option<u32>,
    /// EnumCmd only: the generated message type backing this member.
    pub proto:   Option<String>,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct NamespaceEntry {
    /// `None` is the no-namespace bucket of Normal mode.
    pub name:    Option<String>,
    pub id:      Option<u32>,
    pub comment: Option<String>,
    pub members: Vec<MemberEntry>,
}

impl NamespaceEntry {
    pub fn display_name(&self) -> &str {
        self.name.as_deref().unwrap_or("<no namespace>")
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct NormalizedTable {
    pub namespaces: Vec<NamespaceEntry>,
}

/// Assert up front that every file declares a package where the mode
/// demands one. Each file is checked on its own worker with no shared
/// state; the sequential scan raises the same error, this only reports
/// it before any file is built.
pub fn prevalidate(files: &[SchemaFile], mode: GenMode) -> Result<(), ProtodefError> {
    if !mode.requires_package() {
        return Ok(());
    }
    thread::scope(|scope| {
        let handles: Vec<_> = files
            .iter()
            .map(|file| {
                scope.spawn(move || {
                    let found = file
                        .lines
                        .iter()
                        .any(|l| l.trim_start().starts_with(PACKAGE_KEYWORD));
                    if found {
                        Ok(())
                    } else {
                        Err(ProtodefError::MissingPackage(file.name.clone()))
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().expect("pre-validation worker panicked")?;
        }
        Ok(())
    })
}

pub fn build_table(files: &[SchemaFile], mode: GenMode) -> Result<NormalizedTable, ProtodefError> {
    let mut table = NormalizedTable::default();
    for file in files {
        let landmarks = scanner::scan_file(file, mode)?;
        let mut current: Option<usize> = None;
        for landmark in landmarks {
            match landmark {
                Landmark::Package(decl) => {
                    current = Some(insert_namespace(&mut table, decl, mode, &file.name)?);
                }
                Landmark::Message(decl) => {
                    let idx = match current {
                        Some(idx) => idx,
                        None => bucket_index(&mut table),
                    };
                    insert_message(&mut table.namespaces[idx], decl, &file.name)?;
                }
                Landmark::EnumMember(decl) => {
                    // the scanner only emits members after a header
                    let Some(idx) = current else { continue };
                    insert_enum_member(&mut table.namespaces[idx], decl, &file.name)?;
                }
            }
        }
    }
    if mode.id_keyed() {
        table.namespaces.sort_by_key(|ns| ns.id);
        for ns in &mut table.namespaces {
            ns.members.sort_by_key(|m| m.id);
        }
    }
    debug!(namespaces = table.namespaces.len(), "table built");
    Ok(table)
}

fn insert_namespace(
    table: &mut NormalizedTable,
    decl: PackageDecl,
    mode: GenMode,
    file: &str,
) -> Result<usize, ProtodefError> {
    if let Some(id) = decl.id {
        if let Some(prev) = table.namespaces.iter().find(|ns| ns.id == Some(id)) {
            return Err(ProtodefError::Collision(format!(
                "package id {} redefined at [{}] [{}] ({}:{})",
                id,
                quote(prev.display_name()),
                quote(&decl.name),
                file,
                decl.line
            )));
        }
    }
    if let Some(at) = table
        .namespaces
        .iter()
        .position(|ns| ns.name.as_deref() == Some(decl.name.as_str()))
    {
        // An EnumCmd namespace may be extended from a later file when it
        // repeats the same name:id tag.
        if mode == GenMode::EnumCmd && table.namespaces[at].id == decl.id {
            return Ok(at);
        }
        return Err(ProtodefError::Collision(format!(
            "package name {} redefined at [{}] [{}] ({}:{})",
            quote(&decl.name),
            quote(&decl.name),
            quote(&decl.name),
            file,
            decl.line
        )));
    }
    table.namespaces.push(NamespaceEntry {
        name:    Some(decl.name),
        id:      decl.id,
        comment: decl.comment,
        members: Vec::new(),
    });
    Ok(table.namespaces.len() - 1)
}

/// Index of the no-namespace bucket, creating it at the front of the
/// table on first use.
fn bucket_index(table: &mut NormalizedTable) -> usize {
    if let Some(idx) = table.namespaces.iter().position(|ns| ns.name.is_none()) {
        return idx;
    }
    table.namespaces.insert(
        0,
        NamespaceEntry {
            name:    None,
            id:      None,
            comment: None,
            members: Vec::new(),
        },
    );
    0
}

fn qualified(ns: &NamespaceEntry, member: &str) -> String {
    match ns.name.as_deref() {
        Some(name) => format!("{}.{}", name, member),
        None => member.to_string(),
    }
}

fn insert_message(
    ns: &mut NamespaceEntry,
    decl: MessageDecl,
    file: &str,
) -> Result<(), ProtodefError> {
    if let Some(id) = decl.id {
        if let Some(prev) = ns.members.iter().find(|m| m.id == Some(id)) {
            return Err(ProtodefError::Collision(format!(
                "message id {} redefined at [{}] [{}] ({}:{})",
                id,
                qualified(ns, &prev.name),
                qualified(ns, &decl.name),
                file,
                decl.line
            )));
        }
    }
    if ns.members.iter().any(|m| m.name == decl.name) {
        return Err(ProtodefError::Collision(format!(
            "message name {} redefined at [{}] [{}] ({}:{})",
            quote(&decl.name),
            qualified(ns, &decl.name),
            qualified(ns, &decl.name),
            file,
            decl.line
        )));
    }
    ns.members.push(MemberEntry {
        iname:   format!("I{}", decl.name),
        name:    decl.name,
        id:      decl.id,
        proto:   None,
        comment: decl.comment,
    });
    Ok(())
}

fn insert_enum_member(
    ns: &mut NamespaceEntry,
    decl: EnumMemberDecl,
    file: &str,
) -> Result<(), ProtodefError> {
    if ns.members.iter().any(|m| m.name == decl.name) {
        return Err(ProtodefError::Collision(format!(
            "message name {} redefined at [{}] [{}] ({}:{})",
            quote(&decl.name),
            qualified(ns, &decl.name),
            qualified(ns, &decl.name),
            file,
            decl.line
        )));
    }
    // auto-incremented ids can run into an explicit label; that is a
    // collision, not a silent overlap
    if let Some(prev) = ns.members.iter().find(|m| m.id == Some(decl.id)) {
        return Err(ProtodefError::Collision(format!(
            "message id {} redefined at [{}] [{}] ({}:{})",
            decl.id,
            qualified(ns, &prev.name),
            qualified(ns, &decl.name),
            file,
            decl.line
        )));
    }
    ns.members.push(MemberEntry {
        iname:   format!("I{}", decl.name),
        name:    decl.name,
        id:      Some(decl.id),
        proto:   decl.proto,
        comment: decl.comment,
    });
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files(texts: &[&str]) -> Vec<SchemaFile> {
        texts
            .iter()
            .enumerate()
            .map(|(i, t)| SchemaFile::from_text(format!("f{}.proto", i), t))
            .collect()
    }

    #[test]
    fn test_package_cmd_two_files() {
        let fs = files(&[
            "package Foo; //$1\nmessage Bar //$1 { }\n",
            "package Baz; //$2\nmessage Qux //$1 { }\n",
        ]);
        let table = build_table(&fs, GenMode::PackageCmd).unwrap();
        assert_eq!(table.namespaces.len(), 2);
        assert_eq!(table.namespaces[0].name.as_deref(), Some("Foo"));
        assert_eq!(table.namespaces[0].id, Some(1));
        assert_eq!(table.namespaces[0].members.len(), 1);
        assert_eq!(table.namespaces[0].members[0].name, "Bar");
        assert_eq!(table.namespaces[0].members[0].iname, "IBar");
        assert_eq!(table.namespaces[0].members[0].id, Some(1));
        assert_eq!(table.namespaces[1].name.as_deref(), Some("Baz"));
        assert_eq!(table.namespaces[1].id, Some(2));
        assert_eq!(table.namespaces[1].members[0].name, "Qux");
    }

    #[test]
    fn test_id_keyed_tables_sort_by_id() {
        let fs = files(&[
            "package High; //$9\nmessage B //$2 { }\nmessage A //$1 { }\n",
            "package Low; //$3\nmessage C //$1 { }\n",
        ]);
        let table = build_table(&fs, GenMode::PackageCmd).unwrap();
        assert_eq!(table.namespaces[0].name.as_deref(), Some("Low"));
        assert_eq!(table.namespaces[1].name.as_deref(), Some("High"));
        let ids: Vec<_> = table.namespaces[1].members.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![Some(1), Some(2)]);
    }

    #[test]
    fn test_duplicate_package_id_names_both_sites() {
        let fs = files(&[
            "package Foo; //$1\nmessage Bar //$1 { }\n",
            "package Foo; //$1\nmessage Qux //$1 { }\n",
        ]);
        let err = build_table(&fs, GenMode::PackageCmd).unwrap_err();
        let msg = err.to_string();
        assert!(matches!(err, ProtodefError::Collision(_)), "{:?}", err);
        assert!(msg.matches("Foo").count() >= 2, "{}", msg);
    }

    #[test]
    fn test_duplicate_message_id_names_both_messages() {
        let fs = files(&["package Foo; //$1\nmessage A //$5 { }\nmessage B //$5 { }\n"]);
        let err = build_table(&fs, GenMode::PackageCmd).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Foo.A") && msg.contains("Foo.B"), "{}", msg);
    }

    #[test]
    fn test_normal_duplicate_package_name() {
        let fs = files(&["package Foo;\nmessage A { }\n", "package Foo;\nmessage B { }\n"]);
        let err = build_table(&fs, GenMode::Normal).unwrap_err();
        assert!(matches!(err, ProtodefError::Collision(_)), "{:?}", err);
    }

    #[test]
    fn test_normal_bucket_collects_packageless_files_first() {
        let fs = files(&[
            "package Foo;\nmessage A { }\n",
            "message Loose { }\n",
            "message Stray { }\n",
        ]);
        let table = build_table(&fs, GenMode::Normal).unwrap();
        assert_eq!(table.namespaces.len(), 2);
        assert!(table.namespaces[0].name.is_none());
        let names: Vec<_> = table.namespaces[0]
            .members
            .iter()
            .map(|m| m.name.as_str())
            .collect();
        assert_eq!(names, vec!["Loose", "Stray"]);
    }

    #[test]
    fn test_enum_cmd_merges_same_tag_across_files() {
        let fs = files(&[
            "enum EMessageDef //$Test:1\n{\n\tA = 1;\n}\n",
            "enum EMessageDef //$Test:1\n{\n\tB = 2;\n}\n",
        ]);
        let table = build_table(&fs, GenMode::EnumCmd).unwrap();
        assert_eq!(table.namespaces.len(), 1);
        assert_eq!(table.namespaces[0].members.len(), 2);
    }

    #[test]
    fn test_enum_cmd_same_name_different_id_collides() {
        let fs = files(&[
            "enum EMessageDef //$Test:1\n{\n\tA = 1;\n}\n",
            "enum EMessageDef //$Test:2\n{\n\tB = 2;\n}\n",
        ]);
        let err = build_table(&fs, GenMode::EnumCmd).unwrap_err();
        assert!(matches!(err, ProtodefError::Collision(_)), "{:?}", err);
    }

    #[test]
    fn test_enum_cmd_auto_increment_collides_with_explicit_label() {
        let fs = files(&["enum EMessageDef //$Test:1\n{\n\tA = 1;\n\tB;\n\tC = 2;\n}\n"]);
        let err = build_table(&fs, GenMode::EnumCmd).unwrap_err();
        let msg = err.to_string();
        assert!(msg.contains("Test.B") && msg.contains("Test.C"), "{}", msg);
    }

    #[test]
    fn test_prevalidate_flags_missing_package() {
        let fs = files(&[
            "package Foo; //$1\n",
            "message NoPackageHere //$1 { }\n",
        ]);
        let err = prevalidate(&fs, GenMode::PackageCmd).unwrap_err();
        assert!(matches!(err, ProtodefError::MissingPackage(name) if name == "f1.proto"));
        assert!(prevalidate(&fs, GenMode::Normal).is_ok());
    }
}
