use std::str::FromStr;

use serde::Serialize;

use crate::{error::ProtodefError, utils::quote};

/// The four table-generation strategies.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum GenMode {
    /// Dispatch by package name and message name.
    Normal,
    /// Dispatch by package id and message id.
    PackageCmd,
    /// Like `PackageCmd`, but keyed by one composite id enumerant.
    PackageCmdFast,
    /// Package name/id declared on an `enum EMessageDef` tag.
    EnumCmd,
}

impl GenMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            GenMode::Normal         => "Normal",
            GenMode::PackageCmd     => "PackageCmd",
            GenMode::PackageCmdFast => "PackageCmdFast",
            GenMode::EnumCmd        => "EnumCmd",
        }
    }

    /// Modes that require every input file to carry a `package` clause.
    pub fn requires_package(&self) -> bool {
        matches!(self, GenMode::PackageCmd | GenMode::PackageCmdFast)
    }

    /// Modes whose table is keyed by numeric ids; their namespaces and
    /// members render in ascending id order.
    pub fn id_keyed(&self) -> bool {
        matches!(self, GenMode::PackageCmd | GenMode::PackageCmdFast)
    }
}

impl FromStr for GenMode {
    type Err = ProtodefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Normal"         => Ok(GenMode::Normal),
            "PackageCmd"     => Ok(GenMode::PackageCmd),
            "PackageCmdFast" => Ok(GenMode::PackageCmdFast),
            "EnumCmd"        => Ok(GenMode::EnumCmd),
            other => Err(ProtodefError::Config(format!(
                "unknown GenMode {}",
                quote(other)
            ))),
        }
    }
}

/// One schema source file, split into lines once and never mutated.
#[derive(Debug, Clone)]
pub struct SchemaFile {
    pub name:  String,
    pub lines: Vec<String>,
}

impl SchemaFile {
    pub fn from_text(name: impl Into<String>, text: &str) -> Self {
        SchemaFile {
            name:  name.into(),
            lines: text.lines().map(str::to_owned).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PackageDecl {
    pub name:    String,
    pub id:      Option<u32>,
    pub comment: Option<String>,
    pub line:    usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MessageDecl {
    pub name:    String,
    pub id:      Option<u32>,
    pub comment: Option<String>,
    pub line:    usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EnumMemberDecl {
    pub name:    String,
    pub id:      u32,
    /// Generated message type backing this member; `None` renders as an
    /// empty-message placeholder.
    pub proto:   Option<String>,
    pub comment: Option<String>,
    pub line:    usize,
}

/// A declaration the scanner recognized, in file order. The EnumCmd
/// header tag maps to `Package` with both name and id set.
#[derive(Debug, Clone, PartialEq)]
pub enum Landmark {
    Package(PackageDecl),
    Message(MessageDecl),
    EnumMember(EnumMemberDecl),
}
