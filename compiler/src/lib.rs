//! protodef-compiler
//!
//! This crate implements:
//!  1) The `//$` sentinel scanner for annotated `.proto` files,
//!  2) The dispatch-table builder with collision checking,
//!  3) Composite routing-id formatting (`IdFormat`),
//!  4) Four table renderers (Normal, PackageCmd, PackageCmdFast,
//!     EnumCmd) over positional text templates,
//!  5) Error types (`ProtodefError`).

pub mod error;
pub mod types;
pub mod utils;
pub mod sentinel;
pub mod scanner;
pub mod table;
pub mod idfmt;
pub mod template;
pub mod render;

pub use error::ProtodefError;
pub use idfmt::IdFormat;
pub use render::{render, RenderContext};
pub use table::{build_table, prevalidate, NormalizedTable};
pub use types::{GenMode, SchemaFile};

/// Run the full Parse → Build → Render pipeline over a set of schema
/// files.
pub fn generate_table_source(
    files: &[SchemaFile],
    ctx: &RenderContext,
    template_text: &str,
) -> Result<String, ProtodefError> {
    prevalidate(files, ctx.mode)?;
    let table = build_table(files, ctx.mode)?;
    render(&table, ctx, template_text)
}
