use std::fmt::Write as _;

use crate::domain::DeleteFunction;
use crate::ports::{DeleteDialect, EmitContext};

/// Header comment followed by the dialect's rendering of every function.
pub fn assemble(
    dialect: &dyn DeleteDialect,
    ctx: &EmitContext,
    functions: &[&DeleteFunction],
    notes: &[String],
) -> String {
    let mut out = header(dialect, ctx, functions, notes);
    out.push_str(&dialect.emit_script(ctx, functions));
    out
}

pub fn header(
    dialect: &dyn DeleteDialect,
    ctx: &EmitContext,
    functions: &[&DeleteFunction],
    notes: &[String],
) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "-- Delete functions for schema {} ({})",
        ctx.schema,
        dialect.kind().display_name()
    );
    let _ = writeln!(out, "--");
    let _ = writeln!(out, "-- Functions ({}):", functions.len());
    for function in functions {
        let _ = writeln!(out, "--   {} ({})", function.name, function.table);
    }

    if !notes.is_empty() {
        let _ = writeln!(out, "--");
        let _ = writeln!(out, "-- Review:");
        for note in notes {
            let _ = writeln!(out, "--   {note}");
        }
    }
    out.push('\n');
    out
}
