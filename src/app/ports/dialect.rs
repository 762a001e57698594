use crate::domain::{
    Block, BridgeCascadeBlock, ChildCascadeBlock, DatabaseKind, DeleteFunction, LocalDeleteBlock,
    ParentCascadeBlock, ReferencedCleanupBlock, SelfPartsBlock, SubtypeDispatchBlock,
};

use super::installer::InstalledFunction;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("no delete script backend for {0}")]
pub struct DialectUnsupported(pub DatabaseKind);

/// Settings shared by every function of one generated script.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmitContext {
    pub schema: String,
    /// Package wrapping the functions, for dialects that use one.
    pub package: String,
    pub single_id_wrappers: bool,
}

impl EmitContext {
    pub fn new(schema: impl Into<String>) -> Self {
        Self {
            schema: schema.into(),
            package: "citydb_delete".to_string(),
            single_id_wrappers: true,
        }
    }
}

/// Renders abstract delete blocks into one procedural SQL dialect.
///
/// `emit_function` fixes how blocks are sequenced; implementations only
/// decide the syntax of each block.
pub trait DeleteDialect: Send + Sync {
    fn kind(&self) -> DatabaseKind;

    fn max_identifier_len(&self) -> usize;

    fn emit_prologue(&self, ctx: &EmitContext, function: &DeleteFunction) -> String;

    fn emit_self_parts(
        &self,
        ctx: &EmitContext,
        function: &DeleteFunction,
        block: &SelfPartsBlock,
    ) -> String;

    fn emit_child_cascade(
        &self,
        ctx: &EmitContext,
        function: &DeleteFunction,
        block: &ChildCascadeBlock,
    ) -> String;

    fn emit_bridge_cascade(
        &self,
        ctx: &EmitContext,
        function: &DeleteFunction,
        block: &BridgeCascadeBlock,
    ) -> String;

    fn emit_subtype_dispatch(
        &self,
        ctx: &EmitContext,
        function: &DeleteFunction,
        block: &SubtypeDispatchBlock,
    ) -> String;

    fn emit_local_delete(
        &self,
        ctx: &EmitContext,
        function: &DeleteFunction,
        block: &LocalDeleteBlock,
    ) -> String;

    fn emit_referenced_cleanup(
        &self,
        ctx: &EmitContext,
        function: &DeleteFunction,
        block: &ReferencedCleanupBlock,
    ) -> String;

    fn emit_parent_cascade(
        &self,
        ctx: &EmitContext,
        function: &DeleteFunction,
        block: &ParentCascadeBlock,
    ) -> String;

    fn emit_epilogue(&self, ctx: &EmitContext, function: &DeleteFunction) -> String;

    /// Single-id variant delegating to the batch function.
    fn emit_single_id_wrapper(&self, ctx: &EmitContext, function: &DeleteFunction) -> String;

    /// Wraps rendered functions into an installable script.
    fn emit_script(&self, ctx: &EmitContext, functions: &[&DeleteFunction]) -> String;

    fn drop_statement(&self, ctx: &EmitContext, installed: &InstalledFunction) -> String;

    fn emit_function(&self, ctx: &EmitContext, function: &DeleteFunction) -> String {
        let mut out = self.emit_prologue(ctx, function);
        for block in &function.blocks {
            let text = match block {
                Block::SelfParts(b) => self.emit_self_parts(ctx, function, b),
                Block::ChildCascade(b) => self.emit_child_cascade(ctx, function, b),
                Block::BridgeCascade(b) => self.emit_bridge_cascade(ctx, function, b),
                Block::SubtypeDispatch(b) => self.emit_subtype_dispatch(ctx, function, b),
                Block::LocalDelete(b) => self.emit_local_delete(ctx, function, b),
                Block::ReferencedCleanup(b) => self.emit_referenced_cleanup(ctx, function, b),
                Block::ParentCascade(b) => self.emit_parent_cascade(ctx, function, b),
            };
            out.push_str(&text);
        }
        out.push_str(&self.emit_epilogue(ctx, function));
        out
    }
}
