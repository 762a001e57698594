use std::fmt::Write as _;

use crate::app::ports::{DeleteDialect, EmitContext, InstalledFunction};
use crate::domain::{
    BridgeCascadeBlock, Caller, ChildCascadeBlock, DatabaseKind, DeleteFunction, LocalDeleteBlock,
    OwnerCheck, OwnerRef, ParentCascadeBlock, ReferencedCleanupBlock, SelfPartsBlock,
    SubtypeDispatchBlock, TableRef,
};

use super::{BodyNeeds, class_list, table_name};

/// PL/pgSQL: one set-returning function per table over `int[]` batches.
#[derive(Debug, Clone, Copy, Default)]
pub struct PostgresDialect;

const OWNER: i32 = Caller::FromOwner.code();
const FROM_PARENT: i32 = Caller::FromParent.code();
const FROM_SUBTYPE: i32 = Caller::FromSubtype.code();

impl PostgresDialect {
    fn function_name(ctx: &EmitContext, name: &str) -> String {
        if ctx.schema.is_empty() {
            name.to_string()
        } else {
            format!("{}.{}", ctx.schema.to_lowercase(), name)
        }
    }

    /// `source` (an int[] expression) reduced to ids no remaining owner
    /// still holds, one `NOT EXISTS` per owner.
    fn unowned(
        ctx: &EmitContext,
        target: &TableRef,
        key: &str,
        check: Option<&OwnerCheck>,
        source: &str,
    ) -> String {
        let Some(check) = check.filter(|c| !c.is_empty()) else {
            return source.to_string();
        };

        let conditions: Vec<String> = check
            .owners
            .iter()
            .map(|owner| match owner {
                OwnerRef::OwnColumn { column } => format!(
                    "NOT EXISTS (SELECT 1 FROM {} o WHERE o.{key} = c.id AND o.{column} IS NOT NULL)",
                    table_name(ctx, target)
                ),
                OwnerRef::Referencing { table, column } => format!(
                    "NOT EXISTS (SELECT 1 FROM {} o WHERE o.{column} = c.id)",
                    table_name(ctx, table)
                ),
            })
            .collect();

        format!(
            "ARRAY(\n      SELECT c.id\n        FROM unnest({source}) c(id)\n       WHERE {}\n    )",
            conditions.join("\n         AND ")
        )
    }

    fn call_with_candidates(ctx: &EmitContext, callee: &str, ids: &str) -> String {
        format!(
            "  IF array_length(candidate_ids, 1) > 0 THEN\n    PERFORM {}({ids}, {OWNER});\n  END IF;\n",
            Self::function_name(ctx, callee)
        )
    }
}

impl DeleteDialect for PostgresDialect {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::PostgreSql
    }

    fn max_identifier_len(&self) -> usize {
        63
    }

    fn emit_prologue(&self, ctx: &EmitContext, function: &DeleteFunction) -> String {
        let needs = BodyNeeds::of(function);
        let mut out = String::new();
        let _ = writeln!(
            out,
            "CREATE OR REPLACE FUNCTION {}(pid_array int[], caller INTEGER DEFAULT 0) RETURNS SETOF int AS",
            Self::function_name(ctx, &function.name)
        );
        out.push_str("$body$\n");
        let _ = writeln!(
            out,
            "-- deletes {} rows and everything they own",
            table_name(ctx, &function.table)
        );
        out.push_str("DECLARE\n");
        out.push_str("  deleted_ids int[] := '{}';\n");
        out.push_str("  deleted_child_ids int[] := '{}';\n");
        if needs.candidates {
            out.push_str("  candidate_ids int[];\n");
        }
        for slot in 0..needs.refs {
            let _ = writeln!(out, "  ref_ids_{slot} int[];");
        }
        if needs.dispatch {
            out.push_str("  dummy_ids int[];\n");
            out.push_str("  rec RECORD;\n");
        }
        out.push_str("BEGIN\n");
        out.push_str("  IF cardinality(pid_array) = 0 THEN\n    RETURN;\n  END IF;\n");
        out
    }

    fn emit_self_parts(
        &self,
        ctx: &EmitContext,
        function: &DeleteFunction,
        block: &SelfPartsBlock,
    ) -> String {
        let key = &function.key_column;
        let column = &block.column;
        let table = table_name(ctx, &function.table);
        let callee = Self::function_name(ctx, &block.callee.function);

        if block.detach {
            return format!(
                "\n  -- detach parts referencing their parent through {column}\n  \
                 WITH detached AS (\n    \
                 UPDATE {table} t\n       \
                 SET {column} = NULL\n      \
                 FROM unnest(pid_array) a(a_id)\n     \
                 WHERE t.{column} = a.a_id\n       \
                 AND t.{key} <> a.a_id\n    \
                 RETURNING t.{key} AS id\n  \
                 )\n  \
                 SELECT array_agg(id) INTO candidate_ids FROM detached;\n  \
                 IF array_length(candidate_ids, 1) > 0 THEN\n    \
                 SELECT array_agg(d) INTO candidate_ids\n      \
                 FROM {callee}(candidate_ids, {OWNER}) d;\n    \
                 deleted_child_ids := deleted_child_ids || COALESCE(candidate_ids, '{{}}');\n  \
                 END IF;\n"
            );
        }

        format!(
            "\n  -- delete parts referencing their parent through {column}\n  \
             SELECT array_agg(d) INTO candidate_ids\n    \
             FROM {callee}(ARRAY(\n      \
             SELECT t.{key}\n        \
             FROM {table} t, unnest(pid_array) a(a_id)\n       \
             WHERE t.{column} = a.a_id\n         \
             AND t.{key} <> a.a_id\n    \
             ), {OWNER}) d;\n  \
             deleted_child_ids := deleted_child_ids || COALESCE(candidate_ids, '{{}}');\n"
        )
    }

    fn emit_child_cascade(
        &self,
        ctx: &EmitContext,
        _function: &DeleteFunction,
        block: &ChildCascadeBlock,
    ) -> String {
        let child = table_name(ctx, &block.child);
        let key = &block.child_key;
        let column = &block.column;
        let callee = Self::function_name(ctx, &block.callee.function);

        if !block.detach && block.owner_check.is_none() {
            return format!(
                "\n  -- delete {child} rows owned through {column}\n  \
                 PERFORM {callee}(ARRAY(\n    \
                 SELECT c.{key}\n      \
                 FROM {child} c, unnest(pid_array) a(a_id)\n     \
                 WHERE c.{column} = a.a_id\n  \
                 ), {OWNER});\n"
            );
        }

        let mut out = String::new();
        if block.detach {
            let _ = write!(
                out,
                "\n  -- detach {child} rows linked through {column}\n  \
                 WITH detached AS (\n    \
                 UPDATE {child} c\n       \
                 SET {column} = NULL\n      \
                 FROM unnest(pid_array) a(a_id)\n     \
                 WHERE c.{column} = a.a_id\n    \
                 RETURNING c.{key} AS id\n  \
                 )\n  \
                 SELECT array_agg(id) INTO candidate_ids FROM detached;\n"
            );
        } else {
            let _ = write!(
                out,
                "\n  -- collect {child} rows linked through {column}\n  \
                 SELECT array_agg(c.{key}) INTO candidate_ids\n    \
                 FROM {child} c, unnest(pid_array) a(a_id)\n   \
                 WHERE c.{column} = a.a_id;\n"
            );
        }
        let ids = Self::unowned(ctx, &block.child, key, block.owner_check.as_ref(), "candidate_ids");
        out.push_str(&Self::call_with_candidates(ctx, &block.callee.function, &ids));
        out
    }

    fn emit_bridge_cascade(
        &self,
        ctx: &EmitContext,
        _function: &DeleteFunction,
        block: &BridgeCascadeBlock,
    ) -> String {
        let bridge = table_name(ctx, &block.bridge);
        let root = &block.root_column;
        let m = &block.m_column;

        let Some(callee) = &block.callee else {
            return format!(
                "\n  -- unlink {bridge}\n  \
                 DELETE FROM {bridge} t\n   \
                 USING unnest(pid_array) a(a_id)\n   \
                 WHERE t.{root} = a.a_id;\n"
            );
        };

        let mut out = format!(
            "\n  -- delete {bridge} links and the {} rows behind them\n  \
             WITH unlinked AS (\n    \
             DELETE FROM {bridge} t\n     \
             USING unnest(pid_array) a(a_id)\n     \
             WHERE t.{root} = a.a_id\n    \
             RETURNING t.{m} AS id\n  \
             )\n  \
             SELECT array_agg(DISTINCT id) INTO candidate_ids FROM unlinked;\n",
            table_name(ctx, &block.target)
        );
        let ids = Self::unowned(
            ctx,
            &block.target,
            &block.target_key,
            block.owner_check.as_ref(),
            "candidate_ids",
        );
        out.push_str(&Self::call_with_candidates(ctx, &callee.function, &ids));
        out
    }

    fn emit_subtype_dispatch(
        &self,
        ctx: &EmitContext,
        _function: &DeleteFunction,
        block: &SubtypeDispatchBlock,
    ) -> String {
        let mut out = String::from("\n  -- delete subtype rows\n");

        if let Some(disc) = block.discriminator.as_ref().filter(|_| !block.cases.is_empty()) {
            let _ = write!(
                out,
                "  IF caller <> {FROM_SUBTYPE} THEN\n    \
                 FOR rec IN\n      \
                 SELECT r.{key} AS object_id, r.{column} AS class_id\n        \
                 FROM {table} r, unnest(pid_array) a(a_id)\n       \
                 WHERE r.{key} = a.a_id\n    \
                 LOOP\n      \
                 CASE\n",
                key = disc.key_column,
                column = disc.column,
                table = table_name(ctx, &disc.table)
            );
            for case in &block.cases {
                let _ = write!(
                    out,
                    "        WHEN rec.class_id IN ({}) THEN\n          \
                     dummy_ids := ARRAY(SELECT {}(ARRAY[rec.object_id], {FROM_PARENT}));\n",
                    class_list(&case.objectclass_ids),
                    Self::function_name(ctx, &case.callee.function)
                );
            }
            out.push_str(
                "        ELSE\n          \
                 dummy_ids := '{}';\n      \
                 END CASE;\n      \
                 IF rec.object_id = ANY(dummy_ids) THEN\n        \
                 deleted_ids := deleted_ids || rec.object_id;\n      \
                 END IF;\n    \
                 END LOOP;\n  \
                 END IF;\n",
            );
        }

        // Untyped extension tables hold rows for every id, whoever called.
        for hook in &block.hooks {
            let _ = writeln!(
                out,
                "  PERFORM {}(pid_array, {FROM_PARENT});",
                Self::function_name(ctx, &hook.function)
            );
        }
        out
    }

    fn emit_local_delete(
        &self,
        ctx: &EmitContext,
        function: &DeleteFunction,
        block: &LocalDeleteBlock,
    ) -> String {
        let table = table_name(ctx, &function.table);
        let key = &function.key_column;

        let mut returning = format!("t.{key} AS id");
        let mut selects = vec!["deleted_ids || COALESCE(array_agg(id), '{}')".to_string()];
        let mut targets = vec!["deleted_ids".to_string()];
        for (slot, column) in block.captured.iter().enumerate() {
            let _ = write!(returning, ", t.{column} AS ref_{slot}");
            selects.push(format!(
                "array_agg(DISTINCT ref_{slot}) FILTER (WHERE ref_{slot} IS NOT NULL)"
            ));
            targets.push(format!("ref_ids_{slot}"));
        }

        format!(
            "\n  -- delete {table} rows\n  \
             WITH deleted AS (\n    \
             DELETE FROM {table} t\n     \
             USING unnest(pid_array) a(a_id)\n     \
             WHERE t.{key} = a.a_id\n    \
             RETURNING {returning}\n  \
             )\n  \
             SELECT {}\n    \
             INTO {}\n    \
             FROM deleted;\n",
            selects.join(",\n         "),
            targets.join(", ")
        )
    }

    fn emit_referenced_cleanup(
        &self,
        ctx: &EmitContext,
        _function: &DeleteFunction,
        block: &ReferencedCleanupBlock,
    ) -> String {
        let source = format!("ref_ids_{}", block.slot);
        let ids = Self::unowned(
            ctx,
            &block.target,
            &block.target_key,
            block.owner_check.as_ref(),
            &source,
        );
        format!(
            "\n  -- delete {} rows referenced through {}\n  \
             IF array_length({source}, 1) > 0 THEN\n    \
             PERFORM {}({ids}, {OWNER});\n  \
             END IF;\n",
            table_name(ctx, &block.target),
            block.column,
            Self::function_name(ctx, &block.callee.function)
        )
    }

    fn emit_parent_cascade(
        &self,
        ctx: &EmitContext,
        _function: &DeleteFunction,
        block: &ParentCascadeBlock,
    ) -> String {
        format!(
            "\n  -- delete the {} part of the deleted rows\n  \
             IF caller <> {FROM_PARENT} AND array_length(deleted_ids, 1) > 0 THEN\n    \
             PERFORM {}(deleted_ids, {FROM_SUBTYPE});\n  \
             END IF;\n",
            table_name(ctx, &block.callee.table),
            Self::function_name(ctx, &block.callee.function)
        )
    }

    fn emit_epilogue(&self, _ctx: &EmitContext, _function: &DeleteFunction) -> String {
        "\n  RETURN QUERY\n    SELECT DISTINCT unnest(deleted_ids || deleted_child_ids);\nEND;\n$body$\nLANGUAGE plpgsql STRICT;\n"
            .to_string()
    }

    fn emit_single_id_wrapper(&self, ctx: &EmitContext, function: &DeleteFunction) -> String {
        let name = Self::function_name(ctx, &function.name);
        format!(
            "CREATE OR REPLACE FUNCTION {name}(pid int, caller INTEGER DEFAULT 0) RETURNS int AS\n\
             $body$\n\
             DECLARE\n  \
             deleted_id int;\n\
             BEGIN\n  \
             SELECT d INTO deleted_id\n    \
             FROM {name}(ARRAY[pid], caller) d\n   \
             WHERE d = pid;\n  \
             RETURN deleted_id;\n\
             END;\n\
             $body$\n\
             LANGUAGE plpgsql STRICT;\n"
        )
    }

    fn emit_script(&self, ctx: &EmitContext, functions: &[&DeleteFunction]) -> String {
        let mut parts = Vec::new();
        for function in functions {
            parts.push(self.emit_function(ctx, function));
            if ctx.single_id_wrappers {
                parts.push(self.emit_single_id_wrapper(ctx, function));
            }
        }
        parts.join("\n")
    }

    fn drop_statement(&self, _ctx: &EmitContext, installed: &InstalledFunction) -> String {
        format!("DROP FUNCTION IF EXISTS {};", installed.signature())
    }
}
