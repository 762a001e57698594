use std::fmt::Write as _;

use crate::app::ports::{DeleteDialect, EmitContext, InstalledFunction};
use crate::domain::{
    BridgeCascadeBlock, Caller, ChildCascadeBlock, DatabaseKind, DeleteFunction, LocalDeleteBlock,
    OwnerCheck, OwnerRef, ParentCascadeBlock, ReferencedCleanupBlock, SelfPartsBlock,
    SubtypeDispatchBlock, TableRef,
};

use super::{BodyNeeds, class_list, table_name};

/// PL/SQL: all functions live in one package and exchange `ID_ARRAY`
/// nested tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct OracleDialect;

const ID_ARRAY: &str = "ID_ARRAY";
const OWNER: i32 = Caller::FromOwner.code();
const FROM_PARENT: i32 = Caller::FromParent.code();
const FROM_SUBTYPE: i32 = Caller::FromSubtype.code();

impl OracleDialect {
    fn batch_signature(name: &str) -> String {
        format!("FUNCTION {name}(pid_array {ID_ARRAY}, caller int := 0) RETURN {ID_ARRAY}")
    }

    fn single_signature(name: &str) -> String {
        format!("FUNCTION {name}(pid NUMBER, caller int := 0) RETURN NUMBER")
    }

    /// Calls `callee` with `candidate_ids`, filtered through the owner
    /// check (one `NOT EXISTS` per owner) into `target_ids` when one is
    /// present.
    fn call_candidates(
        ctx: &EmitContext,
        callee: &str,
        target: &TableRef,
        key: &str,
        check: Option<&OwnerCheck>,
    ) -> String {
        let mut out = String::from("    IF candidate_ids IS NOT EMPTY THEN\n");

        let Some(check) = check.filter(|c| !c.is_empty()) else {
            let _ = writeln!(out, "      dummy_ids := {callee}(candidate_ids, {OWNER});");
            out.push_str("    END IF;\n");
            return out;
        };

        let conditions: Vec<String> = check
            .owners
            .iter()
            .map(|owner| match owner {
                OwnerRef::OwnColumn { column } => format!(
                    "NOT EXISTS (SELECT 1 FROM {} o WHERE o.{key} = c.COLUMN_VALUE AND o.{column} IS NOT NULL)",
                    table_name(ctx, target)
                ),
                OwnerRef::Referencing { table, column } => format!(
                    "NOT EXISTS (SELECT 1 FROM {} o WHERE o.{column} = c.COLUMN_VALUE)",
                    table_name(ctx, table)
                ),
            })
            .collect();

        let _ = write!(
            out,
            "      SELECT c.COLUMN_VALUE BULK COLLECT INTO target_ids\n        \
             FROM TABLE(candidate_ids) c\n       \
             WHERE {};\n      \
             IF target_ids IS NOT EMPTY THEN\n        \
             dummy_ids := {callee}(target_ids, {OWNER});\n      \
             END IF;\n    \
             END IF;\n",
            conditions.join("\n         AND ")
        );
        out
    }
}

impl DeleteDialect for OracleDialect {
    fn kind(&self) -> DatabaseKind {
        DatabaseKind::Oracle
    }

    fn max_identifier_len(&self) -> usize {
        30
    }

    fn emit_prologue(&self, ctx: &EmitContext, function: &DeleteFunction) -> String {
        let needs = BodyNeeds::of(function);
        let mut out = String::new();
        let _ = writeln!(out, "  {}", Self::batch_signature(&function.name));
        out.push_str("  IS\n");
        let _ = writeln!(
            out,
            "    -- deletes {} rows and everything they own",
            table_name(ctx, &function.table)
        );
        for var in ["deleted_ids", "deleted_child_ids", "candidate_ids", "target_ids", "dummy_ids"] {
            let _ = writeln!(out, "    {var} {ID_ARRAY} := {ID_ARRAY}();");
        }
        for slot in 0..needs.refs {
            let _ = writeln!(out, "    ref_ids_{slot} {ID_ARRAY} := {ID_ARRAY}();");
        }
        out.push_str("  BEGIN\n");
        out.push_str("    IF pid_array IS EMPTY THEN\n      RETURN deleted_ids;\n    END IF;\n");
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

        let collect = if block.detach {
            format!(
                "\n    -- detach parts referencing their parent through {column}\n    \
                 UPDATE {table} t\n       \
                 SET t.{column} = NULL\n     \
                 WHERE t.{column} IN (SELECT a.COLUMN_VALUE FROM TABLE(pid_array) a)\n       \
                 AND t.{key} <> t.{column}\n    \
                 RETURNING t.{key} BULK COLLECT INTO candidate_ids;\n"
            )
        } else {
            format!(
                "\n    -- delete parts referencing their parent through {column}\n    \
                 SELECT t.{key} BULK COLLECT INTO candidate_ids\n      \
                 FROM {table} t, TABLE(pid_array) a\n     \
                 WHERE t.{column} = a.COLUMN_VALUE\n       \
                 AND t.{key} <> a.COLUMN_VALUE;\n"
            )
        };
        format!(
            "{collect}    \
             IF candidate_ids IS NOT EMPTY THEN\n      \
             deleted_child_ids := deleted_child_ids MULTISET UNION DISTINCT {}(candidate_ids, {OWNER});\n    \
             END IF;\n",
            block.callee.function
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

        let mut out = if block.detach {
            format!(
                "\n    -- detach {child} rows linked through {column}\n    \
                 UPDATE {child} c\n       \
                 SET c.{column} = NULL\n     \
                 WHERE c.{column} IN (SELECT a.COLUMN_VALUE FROM TABLE(pid_array) a)\n    \
                 RETURNING c.{key} BULK COLLECT INTO candidate_ids;\n"
            )
        } else {
            format!(
                "\n    -- delete {child} rows owned through {column}\n    \
                 SELECT c.{key} BULK COLLECT INTO candidate_ids\n      \
                 FROM {child} c, TABLE(pid_array) a\n     \
                 WHERE c.{column} = a.COLUMN_VALUE;\n"
            )
        };
        out.push_str(&Self::call_candidates(
            ctx,
            &block.callee.function,
            &block.child,
            key,
            block.owner_check.as_ref(),
        ));
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

        let Some(callee) = &block.callee else {
            return format!(
                "\n    -- unlink {bridge}\n    \
                 DELETE FROM {bridge} t\n     \
                 WHERE t.{root} IN (SELECT a.COLUMN_VALUE FROM TABLE(pid_array) a);\n"
            );
        };

        let mut out = format!(
            "\n    -- delete {bridge} links and the {} rows behind them\n    \
             DELETE FROM {bridge} t\n     \
             WHERE t.{root} IN (SELECT a.COLUMN_VALUE FROM TABLE(pid_array) a)\n    \
             RETURNING t.{} BULK COLLECT INTO candidate_ids;\n    \
             candidate_ids := SET(candidate_ids);\n",
            table_name(ctx, &block.target),
            block.m_column
        );
        out.push_str(&Self::call_candidates(
            ctx,
            &callee.function,
            &block.target,
            &block.target_key,
            block.owner_check.as_ref(),
        ));
        out
    }

    fn emit_subtype_dispatch(
        &self,
        ctx: &EmitContext,
        _function: &DeleteFunction,
        block: &SubtypeDispatchBlock,
    ) -> String {
        let mut out = String::from("\n    -- delete subtype rows\n");

        if let Some(disc) = block.discriminator.as_ref().filter(|_| !block.cases.is_empty()) {
            let _ = write!(
                out,
                "    IF caller <> {FROM_SUBTYPE} THEN\n      \
                 FOR rec IN (\n        \
                 SELECT r.{key} AS object_id, r.{column} AS class_id\n          \
                 FROM {table} r, TABLE(pid_array) a\n         \
                 WHERE r.{key} = a.COLUMN_VALUE\n      \
                 ) LOOP\n        \
                 dummy_ids := {ID_ARRAY}();\n",
                key = disc.key_column,
                column = disc.column,
                table = table_name(ctx, &disc.table)
            );
            for (i, case) in block.cases.iter().enumerate() {
                let keyword = if i == 0 { "IF" } else { "ELSIF" };
                let _ = write!(
                    out,
                    "        {keyword} rec.class_id IN ({}) THEN\n          \
                     dummy_ids := {}({ID_ARRAY}(rec.object_id), {FROM_PARENT});\n",
                    class_list(&case.objectclass_ids),
                    case.callee.function
                );
            }
            let _ = write!(
                out,
                "        END IF;\n        \
                 IF rec.object_id MEMBER OF dummy_ids THEN\n          \
                 deleted_ids := deleted_ids MULTISET UNION DISTINCT {ID_ARRAY}(rec.object_id);\n        \
                 END IF;\n      \
                 END LOOP;\n    \
                 END IF;\n"
            );
        }

        for hook in &block.hooks {
            let _ = writeln!(out, "    dummy_ids := {}(pid_array, {FROM_PARENT});", hook.function);
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

        let mut columns = vec![format!("t.{key}")];
        let mut targets = vec!["target_ids".to_string()];
        for (slot, column) in block.captured.iter().enumerate() {
            columns.push(format!("t.{column}"));
            targets.push(format!("ref_ids_{slot}"));
        }

        format!(
            "\n    -- delete {table} rows\n    \
             DELETE FROM {table} t\n     \
             WHERE t.{key} IN (SELECT a.COLUMN_VALUE FROM TABLE(pid_array) a)\n    \
             RETURNING {}\n    \
             BULK COLLECT INTO {};\n    \
             deleted_ids := deleted_ids MULTISET UNION DISTINCT target_ids;\n",
            columns.join(", "),
            targets.join(", ")
        )
    }

    fn emit_referenced_cleanup(
        &self,
        ctx: &EmitContext,
        _function: &DeleteFunction,
        block: &ReferencedCleanupBlock,
    ) -> String {
        let mut out = format!(
            "\n    -- delete {} rows referenced through {}\n    \
             SELECT DISTINCT r.COLUMN_VALUE BULK COLLECT INTO candidate_ids\n      \
             FROM TABLE(ref_ids_{}) r\n     \
             WHERE r.COLUMN_VALUE IS NOT NULL;\n",
            table_name(ctx, &block.target),
            block.column,
            block.slot
        );
        out.push_str(&Self::call_candidates(
            ctx,
            &block.callee.function,
            &block.target,
            &block.target_key,
            block.owner_check.as_ref(),
        ));
        out
    }

    fn emit_parent_cascade(
        &self,
        ctx: &EmitContext,
        _function: &DeleteFunction,
        block: &ParentCascadeBlock,
    ) -> String {
        format!(
            "\n    -- delete the {} part of the deleted rows\n    \
             IF caller <> {FROM_PARENT} AND deleted_ids IS NOT EMPTY THEN\n      \
             dummy_ids := {}(deleted_ids, {FROM_SUBTYPE});\n    \
             END IF;\n",
            table_name(ctx, &block.callee.table),
            block.callee.function
        )
    }

    fn emit_epilogue(&self, _ctx: &EmitContext, _function: &DeleteFunction) -> String {
        "\n    RETURN deleted_ids MULTISET UNION DISTINCT deleted_child_ids;\n  END;\n".to_string()
    }

    fn emit_single_id_wrapper(&self, _ctx: &EmitContext, function: &DeleteFunction) -> String {
        format!(
            "  {}\n  \
             IS\n    \
             deleted_ids {ID_ARRAY} := {ID_ARRAY}();\n  \
             BEGIN\n    \
             deleted_ids := {}({ID_ARRAY}(pid), caller);\n    \
             IF pid MEMBER OF deleted_ids THEN\n      \
             RETURN pid;\n    \
             END IF;\n    \
             RETURN NULL;\n  \
             END;\n",
            Self::single_signature(&function.name),
            function.name
        )
    }

    fn emit_script(&self, ctx: &EmitContext, functions: &[&DeleteFunction]) -> String {
        let package = &ctx.package;
        let mut out = format!("CREATE OR REPLACE TYPE {ID_ARRAY} IS TABLE OF NUMBER;\n/\n\n");

        let _ = writeln!(out, "CREATE OR REPLACE PACKAGE {package}\nAS");
        for function in functions {
            let _ = writeln!(out, "  {};", Self::batch_signature(&function.name));
            if ctx.single_id_wrappers {
                let _ = writeln!(out, "  {};", Self::single_signature(&function.name));
            }
        }
        let _ = writeln!(out, "END {package};\n/\n");

        let _ = writeln!(out, "CREATE OR REPLACE PACKAGE BODY {package}\nAS");
        let mut bodies = Vec::new();
        for function in functions {
            bodies.push(self.emit_function(ctx, function));
            if ctx.single_id_wrappers {
                bodies.push(self.emit_single_id_wrapper(ctx, function));
            }
        }
        out.push_str(&bodies.join("\n"));
        let _ = writeln!(out, "END {package};\n/");
        out
    }

    /// Packaged functions cannot be dropped one by one.
    fn drop_statement(&self, ctx: &EmitContext, installed: &InstalledFunction) -> String {
        format!("DROP PACKAGE {}.{};", installed.schema, ctx.package)
    }
}
