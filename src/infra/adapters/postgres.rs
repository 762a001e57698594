use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{debug, info, instrument};

use crate::app::ports::{
    FunctionInstaller, InstallError, InstalledFunction, IntrospectionError, SchemaSource,
};
use crate::domain::{
    Column, FkAction, ForeignKey, OwnershipRecord, RelationKind, SchemaGraph, Table,
};
use crate::utils::{like_prefix, quote_ident, quote_literal};

const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Failure of a single `psql` run, before it is mapped to a port error.
#[derive(Debug)]
enum PsqlFailure {
    Spawn(String),
    Exit(String),
    Io(String),
    Timeout,
}

impl From<PsqlFailure> for IntrospectionError {
    fn from(failure: PsqlFailure) -> Self {
        match failure {
            PsqlFailure::Spawn(e) => Self::CommandNotFound(e),
            PsqlFailure::Exit(e) => Self::QueryFailed(e),
            PsqlFailure::Io(e) => Self::Io(e),
            PsqlFailure::Timeout => Self::Timeout,
        }
    }
}

impl From<PsqlFailure> for InstallError {
    fn from(failure: PsqlFailure) -> Self {
        match failure {
            PsqlFailure::Spawn(e) => Self::CommandNotFound(e),
            PsqlFailure::Exit(e) | PsqlFailure::Io(e) => Self::Failed(e),
            PsqlFailure::Timeout => Self::Timeout,
        }
    }
}

/// Reads the catalog and installs scripts through the `psql` client.
pub struct PostgresAdapter {
    dsn: String,
    timeout_secs: u64,
}

impl PostgresAdapter {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self {
            dsn: dsn.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    async fn run_psql(&self, args: &[&str], input: Option<&str>) -> Result<String, PsqlFailure> {
        let mut child = Command::new("psql")
            .arg(&self.dsn)
            .arg("-X") // Ignore .psqlrc to avoid unexpected output
            .arg("-v")
            .arg("ON_ERROR_STOP=1") // Exit with non-zero on SQL errors
            .args(args)
            .stdin(if input.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PsqlFailure::Spawn(e.to_string()))?;

        let mut stdin_handle = child.stdin.take();
        let mut stdout_handle = child.stdout.take();
        let mut stderr_handle = child.stderr.take();

        // Feed stdin while draining both pipes to avoid a buffer deadlock
        let result = timeout(Duration::from_secs(self.timeout_secs), async {
            let (stdin_result, stdout_result, stderr_result) = tokio::join!(
                async {
                    if let (Some(mut pipe), Some(text)) = (stdin_handle.take(), input) {
                        pipe.write_all(text.as_bytes()).await?;
                        pipe.shutdown().await?;
                    }
                    Ok::<_, std::io::Error>(())
                },
                async {
                    let mut buf = Vec::new();
                    if let Some(ref mut out) = stdout_handle {
                        out.read_to_end(&mut buf).await?;
                    }
                    Ok::<_, std::io::Error>(String::from_utf8_lossy(&buf).into_owned())
                },
                async {
                    let mut buf = Vec::new();
                    if let Some(ref mut err) = stderr_handle {
                        err.read_to_end(&mut buf).await?;
                    }
                    Ok::<_, std::io::Error>(String::from_utf8_lossy(&buf).into_owned())
                }
            );

            stdin_result?;
            let stdout = stdout_result?;
            let stderr = stderr_result?;
            let status = child.wait().await?;

            Ok::<_, std::io::Error>((status, stdout, stderr))
        })
        .await
        .map_err(|_| PsqlFailure::Timeout)?
        .map_err(|e| PsqlFailure::Io(e.to_string()))?;

        let (status, stdout, stderr) = result;

        if !status.success() {
            return Err(PsqlFailure::Exit(stderr.trim().to_string()));
        }

        Ok(stdout)
    }

    #[instrument(skip(self, query), level = "debug")]
    async fn execute_query(&self, label: &str, query: &str) -> Result<String, IntrospectionError> {
        let output = self.run_psql(&["-t", "-A", "-c", query], None).await?;
        debug!(bytes = output.len(), "catalog query finished");
        Ok(output)
    }

    fn tables_query(schema: &str) -> String {
        format!(
            r#"
            SELECT json_agg(row_to_json(t) ORDER BY t.name)
            FROM (
                SELECT
                    n.nspname as schema,
                    c.relname as name,
                    COALESCE((
                        SELECT json_agg(json_build_object(
                            'name', a.attname,
                            'data_type', format_type(a.atttypid, a.atttypmod),
                            'nullable', NOT a.attnotnull
                        ) ORDER BY a.attnum)
                        FROM pg_attribute a
                        WHERE a.attrelid = c.oid
                          AND a.attnum > 0
                          AND NOT a.attisdropped
                    ), '[]'::json) as columns,
                    COALESCE((
                        SELECT array_agg(a.attname ORDER BY array_position(i.indkey::int2[], a.attnum))
                        FROM pg_index i
                        JOIN pg_attribute a ON a.attrelid = i.indrelid AND a.attnum = ANY(i.indkey)
                        WHERE i.indrelid = c.oid AND i.indisprimary
                    ), '{{}}') as primary_key
                FROM pg_class c
                JOIN pg_namespace n ON n.oid = c.relnamespace
                WHERE c.relkind IN ('r', 'p')
                  AND n.nspname = {}
            ) t
            "#,
            quote_literal(schema)
        )
    }

    fn foreign_keys_query(schema: &str) -> String {
        format!(
            r#"
            SELECT json_agg(row_to_json(fk) ORDER BY fk.from_table, fk.name)
            FROM (
                SELECT
                    con.conname as name,
                    n1.nspname as from_schema,
                    c1.relname as from_table,
                    array_agg(a1.attname ORDER BY array_position(con.conkey, a1.attnum)) as from_columns,
                    n2.nspname as to_schema,
                    c2.relname as to_table,
                    array_agg(a2.attname ORDER BY array_position(con.confkey, a2.attnum)) as to_columns,
                    con.confdeltype as on_delete
                FROM pg_constraint con
                JOIN pg_class c1 ON c1.oid = con.conrelid
                JOIN pg_namespace n1 ON n1.oid = c1.relnamespace
                JOIN pg_class c2 ON c2.oid = con.confrelid
                JOIN pg_namespace n2 ON n2.oid = c2.relnamespace
                JOIN pg_attribute a1 ON a1.attrelid = c1.oid AND a1.attnum = ANY(con.conkey)
                JOIN pg_attribute a2 ON a2.attrelid = c2.oid AND a2.attnum = ANY(con.confkey)
                WHERE con.contype = 'f'
                  AND n1.nspname = {}
                GROUP BY con.conname, n1.nspname, c1.relname, n2.nspname, c2.relname, con.confdeltype
            ) fk
            "#,
            quote_literal(schema)
        )
    }

    fn relation_exists_query(schema: &str, table: &str) -> String {
        format!(
            "SELECT to_regclass({}) IS NOT NULL",
            quote_literal(&format!("{schema}.{table}"))
        )
    }

    fn objectclass_query(schema: &str) -> String {
        let schema = quote_ident(schema);
        format!(
            r#"
            SELECT json_agg(json_build_object('id', oc.id, 'table_name', lower(oc.tablename)) ORDER BY oc.id)
            FROM {schema}.objectclass oc
            WHERE oc.tablename IS NOT NULL
            "#
        )
    }

    fn aggregation_info_query(schema: &str) -> String {
        let schema = quote_ident(schema);
        format!(
            r#"
            SELECT json_agg(json_build_object(
                'child', lower(c.tablename),
                'parent', lower(p.tablename),
                'link', lower(ai.join_table_or_column_name),
                'composite', ai.is_composite = 1
            ))
            FROM {schema}.aggregation_info ai
            JOIN {schema}.objectclass c ON c.id = ai.child_id
            JOIN {schema}.objectclass p ON p.id = ai.parent_id
            WHERE c.tablename IS NOT NULL AND p.tablename IS NOT NULL
            "#
        )
    }

    fn installed_functions_query(schema: &str, prefix: &str) -> String {
        format!(
            r#"
            SELECT json_agg(row_to_json(f) ORDER BY f.name, f.arguments)
            FROM (
                SELECT
                    n.nspname as schema,
                    p.proname as name,
                    pg_get_function_identity_arguments(p.oid) as arguments
                FROM pg_proc p
                JOIN pg_namespace n ON n.oid = p.pronamespace
                WHERE n.nspname = {}
                  AND p.proname LIKE {}
            ) f
            "#,
            quote_literal(schema),
            like_prefix(prefix)
        )
    }

    fn is_empty_json(json: &str) -> bool {
        let trimmed = json.trim();
        trimmed.is_empty() || trimmed == "null"
    }

    fn parse_tables(json: &str) -> Result<Vec<Table>, IntrospectionError> {
        if Self::is_empty_json(json) {
            return Ok(Vec::new());
        }

        #[derive(serde::Deserialize)]
        struct RawColumn {
            name: String,
            data_type: String,
            nullable: bool,
        }

        #[derive(serde::Deserialize)]
        struct RawTable {
            schema: String,
            name: String,
            columns: Vec<RawColumn>,
            primary_key: Vec<String>,
        }

        let raw: Vec<RawTable> = serde_json::from_str(json.trim())
            .map_err(|e| IntrospectionError::InvalidJson(e.to_string()))?;

        Ok(raw
            .into_iter()
            .map(|t| Table {
                schema: t.schema,
                name: t.name,
                columns: t
                    .columns
                    .into_iter()
                    .map(|c| Column::new(c.name, c.data_type, c.nullable))
                    .collect(),
                primary_key: t.primary_key,
                foreign_keys: Vec::new(),
                objectclass_ids: Vec::new(),
            })
            .collect())
    }

    fn parse_foreign_keys(json: &str) -> Result<Vec<ForeignKey>, IntrospectionError> {
        if Self::is_empty_json(json) {
            return Ok(Vec::new());
        }

        #[derive(serde::Deserialize)]
        struct RawForeignKey {
            name: String,
            from_schema: String,
            from_table: String,
            from_columns: Vec<String>,
            to_schema: String,
            to_table: String,
            to_columns: Vec<String>,
            on_delete: String,
        }

        fn parse_fk_action(s: &str) -> FkAction {
            match s {
                "r" => FkAction::Restrict,
                "c" => FkAction::Cascade,
                "n" => FkAction::SetNull,
                "d" => FkAction::SetDefault,
                _ => FkAction::NoAction,
            }
        }

        let raw: Vec<RawForeignKey> = serde_json::from_str(json.trim())
            .map_err(|e| IntrospectionError::InvalidJson(e.to_string()))?;

        Ok(raw
            .into_iter()
            .map(|fk| ForeignKey {
                name: fk.name,
                from_schema: fk.from_schema,
                from_table: fk.from_table,
                from_columns: fk.from_columns,
                to_schema: fk.to_schema,
                to_table: fk.to_table,
                to_columns: fk.to_columns,
                on_delete: parse_fk_action(&fk.on_delete),
            })
            .collect())
    }

    fn parse_objectclasses(json: &str) -> Result<HashMap<String, Vec<i32>>, IntrospectionError> {
        if Self::is_empty_json(json) {
            return Ok(HashMap::new());
        }

        #[derive(serde::Deserialize)]
        struct RawObjectClass {
            id: i32,
            table_name: String,
        }

        let raw: Vec<RawObjectClass> = serde_json::from_str(json.trim())
            .map_err(|e| IntrospectionError::InvalidJson(e.to_string()))?;

        let mut by_table: HashMap<String, Vec<i32>> = HashMap::new();
        for class in raw {
            by_table.entry(class.table_name).or_default().push(class.id);
        }
        Ok(by_table)
    }

    fn parse_ownership(json: &str) -> Result<Vec<OwnershipRecord>, IntrospectionError> {
        if Self::is_empty_json(json) {
            return Ok(Vec::new());
        }

        #[derive(serde::Deserialize)]
        struct RawAggregation {
            child: String,
            parent: String,
            link: Option<String>,
            composite: bool,
        }

        let raw: Vec<RawAggregation> = serde_json::from_str(json.trim())
            .map_err(|e| IntrospectionError::InvalidJson(e.to_string()))?;

        Ok(raw
            .into_iter()
            .map(|r| {
                let kind = if r.composite {
                    RelationKind::Composition
                } else {
                    RelationKind::Aggregation
                };
                OwnershipRecord::new(&r.child, &r.parent, r.link.as_deref(), kind)
            })
            .collect())
    }

    fn parse_installed(json: &str) -> Result<Vec<InstalledFunction>, InstallError> {
        if Self::is_empty_json(json) {
            return Ok(Vec::new());
        }

        #[derive(serde::Deserialize)]
        struct RawFunction {
            schema: String,
            name: String,
            arguments: String,
        }

        let raw: Vec<RawFunction> = serde_json::from_str(json.trim())
            .map_err(|e| InstallError::InvalidJson(e.to_string()))?;

        Ok(raw
            .into_iter()
            .map(|f| InstalledFunction {
                schema: f.schema,
                name: f.name,
                arguments: f.arguments,
            })
            .collect())
    }

    async fn relation_exists(&self, schema: &str, table: &str) -> Result<bool, IntrospectionError> {
        let output = self
            .execute_query("relation_exists", &Self::relation_exists_query(schema, table))
            .await?;
        Ok(output.trim() == "t")
    }

    /// The script sent to `psql --single-transaction`: drops first, then
    /// the new definitions.
    fn install_script(drops: &[String], script: &str) -> String {
        let mut out = String::new();
        for drop in drops {
            out.push_str(drop);
            out.push('\n');
        }
        out.push_str(script);
        out
    }
}

#[async_trait]
impl SchemaSource for PostgresAdapter {
    #[instrument(skip(self))]
    async fn load_schema(&self, schema: &str) -> Result<SchemaGraph, IntrospectionError> {
        let tables_json = self.execute_query("tables", &Self::tables_query(schema)).await?;
        let fks_json = self
            .execute_query("foreign_keys", &Self::foreign_keys_query(schema))
            .await?;

        let mut tables = Self::parse_tables(&tables_json)?;
        for fk in Self::parse_foreign_keys(&fks_json)? {
            if let Some(table) = tables
                .iter_mut()
                .find(|t| t.name.eq_ignore_ascii_case(&fk.from_table))
            {
                table.foreign_keys.push(fk);
            }
        }

        if self.relation_exists(schema, "objectclass").await? {
            let classes_json = self
                .execute_query("objectclass", &Self::objectclass_query(schema))
                .await?;
            let classes = Self::parse_objectclasses(&classes_json)?;
            for table in &mut tables {
                if let Some(ids) = classes.get(&table.name.to_lowercase()) {
                    table.objectclass_ids = ids.clone();
                }
            }
        }

        let ownership = self.load_ownership(schema).await?;
        info!(tables = tables.len(), ownership = ownership.len(), "catalog loaded");

        Ok(SchemaGraph {
            name: schema.to_string(),
            tables,
            ownership,
        })
    }

    async fn load_ownership(&self, schema: &str) -> Result<Vec<OwnershipRecord>, IntrospectionError> {
        if !self.relation_exists(schema, "aggregation_info").await? {
            return Ok(Vec::new());
        }
        let json = self
            .execute_query("aggregation_info", &Self::aggregation_info_query(schema))
            .await?;
        Self::parse_ownership(&json)
    }
}

#[async_trait]
impl FunctionInstaller for PostgresAdapter {
    async fn list_installed(
        &self,
        schema: &str,
        prefix: &str,
    ) -> Result<Vec<InstalledFunction>, InstallError> {
        let query = Self::installed_functions_query(schema, prefix);
        let output = self.run_psql(&["-t", "-A", "-c", &query], None).await?;
        Self::parse_installed(&output)
    }

    #[instrument(skip(self, drops, script), fields(drops = drops.len()))]
    async fn install(&self, drops: &[String], script: &str) -> Result<(), InstallError> {
        let input = Self::install_script(drops, script);
        self.run_psql(&["--single-transaction", "-q", "-f", "-"], Some(&input))
            .await?;
        info!("delete functions installed");
        Ok(())
    }
}
