use tracing::{info, instrument};

use crate::domain::SchemaGraph;
use crate::introspector::GraphIntrospector;
use crate::ports::{DeleteDialect, EmitContext, RelationClassifier};
use crate::synthesizer::{DeleteSynthesizer, Synthesis, SynthesisError, SynthesisOptions};

/// A rendered script together with what went into it.
#[derive(Debug, Clone)]
pub struct GeneratedScript {
    pub script: String,
    pub function_names: Vec<String>,
    pub notes: Vec<String>,
}

/// Synthesizes the delete functions reachable from `root` and renders them
/// with `dialect`. Either the whole script is produced or nothing is.
#[instrument(skip(schema, classifier, dialect, ctx, options), fields(schema = %schema.name))]
pub fn generate_script(
    schema: &SchemaGraph,
    classifier: &dyn RelationClassifier,
    dialect: &dyn DeleteDialect,
    ctx: &EmitContext,
    root: &str,
    options: SynthesisOptions,
) -> Result<GeneratedScript, SynthesisError> {
    let synthesis = synthesize(schema, classifier, dialect, root, options)?;
    let script = synthesis.registry.emit_all(dialect, ctx, &synthesis.notes);
    let function_names: Vec<String> = synthesis
        .registry
        .names()
        .into_iter()
        .map(str::to_string)
        .collect();

    info!(
        dialect = dialect.kind().display_name(),
        functions = function_names.len(),
        bytes = script.len(),
        "script generated"
    );
    Ok(GeneratedScript {
        script,
        function_names,
        notes: synthesis.notes,
    })
}

/// Synthesis only, with names sized for `dialect`.
pub fn synthesize(
    schema: &SchemaGraph,
    classifier: &dyn RelationClassifier,
    dialect: &dyn DeleteDialect,
    root: &str,
    options: SynthesisOptions,
) -> Result<Synthesis, SynthesisError> {
    let introspector = GraphIntrospector::new(schema);
    let options = options.with_max_identifier_len(dialect.max_identifier_len());
    DeleteSynthesizer::new(&introspector, classifier, options).synthesize(&schema.table_ref(root))
}
