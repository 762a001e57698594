pub mod classifier;
pub mod dialect;
pub mod installer;
pub mod introspector;
pub mod schema_source;
pub mod script_writer;

pub use classifier::{ClassifyError, RelationClassifier};
pub use dialect::{DeleteDialect, DialectUnsupported, EmitContext};
pub use installer::{FunctionInstaller, InstallError, InstalledFunction};
pub use introspector::{IntrospectionError, SchemaIntrospector};
pub use schema_source::SchemaSource;
pub use script_writer::{ScriptWriteError, ScriptWriter};

#[cfg(test)]
pub use introspector::MockSchemaIntrospector;
