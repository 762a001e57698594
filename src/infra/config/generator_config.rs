use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::app::classifier::OwnershipClassifier;
use crate::app::ports::EmitContext;
use crate::app::synthesizer::{DEFAULT_DISCRIMINATOR, DEFAULT_PREFIX, SynthesisOptions};
use crate::domain::{DatabaseKind, OwnershipRecord};

use super::project_root::find_project_root;

pub const CONFIG_FILE_NAME: &str = "adedel.toml";
const CONFIG_DIR_NAME: &str = "adedel";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {0}")]
    NotFound(PathBuf),
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Settings for one generation run, read from `adedel.toml`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorConfig {
    pub dialect: DatabaseKind,
    pub schema: String,
    pub root_table: String,
    pub function_prefix: String,
    pub discriminator_column: String,
    pub single_id_wrappers: bool,
    pub oracle_package: String,
    pub output: Option<PathBuf>,
    /// JSON schema snapshot used instead of a live database.
    pub snapshot: Option<PathBuf>,
    pub dsn: Option<String>,
    pub psql_timeout_secs: u64,
    /// Ignore the ownership facts of the core schema.
    pub explicit_ownership_only: bool,
    pub ownership: Vec<OwnershipRecord>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            dialect: DatabaseKind::PostgreSql,
            schema: "citydb".to_string(),
            root_table: "cityobject".to_string(),
            function_prefix: DEFAULT_PREFIX.to_string(),
            discriminator_column: DEFAULT_DISCRIMINATOR.to_string(),
            single_id_wrappers: true,
            oracle_package: "citydb_delete".to_string(),
            output: None,
            snapshot: None,
            dsn: None,
            psql_timeout_secs: 30,
            explicit_ownership_only: false,
            ownership: Vec::new(),
        }
    }
}

impl GeneratorConfig {
    pub fn from_toml_str(content: &str, path: &Path) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::NotFound(path.to_path_buf()));
        }
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content, path)
    }

    /// Loads `explicit` if given, else the first config found in the
    /// project root of `cwd` or the user config directory. Falls back to
    /// defaults when there is none.
    pub fn resolve(explicit: Option<&Path>, cwd: &Path) -> Result<(Self, Option<PathBuf>), ConfigError> {
        if let Some(path) = explicit {
            return Ok((Self::load(path)?, Some(path.to_path_buf())));
        }

        let candidates = find_project_root(cwd)
            .map(|root| root.join(CONFIG_FILE_NAME))
            .into_iter()
            .chain(dirs::config_dir().map(|dir| dir.join(CONFIG_DIR_NAME).join(CONFIG_FILE_NAME)));

        for path in candidates {
            if path.is_file() {
                debug!(path = %path.display(), "using config file");
                return Ok((Self::load(&path)?, Some(path)));
            }
        }
        debug!("no config file found, using defaults");
        Ok((Self::default(), None))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.schema.trim().is_empty() {
            return Err(ConfigError::Invalid("schema must not be empty".into()));
        }
        if self.root_table.trim().is_empty() {
            return Err(ConfigError::Invalid("root_table must not be empty".into()));
        }
        if !is_identifier(&self.function_prefix) {
            return Err(ConfigError::Invalid(format!(
                "function_prefix {:?} is not a plain SQL identifier",
                self.function_prefix
            )));
        }
        if self.dialect == DatabaseKind::Oracle && !is_identifier(&self.oracle_package) {
            return Err(ConfigError::Invalid(format!(
                "oracle_package {:?} is not a plain SQL identifier",
                self.oracle_package
            )));
        }
        if self.psql_timeout_secs == 0 {
            return Err(ConfigError::Invalid("psql_timeout_secs must be positive".into()));
        }
        Ok(())
    }

    pub fn synthesis_options(&self) -> SynthesisOptions {
        SynthesisOptions {
            discriminator_column: self.discriminator_column.clone(),
            ..SynthesisOptions::default()
        }
        .with_prefix(self.function_prefix.clone())
    }

    pub fn emit_context(&self) -> EmitContext {
        EmitContext {
            schema: self.schema.clone(),
            package: self.oracle_package.clone(),
            single_id_wrappers: self.single_id_wrappers,
        }
    }

    /// Classifier over the configured records plus `extra` ones (e.g.
    /// loaded from the database). Configured records replace extra ones
    /// for the same pair and link.
    pub fn classifier(&self, extra: Vec<OwnershipRecord>) -> OwnershipClassifier {
        let mut records = self.ownership.clone();
        records.extend(extra.into_iter().filter(|r| {
            !self.ownership.iter().any(|c| {
                c.covers_pair(&r.child, &r.parent)
                    && match (&c.link, &r.link) {
                        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
                        (None, None) => true,
                        _ => false,
                    }
            })
        }));
        if self.explicit_ownership_only {
            OwnershipClassifier::explicit_only(records)
        } else {
            OwnershipClassifier::new(records)
        }
    }
}

fn is_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ports::RelationClassifier;
    use crate::domain::{RelationKind, TableRef};
    use rstest::rstest;
    use tempfile::TempDir;

    const SAMPLE: &str = r#"
dialect = "oracle"
schema = "citydb"
root_table = "cityobject"
function_prefix = "del_"
oracle_package = "ade_delete"
single_id_wrappers = false

[[ownership]]
child = "noise_road_segment"
parent = "road"
kind = "composition"

[[ownership]]
child = "surface_geometry"
parent = "noise_barrier"
link = "lod2_multi_surface_id"
kind = "aggregation"
"#;

    mod parse {
        use super::*;

        #[test]
        fn reads_all_sections() {
            let config = GeneratorConfig::from_toml_str(SAMPLE, Path::new("adedel.toml")).unwrap();

            assert_eq!(config.dialect, DatabaseKind::Oracle);
            assert_eq!(config.oracle_package, "ade_delete");
            assert!(!config.single_id_wrappers);
            assert_eq!(config.ownership.len(), 2);
            assert_eq!(config.ownership[1].link.as_deref(), Some("lod2_multi_surface_id"));
            assert_eq!(config.ownership[1].kind, RelationKind::Aggregation);
        }

        #[test]
        fn missing_keys_take_defaults() {
            let config = GeneratorConfig::from_toml_str("schema = \"ade\"", Path::new("x.toml")).unwrap();

            assert_eq!(config.schema, "ade");
            assert_eq!(config.dialect, DatabaseKind::PostgreSql);
            assert_eq!(config.function_prefix, "del_");
            assert_eq!(config.psql_timeout_secs, 30);
        }

        #[test]
        fn unknown_key_is_rejected() {
            let result = GeneratorConfig::from_toml_str("colour = \"red\"", Path::new("x.toml"));

            assert!(matches!(result, Err(ConfigError::Parse { .. })));
        }

        #[rstest]
        #[case("schema = \"\"")]
        #[case("root_table = \" \"")]
        #[case("function_prefix = \"del-\"")]
        #[case("psql_timeout_secs = 0")]
        #[case("dialect = \"oracle\"\noracle_package = \"pkg.x\"")]
        fn invalid_values_are_rejected(#[case] content: &str) {
            let result = GeneratorConfig::from_toml_str(content, Path::new("x.toml"));

            assert!(matches!(result, Err(ConfigError::Invalid(_))));
        }
    }

    mod resolve {
        use super::*;

        #[test]
        fn explicit_path_must_exist() {
            let temp_dir = TempDir::new().unwrap();
            let missing = temp_dir.path().join("missing.toml");

            let result = GeneratorConfig::resolve(Some(&missing), temp_dir.path());

            assert!(matches!(result, Err(ConfigError::NotFound(_))));
        }

        #[test]
        fn project_config_is_found_from_subdirectory() {
            let temp_dir = TempDir::new().unwrap();
            let nested = temp_dir.path().join("sql");
            fs::create_dir_all(&nested).unwrap();
            fs::write(temp_dir.path().join(CONFIG_FILE_NAME), "schema = \"ade\"").unwrap();

            let (config, path) = GeneratorConfig::resolve(None, &nested).unwrap();

            assert_eq!(config.schema, "ade");
            assert_eq!(path.unwrap(), temp_dir.path().join(CONFIG_FILE_NAME));
        }
    }

    mod derived {
        use super::*;

        #[test]
        fn emit_context_carries_package_and_wrappers() {
            let config = GeneratorConfig::from_toml_str(SAMPLE, Path::new("adedel.toml")).unwrap();

            let ctx = config.emit_context();

            assert_eq!(ctx.schema, "citydb");
            assert_eq!(ctx.package, "ade_delete");
            assert!(!ctx.single_id_wrappers);
        }

        #[test]
        fn synthesis_options_use_prefix_and_discriminator() {
            let config = GeneratorConfig {
                function_prefix: "rm_".to_string(),
                discriminator_column: "class_id".to_string(),
                ..GeneratorConfig::default()
            };

            let options = config.synthesis_options();

            assert_eq!(options.prefix, "rm_");
            assert_eq!(options.discriminator_column, "class_id");
        }

        #[test]
        fn configured_records_replace_loaded_ones() {
            let config = GeneratorConfig::from_toml_str(SAMPLE, Path::new("adedel.toml")).unwrap();
            let extra = vec![
                OwnershipRecord::new("noise_road_segment", "road", None, RelationKind::Aggregation),
                OwnershipRecord::new("a", "b", None, RelationKind::Composition),
            ];

            let classifier = config.classifier(extra);
            let kind = |child: &str, parent: &str| {
                classifier
                    .classify(&TableRef::new("citydb", child), &TableRef::new("citydb", parent), None)
                    .unwrap()
            };

            assert_eq!(kind("noise_road_segment", "road"), RelationKind::Composition);
            assert_eq!(kind("a", "b"), RelationKind::Composition);
            assert_eq!(kind("b", "a"), RelationKind::None);
        }
    }
}
