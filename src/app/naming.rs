use std::collections::HashSet;

const MAX_SUFFIX: u32 = 999;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NamingError {
    #[error("no free function name for {table} within {max_len} characters")]
    Overflow { table: String, max_len: usize },
}

/// Derives delete-function names from table names. Names are lowercase,
/// truncated to the dialect's identifier limit and unique per run.
#[derive(Debug, Clone)]
pub struct FunctionNamer {
    prefix: String,
    max_len: usize,
    taken: HashSet<String>,
}

impl FunctionNamer {
    pub fn new(prefix: impl Into<String>, max_len: usize) -> Self {
        Self {
            prefix: prefix.into().to_lowercase(),
            max_len,
            taken: HashSet::new(),
        }
    }

    /// Base name before collision handling. Stable for a given table and limit.
    pub fn base_name(&self, table: &str) -> String {
        truncate(&format!("{}{}", self.prefix, table.to_lowercase()), self.max_len)
    }

    pub fn assign(&mut self, table: &str) -> Result<String, NamingError> {
        let base = self.base_name(table);
        if !base.is_empty() && self.taken.insert(base.clone()) {
            return Ok(base);
        }

        for n in 1..=MAX_SUFFIX {
            let suffix = n.to_string();
            if suffix.len() >= self.max_len {
                break;
            }
            let candidate = format!("{}{}", truncate(&base, self.max_len - suffix.len()), suffix);
            if self.taken.insert(candidate.clone()) {
                return Ok(candidate);
            }
        }

        Err(NamingError::Overflow {
            table: table.to_string(),
            max_len: self.max_len,
        })
    }
}

fn truncate(name: &str, max_len: usize) -> String {
    name.chars().take(max_len).collect()
}
