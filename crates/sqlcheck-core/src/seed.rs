use crate::query::{map_sqlite_error, ExecError};
use crate::sandbox::Sandbox;
use std::fmt;

/// A seed fragment failed. Fragments after it were not executed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SeedError {
    /// Zero-based position among the non-empty fragments.
    pub fragment: usize,
    pub statement: String,
    pub error: ExecError,
}

impl fmt::Display for SeedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "statement {} ({}): {}",
            self.fragment + 1,
            abbreviate(&self.statement),
            self.error
        )
    }
}

impl std::error::Error for SeedError {}

/// Non-empty, trimmed fragments of `script` split on `;`.
///
/// The split is textual: a `;` inside a string literal also splits.
pub fn split_statements(script: &str) -> Vec<&str> {
    script
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// Applies `script` to the sandbox one fragment at a time, stopping at the first failure.
///
/// Nothing is rolled back. Scripts run against a shared database must drop and
/// recreate their own tables.
pub fn seed(sandbox: &Sandbox, script: &str) -> Result<usize, SeedError> {
    let fragments = split_statements(script);
    let _deadline = sandbox.arm_deadline();
    for (i, stmt) in fragments.iter().enumerate() {
        if let Err(e) = sandbox.conn().execute_batch(stmt) {
            return Err(SeedError {
                fragment: i,
                statement: stmt.to_string(),
                error: map_sqlite_error(sandbox, e),
            });
        }
    }
    tracing::debug!(event = "seed_applied", statements = fragments.len());
    Ok(fragments.len())
}

fn abbreviate(stmt: &str) -> String {
    const MAX: usize = 60;
    let one_line = stmt.split_whitespace().collect::<Vec<_>>().join(" ");
    if one_line.chars().count() <= MAX {
        one_line
    } else {
        let cut: String = one_line.chars().take(MAX).collect();
        format!("{}...", cut)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query;

    const SCRIPT: &str = "DROP TABLE IF EXISTS t;
        CREATE TABLE t(id INT);
        INSERT INTO t VALUES (1),(2),(3);";

    #[test]
    fn splits_and_discards_empty_fragments() {
        assert_eq!(
            split_statements(" a ; ;b;\n  ;c "),
            vec!["a", "b", "c"]
        );
        assert!(split_statements(" ; \n ;").is_empty());
    }

    #[test]
    fn applies_every_fragment() -> anyhow::Result<()> {
        let sb = Sandbox::in_memory()?;
        assert_eq!(seed(&sb, SCRIPT)?, 3);
        let rs = query::run(&sb, "SELECT count(*) FROM t")?;
        assert_eq!(rs.rows, vec![vec![query::Cell::Integer(3)]]);
        Ok(())
    }

    #[test]
    fn reseeding_is_stable_for_idempotent_scripts() -> anyhow::Result<()> {
        let sb = Sandbox::in_memory()?;
        seed(&sb, SCRIPT)?;
        let first = query::run(&sb, "SELECT id FROM t ORDER BY id")?;
        seed(&sb, SCRIPT)?;
        let second = query::run(&sb, "SELECT id FROM t ORDER BY id")?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn failure_aborts_remaining_fragments() -> anyhow::Result<()> {
        let sb = Sandbox::in_memory()?;
        let err = seed(
            &sb,
            "CREATE TABLE a(x INT); INSERT INTO nope VALUES (1); CREATE TABLE b(y INT)",
        )
        .unwrap_err();
        assert_eq!(err.fragment, 1);
        assert!(err.to_string().contains("no such table"), "{}", err);
        assert!(query::run(&sb, "SELECT * FROM a").is_ok());
        assert!(query::run(&sb, "SELECT * FROM b").is_err());
        Ok(())
    }
}
