//! Admission control for learner-submitted SQL.
//!
//! Two layers exist. [`is_safe`] is a substring deny-list: cheap, and it catches
//! learners accidentally mutating the shared dataset, but a blocked keyword inside a
//! string literal or identifier (`updated_at`) trips it and it is not a security
//! boundary. [`classify`] parses the text and admits a single statement: read-only for
//! answers, anything but the deny-listed kinds for exploratory runs.
//! Seed scripts and checker queries are author-controlled and never pass through here.

use serde::{Deserialize, Serialize};
use sqlparser::ast::{Query, SetExpr, Statement};
use sqlparser::dialect::SQLiteDialect;
use sqlparser::parser::Parser;

pub const BLOCKED_KEYWORDS: &[&str] = &[
    "ATTACH", "PRAGMA", "DROP", "DELETE", "UPDATE", "INSERT", "ALTER", "VACUUM",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SafetyMode {
    /// Substring deny-list only.
    DenyList,
    /// Statement parser; falls back to the deny-list when the text does not parse.
    #[default]
    Parsed,
}

/// Deny-list check. Substring match on the uppercased text, not tokenized.
pub fn is_safe(sql: &str, select_only: bool) -> bool {
    let upper = sql.to_uppercase();
    if BLOCKED_KEYWORDS.iter().any(|b| upper.contains(b)) {
        return false;
    }
    if select_only && !upper.trim().starts_with("SELECT") {
        return false;
    }
    true
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    Allowed,
    Rejected(String),
    Unparseable(String),
}

/// Parses `sql` and decides whether it is a single admissible statement.
///
/// With `select_only` only a read-only query (or `EXPLAIN` of one) passes. Otherwise
/// any statement passes except the kinds the deny-list names: writes, drops, schema
/// alteration, `PRAGMA` and `ATTACH`.
pub fn classify(sql: &str, select_only: bool) -> Classification {
    let statements = match Parser::parse_sql(&SQLiteDialect {}, sql) {
        Ok(s) => s,
        Err(e) => return Classification::Unparseable(e.to_string()),
    };
    match statements.as_slice() {
        [] => Classification::Rejected("no statement".into()),
        [stmt] if select_only => {
            if is_read_only(stmt) {
                Classification::Allowed
            } else {
                Classification::Rejected("only read-only queries are allowed".into())
            }
        }
        [stmt] => match denied_kind(stmt) {
            Some(kind) => Classification::Rejected(format!("{} statements are not allowed", kind)),
            None => Classification::Allowed,
        },
        many => Classification::Rejected(format!(
            "expected one statement, found {}",
            many.len()
        )),
    }
}

fn is_read_only(stmt: &Statement) -> bool {
    match stmt {
        Statement::Query(q) => !query_writes(q),
        Statement::Explain { statement, .. } => is_read_only(statement),
        _ => false,
    }
}

/// Deny-listed statement kind, by keyword.
fn denied_kind(stmt: &Statement) -> Option<&'static str> {
    match stmt {
        Statement::Insert(_) => Some("INSERT"),
        Statement::Update { .. } => Some("UPDATE"),
        Statement::Delete(_) => Some("DELETE"),
        Statement::Drop { .. } | Statement::DropFunction { .. } => Some("DROP"),
        Statement::AlterTable { .. } => Some("ALTER"),
        Statement::Pragma { .. } => Some("PRAGMA"),
        Statement::AttachDatabase { .. } | Statement::AttachDuckDBDatabase { .. } => {
            Some("ATTACH")
        }
        Statement::Query(q) if query_writes(q) => Some("INSERT/UPDATE"),
        Statement::Explain { statement, .. } => denied_kind(statement),
        _ => None,
    }
}

// A CTE-wrapped INSERT/UPDATE parses as a query.
fn query_writes(q: &Query) -> bool {
    let in_ctes = q
        .with
        .as_ref()
        .is_some_and(|w| w.cte_tables.iter().any(|cte| query_writes(&cte.query)));
    in_ctes || set_expr_writes(&q.body)
}

fn set_expr_writes(body: &SetExpr) -> bool {
    match body {
        SetExpr::Insert(_) | SetExpr::Update(_) => true,
        SetExpr::Query(q) => query_writes(q),
        SetExpr::SetOperation { left, right, .. } => {
            set_expr_writes(left) || set_expr_writes(right)
        }
        _ => false,
    }
}

/// Admission decision for a learner statement under `mode`.
///
/// In parsed mode a read-only statement may also start with `WITH` or `VALUES`.
pub fn admit(sql: &str, select_only: bool, mode: SafetyMode) -> Result<(), String> {
    match mode {
        SafetyMode::DenyList => deny_list_verdict(sql, select_only),
        SafetyMode::Parsed => match classify(sql, select_only) {
            Classification::Allowed => Ok(()),
            Classification::Rejected(reason) => Err(reason),
            Classification::Unparseable(err) => {
                tracing::debug!(
                    event = "safety_parse_fallback",
                    error = %err,
                    "falling back to deny-list"
                );
                deny_list_verdict(sql, select_only)
            }
        },
    }
}

fn deny_list_verdict(sql: &str, select_only: bool) -> Result<(), String> {
    if is_safe(sql, select_only) {
        Ok(())
    } else {
        Err("statement is not allowed".into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deny_list_blocks_mutations() {
        assert!(!is_safe("DELETE FROM x", true));
        assert!(!is_safe("delete from x", false));
        assert!(!is_safe("SELECT 1; DROP TABLE t", true));
        assert!(!is_safe("pragma table_info(t)", false));
    }

    #[test]
    fn deny_list_is_substring_based() {
        // Known false positive of the heuristic.
        assert!(!is_safe("SELECT updated_at FROM t", true));
        assert!(!is_safe("SELECT 'please insert coin'", true));
    }

    #[test]
    fn select_only_requires_leading_select() {
        assert!(is_safe("  select id from t", true));
        assert!(!is_safe("WITH x AS (SELECT 1) SELECT * FROM x", true));
        assert!(is_safe("CREATE TABLE scratch(a INT)", false));
    }

    #[test]
    fn classify_accepts_single_query() {
        assert_eq!(classify("SELECT id FROM t WHERE id > 1", true), Classification::Allowed);
        assert_eq!(
            classify("WITH x AS (SELECT 1 AS a) SELECT a FROM x", true),
            Classification::Allowed
        );
    }

    #[test]
    fn classify_rejects_writes_and_batches() {
        for sql in ["DELETE FROM t", "UPDATE t SET id = 1", "CREATE TABLE s(x INT)"] {
            assert!(matches!(classify(sql, true), Classification::Rejected(_)), "{}", sql);
        }
        assert!(matches!(
            classify("SELECT 1; SELECT 2", false),
            Classification::Rejected(_)
        ));
    }

    #[test]
    fn run_path_admits_everything_but_denied_kinds() {
        assert_eq!(classify("CREATE TABLE scratch(x INT)", false), Classification::Allowed);
        assert_eq!(classify("SELECT 1", false), Classification::Allowed);
        for sql in [
            "INSERT INTO t VALUES (1)",
            "UPDATE t SET id = 2",
            "DELETE FROM t",
            "DROP TABLE t",
            "ALTER TABLE t ADD COLUMN y INT",
            "PRAGMA foreign_keys = OFF",
            "ATTACH DATABASE 'x.db' AS x",
        ] {
            assert!(admit(sql, false, SafetyMode::Parsed).is_err(), "{}", sql);
        }
    }

    #[test]
    fn cte_wrapped_writes_are_not_read_only() {
        let sql = "WITH x AS (SELECT 1) INSERT INTO t SELECT * FROM x";
        assert!(matches!(classify(sql, true), Classification::Rejected(_)));
        assert!(matches!(classify(sql, false), Classification::Rejected(_)));
    }

    #[test]
    fn parsed_mode_ignores_keywords_in_literals() {
        assert!(admit("SELECT 'DROP' AS word", true, SafetyMode::Parsed).is_ok());
        assert!(admit("SELECT 'DROP' AS word", true, SafetyMode::DenyList).is_err());
    }

    #[test]
    fn parsed_mode_falls_back_on_parse_error() {
        assert!(admit("DELETE FROM ((", true, SafetyMode::Parsed).is_err());
    }
}
