use crate::config::{AlternateSqls, Catalog};
use crate::query;
use crate::sandbox::Sandbox;
use crate::seed;
use serde::Serialize;

pub mod codes {
    pub const E_SEED_FAILED: &str = "E_SEED_FAILED";
    pub const E_CHECKER_FAILED: &str = "E_CHECKER_FAILED";
    pub const W_ALTERNATES_UNPARSEABLE: &str = "W_ALTERNATES_UNPARSEABLE";
    pub const W_ALTERNATE_DISAGREES: &str = "W_ALTERNATE_DISAGREES";
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Finding {
    pub code: &'static str,
    pub topic: String,
    pub question: String,
    /// Checker position (0 = primary), when the finding is about one checker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checker: Option<usize>,
    pub message: String,
}

impl Finding {
    pub fn is_error(&self) -> bool {
        self.code.starts_with("E_")
    }
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct ValidateReport {
    pub questions: usize,
    pub findings: Vec<Finding>,
}

impl ValidateReport {
    pub fn has_errors(&self) -> bool {
        self.findings.iter().any(Finding::is_error)
    }
}

/// Dry-runs every question's checkers against its own seed.
///
/// Catches broken seeds, checkers that no longer execute, and alternates whose rows
/// disagree with the primary checker (those could never be the deciding match for a
/// learner who also matches the primary).
pub fn validate_catalog(cat: &Catalog) -> anyhow::Result<ValidateReport> {
    let mut report = ValidateReport::default();

    for t in &cat.topics {
        let topic = t.to_model();
        for qs in &t.questions {
            report.questions += 1;
            let question = qs.to_model();
            let finding = |code: &'static str, checker: Option<usize>, message: String| Finding {
                code,
                topic: t.slug.clone(),
                question: qs.slug.clone(),
                checker,
                message,
            };

            if let Some(AlternateSqls::Raw(raw)) = &qs.alternate_checker_sqls {
                if serde_json::from_str::<Vec<String>>(raw).is_err() {
                    report.findings.push(finding(
                        codes::W_ALTERNATES_UNPARSEABLE,
                        None,
                        "alternate_checker_sqls is not a JSON list; alternates are ignored".into(),
                    ));
                }
            }

            let sandbox = Sandbox::open(&cat.settings)?;
            if let Err(e) = seed::seed(&sandbox, question.effective_seed(&topic)) {
                report
                    .findings
                    .push(finding(codes::E_SEED_FAILED, None, e.to_string()));
                continue;
            }

            let mut primary_rows = None;
            for (i, sql) in question.checker_sqls().iter().enumerate() {
                match query::run(&sandbox, sql) {
                    Ok(rs) => {
                        let rows = rs.sorted_rows();
                        if i == 0 {
                            primary_rows = Some(rows);
                        } else if let Some(primary) = &primary_rows {
                            if *primary != rows {
                                report.findings.push(finding(
                                    codes::W_ALTERNATE_DISAGREES,
                                    Some(i),
                                    format!(
                                        "returns {} rows that differ from the primary checker ({} rows)",
                                        rows.len(),
                                        primary.len()
                                    ),
                                ));
                            }
                        }
                    }
                    Err(e) => report.findings.push(finding(
                        codes::E_CHECKER_FAILED,
                        Some(i),
                        e.to_string(),
                    )),
                }
            }
        }
    }

    tracing::info!(
        event = "catalog_validated",
        questions = report.questions,
        findings = report.findings.len()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_catalog;

    #[test]
    fn sample_catalog_is_clean() {
        let cat = parse_catalog(crate::config::SAMPLE_CATALOG, true).unwrap();
        let report = validate_catalog(&cat).unwrap();
        assert_eq!(report.questions, 2);
        assert!(report.findings.is_empty(), "{:?}", report.findings);
    }

    #[test]
    fn reports_broken_content() {
        let cat = parse_catalog(
            r#"
topics:
  - slug: t
    title: T
    seed_sql: CREATE TABLE t(id INT); INSERT INTO t VALUES (1),(2);
    questions:
      - slug: stale
        title: Stale alternate
        checker_sql: SELECT id FROM t
        alternate_checker_sqls: ["SELECT id FROM gone", "SELECT id FROM t WHERE id = 1"]
      - slug: raw
        title: Raw alternates
        checker_sql: SELECT id FROM t
        alternate_checker_sqls: "[not json"
      - slug: broken-seed
        title: Broken seed
        seed_sql_override: CREATE TABLE (
        checker_sql: SELECT 1
"#,
            true,
        )
        .unwrap();
        let report = validate_catalog(&cat).unwrap();
        let got: Vec<_> = report
            .findings
            .iter()
            .map(|f| (f.question.as_str(), f.code))
            .collect();
        assert_eq!(
            got,
            vec![
                ("stale", codes::E_CHECKER_FAILED),
                ("stale", codes::W_ALTERNATE_DISAGREES),
                ("raw", codes::W_ALTERNATES_UNPARSEABLE),
                ("broken-seed", codes::E_SEED_FAILED),
            ]
        );
        assert!(report.has_errors());
    }
}
