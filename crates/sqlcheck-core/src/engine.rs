//! Request-level operations offered to the hosting layer: ad-hoc runs, answer checks,
//! and solution display.

use crate::config::EngineSettings;
use crate::errors::JudgeError;
use crate::judge::{Judge, JudgeReport, Verdict};
use crate::model::{Question, Topic};
use crate::progress;
use crate::query::{self, Row};
use crate::safety;
use crate::sandbox::Sandbox;
use crate::seed;
use crate::storage::store::Store;
use serde::Serialize;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct QueryOutput {
    pub columns: Vec<String>,
    pub rows: Vec<Row>,
    #[serde(rename = "rowCount")]
    pub row_count: usize,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CheckResponse {
    pub correct: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl CheckResponse {
    fn from_verdict(v: &Verdict) -> Self {
        Self {
            correct: v.is_correct(),
            error: v.reason(),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct SolutionsResponse {
    pub solutions: String,
}

/// Structured failure body for operations that do not succeed.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct ErrorResponse {
    pub error: String,
    pub code: &'static str,
}

impl From<&JudgeError> for ErrorResponse {
    fn from(e: &JudgeError) -> Self {
        Self {
            error: e.to_string(),
            code: e.code(),
        }
    }
}

/// Decides between a request persisting its outcome and its caller giving up on it.
///
/// Exactly one of [`CommitGate::try_commit`] and [`CommitGate::try_abandon`] succeeds.
#[derive(Debug, Default)]
pub struct CommitGate(AtomicU8);

impl CommitGate {
    const OPEN: u8 = 0;
    const COMMITTED: u8 = 1;
    const ABANDONED: u8 = 2;

    pub fn new() -> Self {
        Self::default()
    }

    /// Worker side, before writing. `false` once the caller has abandoned the request.
    pub fn try_commit(&self) -> bool {
        self.0
            .compare_exchange(Self::OPEN, Self::COMMITTED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Caller side, on timeout. `false` when the worker already committed; its result
    /// must then be awaited and reported.
    pub fn try_abandon(&self) -> bool {
        self.0
            .compare_exchange(Self::OPEN, Self::ABANDONED, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }
}

#[derive(Clone)]
pub struct Engine {
    store: Store,
    judge: Judge,
}

impl Engine {
    pub fn new(store: Store, settings: EngineSettings) -> Self {
        Self {
            store,
            judge: Judge::new(settings),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn settings(&self) -> &EngineSettings {
        self.judge.settings()
    }

    fn topic(&self, slug: &str) -> Result<Topic, JudgeError> {
        self.store
            .topic_by_slug(slug)
            .map_err(internal)?
            .ok_or_else(|| JudgeError::NotFound(format!("topic '{}'", slug)))
    }

    fn question(&self, slug: &str) -> Result<(Topic, Question), JudgeError> {
        self.store
            .question_by_slug(slug)
            .map_err(internal)?
            .ok_or_else(|| JudgeError::NotFound(format!("question '{}'", slug)))
    }

    /// Exploratory execution against a topic's freshly seeded dataset. Not judged.
    pub fn run_query(&self, topic_slug: &str, sql: &str) -> Result<QueryOutput, JudgeError> {
        let sql = sql.trim();
        if sql.is_empty() {
            return Err(JudgeError::Input("empty".into()));
        }
        let topic = self.topic(topic_slug)?;
        safety::admit(sql, false, self.settings().safety).map_err(JudgeError::Unsafe)?;

        let sandbox = Sandbox::open(self.settings()).map_err(internal)?;
        seed::seed(&sandbox, &topic.seed_sql).map_err(|e| JudgeError::Seed(e.to_string()))?;
        let rs = query::run(&sandbox, sql).map_err(|e| JudgeError::Query(e.to_string()))?;

        tracing::info!(
            event = "run_query_done",
            topic = %topic.slug,
            rows = rs.rows.len()
        );
        Ok(QueryOutput {
            row_count: rs.rows.len(),
            columns: rs.columns,
            rows: rs.rows,
        })
    }

    /// Judges a submission and, when correct, marks the question completed for `username`.
    pub fn check_answer_report(
        &self,
        question_slug: &str,
        sql: &str,
        username: &str,
    ) -> Result<JudgeReport, JudgeError> {
        self.check_answer_report_gated(question_slug, sql, username, None)
    }

    /// As [`Engine::check_answer_report`], but progress is only written if `gate`
    /// is still open when the verdict is known.
    pub fn check_answer_report_gated(
        &self,
        question_slug: &str,
        sql: &str,
        username: &str,
        gate: Option<&CommitGate>,
    ) -> Result<JudgeReport, JudgeError> {
        let username = username.trim();
        if username.is_empty() {
            return Err(JudgeError::Input("user is required".into()));
        }
        let (topic, question) = self.question(question_slug)?;
        let report = self.judge.judge(&topic, &question, sql);

        if report.verdict.is_correct() {
            if !gate.map_or(true, CommitGate::try_commit) {
                tracing::warn!(
                    event = "progress_skipped_abandoned",
                    question = %question.slug
                );
                return Ok(report);
            }
            let recorded = self
                .store
                .ensure_user(username)
                .and_then(|uid| progress::record(&self.store, uid, question.id, true));
            if let Err(e) = recorded {
                // The judgment stands even if persisting it failed.
                tracing::error!(
                    event = "progress_record_failed",
                    question = %question.slug,
                    error = %e
                );
            }
        }
        Ok(report)
    }

    pub fn check_answer(&self, question_slug: &str, sql: &str, username: &str) -> CheckResponse {
        self.check_answer_gated(question_slug, sql, username, None)
    }

    pub fn check_answer_gated(
        &self,
        question_slug: &str,
        sql: &str,
        username: &str,
        gate: Option<&CommitGate>,
    ) -> CheckResponse {
        match self.check_answer_report_gated(question_slug, sql, username, gate) {
            Ok(report) => CheckResponse::from_verdict(&report.verdict),
            Err(e) => CheckResponse {
                correct: false,
                error: Some(e.to_string()),
            },
        }
    }

    /// Every accepted solution as literal SQL, numbered from 1.
    pub fn show_answer(&self, question_slug: &str) -> Result<SolutionsResponse, JudgeError> {
        let (_, question) = self.question(question_slug)?;
        Ok(SolutionsResponse {
            solutions: format_solutions(&question.checker_sqls()),
        })
    }
}

pub fn format_solutions(checkers: &[String]) -> String {
    let mut out = String::new();
    for (i, sql) in checkers.iter().enumerate() {
        out.push_str(&format!("Solution {}: {}\n\n", i + 1, sql));
    }
    out
}

fn internal(e: anyhow::Error) -> JudgeError {
    tracing::error!(event = "engine_internal_error", error = %format!("{:#}", e));
    JudgeError::Internal(format!("{:#}", e))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::config::{parse_catalog, SAMPLE_CATALOG};

    fn engine() -> Engine {
        let store = Store::memory().unwrap();
        store.init_schema().unwrap();
        store
            .import_catalog(&parse_catalog(SAMPLE_CATALOG, true).unwrap())
            .unwrap();
        Engine::new(store, EngineSettings::default())
    }

    const HIGH_EARNERS: &str = "SELECT name FROM employees WHERE salary > 100";

    #[test]
    fn gate_admits_exactly_one_side() {
        let gate = CommitGate::new();
        assert!(gate.try_commit());
        assert!(!gate.try_abandon());

        let gate = CommitGate::new();
        assert!(gate.try_abandon());
        assert!(!gate.try_commit());
    }

    #[test]
    fn abandoned_check_does_not_record_progress() {
        let e = engine();
        let gate = CommitGate::new();
        assert!(gate.try_abandon());
        let report = e
            .check_answer_report_gated("high-earners", HIGH_EARNERS, "ada", Some(&gate))
            .unwrap();
        assert!(report.verdict.is_correct());
        assert_eq!(e.store().find_user("ada").unwrap(), None);
    }

    #[test]
    fn open_gate_is_claimed_by_correct_check() {
        let e = engine();
        let gate = CommitGate::new();
        assert!(e.check_answer_gated("high-earners", HIGH_EARNERS, "ada", Some(&gate)).correct);
        assert!(!gate.try_abandon());
        assert!(e.store().find_user("ada").unwrap().is_some());
    }

    #[test]
    fn solutions_are_numbered_in_checker_order() {
        let s = format_solutions(&["SELECT 1".to_string(), "SELECT 2".to_string()]);
        assert_eq!(s, "Solution 1: SELECT 1\n\nSolution 2: SELECT 2\n\n");
    }

    #[test]
    fn check_response_omits_error_when_correct() {
        let json = serde_json::to_value(CheckResponse::from_verdict(&Verdict::Correct)).unwrap();
        assert_eq!(json, serde_json::json!({ "correct": true }));
        let json = serde_json::to_value(CheckResponse::from_verdict(&Verdict::Incorrect(
            "result does not match".into(),
        )))
        .unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "correct": false, "error": "result does not match" })
        );
    }
}
