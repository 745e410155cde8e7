//! Answer judging: seed, run the learner query, then compare against each accepted
//! checker query until one produces the same multiset of rows.

use crate::config::EngineSettings;
use crate::errors::JudgeError;
use crate::fingerprint;
use crate::model::{Question, Topic};
use crate::query::{self, Row};
use crate::safety;
use crate::sandbox::Sandbox;
use crate::seed;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Correct,
    Incorrect(String),
    Error(JudgeError),
}

impl Verdict {
    pub fn is_correct(&self) -> bool {
        matches!(self, Verdict::Correct)
    }

    /// Reason shown to the learner, absent when correct.
    pub fn reason(&self) -> Option<String> {
        match self {
            Verdict::Correct => None,
            Verdict::Incorrect(r) => Some(r.clone()),
            Verdict::Error(e) => Some(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckerOutcome {
    Matched,
    Mismatch,
    /// The checker itself errored; it is simply excluded from the match set.
    Failed(String),
}

#[derive(Debug, Clone)]
pub struct JudgeReport {
    pub verdict: Verdict,
    /// One entry per checker actually tried, in order. Empty when judging stopped early.
    pub checkers: Vec<CheckerOutcome>,
}

impl JudgeReport {
    fn error(e: JudgeError) -> Self {
        Self {
            verdict: Verdict::Error(e),
            checkers: Vec::new(),
        }
    }

    /// Index of the checker that matched, if any.
    pub fn matched_checker(&self) -> Option<usize> {
        self.checkers
            .iter()
            .position(|c| matches!(c, CheckerOutcome::Matched))
    }
}

pub const MISMATCH_REASON: &str = "result does not match";

#[derive(Debug, Clone, Default)]
pub struct Judge {
    settings: EngineSettings,
}

impl Judge {
    pub fn new(settings: EngineSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn judge(&self, topic: &Topic, question: &Question, learner_sql: &str) -> JudgeReport {
        let learner_sql = learner_sql.trim();
        if learner_sql.is_empty() {
            return JudgeReport::error(JudgeError::Input("empty".into()));
        }
        if let Err(reason) = safety::admit(learner_sql, true, self.settings.safety) {
            tracing::info!(
                event = "submission_rejected",
                question = %question.slug,
                submission = %fingerprint::submission(learner_sql),
                reason = %reason
            );
            return JudgeReport::error(JudgeError::Unsafe(reason));
        }

        let sandbox = match Sandbox::open(&self.settings) {
            Ok(s) => s,
            Err(e) => return JudgeReport::error(JudgeError::Internal(format!("{:#}", e))),
        };
        let checkers = question.checker_sqls();
        let report = judge_in(
            &sandbox,
            question.effective_seed(topic),
            &checkers,
            learner_sql,
        );

        tracing::info!(
            event = "judge_done",
            question = %question.slug,
            submission = %fingerprint::submission(learner_sql),
            correct = report.verdict.is_correct(),
            checkers_tried = report.checkers.len(),
            matched = ?report.matched_checker()
        );
        report
    }
}

/// Core judging steps against an already opened sandbox.
///
/// The learner statement is assumed to have passed admission control.
pub fn judge_in(
    sandbox: &Sandbox,
    seed_sql: &str,
    checkers: &[String],
    learner_sql: &str,
) -> JudgeReport {
    if let Err(e) = seed::seed(sandbox, seed_sql) {
        tracing::warn!(event = "seed_failed", error = %e);
        return JudgeReport::error(JudgeError::Seed(e.to_string()));
    }

    let learner_rows = match query::run(sandbox, learner_sql) {
        Ok(rs) => rs.sorted_rows(),
        Err(e) => return JudgeReport::error(JudgeError::Query(e.to_string())),
    };

    let mut outcomes = Vec::with_capacity(checkers.len());
    for (i, checker_sql) in checkers.iter().enumerate() {
        let outcome = compare(sandbox, checker_sql, &learner_rows);
        if let CheckerOutcome::Failed(err) = &outcome {
            tracing::warn!(event = "checker_failed", checker = i, error = %err);
        }
        let matched = outcome == CheckerOutcome::Matched;
        outcomes.push(outcome);
        if matched {
            return JudgeReport {
                verdict: Verdict::Correct,
                checkers: outcomes,
            };
        }
    }

    JudgeReport {
        verdict: Verdict::Incorrect(MISMATCH_REASON.into()),
        checkers: outcomes,
    }
}

fn compare(sandbox: &Sandbox, checker_sql: &str, learner_sorted: &[Row]) -> CheckerOutcome {
    match query::run(sandbox, checker_sql) {
        Ok(rs) if rs.sorted_rows() == learner_sorted => CheckerOutcome::Matched,
        Ok(_) => CheckerOutcome::Mismatch,
        Err(e) => CheckerOutcome::Failed(e.to_string()),
    }
}
