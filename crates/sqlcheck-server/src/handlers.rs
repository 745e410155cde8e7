//! Engine methods reachable over JSON-RPC and their parameter shapes.

use serde::Deserialize;
use serde_json::{json, Value};
use sqlcheck_core::engine::{CommitGate, Engine, ErrorResponse};

pub const METHODS: &[&str] = &["run_query", "check_answer", "show_answer"];

#[derive(Debug, Deserialize)]
pub struct RunQueryParams {
    pub topic: String,
    pub sql: String,
}

#[derive(Debug, Deserialize)]
pub struct CheckAnswerParams {
    pub question: String,
    pub sql: String,
    pub user: String,
}

#[derive(Debug, Deserialize)]
pub struct ShowAnswerParams {
    pub question: String,
}

#[derive(Debug)]
pub enum Call {
    RunQuery(RunQueryParams),
    CheckAnswer(CheckAnswerParams),
    ShowAnswer(ShowAnswerParams),
}

impl Call {
    /// Resolves an engine method. `Ok(None)` means `method` is not one of [`METHODS`].
    pub fn parse(method: &str, params: Option<&Value>) -> Result<Option<Call>, String> {
        if !METHODS.contains(&method) {
            return Ok(None);
        }
        let params = params.ok_or_else(|| "Missing params".to_string())?;
        let invalid = |e: serde_json::Error| format!("Invalid params: {}", e);
        let call = match method {
            "run_query" => Call::RunQuery(RunQueryParams::deserialize(params).map_err(invalid)?),
            "check_answer" => {
                Call::CheckAnswer(CheckAnswerParams::deserialize(params).map_err(invalid)?)
            }
            _ => Call::ShowAnswer(ShowAnswerParams::deserialize(params).map_err(invalid)?),
        };
        Ok(Some(call))
    }

    pub fn name(&self) -> &'static str {
        match self {
            Call::RunQuery(_) => "run_query",
            Call::CheckAnswer(_) => "check_answer",
            Call::ShowAnswer(_) => "show_answer",
        }
    }

    /// Slug the call is about, for logs.
    pub fn subject(&self) -> &str {
        match self {
            Call::RunQuery(p) => &p.topic,
            Call::CheckAnswer(p) => &p.question,
            Call::ShowAnswer(p) => &p.question,
        }
    }

    /// Runs the call to completion. Blocking: statements execute on the caller's thread.
    /// Progress is written only if `gate` can still be committed.
    pub fn execute(self, engine: &Engine, gate: &CommitGate) -> anyhow::Result<Value> {
        let v = match self {
            Call::RunQuery(p) => match engine.run_query(&p.topic, &p.sql) {
                Ok(out) => serde_json::to_value(out)?,
                Err(e) => serde_json::to_value(ErrorResponse::from(&e))?,
            },
            Call::CheckAnswer(p) => {
                serde_json::to_value(engine.check_answer_gated(
                &p.question,
                &p.sql,
                &p.user,
                Some(gate),
            ))?
            }
            Call::ShowAnswer(p) => match engine.show_answer(&p.question) {
                Ok(s) => serde_json::to_value(s)?,
                Err(e) => serde_json::to_value(ErrorResponse::from(&e))?,
            },
        };
        Ok(v)
    }

    /// Result body when the request budget runs out before the call finishes.
    pub fn timeout_result(&self, timeout_ms: u64) -> Value {
        let mut v = error_result("E_TIMEOUT", format!("request exceeded {}ms", timeout_ms));
        if let Call::CheckAnswer(_) = self {
            v["correct"] = json!(false);
        }
        v
    }
}

pub fn error_result(code: &str, message: String) -> Value {
    json!({ "error": message, "code": code })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_methods_are_not_calls() {
        assert!(Call::parse("tools/list", None).unwrap().is_none());
    }

    #[test]
    fn params_are_required_and_typed() {
        assert_eq!(
            Call::parse("show_answer", None).unwrap_err(),
            "Missing params"
        );
        let err = Call::parse("check_answer", Some(&json!({ "question": "q", "sql": "SELECT 1" })))
            .unwrap_err();
        assert!(err.contains("user"), "{}", err);

        let call = Call::parse(
            "run_query",
            Some(&json!({ "topic": "basics", "sql": "SELECT 1" })),
        )
        .unwrap()
        .unwrap();
        assert_eq!(call.name(), "run_query");
        assert_eq!(call.subject(), "basics");
    }

    #[test]
    fn check_timeout_is_an_incorrect_answer() {
        let call = Call::parse(
            "check_answer",
            Some(&json!({ "question": "q", "sql": "SELECT 1", "user": "ada" })),
        )
        .unwrap()
        .unwrap();
        assert_eq!(
            call.timeout_result(50),
            json!({ "correct": false, "error": "request exceeded 50ms", "code": "E_TIMEOUT" })
        );
    }
}
