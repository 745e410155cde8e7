use super::exit_codes;
use crate::cli::args::ValidateArgs;
use serde_json::json;
use sqlcheck_core::config::load_catalog;
use sqlcheck_core::validate::{validate_catalog, ValidateReport};

pub fn run(args: ValidateArgs) -> anyhow::Result<i32> {
    let catalog = match load_catalog(&args.config, args.strict) {
        Ok(c) => c,
        Err(e) => {
            if args.format == "json" {
                let out = json!({
                    "ok": false,
                    "error": { "code": "E_CFG_PARSE", "message": e.to_string() }
                });
                println!("{}", serde_json::to_string_pretty(&out)?);
            } else {
                eprintln!("config error: {}", e);
            }
            return Ok(exit_codes::CONFIG_ERROR);
        }
    };

    let report = validate_catalog(&catalog)?;
    print_report(&report, &args.format)?;

    // Any finding fails validation, warnings included.
    if report.findings.is_empty() {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::FAILED)
    }
}

fn print_report(report: &ValidateReport, format: &str) -> anyhow::Result<()> {
    if format == "json" {
        let (errors, warnings): (Vec<_>, Vec<_>) =
            report.findings.iter().partition(|f| f.is_error());
        let out = json!({
            "ok": !report.has_errors(),
            "questions": report.questions,
            "errors": errors,
            "warnings": warnings,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    for f in &report.findings {
        let checker = f
            .checker
            .map(|i| format!(" checker #{}", i))
            .unwrap_or_default();
        eprintln!(
            "[{}] {}/{}{}: {}",
            f.code, f.topic, f.question, checker, f.message
        );
    }
    eprintln!(
        "Checked {} questions: {} findings",
        report.questions,
        report.findings.len()
    );
    Ok(())
}
