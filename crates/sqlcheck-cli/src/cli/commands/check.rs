use super::{exit_codes, open_engine};
use crate::cli::args::CheckArgs;

pub fn run(args: CheckArgs) -> anyhow::Result<i32> {
    let engine = open_engine(&args.store)?;
    let resp = engine.check_answer(&args.question, &args.sql, &args.user);
    println!("{}", serde_json::to_string(&resp)?);
    if resp.correct {
        Ok(exit_codes::OK)
    } else {
        Ok(exit_codes::FAILED)
    }
}
