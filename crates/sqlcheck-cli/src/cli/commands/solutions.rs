use super::{exit_codes, open_engine};
use crate::cli::args::SolutionsArgs;

pub fn run(args: SolutionsArgs) -> anyhow::Result<i32> {
    let engine = open_engine(&args.store)?;
    match engine.show_answer(&args.question) {
        Ok(resp) => {
            print!("{}", resp.solutions);
            Ok(exit_codes::OK)
        }
        Err(e) => {
            eprintln!("error: {}", e);
            Ok(exit_codes::FAILED)
        }
    }
}
