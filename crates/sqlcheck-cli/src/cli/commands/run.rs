use super::{exit_codes, open_engine};
use crate::cli::args::RunArgs;
use sqlcheck_core::engine::{ErrorResponse, QueryOutput};

pub fn run(args: RunArgs) -> anyhow::Result<i32> {
    let engine = open_engine(&args.store)?;

    match engine.run_query(&args.topic, &args.sql) {
        Ok(out) => {
            if args.format == "json" {
                println!("{}", serde_json::to_string(&out)?);
            } else {
                print!("{}", render_table(&out));
            }
            Ok(exit_codes::OK)
        }
        Err(e) => {
            if args.format == "json" {
                println!("{}", serde_json::to_string(&ErrorResponse::from(&e))?);
            } else {
                eprintln!("error: {}", e);
            }
            Ok(exit_codes::FAILED)
        }
    }
}

fn render_table(out: &QueryOutput) -> String {
    let mut s = out.columns.join("\t");
    s.push('\n');
    for row in &out.rows {
        let cells: Vec<String> = row.iter().map(|c| c.to_string()).collect();
        s.push_str(&cells.join("\t"));
        s.push('\n');
    }
    s.push_str(&format!("({} rows)\n", out.row_count));
    s
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlcheck_core::query::Cell;

    #[test]
    fn table_is_tab_separated() {
        let out = QueryOutput {
            columns: vec!["id".into(), "name".into()],
            rows: vec![vec![Cell::Integer(1), Cell::Null]],
            row_count: 1,
        };
        assert_eq!(render_table(&out), "id\tname\n1\tNULL\n(1 rows)\n");
    }
}
