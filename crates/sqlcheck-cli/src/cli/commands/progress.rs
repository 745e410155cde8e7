use super::{exit_codes, open_store};
use crate::cli::args::ProgressArgs;
use serde_json::{json, Value};
use sqlcheck_core::model::Question;
use sqlcheck_core::storage::store::Store;

pub fn run(args: ProgressArgs) -> anyhow::Result<i32> {
    let store = open_store(&args.db)?;
    let user_id = store.find_user(&args.user)?;

    let questions = match (&args.question, &args.topic) {
        (Some(slug), _) => match store.question_by_slug(slug)? {
            Some((_, q)) => vec![q],
            None => {
                eprintln!("error: question '{}' not found", slug);
                return Ok(exit_codes::FAILED);
            }
        },
        (None, Some(slug)) => match store.topic_by_slug(slug)? {
            Some(t) => store.questions_for_topic(t.id)?,
            None => {
                eprintln!("error: topic '{}' not found", slug);
                return Ok(exit_codes::FAILED);
            }
        },
        (None, None) => anyhow::bail!("either --question or --topic is required"),
    };

    for q in &questions {
        let line = record_json(&store, &args.user, user_id, q)?;
        println!("{}", serde_json::to_string(&line)?);
    }
    Ok(exit_codes::OK)
}

fn record_json(
    store: &Store,
    user: &str,
    user_id: Option<i64>,
    question: &Question,
) -> anyhow::Result<Value> {
    let record = match user_id {
        Some(uid) => store.get_progress(uid, question.id)?,
        None => None,
    };
    Ok(match record {
        Some(p) => json!({
            "user": user,
            "question": question.slug,
            "difficulty": question.difficulty.as_str(),
            "completed": p.completed,
            "last_attempted": p.last_attempted,
        }),
        None => json!({
            "user": user,
            "question": question.slug,
            "difficulty": question.difficulty.as_str(),
            "completed": false,
        }),
    })
}
