use crate::storage::store::Store;

/// Records the outcome of a judged submission.
///
/// Only a correct judgment touches the store: the (user, question) record is created
/// on first success and refreshed afterwards. Incorrect or errored submissions are
/// never persisted, so a solved question stays solved.
pub fn record(store: &Store, user_id: i64, question_id: i64, correct: bool) -> anyhow::Result<bool> {
    if !correct {
        return Ok(false);
    }
    store.record_progress(user_id, question_id)?;
    tracing::debug!(event = "progress_recorded", user_id, question_id);
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{parse_catalog, SAMPLE_CATALOG};

    fn setup() -> (Store, i64, i64) {
        let store = Store::memory().unwrap();
        store.init_schema().unwrap();
        store
            .import_catalog(&parse_catalog(SAMPLE_CATALOG, true).unwrap())
            .unwrap();
        let (_, q) = store.question_by_slug("high-earners").unwrap().unwrap();
        let uid = store.ensure_user("ada").unwrap();
        (store, uid, q.id)
    }

    #[test]
    fn incorrect_outcome_creates_nothing() {
        let (store, uid, qid) = setup();
        assert!(!record(&store, uid, qid, false).unwrap());
        assert!(store.get_progress(uid, qid).unwrap().is_none());
    }

    #[test]
    fn completion_is_monotonic() {
        let (store, uid, qid) = setup();
        assert!(record(&store, uid, qid, true).unwrap());
        let first = store.get_progress(uid, qid).unwrap().unwrap();
        assert!(first.completed);

        record(&store, uid, qid, false).unwrap();
        let after = store.get_progress(uid, qid).unwrap().unwrap();
        assert!(after.completed);
        assert_eq!(after.last_attempted, first.last_attempted);

        record(&store, uid, qid, true).unwrap();
        let again = store.get_progress(uid, qid).unwrap().unwrap();
        assert!(again.completed);
        assert!(again.last_attempted >= first.last_attempted);
    }
}
