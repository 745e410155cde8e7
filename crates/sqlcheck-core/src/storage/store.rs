use crate::config::{Catalog, EngineSettings, QuestionSpec, TopicSpec};
use crate::model::{Difficulty, Progress, Question, Topic};
use anyhow::Context;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

/// Persisted content (topics, questions) and learner progress.
#[derive(Clone)]
pub struct Store {
    pub conn: Arc<Mutex<Connection>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub topics: usize,
    pub questions: usize,
}

pub struct StoreStats {
    pub topics: Option<u64>,
    pub questions: Option<u64>,
    pub users: Option<u64>,
    pub completed: Option<u64>,
}

const QUESTION_COLUMNS: &str = "q.id, q.topic_id, q.slug, q.title, q.prompt_md, \
     q.seed_sql_override, q.checker_sql, q.alternate_checker_sqls, q.difficulty, q.is_active";

const TOPIC_COLUMNS: &str = "t.id, t.slug, t.title, t.is_active, t.seed_sql";

impl Store {
    pub fn open(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("failed to open sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn memory() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory sqlite db")?;
        conn.execute("PRAGMA foreign_keys = ON", [])?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn lock(&self) -> anyhow::Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| anyhow::anyhow!("store connection mutex poisoned"))
    }

    pub fn init_schema(&self) -> anyhow::Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(crate::storage::schema::DDL)?;
        Ok(())
    }

    // content

    /// Loads every topic and question of `catalog`, updating rows whose slug exists.
    /// The catalog's engine settings replace any previously stored ones.
    pub fn import_catalog(&self, catalog: &Catalog) -> anyhow::Result<ImportSummary> {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        Self::put_settings(&tx, &catalog.settings)?;
        let mut summary = ImportSummary::default();
        for topic in &catalog.topics {
            let topic_id = Self::upsert_topic(&tx, topic)?;
            summary.topics += 1;
            for q in &topic.questions {
                Self::upsert_question(&tx, topic_id, q)?;
                summary.questions += 1;
            }
        }
        tx.commit()?;
        Ok(summary)
    }

    fn put_settings(conn: &Connection, settings: &EngineSettings) -> anyhow::Result<()> {
        let json = serde_json::to_string(settings)?;
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
        conn.execute(
            "INSERT INTO settings(id, engine_json, updated_at) VALUES (1, ?1, ?2)
             ON CONFLICT(id) DO UPDATE SET
                engine_json=excluded.engine_json,
                updated_at=excluded.updated_at",
            params![json, now],
        )
        .context("store engine settings")?;
        Ok(())
    }

    /// Engine settings from the last import, if any.
    pub fn load_settings(&self) -> anyhow::Result<Option<EngineSettings>> {
        let conn = self.lock()?;
        let json: Option<String> = conn
            .query_row("SELECT engine_json FROM settings WHERE id = 1", [], |r| {
                r.get(0)
            })
            .optional()?;
        json.map(|j| serde_json::from_str(&j).context("stored engine settings are corrupt"))
            .transpose()
    }

    fn upsert_topic(conn: &Connection, t: &TopicSpec) -> anyhow::Result<i64> {
        conn.execute(
            "INSERT INTO topics(slug, title, is_active, seed_sql) VALUES (?1, ?2, ?3, ?4)
             ON CONFLICT(slug) DO UPDATE SET
                title=excluded.title,
                is_active=excluded.is_active,
                seed_sql=excluded.seed_sql",
            params![t.slug, t.title, t.active, t.seed_sql],
        )
        .with_context(|| format!("upsert topic '{}'", t.slug))?;
        let id = conn.query_row(
            "SELECT id FROM topics WHERE slug = ?1",
            params![t.slug],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    fn upsert_question(conn: &Connection, topic_id: i64, q: &QuestionSpec) -> anyhow::Result<i64> {
        conn.execute(
            "INSERT INTO questions(topic_id, slug, title, prompt_md, seed_sql_override,
                                   checker_sql, alternate_checker_sqls, difficulty, is_active)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)
             ON CONFLICT(slug) DO UPDATE SET
                topic_id=excluded.topic_id,
                title=excluded.title,
                prompt_md=excluded.prompt_md,
                seed_sql_override=excluded.seed_sql_override,
                checker_sql=excluded.checker_sql,
                alternate_checker_sqls=excluded.alternate_checker_sqls,
                difficulty=excluded.difficulty,
                is_active=excluded.is_active",
            params![
                topic_id,
                q.slug,
                q.title,
                q.prompt_md,
                q.seed_sql_override,
                q.checker_sql,
                q.alternate_checker_sqls.as_ref().map(|a| a.to_stored()),
                q.difficulty.as_str(),
                q.active
            ],
        )
        .with_context(|| format!("upsert question '{}'", q.slug))?;
        let id = conn.query_row(
            "SELECT id FROM questions WHERE slug = ?1",
            params![q.slug],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    /// Active topic by slug.
    pub fn topic_by_slug(&self, slug: &str) -> anyhow::Result<Option<Topic>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM topics t WHERE t.slug = ?1 AND t.is_active = 1",
            TOPIC_COLUMNS
        );
        let topic = conn
            .query_row(&sql, params![slug], |row| topic_from_row(row, 0))
            .optional()?;
        Ok(topic)
    }

    /// Active question by slug, together with the topic that owns it.
    pub fn question_by_slug(&self, slug: &str) -> anyhow::Result<Option<(Topic, Question)>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {}, {} FROM questions q JOIN topics t ON q.topic_id = t.id
             WHERE q.slug = ?1 AND q.is_active = 1",
            QUESTION_COLUMNS, TOPIC_COLUMNS
        );
        let found = conn
            .query_row(&sql, params![slug], |row| {
                Ok((topic_from_row(row, 10)?, question_from_row(row)?))
            })
            .optional()?;
        Ok(found)
    }

    /// Active questions of a topic, easiest first.
    pub fn questions_for_topic(&self, topic_id: i64) -> anyhow::Result<Vec<Question>> {
        let conn = self.lock()?;
        let sql = format!(
            "SELECT {} FROM questions q WHERE q.topic_id = ?1 AND q.is_active = 1
             ORDER BY CASE q.difficulty WHEN 'Easy' THEN 0 WHEN 'Medium' THEN 1 ELSE 2 END, q.title",
            QUESTION_COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![topic_id], question_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    pub fn delete_topic(&self, slug: &str) -> anyhow::Result<bool> {
        let conn = self.lock()?;
        let n = conn.execute("DELETE FROM topics WHERE slug = ?1", params![slug])?;
        Ok(n > 0)
    }

    // users

    pub fn ensure_user(&self, username: &str) -> anyhow::Result<i64> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO users(username) VALUES (?1) ON CONFLICT(username) DO NOTHING",
            params![username],
        )?;
        let id = conn.query_row(
            "SELECT id FROM users WHERE username = ?1",
            params![username],
            |r| r.get(0),
        )?;
        Ok(id)
    }

    pub fn find_user(&self, username: &str) -> anyhow::Result<Option<i64>> {
        let conn = self.lock()?;
        let id = conn
            .query_row(
                "SELECT id FROM users WHERE username = ?1",
                params![username],
                |r| r.get(0),
            )
            .optional()?;
        Ok(id)
    }

    pub fn delete_user(&self, username: &str) -> anyhow::Result<bool> {
        let conn = self.lock()?;
        let n = conn.execute("DELETE FROM users WHERE username = ?1", params![username])?;
        Ok(n > 0)
    }

    // progress

    /// Marks (user, question) completed, creating the record on first success.
    /// Never clears `completed`.
    pub fn record_progress(&self, user_id: i64, question_id: i64) -> anyhow::Result<()> {
        let conn = self.lock()?;
        let now = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Micros, true);
        conn.execute(
            "INSERT INTO progress(user_id, question_id, completed, last_attempted)
             VALUES (?1, ?2, 1, ?3)
             ON CONFLICT(user_id, question_id) DO UPDATE SET
                completed=1,
                last_attempted=excluded.last_attempted",
            params![user_id, question_id, now],
        )
        .context("record progress")?;
        Ok(())
    }

    pub fn get_progress(&self, user_id: i64, question_id: i64) -> anyhow::Result<Option<Progress>> {
        let conn = self.lock()?;
        let p = conn
            .query_row(
                "SELECT user_id, question_id, completed, last_attempted FROM progress
                 WHERE user_id = ?1 AND question_id = ?2",
                params![user_id, question_id],
                |r| {
                    Ok(Progress {
                        user_id: r.get(0)?,
                        question_id: r.get(1)?,
                        completed: r.get(2)?,
                        last_attempted: r.get(3)?,
                    })
                },
            )
            .optional()?;
        Ok(p)
    }

    #[cfg(test)]
    pub fn count_rows(&self, table: &str) -> anyhow::Result<i64> {
        let conn = self.lock()?;
        if !["topics", "questions", "users", "progress"].contains(&table) {
            anyhow::bail!("Invalid table name for count_rows: {}", table);
        }
        let sql = format!("SELECT COUNT(*) FROM {}", table);
        let n: i64 = conn.query_row(&sql, [], |r| r.get(0))?;
        Ok(n)
    }

    pub fn stats_best_effort(&self) -> anyhow::Result<StoreStats> {
        let conn = self.lock()?;
        let count = |sql: &str| -> Option<u64> {
            conn.query_row(sql, [], |r| r.get::<_, i64>(0).map(|x| x as u64))
                .ok()
        };
        Ok(StoreStats {
            topics: count("SELECT COUNT(*) FROM topics"),
            questions: count("SELECT COUNT(*) FROM questions"),
            users: count("SELECT COUNT(*) FROM users"),
            completed: count("SELECT COUNT(*) FROM progress WHERE completed = 1"),
        })
    }
}

fn topic_from_row(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Topic> {
    Ok(Topic {
        id: row.get(offset)?,
        slug: row.get(offset + 1)?,
        title: row.get(offset + 2)?,
        active: row.get(offset + 3)?,
        seed_sql: row.get(offset + 4)?,
    })
}

fn question_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Question> {
    Ok(Question {
        id: row.get(0)?,
        topic_id: row.get(1)?,
        slug: row.get(2)?,
        title: row.get(3)?,
        prompt_md: row.get(4)?,
        seed_sql_override: row.get(5)?,
        checker_sql: row.get(6)?,
        alternate_checker_sqls: row.get(7)?,
        difficulty: Difficulty::parse(&row.get::<_, String>(8)?),
        active: row.get(9)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::parse_catalog;

    fn store() -> Store {
        let s = Store::memory().unwrap();
        s.init_schema().unwrap();
        s.import_catalog(&parse_catalog(crate::config::SAMPLE_CATALOG, true).unwrap())
            .unwrap();
        s
    }

    #[test]
    fn import_is_repeatable() {
        let s = store();
        let cat = parse_catalog(crate::config::SAMPLE_CATALOG, true).unwrap();
        let summary = s.import_catalog(&cat).unwrap();
        assert_eq!(summary, ImportSummary { topics: 1, questions: 2 });
        assert_eq!(s.count_rows("questions").unwrap(), 2);
    }

    #[test]
    fn import_persists_engine_settings() {
        let s = Store::memory().unwrap();
        s.init_schema().unwrap();
        assert_eq!(s.load_settings().unwrap(), None);

        let mut cat = parse_catalog(crate::config::SAMPLE_CATALOG, true).unwrap();
        cat.settings.safety = crate::safety::SafetyMode::DenyList;
        cat.settings.max_rows = 5;
        s.import_catalog(&cat).unwrap();
        let stored = s.load_settings().unwrap().unwrap();
        assert_eq!(stored, cat.settings);

        cat.settings = EngineSettings::default();
        s.import_catalog(&cat).unwrap();
        assert_eq!(s.load_settings().unwrap(), Some(EngineSettings::default()));
    }

    #[test]
    fn question_lookup_carries_topic() {
        let s = store();
        let (topic, q) = s.question_by_slug("dept-headcount").unwrap().unwrap();
        assert_eq!(topic.slug, "filtering");
        assert_eq!(q.topic_id, topic.id);
        assert_eq!(q.difficulty, Difficulty::Medium);
        assert_eq!(q.checker_sqls().len(), 2);
        assert!(s.question_by_slug("nope").unwrap().is_none());
    }

    #[test]
    fn questions_are_listed_easiest_first() {
        let s = store();
        let topic = s.topic_by_slug("filtering").unwrap().unwrap();
        let qs = s.questions_for_topic(topic.id).unwrap();
        assert_eq!(qs[0].slug, "high-earners");
        assert_eq!(qs[1].slug, "dept-headcount");
    }

    #[test]
    fn progress_unique_per_user_and_question() {
        let s = store();
        let (_, q) = s.question_by_slug("high-earners").unwrap().unwrap();
        let uid = s.ensure_user("sam").unwrap();
        assert_eq!(s.ensure_user("sam").unwrap(), uid);
        s.record_progress(uid, q.id).unwrap();
        s.record_progress(uid, q.id).unwrap();
        assert_eq!(s.count_rows("progress").unwrap(), 1);
        assert!(s.get_progress(uid, q.id).unwrap().unwrap().completed);
    }

    #[test]
    fn deletes_cascade_to_progress() {
        let s = store();
        let (_, q) = s.question_by_slug("high-earners").unwrap().unwrap();
        let uid = s.ensure_user("sam").unwrap();
        s.record_progress(uid, q.id).unwrap();
        assert!(s.delete_user("sam").unwrap());
        assert_eq!(s.count_rows("progress").unwrap(), 0);

        let uid = s.ensure_user("kim").unwrap();
        s.record_progress(uid, q.id).unwrap();
        assert!(s.delete_topic("filtering").unwrap());
        assert_eq!(s.count_rows("questions").unwrap(), 0);
        assert_eq!(s.count_rows("progress").unwrap(), 0);
    }

    #[test]
    fn count_rows_rejects_unknown_tables() {
        assert!(store().count_rows("sqlite_master").is_err());
    }
}
