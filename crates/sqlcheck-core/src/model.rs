use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Topic {
    #[serde(default)]
    pub id: i64,
    pub slug: String,
    pub title: String,
    #[serde(default = "default_active")]
    pub active: bool,
    /// Script that (re)creates the topic's tables. Re-applied on every attempt.
    pub seed_sql: String,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub enum Difficulty {
    #[default]
    Easy,
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    pub fn parse(s: &str) -> Self {
        match s {
            "Medium" => Difficulty::Medium,
            "Hard" => Difficulty::Hard,
            _ => Difficulty::Easy,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    #[serde(default)]
    pub id: i64,
    #[serde(default)]
    pub topic_id: i64,
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub prompt_md: String,
    #[serde(default)]
    pub seed_sql_override: Option<String>,
    pub checker_sql: String,
    /// Serialized JSON list of alternate checker queries, kept as authored.
    #[serde(default)]
    pub alternate_checker_sqls: Option<String>,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default = "default_active")]
    pub active: bool,
}

impl Question {
    /// Seed script used when judging this question.
    pub fn effective_seed<'a>(&'a self, topic: &'a Topic) -> &'a str {
        match self.seed_sql_override.as_deref() {
            Some(s) if !s.trim().is_empty() => s,
            _ => &topic.seed_sql,
        }
    }

    /// Alternates as a list. Unparseable text counts as no alternates.
    pub fn alternate_checkers(&self) -> Vec<String> {
        let Some(raw) = self.alternate_checker_sqls.as_deref() else {
            return Vec::new();
        };
        if raw.trim().is_empty() {
            return Vec::new();
        }
        match serde_json::from_str::<Vec<String>>(raw) {
            Ok(list) => list,
            Err(e) => {
                tracing::warn!(
                    event = "alternates_unparseable",
                    question = %self.slug,
                    error = %e,
                    "ignoring malformed alternate_checker_sqls"
                );
                Vec::new()
            }
        }
    }

    /// `[checker_sql] + alternates`, in the order they are tried.
    pub fn checker_sqls(&self) -> Vec<String> {
        let mut out = vec![self.checker_sql.clone()];
        out.extend(self.alternate_checkers());
        out
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Progress {
    pub user_id: i64,
    pub question_id: i64,
    pub completed: bool,
    pub last_attempted: String,
}

fn default_active() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(alternates: Option<&str>) -> Question {
        Question {
            id: 1,
            topic_id: 1,
            slug: "q".into(),
            title: "Q".into(),
            prompt_md: String::new(),
            seed_sql_override: None,
            checker_sql: "SELECT 1".into(),
            alternate_checker_sqls: alternates.map(str::to_string),
            difficulty: Difficulty::Easy,
            active: true,
        }
    }

    #[test]
    fn checker_order_is_primary_then_alternates() {
        let q = question(Some(r#"["SELECT 2", "SELECT 3"]"#));
        assert_eq!(q.checker_sqls(), vec!["SELECT 1", "SELECT 2", "SELECT 3"]);
    }

    #[test]
    fn malformed_alternates_are_empty() {
        let q = question(Some("[not json"));
        assert!(q.alternate_checkers().is_empty());
        assert_eq!(q.checker_sqls(), vec!["SELECT 1"]);
    }

    #[test]
    fn override_wins_over_topic_seed() {
        let topic = Topic {
            id: 1,
            slug: "t".into(),
            title: "T".into(),
            active: true,
            seed_sql: "CREATE TABLE a(x INT)".into(),
        };
        let mut q = question(None);
        assert_eq!(q.effective_seed(&topic), "CREATE TABLE a(x INT)");
        q.seed_sql_override = Some("CREATE TABLE b(y INT)".into());
        assert_eq!(q.effective_seed(&topic), "CREATE TABLE b(y INT)");
    }

    #[test]
    fn difficulty_orders_easy_first() {
        assert!(Difficulty::Easy < Difficulty::Medium);
        assert!(Difficulty::Medium < Difficulty::Hard);
        assert_eq!(Difficulty::parse("Hard"), Difficulty::Hard);
        assert_eq!(Difficulty::parse("unknown"), Difficulty::Easy);
    }
}
