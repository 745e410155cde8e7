use crate::errors::ConfigError;
use crate::model::{Difficulty, Question, Topic};
use crate::safety::SafetyMode;
use crate::sandbox::SandboxMode;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};

pub const SUPPORTED_CONFIG_VERSION: u32 = 1;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineSettings {
    pub safety: SafetyMode,
    pub sandbox: SandboxMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shared_db: Option<PathBuf>,
    /// Per-statement deadline. 0 disables it.
    pub statement_timeout_ms: u64,
    pub max_rows: usize,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            safety: SafetyMode::Parsed,
            sandbox: SandboxMode::Isolated,
            shared_db: None,
            statement_timeout_ms: 2000,
            max_rows: 10_000,
        }
    }
}

fn is_default_settings(s: &EngineSettings) -> bool {
    s == &EngineSettings::default()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Catalog {
    #[serde(default, rename = "configVersion", alias = "version")]
    pub version: u32,
    #[serde(default, skip_serializing_if = "is_default_settings")]
    pub settings: EngineSettings,
    pub topics: Vec<TopicSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TopicSpec {
    pub slug: String,
    pub title: String,
    #[serde(default = "default_active")]
    pub active: bool,
    pub seed_sql: String,
    #[serde(default)]
    pub questions: Vec<QuestionSpec>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionSpec {
    pub slug: String,
    pub title: String,
    #[serde(default)]
    pub prompt_md: String,
    #[serde(default)]
    pub difficulty: Difficulty,
    #[serde(default = "default_active")]
    pub active: bool,
    pub checker_sql: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed_sql_override: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub alternate_checker_sqls: Option<AlternateSqls>,
}

/// Alternates as authored: a YAML list, or raw text stored verbatim.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AlternateSqls {
    List(Vec<String>),
    Raw(String),
}

impl AlternateSqls {
    /// Storage form: a JSON array for lists, the original text otherwise.
    pub fn to_stored(&self) -> String {
        match self {
            AlternateSqls::List(list) => {
                serde_json::to_string(list).unwrap_or_else(|_| "[]".to_string())
            }
            AlternateSqls::Raw(raw) => raw.clone(),
        }
    }
}

impl TopicSpec {
    pub fn to_model(&self) -> Topic {
        Topic {
            id: 0,
            slug: self.slug.clone(),
            title: self.title.clone(),
            active: self.active,
            seed_sql: self.seed_sql.clone(),
        }
    }
}

impl QuestionSpec {
    pub fn to_model(&self) -> Question {
        Question {
            id: 0,
            topic_id: 0,
            slug: self.slug.clone(),
            title: self.title.clone(),
            prompt_md: self.prompt_md.clone(),
            seed_sql_override: self.seed_sql_override.clone(),
            checker_sql: self.checker_sql.clone(),
            alternate_checker_sqls: self.alternate_checker_sqls.as_ref().map(|a| a.to_stored()),
            difficulty: self.difficulty,
            active: self.active,
        }
    }
}

fn default_active() -> bool {
    true
}

pub fn load_catalog(path: &Path, strict: bool) -> Result<Catalog, ConfigError> {
    let raw = std::fs::read_to_string(path)
        .map_err(|e| ConfigError(format!("failed to read catalog {}: {}", path.display(), e)))?;
    parse_catalog(&raw, strict)
        .map_err(|ConfigError(msg)| ConfigError(format!("{} (file: {})", msg, path.display())))
}

pub fn parse_catalog(raw: &str, strict: bool) -> Result<Catalog, ConfigError> {
    let mut ignored_keys = HashSet::new();
    let deserializer = serde_yaml::Deserializer::from_str(raw);

    let cat: Catalog = serde_ignored::deserialize(deserializer, |path| {
        ignored_keys.insert(path.to_string());
    })
    .map_err(|e| ConfigError(format!("failed to parse YAML: {}", e)))?;

    let meaningful_unknowns: Vec<_> = ignored_keys
        .iter()
        .filter(|k| !k.starts_with('_') && !k.starts_with("x-"))
        .collect();
    if !meaningful_unknowns.is_empty() {
        if strict {
            return Err(ConfigError(format!(
                "Unknown fields detected in strict mode: {:?}",
                meaningful_unknowns
            )));
        }
        tracing::warn!(
            event = "catalog_unknown_fields",
            fields = ?meaningful_unknowns,
            "ignored unknown catalog fields"
        );
    }

    if cat.version != 0 && cat.version != SUPPORTED_CONFIG_VERSION {
        return Err(ConfigError(format!(
            "unsupported config version {} (supported: 0, {})",
            cat.version, SUPPORTED_CONFIG_VERSION
        )));
    }

    if cat.topics.is_empty() {
        return Err(ConfigError("catalog has no topics".into()));
    }

    check_unique_slugs(&cat)?;

    if cat.settings.sandbox == SandboxMode::Shared && cat.settings.shared_db.is_none() {
        return Err(ConfigError(
            "settings.sandbox is 'shared' but settings.shared_db is not set".into(),
        ));
    }

    Ok(cat)
}

fn check_unique_slugs(cat: &Catalog) -> Result<(), ConfigError> {
    let mut topics = HashSet::new();
    let mut questions = HashSet::new();
    for t in &cat.topics {
        if !topics.insert(t.slug.as_str()) {
            return Err(ConfigError(format!("duplicate topic slug '{}'", t.slug)));
        }
        for q in &t.questions {
            if !questions.insert(q.slug.as_str()) {
                return Err(ConfigError(format!(
                    "duplicate question slug '{}' (topic '{}')",
                    q.slug, t.slug
                )));
            }
        }
    }
    Ok(())
}

pub fn write_sample_catalog(path: &Path) -> Result<(), ConfigError> {
    std::fs::write(path, SAMPLE_CATALOG)
        .map_err(|e| ConfigError(format!("failed to write sample catalog: {}", e)))?;
    Ok(())
}

pub const SAMPLE_CATALOG: &str = r#"configVersion: 1
settings:
  safety: parsed
  sandbox: isolated
  statement_timeout_ms: 2000
  max_rows: 10000
topics:
  - slug: filtering
    title: Filtering rows
    seed_sql: |
      DROP TABLE IF EXISTS employees;
      CREATE TABLE employees(id INTEGER PRIMARY KEY, name TEXT, dept TEXT, salary INTEGER);
      INSERT INTO employees VALUES
        (1, 'Ada', 'eng', 120),
        (2, 'Grace', 'eng', 135),
        (3, 'Edsger', 'research', 110),
        (4, 'Barbara', 'sales', 90);
    questions:
      - slug: high-earners
        title: High earners
        difficulty: Easy
        prompt_md: List the names of employees earning more than 100.
        checker_sql: SELECT name FROM employees WHERE salary > 100
      - slug: dept-headcount
        title: Headcount per department
        difficulty: Medium
        prompt_md: Return each department with its number of employees.
        checker_sql: SELECT dept, COUNT(*) FROM employees GROUP BY dept
        alternate_checker_sqls:
          - SELECT dept, COUNT(id) FROM employees GROUP BY dept
"#;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_catalog_parses() {
        let cat = parse_catalog(SAMPLE_CATALOG, true).unwrap();
        assert_eq!(cat.version, 1);
        assert_eq!(cat.topics.len(), 1);
        let q = &cat.topics[0].questions[1];
        assert_eq!(q.difficulty, Difficulty::Medium);
        assert_eq!(
            q.alternate_checker_sqls.as_ref().map(|a| a.to_stored()),
            Some(r#"["SELECT dept, COUNT(id) FROM employees GROUP BY dept"]"#.to_string())
        );
    }

    #[test]
    fn raw_alternates_are_kept_verbatim() {
        let a: AlternateSqls = serde_yaml::from_str("'[broken'").unwrap();
        assert_eq!(a.to_stored(), "[broken");
    }
}
