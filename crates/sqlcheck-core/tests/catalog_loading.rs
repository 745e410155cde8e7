use sqlcheck_core::config::{load_catalog, write_sample_catalog};
use sqlcheck_core::safety::SafetyMode;
use sqlcheck_core::sandbox::SandboxMode;
use std::io::Write;
use tempfile::NamedTempFile;

#[test]
fn catalog_version_defaults_to_zero() -> anyhow::Result<()> {
    let mut tmp = NamedTempFile::new()?;
    writeln!(
        tmp,
        r#"
topics:
  - slug: t
    title: T
    seed_sql: CREATE TABLE t(id INT);
"#
    )?;
    let cat = load_catalog(tmp.path(), true)?;
    assert_eq!(cat.version, 0);
    assert_eq!(cat.settings.safety, SafetyMode::Parsed);
    assert_eq!(cat.settings.sandbox, SandboxMode::Isolated);
    assert_eq!(cat.settings.statement_timeout_ms, 2000);
    Ok(())
}

#[test]
fn unsupported_version_is_rejected() -> anyhow::Result<()> {
    let mut tmp = NamedTempFile::new()?;
    writeln!(
        tmp,
        r#"
configVersion: 7
topics:
  - slug: t
    title: T
    seed_sql: SELECT 1
"#
    )?;
    let err = load_catalog(tmp.path(), false).unwrap_err();
    assert!(err.to_string().contains("unsupported config version 7"), "{}", err);
    Ok(())
}

#[test]
fn unknown_fields_fail_only_in_strict_mode() -> anyhow::Result<()> {
    let mut tmp = NamedTempFile::new()?;
    writeln!(
        tmp,
        r#"
topics:
  - slug: t
    title: T
    seed_sql: SELECT 1
    colour: blue
"#
    )?;
    assert!(load_catalog(tmp.path(), false).is_ok());
    let err = load_catalog(tmp.path(), true).unwrap_err();
    assert!(err.to_string().contains("colour"), "{}", err);
    Ok(())
}

#[test]
fn duplicate_question_slugs_are_rejected() -> anyhow::Result<()> {
    let mut tmp = NamedTempFile::new()?;
    writeln!(
        tmp,
        r#"
topics:
  - slug: a
    title: A
    seed_sql: SELECT 1
    questions:
      - {{ slug: q, title: Q, checker_sql: SELECT 1 }}
  - slug: b
    title: B
    seed_sql: SELECT 1
    questions:
      - {{ slug: q, title: Q again, checker_sql: SELECT 2 }}
"#
    )?;
    let err = load_catalog(tmp.path(), false).unwrap_err();
    assert!(err.to_string().contains("duplicate question slug 'q'"), "{}", err);
    Ok(())
}

#[test]
fn shared_sandbox_needs_a_database() -> anyhow::Result<()> {
    let mut tmp = NamedTempFile::new()?;
    writeln!(
        tmp,
        r#"
settings:
  sandbox: shared
topics:
  - slug: t
    title: T
    seed_sql: SELECT 1
"#
    )?;
    assert!(load_catalog(tmp.path(), false).is_err());
    Ok(())
}

#[test]
fn written_sample_loads_strictly() -> anyhow::Result<()> {
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("catalog.yaml");
    write_sample_catalog(&path)?;
    let cat = load_catalog(&path, true)?;
    assert_eq!(cat.topics[0].questions.len(), 2);
    Ok(())
}
