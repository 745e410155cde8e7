use crate::config::EngineSettings;
use anyhow::Context;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};

/// SQLite VM instructions between deadline checks.
const PROGRESS_OPS: i32 = 1_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SandboxMode {
    /// Fresh in-memory database per request.
    #[default]
    Isolated,
    /// One database file shared by every request. Concurrent learners on the same
    /// topic can interleave seed and query.
    Shared,
}

/// The connection a single request seeds and queries through.
pub struct Sandbox {
    conn: Connection,
    timeout: Option<Duration>,
    max_rows: usize,
}

impl Sandbox {
    pub fn open(settings: &EngineSettings) -> anyhow::Result<Self> {
        let conn = match settings.sandbox {
            SandboxMode::Isolated => {
                Connection::open_in_memory().context("failed to open sandbox database")?
            }
            SandboxMode::Shared => {
                let path = settings
                    .shared_db
                    .as_ref()
                    .context("sandbox mode 'shared' requires settings.shared_db")?;
                let conn = Connection::open(path).with_context(|| {
                    format!("failed to open shared sandbox {}", path.display())
                })?;
                conn.busy_timeout(Duration::from_millis(settings.statement_timeout_ms))?;
                conn
            }
        };
        Ok(Self {
            conn,
            timeout: timeout_from_ms(settings.statement_timeout_ms),
            max_rows: settings.max_rows,
        })
    }

    /// Isolated sandbox with default limits.
    pub fn in_memory() -> anyhow::Result<Self> {
        Self::open(&EngineSettings::default())
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    pub fn timeout_ms(&self) -> Option<u64> {
        self.timeout.map(|d| d.as_millis() as u64)
    }

    /// Starts the statement deadline. The returned guard disarms it on drop.
    pub(crate) fn arm_deadline(&self) -> DeadlineGuard<'_> {
        if let Some(timeout) = self.timeout {
            let deadline = Instant::now() + timeout;
            self.conn
                .progress_handler(PROGRESS_OPS, Some(move || Instant::now() >= deadline));
        }
        DeadlineGuard { conn: &self.conn }
    }
}

pub(crate) struct DeadlineGuard<'a> {
    conn: &'a Connection,
}

impl Drop for DeadlineGuard<'_> {
    fn drop(&mut self) {
        self.conn.progress_handler(0, None::<fn() -> bool>);
    }
}

fn timeout_from_ms(ms: u64) -> Option<Duration> {
    (ms > 0).then(|| Duration::from_millis(ms))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn isolated_sandboxes_do_not_share_tables() -> anyhow::Result<()> {
        let a = Sandbox::in_memory()?;
        a.conn().execute_batch("CREATE TABLE t(id INT)")?;
        let b = Sandbox::in_memory()?;
        assert!(b.conn().execute_batch("SELECT * FROM t").is_err());
        Ok(())
    }

    #[test]
    fn shared_mode_requires_a_path() {
        let settings = EngineSettings {
            sandbox: SandboxMode::Shared,
            shared_db: None,
            ..EngineSettings::default()
        };
        assert!(Sandbox::open(&settings).is_err());
    }

    #[test]
    fn shared_mode_sees_previous_seed() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let settings = EngineSettings {
            sandbox: SandboxMode::Shared,
            shared_db: Some(dir.path().join("shared.db")),
            ..EngineSettings::default()
        };
        Sandbox::open(&settings)?
            .conn()
            .execute_batch("CREATE TABLE t(id INT); INSERT INTO t VALUES (7)")?;
        let again = Sandbox::open(&settings)?;
        let n: i64 = again.conn().query_row("SELECT id FROM t", [], |r| r.get(0))?;
        assert_eq!(n, 7);
        Ok(())
    }

    #[test]
    fn zero_timeout_disables_deadline() -> anyhow::Result<()> {
        let settings = EngineSettings {
            statement_timeout_ms: 0,
            ..EngineSettings::default()
        };
        assert_eq!(Sandbox::open(&settings)?.timeout_ms(), None);
        Ok(())
    }
}
