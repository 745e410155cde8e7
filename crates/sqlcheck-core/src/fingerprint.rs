use sha2::{Digest, Sha256};

pub fn sha256_hex(s: &str) -> String {
    let mut h = Sha256::new();
    h.update(s.as_bytes());
    hex::encode(h.finalize())
}

/// Short, log-safe identifier for a submission.
///
/// Whitespace runs are collapsed so reformatting a query does not change it.
pub fn submission(sql: &str) -> String {
    let canonical = sql.split_whitespace().collect::<Vec<_>>().join(" ");
    sha256_hex(&canonical)[..16].to_string()
}
