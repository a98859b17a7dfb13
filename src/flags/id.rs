//! Deterministic flag identifiers
//!
//! `flag_id = "{rule_id}:{first 16 hex of sha256(rule_id ␟ entity_id ␟ scope)}"`.
//! A reopened flag hashes its predecessor's id instead, so the chain of
//! ids is reproducible from the first one.

use sha2::{Digest, Sha256};

use crate::provenance::hex;

const SEPARATOR: u8 = 0x1f;
const ID_HEX_CHARS: usize = 16;

fn digest(parts: &[&str]) -> String {
    let mut hasher = Sha256::new();
    for (i, part) in parts.iter().enumerate() {
        if i > 0 {
            hasher.update([SEPARATOR]);
        }
        hasher.update(part.as_bytes());
    }
    let full = hex(&hasher.finalize());
    full[..ID_HEX_CHARS].to_string()
}

pub fn flag_id(rule_id: &str, entity_id: &str, scope: &str) -> String {
    format!("{}:{}", rule_id, digest(&[rule_id, entity_id, scope]))
}

/// Id for the flag that reopens `prior_flag_id`
pub fn successor_id(rule_id: &str, prior_flag_id: &str) -> String {
    format!("{}:{}", rule_id, digest(&["reopen", prior_flag_id]))
}
