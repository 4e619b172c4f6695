//! Storage keys for key material on the master.
//!
//! Every key on the master is canonical unless it is derived: a backup
//! generation, a hidden in-flight upload, or a formatter output.

use chrono::{DateTime, Utc};

pub const ACCOUNT_PREFIX: &str = "account/";
pub const CERTS_PREFIX: &str = "certs/";
pub const BACKUP_SUFFIX: &str = ".bak";

pub fn account_private_key() -> String {
    format!("{}key.private.pem", ACCOUNT_PREFIX)
}

pub fn account_public_key() -> String {
    format!("{}key.public.pem", ACCOUNT_PREFIX)
}

pub fn domain_certificate(domain: &str) -> String {
    format!("{}{}/public/cert.pem", CERTS_PREFIX, domain)
}

pub fn domain_chain(domain: &str) -> String {
    format!("{}{}/public/chain.pem", CERTS_PREFIX, domain)
}

pub fn domain_fullchain(domain: &str) -> String {
    format!("{}{}/public/fullchain.pem", CERTS_PREFIX, domain)
}

pub fn domain_private_key(domain: &str) -> String {
    format!("{}{}/private/key.private.pem", CERTS_PREFIX, domain)
}

pub fn domain_public_key(domain: &str) -> String {
    format!("{}{}/private/key.public.pem", CERTS_PREFIX, domain)
}

/// Domain owning a `certs/<domain>/public/cert.pem` key.
pub fn certificate_domain(key: &str) -> Option<&str> {
    key.strip_prefix(CERTS_PREFIX)?
        .strip_suffix("/public/cert.pem")
        .filter(|domain| !domain.is_empty() && !domain.contains('/'))
}

pub fn is_backup(key: &str) -> bool {
    key.ends_with(BACKUP_SUFFIX)
}

/// Temp files and `.part` uploads; no backend lists them as regular keys.
pub fn is_hidden(key: &str) -> bool {
    key.split('/').any(|segment| segment.starts_with('.'))
}

/// Whether `key` is source material rather than something derived from it.
/// `output_prefixes` are the prefixes formatters write under (`nginxproxy/`).
pub fn is_canonical<S: AsRef<str>>(key: &str, output_prefixes: &[S]) -> bool {
    !is_backup(key)
        && !is_hidden(key)
        && !output_prefixes
            .iter()
            .any(|prefix| key.starts_with(prefix.as_ref()))
}

/// `<key>.<YYYYMMDDTHHMMSS.ffffffZ>.bak`; lexicographic order is chronological.
pub fn backup_key(key: &str, at: DateTime<Utc>) -> String {
    format!("{}.{}{}", key, at.format("%Y%m%dT%H%M%S%.6fZ"), BACKUP_SUFFIX)
}

/// Same generation stamp with a `-N` disambiguator, for rotations within one microsecond.
pub fn backup_key_with_counter(key: &str, at: DateTime<Utc>, counter: u32) -> String {
    format!(
        "{}.{}-{}{}",
        key,
        at.format("%Y%m%dT%H%M%S%.6fZ"),
        counter,
        BACKUP_SUFFIX
    )
}

/// Whether `candidate` is a backup generation of `key`.
pub fn is_backup_of(key: &str, candidate: &str) -> bool {
    backup_generation(key, candidate).is_some()
}

/// `(timestamp, counter)` of a backup generation of `key`; sorts chronologically.
pub fn backup_generation<'a>(key: &str, candidate: &'a str) -> Option<(&'a str, u32)> {
    let stamp = candidate
        .strip_prefix(key)?
        .strip_prefix('.')?
        .strip_suffix(BACKUP_SUFFIX)?;
    let (base, counter) = match stamp.split_once('-') {
        Some((base, counter)) => (base, counter.parse().ok()?),
        None => (stamp, 0),
    };
    // 20261016T112233.123456Z
    let valid = base.len() == 23
        && base.ends_with('Z')
        && base.as_bytes()[8] == b'T'
        && base.as_bytes()[15] == b'.';
    valid.then_some((base, counter))
}

/// Parent "directory" of a key, used as the list prefix for backups.
pub fn parent_prefix(key: &str) -> &str {
    match key.rfind('/') {
        Some(pos) => &key[..=pos],
        None => "",
    }
}
