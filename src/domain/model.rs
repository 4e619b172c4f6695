use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::domain::layout;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredItem {
    pub key: String,
    pub data: Vec<u8>,
}

impl StoredItem {
    pub fn new(key: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            key: key.into(),
            data: data.into(),
        }
    }
}

/// Snapshot of the canonical items held by the master, keyed and ordered by storage key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ItemSet {
    items: BTreeMap<String, Vec<u8>>,
}

impl ItemSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, data: Vec<u8>) {
        self.items.insert(key.into(), data);
    }

    pub fn get(&self, key: &str) -> Option<&[u8]> {
        self.items.get(key).map(Vec::as_slice)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|data| std::str::from_utf8(data).ok())
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Domains with a stored certificate, sorted.
    pub fn domains(&self) -> Vec<String> {
        let mut domains: Vec<String> = self
            .items
            .keys()
            .filter_map(|key| layout::certificate_domain(key))
            .map(str::to_string)
            .collect();
        domains.sort();
        domains.dedup();
        domains
    }

    pub fn into_items(self) -> Vec<StoredItem> {
        self.items
            .into_iter()
            .map(|(key, data)| StoredItem { key, data })
            .collect()
    }
}

impl FromIterator<StoredItem> for ItemSet {
    fn from_iter<I: IntoIterator<Item = StoredItem>>(iter: I) -> Self {
        let mut set = ItemSet::new();
        for item in iter {
            set.insert(item.key, item.data);
        }
        set
    }
}

/// PEM encoded key pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyPair {
    pub public_key: String,
    pub private_key: String,
}

impl KeyPair {
    pub fn new(public_key: impl Into<String>, private_key: impl Into<String>) -> Self {
        Self {
            public_key: public_key.into(),
            private_key: private_key.into(),
        }
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("public_key", &self.public_key)
            .field("private_key", &"<redacted>")
            .finish()
    }
}

/// A domain certificate together with its issuer chain and the domain key pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainCertificate {
    pub domain: String,
    pub certificate: String,
    pub issuer_chain: Vec<String>,
    pub key_pair: KeyPair,
}

impl DomainCertificate {
    pub fn chain_pem(&self) -> String {
        join_pem(self.issuer_chain.iter().map(String::as_str))
    }

    pub fn fullchain_pem(&self) -> String {
        join_pem(
            std::iter::once(self.certificate.as_str())
                .chain(self.issuer_chain.iter().map(String::as_str)),
        )
    }
}

pub fn join_pem<'a>(blocks: impl Iterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for block in blocks {
        let block = block.trim();
        if block.is_empty() {
            continue;
        }
        out.push_str(block);
        out.push('\n');
    }
    out
}

/// Splits concatenated PEM certificates into individual blocks.
pub fn split_pem_chain(pem: &str) -> Vec<String> {
    const END: &str = "-----END CERTIFICATE-----";

    let mut blocks = Vec::new();
    let mut rest = pem;
    while let Some(pos) = rest.find(END) {
        let (block, tail) = rest.split_at(pos + END.len());
        let block = block.trim();
        if !block.is_empty() {
            blocks.push(format!("{}\n", block));
        }
        rest = tail;
    }
    blocks
}
