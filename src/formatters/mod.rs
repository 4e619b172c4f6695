// Output formatters: derived layouts written next to the canonical items.

pub mod nginx_proxy;

pub use nginx_proxy::NginxProxyFormatter;

use crate::domain::ports::Formatter;
use crate::utils::error::{Result, StorageError};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FormatterKind {
    NginxProxy,
}

impl FormatterKind {
    pub const ALL: [FormatterKind; 1] = [FormatterKind::NginxProxy];

    pub fn as_str(&self) -> &'static str {
        match self {
            FormatterKind::NginxProxy => "nginxproxy",
        }
    }

    pub fn supported() -> String {
        Self::ALL
            .iter()
            .map(FormatterKind::as_str)
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn output_prefix(&self) -> String {
        format!("{}/", self.as_str())
    }
}

impl FromStr for FormatterKind {
    type Err = StorageError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| StorageError::UnsupportedFormatterError {
                name: s.to_string(),
                supported: Self::supported(),
            })
    }
}

impl fmt::Display for FormatterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Every call returns a fresh instance.
pub struct FormatterFactory;

impl FormatterFactory {
    pub fn create(kind: FormatterKind) -> Box<dyn Formatter> {
        match kind {
            FormatterKind::NginxProxy => Box::new(NginxProxyFormatter::new()),
        }
    }

    pub fn from_name(name: &str) -> Result<Box<dyn Formatter>> {
        Ok(Self::create(name.parse()?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolves_registered_names() {
        let formatter = FormatterFactory::from_name("nginxproxy").unwrap();
        assert_eq!(formatter.name(), "nginxproxy");
    }

    #[test]
    fn test_registered_prefix_matches_instance() {
        for kind in FormatterKind::ALL {
            assert_eq!(
                FormatterFactory::create(kind).output_prefix(),
                kind.output_prefix()
            );
        }
        assert_eq!(FormatterKind::NginxProxy.output_prefix(), nginx_proxy::OUTPUT_PREFIX);
    }

    #[test]
    fn test_unknown_name_lists_supported_set() {
        let err = FormatterFactory::from_name("haproxy").err().unwrap();
        assert_eq!(
            err.to_string(),
            "Type of formatter \"haproxy\" is not supported (supported: nginxproxy)"
        );
        match err {
            StorageError::UnsupportedFormatterError { name, supported } => {
                assert_eq!(name, "haproxy");
                assert_eq!(supported, FormatterKind::supported());
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
