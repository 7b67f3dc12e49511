//! Attribute schema consulted by the filter normalizer.

use std::collections::HashMap;

use tracing::debug;

use crate::config::{AttributeConfig, NormalizerKind, SchemaConfig};
use crate::error::NormalizationError;

/// What the filter visitor needs to know about attributes.
pub trait SchemaCapability {
    /// Whether `attribute` (name, alias or OID) is known.
    fn is_defined(&self, attribute: &str) -> bool;

    fn normalize_by_name(&self, attribute: &str, value: &[u8]) -> Result<Vec<u8>, NormalizationError>;

    fn normalize_by_oid(&self, oid: &str, value: &[u8]) -> Result<Vec<u8>, NormalizationError>;
}

#[derive(Debug, Clone)]
struct AttributeDef {
    name: String,
    normalizer: NormalizerKind,
}

/// Schema built from configuration. Names and aliases match case-insensitively
/// and attribute options (`cn;lang-en`) are ignored for lookup.
#[derive(Debug, Clone, Default)]
pub struct StaticSchema {
    by_name: HashMap<String, usize>,
    by_oid: HashMap<String, usize>,
    attributes: Vec<AttributeDef>,
}

fn base_name(attribute: &str) -> String {
    attribute
        .split(';')
        .next()
        .unwrap_or(attribute)
        .to_ascii_lowercase()
}

impl StaticSchema {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_config(config: &SchemaConfig) -> Self {
        let mut schema = Self::new();
        for attr in &config.attributes {
            schema.add(attr);
        }
        debug!("Schema loaded with {} attribute types", schema.len());
        schema
    }

    /// A handful of common RFC 4519 / RFC 2307 attribute types.
    pub fn standard() -> Self {
        let defs: [(&str, &str, &[&str], NormalizerKind); 12] = [
            ("objectClass", "2.5.4.0", &[], NormalizerKind::CaseIgnore),
            ("cn", "2.5.4.3", &["commonName"], NormalizerKind::CaseIgnore),
            ("sn", "2.5.4.4", &["surname"], NormalizerKind::CaseIgnore),
            ("ou", "2.5.4.11", &["organizationalUnitName"], NormalizerKind::CaseIgnore),
            ("o", "2.5.4.10", &["organizationName"], NormalizerKind::CaseIgnore),
            ("givenName", "2.5.4.42", &[], NormalizerKind::CaseIgnore),
            ("telephoneNumber", "2.5.4.20", &[], NormalizerKind::Numeric),
            ("uid", "0.9.2342.19200300.100.1.1", &["userid"], NormalizerKind::CaseIgnore),
            ("mail", "0.9.2342.19200300.100.1.3", &["rfc822Mailbox"], NormalizerKind::CaseIgnore),
            ("uidNumber", "1.3.6.1.1.1.1.0", &[], NormalizerKind::Integer),
            ("gidNumber", "1.3.6.1.1.1.1.1", &[], NormalizerKind::Integer),
            ("userPassword", "2.5.4.35", &[], NormalizerKind::Octet),
        ];
        let mut schema = Self::new();
        for (name, oid, aliases, normalizer) in defs {
            schema.add(&AttributeConfig {
                name: name.to_string(),
                oid: Some(oid.to_string()),
                aliases: aliases.iter().map(|a| a.to_string()).collect(),
                normalizer,
            });
        }
        schema
    }

    pub fn add(&mut self, attr: &AttributeConfig) {
        let index = self.attributes.len();
        self.attributes.push(AttributeDef {
            name: attr.name.clone(),
            normalizer: attr.normalizer,
        });
        self.by_name.insert(base_name(&attr.name), index);
        for alias in &attr.aliases {
            self.by_name.insert(base_name(alias), index);
        }
        if let Some(oid) = &attr.oid {
            self.by_oid.insert(oid.clone(), index);
        }
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }

    fn lookup(&self, attribute: &str) -> Option<&AttributeDef> {
        let key = base_name(attribute);
        self.by_name
            .get(&key)
            .or_else(|| self.by_oid.get(&key))
            .map(|&i| &self.attributes[i])
    }
}

impl SchemaCapability for StaticSchema {
    fn is_defined(&self, attribute: &str) -> bool {
        self.lookup(attribute).is_some()
    }

    fn normalize_by_name(&self, attribute: &str, value: &[u8]) -> Result<Vec<u8>, NormalizationError> {
        let def = self
            .lookup(attribute)
            .ok_or_else(|| NormalizationError::new(attribute, "attribute type is not defined"))?;
        normalize(def.normalizer, &def.name, value)
    }

    fn normalize_by_oid(&self, oid: &str, value: &[u8]) -> Result<Vec<u8>, NormalizationError> {
        let def = self
            .by_oid
            .get(&base_name(oid))
            .map(|&i| &self.attributes[i])
            .ok_or_else(|| NormalizationError::new(oid, "OID is not defined"))?;
        normalize(def.normalizer, &def.name, value)
    }
}

fn as_text<'a>(attribute: &str, value: &'a [u8]) -> Result<&'a str, NormalizationError> {
    std::str::from_utf8(value).map_err(|_| NormalizationError::new(attribute, "value is not valid UTF-8"))
}

/// Trim and fold runs of whitespace into one space.
fn squeeze(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

pub fn normalize(kind: NormalizerKind, attribute: &str, value: &[u8]) -> Result<Vec<u8>, NormalizationError> {
    match kind {
        NormalizerKind::Octet => Ok(value.to_vec()),
        NormalizerKind::CaseExact => Ok(squeeze(as_text(attribute, value)?).into_bytes()),
        NormalizerKind::CaseIgnore => Ok(squeeze(as_text(attribute, value)?).to_lowercase().into_bytes()),
        NormalizerKind::Numeric => {
            let text = as_text(attribute, value)?;
            let digits: String = text.chars().filter(|c| !c.is_whitespace()).collect();
            if let Some(bad) = digits.chars().find(|c| !c.is_ascii_digit()) {
                return Err(NormalizationError::new(
                    attribute,
                    format!("'{}' is not allowed in a numeric string", bad),
                ));
            }
            Ok(digits.into_bytes())
        }
        NormalizerKind::Integer => {
            let text = as_text(attribute, value)?.trim();
            let n: i64 = text
                .parse()
                .map_err(|_| NormalizationError::new(attribute, format!("'{}' is not an integer", text)))?;
            Ok(n.to_string().into_bytes())
        }
    }
}
