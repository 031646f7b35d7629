//! # Connection Targets
//!
//! Parsing and normalisation of connection strings into [`TargetDescriptor`]s,
//! the registry's cache key.
//!
//! ```text
//! tasker:<quorum>[:<port>[:<root_path>[:<principal>[:<keytab>]]]][;key=value]*
//! ```
//!
//! Identity covers the quorum, port, root path and credentials. Host order and
//! case in the quorum do not matter, and `;key=value` attributes are carried
//! alongside the descriptor without taking part in equality or hashing.

use crate::error::{RegistryError, RegistryResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

pub const TARGET_SCHEME: &str = "tasker";
pub const DEFAULT_PORT: u16 = 2181;
pub const DEFAULT_ROOT_PATH: &str = "/tasker";
/// Quorum value marking a target that never talks to a backend
pub const OFFLINE_QUORUM: &str = "none";
/// Attribute that must be present (and `true`) for a registry to accept a target
pub const TEST_MODE_ATTRIBUTE: &str = "test";

/// Which family of service handle a target needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetMode {
    /// No backend; the handle serves everything from memory
    Offline,
    /// A live backend reached through the quorum
    Networked,
}

impl fmt::Display for TargetMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TargetMode::Offline => write!(f, "offline"),
            TargetMode::Networked => write!(f, "networked"),
        }
    }
}

/// Parsed, immutable identity of a connection target
#[derive(Debug, Clone, Serialize)]
pub struct TargetDescriptor {
    quorum: Vec<String>,
    port: u16,
    root_path: String,
    principal: Option<String>,
    keytab: Option<String>,
    #[serde(skip)]
    attributes: BTreeMap<String, String>,
}

impl TargetDescriptor {
    /// Parse a connection string
    pub fn parse(target: &str) -> RegistryResult<Self> {
        let trimmed = target.trim();
        if trimmed.is_empty() {
            return Err(RegistryError::invalid_target(target, "empty connection string"));
        }

        let mut sections = trimmed.split(';');
        let location = sections.next().unwrap_or_default();
        let attributes = parse_attributes(target, sections)?;

        let body = location
            .strip_prefix(TARGET_SCHEME)
            .and_then(|rest| rest.strip_prefix(':'))
            .ok_or_else(|| {
                RegistryError::invalid_target(
                    target,
                    format!("expected '{TARGET_SCHEME}:' scheme prefix"),
                )
            })?;

        let mut parts = body.split(':');
        let quorum = parse_quorum(target, parts.next().unwrap_or_default())?;

        let port = match non_empty(parts.next()) {
            Some(raw) => raw.parse::<u16>().map_err(|e| {
                RegistryError::invalid_target(target, format!("invalid port '{raw}': {e}"))
            })?,
            None => DEFAULT_PORT,
        };

        let root_path = match non_empty(parts.next()) {
            Some(raw) if raw.starts_with('/') => raw.to_string(),
            Some(raw) => {
                return Err(RegistryError::invalid_target(
                    target,
                    format!("root path '{raw}' must start with '/'"),
                ))
            }
            None => DEFAULT_ROOT_PATH.to_string(),
        };

        let principal = non_empty(parts.next()).map(str::to_string);
        let keytab = non_empty(parts.next()).map(str::to_string);

        if parts.next().is_some() {
            return Err(RegistryError::invalid_target(
                target,
                "too many ':' separated components",
            ));
        }

        Ok(Self {
            quorum,
            port,
            root_path,
            principal,
            keytab,
            attributes,
        })
    }

    pub fn quorum(&self) -> &[String] {
        &self.quorum
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn root_path(&self) -> &str {
        &self.root_path
    }

    pub fn principal(&self) -> Option<&str> {
        self.principal.as_deref()
    }

    pub fn keytab(&self) -> Option<&str> {
        self.keytab.as_deref()
    }

    /// `;key=value` attributes from the connection string
    pub fn attributes(&self) -> &BTreeMap<String, String> {
        &self.attributes
    }

    pub fn is_offline(&self) -> bool {
        self.quorum.len() == 1 && self.quorum[0] == OFFLINE_QUORUM
    }

    pub fn mode(&self) -> TargetMode {
        if self.is_offline() {
            TargetMode::Offline
        } else {
            TargetMode::Networked
        }
    }

    fn identity(&self) -> (&[String], u16, &str, Option<&str>, Option<&str>) {
        (
            &self.quorum,
            self.port,
            &self.root_path,
            self.principal.as_deref(),
            self.keytab.as_deref(),
        )
    }
}

impl PartialEq for TargetDescriptor {
    fn eq(&self, other: &Self) -> bool {
        self.identity() == other.identity()
    }
}

impl Eq for TargetDescriptor {}

impl Hash for TargetDescriptor {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.identity().hash(state);
    }
}

impl fmt::Display for TargetDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{TARGET_SCHEME}:{}:{}:{}",
            self.quorum.join(","),
            self.port,
            self.root_path
        )?;
        if let Some(principal) = &self.principal {
            write!(f, ":{principal}")?;
        }
        if let Some(keytab) = &self.keytab {
            write!(f, ":{keytab}")?;
        }
        Ok(())
    }
}

/// Boundary filter run before a registry is consulted: the string must be a
/// well-formed target carrying `test=true`.
pub fn accepts_target(target: &str) -> bool {
    match TargetDescriptor::parse(target) {
        Ok(descriptor) => descriptor
            .attributes()
            .get(TEST_MODE_ATTRIBUTE)
            .is_some_and(|value| value.eq_ignore_ascii_case("true")),
        Err(_) => false,
    }
}

fn non_empty(part: Option<&str>) -> Option<&str> {
    part.map(str::trim).filter(|p| !p.is_empty())
}

fn parse_quorum(target: &str, raw: &str) -> RegistryResult<Vec<String>> {
    if raw.trim().is_empty() {
        return Err(RegistryError::invalid_target(target, "missing quorum"));
    }

    let mut hosts = Vec::new();
    for host in raw.split(',') {
        let host = host.trim().to_ascii_lowercase();
        if host.is_empty() {
            return Err(RegistryError::invalid_target(
                target,
                "empty host in quorum",
            ));
        }
        hosts.push(host);
    }
    hosts.sort();
    hosts.dedup();

    if hosts.len() > 1 && hosts.iter().any(|h| h == OFFLINE_QUORUM) {
        return Err(RegistryError::invalid_target(
            target,
            format!("'{OFFLINE_QUORUM}' cannot be combined with other hosts"),
        ));
    }
    Ok(hosts)
}

fn parse_attributes<'a>(
    target: &str,
    sections: impl Iterator<Item = &'a str>,
) -> RegistryResult<BTreeMap<String, String>> {
    let mut attributes = BTreeMap::new();
    for section in sections {
        let section = section.trim();
        if section.is_empty() {
            continue;
        }
        let (key, value) = section.split_once('=').ok_or_else(|| {
            RegistryError::invalid_target(target, format!("attribute '{section}' is not key=value"))
        })?;
        let key = key.trim();
        if key.is_empty() {
            return Err(RegistryError::invalid_target(target, "attribute with empty key"));
        }
        attributes.insert(key.to_ascii_lowercase(), value.trim().to_string());
    }
    Ok(attributes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;

    fn hash_of(descriptor: &TargetDescriptor) -> u64 {
        let mut hasher = DefaultHasher::new();
        descriptor.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn test_defaults_applied() {
        let descriptor = TargetDescriptor::parse("tasker:zk1").unwrap();
        assert_eq!(descriptor.quorum(), ["zk1".to_string()]);
        assert_eq!(descriptor.port(), DEFAULT_PORT);
        assert_eq!(descriptor.root_path(), DEFAULT_ROOT_PATH);
        assert_eq!(descriptor.principal(), None);
        assert_eq!(descriptor.mode(), TargetMode::Networked);
    }

    #[test]
    fn test_full_form() {
        let descriptor =
            TargetDescriptor::parse("tasker:zk1,zk2:2222:/custom:svc@REALM:/etc/svc.keytab")
                .unwrap();
        assert_eq!(descriptor.quorum().len(), 2);
        assert_eq!(descriptor.port(), 2222);
        assert_eq!(descriptor.root_path(), "/custom");
        assert_eq!(descriptor.principal(), Some("svc@REALM"));
        assert_eq!(descriptor.keytab(), Some("/etc/svc.keytab"));
    }

    #[test]
    fn test_equivalent_strings_share_identity() {
        let a = TargetDescriptor::parse("tasker:ZK2,zk1:2181:/tasker;test=true").unwrap();
        let b = TargetDescriptor::parse("tasker:zk1, zk2").unwrap();
        assert_eq!(a, b);
        assert_eq!(hash_of(&a), hash_of(&b));
    }

    #[test]
    fn test_distinct_ports_are_distinct_targets() {
        let a = TargetDescriptor::parse("tasker:zk1:2181").unwrap();
        let b = TargetDescriptor::parse("tasker:zk1:2182").unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn test_offline_quorum_selects_offline_mode() {
        let descriptor = TargetDescriptor::parse("tasker:NONE;test=true").unwrap();
        assert!(descriptor.is_offline());
        assert_eq!(descriptor.mode(), TargetMode::Offline);
    }

    #[test]
    fn test_invalid_targets() {
        for bad in [
            "",
            "   ",
            "jdbc:zk1",
            "tasker:",
            "tasker:zk1,,zk2",
            "tasker:zk1:notaport",
            "tasker:zk1:2181:relative",
            "tasker:zk1:2181:/r:p:k:extra",
            "tasker:none,zk1",
            "tasker:zk1;novalue",
        ] {
            let err = TargetDescriptor::parse(bad).unwrap_err();
            assert!(
                matches!(err, RegistryError::InvalidTarget { .. }),
                "expected InvalidTarget for {bad:?}, got {err:?}"
            );
        }
    }

    #[test]
    fn test_attributes_are_collected() {
        let descriptor =
            TargetDescriptor::parse("tasker:zk1;Test=true;schema=orders").unwrap();
        assert_eq!(descriptor.attributes().get("test").map(String::as_str), Some("true"));
        assert_eq!(
            descriptor.attributes().get("schema").map(String::as_str),
            Some("orders")
        );
    }

    #[test]
    fn test_accepts_target_requires_test_marker() {
        assert!(accepts_target("tasker:zk1;test=true"));
        assert!(accepts_target("tasker:none;TEST=TRUE"));
        assert!(!accepts_target("tasker:zk1"));
        assert!(!accepts_target("tasker:zk1;test=false"));
        assert!(!accepts_target("other:zk1;test=true"));
    }

    #[test]
    fn test_display_is_normalised() {
        let descriptor = TargetDescriptor::parse("tasker:b,A;test=true").unwrap();
        assert_eq!(descriptor.to_string(), "tasker:a,b:2181:/tasker");
    }
}
