use crate::error::{Error, Result};
use crate::scope::{ActiveBlock, BlockKey, Scope};

use std::collections::BTreeSet;

use kube::ResourceExt;
use rollgate_crd::ROLLOUT_BLOCK_OVERRIDE_ANNOTATION;

const MAX_NAME_LEN: usize = 253;

/// One entry of the override annotation.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum OverrideRef {
    /// `namespace/name`
    Qualified(BlockKey),
    /// `name`, resolved against the resource scope and then the global namespace
    Bare(String),
}

/// Rollout blocks a resource declares itself exempt from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Overrides(BTreeSet<OverrideRef>);

impl Overrides {
    /// Reads the override annotation of `obj`. A missing annotation means no overrides.
    pub fn from_resource<K: ResourceExt>(obj: &K) -> Result<Self> {
        match obj.annotations().get(ROLLOUT_BLOCK_OVERRIDE_ANNOTATION) {
            Some(value) => Self::parse(value),
            None => Ok(Self::default()),
        }
    }

    /// Parses a comma-separated list of `name` or `namespace/name` entries. Blank entries are
    /// skipped.
    pub fn parse(value: &str) -> Result<Self> {
        value
            .split(',')
            .map(str::trim)
            .filter(|entry| !entry.is_empty())
            .map(parse_entry)
            .collect::<Result<BTreeSet<_>>>()
            .map(Self)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Turns every entry into a block key. Bare names prefer a block in the resource's own
    /// namespace, then a global one; when neither exists the key points into the resource's
    /// namespace (or the global namespace for cluster-scoped resources) so it shows up as
    /// nonexistent.
    pub fn resolve(
        &self,
        scope: &Scope,
        global_namespace: &str,
        active: &[ActiveBlock],
    ) -> BTreeSet<BlockKey> {
        let is_active = |key: &BlockKey| active.iter().any(|block| &block.key == key);
        let home_namespace = match scope {
            Scope::Namespace(ns) => ns.as_str(),
            Scope::Global => global_namespace,
        };

        self.0
            .iter()
            .map(|entry| match entry {
                OverrideRef::Qualified(key) => key.clone(),
                OverrideRef::Bare(name) => {
                    let local = BlockKey::new(home_namespace, name.as_str());
                    let global = BlockKey::new(global_namespace, name.as_str());
                    if !is_active(&local) && is_active(&global) {
                        global
                    } else {
                        local
                    }
                }
            })
            .collect()
    }
}

fn parse_entry(entry: &str) -> Result<OverrideRef> {
    let malformed = |reason| Error::MalformedOverride {
        entry: entry.to_string(),
        reason,
    };

    let mut parts = entry.split('/');
    let first = parts.next().unwrap_or_default();
    match (parts.next(), parts.next()) {
        (None, _) => {
            validate_name(first).map_err(malformed)?;
            Ok(OverrideRef::Bare(first.to_string()))
        }
        (Some(name), None) => {
            validate_name(first).map_err(malformed)?;
            validate_name(name).map_err(malformed)?;
            Ok(OverrideRef::Qualified(BlockKey::new(first, name)))
        }
        (Some(_), Some(_)) => Err(malformed("expected `name` or `namespace/name`")),
    }
}

/// DNS-1123 subdomain rules, which both namespaces and rollout block names follow.
fn validate_name(name: &str) -> Result<(), &'static str> {
    if name.is_empty() {
        return Err("empty namespace or name");
    }
    if name.len() > MAX_NAME_LEN {
        return Err("name is longer than 253 characters");
    }
    if !name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.')
    {
        return Err("only lowercase alphanumeric characters, '-' and '.' are allowed");
    }
    let alphanumeric = |c: char| c.is_ascii_lowercase() || c.is_ascii_digit();
    if !name.starts_with(alphanumeric) || !name.ends_with(alphanumeric) {
        return Err("must start and end with an alphanumeric character");
    }
    Ok(())
}
