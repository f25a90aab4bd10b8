use std::fmt;

use kube::ResourceExt;

/// Where a resource lives as far as rollout blocks are concerned.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Scope {
    /// Cluster-scoped resources: only global blocks apply.
    Global,
    /// Namespaced resources: blocks in the namespace plus global blocks apply.
    Namespace(String),
}

impl Scope {
    pub fn of<K: ResourceExt>(obj: &K) -> Self {
        match obj.namespace() {
            Some(ns) if !ns.is_empty() => Scope::Namespace(ns),
            _ => Scope::Global,
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::Global => f.write_str("global"),
            Scope::Namespace(ns) => write!(f, "namespace {ns}"),
        }
    }
}

/// `namespace/name` of a rollout block.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockKey {
    pub namespace: String,
    pub name: String,
}

impl BlockKey {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for BlockKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

/// A rollout block as seen by the admission path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ActiveBlock {
    pub key: BlockKey,
    pub message: Option<String>,
}

impl ActiveBlock {
    pub fn new(namespace: &str, name: &str) -> Self {
        Self {
            key: BlockKey::new(namespace, name),
            message: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

impl fmt::Display for ActiveBlock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.message {
            Some(message) => write!(f, "{} ({message})", self.key),
            None => write!(f, "{}", self.key),
        }
    }
}
