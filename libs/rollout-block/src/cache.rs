use crate::scope::{ActiveBlock, Scope};

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use futures::future::{self, BoxFuture};
use futures::{FutureExt, StreamExt};
use kube::runtime::reflector::{self, Store};
use kube::runtime::{WatchStreamExt, watcher};
use kube::{Api, ResourceExt};
use rollgate_crd::RolloutBlock;
use tracing::{debug, info, trace, warn};

/// Read-only view of the rollout blocks currently in effect.
///
/// Implementations are fed asynchronously, so a read may miss a block that was just created or
/// still see one that is being deleted. Every read must return whole blocks.
pub trait BlockCache: Send + Sync {
    /// Namespace whose blocks apply to every namespace.
    fn global_namespace(&self) -> &str;

    /// Blocks applying to `scope`: global blocks, plus the blocks of the namespace for namespaced
    /// scopes.
    fn list_active(&self, scope: &Scope) -> Vec<ActiveBlock>;

    /// Whether the initial listing finished. Admission decisions made before that could miss
    /// blocks.
    fn is_ready(&self) -> bool;
}

fn in_scope(namespace: &str, scope: &Scope, global_namespace: &str) -> bool {
    namespace == global_namespace || matches!(scope, Scope::Namespace(ns) if ns == namespace)
}

/// Blocks kept up to date by a kube watcher.
#[derive(Clone)]
pub struct ReflectorBlockCache {
    store: Store<RolloutBlock>,
    global_namespace: String,
    ready: Arc<AtomicBool>,
}

impl ReflectorBlockCache {
    /// Builds the cache together with the future driving its watcher. The cache reports ready
    /// once the watcher finished its first listing.
    pub fn watch(
        api: Api<RolloutBlock>,
        global_namespace: impl Into<String>,
    ) -> (Self, BoxFuture<'static, ()>) {
        let (store, writer) = reflector::store();
        let cache = Self {
            store,
            global_namespace: global_namespace.into(),
            ready: Arc::default(),
        };

        let ready = cache.ready.clone();
        let watcher = watcher(api, watcher::Config::default())
            .default_backoff()
            .reflect(writer)
            .for_each(move |event| {
                match event {
                    Ok(watcher::Event::InitDone) => {
                        if !ready.swap(true, Ordering::AcqRel) {
                            info!(msg = "rollout block cache synced");
                        } else {
                            debug!(msg = "rollout block cache relisted");
                        }
                    }
                    Ok(event) => trace!(msg = "watched rollout block event", ?event),
                    Err(error) => warn!(msg = "error watching rollout blocks", %error),
                }
                future::ready(())
            })
            .boxed();

        (cache, watcher)
    }
}

impl BlockCache for ReflectorBlockCache {
    fn global_namespace(&self) -> &str {
        &self.global_namespace
    }

    fn list_active(&self, scope: &Scope) -> Vec<ActiveBlock> {
        self.store
            .state()
            .into_iter()
            .filter(|block| block.metadata.deletion_timestamp.is_none())
            .filter_map(|block| {
                let namespace = block.namespace()?;
                in_scope(&namespace, scope, &self.global_namespace).then(|| {
                    let active = ActiveBlock::new(&namespace, &block.name_any());
                    match block.spec.message.as_str() {
                        "" => active,
                        message => active.with_message(message),
                    }
                })
            })
            .collect()
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

/// Fixed set of blocks. Useful for tests and for running without a cluster.
pub struct StaticBlockCache {
    global_namespace: String,
    blocks: Vec<ActiveBlock>,
    ready: AtomicBool,
}

impl StaticBlockCache {
    pub fn new(global_namespace: impl Into<String>, blocks: Vec<ActiveBlock>) -> Self {
        Self {
            global_namespace: global_namespace.into(),
            blocks,
            ready: AtomicBool::new(true),
        }
    }

    pub fn not_ready(self) -> Self {
        self.ready.store(false, Ordering::Release);
        self
    }

    pub fn set_ready(&self) {
        self.ready.store(true, Ordering::Release);
    }
}

impl BlockCache for StaticBlockCache {
    fn global_namespace(&self) -> &str {
        &self.global_namespace
    }

    fn list_active(&self, scope: &Scope) -> Vec<ActiveBlock> {
        self.blocks
            .iter()
            .filter(|block| in_scope(&block.key.namespace, scope, &self.global_namespace))
            .cloned()
            .collect()
    }

    fn is_ready(&self) -> bool {
        self.ready.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use k8s_openapi::apimachinery::pkg::apis::meta::v1::Time;
    use kube::runtime::watcher::Event;
    use rollgate_crd::RolloutBlockSpec;

    const GLOBAL: &str = "rollout-blocks-global";

    fn block(namespace: &str, name: &str, message: &str) -> RolloutBlock {
        let mut block = RolloutBlock::new(
            name,
            RolloutBlockSpec {
                message: message.to_string(),
                ..Default::default()
            },
        );
        block.metadata.namespace = Some(namespace.to_string());
        block
    }

    fn keys(blocks: Vec<ActiveBlock>) -> Vec<String> {
        let mut keys: Vec<String> = blocks.iter().map(|b| b.key.to_string()).collect();
        keys.sort();
        keys
    }

    fn static_cache() -> StaticBlockCache {
        StaticBlockCache::new(
            GLOBAL,
            vec![
                ActiveBlock::new(GLOBAL, "freeze"),
                ActiveBlock::new("frontend", "maintenance-window"),
                ActiveBlock::new("backend", "db-migration"),
            ],
        )
    }

    #[test]
    fn test_static_cache_namespace_scope_includes_global_blocks() {
        let blocks = static_cache().list_active(&Scope::Namespace("frontend".to_string()));
        assert_eq!(
            keys(blocks),
            ["frontend/maintenance-window", "rollout-blocks-global/freeze"]
        );
    }

    #[test]
    fn test_static_cache_global_scope_only_global_blocks() {
        let blocks = static_cache().list_active(&Scope::Global);
        assert_eq!(keys(blocks), ["rollout-blocks-global/freeze"]);
    }

    #[test]
    fn test_static_cache_readiness() {
        let cache = static_cache().not_ready();
        assert!(!cache.is_ready());
        cache.set_ready();
        assert!(cache.is_ready());
    }

    #[test]
    fn test_reflector_cache_reads_store_snapshot() {
        let (store, mut writer) = reflector::store::<RolloutBlock>();
        let cache = ReflectorBlockCache {
            store,
            global_namespace: GLOBAL.to_string(),
            ready: Arc::default(),
        };

        let mut deleting = block("frontend", "going-away", "");
        deleting.metadata.deletion_timestamp = Some(Time(Default::default()));

        writer.apply_watcher_event(&Event::Init);
        writer.apply_watcher_event(&Event::InitApply(block(GLOBAL, "freeze", "holidays")));
        writer.apply_watcher_event(&Event::InitApply(block("frontend", "maintenance-window", "")));
        writer.apply_watcher_event(&Event::InitApply(block("backend", "db-migration", "")));
        writer.apply_watcher_event(&Event::InitApply(deleting));
        writer.apply_watcher_event(&Event::InitDone);

        let blocks = cache.list_active(&Scope::Namespace("frontend".to_string()));
        assert_eq!(
            keys(blocks.clone()),
            ["frontend/maintenance-window", "rollout-blocks-global/freeze"]
        );
        let global = blocks.iter().find(|b| b.key.namespace == GLOBAL).unwrap();
        assert_eq!(global.message.as_deref(), Some("holidays"));
        let local = blocks.iter().find(|b| b.key.namespace == "frontend").unwrap();
        assert_eq!(local.message, None);
    }
}
