use crate::cache::BlockCache;
use crate::error::{Error, Result};
use crate::overrides::Overrides;
use crate::scope::{ActiveBlock, Scope};

use std::sync::Arc;

use kube::ResourceExt;
use rollgate_crd::{Application, Release};
use tracing::trace;

/// Admission operation, as far as rollout blocks care.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Operation {
    Create,
    Update,
    /// Deletes, connects and anything else. Never blocked.
    Other(String),
}

impl From<&str> for Operation {
    fn from(operation: &str) -> Self {
        match operation {
            "CREATE" | "Create" => Operation::Create,
            "UPDATE" | "Update" => Operation::Update,
            other => Operation::Other(other.to_string()),
        }
    }
}

impl Operation {
    pub fn as_str(&self) -> &str {
        match self {
            Operation::Create => "CREATE",
            Operation::Update => "UPDATE",
            Operation::Other(other) => other,
        }
    }
}

/// Decides whether applications and releases may be created or changed given the active rollout
/// blocks.
#[derive(Clone)]
pub struct Validator {
    cache: Arc<dyn BlockCache>,
}

impl Validator {
    pub fn new(cache: Arc<dyn BlockCache>) -> Self {
        Self { cache }
    }

    pub fn is_ready(&self) -> bool {
        self.cache.is_ready()
    }

    pub fn validate_application(
        &self,
        operation: &Operation,
        app: &Application,
        old: Option<&Application>,
    ) -> Result<()> {
        let spec_changed = match operation {
            Operation::Create => true,
            Operation::Update => old.ok_or(Error::MissingOldObject)?.spec != app.spec,
            Operation::Other(_) => return Ok(()),
        };
        self.check_blocks(app, spec_changed)
    }

    /// Same rules as applications, plus: the environment of an existing release never changes.
    pub fn validate_release(
        &self,
        operation: &Operation,
        release: &Release,
        old: Option<&Release>,
    ) -> Result<()> {
        let spec_changed = match operation {
            Operation::Create => true,
            Operation::Update => {
                let old = old.ok_or(Error::MissingOldObject)?;
                if old.spec.environment != release.spec.environment {
                    return Err(Error::EnvironmentChanged);
                }
                old.spec != release.spec
            }
            Operation::Other(_) => return Ok(()),
        };
        self.check_blocks(release, spec_changed)
    }

    fn check_blocks<K: ResourceExt>(&self, obj: &K, spec_changed: bool) -> Result<()> {
        let scope = Scope::of(obj);
        let active = self.cache.list_active(&scope);
        let overrides = Overrides::from_resource(obj)?;
        let overridden = overrides.resolve(&scope, self.cache.global_namespace(), &active);

        let nonexistent: Vec<String> = overridden
            .iter()
            .filter(|key| !active.iter().any(|block| &block.key == *key))
            .map(ToString::to_string)
            .collect();
        if !nonexistent.is_empty() {
            return Err(Error::NonExistentOverrides(nonexistent));
        }

        if !spec_changed {
            trace!(msg = "spec unchanged, skipping rollout block check", %scope);
            return Ok(());
        }

        let mut blocking: Vec<&ActiveBlock> = active
            .iter()
            .filter(|block| !overridden.contains(&block.key))
            .collect();
        if blocking.is_empty() {
            return Ok(());
        }
        blocking.sort_by(|a, b| a.key.cmp(&b.key));
        Err(Error::Blocked(blocking.iter().map(ToString::to_string).collect()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::cache::StaticBlockCache;

    use rollgate_crd::{ApplicationSpec, ROLLOUT_BLOCK_OVERRIDE_ANNOTATION, ReleaseSpec};
    use serde_json::json;

    const GLOBAL: &str = "rollout-blocks-global";
    const NS: &str = "frontend";

    fn validator(blocks: Vec<ActiveBlock>) -> Validator {
        Validator::new(Arc::new(StaticBlockCache::new(GLOBAL, blocks)))
    }

    fn maintenance_window() -> Vec<ActiveBlock> {
        vec![ActiveBlock::new(NS, "maintenance-window")]
    }

    fn application(overrides: Option<&str>, chart_version: &str) -> Application {
        let mut spec = ApplicationSpec::default();
        spec.template.chart.name = "nginx".to_string();
        spec.template.chart.version = chart_version.to_string();
        let mut app = Application::new("nginx", spec);
        app.metadata.namespace = Some(NS.to_string());
        if let Some(value) = overrides {
            app.annotations_mut().insert(
                ROLLOUT_BLOCK_OVERRIDE_ANNOTATION.to_string(),
                value.to_string(),
            );
        }
        app
    }

    fn release(environment: serde_json::Value, target_step: i32) -> Release {
        let spec = ReleaseSpec {
            target_step,
            environment: serde_json::from_value(environment).unwrap(),
        };
        let mut release = Release::new("nginx-abc-0", spec);
        release.metadata.namespace = Some(NS.to_string());
        release
    }

    #[test]
    fn test_operation_from_wire() {
        assert_eq!(Operation::from("CREATE"), Operation::Create);
        assert_eq!(Operation::from("Update"), Operation::Update);
        assert_eq!(
            Operation::from("DELETE"),
            Operation::Other("DELETE".to_string())
        );
    }

    #[test]
    fn test_create_without_blocks_is_allowed() {
        let app = application(None, "0.1.0");
        assert_eq!(
            validator(vec![]).validate_application(&Operation::Create, &app, None),
            Ok(())
        );
    }

    #[test]
    fn test_create_with_overridden_block_is_allowed() {
        let app = application(Some("maintenance-window"), "0.1.0");
        let result =
            validator(maintenance_window()).validate_application(&Operation::Create, &app, None);
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_create_with_dangling_override_is_denied() {
        let app = application(Some("typo-block"), "0.1.0");
        let err = validator(maintenance_window())
            .validate_application(&Operation::Create, &app, None)
            .unwrap_err();
        assert_eq!(
            err,
            Error::NonExistentOverrides(vec!["frontend/typo-block".to_string()])
        );
        assert!(err.to_string().contains("frontend/typo-block"));
    }

    #[test]
    fn test_dangling_override_is_denied_without_any_block() {
        let app = application(Some("typo-block"), "0.1.0");
        let old = application(Some("typo-block"), "0.1.0");
        let result = validator(vec![]).validate_application(&Operation::Update, &app, Some(&old));
        assert!(matches!(result, Err(Error::NonExistentOverrides(_))));
    }

    #[test]
    fn test_create_with_unoverridden_block_is_denied() {
        let app = application(None, "0.1.0");
        let blocks = vec![
            ActiveBlock::new(GLOBAL, "freeze").with_message("holidays"),
            ActiveBlock::new(NS, "maintenance-window"),
        ];
        let err = validator(blocks)
            .validate_application(&Operation::Create, &app, None)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "rollout is blocked by active rollout block(s): frontend/maintenance-window, \
             rollout-blocks-global/freeze (holidays)"
        );
    }

    #[test]
    fn test_create_with_partial_override_is_denied() {
        let app = application(Some("maintenance-window"), "0.1.0");
        let blocks = vec![
            ActiveBlock::new(GLOBAL, "freeze"),
            ActiveBlock::new(NS, "maintenance-window"),
        ];
        let err = validator(blocks)
            .validate_application(&Operation::Create, &app, None)
            .unwrap_err();
        assert_eq!(
            err,
            Error::Blocked(vec!["rollout-blocks-global/freeze".to_string()])
        );
    }

    #[test]
    fn test_global_block_overridden_by_qualified_name() {
        let app = application(Some("rollout-blocks-global/freeze"), "0.1.0");
        let blocks = vec![ActiveBlock::new(GLOBAL, "freeze")];
        assert_eq!(
            validator(blocks).validate_application(&Operation::Create, &app, None),
            Ok(())
        );
    }

    #[test]
    fn test_blocks_of_other_namespaces_do_not_apply() {
        let app = application(None, "0.1.0");
        let blocks = vec![ActiveBlock::new("backend", "db-migration")];
        assert_eq!(
            validator(blocks).validate_application(&Operation::Create, &app, None),
            Ok(())
        );
    }

    #[test]
    fn test_malformed_override_is_denied() {
        let app = application(Some("a/b/c"), "0.1.0");
        let result = validator(vec![]).validate_application(&Operation::Create, &app, None);
        assert!(matches!(result, Err(Error::MalformedOverride { .. })));
    }

    #[test]
    fn test_update_with_unchanged_spec_skips_block_check() {
        let old = application(None, "0.1.0");
        let mut app = old.clone();
        app.labels_mut().insert("team".to_string(), "web".to_string());
        let result = validator(maintenance_window()).validate_application(
            &Operation::Update,
            &app,
            Some(&old),
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_update_with_changed_spec_is_denied() {
        let old = application(None, "0.1.0");
        let app = application(None, "0.2.0");
        let result = validator(maintenance_window()).validate_application(
            &Operation::Update,
            &app,
            Some(&old),
        );
        assert!(matches!(result, Err(Error::Blocked(_))));
    }

    #[test]
    fn test_update_with_changed_spec_and_override_is_allowed() {
        let old = application(None, "0.1.0");
        let app = application(Some("maintenance-window"), "0.2.0");
        let result = validator(maintenance_window()).validate_application(
            &Operation::Update,
            &app,
            Some(&old),
        );
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_update_without_old_object_is_denied() {
        let app = application(None, "0.1.0");
        let result = validator(vec![]).validate_application(&Operation::Update, &app, None);
        assert_eq!(result, Err(Error::MissingOldObject));
    }

    #[test]
    fn test_other_operations_are_allowed() {
        let app = application(Some("typo-block"), "0.1.0");
        let operation = Operation::from("DELETE");
        let result = validator(maintenance_window()).validate_application(&operation, &app, None);
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_release_status_only_update_is_allowed_while_blocked() {
        let env = json!({"chart": {"name": "nginx", "version": "0.1.0"}, "cluster": "eu-1"});
        let old = release(env.clone(), 1);
        let mut new = release(env, 1);
        new.status = Some(Default::default());
        let result =
            validator(maintenance_window()).validate_release(&Operation::Update, &new, Some(&old));
        assert_eq!(result, Ok(()));
    }

    #[test]
    fn test_release_environment_change_is_denied() {
        let old = release(json!({"cluster": "eu-1"}), 1);
        let new = release(json!({"cluster": "eu-2"}), 1);
        let err = validator(vec![])
            .validate_release(&Operation::Update, &new, Some(&old))
            .unwrap_err();
        assert_eq!(err, Error::EnvironmentChanged);
        assert!(err.to_string().contains("environment must not be changed"));
    }

    #[test]
    fn test_release_environment_change_is_denied_even_when_overridden() {
        let old = release(json!({"cluster": "eu-1"}), 1);
        let mut new = release(json!({"cluster": "eu-2"}), 1);
        new.annotations_mut().insert(
            ROLLOUT_BLOCK_OVERRIDE_ANNOTATION.to_string(),
            "maintenance-window".to_string(),
        );
        let result =
            validator(maintenance_window()).validate_release(&Operation::Update, &new, Some(&old));
        assert_eq!(result, Err(Error::EnvironmentChanged));
    }

    #[test]
    fn test_release_target_step_change_is_blocked() {
        let env = json!({"cluster": "eu-1"});
        let old = release(env.clone(), 0);
        let new = release(env, 1);
        let result =
            validator(maintenance_window()).validate_release(&Operation::Update, &new, Some(&old));
        assert!(matches!(result, Err(Error::Blocked(_))));
    }

    #[test]
    fn test_release_create_is_blocked() {
        let new = release(json!({"cluster": "eu-1"}), 0);
        let result =
            validator(maintenance_window()).validate_release(&Operation::Create, &new, None);
        assert_eq!(
            result,
            Err(Error::Blocked(vec!["frontend/maintenance-window".to_string()]))
        );
    }
}
