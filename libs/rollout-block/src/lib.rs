//! Rollout block policy for the admission webhook: which blocks are active, which ones a resource
//! overrides, and whether a create or update may go through.

pub mod cache;
pub mod error;
pub mod overrides;
pub mod scope;
pub mod validation;

pub use cache::{BlockCache, ReflectorBlockCache, StaticBlockCache};
pub use error::{Error, Result};
pub use scope::{ActiveBlock, BlockKey, Scope};
pub use validation::{Operation, Validator};
