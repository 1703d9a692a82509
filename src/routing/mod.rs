//! Link resolution and routing engine.
//!
//! - `context`: per-request attributes (IP, device class, password attempt)
//! - `rule_store`: cached read-optimized snapshots of a link's rules
//! - `variant`: weighted A/B variant selection
//! - `resolver`: the destination decision pipeline

pub mod context;
pub mod resolver;
pub mod rule_store;
pub mod variant;

pub use context::RequestContext;
pub use resolver::{Outcome, Resolver};
pub use rule_store::{LinkRuleSet, RuleStore};
