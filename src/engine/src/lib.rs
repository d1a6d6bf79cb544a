//! Image Warden Engine - image reference policy.
//!
//! Parses image references, compiles declared validation and mutation rules
//! and evaluates them in order. `RollingTag` rules consult the report
//! repository and a live registry digest lookup.

pub mod compile;
pub mod engine;
pub mod inspect;
pub mod reference;
mod rolling;
pub mod rule;

// Re-export common types
pub use compile::{compile, CompiledRule};
pub use engine::{Engine, DEFAULT_INSPECT_TIMEOUT, NO_RULES};
pub use inspect::{DigestInspector, RegistryAuth, RegistryInspector};
pub use reference::{parse_image_reference, ImageReference};
pub use rule::{
    MutationRule, MutationType, Rule, RulePayload, RuleSet, ValidateType, ValidationRule,
};
