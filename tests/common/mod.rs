#![allow(dead_code)]

pub mod fixtures;
pub mod mocks;

use std::sync::Arc;

use xsd_check::{
    Document, InMemoryResources, Mode, SchemaValidator, UnresolvedPolicy, ValidatorSettings,
};

/// Validator over an in-memory project
pub fn validator(resources: InMemoryResources, mode: Mode) -> SchemaValidator {
    validator_with_policy(resources, mode, UnresolvedPolicy::Ignore)
}

pub fn validator_with_policy(
    resources: InMemoryResources,
    mode: Mode,
    unresolved: UnresolvedPolicy,
) -> SchemaValidator {
    let settings = ValidatorSettings {
        mode,
        unresolved,
        ..ValidatorSettings::default()
    };
    SchemaValidator::new(Arc::new(resources), settings)
}

/// A document located in the project's main resource directory
pub fn document(name: &str, content: &str) -> Document {
    Document::new(format!("src/main/resources/{name}"), content)
}
