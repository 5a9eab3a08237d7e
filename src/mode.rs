use serde::{Deserialize, Serialize};

use crate::outcome::{Violation, ViolationKind};
use crate::resolver::{Resolution, ResolvedSchema};

/// How documents without usable schemas are treated
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// A document that declares no schema passes
    #[default]
    Lenient,
    /// Every document must declare at least one schema
    Strict,
}

/// What an unresolvable schema location means for the outcome
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UnresolvedPolicy {
    /// Skip it; a document whose schemas are all unreachable passes
    #[default]
    Ignore,
    /// Report one violation per unresolved location
    Fail,
}

/// Turns mode and policy into violations at the points where they matter
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ModeController {
    mode: Mode,
    unresolved: UnresolvedPolicy,
}

impl ModeController {
    pub fn new(mode: Mode, unresolved: UnresolvedPolicy) -> Self {
        Self { mode, unresolved }
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn unresolved_policy(&self) -> UnresolvedPolicy {
        self.unresolved
    }

    /// Violation for a document that declares no schema, if the mode demands one
    pub fn missing_schema(&self, root_line: usize) -> Option<Violation> {
        match self.mode {
            Mode::Lenient => None,
            Mode::Strict => Some(Violation::new(
                ViolationKind::MissingSchema,
                root_line,
                "no schema declared",
            )),
        }
    }

    /// Violations for unresolved references, in reference order
    pub fn unresolved_violations(&self, resolved: &[ResolvedSchema], root_line: usize) -> Vec<Violation> {
        if self.unresolved == UnresolvedPolicy::Ignore {
            return Vec::new();
        }

        resolved
            .iter()
            .filter_map(|schema| match &schema.resolution {
                Resolution::Unresolved { reason } => {
                    let target = match &schema.reference.namespace {
                        Some(namespace) => format!(" for namespace {namespace}"),
                        None => String::new(),
                    };
                    Some(Violation::new(
                        ViolationKind::UnresolvedSchema,
                        root_line,
                        format!(
                            "schema {}{} could not be resolved: {}",
                            schema.reference.location, target, reason
                        ),
                    ))
                }
                _ => None,
            })
            .collect()
    }
}
