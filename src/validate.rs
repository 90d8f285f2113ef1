//! Structural validation of a permission host.
//!
//! Every check runs over the whole host and all violations are accumulated
//! before synthesis aborts for that host; a check is skipped only when its
//! prerequisite cannot be evaluated at all (adapter prerequisites need a
//! resolved adapter). Other hosts in the same run are unaffected.

use std::collections::HashSet;
use std::sync::Arc;

use log::debug;
use serde::Serialize;
use thiserror::Error;

use crate::adapter::{select_adapter, TargetAdapter};
use crate::model::{
    HandlerKind, MethodRef, PermissionHost, PERMISSION_REQUEST_TYPE,
};
use crate::special::SpecialRegistry;

/// Structural violations, each carrying the offending identity.
///
/// All are synthesis-time and non-recoverable for the offending host.
#[derive(Debug, Clone, PartialEq, Error, Serialize)]
#[serde(tag = "rule", rename_all = "snake_case")]
pub enum ValidateError {
    #[error("host {host}: no adapter capability resolves its kind ({detail})")]
    UnresolvableHostKind { host: String, detail: String },

    #[error("host {host}: declares no guarded operations")]
    NoGuardedOperations { host: String },

    #[error("method {method}: permission set is empty")]
    EmptyPermissionSet { method: String },

    #[error("method {method}: must not be private")]
    InaccessibleMethod { method: String },

    #[error("method {method}: must return void")]
    WrongReturnType { method: String },

    #[error("method {method}: wrong parameters, expected {expected}")]
    WrongParameters { method: String, expected: String },

    #[error("{kind} handler {method}: duplicates permission set {permissions:?}")]
    DuplicatedPermissionSet {
        method: String,
        kind: String,
        permissions: Vec<String>,
    },

    #[error("operation {method}: special permission {permission} cannot be mixed with others")]
    MixedPermissionType { method: String, permission: String },

    #[error("host {host}: legacy compat shim is not available")]
    MissingCompatShim { host: String },
}

/// A host that passed every structural check, with its adapter resolved.
#[derive(Debug)]
pub struct ValidatedHost<'a> {
    pub host: &'a PermissionHost,
    pub adapter: Arc<dyn TargetAdapter>,
}

/// Run every structural check over the host.
///
/// Returns the validated host with its resolved adapter, or every violation
/// found. Violations are reported grouped by check, host declaration order
/// within a check.
pub fn validate_host<'a>(
    host: &'a PermissionHost,
    adapters: &[Arc<dyn TargetAdapter>],
    special: &SpecialRegistry,
) -> Result<ValidatedHost<'a>, Vec<ValidateError>> {
    let mut errors = Vec::new();

    let adapter = match select_adapter(adapters, host) {
        Ok(adapter) => Some(adapter),
        Err(e) => {
            errors.push(e);
            None
        }
    };

    check_not_empty(host, &mut errors);
    check_permission_sets_non_empty(host, &mut errors);
    check_visibility(host, &mut errors);
    check_return_void(host, &mut errors);
    check_arity(host, &mut errors);
    check_no_duplicate_handlers(host, &mut errors);
    check_no_mixed_special(host, special, &mut errors);

    // Needs a resolved adapter, skipped when the host kind is unknown.
    if let Some(adapter) = &adapter {
        if let Err(e) = adapter.check_prerequisites(host) {
            errors.push(e);
        }
    }

    match (errors.is_empty(), adapter) {
        (true, Some(adapter)) => {
            debug!("host {} passed validation", host.name);
            Ok(ValidatedHost { host, adapter })
        }
        _ => {
            debug!("host {}: {} violation(s)", host.name, errors.len());
            Err(errors)
        }
    }
}

fn check_not_empty(host: &PermissionHost, errors: &mut Vec<ValidateError>) {
    if host.operations.is_empty() {
        errors.push(ValidateError::NoGuardedOperations {
            host: host.name.clone(),
        });
    }
}

fn check_permission_sets_non_empty(host: &PermissionHost, errors: &mut Vec<ValidateError>) {
    for op in &host.operations {
        if op.permissions.is_empty() {
            errors.push(ValidateError::EmptyPermissionSet {
                method: op.name.clone(),
            });
        }
    }
    for kind in [
        HandlerKind::Rationale,
        HandlerKind::Denied,
        HandlerKind::NeverAskAgain,
    ] {
        for handler in host.handlers(kind) {
            if handler.permissions.is_empty() {
                errors.push(ValidateError::EmptyPermissionSet {
                    method: handler.name.clone(),
                });
            }
        }
    }
}

fn check_visibility(host: &PermissionHost, errors: &mut Vec<ValidateError>) {
    for method in host.all_methods() {
        if !method.visibility().is_accessible() {
            errors.push(ValidateError::InaccessibleMethod {
                method: method.name().to_string(),
            });
        }
    }
}

fn check_return_void(host: &PermissionHost, errors: &mut Vec<ValidateError>) {
    for method in host.all_methods() {
        if !method.returns().is_void() {
            errors.push(ValidateError::WrongReturnType {
                method: method.name().to_string(),
            });
        }
    }
}

fn check_arity(host: &PermissionHost, errors: &mut Vec<ValidateError>) {
    for method in host.all_methods() {
        let MethodRef::Handler(kind, handler) = method else {
            continue;
        };
        let valid = match kind {
            HandlerKind::Rationale => {
                handler.params.len() == 1 && handler.params[0].ty == PERMISSION_REQUEST_TYPE
            }
            HandlerKind::Denied | HandlerKind::NeverAskAgain => handler.params.is_empty(),
        };
        if !valid {
            let expected = match kind {
                HandlerKind::Rationale => format!("exactly one {PERMISSION_REQUEST_TYPE}"),
                _ => "no parameters".to_string(),
            };
            errors.push(ValidateError::WrongParameters {
                method: handler.name.clone(),
                expected,
            });
        }
    }
}

fn check_no_duplicate_handlers(host: &PermissionHost, errors: &mut Vec<ValidateError>) {
    for kind in [
        HandlerKind::Rationale,
        HandlerKind::Denied,
        HandlerKind::NeverAskAgain,
    ] {
        let mut seen: HashSet<Vec<String>> = HashSet::new();
        for handler in host.handlers(kind) {
            let key = handler.permissions.sorted_key();
            if !seen.insert(key.clone()) {
                errors.push(ValidateError::DuplicatedPermissionSet {
                    method: handler.name.clone(),
                    kind: kind.label().to_string(),
                    permissions: key,
                });
            }
        }
    }
}

fn check_no_mixed_special(
    host: &PermissionHost,
    special: &SpecialRegistry,
    errors: &mut Vec<ValidateError>,
) {
    for op in &host.operations {
        if op.permissions.len() <= 1 {
            continue;
        }
        if let Some(permission) = op.permissions.iter().find(|p| special.is_special(p)) {
            errors.push(ValidateError::MixedPermissionType {
                method: op.name.clone(),
                permission: permission.to_string(),
            });
        }
    }
}
