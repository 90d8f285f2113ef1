//! permgen — synthesis engine for runtime-permission dispatchers.
//!
//! From a declarative description of a permission-gated component (a
//! [`model::PermissionHost`]), the engine validates its structure and
//! synthesizes an abstract dispatcher implementing the deterministic
//! permission request/response state machine: per-operation check methods,
//! result-handling methods for the runtime-dialog and settings-redirect
//! outcome channels, and pending-request types for deferred invocations.
//!
//! Data flows one way:
//!
//! ```text
//! PermissionHost -> validate -> resolve -> synthesize -> GeneratedDispatcher -> emitter
//! ```
//!
//! The output is an abstract statement tree; rendering it to source text is
//! left to an external [`emit::CodeEmitter`].

pub mod adapter;
pub mod codegen;
pub mod emit;
pub mod model;
pub mod request_code;
pub mod resolve;
pub mod special;
pub mod synth;
pub mod validate;

use std::sync::Arc;

use log::{info, warn};

use crate::adapter::{default_adapters, TargetAdapter};
use crate::codegen::GeneratedDispatcher;
use crate::model::PermissionHost;
use crate::request_code::RequestCodeAllocator;
use crate::special::SpecialRegistry;
use crate::validate::{validate_host, ValidateError};

pub use crate::synth::synthesize;

/// Configuration of one synthesis run: the adapter set hosts are matched
/// against and the special-permission registry.
pub struct SynthConfig {
    pub adapters: Vec<Arc<dyn TargetAdapter>>,
    pub special: SpecialRegistry,
}

impl Default for SynthConfig {
    fn default() -> Self {
        SynthConfig {
            adapters: default_adapters(),
            special: SpecialRegistry::default(),
        }
    }
}

/// Outcome of one host in a run: a dispatcher description, or the full list
/// of structural violations. No partial dispatcher is ever produced.
pub struct HostOutcome {
    pub host: String,
    pub result: Result<GeneratedDispatcher, Vec<ValidateError>>,
}

/// Process a batch of hosts with one shared request-code allocator.
///
/// Request codes are unique across the whole run, even across unrelated
/// hosts. A failing host never affects the others.
pub fn synthesize_run(hosts: &[PermissionHost], config: &SynthConfig) -> Vec<HostOutcome> {
    let allocator = RequestCodeAllocator::new();
    hosts
        .iter()
        .map(|host| {
            let result = validate_host(host, &config.adapters, &config.special)
                .map(|validated| synthesize(&validated, &allocator, &config.special));
            match &result {
                Ok(dispatcher) => info!("host {}: synthesized {}", host.name, dispatcher.type_name),
                Err(errors) => warn!("host {}: rejected with {} violation(s)", host.name, errors.len()),
            }
            HostOutcome {
                host: host.name.clone(),
                result,
            }
        })
        .collect()
}
