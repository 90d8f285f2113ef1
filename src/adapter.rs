//! Target call-convention adapters.
//!
//! A host's kind decides how the generated dispatcher talks to the platform:
//! which object carries the platform context, whether requests go through
//! the compat facade, the host itself, or a legacy shim. One adapter is
//! selected per host at validation time by matching its declared supertype
//! chain; the synthesizer is generic over the capability and never inspects
//! host identity again.

use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::codegen::{Expr, Receiver, RequestRoute, Stmt};
use crate::model::PermissionHost;
use crate::validate::ValidateError;

/// The three supported call conventions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HostKind {
    Direct,
    Delegating,
    LegacyDelegating,
}

impl std::fmt::Display for HostKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            HostKind::Direct => "direct",
            HostKind::Delegating => "delegating",
            HostKind::LegacyDelegating => "legacy_delegating",
        };
        f.write_str(name)
    }
}

/// Platform call-convention strategy consumed by the synthesizer.
pub trait TargetAdapter: Send + Sync {
    fn kind(&self) -> HostKind;

    /// Supertype this adapter claims; a host matches when its declared
    /// supertype chain contains it.
    fn target_supertype(&self) -> &str;

    /// Where the platform context lives for grant checks and the legacy
    /// threshold guard.
    fn context_receiver(&self) -> Receiver;

    /// Hook for environment requirements beyond the supertype match.
    fn check_prerequisites(&self, _host: &PermissionHost) -> Result<(), ValidateError> {
        Ok(())
    }

    fn grant_check(&self, permission_field: &str) -> Expr {
        Expr::GrantCheck {
            receiver: self.context_receiver(),
            permission_field: permission_field.to_string(),
        }
    }

    fn rationale_check(&self, permission_field: &str) -> Expr {
        Expr::ShouldShowRationale {
            receiver: Receiver::Host,
            via_shim: false,
            permission_field: permission_field.to_string(),
        }
    }

    fn request_permissions(&self, permission_field: &str, request_code_field: &str) -> Stmt;
}

impl std::fmt::Debug for dyn TargetAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("TargetAdapter").field(&self.kind()).finish()
    }
}

/// Host is its own platform context; requests go through the compat facade.
pub struct DirectAdapter;

impl TargetAdapter for DirectAdapter {
    fn kind(&self) -> HostKind {
        HostKind::Direct
    }

    fn target_supertype(&self) -> &str {
        "platform.Screen"
    }

    fn context_receiver(&self) -> Receiver {
        Receiver::Host
    }

    fn request_permissions(&self, permission_field: &str, request_code_field: &str) -> Stmt {
        Stmt::RequestPermissions {
            route: RequestRoute::Facade,
            receiver: Receiver::Host,
            permission_field: permission_field.to_string(),
            request_code_field: request_code_field.to_string(),
        }
    }
}

/// Host delegates to a parent context but can request on its own behalf.
pub struct DelegatingAdapter;

impl TargetAdapter for DelegatingAdapter {
    fn kind(&self) -> HostKind {
        HostKind::Delegating
    }

    fn target_supertype(&self) -> &str {
        "platform.Panel"
    }

    fn context_receiver(&self) -> Receiver {
        Receiver::Parent
    }

    fn request_permissions(&self, permission_field: &str, request_code_field: &str) -> Stmt {
        Stmt::RequestPermissions {
            route: RequestRoute::HostDirect,
            receiver: Receiver::Host,
            permission_field: permission_field.to_string(),
            request_code_field: request_code_field.to_string(),
        }
    }
}

/// Host delegates to a parent context and needs the legacy compat shim for
/// both the rationale query and the request itself.
pub struct LegacyDelegatingAdapter {
    shim_available: bool,
}

impl LegacyDelegatingAdapter {
    pub fn new() -> Self {
        LegacyDelegatingAdapter {
            shim_available: true,
        }
    }

    /// Probe outcome injected by the environment (the shim may be missing
    /// from the classpath-equivalent of the build).
    pub fn with_shim_available(shim_available: bool) -> Self {
        LegacyDelegatingAdapter { shim_available }
    }
}

impl Default for LegacyDelegatingAdapter {
    fn default() -> Self {
        LegacyDelegatingAdapter::new()
    }
}

impl TargetAdapter for LegacyDelegatingAdapter {
    fn kind(&self) -> HostKind {
        HostKind::LegacyDelegating
    }

    fn target_supertype(&self) -> &str {
        "platform.LegacyPanel"
    }

    fn context_receiver(&self) -> Receiver {
        Receiver::Parent
    }

    fn check_prerequisites(&self, host: &PermissionHost) -> Result<(), ValidateError> {
        if self.shim_available {
            Ok(())
        } else {
            Err(ValidateError::MissingCompatShim {
                host: host.name.clone(),
            })
        }
    }

    fn rationale_check(&self, permission_field: &str) -> Expr {
        Expr::ShouldShowRationale {
            receiver: Receiver::Host,
            via_shim: true,
            permission_field: permission_field.to_string(),
        }
    }

    fn request_permissions(&self, permission_field: &str, request_code_field: &str) -> Stmt {
        Stmt::RequestPermissions {
            route: RequestRoute::CompatShim,
            receiver: Receiver::Host,
            permission_field: permission_field.to_string(),
            request_code_field: request_code_field.to_string(),
        }
    }
}

/// The default adapter set, in matching order.
pub fn default_adapters() -> Vec<Arc<dyn TargetAdapter>> {
    vec![
        Arc::new(DirectAdapter),
        Arc::new(DelegatingAdapter),
        Arc::new(LegacyDelegatingAdapter::new()),
    ]
}

/// Match the host's declared supertype chain against the adapter set.
///
/// Exactly one adapter must claim the host; zero or ambiguous matches raise
/// [`ValidateError::UnresolvableHostKind`].
pub fn select_adapter(
    adapters: &[Arc<dyn TargetAdapter>],
    host: &PermissionHost,
) -> Result<Arc<dyn TargetAdapter>, ValidateError> {
    let matches: Vec<&Arc<dyn TargetAdapter>> = adapters
        .iter()
        .filter(|a| host.supertypes.iter().any(|s| s == a.target_supertype()))
        .collect();
    match matches.as_slice() {
        [single] => {
            debug!(
                "host {} resolved to {} adapter",
                host.name,
                single.kind()
            );
            Ok(Arc::clone(single))
        }
        [] => Err(ValidateError::UnresolvableHostKind {
            host: host.name.clone(),
            detail: format!(
                "no adapter capability matches supertypes [{}]",
                host.supertypes.join(", ")
            ),
        }),
        many => Err(ValidateError::UnresolvableHostKind {
            host: host.name.clone(),
            detail: format!(
                "ambiguous host kind, matches [{}]",
                many.iter()
                    .map(|a| a.kind().to_string())
                    .collect::<Vec<_>>()
                    .join(", ")
            ),
        }),
    }
}
