//! Settings-redirect ("special") permission strategies.
//!
//! A handful of permissions are never granted through the runtime dialog:
//! the platform sends the user to a settings screen instead, and the grant
//! state is probed through a capability check rather than dialog results.
//! The registry maps permission identifiers to the strategy that knows both
//! sides of that flow. Hosts supply the registry as configuration; the
//! defaults carry the two built-in platform entries.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::codegen::{Expr, Receiver, Stmt};

/// Built-in special permission: writing system settings.
pub const WRITE_SETTINGS: &str = "platform.permission.WRITE_SETTINGS";

/// Built-in special permission: drawing over other components.
pub const SYSTEM_ALERT_WINDOW: &str = "platform.permission.SYSTEM_ALERT_WINDOW";

/// Capability probe a strategy recomputes to verify its grant state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsProbe {
    CanWriteSettings,
    CanDrawOverlays,
}

/// Settings screen a strategy redirects the user to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SettingsAction {
    ManageWriteSettings,
    ManageOverlay,
}

/// Alternate grant-check/request flow of one special permission.
///
/// A closed tagged value rather than an open trait: lookups stay exhaustive
/// and callers extend the registry by mapping further identifiers onto an
/// existing flow, not by subclassing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialStrategy {
    WriteSettings,
    OverlayWindow,
}

impl SpecialStrategy {
    pub fn probe(&self) -> SettingsProbe {
        match self {
            SpecialStrategy::WriteSettings => SettingsProbe::CanWriteSettings,
            SpecialStrategy::OverlayWindow => SettingsProbe::CanDrawOverlays,
        }
    }

    pub fn action(&self) -> SettingsAction {
        match self {
            SpecialStrategy::WriteSettings => SettingsAction::ManageWriteSettings,
            SpecialStrategy::OverlayWindow => SettingsAction::ManageOverlay,
        }
    }

    /// Capability check recomputed wherever the grant state is verified.
    pub fn capability_check(&self, receiver: Receiver) -> Expr {
        Expr::SpecialCapabilityCheck {
            probe: self.probe(),
            receiver,
        }
    }

    /// The settings-redirect request, tagged with the operation's code.
    pub fn request_via_settings(&self, receiver: Receiver, request_code_field: &str) -> Stmt {
        Stmt::RequestViaSettings {
            action: self.action(),
            receiver,
            request_code_field: request_code_field.to_string(),
        }
    }
}

/// Registry of special permissions, keyed by exact permission identifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpecialRegistry {
    entries: IndexMap<String, SpecialStrategy>,
}

impl SpecialRegistry {
    pub fn empty() -> Self {
        SpecialRegistry {
            entries: IndexMap::new(),
        }
    }

    /// Register or replace the strategy of a permission identifier.
    pub fn register(&mut self, permission: impl Into<String>, strategy: SpecialStrategy) {
        self.entries.insert(permission.into(), strategy);
    }

    pub fn lookup(&self, permission: &str) -> Option<SpecialStrategy> {
        self.entries.get(permission).copied()
    }

    pub fn is_special(&self, permission: &str) -> bool {
        self.entries.contains_key(permission)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, SpecialStrategy)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl Default for SpecialRegistry {
    /// The two built-in settings-redirect permissions.
    fn default() -> Self {
        let mut registry = SpecialRegistry::empty();
        registry.register(WRITE_SETTINGS, SpecialStrategy::WriteSettings);
        registry.register(SYSTEM_ALERT_WINDOW, SpecialStrategy::OverlayWindow);
        registry
    }
}
