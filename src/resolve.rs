//! Handler resolution by permission-set identity.

use crate::model::{GuardedOperation, HandlerKind, HandlerMethod, PermissionHost};

/// Find the handler whose permission set equals the operation's, compared
/// order-insensitively. At most one can match once duplicate handlers have
/// been rejected, so the first match is well-defined.
pub fn resolve_handler<'a>(
    operation: &GuardedOperation,
    handlers: &'a [HandlerMethod],
) -> Option<&'a HandlerMethod> {
    handlers
        .iter()
        .find(|h| h.permissions.set_eq(&operation.permissions))
}

/// Convenience lookup against the host's handler list of the given kind.
pub fn resolve_for_host<'a>(
    host: &'a PermissionHost,
    operation: &GuardedOperation,
    kind: HandlerKind,
) -> Option<&'a HandlerMethod> {
    resolve_handler(operation, host.handlers(kind))
}
