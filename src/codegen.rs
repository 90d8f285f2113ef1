//! Abstract description of a generated dispatcher.
//!
//! Synthesis produces these values; rendering them to target-language source
//! is the job of an external emitter (see [`crate::emit`]). Nothing in here
//! assumes a target syntax: method bodies are statement/branch trees, not
//! text.

use serde::{Deserialize, Serialize};

use crate::model::{Param, GRANTABLE_REQUEST_TYPE, PERMISSION_REQUEST_TYPE};
use crate::special::{SettingsAction, SettingsProbe};

/// Suffix of the generated dispatcher type name.
pub const DISPATCHER_SUFFIX: &str = "PermissionsDispatcher";

/// Which platform context a call runs against. Direct hosts are their own
/// context; delegating hosts resolve their parent first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Receiver {
    Host,
    Parent,
}

/// Call convention for the standard permission request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestRoute {
    /// Through the platform compat facade, passing the context.
    Facade,
    /// The host object requests on its own behalf.
    HostDirect,
    /// Through the legacy compat shim.
    CompatShim,
}

/// Conditions of the synthesized control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    /// Standard grant check over the operation's permission literal.
    GrantCheck {
        receiver: Receiver,
        permission_field: String,
    },
    /// Settings-backed capability probe of a special permission.
    SpecialCapabilityCheck {
        probe: SettingsProbe,
        receiver: Receiver,
    },
    /// Platform rationale query for the operation's permission literal.
    ShouldShowRationale {
        receiver: Receiver,
        via_shim: bool,
        permission_field: String,
    },
    /// Platform reports a legacy API level below the runtime-permission
    /// threshold.
    BelowRuntimeThreshold { receiver: Receiver },
    /// The pending slot for a parameterized operation is occupied.
    PendingPresent { field: String },
    /// Every reported grant result indicates a grant.
    AllResultsGranted,
    Not(Box<Expr>),
    Or(Box<Expr>, Box<Expr>),
    And(Box<Expr>, Box<Expr>),
}

impl Expr {
    pub fn not(self) -> Expr {
        Expr::Not(Box::new(self))
    }

    pub fn or(self, rhs: Expr) -> Expr {
        Expr::Or(Box::new(self), Box::new(rhs))
    }

    pub fn and(self, rhs: Expr) -> Expr {
        Expr::And(Box::new(self), Box::new(rhs))
    }
}

/// Argument handed to a rationale handler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerArg {
    /// The pending request stored for a parameterized operation.
    PendingField(String),
    /// A one-shot request object constructed at the call site.
    FreshRequest(String),
}

/// One branch of a result-method switch, keyed by request-code field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SwitchCase {
    pub request_code_field: String,
    pub body: Vec<Stmt>,
}

/// Statements of the synthesized control flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stmt {
    If {
        cond: Expr,
        then: Vec<Stmt>,
        #[serde(default)]
        otherwise: Vec<Stmt>,
    },
    /// Dispatch over the reported request code.
    Switch {
        cases: Vec<SwitchCase>,
        default: Vec<Stmt>,
    },
    /// Invoke the guarded operation on the host with the named arguments.
    InvokeOperation { operation: String, args: Vec<String> },
    /// Invoke a handler method on the host.
    InvokeHandler {
        handler: String,
        arg: Option<HandlerArg>,
    },
    /// Construct a pending request capturing the host and the listed
    /// arguments, and store it in the operation's pending slot.
    StorePending {
        field: String,
        request_type: String,
        args: Vec<String>,
    },
    /// `pending.grant()` on the stored request.
    GrantPending { field: String },
    /// Release the pending slot (captured parameters and host reference).
    ClearPending { field: String },
    /// Standard permission request, tagged with the operation's code.
    RequestPermissions {
        route: RequestRoute,
        receiver: Receiver,
        permission_field: String,
        request_code_field: String,
    },
    /// Settings-redirect request of a special permission.
    RequestViaSettings {
        action: SettingsAction,
        receiver: Receiver,
        request_code_field: String,
    },
    /// Upgrade the weak host back-reference; terminal no-op when the host
    /// is gone.
    UpgradeHostOrReturn,
    Return,
    Break,
}

/// A static field of the generated dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,
    pub kind: FieldKind,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    RequestCode(u32),
    PermissionLiteral(Vec<String>),
    PendingSlot { request_type: String },
}

/// A synthesized method: the per-operation check method or one of the
/// result-handling methods.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<Param>,
    pub body: Vec<Stmt>,
}

/// A synthesized pending-request type for one operation.
///
/// Holds a weak back-reference to the host plus the captured parameters;
/// every body starts with a liveness gate on that reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingRequestDef {
    pub type_name: String,
    pub operation: String,
    /// Implements the grantable capability (parameterized operation) rather
    /// than the plain one-shot request capability.
    pub grantable: bool,
    pub captured: Vec<Param>,
    pub proceed: Vec<Stmt>,
    pub cancel: Vec<Stmt>,
    pub grant: Option<Vec<Stmt>>,
}

impl PendingRequestDef {
    /// The request capability type the generated class conforms to.
    pub fn capability(&self) -> &'static str {
        if self.grantable {
            GRANTABLE_REQUEST_TYPE
        } else {
            PERMISSION_REQUEST_TYPE
        }
    }
}

/// The synthesis output for one host: a pure value, independently owned by
/// the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedDispatcher {
    pub host: String,
    pub type_name: String,
    pub type_params: Vec<String>,
    pub fields: Vec<FieldDef>,
    pub check_methods: Vec<MethodDef>,
    pub result_methods: Vec<MethodDef>,
    pub requests: Vec<PendingRequestDef>,
}

impl GeneratedDispatcher {
    pub fn field(&self, name: &str) -> Option<&FieldDef> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn check_method(&self, name: &str) -> Option<&MethodDef> {
        self.check_methods.iter().find(|m| m.name == name)
    }

    pub fn result_method(&self, name: &str) -> Option<&MethodDef> {
        self.result_methods.iter().find(|m| m.name == name)
    }
}

// ===== Stable naming scheme =====

pub fn request_code_field(operation: &str) -> String {
    format!("REQUEST_{}", operation.to_uppercase())
}

pub fn permission_field(operation: &str) -> String {
    format!("PERMISSION_{}", operation.to_uppercase())
}

pub fn pending_field(operation: &str) -> String {
    format!("PENDING_{}", operation.to_uppercase())
}

pub fn with_check_method(operation: &str) -> String {
    format!("{operation}_with_check")
}

pub fn request_type_name(operation: &str) -> String {
    format!("{}PermissionRequest", upper_first(operation))
}

pub fn dispatcher_type_name(host: &str) -> String {
    format!("{host}{DISPATCHER_SUFFIX}")
}

/// Standard result method, fed by the runtime-dialog outcome channel.
pub const ON_PERMISSION_RESULT: &str = "on_permission_result";

/// Special result method, fed by the settings-redirect outcome channel.
pub const ON_SETTINGS_RESULT: &str = "on_settings_result";

fn upper_first(value: &str) -> String {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

// ===== Tree traversal =====

/// Walk every statement of a body, depth first, including nested branches.
pub fn visit_stmts<'a>(stmts: &'a [Stmt], visit: &mut dyn FnMut(&'a Stmt)) {
    for stmt in stmts {
        visit(stmt);
        match stmt {
            Stmt::If {
                then, otherwise, ..
            } => {
                visit_stmts(then, visit);
                visit_stmts(otherwise, visit);
            }
            Stmt::Switch { cases, default } => {
                for case in cases {
                    visit_stmts(&case.body, visit);
                }
                visit_stmts(default, visit);
            }
            _ => {}
        }
    }
}

/// Walk every condition reachable from a body, including operands of
/// compound conditions.
pub fn visit_exprs<'a>(stmts: &'a [Stmt], visit: &mut dyn FnMut(&'a Expr)) {
    fn visit_expr<'a>(expr: &'a Expr, visit: &mut dyn FnMut(&'a Expr)) {
        visit(expr);
        match expr {
            Expr::Not(inner) => visit_expr(inner, visit),
            Expr::Or(lhs, rhs) | Expr::And(lhs, rhs) => {
                visit_expr(lhs, visit);
                visit_expr(rhs, visit);
            }
            _ => {}
        }
    }
    visit_stmts(stmts, &mut |stmt| {
        if let Stmt::If { cond, .. } = stmt {
            visit_expr(cond, visit);
        }
    });
}

/// True when any statement in the body (branches included) satisfies the
/// predicate.
pub fn any_stmt(stmts: &[Stmt], pred: impl Fn(&Stmt) -> bool) -> bool {
    let mut found = false;
    visit_stmts(stmts, &mut |stmt| {
        if pred(stmt) {
            found = true;
        }
    });
    found
}

/// True when any condition in the body satisfies the predicate.
pub fn any_expr(stmts: &[Stmt], pred: impl Fn(&Expr) -> bool) -> bool {
    let mut found = false;
    visit_exprs(stmts, &mut |expr| {
        if pred(expr) {
            found = true;
        }
    });
    found
}
