//! Structural description of a permission-gated host component.
//!
//! This is the input contract of the engine: a metadata extractor (not part
//! of this crate) turns host-language declarations into these values, and the
//! validator rejects anything malformed before synthesis runs.

use serde::{Deserialize, Serialize};

/// Capability type a rationale handler must accept as its single parameter.
pub const PERMISSION_REQUEST_TYPE: &str = "permgen.PermissionRequest";

/// Capability type implemented by pending requests of parameterized
/// operations (adds `grant()` on top of `proceed()`/`cancel()`).
pub const GRANTABLE_REQUEST_TYPE: &str = "permgen.GrantableRequest";

/// Declared visibility of a guarded or handler method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Visibility {
    Public,
    Protected,
    Private,
}

impl Visibility {
    /// The generated dispatcher has to call back into the host, so private
    /// methods are unreachable from it.
    pub fn is_accessible(&self) -> bool {
        !matches!(self, Visibility::Private)
    }
}

/// Declared return type, reduced to the only distinction the engine needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReturnKind {
    Void,
    Other(String),
}

impl ReturnKind {
    pub fn is_void(&self) -> bool {
        matches!(self, ReturnKind::Void)
    }
}

/// A typed method parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Param {
    pub name: String,
    pub ty: String,
}

impl Param {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Param {
            name: name.into(),
            ty: ty.into(),
        }
    }
}

/// An ordered set of permission identifiers.
///
/// Declaration order is preserved (it is what the generated permission
/// literal carries), but identity for handler matching and duplicate
/// detection is order-insensitive via [`PermissionSet::sorted_key`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PermissionSet(Vec<String>);

impl PermissionSet {
    pub fn new(permissions: Vec<String>) -> Self {
        PermissionSet(permissions)
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, permission: &str) -> bool {
        self.0.iter().any(|p| p == permission)
    }

    pub fn first(&self) -> Option<&str> {
        self.0.first().map(String::as_str)
    }

    /// Order-insensitive identity used for handler matching and duplicate
    /// detection.
    pub fn sorted_key(&self) -> Vec<String> {
        use itertools::Itertools;
        self.0.iter().cloned().sorted().collect()
    }

    /// Set equality, ignoring declaration order.
    pub fn set_eq(&self, other: &PermissionSet) -> bool {
        self.sorted_key() == other.sorted_key()
    }
}

impl<S: Into<String>> FromIterator<S> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        PermissionSet(iter.into_iter().map(Into::into).collect())
    }
}

/// The kind of an optional handler method.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    /// Shown before re-requesting, receives the in-flight request.
    Rationale,
    /// Invoked on a denied outcome.
    Denied,
    /// Invoked when the platform will no longer show the dialog.
    NeverAskAgain,
}

impl HandlerKind {
    pub fn label(&self) -> &'static str {
        match self {
            HandlerKind::Rationale => "rationale",
            HandlerKind::Denied => "denied",
            HandlerKind::NeverAskAgain => "never_ask_again",
        }
    }

    /// Required parameter count: rationale handlers take the request object,
    /// the terminal handlers take nothing.
    pub fn expected_arity(&self) -> usize {
        match self {
            HandlerKind::Rationale => 1,
            HandlerKind::Denied | HandlerKind::NeverAskAgain => 0,
        }
    }
}

/// A declared handler method, keyed by its permission set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerMethod {
    pub name: String,
    pub permissions: PermissionSet,
    #[serde(default)]
    pub params: Vec<Param>,
    pub visibility: Visibility,
    pub returns: ReturnKind,
}

/// A permission-gated operation declared on the host.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuardedOperation {
    pub name: String,
    pub permissions: PermissionSet,
    #[serde(default)]
    pub params: Vec<Param>,
    pub visibility: Visibility,
    pub returns: ReturnKind,
}

impl GuardedOperation {
    pub fn is_parameterized(&self) -> bool {
        !self.params.is_empty()
    }
}

/// One declared component: the unit of a synthesis call.
///
/// Owns its operations and handler lists for the duration of that call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermissionHost {
    pub name: String,
    #[serde(default)]
    pub type_params: Vec<String>,
    /// Declared supertype chain, outermost first. Adapter capability
    /// matching runs against these.
    #[serde(default)]
    pub supertypes: Vec<String>,
    pub operations: Vec<GuardedOperation>,
    #[serde(default)]
    pub rationale_handlers: Vec<HandlerMethod>,
    #[serde(default)]
    pub denied_handlers: Vec<HandlerMethod>,
    #[serde(default)]
    pub never_ask_handlers: Vec<HandlerMethod>,
}

impl PermissionHost {
    pub fn handlers(&self, kind: HandlerKind) -> &[HandlerMethod] {
        match kind {
            HandlerKind::Rationale => &self.rationale_handlers,
            HandlerKind::Denied => &self.denied_handlers,
            HandlerKind::NeverAskAgain => &self.never_ask_handlers,
        }
    }

    /// All guarded and handler methods, for checks that apply uniformly.
    pub fn all_methods(&self) -> impl Iterator<Item = MethodRef<'_>> {
        let ops = self.operations.iter().map(MethodRef::Operation);
        let handlers = [
            HandlerKind::Rationale,
            HandlerKind::Denied,
            HandlerKind::NeverAskAgain,
        ]
        .into_iter()
        .flat_map(|kind| {
            self.handlers(kind)
                .iter()
                .map(move |h| MethodRef::Handler(kind, h))
        });
        ops.chain(handlers)
    }
}

/// A uniform view over guarded operations and handlers, used by checks that
/// do not care which of the two they are looking at.
#[derive(Debug, Clone, Copy)]
pub enum MethodRef<'a> {
    Operation(&'a GuardedOperation),
    Handler(HandlerKind, &'a HandlerMethod),
}

impl<'a> MethodRef<'a> {
    pub fn name(&self) -> &'a str {
        match self {
            MethodRef::Operation(op) => &op.name,
            MethodRef::Handler(_, h) => &h.name,
        }
    }

    pub fn visibility(&self) -> Visibility {
        match self {
            MethodRef::Operation(op) => op.visibility,
            MethodRef::Handler(_, h) => h.visibility,
        }
    }

    pub fn returns(&self) -> &'a ReturnKind {
        match self {
            MethodRef::Operation(op) => &op.returns,
            MethodRef::Handler(_, h) => &h.returns,
        }
    }
}
