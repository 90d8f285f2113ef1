//! The dispatch synthesizer.
//!
//! Consumes a validated host and produces the abstract dispatcher
//! description: per-operation fields, the check method gating each guarded
//! operation, the result-handling methods fed by the platform's outcome
//! channels, and the pending-request types for deferred invocations.
//!
//! Special (settings-redirect) permissions and standard (runtime-dialog)
//! permissions are strictly partitioned: the partition is decided once here,
//! per operation, from the special registry the host was validated against,
//! and the two flows never share a result method.

use log::debug;

use crate::adapter::TargetAdapter;
use crate::codegen::{
    dispatcher_type_name, pending_field, permission_field, request_code_field,
    request_type_name, with_check_method, Expr, FieldDef, FieldKind, GeneratedDispatcher,
    HandlerArg, MethodDef, PendingRequestDef, Stmt, SwitchCase, ON_PERMISSION_RESULT,
    ON_SETTINGS_RESULT,
};
use crate::model::{GuardedOperation, HandlerKind, Param};
use crate::request_code::RequestCodeAllocator;
use crate::resolve::resolve_for_host;
use crate::special::{SpecialRegistry, SpecialStrategy};
use crate::validate::ValidatedHost;

/// Everything the synthesizer needs to know about one operation, resolved
/// up front: the special/standard partition, the stable field names, the
/// allocated request code and the matched handlers.
struct OpPlan<'a> {
    op: &'a GuardedOperation,
    strategy: Option<SpecialStrategy>,
    request_code: u32,
    code_field: String,
    perm_field: String,
    pending: Option<String>,
    rationale: Option<&'a str>,
    denied: Option<&'a str>,
    never_ask: Option<&'a str>,
}

impl<'a> OpPlan<'a> {
    fn is_special(&self) -> bool {
        self.strategy.is_some()
    }

    fn is_parameterized(&self) -> bool {
        self.op.is_parameterized()
    }

    fn arg_names(&self) -> Vec<String> {
        self.op.params.iter().map(|p| p.name.clone()).collect()
    }

    /// Rationale only exists for the standard flow; special permissions have
    /// no rationale concept even when a handler structurally resolves.
    fn effective_rationale(&self) -> Option<&'a str> {
        if self.is_special() {
            None
        } else {
            self.rationale
        }
    }

    /// A request type is materialized for parameterized operations (to
    /// capture arguments) and for standard operations with a rationale
    /// handler (the one-shot object handed to it).
    fn needs_request_type(&self) -> bool {
        self.is_parameterized() || self.effective_rationale().is_some()
    }
}

/// Synthesize the dispatcher description for a validated host.
///
/// Pure except for drawing request codes from the shared allocator; raises
/// no domain errors of its own (a structurally invalid host reaching this
/// point is a validator gap, not a user-facing condition).
pub fn synthesize(
    validated: &ValidatedHost<'_>,
    allocator: &RequestCodeAllocator,
    special: &SpecialRegistry,
) -> GeneratedDispatcher {
    let host = validated.host;
    let adapter = validated.adapter.as_ref();

    let plans: Vec<OpPlan<'_>> = host
        .operations
        .iter()
        .map(|op| {
            // Mixed sets were rejected earlier, so the first identifier
            // decides the partition.
            let strategy = op
                .permissions
                .first()
                .and_then(|p| special.lookup(p))
                .filter(|_| op.permissions.len() == 1);
            OpPlan {
                op,
                strategy,
                request_code: allocator.next(),
                code_field: request_code_field(&op.name),
                perm_field: permission_field(&op.name),
                pending: op.is_parameterized().then(|| pending_field(&op.name)),
                rationale: resolve_for_host(host, op, HandlerKind::Rationale)
                    .map(|h| h.name.as_str()),
                denied: resolve_for_host(host, op, HandlerKind::Denied).map(|h| h.name.as_str()),
                never_ask: resolve_for_host(host, op, HandlerKind::NeverAskAgain)
                    .map(|h| h.name.as_str()),
            }
        })
        .collect();

    let dispatcher = GeneratedDispatcher {
        host: host.name.clone(),
        type_name: dispatcher_type_name(&host.name),
        type_params: host.type_params.clone(),
        fields: create_fields(&plans),
        check_methods: plans
            .iter()
            .map(|plan| create_check_method(plan, adapter, host.name.as_str()))
            .collect(),
        result_methods: create_result_methods(&plans, adapter, host.name.as_str()),
        requests: plans
            .iter()
            .filter(|plan| plan.needs_request_type())
            .map(|plan| create_request_type(plan, adapter))
            .collect(),
    };
    debug!(
        "synthesized {} ({} operations, {} request types)",
        dispatcher.type_name,
        dispatcher.check_methods.len(),
        dispatcher.requests.len()
    );
    dispatcher
}

fn create_fields(plans: &[OpPlan<'_>]) -> Vec<FieldDef> {
    let mut fields = Vec::new();
    for plan in plans {
        fields.push(FieldDef {
            name: plan.code_field.clone(),
            kind: FieldKind::RequestCode(plan.request_code),
        });
        fields.push(FieldDef {
            name: plan.perm_field.clone(),
            kind: FieldKind::PermissionLiteral(plan.op.permissions.as_slice().to_vec()),
        });
        if let Some(pending) = &plan.pending {
            fields.push(FieldDef {
                name: pending.clone(),
                kind: FieldKind::PendingSlot {
                    request_type: request_type_name(&plan.op.name),
                },
            });
        }
    }
    fields
}

/// The request action of an operation: settings redirect for special
/// permissions, the adapter's request statement otherwise.
fn request_stmt(plan: &OpPlan<'_>, adapter: &dyn TargetAdapter) -> Stmt {
    match plan.strategy {
        Some(strategy) => {
            strategy.request_via_settings(adapter.context_receiver(), &plan.code_field)
        }
        None => adapter.request_permissions(&plan.perm_field, &plan.code_field),
    }
}

/// The grant condition of an operation: special permissions also pass when
/// the settings-backed capability is already held.
fn granted_expr(plan: &OpPlan<'_>, adapter: &dyn TargetAdapter) -> Expr {
    let standard = adapter.grant_check(&plan.perm_field);
    match plan.strategy {
        Some(strategy) => standard.or(strategy.capability_check(adapter.context_receiver())),
        None => standard,
    }
}

fn create_check_method(plan: &OpPlan<'_>, adapter: &dyn TargetAdapter, host: &str) -> MethodDef {
    // Not granted: parameterized operations first capture their arguments in
    // the pending slot, then an optional rationale branch, then the request.
    let mut not_granted = Vec::new();
    if let Some(pending) = &plan.pending {
        not_granted.push(Stmt::StorePending {
            field: pending.clone(),
            request_type: request_type_name(&plan.op.name),
            args: plan.arg_names(),
        });
    }
    match plan.effective_rationale() {
        Some(rationale) => {
            let arg = match &plan.pending {
                Some(pending) => HandlerArg::PendingField(pending.clone()),
                None => HandlerArg::FreshRequest(request_type_name(&plan.op.name)),
            };
            not_granted.push(Stmt::If {
                cond: adapter.rationale_check(&plan.perm_field),
                then: vec![Stmt::InvokeHandler {
                    handler: rationale.to_string(),
                    arg: Some(arg),
                }],
                otherwise: vec![request_stmt(plan, adapter)],
            });
        }
        None => not_granted.push(request_stmt(plan, adapter)),
    }

    let mut params = vec![Param::new("target", host)];
    params.extend(plan.op.params.iter().cloned());
    MethodDef {
        name: with_check_method(&plan.op.name),
        params,
        body: vec![Stmt::If {
            cond: granted_expr(plan, adapter),
            then: vec![Stmt::InvokeOperation {
                operation: plan.op.name.clone(),
                args: plan.arg_names(),
            }],
            otherwise: not_granted,
        }],
    }
}

fn create_result_methods(
    plans: &[OpPlan<'_>],
    adapter: &dyn TargetAdapter,
    host: &str,
) -> Vec<MethodDef> {
    let mut methods = Vec::new();

    let standard_cases: Vec<SwitchCase> = plans
        .iter()
        .filter(|plan| !plan.is_special())
        .map(|plan| SwitchCase {
            request_code_field: plan.code_field.clone(),
            body: result_case_body(plan, adapter),
        })
        .collect();
    if !standard_cases.is_empty() {
        methods.push(MethodDef {
            name: ON_PERMISSION_RESULT.to_string(),
            params: vec![
                Param::new("target", host),
                Param::new("request_code", "core.Int"),
                Param::new("grant_results", "core.IntArray"),
            ],
            body: vec![Stmt::Switch {
                cases: standard_cases,
                default: vec![Stmt::Break],
            }],
        });
    }

    let special_cases: Vec<SwitchCase> = plans
        .iter()
        .filter(|plan| plan.is_special())
        .map(|plan| SwitchCase {
            request_code_field: plan.code_field.clone(),
            body: result_case_body(plan, adapter),
        })
        .collect();
    if !special_cases.is_empty() {
        methods.push(MethodDef {
            name: ON_SETTINGS_RESULT.to_string(),
            params: vec![
                Param::new("target", host),
                Param::new("request_code", "core.Int"),
            ],
            body: vec![Stmt::Switch {
                cases: special_cases,
                default: vec![Stmt::Break],
            }],
        });
    }

    methods
}

fn result_case_body(plan: &OpPlan<'_>, adapter: &dyn TargetAdapter) -> Vec<Stmt> {
    let mut body = Vec::new();

    // Platforms below the runtime-permission threshold bypass the dialog and
    // report without granting; treat that as a denial and stop. Settings
    // redirects have no such threshold, so special operations skip this.
    if !plan.is_special() {
        let mut then = Vec::new();
        if let Some(denied) = plan.denied {
            then.push(Stmt::InvokeHandler {
                handler: denied.to_string(),
                arg: None,
            });
        }
        then.push(Stmt::Return);
        body.push(Stmt::If {
            cond: Expr::BelowRuntimeThreshold {
                receiver: adapter.context_receiver(),
            }
            .and(adapter.grant_check(&plan.perm_field).not()),
            then,
            otherwise: vec![],
        });
    }

    // Special permissions recompute the capability probe; standard ones
    // trust the reported grant results.
    let verified = match plan.strategy {
        Some(strategy) => strategy.capability_check(adapter.context_receiver()),
        None => Expr::AllResultsGranted,
    };

    let verified_branch = match &plan.pending {
        Some(pending) => vec![Stmt::If {
            cond: Expr::PendingPresent {
                field: pending.clone(),
            },
            then: vec![Stmt::GrantPending {
                field: pending.clone(),
            }],
            otherwise: vec![],
        }],
        None => vec![Stmt::InvokeOperation {
            operation: plan.op.name.clone(),
            args: vec![],
        }],
    };

    let denied_stmts: Vec<Stmt> = plan
        .denied
        .map(|denied| {
            vec![Stmt::InvokeHandler {
                handler: denied.to_string(),
                arg: None,
            }]
        })
        .unwrap_or_default();

    // Never-ask-again rides on the rationale-negative signal, which only
    // exists for the standard flow.
    let not_verified_branch = match plan.never_ask.filter(|_| !plan.is_special()) {
        Some(never_ask) => vec![Stmt::If {
            cond: adapter.rationale_check(&plan.perm_field).not(),
            then: vec![Stmt::InvokeHandler {
                handler: never_ask.to_string(),
                arg: None,
            }],
            otherwise: denied_stmts,
        }],
        None => denied_stmts,
    };

    body.push(Stmt::If {
        cond: verified,
        then: verified_branch,
        otherwise: not_verified_branch,
    });

    // Release captured parameters and the host reference whatever the
    // outcome was.
    if let Some(pending) = &plan.pending {
        body.push(Stmt::ClearPending {
            field: pending.clone(),
        });
    }
    body.push(Stmt::Break);
    body
}

fn create_request_type(plan: &OpPlan<'_>, adapter: &dyn TargetAdapter) -> PendingRequestDef {
    let proceed = vec![Stmt::UpgradeHostOrReturn, request_stmt(plan, adapter)];

    let cancel = match plan.denied {
        Some(denied) => vec![
            Stmt::UpgradeHostOrReturn,
            Stmt::InvokeHandler {
                handler: denied.to_string(),
                arg: None,
            },
        ],
        None => vec![],
    };

    let grant = plan.is_parameterized().then(|| {
        vec![
            Stmt::UpgradeHostOrReturn,
            Stmt::InvokeOperation {
                operation: plan.op.name.clone(),
                args: plan.arg_names(),
            },
        ]
    });

    PendingRequestDef {
        type_name: request_type_name(&plan.op.name),
        operation: plan.op.name.clone(),
        grantable: plan.is_parameterized(),
        captured: plan.op.params.clone(),
        proceed,
        cancel,
        grant,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::default_adapters;
    use crate::codegen::{any_expr, any_stmt};
    use crate::model::{
        GuardedOperation, HandlerMethod, PermissionHost, PermissionSet, ReturnKind, Visibility,
    };
    use crate::validate::validate_host;
    use pretty_assertions::assert_eq;

    fn host(operations: Vec<GuardedOperation>) -> PermissionHost {
        PermissionHost {
            name: "Gallery".into(),
            type_params: vec![],
            supertypes: vec!["platform.Screen".into()],
            operations,
            rationale_handlers: vec![],
            denied_handlers: vec![],
            never_ask_handlers: vec![],
        }
    }

    fn operation(name: &str, permissions: &[&str], params: Vec<Param>) -> GuardedOperation {
        GuardedOperation {
            name: name.into(),
            permissions: permissions.iter().copied().collect::<PermissionSet>(),
            params,
            visibility: Visibility::Public,
            returns: ReturnKind::Void,
        }
    }

    fn synthesize_host(host: &PermissionHost) -> GeneratedDispatcher {
        let adapters = default_adapters();
        let special = SpecialRegistry::default();
        let validated = validate_host(host, &adapters, &special).expect("host must validate");
        synthesize(&validated, &RequestCodeAllocator::new(), &special)
    }

    #[test]
    fn fields_follow_the_stable_scheme_per_operation() {
        let host = host(vec![
            operation("show_camera", &["platform.permission.CAMERA"], vec![]),
            operation(
                "save_note",
                &["platform.permission.STORAGE"],
                vec![Param::new("text", "core.String")],
            ),
        ]);
        let dispatcher = synthesize_host(&host);
        assert_eq!(
            dispatcher.field("REQUEST_SHOW_CAMERA").map(|f| &f.kind),
            Some(&FieldKind::RequestCode(0))
        );
        assert_eq!(
            dispatcher.field("REQUEST_SAVE_NOTE").map(|f| &f.kind),
            Some(&FieldKind::RequestCode(1))
        );
        assert!(dispatcher.field("PERMISSION_SHOW_CAMERA").is_some());
        // only the parameterized operation gets a pending slot
        assert!(dispatcher.field("PENDING_SHOW_CAMERA").is_none());
        assert_eq!(
            dispatcher.field("PENDING_SAVE_NOTE").map(|f| &f.kind),
            Some(&FieldKind::PendingSlot {
                request_type: "Save_notePermissionRequest".into()
            })
        );
    }

    #[test]
    fn request_type_only_when_parameterized_or_rationale() {
        let mut h = host(vec![
            operation("plain", &["platform.permission.CAMERA"], vec![]),
            operation(
                "with_args",
                &["platform.permission.STORAGE"],
                vec![Param::new("text", "core.String")],
            ),
        ]);
        let dispatcher = synthesize_host(&h);
        assert_eq!(dispatcher.requests.len(), 1);
        assert!(dispatcher.requests[0].grantable);

        // a rationale handler on the plain operation adds a one-shot type
        h.rationale_handlers.push(HandlerMethod {
            name: "on_plain_rationale".into(),
            permissions: ["platform.permission.CAMERA"].into_iter().collect(),
            params: vec![Param::new(
                "request",
                crate::model::PERMISSION_REQUEST_TYPE,
            )],
            visibility: Visibility::Public,
            returns: ReturnKind::Void,
        });
        let dispatcher = synthesize_host(&h);
        assert_eq!(dispatcher.requests.len(), 2);
        let one_shot = dispatcher
            .requests
            .iter()
            .find(|r| r.operation == "plain")
            .unwrap();
        assert!(!one_shot.grantable);
        assert_eq!(
            one_shot.capability(),
            crate::model::PERMISSION_REQUEST_TYPE
        );
        assert!(one_shot.grant.is_none());
        assert!(one_shot.cancel.is_empty());
    }

    #[test]
    fn grant_invokes_with_captured_parameters_in_order() {
        let h = host(vec![operation(
            "save_note",
            &["platform.permission.STORAGE"],
            vec![
                Param::new("title", "core.String"),
                Param::new("body", "core.String"),
            ],
        )]);
        let dispatcher = synthesize_host(&h);
        let request = &dispatcher.requests[0];
        assert_eq!(
            request.captured,
            vec![
                Param::new("title", "core.String"),
                Param::new("body", "core.String"),
            ]
        );
        let grant = request.grant.as_ref().unwrap();
        assert_eq!(grant[0], Stmt::UpgradeHostOrReturn);
        assert_eq!(
            grant[1],
            Stmt::InvokeOperation {
                operation: "save_note".into(),
                args: vec!["title".into(), "body".into()],
            }
        );
    }

    #[test]
    fn special_operations_dispatch_on_the_settings_channel_only() {
        let h = host(vec![
            operation("overlay", &[crate::special::SYSTEM_ALERT_WINDOW], vec![]),
            operation("camera", &["platform.permission.CAMERA"], vec![]),
        ]);
        let dispatcher = synthesize_host(&h);
        let standard = dispatcher.result_method(ON_PERMISSION_RESULT).unwrap();
        let special = dispatcher.result_method(ON_SETTINGS_RESULT).unwrap();
        let case_fields = |m: &MethodDef| match &m.body[0] {
            Stmt::Switch { cases, .. } => cases
                .iter()
                .map(|c| c.request_code_field.clone())
                .collect::<Vec<_>>(),
            _ => panic!("result method must be a switch"),
        };
        assert_eq!(case_fields(standard), vec!["REQUEST_CAMERA".to_string()]);
        assert_eq!(case_fields(special), vec!["REQUEST_OVERLAY".to_string()]);
    }

    #[test]
    fn result_methods_are_omitted_without_matching_operations() {
        let h = host(vec![operation(
            "camera",
            &["platform.permission.CAMERA"],
            vec![],
        )]);
        let dispatcher = synthesize_host(&h);
        assert!(dispatcher.result_method(ON_PERMISSION_RESULT).is_some());
        assert!(dispatcher.result_method(ON_SETTINGS_RESULT).is_none());
    }

    #[test]
    fn special_check_never_references_rationale() {
        let mut h = host(vec![operation(
            "overlay",
            &[crate::special::SYSTEM_ALERT_WINDOW],
            vec![],
        )]);
        h.rationale_handlers.push(HandlerMethod {
            name: "on_overlay_rationale".into(),
            permissions: [crate::special::SYSTEM_ALERT_WINDOW].into_iter().collect(),
            params: vec![Param::new(
                "request",
                crate::model::PERMISSION_REQUEST_TYPE,
            )],
            visibility: Visibility::Public,
            returns: ReturnKind::Void,
        });
        let dispatcher = synthesize_host(&h);
        let check = dispatcher.check_method("overlay_with_check").unwrap();
        assert!(!any_expr(&check.body, |e| matches!(
            e,
            Expr::ShouldShowRationale { .. }
        )));
        assert!(!any_stmt(&check.body, |s| matches!(
            s,
            Stmt::InvokeHandler { .. }
        )));
        // and no one-shot request type is materialized for it
        assert!(dispatcher.requests.is_empty());
    }

    #[test]
    fn legacy_guard_only_on_the_standard_channel() {
        let h = host(vec![
            operation("overlay", &[crate::special::SYSTEM_ALERT_WINDOW], vec![]),
            operation("camera", &["platform.permission.CAMERA"], vec![]),
        ]);
        let dispatcher = synthesize_host(&h);
        let standard = dispatcher.result_method(ON_PERMISSION_RESULT).unwrap();
        let special = dispatcher.result_method(ON_SETTINGS_RESULT).unwrap();
        assert!(any_expr(&standard.body, |e| matches!(
            e,
            Expr::BelowRuntimeThreshold { .. }
        )));
        assert!(!any_expr(&special.body, |e| matches!(
            e,
            Expr::BelowRuntimeThreshold { .. }
        )));
    }
}
