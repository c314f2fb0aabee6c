//! The Pipeline Executor (spec §4.1): runs an event through an ordered list
//! of modules, folding their decisions into one `PipelineResult` while
//! upholding the chain invariants of spec §3 (P1-P3).

use std::sync::Arc;

use radius_core::{
    merge::deep_merge, Action, CanonicalEvent, Decision, Module, ModuleMode, PipelineResult,
    Severity, Transforms,
};

/// Run `event` through `modules` in order, short-circuiting on the first
/// enforced deny or challenge. `default_action` is returned verbatim when no
/// module applies to this event's phase.
pub async fn run(
    event: &CanonicalEvent,
    modules: &[Arc<dyn Module>],
    default_action: Action,
) -> PipelineResult {
    let applicable: Vec<&Arc<dyn Module>> = modules
        .iter()
        .filter(|m| m.phases().contains(&event.phase))
        .collect();

    let mut decisions = Vec::new();
    let mut alerts = Vec::new();
    let mut transforms = Transforms::default();
    let mut any_activity = false;

    for module in applicable {
        let name = module.name();
        match module.evaluate(event).await {
            Err(err) => {
                any_activity = true;
                match module.mode() {
                    ModuleMode::Enforce => {
                        let reason = format!("module error (fail-closed): {err}");
                        tracing::warn!(module = name, %err, "module error, fail-closed deny");
                        decisions.push(Decision::deny(name, reason.clone(), Severity::Critical));
                        return PipelineResult {
                            final_action: Action::Deny,
                            final_reason: reason,
                            transforms,
                            alerts,
                            decisions,
                        };
                    }
                    ModuleMode::Observe => {
                        tracing::warn!(module = name, %err, "module error in observe mode");
                        alerts.push(format!("[{name}] module error (observe): {err}"));
                    }
                }
            }
            Ok(decision) => {
                if module.mode() == ModuleMode::Observe
                    && matches!(decision.action, Action::Deny | Action::Challenge | Action::Modify)
                {
                    any_activity = true;
                    alerts.push(format!(
                        "observe-mode would {:?}: {}",
                        decision.action, decision.reason
                    ));
                    decisions.push(decision);
                    continue;
                }

                match decision.action {
                    Action::Deny | Action::Challenge => {
                        any_activity = true;
                        let final_action = decision.action;
                        let final_reason = decision.reason.clone();
                        decisions.push(decision);
                        return PipelineResult {
                            final_action,
                            final_reason,
                            transforms,
                            alerts,
                            decisions,
                        };
                    }
                    Action::Modify => {
                        any_activity = true;
                        if let Some(patch) = &decision.patch {
                            apply_patch(&mut transforms, patch);
                        }
                        decisions.push(decision);
                    }
                    Action::Alert => {
                        any_activity = true;
                        alerts.push(format!("[{name}] {}", decision.reason));
                    }
                    Action::Allow => {
                        decisions.push(decision);
                    }
                }
            }
        }
    }

    if any_activity || !decisions.is_empty() {
        PipelineResult {
            final_action: Action::Allow,
            final_reason: "allow after module evaluation".to_string(),
            transforms,
            alerts,
            decisions,
        }
    } else {
        PipelineResult {
            final_action: default_action,
            final_reason: "no applicable modules".to_string(),
            transforms,
            alerts,
            decisions,
        }
    }
}

fn apply_patch(transforms: &mut Transforms, patch: &radius_core::Patch) {
    if let Some(text) = &patch.request_text {
        transforms.request_text = Some(text.clone());
    }
    if let Some(text) = &patch.tool_result_text {
        transforms.tool_result_text = Some(text.clone());
    }
    if let Some(text) = &patch.response_text {
        transforms.response_text = Some(text.clone());
    }
    if let Some(args) = &patch.tool_arguments {
        transforms.tool_arguments = Some(match &transforms.tool_arguments {
            Some(existing) => deep_merge(existing, args),
            None => args.clone(),
        });
    }
}
