//! Registration of the built-in entity kinds.
//!
//! Applications call [`bootstrap`] once at startup on the registry they are
//! about to hand to the state manager. Everything here is ordinary use of
//! the public registration API — additional kinds and transitions register
//! the same way without touching this module.

use std::sync::Arc;

use joutai_types::{AnnotationState, ProjectState, StateTracked, TaskState};
use serde_json::{Map, Value};

use crate::error::{Result, StateError};
use crate::fields::{FieldKind, FieldSpec, FieldValues};
use crate::model::{StateChoices, StateModel};
use crate::registry::StateRegistry;
use crate::transition::{Transition, TransitionContext};

/// Register choices, models, and the starter transitions for the task,
/// annotation, and project kinds.
pub fn bootstrap(registry: &StateRegistry) {
    registry.register_choices("task", StateChoices::of::<TaskState>());
    registry.register_model(
        StateModel::new("task")
            .with_terminal(TaskState::Completed.as_str())
            .with_denormalize(|entity| snapshot(entity, &["project_id"])),
    );
    registry.register_transition("task", Arc::new(StartTask));
    registry.register_transition("task", Arc::new(CompleteTask));

    registry.register_choices("annotation", StateChoices::of::<AnnotationState>());
    registry.register_model(
        StateModel::new("annotation")
            .with_terminal(AnnotationState::Discarded.as_str())
            .with_denormalize(|entity| snapshot(entity, &["task_id", "project_id"])),
    );
    registry.register_transition("annotation", Arc::new(SubmitAnnotation));
    registry.register_transition("annotation", Arc::new(DiscardAnnotation));

    // Projects carry no denormalized snapshot.
    registry.register_choices("project", StateChoices::of::<ProjectState>());
    registry.register_model(
        StateModel::new("project").with_terminal(ProjectState::Archived.as_str()),
    );
    registry.register_transition("project", Arc::new(ArchiveProject));
}

/// Copy the named attributes the entity actually has.
fn snapshot(entity: &dyn StateTracked, names: &[&str]) -> Map<String, Value> {
    names
        .iter()
        .filter_map(|name| entity.attr(name).map(|v| (name.to_string(), v)))
        .collect()
}

/// Task picked up by an annotator.
struct StartTask;

impl Transition for StartTask {
    fn transition_name(&self) -> &str {
        "start"
    }

    fn target_state(&self) -> &str {
        TaskState::InProgress.as_str()
    }

    fn can_transition_from_state(&self, cx: &TransitionContext) -> Result<()> {
        match cx.current_state.as_deref() {
            Some(s) if s == TaskState::Created.as_str() => Ok(()),
            other => Err(StateError::rejected(
                self.transition_name(),
                format!("cannot start from {}", other.unwrap_or("no state")),
            )),
        }
    }
}

/// All annotations on the task are done.
struct CompleteTask;

impl Transition for CompleteTask {
    fn transition_name(&self) -> &str {
        "complete"
    }

    fn target_state(&self) -> &str {
        TaskState::Completed.as_str()
    }

    fn fields(&self) -> &[FieldSpec] {
        const FIELDS: &[FieldSpec] = &[FieldSpec {
            name: "score",
            kind: FieldKind::Float {
                min: Some(0.0),
                max: Some(1.0),
            },
            required: false,
        }];
        FIELDS
    }

    fn can_transition_from_state(&self, cx: &TransitionContext) -> Result<()> {
        match cx.current_state.as_deref() {
            Some(s) if s == TaskState::InProgress.as_str() => Ok(()),
            other => Err(StateError::rejected(
                self.transition_name(),
                format!("cannot complete from {}", other.unwrap_or("no state")),
            )),
        }
    }

    fn reason(&self, _cx: &TransitionContext, values: &FieldValues) -> String {
        match values.get_f64("score") {
            Some(score) => format!("completed with score {score}"),
            None => "completed".to_string(),
        }
    }
}

/// Annotator submits a draft.
struct SubmitAnnotation;

impl Transition for SubmitAnnotation {
    fn transition_name(&self) -> &str {
        "submit"
    }

    fn target_state(&self) -> &str {
        AnnotationState::Submitted.as_str()
    }

    fn fields(&self) -> &[FieldSpec] {
        const FIELDS: &[FieldSpec] = &[FieldSpec {
            name: "lead_time",
            kind: FieldKind::Float {
                min: Some(0.0),
                max: None,
            },
            required: false,
        }];
        FIELDS
    }

    fn can_transition_from_state(&self, cx: &TransitionContext) -> Result<()> {
        match cx.current_state.as_deref() {
            // A brand-new annotation may submit directly.
            None => Ok(()),
            Some(s) if s == AnnotationState::Draft.as_str() => Ok(()),
            Some(other) => Err(StateError::rejected(
                self.transition_name(),
                format!("cannot submit from {other}"),
            )),
        }
    }
}

/// Annotation thrown away; terminal.
struct DiscardAnnotation;

impl Transition for DiscardAnnotation {
    fn transition_name(&self) -> &str {
        "discard"
    }

    fn target_state(&self) -> &str {
        AnnotationState::Discarded.as_str()
    }

    fn fields(&self) -> &[FieldSpec] {
        const FIELDS: &[FieldSpec] = &[FieldSpec {
            name: "note",
            kind: FieldKind::Text {
                max_length: Some(256),
            },
            required: false,
        }];
        FIELDS
    }

    fn can_transition_from_state(&self, cx: &TransitionContext) -> Result<()> {
        match cx.current_state.as_deref() {
            Some(s) if s == AnnotationState::Discarded.as_str() => Err(StateError::rejected(
                self.transition_name(),
                "already discarded",
            )),
            _ => Ok(()),
        }
    }

    fn reason(&self, _cx: &TransitionContext, values: &FieldValues) -> String {
        values.get_str("note").unwrap_or_default().to_string()
    }
}

/// Project closed out; terminal.
struct ArchiveProject;

impl Transition for ArchiveProject {
    fn transition_name(&self) -> &str {
        "archive"
    }

    fn target_state(&self) -> &str {
        ProjectState::Archived.as_str()
    }

    fn can_transition_from_state(&self, cx: &TransitionContext) -> Result<()> {
        match cx.current_state.as_deref() {
            Some(s) if s == ProjectState::Archived.as_str() => {
                Err(StateError::rejected(self.transition_name(), "already archived"))
            }
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use joutai_types::EntityRef;
    use serde_json::json;

    #[test]
    fn test_bootstrap_registers_all_three_kinds() {
        let registry = StateRegistry::new();
        bootstrap(&registry);

        for kind in ["task", "annotation", "project"] {
            assert!(registry.get_model(kind).is_some(), "model for {kind}");
            assert!(registry.get_choices(kind).is_some(), "choices for {kind}");
        }

        let task_transitions: Vec<String> =
            registry.transitions_for("task").into_keys().collect();
        assert_eq!(task_transitions, vec!["complete", "start"]);
        assert!(registry.get_transition("annotation", "submit").is_some());
        assert!(registry.get_transition("project", "archive").is_some());
    }

    #[test]
    fn test_terminal_designations() {
        let registry = StateRegistry::new();
        bootstrap(&registry);

        assert!(registry.get_model("task").unwrap().is_terminal("COMPLETED"));
        assert!(
            registry
                .get_model("annotation")
                .unwrap()
                .is_terminal("DISCARDED")
        );
        assert!(registry.get_model("project").unwrap().is_terminal("ARCHIVED"));
    }

    #[test]
    fn test_snapshot_skips_missing_attributes() {
        // EntityRef has no attributes at all.
        let entity = EntityRef::new("task", 1);
        assert!(snapshot(&entity, &["project_id"]).is_empty());
    }

    #[test]
    fn test_complete_rejects_bad_score() {
        let err = FieldValues::validate(
            "complete",
            CompleteTask.fields(),
            json!({"score": 1.5}).as_object().unwrap(),
        )
        .unwrap_err();
        assert!(err.errors["score"][0].contains("at most 1"));
    }
}
