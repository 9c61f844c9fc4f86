//! The living Spec: an evolving structured description of the application
//! to build, plus the intents that mutate it.
//!
//! All mutation is append-only: merges add entities, fields, pages and
//! set-like values but never delete or rewrite anything already present.
//! Field-name collisions with a different type resolve first-write-wins
//! with no conflict signal -- a documented policy, not an accident.

pub mod store;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// One typed field of an entity, serialized as a `[name, type]` pair to
/// match the artifact format.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Field(pub String, pub String);

impl Field {
    pub fn new(name: impl Into<String>, ty: impl Into<String>) -> Self {
        Self(name.into(), ty.into())
    }

    pub fn name(&self) -> &str {
        &self.0
    }

    pub fn field_type(&self) -> &str {
        &self.1
    }
}

/// A named data entity with an ordered field list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    pub name: String,
    #[serde(default)]
    pub fields: Vec<Field>,
}

/// Whether a Spec artifact is the live document or a frozen snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpecStatus {
    Live,
    Frozen,
}

/// Artifact metadata envelope (kept nested for artifact-format stability).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpecMetadata {
    pub status: SpecStatus,
}

/// The living Spec for one project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Spec {
    pub project_id: String,
    pub entities: Vec<Entity>,
    pub pages: Vec<String>,
    pub integrations: Vec<String>,
    pub acceptance: Vec<String>,
    pub constraints: Vec<String>,
    pub metadata: SpecMetadata,
}

/// An immutable snapshot of a Spec taken at build time.
///
/// Owning wrapper: a `FrozenSpec` is independent of the live Spec it was
/// copied from, and the planner requires one at the type level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FrozenSpec(Spec);

impl FrozenSpec {
    pub fn as_spec(&self) -> &Spec {
        &self.0
    }

    pub fn project_id(&self) -> &str {
        &self.0.project_id
    }
}

/// One incremental change request merged into a live Spec.
///
/// A closed tagged variant: unrecognized intent types fail deserialization
/// at the system boundary and never reach merge logic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum Intent {
    Entity(Entity),
    FeatureRequest(String),
    Integration(String),
    Constraint(String),
    Acceptance(String),
}

impl Intent {
    /// An intent with an empty payload carries nothing to merge.
    pub fn payload_is_empty(&self) -> bool {
        match self {
            Intent::Entity(entity) => entity.name.is_empty(),
            Intent::FeatureRequest(s)
            | Intent::Integration(s)
            | Intent::Constraint(s)
            | Intent::Acceptance(s) => s.is_empty(),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge rules
// ---------------------------------------------------------------------------

impl Spec {
    /// A blank live Spec for a new project.
    pub fn blank(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            entities: Vec::new(),
            pages: Vec::new(),
            integrations: Vec::new(),
            acceptance: Vec::new(),
            constraints: Vec::new(),
            metadata: SpecMetadata {
                status: SpecStatus::Live,
            },
        }
    }

    /// Merge one intent into the Spec. Append-only; returns `true` if the
    /// intent was recognized and non-empty (even when the merge turned out
    /// to be a no-op duplicate).
    ///
    /// Empty-payload intents are logged and ignored, leaving the Spec
    /// unchanged.
    pub fn merge(&mut self, intent: &Intent) -> bool {
        if intent.payload_is_empty() {
            warn!(project_id = %self.project_id, ?intent, "ignoring intent with empty payload");
            return false;
        }

        match intent {
            Intent::Entity(entity) => self.merge_entity(entity),
            Intent::FeatureRequest(page) => append_unique(&mut self.pages, page),
            Intent::Integration(name) => append_unique(&mut self.integrations, name),
            Intent::Constraint(text) => append_unique(&mut self.constraints, text),
            Intent::Acceptance(text) => append_unique(&mut self.acceptance, text),
        }
        true
    }

    /// Entity merge: a new name appends a full record; a known name appends
    /// only fields whose names are unseen on that entity. A field whose name
    /// collides (same or different type) is dropped, first write wins.
    fn merge_entity(&mut self, incoming: &Entity) {
        let index = match self.entities.iter().position(|e| e.name == incoming.name) {
            Some(index) => index,
            None => {
                debug!(entity = %incoming.name, "adding entity");
                self.entities.push(Entity {
                    name: incoming.name.clone(),
                    fields: Vec::new(),
                });
                self.entities.len() - 1
            }
        };
        let entity = &mut self.entities[index];

        for field in &incoming.fields {
            if entity.fields.iter().any(|f| f.name() == field.name()) {
                debug!(entity = %entity.name, field = %field.name(), "dropping colliding field");
            } else {
                debug!(entity = %entity.name, field = %field.name(), "adding field");
                entity.fields.push(field.clone());
            }
        }
    }

    /// Deep-copy into a frozen snapshot. The live Spec is untouched.
    pub fn freeze(&self) -> FrozenSpec {
        let mut snapshot = self.clone();
        snapshot.metadata.status = SpecStatus::Frozen;
        FrozenSpec(snapshot)
    }
}

fn append_unique(values: &mut Vec<String>, value: &str) {
    if !values.iter().any(|v| v == value) {
        values.push(value.to_string());
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn lead_entity() -> Entity {
        Entity {
            name: "Lead".to_string(),
            fields: vec![Field::new("name", "text"), Field::new("email", "text")],
        }
    }

    #[test]
    fn merge_new_entity_appends_record() {
        let mut spec = Spec::blank("p1");
        assert!(spec.merge(&Intent::Entity(lead_entity())));
        assert_eq!(spec.entities.len(), 1);
        assert_eq!(spec.entities[0].fields.len(), 2);
    }

    #[test]
    fn merge_known_entity_appends_only_new_fields() {
        let mut spec = Spec::blank("p1");
        spec.merge(&Intent::Entity(lead_entity()));

        let update = Entity {
            name: "Lead".to_string(),
            fields: vec![Field::new("email", "text"), Field::new("phone", "text")],
        };
        spec.merge(&Intent::Entity(update));

        assert_eq!(spec.entities.len(), 1);
        let names: Vec<&str> = spec.entities[0].fields.iter().map(Field::name).collect();
        assert_eq!(names, vec!["name", "email", "phone"]);
    }

    #[test]
    fn colliding_field_with_different_type_is_dropped() {
        let mut spec = Spec::blank("p1");
        spec.merge(&Intent::Entity(lead_entity()));

        let update = Entity {
            name: "Lead".to_string(),
            fields: vec![Field::new("email", "number")],
        };
        spec.merge(&Intent::Entity(update));

        // First write wins, no conflict signal.
        assert_eq!(spec.entities[0].fields[1], Field::new("email", "text"));
    }

    #[test]
    fn remerging_identical_field_is_idempotent() {
        let mut spec = Spec::blank("p1");
        spec.merge(&Intent::Entity(lead_entity()));
        spec.merge(&Intent::Entity(lead_entity()));
        assert_eq!(spec.entities[0].fields.len(), 2);
    }

    #[test]
    fn incoming_duplicate_field_names_are_deduplicated() {
        let mut spec = Spec::blank("p1");
        let entity = Entity {
            name: "Dog".to_string(),
            fields: vec![Field::new("name", "text"), Field::new("name", "number")],
        };
        spec.merge(&Intent::Entity(entity));
        assert_eq!(spec.entities[0].fields, vec![Field::new("name", "text")]);
    }

    #[test]
    fn page_and_set_merges_are_idempotent() {
        let mut spec = Spec::blank("p1");
        spec.merge(&Intent::FeatureRequest("Dashboard".to_string()));
        spec.merge(&Intent::FeatureRequest("Dashboard".to_string()));
        spec.merge(&Intent::Integration("stripe".to_string()));
        spec.merge(&Intent::Constraint("GDPR".to_string()));
        spec.merge(&Intent::Acceptance("loads under 1s".to_string()));

        assert_eq!(spec.pages, vec!["Dashboard"]);
        assert_eq!(spec.integrations, vec!["stripe"]);
        assert_eq!(spec.constraints, vec!["GDPR"]);
        assert_eq!(spec.acceptance, vec!["loads under 1s"]);
    }

    #[test]
    fn empty_payload_is_ignored() {
        let mut spec = Spec::blank("p1");
        assert!(!spec.merge(&Intent::FeatureRequest(String::new())));
        assert!(!spec.merge(&Intent::Entity(Entity {
            name: String::new(),
            fields: vec![Field::new("x", "text")],
        })));
        assert_eq!(spec, Spec::blank("p1"));
    }

    #[test]
    fn freeze_marks_snapshot_not_live_spec() {
        let mut spec = Spec::blank("p1");
        spec.merge(&Intent::FeatureRequest("Home".to_string()));

        let frozen = spec.freeze();
        assert_eq!(frozen.as_spec().metadata.status, SpecStatus::Frozen);
        assert_eq!(spec.metadata.status, SpecStatus::Live);
        assert_eq!(frozen.as_spec().pages, spec.pages);
    }

    #[test]
    fn frozen_snapshot_is_independent_of_live_mutation() {
        let mut spec = Spec::blank("p1");
        let frozen = spec.freeze();
        spec.merge(&Intent::FeatureRequest("Home".to_string()));
        assert!(frozen.as_spec().pages.is_empty());
    }

    #[test]
    fn unknown_intent_type_fails_deserialization() {
        let raw = r#"{"type": "deployment_target", "data": "aws"}"#;
        assert!(serde_json::from_str::<Intent>(raw).is_err());
    }

    #[test]
    fn intent_deserializes_original_wire_shape() {
        let raw = r#"{"type": "entity", "data": {"name": "Lead", "fields": [["name", "text"]]}}"#;
        let intent: Intent = serde_json::from_str(raw).unwrap();
        match intent {
            Intent::Entity(e) => {
                assert_eq!(e.name, "Lead");
                assert_eq!(e.fields, vec![Field::new("name", "text")]);
            }
            other => panic!("expected entity intent, got {other:?}"),
        }
    }
}
