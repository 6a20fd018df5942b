//! Validators for generated branches.
//!
//! Three layers: narrative grounding (every reference resolves to the
//! manifest), delta plausibility (every target resolves to live state), and
//! branch structure (required variants present). Issues carry a stable code
//! and a severity; a branch fails only on ERROR-severity issues.

use sqlx::SqliteConnection;

use fateweaver_domain::{
    parse_refs, ItemOperation, QuantumBranch, StateDelta, SubjectType, VariantName,
};

use crate::managers::{ManagerError, Managers};
use crate::scene::NarratorManifest;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Error,
    Warning,
}

/// One validation finding.
#[derive(Debug, Clone)]
pub struct ValidationIssue {
    pub severity: Severity,
    /// Stable code, e.g. "unknown_reference", "unkeyed_reference".
    pub code: &'static str,
    pub message: String,
}

impl ValidationIssue {
    pub fn error(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            code,
            message: message.into(),
        }
    }

    pub fn warning(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            code,
            message: message.into(),
        }
    }
}

/// Whether any issue is an error.
pub fn has_errors(issues: &[ValidationIssue]) -> bool {
    issues.iter().any(|i| i.severity == Severity::Error)
}

/// Render issues as feedback for a regeneration attempt.
pub fn feedback(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| format!("- [{}] {}", i.code, i.message))
        .collect::<Vec<_>>()
        .join("\n")
}

// =============================================================================
// Narrative validator
// =============================================================================

/// Substring match on word boundaries, so "Ash" does not fire inside
/// "washes".
fn contains_word(haystack: &str, needle: &str) -> bool {
    let mut start = 0;
    while let Some(pos) = haystack[start..].find(needle) {
        let abs = start + pos;
        let before_ok = abs == 0
            || !haystack[..abs]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric());
        let after = abs + needle.len();
        let after_ok = after >= haystack.len()
            || !haystack[after..]
                .chars()
                .next()
                .is_some_and(|c| c.is_alphanumeric());
        if before_ok && after_ok {
            return true;
        }
        start = abs + 1;
    }
    false
}

const META_PHRASES: &[&str] = &[
    "what do you want to do",
    "what will you do",
    "what do you do next",
    "how do you respond",
];

pub struct NarrativeValidator;

impl NarrativeValidator {
    /// Check one narrative against the manifest it was generated from.
    pub fn validate(narrative: &str, manifest: &NarratorManifest) -> Vec<ValidationIssue> {
        let mut issues = Vec::new();

        let refs = parse_refs(narrative);
        for tag in &refs {
            if !manifest.contains_key(&tag.key) {
                issues.push(ValidationIssue::error(
                    "unknown_reference",
                    format!("reference [{}:{}] is not in the manifest", tag.key, tag.display),
                ));
            }
        }

        // Display names mentioned without a [key:...] wrapper.
        let stripped = fateweaver_domain::strip_refs(narrative).to_lowercase();
        let tagged_keys: Vec<&str> = refs.iter().map(|r| r.key.as_str()).collect();
        for (key, display) in manifest.display_names() {
            if display.len() < 3 {
                continue;
            }
            // The stripped text still contains the display text of proper
            // tags; only flag names that never appeared tagged.
            if contains_word(&stripped, &display.to_lowercase()) && !tagged_keys.contains(&key) {
                issues.push(ValidationIssue::error(
                    "unkeyed_reference",
                    format!("'{}' mentioned without a [{}:...] tag", display, key),
                ));
            }
        }

        let lower = narrative.to_lowercase();
        for phrase in META_PHRASES {
            if lower.contains(phrase) {
                issues.push(ValidationIssue::warning(
                    "meta_question",
                    format!("narrative asks the player '{}'", phrase),
                ));
            }
        }

        issues
    }
}

// =============================================================================
// Delta validator
// =============================================================================

pub struct DeltaValidator;

impl DeltaValidator {
    /// Check one delta against live store state.
    pub async fn validate(
        conn: &mut SqliteConnection,
        managers: &Managers,
        delta: &StateDelta,
    ) -> Result<Vec<ValidationIssue>, ManagerError> {
        let mut issues = Vec::new();

        let require_entity = |issues: &mut Vec<ValidationIssue>, exists: bool, key: &str| {
            if !exists {
                issues.push(ValidationIssue::error(
                    "unknown_entity",
                    format!("entity '{}' does not exist", key),
                ));
            }
        };

        match delta {
            StateDelta::Relationship {
                entity_key, toward, ..
            }
            | StateDelta::RelationshipMeeting {
                entity_key, toward, ..
            } => {
                for key in [entity_key, toward] {
                    let exists = managers.entities.try_get(conn, key.as_str()).await?.is_some();
                    require_entity(&mut issues, exists, key.as_str());
                }
            }
            StateDelta::Fact {
                subject_type,
                subject_key,
                ..
            } => {
                let exists = match subject_type {
                    SubjectType::Entity => managers
                        .entities
                        .try_get(conn, subject_key)
                        .await?
                        .is_some(),
                    SubjectType::Item => {
                        managers.items.try_get(conn, subject_key).await?.is_some()
                    }
                    SubjectType::Location => managers.locations.exists(conn, subject_key).await?,
                };
                if !exists {
                    issues.push(ValidationIssue::error(
                        "unknown_subject",
                        format!("fact subject '{}' does not exist", subject_key),
                    ));
                }
            }
            StateDelta::Item {
                item_key,
                operation,
                expected_holder,
            } => {
                match managers.items.try_get(conn, item_key.as_str()).await? {
                    None => issues.push(ValidationIssue::error(
                        "unknown_item",
                        format!("item '{}' does not exist", item_key),
                    )),
                    Some(item) => {
                        if let Some(expected) = expected_holder {
                            let actual = item.holder().map(|h| h.as_str());
                            if actual != Some(expected.as_str()) {
                                issues.push(ValidationIssue::error(
                                    "holder_mismatch",
                                    format!(
                                        "item '{}' held by {:?}, branch expected '{}'",
                                        item_key, actual, expected
                                    ),
                                ));
                            }
                        }
                    }
                }
                match operation {
                    ItemOperation::TransferTo { entity_key } => {
                        let exists = managers
                            .entities
                            .try_get(conn, entity_key.as_str())
                            .await?
                            .is_some();
                        require_entity(&mut issues, exists, entity_key.as_str());
                    }
                    ItemOperation::PlaceAt { location_key } => {
                        if !managers.locations.exists(conn, location_key.as_str()).await? {
                            issues.push(ValidationIssue::error(
                                "unknown_location",
                                format!("location '{}' does not exist", location_key),
                            ));
                        }
                    }
                    ItemOperation::StoreIn { storage_key } => {
                        if crate::store::storages::get(
                            conn,
                            managers.items.session_id(),
                            storage_key.as_str(),
                        )
                        .await
                        .map_err(ManagerError::from)?
                        .is_none()
                        {
                            issues.push(ValidationIssue::error(
                                "unknown_storage",
                                format!("storage '{}' does not exist", storage_key),
                            ));
                        }
                    }
                    ItemOperation::Destroy => {}
                }
            }
            StateDelta::Location {
                entity_key,
                to_location,
            } => {
                let exists = managers
                    .entities
                    .try_get(conn, entity_key.as_str())
                    .await?
                    .is_some();
                require_entity(&mut issues, exists, entity_key.as_str());
                if !managers.locations.exists(conn, to_location.as_str()).await? {
                    issues.push(ValidationIssue::error(
                        "unknown_location",
                        format!("location '{}' does not exist", to_location),
                    ));
                }
            }
            StateDelta::SatisfyNeed { entity_key, .. }
            | StateDelta::Damage { entity_key, .. }
            | StateDelta::Heal { entity_key, .. } => {
                let exists = managers
                    .entities
                    .try_get(conn, entity_key.as_str())
                    .await?
                    .is_some();
                require_entity(&mut issues, exists, entity_key.as_str());
            }
            StateDelta::Equip {
                entity_key,
                item_key,
                ..
            } => {
                let exists = managers
                    .entities
                    .try_get(conn, entity_key.as_str())
                    .await?
                    .is_some();
                require_entity(&mut issues, exists, entity_key.as_str());
                if managers.items.try_get(conn, item_key.as_str()).await?.is_none() {
                    issues.push(ValidationIssue::error(
                        "unknown_item",
                        format!("item '{}' does not exist", item_key),
                    ));
                }
            }
        }

        Ok(issues)
    }
}

// =============================================================================
// Branch validator
// =============================================================================

pub struct BranchValidator;

impl BranchValidator {
    /// Full structural + narrative + delta validation of a branch.
    pub async fn validate(
        conn: &mut SqliteConnection,
        managers: &Managers,
        branch: &QuantumBranch,
        manifest: &NarratorManifest,
    ) -> Result<Vec<ValidationIssue>, ManagerError> {
        let mut issues = Vec::new();

        if let Err(err) = branch.validate() {
            issues.push(ValidationIssue::error("bad_structure", err.to_string()));
        }
        if !branch.variants.contains_key(&VariantName::Success) {
            // Already covered by bad_structure, but keep the specific code
            // for feedback clarity.
            issues.push(ValidationIssue::error(
                "missing_success_variant",
                "branch has no success variant",
            ));
        }

        for (name, variant) in &branch.variants {
            for issue in NarrativeValidator::validate(&variant.narrative, manifest) {
                issues.push(ValidationIssue {
                    severity: issue.severity,
                    code: issue.code,
                    message: format!("{}: {}", name.as_str(), issue.message),
                });
            }
            for delta in &variant.state_deltas {
                for issue in DeltaValidator::validate(conn, managers, delta).await? {
                    issues.push(ValidationIssue {
                        severity: issue.severity,
                        code: issue.code,
                        message: format!("{}: {}", name.as_str(), issue.message),
                    });
                }
            }
        }

        Ok(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::ManifestBuilder;
    use crate::store::Store;
    use crate::test_support::seed_session;
    use fateweaver_domain::{EntityKey, ItemKey};

    async fn tavern_manifest(
        store: &Store,
        ctx: &crate::test_support::TestContext,
    ) -> NarratorManifest {
        let mut conn = store.pool().acquire().await.unwrap();
        ManifestBuilder::build(&mut conn, &ctx.managers, "tavern", "player")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_unknown_reference_flagged() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let manifest = tavern_manifest(&store, &ctx).await;

        let issues =
            NarrativeValidator::validate("[stranger_99:A stranger] waves.", &manifest);
        assert!(issues.iter().any(|i| i.code == "unknown_reference"));
        assert!(has_errors(&issues));
    }

    #[tokio::test]
    async fn test_unkeyed_reference_flagged() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let manifest = tavern_manifest(&store, &ctx).await;

        // "Marcus" is in the manifest but appears untagged.
        let issues = NarrativeValidator::validate("Marcus smiles warmly.", &manifest);
        assert!(issues.iter().any(|i| i.code == "unkeyed_reference"));
    }

    #[tokio::test]
    async fn test_proper_tags_pass() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let manifest = tavern_manifest(&store, &ctx).await;

        let issues = NarrativeValidator::validate(
            "[bartender_001:Marcus] wipes down the bar and nods.",
            &manifest,
        );
        assert!(!has_errors(&issues));
    }

    #[tokio::test]
    async fn test_meta_question_is_warning() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let manifest = tavern_manifest(&store, &ctx).await;

        let issues = NarrativeValidator::validate(
            "[bartender_001:Marcus] waits. What do you want to do?",
            &manifest,
        );
        assert!(issues.iter().any(|i| i.code == "meta_question"));
        assert!(!has_errors(&issues));
    }

    #[tokio::test]
    async fn test_delta_holder_mismatch() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();

        let delta = StateDelta::Item {
            item_key: ItemKey::new("rusty_key").unwrap(),
            operation: ItemOperation::TransferTo {
                entity_key: EntityKey::new("player").unwrap(),
            },
            expected_holder: Some(EntityKey::new("bartender_001").unwrap()),
        };
        let issues = DeltaValidator::validate(&mut conn, &ctx.managers, &delta)
            .await
            .unwrap();
        assert!(issues.iter().any(|i| i.code == "holder_mismatch"));
    }

    #[tokio::test]
    async fn test_delta_unknown_targets() {
        let store = Store::in_memory().await.unwrap();
        let ctx = seed_session(&store).await;
        let mut conn = store.pool().acquire().await.unwrap();

        let delta = StateDelta::Location {
            entity_key: EntityKey::new("nobody").unwrap(),
            to_location: fateweaver_domain::LocationKey::new("nowhere").unwrap(),
        };
        let issues = DeltaValidator::validate(&mut conn, &ctx.managers, &delta)
            .await
            .unwrap();
        assert!(issues.iter().any(|i| i.code == "unknown_entity"));
        assert!(issues.iter().any(|i| i.code == "unknown_location"));
    }
}
