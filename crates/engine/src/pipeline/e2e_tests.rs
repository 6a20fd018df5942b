//! End-to-end turn pipeline scenarios against an in-memory store and a
//! scripted LLM.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use fateweaver_domain::{
    ActionPrediction, ActionType, BranchKey, CheckResolution, EntityKey, GmDecision, ItemKey,
    ItemOperation, LocationKey, OutcomeVariant, QuantumBranch, SessionId, Skill, StateDelta,
    SubjectType, VariantName,
};

use crate::infrastructure::clock::SystemClock;
use crate::infrastructure::gateway::{LlmGateway, RoleSettings};
use crate::infrastructure::ports::{
    FinishReason, LlmError, LlmPort, LlmRequest, LlmResponse, RandomPort, ToolDefinition,
};
use crate::infrastructure::random::SequenceRandom;
use crate::managers::Managers;
use crate::pipeline::anticipation::AnticipationState;
use crate::pipeline::cache::BranchCache;
use crate::pipeline::collapse::CollapseManager;
use crate::pipeline::generator::BranchGenerator;
use crate::pipeline::matcher::ActionMatcher;
use crate::pipeline::oracle::GmDecisionOracle;
use crate::pipeline::predictor::ActionPredictor;
use crate::pipeline::turn::TurnPipeline;
use crate::store::Store;
use crate::test_support::seed_session;

/// LLM returning scripted payloads in call order; repeats the last one.
struct ScriptedLlm {
    payloads: Vec<String>,
    cursor: AtomicUsize,
}

impl ScriptedLlm {
    fn new(payloads: Vec<&str>) -> Arc<Self> {
        Arc::new(Self {
            payloads: payloads.into_iter().map(String::from).collect(),
            cursor: AtomicUsize::new(0),
        })
    }
}

#[async_trait]
impl LlmPort for ScriptedLlm {
    async fn generate(&self, _request: LlmRequest) -> Result<LlmResponse, LlmError> {
        let index = self.cursor.fetch_add(1, Ordering::SeqCst);
        Ok(LlmResponse {
            content: self.payloads[index.min(self.payloads.len() - 1)].clone(),
            tool_calls: vec![],
            finish_reason: FinishReason::Stop,
            usage: None,
        })
    }

    async fn generate_with_tools(
        &self,
        request: LlmRequest,
        _tools: Vec<ToolDefinition>,
    ) -> Result<LlmResponse, LlmError> {
        self.generate(request).await
    }
}

struct Harness {
    pipeline: TurnPipeline,
    cache: Arc<BranchCache>,
    store: Store,
    session_id: SessionId,
    managers: Arc<Managers>,
}

fn build_harness(
    store: Store,
    session_id: SessionId,
    managers: Managers,
    llm: Arc<dyn LlmPort>,
    rolls: Vec<i32>,
) -> Harness {
    let settings = RoleSettings {
        temperature: 0.2,
        max_tokens: 2048,
    };
    let gateway = Arc::new(LlmGateway::single(llm, settings, settings));
    let managers = Arc::new(managers);
    let random: Arc<dyn RandomPort> = Arc::new(SequenceRandom::new(rolls));
    let cache = Arc::new(BranchCache::new(
        50,
        std::time::Duration::from_secs(180),
    ));
    let collapse = CollapseManager::new(
        store.clone(),
        session_id,
        Arc::clone(&random),
        Arc::new(SystemClock),
    );
    let pipeline = TurnPipeline::new(
        store.clone(),
        session_id,
        Arc::clone(&managers),
        Arc::new(ActionPredictor::new(5)),
        Arc::new(GmDecisionOracle::new(2)),
        Arc::new(BranchGenerator::new(gateway, 2)),
        ActionMatcher::new(0.7),
        Arc::clone(&cache),
        collapse,
        Arc::new(SystemClock),
        Arc::new(AnticipationState::new()),
    );
    Harness {
        pipeline,
        cache,
        store,
        session_id,
        managers,
    }
}

fn variant(narrative: &str, deltas: Vec<StateDelta>, dice: Option<(Skill, i32)>) -> OutcomeVariant {
    OutcomeVariant {
        narrative: narrative.to_string(),
        state_deltas: deltas,
        requires_dice: dice.is_some(),
        dc: dice.as_ref().map(|(_, dc)| *dc),
        skill: dice.map(|(skill, _)| skill),
        time_passed_minutes: 1,
    }
}

fn branch(
    key: BranchKey,
    action: ActionPrediction,
    variants: Vec<(VariantName, OutcomeVariant)>,
    state_version: u64,
) -> QuantumBranch {
    QuantumBranch {
        key,
        action,
        decision: GmDecision::no_twist(),
        variants: variants.into_iter().collect(),
        generated_at: Utc::now(),
        state_version,
        generation_ms: 12,
    }
}

fn greet_branch(state_version: u64) -> QuantumBranch {
    let action = ActionPrediction {
        action_type: ActionType::InteractNpc,
        target_key: Some("bartender_001".to_string()),
        target_display: Some("Marcus".to_string()),
        input_patterns: vec![
            r"(?i)\b(talk|speak|ask|greet|chat|say)\b.*(marcus|bartender)".to_string(),
        ],
        probability: 0.5,
        reason: "npc present".to_string(),
    };
    branch(
        BranchKey::new(
            LocationKey::new("tavern").unwrap(),
            ActionType::InteractNpc,
            Some("bartender_001".to_string()),
            "no_twist",
        ),
        action,
        vec![(
            VariantName::Success,
            variant("[bartender_001:Marcus] nods.", vec![], None),
        )],
        state_version,
    )
}

fn lockpick_branch(state_version: u64, dc: i32) -> QuantumBranch {
    let action = ActionPrediction {
        action_type: ActionType::TakeItem,
        target_key: Some("rusty_key".to_string()),
        target_display: Some("rusty key".to_string()),
        input_patterns: vec![r"(?i)\b(take|grab|pick|get)\b.*(rusty key|rusty|key)".to_string()],
        probability: 0.5,
        reason: "item visible".to_string(),
    };
    let lock_open_fact = StateDelta::Fact {
        subject_type: SubjectType::Location,
        subject_key: "cellar".to_string(),
        predicate: "lock_state".to_string(),
        value: "open".to_string(),
        operation: Default::default(),
        is_secret: false,
    };
    let take_key = StateDelta::Item {
        item_key: ItemKey::new("rusty_key").unwrap(),
        operation: ItemOperation::TransferTo {
            entity_key: EntityKey::new("player").unwrap(),
        },
        expected_holder: None,
    };
    branch(
        BranchKey::new(
            LocationKey::new("tavern").unwrap(),
            ActionType::TakeItem,
            Some("rusty_key".to_string()),
            "no_twist",
        ),
        action,
        vec![
            (
                VariantName::Success,
                variant(
                    "[player:Ash] works the [rusty_key:rusty key] free of the lock.",
                    vec![take_key, lock_open_fact],
                    Some((Skill::Lockpicking, dc)),
                ),
            ),
            (
                VariantName::Failure,
                variant(
                    "The [rusty_key:rusty key] refuses to budge.",
                    vec![],
                    None,
                ),
            ),
            (
                VariantName::CriticalFailure,
                variant(
                    "The [rusty_key:rusty key] snaps off in the lock.",
                    vec![StateDelta::Item {
                        item_key: ItemKey::new("rusty_key").unwrap(),
                        operation: ItemOperation::Destroy,
                        expected_holder: None,
                    }],
                    None,
                ),
            ),
        ],
        state_version,
    )
}

const OBSERVE_PAYLOAD: &str = r#"{
    "variants": {
        "success": {
            "narrative": "You lean closer. The marks on the wall are old knife scores, nothing arcane, and [bartender_001:Marcus] watches you study them.",
            "stateDeltas": [],
            "requiresDice": false,
            "timePassedMinutes": 2
        }
    }
}"#;

// "Marcus" is in the manifest but appears without its tag: an unkeyed
// reference the validator must reject.
const UNGROUNDED_PAYLOAD: &str = r#"{
    "variants": {
        "success": {
            "narrative": "Marcus smiles.",
            "stateDeltas": [],
            "requiresDice": false,
            "timePassedMinutes": 1
        }
    }
}"#;

// Scenario: cache-hit greet.
#[tokio::test]
async fn test_cache_hit_greet() {
    let store = Store::in_memory().await.unwrap();
    let ctx = seed_session(&store).await;
    let harness = build_harness(
        store,
        ctx.session_id,
        ctx.managers,
        ScriptedLlm::new(vec![OBSERVE_PAYLOAD]),
        vec![5, 5],
    );
    harness.cache.insert(greet_branch(0)).await;

    let result = harness
        .pipeline
        .process_turn("greet the bartender", "tavern", 1)
        .await;

    assert!(result.was_cache_hit);
    assert_eq!(result.narrative, "Marcus nods.");
    assert!(result.latency_ms < 200);
    assert!(result.errors.is_empty());

    let mut conn = harness.store.pool().acquire().await.unwrap();
    let version = crate::store::sessions::state_version(&mut conn, harness.session_id)
        .await
        .unwrap();
    assert!(version >= 1);
    let turn = crate::store::turns::get(&mut conn, &harness.session_id.to_string(), 1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(turn.gm_response, "[bartender_001:Marcus] nods.");
}

// Scenario: cache-miss observe falls back to sync generation.
#[tokio::test]
async fn test_cache_miss_observe() {
    let store = Store::in_memory().await.unwrap();
    let ctx = seed_session(&store).await;
    let harness = build_harness(
        store,
        ctx.session_id,
        ctx.managers,
        ScriptedLlm::new(vec![OBSERVE_PAYLOAD]),
        vec![5, 5],
    );

    let result = harness
        .pipeline
        .process_turn("examine the rune on the wall", "tavern", 1)
        .await;

    assert!(!result.was_cache_hit);
    assert!(result.narrative.contains("knife scores"));
    // Tag stripped, reference grounded.
    assert!(!result.narrative.contains('['));
    assert!(result.raw_narrative.contains("[bartender_001:Marcus]"));
    assert!(result.errors.is_empty());
}

// Scenario: dice-gated success applies the success variant's deltas.
#[tokio::test]
async fn test_dice_gated_success() {
    let store = Store::in_memory().await.unwrap();
    let ctx = seed_session(&store).await;
    // Player lockpicking modifier +2; DC 16 forces a roll. 7+7+2 = 16.
    let harness = build_harness(
        store,
        ctx.session_id,
        ctx.managers,
        ScriptedLlm::new(vec![OBSERVE_PAYLOAD]),
        vec![7, 7],
    );
    harness.cache.insert(lockpick_branch(0, 16)).await;

    let result = harness
        .pipeline
        .process_turn("pick up the rusty key", "tavern", 1)
        .await;

    assert!(result.was_cache_hit);
    let dice = result.dice_result.expect("dice were rolled");
    assert!(dice.is_success());

    let mut conn = harness.store.pool().acquire().await.unwrap();
    let fact = harness
        .managers
        .facts
        .find(&mut conn, SubjectType::Location, "cellar", "lock_state")
        .await
        .unwrap()
        .expect("lock state recorded");
    assert_eq!(fact.value, "open");
    let inventory = harness
        .managers
        .items
        .inventory(&mut conn, "player")
        .await
        .unwrap();
    assert!(inventory.iter().any(|i| i.key.as_str() == "rusty_key"));
}

// Scenario: forced double-1 selects the critical failure variant.
#[tokio::test]
async fn test_critical_failure_variant() {
    let store = Store::in_memory().await.unwrap();
    let ctx = seed_session(&store).await;
    let harness = build_harness(
        store,
        ctx.session_id,
        ctx.managers,
        ScriptedLlm::new(vec![OBSERVE_PAYLOAD]),
        vec![1, 1],
    );
    harness.cache.insert(lockpick_branch(0, 16)).await;

    let result = harness
        .pipeline
        .process_turn("grab the rusty key", "tavern", 1)
        .await;

    let dice = result.dice_result.expect("dice were rolled");
    assert_eq!(dice.resolution, CheckResolution::CriticalFailure);
    assert!(result.narrative.contains("snaps off"));

    // The critical failure variant destroyed the key.
    let mut conn = harness.store.pool().acquire().await.unwrap();
    let item = harness
        .managers
        .items
        .try_get(&mut conn, "rusty_key")
        .await
        .unwrap();
    assert!(item.is_none());
}

// Scenario: a stale branch is dropped and the sync path recovers.
#[tokio::test]
async fn test_stale_branch_falls_back_to_sync() {
    let store = Store::in_memory().await.unwrap();
    let ctx = seed_session(&store).await;
    let harness = build_harness(
        store,
        ctx.session_id,
        ctx.managers,
        ScriptedLlm::new(vec![OBSERVE_PAYLOAD]),
        vec![5, 5],
    );
    // Branch generated at state version 7; the session is at 0.
    harness.cache.insert(greet_branch(7)).await;

    let result = harness
        .pipeline
        .process_turn("greet the bartender", "tavern", 1)
        .await;

    // The cache dropped the stale entry; the turn still succeeded.
    assert!(!result.was_cache_hit);
    assert!(!result.narrative.is_empty());
    let stats = harness.pipeline.get_cache_stats().await;
    assert_eq!(stats.stale_evictions, 1);

    // No half-applied state: exactly one turn, consistent counters.
    let mut conn = harness.store.pool().acquire().await.unwrap();
    let session = crate::store::sessions::get(&mut conn, harness.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.total_turns, 1);
}

// Scenario: persistent grounding failure ends in the narrator fallback.
#[tokio::test]
async fn test_grounding_rejection_recovers() {
    let store = Store::in_memory().await.unwrap();
    let ctx = seed_session(&store).await;
    let harness = build_harness(
        store,
        ctx.session_id,
        ctx.managers,
        // Every attempt mentions an entity without a tag.
        ScriptedLlm::new(vec![UNGROUNDED_PAYLOAD]),
        vec![5, 5],
    );

    let result = harness
        .pipeline
        .process_turn("examine the rune on the wall", "tavern", 1)
        .await;

    // Fallback narrative, still grounded and tag-free.
    assert!(!result.narrative.is_empty());
    assert!(!result.narrative.contains('['));
    assert!(result.errors.iter().any(|e| e.code == "fallback"));

    // The session continues: the turn was recorded and the next one works.
    let mut conn = harness.store.pool().acquire().await.unwrap();
    let session = crate::store::sessions::get(&mut conn, harness.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(session.total_turns, 1);
    assert!(session.state_version >= 1);
    drop(conn);

    harness.cache.insert(greet_branch(session.state_version)).await;
    let next = harness
        .pipeline
        .process_turn("greet the bartender", "tavern", 2)
        .await;
    assert!(next.was_cache_hit);
}

// Topic-carrying dialogue bypasses the cache even when a branch is there.
#[tokio::test]
async fn test_topic_dialogue_bypasses_cache() {
    let store = Store::in_memory().await.unwrap();
    let ctx = seed_session(&store).await;
    let harness = build_harness(
        store,
        ctx.session_id,
        ctx.managers,
        ScriptedLlm::new(vec![OBSERVE_PAYLOAD]),
        vec![5, 5],
    );
    harness.cache.insert(greet_branch(0)).await;

    let result = harness
        .pipeline
        .process_turn("ask the bartender about the rumors", "tavern", 1)
        .await;

    assert!(!result.was_cache_hit);
    let stats = harness.pipeline.get_cache_stats().await;
    assert_eq!(stats.hits, 0);
}

// Turn numbers are strictly increasing and turns immutable: a duplicate
// turn number cannot be written.
#[tokio::test]
async fn test_turn_immutability() {
    let store = Store::in_memory().await.unwrap();
    let ctx = seed_session(&store).await;
    let harness = build_harness(
        store,
        ctx.session_id,
        ctx.managers,
        ScriptedLlm::new(vec![OBSERVE_PAYLOAD]),
        vec![5, 5],
    );
    harness.cache.insert(greet_branch(0)).await;

    let first = harness
        .pipeline
        .process_turn("greet the bartender", "tavern", 1)
        .await;
    assert!(first.errors.is_empty());

    let mut conn = harness.store.pool().acquire().await.unwrap();
    let duplicate = crate::store::turns::insert(
        &mut conn,
        &harness.session_id.to_string(),
        &fateweaver_domain::TurnRecord {
            turn_number: 1,
            player_input: "rewrite history".to_string(),
            gm_response: "no".to_string(),
            mentioned_items: vec![],
            is_ooc: false,
            created_at: Utc::now(),
        },
    )
    .await;
    assert!(duplicate.is_err());

    let original = crate::store::turns::get(&mut conn, &harness.session_id.to_string(), 1)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(original.player_input, "greet the bartender");
}
