//! Shared fixtures for engine tests.
//!
//! `seed_session` builds a small tavern scene: a player, one NPC, a loose
//! key, a chest storage, and three connected locations.

use std::sync::Arc;

use chrono::Utc;

use fateweaver_domain::{
    Direction, Entity, EntityKey, GameClock, Item, ItemKey, ItemKind, Location, LocationCategory,
    LocationKey, Session, SessionId, SessionStatus, Skill, StorageKey, StorageKind,
    StorageLocation,
};

use crate::infrastructure::random::StdRandom;
use crate::managers::Managers;
use crate::store::{self, Store};

pub struct TestContext {
    pub session_id: SessionId,
    pub managers: Managers,
}

pub async fn seed_session(store: &Store) -> TestContext {
    let session_id = SessionId::new();
    let sid = session_id.to_string();
    let managers = Managers::new(session_id, Arc::new(StdRandom::seeded(42)));

    let mut conn = store
        .pool()
        .acquire()
        .await
        .expect("acquire seed connection");

    store::sessions::insert(
        &mut conn,
        &Session {
            id: session_id,
            setting: "A rainy port town".to_string(),
            player_entity: EntityKey::new("player").unwrap(),
            status: SessionStatus::Active,
            total_turns: 0,
            state_version: 0,
            created_at: Utc::now(),
        },
    )
    .await
    .expect("insert session");

    // Locations: street <-out- tavern -down-> cellar (cellar child of tavern).
    let mut tavern = Location::new(
        LocationKey::new("tavern").unwrap(),
        "The Salted Eel",
        LocationCategory::Building,
    );
    tavern.description = "A low-beamed tavern smelling of brine and woodsmoke.".to_string();
    let street = Location::new(
        LocationKey::new("street").unwrap(),
        "Harbor Street",
        LocationCategory::Outdoor,
    );
    let mut cellar = Location::new(
        LocationKey::new("cellar").unwrap(),
        "Tavern Cellar",
        LocationCategory::Room,
    );
    cellar.parent = Some(tavern.key.clone());

    store::locations::insert(&mut conn, &sid, &tavern)
        .await
        .expect("insert tavern");
    store::locations::insert(&mut conn, &sid, &street)
        .await
        .expect("insert street");
    store::locations::insert(&mut conn, &sid, &cellar)
        .await
        .expect("insert cellar");

    managers
        .locations
        .add_exit(&mut conn, "tavern", Direction::Out, "street")
        .await
        .expect("add exit out");
    managers
        .locations
        .add_exit(&mut conn, "tavern", Direction::Down, "cellar")
        .await
        .expect("add exit down");

    // Player and one NPC.
    let mut player = Entity::player(
        EntityKey::new("player").unwrap(),
        "Ash",
        tavern.key.clone(),
    );
    player.skills.insert(Skill::Lockpicking, 45);
    player.skills.insert(Skill::Persuasion, 25);
    managers
        .entities
        .create(&mut conn, &player)
        .await
        .expect("create player");

    let mut bartender = Entity::npc(
        EntityKey::new("bartender_001").unwrap(),
        "Marcus",
        tavern.key.clone(),
    );
    bartender.background = "Owns the Salted Eel, hears everything.".to_string();
    bartender.personality = "Gruff but fair.".to_string();
    managers
        .entities
        .create(&mut conn, &bartender)
        .await
        .expect("create bartender");

    // A loose key on the tavern floor and a chest to put things in.
    let mut rusty_key = Item::at_location(
        ItemKey::new("rusty_key").unwrap(),
        "rusty key",
        ItemKind::Tool,
        tavern.key.clone(),
    );
    rusty_key.weight = 0.1;
    managers
        .items
        .create(&mut conn, &rusty_key)
        .await
        .expect("create rusty_key");

    let mut chest_item = Item::at_location(
        ItemKey::new("chest_01").unwrap(),
        "oak chest",
        ItemKind::Container,
        tavern.key.clone(),
    );
    chest_item.weight = 20.0;
    managers
        .items
        .create(&mut conn, &chest_item)
        .await
        .expect("create chest item");

    store::storages::insert(
        &mut conn,
        &sid,
        &StorageLocation {
            key: StorageKey::new("tavern_chest").unwrap(),
            display_name: "oak chest".to_string(),
            kind: StorageKind::Container,
            owner_entity: None,
            container_item: Some(chest_item.key.clone()),
            location: Some(tavern.key.clone()),
            capacity: Some(5.0),
        },
    )
    .await
    .expect("insert chest storage");

    // Clock: day 1 (monday), 08:00, clear.
    let clock = GameClock::starting_at("08:00").expect("parse clock");
    store::game_time::set(&mut conn, &sid, &clock)
        .await
        .expect("set clock");

    drop(conn);
    TestContext {
        session_id,
        managers,
    }
}
