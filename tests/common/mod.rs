#![allow(dead_code)]

use quarry::metadata::{AttrType, EntityDef};
use quarry::{Catalog, MemoryStore, QueryContext, Value};
use std::sync::Arc;

pub fn catalog() -> Arc<Catalog> {
    Catalog::builder()
        .entity(
            EntityDef::builder("Team")
                .attribute("name", AttrType::String)
                .one_to_many("members", "Member", "team")
                .build(),
        )
        .entity(
            EntityDef::builder("Member")
                .nullable_attribute("username", AttrType::String)
                .attribute("age", AttrType::Integer)
                .nullable_attribute("team_id", AttrType::Integer)
                .many_to_one("team", "Team", "team_id")
                .build(),
        )
        .build()
        .expect("fixture catalog")
        .into_shared()
}

/// teamA holds member1 (10) and member2 (20); teamB holds member3 (30) and member4 (40)
pub fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new(catalog());
    for name in ["teamA", "teamB"] {
        store
            .insert("Team", [("name", Value::from(name))])
            .expect("seed team");
    }
    for (name, age, team) in [
        ("member1", 10, 1),
        ("member2", 20, 1),
        ("member3", 30, 2),
        ("member4", 40, 2),
    ] {
        add_member(&store, Some(name), age, Some(team));
    }
    store
}

pub fn add_member(store: &MemoryStore, username: Option<&str>, age: i64, team: Option<i64>) -> i64 {
    store
        .insert(
            "Member",
            [
                ("username", Value::from(username)),
                ("age", Value::from(age)),
                ("team_id", Value::from(team)),
            ],
        )
        .expect("seed member")
}

pub fn context() -> QueryContext<MemoryStore> {
    let store = seeded_store();
    QueryContext::new(store.catalog().clone(), store)
}

pub fn usernames(rows: &[quarry::Row]) -> Vec<Option<String>> {
    rows.iter()
        .map(|r| r.try_get::<Option<String>>("username").expect("username column"))
        .collect()
}

pub fn names(rows: &[quarry::Row]) -> Vec<String> {
    usernames(rows).into_iter().flatten().collect()
}
