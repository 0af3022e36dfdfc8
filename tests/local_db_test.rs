//! Local store integration tests
//!
//! Covers the partition and durability properties of the SQLite store:
//! round-trips, per-user isolation, idempotent deletes, and the destructive
//! schema migration.

mod common;

use common::entries;
use pretty_assertions::assert_eq;
use smartchat::local_db::LocalDatabase;
use smartchat::types::{Conversation, Message, Role};
use tempfile::TempDir;

async fn open_temp() -> (TempDir, LocalDatabase) {
    let dir = TempDir::new().unwrap();
    let db = LocalDatabase::open(&dir.path().join("local.db")).await.unwrap();
    (dir, db)
}

fn conversation(title: &str) -> Conversation {
    let mut conversation = Conversation::draft();
    conversation.title = title.to_string();
    conversation.messages.push(Message::new(Role::User, "hi"));
    conversation
}

#[tokio::test]
async fn history_round_trips_per_user() {
    let (_dir, db) = open_temp().await;
    db.set_active_user("ada@example.com");

    let history = entries(
        1_000,
        &[
            ("what is ownership?", Role::User),
            ("a set of rules governing memory", Role::Assistant),
        ],
    );
    db.replace_history(&history).await.unwrap();

    assert_eq!(db.load_history().await.unwrap(), history);
}

#[tokio::test]
async fn saving_one_user_never_affects_another() {
    let (_dir, db) = open_temp().await;

    db.set_active_user("bob@example.com");
    let bobs = entries(1_000, &[("bob's first", Role::User)]);
    db.replace_history(&bobs).await.unwrap();

    db.set_active_user("ada@example.com");
    db.replace_history(&entries(2_000, &[("ada's entry", Role::User)]))
        .await
        .unwrap();

    db.set_active_user("bob@example.com");
    assert_eq!(db.load_history().await.unwrap(), bobs);
}

#[tokio::test]
async fn deleting_a_conversation_twice_is_idempotent() {
    let (_dir, db) = open_temp().await;
    db.set_active_user("ada@example.com");

    let keep = conversation("keep");
    let gone = conversation("gone");
    db.save_conversation(&keep).await.unwrap();
    db.save_conversation(&gone).await.unwrap();

    db.delete_conversation(&gone.id).await.unwrap();
    let after_one = db.list_conversations().await.unwrap();

    db.delete_conversation(&gone.id).await.unwrap();
    let after_two = db.list_conversations().await.unwrap();

    assert_eq!(after_one, after_two);
    assert_eq!(after_two.len(), 1);
    assert_eq!(after_two[0].id, keep.id);
}

#[tokio::test]
async fn conversations_are_listed_newest_first() {
    let (_dir, db) = open_temp().await;
    db.set_active_user("ada@example.com");

    let older = conversation("older");
    let newer = conversation("newer");
    db.save_conversation(&older).await.unwrap();
    tokio::time::sleep(std::time::Duration::from_millis(5)).await;
    db.save_conversation(&newer).await.unwrap();

    let listed = db.list_conversations().await.unwrap();
    assert_eq!(listed[0].id, newer.id);
    assert_eq!(listed[1].id, older.id);
}

#[tokio::test]
async fn version_bump_drops_existing_data() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("local.db");

    let db = LocalDatabase::open(&path).await.unwrap();
    db.set_active_user("ada@example.com");
    db.save_conversation(&conversation("doomed")).await.unwrap();
    db.replace_history(&entries(1_000, &[("doomed too", Role::User)]))
        .await
        .unwrap();

    // Pretend the file was written by an older schema
    sqlx::query("UPDATE schema_meta SET version = 1")
        .execute(db.pool())
        .await
        .unwrap();
    db.close().await;

    let db = LocalDatabase::open(&path).await.unwrap();
    db.set_active_user("ada@example.com");
    assert!(db.list_conversations().await.unwrap().is_empty());
    assert!(db.load_history().await.unwrap().is_empty());
}

#[tokio::test]
async fn search_matches_substrings_for_active_user_only() {
    let (_dir, db) = open_temp().await;

    db.set_active_user("bob@example.com");
    db.save_conversation(&conversation("Rust on bob's account"))
        .await
        .unwrap();

    db.set_active_user("ada@example.com");
    db.save_conversation(&conversation("Learning Rust"))
        .await
        .unwrap();
    db.save_conversation(&conversation("Groceries")).await.unwrap();

    let hits = db.search_conversations_by_title("RUST").await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].title, "Learning Rust");
}
