#![allow(clippy::unwrap_used)]

use super::db::Database;
use super::models::{SETTINGS_ID, TicketStatus};

async fn test_db() -> Database {
    Database::open_in_memory().await.unwrap()
}

async fn seed_user(db: &Database, id: &str, username: &str, email: &str) {
    db.create_user(id, username, email, "hash", 1, "panel-uuid", false)
        .await
        .unwrap();
}

#[tokio::test]
async fn create_and_fetch_user() {
    let db = test_db().await;
    let user = db
        .create_user("u1", "alice", "alice@example.com", "hash", 42, "pu-1", true)
        .await
        .unwrap();
    assert_eq!(user.username, "alice");
    assert_eq!(user.panel_user_id, 42);
    assert!(user.is_admin);

    let by_email = db
        .get_user_by_email("alice@example.com")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(by_email.id, "u1");
    assert!(db.get_user_by_email("nobody@example.com").await.unwrap().is_none());
}

#[tokio::test]
async fn duplicate_email_is_rejected() {
    let db = test_db().await;
    seed_user(&db, "u1", "alice", "alice@example.com").await;
    let result = db
        .create_user("u2", "bob", "alice@example.com", "hash", 2, "pu-2", false)
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn profile_update_and_admin_reconcile() {
    let db = test_db().await;
    seed_user(&db, "u1", "alice", "alice@example.com").await;

    let updated = db
        .update_user_profile("u1", "alice2", Some("https://cdn/a.png"))
        .await
        .unwrap();
    assert_eq!(updated.username, "alice2");
    assert_eq!(updated.avatar_url.as_deref(), Some("https://cdn/a.png"));

    db.set_user_admin("u1", true).await.unwrap();
    assert!(db.get_user("u1").await.unwrap().is_admin);
}

#[tokio::test]
async fn settings_row_is_created_lazily_with_defaults() {
    let db = test_db().await;
    let settings = db.get_settings().await.unwrap();
    assert_eq!(settings.id, SETTINGS_ID);
    assert_eq!(settings.free_server_memory, 4096);
    assert_eq!(settings.free_server_disk, 10240);
    assert_eq!(settings.free_server_cpu, 100);
    assert_eq!(settings.server_limit, 2);
    assert_eq!(settings.allowed_nodes, "");
    assert!(!settings.captcha_enabled);
}

#[tokio::test]
async fn settings_save_round_trips() {
    let db = test_db().await;
    let mut settings = db.get_settings().await.unwrap();
    settings.site_title = "My Host".into();
    settings.server_limit = 5;
    settings.allowed_nodes = "1:50,2".into();

    let saved = db.save_settings(&settings).await.unwrap();
    assert_eq!(saved.site_title, "My Host");
    assert_eq!(saved.server_limit, 5);
    assert_eq!(saved.allowed_nodes, "1:50,2");

    let reread = db.get_settings().await.unwrap();
    assert_eq!(reread.site_title, "My Host");
}

#[tokio::test]
async fn one_active_ticket_per_user() {
    let db = test_db().await;
    seed_user(&db, "u1", "alice", "alice@example.com").await;

    db.create_ticket("u1", "Help", "It broke").await.unwrap();
    let second = db.create_ticket("u1", "More help", "Still broke").await;
    assert!(second.is_err());
}

#[tokio::test]
async fn ticket_status_follows_replies() {
    let db = test_db().await;
    seed_user(&db, "u1", "alice", "alice@example.com").await;
    seed_user(&db, "a1", "admin", "admin@example.com").await;

    let ticket = db.create_ticket("u1", "Help", "It broke").await.unwrap();
    assert_eq!(ticket.status, TicketStatus::Open);

    db.post_ticket_message(&ticket.id, "a1", "Try rebooting", true)
        .await
        .unwrap();
    assert_eq!(
        db.get_ticket(&ticket.id).await.unwrap().status,
        TicketStatus::Answered
    );

    db.post_ticket_message(&ticket.id, "u1", "Did not help", false)
        .await
        .unwrap();
    assert_eq!(
        db.get_ticket(&ticket.id).await.unwrap().status,
        TicketStatus::Open
    );
}

#[tokio::test]
async fn closed_ticket_rejects_messages_and_frees_the_slot() {
    let db = test_db().await;
    seed_user(&db, "u1", "alice", "alice@example.com").await;

    let ticket = db.create_ticket("u1", "Help", "It broke").await.unwrap();
    db.set_ticket_status(&ticket.id, TicketStatus::Closed)
        .await
        .unwrap();

    let post = db
        .post_ticket_message(&ticket.id, "u1", "Hello?", false)
        .await;
    assert!(post.is_err());

    // Closing released the one-active-ticket slot.
    db.create_ticket("u1", "New issue", "Other thing")
        .await
        .unwrap();
}

#[tokio::test]
async fn delete_ticket_removes_messages_first() {
    let db = test_db().await;
    seed_user(&db, "u1", "alice", "alice@example.com").await;

    let ticket = db.create_ticket("u1", "Help", "It broke").await.unwrap();
    db.post_ticket_message(&ticket.id, "u1", "Anyone?", false)
        .await
        .unwrap();
    assert_eq!(db.list_ticket_messages(&ticket.id).await.unwrap().len(), 2);

    assert!(db.delete_ticket(&ticket.id).await.unwrap());
    assert!(db.get_ticket(&ticket.id).await.is_err());
    assert!(db.list_ticket_messages(&ticket.id).await.unwrap().is_empty());
}
