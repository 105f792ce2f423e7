//! Query tests against a throwaway Postgres database per test.
//!
//! `#[sqlx::test]` creates the database from `DATABASE_URL` and applies the
//! embedded migrations before each test body runs.

use chrono::{Duration, TimeZone, Utc};
use db::models::{ChannelUpsert, SubscribeOutcome, Tier, VideoUpsert};
use db::queries::{channels, profiles, subscriptions, videos, webhook_events};
use sqlx::PgPool;

async fn create_profile(pool: &PgPool, id: &str) {
    profiles::create(pool, id, &format!("{id}@example.com"), "UTC")
        .await
        .expect("Failed to insert profile");
}

fn channel(id: &str, title: &str) -> ChannelUpsert {
    ChannelUpsert {
        channel_id: id.to_string(),
        title: title.to_string(),
        description: String::new(),
        handle: None,
        custom_url: None,
        thumbnail_url: None,
        uploads_playlist_id: Some(format!("UU{id}")),
        subscriber_count: Some(100),
        video_count: Some(10),
    }
}

fn video(id: &str, channel_id: &str, title: &str) -> VideoUpsert {
    VideoUpsert {
        video_id: id.to_string(),
        channel_id: channel_id.to_string(),
        title: title.to_string(),
        description: String::new(),
        thumbnail_url: None,
        published_at: Utc.with_ymd_and_hms(2026, 9, 1, 12, 0, 0).unwrap(),
        duration_seconds: Some(600),
        view_count: Some(1_000),
    }
}

async fn seed_channels(pool: &PgPool, count: usize) -> Vec<String> {
    let mut ids = Vec::with_capacity(count);
    for n in 0..count {
        let id = format!("UCchannel{n:02}");
        channels::upsert(pool, &channel(&id, &format!("Channel {n}")))
            .await
            .expect("Failed to insert channel");
        ids.push(id);
    }
    ids
}

#[sqlx::test(migrations = "./migrations")]
async fn test_second_subscription_to_same_channel(pool: PgPool) {
    create_profile(&pool, "usr_ada").await;
    let ids = seed_channels(&pool, 1).await;

    let first = subscriptions::create_within_tier_limit(&pool, "usr_ada", &ids[0], &[])
        .await
        .unwrap();
    let second = subscriptions::create_within_tier_limit(&pool, "usr_ada", &ids[0], &[])
        .await
        .unwrap();

    assert_eq!(first, SubscribeOutcome::Created);
    assert_eq!(second, SubscribeOutcome::AlreadySubscribed);
    assert_eq!(subscriptions::count(&pool, "usr_ada").await.unwrap(), 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_free_tier_refuses_sixth_channel(pool: PgPool) {
    create_profile(&pool, "usr_ada").await;
    let ids = seed_channels(&pool, 6).await;

    for id in &ids[..5] {
        let outcome = subscriptions::create_within_tier_limit(&pool, "usr_ada", id, &[])
            .await
            .unwrap();
        assert_eq!(outcome, SubscribeOutcome::Created);
    }

    let sixth = subscriptions::create_within_tier_limit(&pool, "usr_ada", &ids[5], &[])
        .await
        .unwrap();
    assert_eq!(
        sixth,
        SubscribeOutcome::LimitReached {
            tier: Tier::Free,
            limit: 5
        }
    );
    assert!(!subscriptions::exists(&pool, "usr_ada", &ids[5]).await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_concurrent_adds_at_the_cap_admit_one(pool: PgPool) {
    create_profile(&pool, "usr_ada").await;
    let ids = seed_channels(&pool, 6).await;
    for id in &ids[..4] {
        subscriptions::create_within_tier_limit(&pool, "usr_ada", id, &[])
            .await
            .unwrap();
    }

    let (a, b) = tokio::join!(
        subscriptions::create_within_tier_limit(&pool, "usr_ada", &ids[4], &[]),
        subscriptions::create_within_tier_limit(&pool, "usr_ada", &ids[5], &[]),
    );
    let outcomes = [a.unwrap(), b.unwrap()];

    let created = outcomes
        .iter()
        .filter(|outcome| **outcome == SubscribeOutcome::Created)
        .count();
    assert_eq!(created, 1, "outcomes: {outcomes:?}");
    assert_eq!(subscriptions::count(&pool, "usr_ada").await.unwrap(), 5);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_upgraded_tier_lifts_the_cap(pool: PgPool) {
    create_profile(&pool, "usr_ada").await;
    let ids = seed_channels(&pool, 6).await;
    for id in &ids[..5] {
        subscriptions::create_within_tier_limit(&pool, "usr_ada", id, &[])
            .await
            .unwrap();
    }

    profiles::apply_billing(
        &pool,
        "usr_ada",
        Some(Tier::Pro),
        db::models::BillingStatus::Active,
        Some("cus_1"),
        Some("sub_1"),
    )
    .await
    .unwrap();

    let sixth = subscriptions::create_within_tier_limit(&pool, "usr_ada", &ids[5], &[])
        .await
        .unwrap();
    assert_eq!(sixth, SubscribeOutcome::Created);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_webhook_id_recorded_once(pool: PgPool) {
    assert!(webhook_events::record(&pool, "msg_1", "subscription.active").await.unwrap());
    assert!(!webhook_events::record(&pool, "msg_1", "subscription.active").await.unwrap());
    assert!(webhook_events::record(&pool, "msg_2", "subscription.active").await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_rolled_back_claim_is_released(pool: PgPool) {
    let mut tx = pool.begin().await.unwrap();
    assert!(webhook_events::record(&mut *tx, "msg_1", "subscription.active").await.unwrap());
    tx.rollback().await.unwrap();

    assert!(webhook_events::record(&pool, "msg_1", "subscription.active").await.unwrap());
}

#[sqlx::test(migrations = "./migrations")]
async fn test_channel_upsert_latest_write_wins(pool: PgPool) {
    let first = channels::upsert(&pool, &channel("UCabc", "Old title")).await.unwrap();

    let mut updated = channel("UCabc", "New title");
    updated.subscriber_count = Some(250);
    updated.handle = Some("@newtitle".to_string());
    let second = channels::upsert(&pool, &updated).await.unwrap();

    assert_eq!(second.title, "New title");
    assert_eq!(second.subscriber_count, Some(250));
    assert_eq!(second.handle.as_deref(), Some("@newtitle"));
    assert!(second.last_fetched_at >= first.last_fetched_at);

    let rows: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM channels")
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(rows, 1);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_video_upsert_latest_write_wins(pool: PgPool) {
    seed_channels(&pool, 1).await;
    let channel_id = "UCchannel00";

    videos::upsert_many(&pool, &[video("vid00000001", channel_id, "Draft title")])
        .await
        .unwrap();

    let mut renamed = video("vid00000001", channel_id, "Final title");
    renamed.duration_seconds = None;
    renamed.view_count = Some(5_000);
    let affected = videos::upsert_many(
        &pool,
        &[renamed, video("vid00000002", channel_id, "Second upload")],
    )
    .await
    .unwrap();
    assert_eq!(affected, 2);

    let (title, duration, views): (String, Option<i32>, Option<i64>) = sqlx::query_as(
        "SELECT title, duration_seconds, view_count FROM videos WHERE video_id = $1",
    )
    .bind("vid00000001")
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(title, "Final title");
    assert_eq!(views, Some(5_000));
    // An unknown duration never erases a known one.
    assert_eq!(duration, Some(600));

    assert_eq!(
        videos::get_duration(&pool, "vid00000002").await.unwrap(),
        Some(Some(600))
    );
    assert_eq!(videos::get_duration(&pool, "missing").await.unwrap(), None);
}

#[sqlx::test(migrations = "./migrations")]
async fn test_list_stale_skips_unsubscribed_and_fresh(pool: PgPool) {
    create_profile(&pool, "usr_ada").await;
    let ids = seed_channels(&pool, 3).await;
    subscriptions::create_within_tier_limit(&pool, "usr_ada", &ids[0], &[])
        .await
        .unwrap();
    subscriptions::create_within_tier_limit(&pool, "usr_ada", &ids[1], &[])
        .await
        .unwrap();
    sqlx::query(
        r#"
        UPDATE channels SET last_fetched_at = now() - interval '2 hours'
        WHERE channel_id = ANY($1)
        "#,
    )
    .bind(&ids[..])
    .execute(&pool)
    .await
    .unwrap();
    channels::upsert(&pool, &channel(&ids[1], "Just refreshed")).await.unwrap();

    let stale = channels::list_stale(&pool, Utc::now() - Duration::hours(1), 10)
        .await
        .unwrap();

    let stale_ids: Vec<&str> = stale.iter().map(|c| c.channel_id.as_str()).collect();
    assert_eq!(stale_ids, vec![ids[0].as_str()]);
}
