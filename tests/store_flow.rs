use calendarBot::models::user::{Mode, UserRef};
use calendarBot::store::CalendarStore;
use chrono::{Duration, TimeZone, Utc};

fn user(id: i64, handle: &str) -> UserRef {
    UserRef::new(id, Some(handle), "Test User")
}

async fn store_with_user(id: i64, handle: &str) -> CalendarStore {
    let store = CalendarStore::open_in_memory().await.unwrap();
    store.create_user(&user(id, handle)).await.unwrap();
    store
}

#[tokio::test]
async fn create_user_is_idempotent_and_defaults_apply() {
    let store = CalendarStore::open_in_memory().await.unwrap();
    assert!(!store.user_exists(7).await.unwrap());
    store.create_user(&user(7, "alice")).await.unwrap();
    store.create_user(&user(7, "alice")).await.unwrap();
    assert!(store.user_exists(7).await.unwrap());
    assert_eq!(store.mode(7).await.unwrap(), Mode::Meeting);
    assert_eq!(store.reminder_default(7).await.unwrap(), 60);
    assert_eq!(store.timezone(7).await.unwrap(), "Europe/Moscow");
    assert_eq!(store.theme(7).await.unwrap(), "default");
}

#[tokio::test]
async fn settings_updates_persist() {
    let store = store_with_user(7, "alice").await;
    store.set_mode(7, Mode::Todo).await.unwrap();
    store.set_reminder_default(7, 15).await.unwrap();
    store.set_timezone(7, "Asia/Tokyo").await.unwrap();
    store.set_theme(7, "ocean").await.unwrap();
    assert_eq!(store.mode(7).await.unwrap(), Mode::Todo);
    assert_eq!(store.reminder_default(7).await.unwrap(), 15);
    assert_eq!(store.timezone(7).await.unwrap(), "Asia/Tokyo");
    assert_eq!(store.theme(7).await.unwrap(), "ocean");
}

#[tokio::test]
async fn marking_days_is_idempotent() {
    let store = store_with_user(7, "alice").await;
    store.mark_day_busy(7, 2024, 6, 10).await.unwrap();
    store.mark_day_busy(7, 2024, 6, 10).await.unwrap();
    let view = store.month_view(7, 2024, 6).await.unwrap();
    assert_eq!(view.len(), 1);
    assert!(view.get(&10).unwrap().occupied);

    store.mark_day_free(7, 2024, 6, 10).await.unwrap();
    store.mark_day_free(7, 2024, 6, 10).await.unwrap();
    assert!(store.month_view(7, 2024, 6).await.unwrap().is_empty());
}

#[tokio::test]
async fn a_day_with_tasks_counts_as_occupied() {
    let store = store_with_user(7, "alice").await;
    store
        .add_task(7, 2024, 6, 12, "standup", "09:30", 15)
        .await
        .unwrap();
    let view = store.month_view(7, 2024, 6).await.unwrap();
    let summary = view.get(&12).unwrap();
    assert!(summary.occupied);
    assert_eq!(summary.task_count, 1);
}

#[tokio::test]
async fn freeing_a_day_removes_its_tasks() {
    let store = store_with_user(7, "alice").await;
    store
        .add_task(7, 2024, 6, 12, "standup", "09:30", 15)
        .await
        .unwrap();
    store.mark_day_free(7, 2024, 6, 12).await.unwrap();
    assert!(store.tasks_for_day(7, 2024, 6, 12).await.unwrap().is_empty());
    assert!(store.month_view(7, 2024, 6).await.unwrap().is_empty());
}

#[tokio::test]
async fn reminder_instant_uses_the_owner_timezone() {
    let store = store_with_user(7, "alice").await;
    // Moscow is UTC+3: 14:00 local minus 60 minutes -> 10:00 UTC.
    let id = store
        .add_task(7, 2024, 6, 15, "call", "14:00", 60)
        .await
        .unwrap();
    let task = store.task_by_id(id).await.unwrap().unwrap();
    assert_eq!(
        task.reminder_at,
        Utc.with_ymd_and_hms(2024, 6, 15, 10, 0, 0).unwrap()
    );
    assert!(!task.reminder_sent);
}

#[tokio::test]
async fn broken_timezone_degrades_to_now_plus_offset() {
    let store = store_with_user(7, "alice").await;
    store.set_timezone(7, "Not/AZone").await.unwrap();
    let before = Utc::now();
    let id = store
        .add_task(7, 2024, 6, 15, "call", "14:00", 30)
        .await
        .unwrap();
    let after = Utc::now();
    let task = store.task_by_id(id).await.unwrap().unwrap();
    assert!(task.reminder_at >= before + Duration::minutes(30));
    assert!(task.reminder_at <= after + Duration::minutes(30));
}

#[tokio::test]
async fn deleting_the_last_task_frees_the_day() {
    let store = store_with_user(7, "alice").await;
    let first = store
        .add_task(7, 2024, 6, 20, "one", "10:00", 15)
        .await
        .unwrap();
    let second = store
        .add_task(7, 2024, 6, 20, "two", "11:00", 15)
        .await
        .unwrap();

    assert!(store.delete_task(first).await.unwrap());
    assert!(store.month_view(7, 2024, 6).await.unwrap().get(&20).is_some());

    assert!(store.delete_task(second).await.unwrap());
    assert!(store.month_view(7, 2024, 6).await.unwrap().is_empty());

    assert!(!store.delete_task(second).await.unwrap());
}

#[tokio::test]
async fn tasks_for_day_orders_by_time() {
    let store = store_with_user(7, "alice").await;
    store
        .add_task(7, 2024, 6, 3, "late", "18:00", 15)
        .await
        .unwrap();
    store
        .add_task(7, 2024, 6, 3, "early", "08:00", 15)
        .await
        .unwrap();
    let tasks = store.tasks_for_day(7, 2024, 6, 3).await.unwrap();
    let texts: Vec<&str> = tasks.iter().map(|t| t.text.as_str()).collect();
    assert_eq!(texts, vec!["early", "late"]);
}

#[tokio::test]
async fn reset_month_clears_markers_and_tasks() {
    let store = store_with_user(7, "alice").await;
    store.mark_day_busy(7, 2024, 6, 1).await.unwrap();
    store
        .add_task(7, 2024, 6, 2, "standup", "09:00", 15)
        .await
        .unwrap();
    store.mark_day_busy(7, 2024, 7, 1).await.unwrap();

    store.reset_month(7, 2024, 6).await.unwrap();
    assert!(store.month_view(7, 2024, 6).await.unwrap().is_empty());
    // The neighbouring month stays untouched.
    assert_eq!(store.month_view(7, 2024, 7).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_handles_are_dropped() {
    let store = store_with_user(1, "alice").await;
    store.create_user(&user(2, "bob")).await.unwrap();
    let ids = store
        .users_by_handles(&["bob".to_string(), "nobody".to_string()])
        .await
        .unwrap();
    assert_eq!(ids, vec![2]);
    assert!(store.users_by_handles(&[]).await.unwrap().is_empty());
}

#[tokio::test]
async fn common_free_days_exclude_everyones_busy_days() {
    let store = store_with_user(1, "alice").await;
    store.create_user(&user(2, "bob")).await.unwrap();
    store.mark_day_busy(1, 2024, 6, 1).await.unwrap();
    store.mark_day_busy(1, 2024, 6, 2).await.unwrap();
    store
        .add_task(2, 2024, 6, 2, "standup", "09:00", 15)
        .await
        .unwrap();
    store.mark_day_busy(2, 2024, 6, 3).await.unwrap();

    let free = store
        .find_common_free_days(1, &[1, 2], 2024, 6)
        .await
        .unwrap();
    assert_eq!(free.len(), 27);
    for day in 1..=3 {
        assert!(!free.contains(&day));
    }
    assert!(free.contains(&4));
}

#[tokio::test]
async fn oversized_groups_get_an_empty_answer() {
    let store = store_with_user(1, "alice").await;
    let ids: Vec<i64> = (1..=21).collect();
    assert!(
        store
            .find_common_free_days(1, &ids, 2024, 6)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn due_reminders_surface_once() {
    let store = store_with_user(7, "alice").await;
    let id = store
        .add_task(7, 2020, 1, 1, "long ago", "10:00", 60)
        .await
        .unwrap();
    store
        .add_task(7, 2090, 1, 1, "far ahead", "10:00", 60)
        .await
        .unwrap();

    let due = store.due_reminders(Utc::now()).await.unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].task_id, id);
    assert_eq!(due[0].text, "long ago");

    store.mark_reminder_sent(id).await.unwrap();
    store.mark_reminder_sent(id).await.unwrap();
    assert!(store.due_reminders(Utc::now()).await.unwrap().is_empty());
}

#[tokio::test]
async fn purge_drops_old_rows_only() {
    let store = store_with_user(7, "alice").await;
    store.mark_day_busy(7, 2024, 6, 1).await.unwrap();
    store
        .add_task(7, 2024, 6, 2, "standup", "09:00", 15)
        .await
        .unwrap();

    // Cutoff in the past keeps everything.
    store
        .purge_older_than(Utc::now() - Duration::days(60))
        .await
        .unwrap();
    assert_eq!(store.month_view(7, 2024, 6).await.unwrap().len(), 2);

    // Cutoff in the future drops it all.
    store
        .purge_older_than(Utc::now() + Duration::days(1))
        .await
        .unwrap();
    assert!(store.month_view(7, 2024, 6).await.unwrap().is_empty());
}
