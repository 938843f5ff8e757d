use std::{collections::HashSet, sync::Arc};

use chrono::{DateTime, TimeZone, Utc};

use engine::{
    EngineError, Engine, Month, Transaction, TransactionKind, User,
    keys,
    store::{Condition, DocumentStore, MemoryStore},
};

fn engine() -> (Engine, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let engine = Engine::builder().store(store.clone()).build().unwrap();
    (engine, store)
}

fn date(y: i32, m: u32, d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, 9, 30, 0).unwrap()
}

fn month(raw: &str) -> Month {
    raw.parse().unwrap()
}

fn expense(amount: f64, category: &str, when: DateTime<Utc>) -> Transaction {
    Transaction::new("u1", TransactionKind::Expense, amount, category, "spent", when).unwrap()
}

fn income(amount: f64, category: &str, when: DateTime<Utc>) -> Transaction {
    Transaction::new("u1", TransactionKind::Income, amount, category, "earned", when).unwrap()
}

/// food on 2024-01-15, salary on 2024-01-20, food on 2024-02-01.
async fn seed(engine: &Engine) -> (Transaction, Transaction, Transaction) {
    let food = engine
        .create_transaction(expense(50.0, "food", date(2024, 1, 15)))
        .await
        .unwrap();
    let salary = engine
        .create_transaction(income(2000.0, "salary", date(2024, 1, 20)))
        .await
        .unwrap();
    let later_food = engine
        .create_transaction(expense(30.0, "food", date(2024, 2, 1)))
        .await
        .unwrap();
    (food, salary, later_food)
}

fn ids(items: &[Transaction]) -> Vec<&str> {
    items.iter().map(|tx| tx.id.as_str()).collect()
}

#[tokio::test]
async fn month_query_returns_only_that_month_newest_first() {
    let (engine, _store) = engine();
    let (food, salary, later_food) = seed(&engine).await;

    let january = engine
        .transactions_by_month("u1", month("2024-01"), 0, None)
        .await
        .unwrap();
    assert_eq!(ids(&january.items), [salary.id.as_str(), food.id.as_str()]);
    assert_eq!(january.next_cursor, None);

    let february = engine
        .transactions_by_month("u1", month("2024-02"), 0, None)
        .await
        .unwrap();
    assert_eq!(ids(&february.items), [later_food.id.as_str()]);

    let other_user = engine
        .transactions_by_month("u2", month("2024-01"), 0, None)
        .await
        .unwrap();
    assert!(other_user.items.is_empty());
}

#[tokio::test]
async fn category_query_ignores_case() {
    let (engine, _store) = engine();
    engine
        .create_transaction(expense(5.0, "Food", date(2024, 3, 1)))
        .await
        .unwrap();
    seed(&engine).await;

    let mut results = Vec::new();
    for spelling in ["food", "FOOD", " Food "] {
        let page = engine
            .transactions_by_category("u1", spelling, 0, None)
            .await
            .unwrap();
        results.push(page.items);
    }
    assert_eq!(results[0].len(), 3);
    assert_eq!(results[0], results[1]);
    assert_eq!(results[1], results[2]);
}

#[tokio::test]
async fn user_listing_is_newest_first_and_stored_sign_follows_type() {
    let (engine, _store) = engine();
    let (food, salary, later_food) = seed(&engine).await;

    let page = engine.transactions_by_user("u1", 0, None).await.unwrap();
    assert_eq!(
        ids(&page.items),
        [later_food.id.as_str(), salary.id.as_str(), food.id.as_str()]
    );
    assert_eq!(page.items[2].amount, -50.0);
    assert_eq!(page.items[1].amount, 2000.0);
}

#[tokio::test]
async fn pages_cover_every_item_exactly_once() {
    let (engine, _store) = engine();
    for day in 1..=7 {
        engine
            .create_transaction(expense(day as f64, "misc", date(2024, 5, day)))
            .await
            .unwrap();
    }

    let mut seen = Vec::new();
    let mut cursor: Option<String> = None;
    let mut pages = 0;
    loop {
        let page = engine
            .transactions_by_month("u1", month("2024-05"), 3, cursor.as_deref())
            .await
            .unwrap();
        pages += 1;
        assert!(page.items.len() <= 3);
        seen.extend(page.items);
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => break,
        }
    }

    assert_eq!(pages, 3);
    assert_eq!(seen.len(), 7);
    let unique: HashSet<&str> = seen.iter().map(|tx| tx.id.as_str()).collect();
    assert_eq!(unique.len(), 7);
    assert!(seen.windows(2).all(|w| w[0].date > w[1].date));
}

#[tokio::test]
async fn pages_split_transactions_sharing_a_timestamp() {
    let (engine, _store) = engine();
    let when = date(2024, 5, 3);
    for n in 1..=7 {
        engine
            .create_transaction(expense(n as f64, "misc", when))
            .await
            .unwrap();
    }

    for by_category in [false, true] {
        let mut seen = Vec::new();
        let mut cursor: Option<String> = None;
        loop {
            let page = if by_category {
                engine
                    .transactions_by_category("u1", "misc", 2, cursor.as_deref())
                    .await
                    .unwrap()
            } else {
                engine
                    .transactions_by_month("u1", month("2024-05"), 2, cursor.as_deref())
                    .await
                    .unwrap()
            };
            assert!(page.items.len() <= 2);
            seen.extend(page.items);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => break,
            }
        }
        assert_eq!(seen.len(), 7);
        let unique: HashSet<&str> = seen.iter().map(|tx| tx.id.as_str()).collect();
        assert_eq!(unique.len(), 7);
    }
}

#[tokio::test]
async fn dates_beyond_the_stamp_width_are_rejected() {
    let (engine, _store) = engine();
    let old = engine
        .create_transaction(expense(1.0, "misc", date(2024, 1, 15)))
        .await
        .unwrap();
    let last = Utc.timestamp_opt(keys::MAX_TIMESTAMP, 0).unwrap();
    let latest = engine
        .create_transaction(expense(2.0, "misc", last))
        .await
        .unwrap();

    let mut future = expense(3.0, "misc", date(2024, 1, 15));
    future.date = date(2300, 1, 1);
    assert!(matches!(
        engine.create_transaction(future).await,
        Err(EngineError::Validation(_))
    ));

    let page = engine.transactions_by_user("u1", 0, None).await.unwrap();
    assert_eq!(ids(&page.items), [latest.id.as_str(), old.id.as_str()]);
}

#[tokio::test]
async fn cursor_from_another_listing_is_rejected() {
    let (engine, _store) = engine();
    for day in 1..=3 {
        engine
            .create_transaction(expense(1.0, "misc", date(2024, 5, day)))
            .await
            .unwrap();
    }
    let page = engine
        .transactions_by_month("u1", month("2024-05"), 1, None)
        .await
        .unwrap();
    let cursor = page.next_cursor.unwrap();

    let err = engine
        .transactions_by_category("u1", "misc", 1, Some(&cursor))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCursor(_)));

    let err = engine
        .transactions_by_month("u1", month("2024-05"), 1, Some("not-a-cursor"))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::InvalidCursor(_)));
}

#[tokio::test]
async fn create_collision_is_already_exists() {
    let (engine, _store) = engine();
    let tx = engine
        .create_transaction(expense(10.0, "food", date(2024, 1, 2)))
        .await
        .unwrap();
    let err = engine.create_transaction(tx.clone()).await.unwrap_err();
    assert_eq!(err, EngineError::AlreadyExists(format!("transaction {}", tx.id)));
}

#[tokio::test]
async fn create_rejects_invalid_input() {
    let (engine, store) = engine();
    let mut tx = expense(10.0, "food", date(2024, 1, 2));
    tx.amount = 0.0;
    assert!(matches!(
        engine.create_transaction(tx).await,
        Err(EngineError::Validation(_))
    ));

    let mut tx = expense(10.0, "food", date(2024, 1, 2));
    tx.amount = 10.0;
    assert!(matches!(
        engine.create_transaction(tx).await,
        Err(EngineError::Validation(_))
    ));
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn get_then_delete() {
    let (engine, _store) = engine();
    let (food, _, _) = seed(&engine).await;

    let fetched = engine.transaction("u1", &food.id).await.unwrap();
    assert_eq!(fetched, food);

    engine.delete_transaction("u1", &food.id).await.unwrap();
    assert_eq!(
        engine.transaction("u1", &food.id).await.unwrap_err(),
        EngineError::NotFound(format!("transaction {}", food.id))
    );
    assert_eq!(
        engine.delete_transaction("u1", &food.id).await.unwrap_err(),
        EngineError::NotFound(format!("transaction {}", food.id))
    );
}

#[tokio::test]
async fn delete_of_unknown_id_is_not_found() {
    let (engine, _store) = engine();
    seed(&engine).await;
    assert_eq!(
        engine.delete_transaction("u1", "missing").await.unwrap_err(),
        EngineError::NotFound("transaction missing".to_string())
    );
}

#[tokio::test]
async fn records_of_one_user_are_invisible_to_another() {
    let (engine, _store) = engine();
    let (food, _, _) = seed(&engine).await;
    assert!(matches!(
        engine.transaction("u2", &food.id).await,
        Err(EngineError::NotFound(_))
    ));
}

#[tokio::test]
async fn update_increments_version_and_keeps_created_at() {
    let (engine, _store) = engine();
    let (food, _, _) = seed(&engine).await;

    let mut edit = food.clone();
    edit.description = "groceries".to_string();
    edit.category = "Groceries".to_string();
    let updated = engine.update_transaction(edit).await.unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(updated.created_at, food.created_at);
    assert!(updated.updated_at >= food.updated_at);

    let fetched = engine.transaction("u1", &food.id).await.unwrap();
    assert_eq!(fetched, updated);

    // The category index follows the new category.
    let page = engine
        .transactions_by_category("u1", "groceries", 0, None)
        .await
        .unwrap();
    assert_eq!(ids(&page.items), [food.id.as_str()]);
    let page = engine
        .transactions_by_category("u1", "food", 0, None)
        .await
        .unwrap();
    assert!(!ids(&page.items).contains(&food.id.as_str()));
}

#[tokio::test]
async fn stale_version_is_a_conflict() {
    let (engine, _store) = engine();
    let (food, _, _) = seed(&engine).await;

    let mut first = food.clone();
    first.description = "first".to_string();
    engine.update_transaction(first).await.unwrap();

    let mut stale = food.clone();
    stale.description = "second".to_string();
    assert_eq!(
        engine.update_transaction(stale).await.unwrap_err(),
        EngineError::Conflict(format!("transaction {}", food.id))
    );
    let fetched = engine.transaction("u1", &food.id).await.unwrap();
    assert_eq!(fetched.description, "first");
    assert_eq!(fetched.version, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_updates_let_exactly_one_win() {
    let (engine, _store) = engine();
    let engine = Arc::new(engine);
    let (food, _, _) = seed(&engine).await;

    let mut left = food.clone();
    left.description = "left".to_string();
    let mut right = food.clone();
    right.description = "right".to_string();

    let (a, b) = tokio::join!(
        {
            let engine = engine.clone();
            async move { engine.update_transaction(left).await }
        },
        {
            let engine = engine.clone();
            async move { engine.update_transaction(right).await }
        }
    );
    let results = [a, b];
    let wins = results.iter().filter(|r| r.is_ok()).count();
    let conflicts = results
        .iter()
        .filter(|r| matches!(r, Err(EngineError::Conflict(_))))
        .count();
    assert_eq!((wins, conflicts), (1, 1));
    assert_eq!(engine.transaction("u1", &food.id).await.unwrap().version, 2);
}

#[tokio::test]
async fn update_that_changes_date_moves_the_record() {
    let (engine, store) = engine();
    let (food, _, _) = seed(&engine).await;
    let stored_before = store.len().await;

    let mut edit = food.clone();
    edit.date = date(2024, 3, 10);
    let updated = engine.update_transaction(edit).await.unwrap();
    assert_eq!(updated.version, 2);
    assert_eq!(store.len().await, stored_before);

    let january = engine
        .transactions_by_month("u1", month("2024-01"), 0, None)
        .await
        .unwrap();
    assert!(!ids(&january.items).contains(&food.id.as_str()));
    let march = engine
        .transactions_by_month("u1", month("2024-03"), 0, None)
        .await
        .unwrap();
    assert_eq!(ids(&march.items), [food.id.as_str()]);
    assert_eq!(engine.transaction("u1", &food.id).await.unwrap(), updated);
}

#[tokio::test]
async fn records_without_id_index_are_found_by_partition_scan() {
    let (engine, store) = engine();
    let legacy = expense(12.0, "books", date(2023, 11, 5));
    let mut item = legacy.to_item();
    item.remove(keys::GSI3_PK);
    item.remove("version");
    store.put(item, Condition::None).await.unwrap();

    let fetched = engine.transaction("u1", &legacy.id).await.unwrap();
    assert_eq!(fetched.id, legacy.id);
    assert_eq!(fetched.version, 1);

    engine.delete_transaction("u1", &legacy.id).await.unwrap();
    assert!(store.is_empty().await);
}

#[tokio::test]
async fn lookups_never_reach_another_users_record() {
    let (engine, store) = engine();
    let mut tx = Transaction::new(
        "a",
        TransactionKind::Expense,
        9.0,
        "misc",
        "secret",
        date(2024, 1, 1),
    )
    .unwrap();
    tx.id = "b#c".to_string();
    assert!(matches!(
        engine.create_transaction(tx.clone()).await,
        Err(EngineError::Validation(_))
    ));
    // Written around validation, as an older client could have.
    store.put(tx.to_item(), Condition::None).await.unwrap();

    assert!(matches!(
        engine.transaction("a#b", "c").await,
        Err(EngineError::NotFound(_))
    ));
    assert!(matches!(
        engine.delete_transaction("a#b", "c").await,
        Err(EngineError::NotFound(_))
    ));
    assert_eq!(engine.all_transactions_by_user("a").await.unwrap().len(), 1);
    let own = engine.transaction("a", "b#c").await.unwrap();
    assert_eq!(own.description, "secret");
}

#[tokio::test]
async fn undecodable_id_index_entry_falls_back_to_partition_scan() {
    let (engine, store) = engine();
    let legacy = expense(12.0, "books", date(2023, 11, 5));
    let mut item = legacy.to_item();
    item.remove(keys::GSI3_PK);
    store.put(item, Condition::None).await.unwrap();

    let mut broken = legacy.clone();
    broken.date = date(2023, 12, 5);
    let mut broken = broken.to_item();
    broken.remove("amount");
    store.put(broken, Condition::None).await.unwrap();

    let fetched = engine.transaction("u1", &legacy.id).await.unwrap();
    assert_eq!(fetched.date, legacy.date);
    assert_eq!(fetched.amount, -12.0);
}

#[tokio::test]
async fn undecodable_records_are_skipped_in_listings() {
    let (engine, store) = engine();
    let (food, salary, later_food) = seed(&engine).await;

    let mut broken = expense(1.0, "food", date(2024, 1, 18)).to_item();
    broken.remove("amount");
    store.put(broken, Condition::None).await.unwrap();

    let page = engine
        .transactions_by_user("u1", 0, None)
        .await
        .unwrap();
    assert_eq!(
        ids(&page.items),
        [later_food.id.as_str(), salary.id.as_str(), food.id.as_str()]
    );
}

#[tokio::test]
async fn users_are_created_once() {
    let (engine, _store) = engine();
    let user = User::with_id("u1", "ada@example.com", "Ada").unwrap();
    engine.create_user(user.clone()).await.unwrap();
    assert_eq!(engine.user("u1").await.unwrap(), user);
    assert_eq!(
        engine.create_user(user).await.unwrap_err(),
        EngineError::AlreadyExists("user u1".to_string())
    );
    assert_eq!(
        engine.user("nobody").await.unwrap_err(),
        EngineError::NotFound("user nobody".to_string())
    );
}

#[tokio::test]
async fn profile_and_budgets_stay_out_of_transaction_listings() {
    let (engine, _store) = engine();
    engine
        .create_user(User::with_id("u1", "ada@example.com", "Ada").unwrap())
        .await
        .unwrap();
    engine
        .set_budget("u1", month("2024-01"), "food", 100.0)
        .await
        .unwrap();
    seed(&engine).await;

    let page = engine.transactions_by_user("u1", 0, None).await.unwrap();
    assert_eq!(page.items.len(), 3);
}
