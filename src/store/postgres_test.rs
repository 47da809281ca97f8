use super::*;

// =============================================================================
// interval conversion
// =============================================================================

#[test]
fn lifetime_to_interval_uses_microseconds_only() {
    let interval = lifetime_to_interval(Duration::from_millis(1500));
    assert_eq!(interval.months, 0);
    assert_eq!(interval.days, 0);
    assert_eq!(interval.microseconds, 1_500_000);
}

#[test]
fn lifetime_to_interval_caps_huge_values() {
    let interval = lifetime_to_interval(Duration::MAX);
    assert_eq!(interval.microseconds, i64::MAX);
}

#[test]
fn interval_to_lifetime_counts_days() {
    let interval = PgInterval { months: 0, days: 2, microseconds: 5 };
    assert_eq!(interval_to_lifetime(&interval), Duration::from_secs(2 * 86_400) + Duration::from_micros(5));
}

#[test]
fn interval_to_lifetime_clamps_negative_to_zero() {
    let interval = PgInterval { months: 0, days: 0, microseconds: -10 };
    assert_eq!(interval_to_lifetime(&interval), Duration::ZERO);
}

#[test]
fn interval_round_trip_keeps_second_precision() {
    let ttl = Duration::from_secs(7 * 86_400);
    assert_eq!(interval_to_lifetime(&lifetime_to_interval(ttl)), ttl);
}

// =============================================================================
// live database (requires DATABASE_URL)
// =============================================================================

#[cfg(feature = "live-db-tests")]
mod live {
    use super::*;
    use crate::store::{CredentialStore, NewAccount, NewSnippet, SnippetStatus, SnippetStore, StoreError};

    async fn pool() -> PgPool {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL required for live-db-tests");
        crate::db::init_pool(&url, 2).await.expect("database init failed")
    }

    fn unique_login() -> String {
        format!("u{}", &Uuid::new_v4().simple().to_string()[..12])
    }

    #[tokio::test]
    async fn account_unique_login_and_lookups() {
        let store = PgCredentialStore::new(pool().await);
        let login = unique_login();
        let account = store
            .create_account(NewAccount { login: login.clone(), password_hash: "h".into() })
            .await
            .unwrap();

        let dup = store
            .create_account(NewAccount { login: login.clone(), password_hash: "h".into() })
            .await;
        assert!(matches!(dup, Err(StoreError::AlreadyExists)));
        assert_eq!(store.get_account_by_login(&login).await.unwrap().id, account.id);
        assert_eq!(store.get_account_by_id(account.id).await.unwrap().login, login);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_create_account_same_login_has_one_winner() {
        let store = std::sync::Arc::new(PgCredentialStore::new(pool().await));
        let login = unique_login();
        let mut handles = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            let login = login.clone();
            handles.push(tokio::spawn(async move {
                store.create_account(NewAccount { login, password_hash: "h".into() }).await
            }));
        }

        let mut ok = 0;
        let mut conflicts = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) => ok += 1,
                Err(StoreError::AlreadyExists) => conflicts += 1,
                Err(e) => panic!("unexpected error: {e}"),
            }
        }
        assert_eq!(ok, 1);
        assert_eq!(conflicts, 15);
    }

    #[tokio::test]
    async fn snippet_lifecycle() {
        let pool = pool().await;
        let accounts = PgCredentialStore::new(pool.clone());
        let store = PgSnippetStore::new(pool);
        let owner = accounts
            .create_account(NewAccount { login: unique_login(), password_hash: "h".into() })
            .await
            .unwrap();

        let ttl = Duration::from_secs(600);
        let first = store
            .create_snippet_with_owner(NewSnippet { code: "a".into(), language: None, ttl }, owner.id)
            .await
            .unwrap();
        let second = store
            .create_snippet_with_owner(NewSnippet { code: "b".into(), language: Some("Go".into()), ttl }, owner.id)
            .await
            .unwrap();
        let expired = store
            .create_snippet_with_owner(NewSnippet { code: "c".into(), language: None, ttl: Duration::ZERO }, owner.id)
            .await
            .unwrap();

        assert_eq!(store.get_owned_snippet_ids(owner.id).await.unwrap(), vec![first, second]);
        assert!(matches!(store.get_snippet_by_id(expired).await, Err(StoreError::NotFound)));

        store.set_status(second, true, "ok").await.unwrap();
        store.set_status(second, false, "late").await.unwrap();
        let snippet = store.get_snippet_by_id(second).await.unwrap();
        assert_eq!(snippet.status, SnippetStatus::Checked { correct: true, message: "ok".into() });
        assert_eq!(snippet.ttl, ttl);

        assert!(matches!(store.set_status(expired, true, "").await, Err(StoreError::NotFound)));
        assert!(store.delete_expired_snippets().await.unwrap() >= 1);
    }
}
