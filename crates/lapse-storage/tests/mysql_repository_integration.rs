use jiff::{SignedDuration, Timestamp};
use lapse_core::ShortCode;
use lapse_storage::{MySqlRepository, NewUrlRecord, ReadRepository, Repository, StorageError};
use lapse_test_infra::mysql::{MySqlServer, MysqlConfig};

struct Fixture {
    _mysql: MySqlServer,
    repo: MySqlRepository,
}

impl Fixture {
    async fn start() -> Self {
        let mysql = MySqlServer::new(MysqlConfig::builder().build())
            .await
            .expect("start mysql");
        let pool = mysql.pool().await.expect("connect mysql");

        let repo = MySqlRepository::new(pool);
        repo.migrate().await.expect("create schema");

        Self {
            _mysql: mysql,
            repo,
        }
    }
}

fn code(value: &str) -> ShortCode {
    ShortCode::new(value).unwrap()
}

fn record(c: &str, url: &str, expire_at: Timestamp) -> NewUrlRecord {
    NewUrlRecord {
        code: code(c),
        original_url: url.to_string(),
        expire_at,
    }
}

fn in_hours(hours: i64) -> Timestamp {
    Timestamp::now() + SignedDuration::from_hours(hours)
}

#[tokio::test]
async fn insert_and_get_record() {
    let fixture = Fixture::start().await;
    let expire_at = in_hours(1);

    let stored = fixture
        .repo
        .insert(record("abc123", "https://example.com", expire_at))
        .await
        .unwrap();

    let got = fixture.repo.get(&code("abc123")).await.unwrap().unwrap();
    assert_eq!(got, stored);
    assert_eq!(got.original_url, "https://example.com");
    assert_eq!(got.expire_at.as_millisecond(), expire_at.as_millisecond());
}

#[tokio::test]
async fn migrate_is_idempotent() {
    let fixture = Fixture::start().await;

    fixture.repo.migrate().await.unwrap();
}

#[tokio::test]
async fn insert_conflicts_when_code_already_exists() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .insert(record("abc123", "https://one.example", in_hours(1)))
        .await
        .unwrap();

    let err = fixture
        .repo
        .insert(record("abc123", "https://two.example", in_hours(1)))
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::Conflict(_)));
}

#[tokio::test]
async fn codes_are_case_sensitive() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .insert(record("abcdef", "https://lower.example", in_hours(1)))
        .await
        .unwrap();
    fixture
        .repo
        .insert(record("ABCDEF", "https://upper.example", in_hours(1)))
        .await
        .unwrap();

    let upper = fixture.repo.get(&code("ABCDEF")).await.unwrap().unwrap();
    assert_eq!(upper.original_url, "https://upper.example");
}

#[tokio::test]
async fn get_active_skips_expired_record() {
    let fixture = Fixture::start().await;
    let expired = Timestamp::now() - SignedDuration::from_secs(1);

    fixture
        .repo
        .insert(record("expird", "https://example.com", expired))
        .await
        .unwrap();

    let now = Timestamp::now();
    assert!(fixture
        .repo
        .get_active(&code("expird"), now)
        .await
        .unwrap()
        .is_none());
    assert!(fixture.repo.exists(&code("expird")).await.unwrap());
}

#[tokio::test]
async fn find_by_url_returns_longest_lived_active_record() {
    let fixture = Fixture::start().await;
    let url = "https://example.com/page";

    fixture
        .repo
        .insert(record("gone00", url, Timestamp::now() - SignedDuration::from_secs(5)))
        .await
        .unwrap();
    fixture
        .repo
        .insert(record("short0", url, in_hours(1)))
        .await
        .unwrap();
    fixture
        .repo
        .insert(record("long00", url, in_hours(2)))
        .await
        .unwrap();

    let found = fixture
        .repo
        .find_by_url(url, Timestamp::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(found.code, code("long00"));
}

#[tokio::test]
async fn find_by_url_is_case_sensitive() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .insert(record("lower0", "https://x.com/page", in_hours(1)))
        .await
        .unwrap();

    let other = fixture
        .repo
        .find_by_url("https://x.com/Page", Timestamp::now())
        .await
        .unwrap();
    assert!(other.is_none());

    let same = fixture
        .repo
        .find_by_url("https://x.com/page", Timestamp::now())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(same.code, code("lower0"));
}

#[tokio::test]
async fn list_and_sweep_expired_records() {
    let fixture = Fixture::start().await;
    let past = Timestamp::now() - SignedDuration::from_secs(5);

    fixture
        .repo
        .insert(record("dead01", "https://a.example", past))
        .await
        .unwrap();
    fixture
        .repo
        .insert(record("dead02", "https://b.example", past))
        .await
        .unwrap();
    fixture
        .repo
        .insert(record("live01", "https://c.example", in_hours(1)))
        .await
        .unwrap();

    let now = Timestamp::now();
    assert_eq!(fixture.repo.list_expired(now).await.unwrap().len(), 2);
    let active = fixture.repo.list_active(now).await.unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].code, code("live01"));

    assert_eq!(fixture.repo.delete_expired(now).await.unwrap(), 2);
    assert_eq!(fixture.repo.delete_expired(now).await.unwrap(), 0);
    assert!(fixture.repo.exists(&code("live01")).await.unwrap());
}

#[tokio::test]
async fn delete_if_expired_spares_live_records() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .insert(record("live01", "https://example.com", in_hours(1)))
        .await
        .unwrap();

    let now = Timestamp::now();
    assert!(!fixture
        .repo
        .delete_if_expired(&code("live01"), now)
        .await
        .unwrap());
    assert!(fixture
        .repo
        .delete_if_expired(&code("live01"), in_hours(2))
        .await
        .unwrap());
    assert!(!fixture.repo.exists(&code("live01")).await.unwrap());
}

#[tokio::test]
async fn delete_removes_the_record_and_frees_the_code() {
    let fixture = Fixture::start().await;

    fixture
        .repo
        .insert(record("to0del", "https://example.com", in_hours(1)))
        .await
        .unwrap();

    assert!(fixture.repo.delete(&code("to0del")).await.unwrap());
    assert!(fixture.repo.get(&code("to0del")).await.unwrap().is_none());
    assert!(!fixture.repo.delete(&code("to0del")).await.unwrap());

    fixture
        .repo
        .insert(record("to0del", "https://again.example", in_hours(1)))
        .await
        .unwrap();
}
