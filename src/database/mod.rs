mod contact;
mod schema;

pub use contact::*;

use std::time::{Duration, Instant};

use anyhow::Context;
use chrono::Utc;
use diesel::connection::SimpleConnection;
use diesel::pg::PgConnection;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::sqlite::SqliteConnection;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::contact::{Contact, ContactFormData, ContactPatch};
use crate::error::{ContactError, Result};
use crate::metrics::metrics;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

const MIGRATION_SQL: &str = include_str!("../../migrations/001_initial.sql");
const POSTGRES_ONLY: &str = "-- only: postgres";

/// Handle to the contact store. Cloning shares the underlying connection pool.
#[derive(Debug, Clone)]
pub struct Database {
    inner: DatabaseInner,
    timeout: Duration,
}

#[derive(Debug, Clone)]
enum DatabaseInner {
    Sqlite(Pool<ConnectionManager<SqliteConnection>>),
    Postgres(Pool<ConnectionManager<PgConnection>>),
}

impl Database {
    pub async fn connect(
        db_type: &str,
        uri: &str,
        max_open: u32,
        max_idle: u32,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let max_open = max_open.max(1);
        let max_idle = max_idle.min(max_open);
        let db_type = db_type.trim().to_ascii_lowercase();

        let inner = match db_type.as_str() {
            "sqlite" | "sqlite3" => {
                info!("Connecting to SQLite database with Diesel");
                let database_url = normalize_sqlite_uri(uri);
                let manager = ConnectionManager::<SqliteConnection>::new(database_url);
                let pool = Pool::builder()
                    .max_size(max_open)
                    .min_idle(Some(max_idle))
                    .connection_timeout(timeout)
                    .build(manager)
                    .context("failed to create sqlite connection pool")?;
                DatabaseInner::Sqlite(pool)
            }
            "postgres" | "postgresql" | "pgsql" => {
                info!("Connecting to PostgreSQL database with Diesel");
                let manager = ConnectionManager::<PgConnection>::new(uri.to_owned());
                let pool = Pool::builder()
                    .max_size(max_open)
                    .min_idle(Some(max_idle))
                    .connection_timeout(timeout)
                    .build(manager)
                    .context("failed to create postgres connection pool")?;
                DatabaseInner::Postgres(pool)
            }
            _ => anyhow::bail!(
                "Unsupported database type: {db_type}. Supported types: sqlite/sqlite3/postgres/postgresql/pgsql"
            ),
        };

        Ok(Self { inner, timeout })
    }

    pub fn is_sqlite(&self) -> bool {
        matches!(self.inner, DatabaseInner::Sqlite(_))
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub async fn run_migrations(&self) -> anyhow::Result<()> {
        match &self.inner {
            DatabaseInner::Sqlite(_) => {
                let migration_sql = MIGRATION_SQL
                    .lines()
                    .filter(|line| !line.trim_end().ends_with(POSTGRES_ONLY))
                    .collect::<Vec<_>>()
                    .join("\n");
                self.with_sqlite_conn(move |conn| {
                    conn.batch_execute(&migration_sql)?;
                    Ok(())
                })
                .await
                .context("failed to migrate sqlite database")?;
            }
            DatabaseInner::Postgres(_) => {
                self.with_postgres_conn(|conn| {
                    conn.batch_execute(MIGRATION_SQL)?;
                    Ok(())
                })
                .await
                .context("failed to migrate postgres database")?;
            }
        }

        info!("Database migrations completed");
        Ok(())
    }

    /// All contacts, newest created first.
    pub async fn list_contacts(&self) -> Result<Vec<Contact>> {
        let rows = match &self.inner {
            DatabaseInner::Sqlite(_) => self.with_sqlite_conn(ContactQuery::list_sqlite).await,
            DatabaseInner::Postgres(_) => self.with_postgres_conn(ContactQuery::list_postgres).await,
        };
        let rows = rows?;
        metrics().contacts_listed.inc().await;
        into_contacts(rows)
    }

    pub async fn get_contact(&self, id: &str) -> Result<Contact> {
        let id = id.to_owned();
        let row = match &self.inner {
            DatabaseInner::Sqlite(_) => {
                let id = id.clone();
                self.with_sqlite_conn(move |conn| ContactQuery::get_by_id_sqlite(conn, &id))
                    .await
            }
            DatabaseInner::Postgres(_) => {
                let id = id.clone();
                self.with_postgres_conn(move |conn| ContactQuery::get_by_id_postgres(conn, &id))
                    .await
            }
        }?;
        metrics().contacts_fetched.inc().await;
        row.ok_or(ContactError::NotFound(id))?.try_into()
    }

    /// Inserts a new contact with a fresh id and `created_at == updated_at`.
    pub async fn add_contact(&self, form: &ContactFormData) -> Result<Contact> {
        let id = uuid::Uuid::new_v4().to_string();
        let row = ContactRow::from_form(id, form, now_millis())?;
        let insert = NewContact::from(&row);
        match &self.inner {
            DatabaseInner::Sqlite(_) => {
                self.with_sqlite_conn(move |conn| ContactQuery::insert_sqlite(conn, &insert))
                    .await
            }
            DatabaseInner::Postgres(_) => {
                self.with_postgres_conn(move |conn| ContactQuery::insert_postgres(conn, &insert))
                    .await
            }
        }?;
        metrics().contacts_created.inc().await;
        info!("Added contact {}", row.id);
        row.try_into()
    }

    /// Applies the supplied fields and always refreshes `updated_at`.
    pub async fn update_contact(&self, id: &str, patch: &ContactPatch) -> Result<Contact> {
        let id = id.to_owned();
        let patch = patch.clone();
        let now = now_millis();
        let row = match &self.inner {
            DatabaseInner::Sqlite(_) => {
                self.with_sqlite_conn(move |conn| ContactQuery::update_sqlite(conn, &id, &patch, now))
                    .await
            }
            DatabaseInner::Postgres(_) => {
                self.with_postgres_conn(move |conn| {
                    ContactQuery::update_postgres(conn, &id, &patch, now)
                })
                .await
            }
        }?;
        metrics().contacts_updated.inc().await;
        info!("Updated contact {}", row.id);
        row.try_into()
    }

    /// Hard delete. An id with no row fails with `NotFound`.
    pub async fn delete_contact(&self, id: &str) -> Result<()> {
        let id = id.to_owned();
        let target = id.clone();
        match &self.inner {
            DatabaseInner::Sqlite(_) => {
                self.with_sqlite_conn(move |conn| ContactQuery::delete_sqlite(conn, &target))
                    .await
            }
            DatabaseInner::Postgres(_) => {
                self.with_postgres_conn(move |conn| ContactQuery::delete_postgres(conn, &target))
                    .await
            }
        }?;
        metrics().contacts_deleted.inc().await;
        info!("Deleted contact {}", id);
        Ok(())
    }

    /// Case-insensitive substring search; a blank query lists everything.
    pub async fn search_contacts(&self, query: &str) -> Result<Vec<Contact>> {
        if query.trim().is_empty() {
            return self.list_contacts().await;
        }

        let query = query.to_owned();
        debug!("Searching contacts for {:?}", query);
        let rows = match &self.inner {
            DatabaseInner::Sqlite(_) => {
                self.with_sqlite_conn(move |conn| ContactQuery::search_sqlite(conn, &query))
                    .await
            }
            DatabaseInner::Postgres(_) => {
                self.with_postgres_conn(move |conn| ContactQuery::search_postgres(conn, &query))
                    .await
            }
        };
        let rows = rows?;
        metrics().contacts_searched.inc().await;
        into_contacts(rows)
    }

    /// Inserts the sample address book when the store holds no contacts yet.
    pub async fn seed_samples(&self) -> Result<usize> {
        let count = match &self.inner {
            DatabaseInner::Sqlite(_) => self.with_sqlite_conn(ContactQuery::count_sqlite).await,
            DatabaseInner::Postgres(_) => self.with_postgres_conn(ContactQuery::count_postgres).await,
        }?;
        if count > 0 {
            debug!("Store already holds {} contacts, skipping samples", count);
            return Ok(0);
        }

        let samples = sample_contacts();
        for form in &samples {
            self.add_contact(form).await?;
        }
        info!("Seeded {} sample contacts", samples.len());
        Ok(samples.len())
    }

    async fn with_sqlite_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut SqliteConnection) -> Result<T> + Send + 'static,
    {
        let pool = match &self.inner {
            DatabaseInner::Sqlite(pool) => pool.clone(),
            DatabaseInner::Postgres(_) => {
                return Err(ContactError::StoreUnavailable(
                    "internal error: expected sqlite database".to_string(),
                ));
            }
        };
        self.bounded(tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        }))
        .await
    }

    async fn with_postgres_conn<T, F>(&self, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut PgConnection) -> Result<T> + Send + 'static,
    {
        let pool = match &self.inner {
            DatabaseInner::Sqlite(_) => {
                return Err(ContactError::StoreUnavailable(
                    "internal error: expected postgres database".to_string(),
                ));
            }
            DatabaseInner::Postgres(pool) => pool.clone(),
        };
        self.bounded(tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        }))
        .await
    }

    async fn bounded<T>(&self, task: JoinHandle<Result<T>>) -> Result<T> {
        let started = Instant::now();
        let result = match tokio::time::timeout(self.timeout, task).await {
            Ok(Ok(result)) => result,
            Ok(Err(e)) => Err(ContactError::store_unavailable("diesel task join error", e)),
            Err(_) => {
                warn!("Store operation timed out after {:?}", self.timeout);
                Err(ContactError::StoreUnavailable(format!(
                    "operation timed out after {:?}",
                    self.timeout
                )))
            }
        };

        let m = metrics();
        m.store_latency.observe_since(started).await;
        if let Err(ContactError::StoreUnavailable(e)) = &result {
            warn!("Store operation failed: {}", e);
            m.store_errors.inc().await;
        }
        result
    }
}

fn into_contacts(rows: Vec<ContactRow>) -> Result<Vec<Contact>> {
    rows.into_iter().map(Contact::try_from).collect()
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn normalize_sqlite_uri(uri: &str) -> String {
    uri.strip_prefix("sqlite://")
        .or_else(|| uri.strip_prefix("sqlite:"))
        .unwrap_or(uri)
        .to_owned()
}

fn sample_contacts() -> Vec<ContactFormData> {
    let mut john = ContactFormData::new("John Doe", "john@example.com", "+1 (555) 123-4567");
    john.address = Some("123 Main St, City, Country".to_string());
    john.notes = Some("Met at conference".to_string());

    let mut jane = ContactFormData::new("Jane Smith", "jane@example.com", "+1 (555) 987-6543");
    jane.address = Some("456 Oak Ave, Town, Country".to_string());
    jane.notes = Some("Project collaborator".to_string());

    vec![john, jane]
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn memory_db(timeout: Duration) -> Database {
        let db = Database::connect("sqlite", ":memory:", 1, 1, timeout).await.unwrap();
        db.run_migrations().await.unwrap();
        db
    }

    #[tokio::test]
    async fn test_exhausted_pool_is_unavailable() {
        let db = memory_db(Duration::from_millis(200)).await;
        let DatabaseInner::Sqlite(pool) = &db.inner else {
            panic!("Expected sqlite pool");
        };
        let held = pool.get().unwrap();

        let err = db.list_contacts().await.unwrap_err();
        assert!(matches!(err, ContactError::StoreUnavailable(_)), "got {err:?}");

        drop(held);
        assert!(db.list_contacts().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_slow_operation_times_out() {
        let db = Database {
            timeout: Duration::from_millis(50),
            ..memory_db(Duration::from_secs(5)).await
        };

        let task = tokio::task::spawn_blocking(|| {
            std::thread::sleep(Duration::from_millis(500));
            Ok(())
        });
        match db.bounded(task).await {
            Err(ContactError::StoreUnavailable(msg)) => assert!(msg.contains("timed out")),
            other => panic!("Expected StoreUnavailable, got {other:?}"),
        }
    }

    #[test]
    fn test_normalize_sqlite_uri() {
        assert_eq!(normalize_sqlite_uri("sqlite://contacts.db"), "contacts.db");
        assert_eq!(normalize_sqlite_uri("sqlite:contacts.db"), "contacts.db");
        assert_eq!(normalize_sqlite_uri(":memory:"), ":memory:");
    }

    #[test]
    fn test_sample_contacts_pass_validation() {
        for form in sample_contacts() {
            assert!(crate::validation::validate(&form).is_empty());
        }
    }

    #[test]
    fn test_sqlite_migration_drops_postgres_only_lines() {
        let filtered: Vec<_> = MIGRATION_SQL
            .lines()
            .filter(|line| !line.trim_end().ends_with(POSTGRES_ONLY))
            .collect();
        assert!(filtered.iter().all(|line| !line.contains("COMMENT ON")));
        assert!(filtered.iter().any(|line| line.contains("CREATE TABLE")));
    }
}
