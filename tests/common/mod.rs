use std::time::Duration;

use contact_book::database::Database;
use contact_book::ContactFormData;

/// A migrated in-memory SQLite store. The pool holds a single connection so
/// every operation sees the same database.
pub async fn memory_store() -> Database {
    let db = Database::connect("sqlite", ":memory:", 1, 1, Duration::from_secs(10))
        .await
        .expect("in-memory sqlite pool");
    db.run_migrations().await.expect("migrations");
    db
}

pub fn form(full_name: &str, email: &str, phone: &str) -> ContactFormData {
    ContactFormData::new(full_name, email, phone)
}

/// Keeps consecutive inserts from sharing a millisecond timestamp.
pub async fn tick() {
    tokio::time::sleep(Duration::from_millis(5)).await;
}
