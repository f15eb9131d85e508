pub mod contacts;
pub mod health;

use std::sync::Arc;
use std::time::Instant;

use salvo::cors::{AllowHeaders, AllowMethods, AllowOrigin, Cors};
use salvo::prelude::*;

use crate::database::Database;

#[derive(Clone)]
pub struct WebState {
    pub started_at: Instant,
    pub service_name: String,
    pub version: String,
}

impl WebState {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
            service_name: crate::NAME.to_string(),
            version: crate::VERSION.to_string(),
        }
    }
}

lazy_static::lazy_static! {
    static ref WEB_STATE: Arc<WebState> = Arc::new(WebState::new());
}

pub fn web_state() -> Arc<WebState> {
    WEB_STATE.clone()
}

pub fn create_router(db: Database) -> Router {
    Router::new()
        .hoop(DatabaseHoop { db })
        .push(
            Router::with_path("/contacts")
                .get(contacts::list_contacts)
                .post(contacts::create_contact),
        )
        .push(
            Router::with_path("/contacts/{id}")
                .get(contacts::get_contact)
                .patch(contacts::update_contact)
                .put(contacts::replace_contact)
                .delete(contacts::delete_contact),
        )
        .push(Router::with_path("/health").get(health::health_check))
        .push(Router::with_path("/status").get(health::get_status))
        .push(Router::with_path("/metrics").get(health::get_metrics))
}

/// Wraps the router so browser front ends on other origins can call it.
pub fn create_service(db: Database) -> Service {
    let cors = Cors::new()
        .allow_origin(AllowOrigin::any())
        .allow_methods(AllowMethods::any())
        .allow_headers(AllowHeaders::any())
        .into_handler();
    Service::new(create_router(db)).hoop(cors)
}

struct DatabaseHoop {
    db: Database,
}

#[async_trait::async_trait]
impl Handler for DatabaseHoop {
    async fn handle(&self, req: &mut Request, depot: &mut Depot, res: &mut Response, ctrl: &mut FlowCtrl) {
        depot.insert("db", self.db.clone());
        ctrl.call_next(req, depot, res).await;
    }
}
