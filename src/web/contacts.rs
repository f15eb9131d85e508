use salvo::prelude::*;
use serde_json::json;
use tracing::warn;

use crate::contact::{ContactFormData, ContactPatch};
use crate::database::Database;
use crate::error::ContactError;
use crate::metrics::metrics;
use crate::validation::{ensure_valid, ensure_valid_patch};

fn render_error(res: &mut Response, status: StatusCode, message: &str) {
    res.status_code(status);
    res.render(Json(json!({ "error": message })));
}

pub fn status_for(err: &ContactError) -> StatusCode {
    match err {
        ContactError::ValidationFailed(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ContactError::NotFound(_) => StatusCode::NOT_FOUND,
        ContactError::ValidationRejected(_) => StatusCode::CONFLICT,
        ContactError::StoreUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

async fn render_contact_error(res: &mut Response, err: ContactError) {
    let status = status_for(&err);
    match &err {
        ContactError::ValidationFailed(errors) => {
            metrics().validation_failures.inc().await;
            res.status_code(status);
            res.render(Json(json!({
                "error": err.to_string(),
                "fields": errors,
            })));
        }
        ContactError::StoreUnavailable(detail) => {
            warn!("Store unavailable: {}", detail);
            render_error(res, status, "contact store unavailable, please try again");
        }
        _ => render_error(res, status, &err.to_string()),
    }
}

fn database(depot: &Depot, res: &mut Response) -> Option<Database> {
    match depot.get::<Database>("db") {
        Ok(db) => Some(db.clone()),
        Err(_) => {
            render_error(res, StatusCode::INTERNAL_SERVER_ERROR, "contact store not available");
            None
        }
    }
}

fn contact_id(req: &Request, res: &mut Response) -> Option<String> {
    match req.param::<String>("id") {
        Some(id) if !id.trim().is_empty() => Some(id),
        _ => {
            render_error(res, StatusCode::BAD_REQUEST, "missing contact id");
            None
        }
    }
}

#[handler]
pub async fn list_contacts(req: &mut Request, res: &mut Response, depot: &mut Depot) {
    let Some(db) = database(depot, res) else {
        return;
    };

    let query = req.query::<String>("q").unwrap_or_default();

    match db.search_contacts(&query).await {
        Ok(contacts) => {
            res.render(Json(json!({
                "count": contacts.len(),
                "contacts": contacts,
            })));
        }
        Err(err) => render_contact_error(res, err).await,
    }
}

#[handler]
pub async fn get_contact(req: &mut Request, res: &mut Response, depot: &mut Depot) {
    let Some(db) = database(depot, res) else {
        return;
    };
    let Some(id) = contact_id(req, res) else {
        return;
    };

    match db.get_contact(&id).await {
        Ok(contact) => res.render(Json(json!({ "contact": contact }))),
        Err(err) => render_contact_error(res, err).await,
    }
}

#[handler]
pub async fn create_contact(req: &mut Request, res: &mut Response, depot: &mut Depot) {
    let Some(db) = database(depot, res) else {
        return;
    };

    let form = match req.parse_json::<ContactFormData>().await {
        Ok(form) => form,
        Err(e) => {
            render_error(res, StatusCode::BAD_REQUEST, &format!("invalid contact body: {e}"));
            return;
        }
    };

    if let Err(err) = ensure_valid(&form) {
        render_contact_error(res, err).await;
        return;
    }

    match db.add_contact(&form).await {
        Ok(contact) => {
            res.status_code(StatusCode::CREATED);
            res.render(Json(json!({ "contact": contact })));
        }
        Err(err) => render_contact_error(res, err).await,
    }
}

/// Partial edit: only the fields present in the body change.
#[handler]
pub async fn update_contact(req: &mut Request, res: &mut Response, depot: &mut Depot) {
    let Some(db) = database(depot, res) else {
        return;
    };
    let Some(id) = contact_id(req, res) else {
        return;
    };

    let patch = match req.parse_json::<ContactPatch>().await {
        Ok(patch) => patch,
        Err(e) => {
            render_error(res, StatusCode::BAD_REQUEST, &format!("invalid contact body: {e}"));
            return;
        }
    };

    if let Err(err) = ensure_valid_patch(&patch) {
        render_contact_error(res, err).await;
        return;
    }

    match db.update_contact(&id, &patch).await {
        Ok(contact) => res.render(Json(json!({ "contact": contact }))),
        Err(err) => render_contact_error(res, err).await,
    }
}

/// Full-form resubmission from the edit dialog; absent optionals are cleared.
#[handler]
pub async fn replace_contact(req: &mut Request, res: &mut Response, depot: &mut Depot) {
    let Some(db) = database(depot, res) else {
        return;
    };
    let Some(id) = contact_id(req, res) else {
        return;
    };

    let form = match req.parse_json::<ContactFormData>().await {
        Ok(form) => form,
        Err(e) => {
            render_error(res, StatusCode::BAD_REQUEST, &format!("invalid contact body: {e}"));
            return;
        }
    };

    if let Err(err) = ensure_valid(&form) {
        render_contact_error(res, err).await;
        return;
    }

    match db.update_contact(&id, &ContactPatch::from(form)).await {
        Ok(contact) => res.render(Json(json!({ "contact": contact }))),
        Err(err) => render_contact_error(res, err).await,
    }
}

#[handler]
pub async fn delete_contact(req: &mut Request, res: &mut Response, depot: &mut Depot) {
    let Some(db) = database(depot, res) else {
        return;
    };
    let Some(id) = contact_id(req, res) else {
        return;
    };

    match db.delete_contact(&id).await {
        Ok(()) => res.render(Json(json!({ "ok": true, "message": "contact deleted" }))),
        Err(err) => render_contact_error(res, err).await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validation::validate;

    #[test]
    fn test_status_for_each_error_kind() {
        let errors = validate(&ContactFormData::default());
        assert_eq!(
            status_for(&ContactError::ValidationFailed(errors)),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            status_for(&ContactError::NotFound("x".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            status_for(&ContactError::ValidationRejected("dup".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            status_for(&ContactError::StoreUnavailable("down".to_string())),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }
}
