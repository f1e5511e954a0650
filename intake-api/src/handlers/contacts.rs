use actix_web::{web, HttpResponse, Result as ActixResult};
use shared_types::ContactRecordResponse;
use std::sync::Arc;

use super::intake_error;
use crate::error::IntakeError;
use crate::store::ContactStore;

pub async fn get_contact(
    store: web::Data<Arc<dyn ContactStore>>,
    path: web::Path<i64>,
) -> ActixResult<HttpResponse> {
    let contact_id = path.into_inner();

    let record = store
        .get_contact_record(contact_id)
        .await
        .map_err(|e| intake_error(e.into()))?
        .ok_or_else(|| {
            intake_error(IntakeError::NotFound(format!(
                "Contact {} not found",
                contact_id
            )))
        })?;

    Ok(HttpResponse::Ok().json(ContactRecordResponse { record }))
}
