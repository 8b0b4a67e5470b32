//! Prescription review flow: the client attaches a document, an admin
//! validates or rejects it, and the owning order moves accordingly.

use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    core::error::AppError,
    models::{NotificationKind, OrderStatus, PrescriptionEntity},
    services::orders,
    store::MarketStore,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AttachPrescription {
    pub file_url: String,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectPrescription {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Attaches a prescription to the caller's own order and queues it for
/// review. Only orders still waiting on a prescription accept one.
pub async fn attach(
    store: &MarketStore,
    user_id: i32,
    order_id: i32,
    input: AttachPrescription,
) -> Result<PrescriptionEntity, AppError> {
    if input.file_url.trim().is_empty() {
        return Err(AppError::Validation("A prescription file is required".into()));
    }
    let mut tables = store.write().await;
    let order = tables
        .orders
        .get(&order_id)
        .filter(|order| order.user_id == user_id)
        .cloned()
        .ok_or(AppError::NotFound)?;
    if order.status != OrderStatus::PendingPrescription {
        return Err(AppError::Validation(
            "Order is not waiting for a prescription".into(),
        ));
    }
    if tables.prescription_by_order.contains_key(&order_id) {
        return Err(AppError::Validation(
            "Order already has a prescription under review".into(),
        ));
    }

    let id = tables.allocate_id();
    let prescription = PrescriptionEntity {
        id,
        order_id,
        file_url: input.file_url,
        upload_date: Utc::now(),
        is_validated: false,
        validated_by: None,
        validation_date: None,
        rejection_reason: None,
    };
    tables.prescriptions.insert(id, prescription.clone());
    tables.prescription_by_order.insert(order_id, id);

    orders::transition_in_place(&mut tables, order_id, OrderStatus::UnderReview)?;
    Ok(prescription)
}

/// Admin validation: marks the document validated, then releases the order.
pub async fn validate(
    store: &MarketStore,
    admin_id: i32,
    prescription_id: i32,
) -> Result<PrescriptionEntity, AppError> {
    let mut tables = store.write().await;
    let prescription = tables
        .prescriptions
        .get(&prescription_id)
        .cloned()
        .ok_or(AppError::NotFound)?;
    if prescription.is_validated {
        return Err(AppError::Validation("Prescription already validated".into()));
    }

    let now = Utc::now();
    let updated = {
        let prescription = tables
            .prescriptions
            .get_mut(&prescription_id)
            .ok_or(AppError::NotFound)?;
        prescription.is_validated = true;
        prescription.validated_by = Some(admin_id);
        prescription.validation_date = Some(now);
        prescription.clone()
    };

    let order = orders::transition_in_place(&mut tables, updated.order_id, OrderStatus::Validated)?;
    tables.push_notification(
        order.user_id,
        NotificationKind::Prescription,
        "Prescription validated",
        format!("Prescription for order {} was approved", order.order_number),
    );
    Ok(updated)
}

/// Admin rejection: the order cannot proceed without a valid prescription,
/// so rejection cancels it (restoring stock). The reason is kept on the
/// prescription record.
pub async fn reject(
    store: &MarketStore,
    admin_id: i32,
    prescription_id: i32,
    input: RejectPrescription,
) -> Result<PrescriptionEntity, AppError> {
    let mut tables = store.write().await;
    let prescription = tables
        .prescriptions
        .get(&prescription_id)
        .cloned()
        .ok_or(AppError::NotFound)?;
    if prescription.is_validated {
        return Err(AppError::Validation(
            "A validated prescription cannot be rejected".into(),
        ));
    }

    let reason = input.reason.unwrap_or_else(|| "Not specified".to_string());
    tracing::info!(
        prescription_id,
        admin_id,
        reason,
        "prescription rejected"
    );
    let updated = {
        let prescription = tables
            .prescriptions
            .get_mut(&prescription_id)
            .ok_or(AppError::NotFound)?;
        prescription.rejection_reason = Some(reason);
        prescription.clone()
    };

    let order = orders::cancel_in_place(&mut tables, updated.order_id)?;
    tables.push_notification(
        order.user_id,
        NotificationKind::Prescription,
        "Prescription rejected",
        format!(
            "Prescription for order {} was rejected and the order cancelled",
            order.order_number
        ),
    );
    Ok(updated)
}

/// Review queue: uploaded documents not yet validated or rejected.
pub async fn pending(store: &MarketStore) -> Vec<PrescriptionEntity> {
    let tables = store.read().await;
    let mut pending: Vec<_> = tables
        .prescriptions
        .values()
        .filter(|p| !p.is_validated && p.rejection_reason.is_none())
        .cloned()
        .collect();
    pending.sort_by_key(|p| p.upload_date);
    pending
}
