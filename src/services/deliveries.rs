//! Delivery tracker: admin assignment, courier-driven progress and the
//! correlation back onto the order lifecycle.

use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    core::error::AppError,
    models::{DeliveryEntity, DeliveryStatus, NotificationKind, OrderStatus, Role},
    services::orders,
    store::MarketStore,
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct AssignDelivery {
    pub delivery_person_id: i32,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateDeliveryStatus {
    pub delivery_status: DeliveryStatus,
    #[serde(default)]
    pub delivery_notes: Option<String>,
    #[serde(default)]
    pub failure_reason: Option<String>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateLocation {
    pub latitude: f64,
    pub longitude: f64,
}

/// Assigns a courier to a pending delivery. The assignee must hold the
/// delivery role; a tracking number is minted on assignment.
pub async fn assign(
    store: &MarketStore,
    delivery_id: i32,
    input: AssignDelivery,
) -> Result<DeliveryEntity, AppError> {
    let mut tables = store.write().await;
    let assignee = tables
        .users
        .get(&input.delivery_person_id)
        .ok_or_else(|| AppError::Validation("Delivery person not found".into()))?;
    if assignee.role != Role::Delivery {
        return Err(AppError::Validation(
            "Assignee is not a delivery person".into(),
        ));
    }

    let current = tables
        .deliveries
        .get(&delivery_id)
        .ok_or(AppError::NotFound)?
        .delivery_status;
    if !current.can_transition_to(DeliveryStatus::Assigned) {
        return Err(AppError::Validation(format!(
            "Delivery in status {current:?} cannot be assigned"
        )));
    }

    let now = Utc::now();
    let tracking = format!(
        "TRK-{}",
        Uuid::new_v4().simple().to_string()[..10].to_uppercase()
    );
    let delivery = {
        let delivery = tables
            .deliveries
            .get_mut(&delivery_id)
            .ok_or(AppError::NotFound)?;
        delivery.delivery_person_id = Some(input.delivery_person_id);
        delivery.delivery_status = DeliveryStatus::Assigned;
        delivery.tracking_number = Some(tracking);
        delivery.assigned_date = Some(now);
        delivery.updated_at = now;
        delivery.clone()
    };

    tables.push_notification(
        input.delivery_person_id,
        NotificationKind::Delivery,
        "Delivery assigned",
        format!("You have been assigned delivery #{delivery_id}"),
    );
    Ok(delivery)
}

/// Courier-side progress. Pickup and completion timestamps are stamped on
/// the matching transitions, and the owning order is advanced in the same
/// transaction: picked-up puts the order in delivery, delivered closes it.
pub async fn update_status(
    store: &MarketStore,
    courier_id: i32,
    delivery_id: i32,
    input: UpdateDeliveryStatus,
) -> Result<DeliveryEntity, AppError> {
    let mut tables = store.write().await;
    let delivery = tables
        .deliveries
        .get(&delivery_id)
        .filter(|delivery| delivery.delivery_person_id == Some(courier_id))
        .cloned()
        .ok_or(AppError::NotFound)?;
    if !delivery
        .delivery_status
        .can_transition_to(input.delivery_status)
    {
        return Err(AppError::Validation(format!(
            "Delivery cannot move from {:?} to {:?}",
            delivery.delivery_status, input.delivery_status
        )));
    }

    let now = Utc::now();
    let updated = {
        let delivery = tables
            .deliveries
            .get_mut(&delivery_id)
            .ok_or(AppError::NotFound)?;
        delivery.delivery_status = input.delivery_status;
        match input.delivery_status {
            DeliveryStatus::PickedUp => delivery.pickup_date = Some(now),
            DeliveryStatus::Delivered => delivery.delivery_date = Some(now),
            _ => {}
        }
        if let Some(notes) = input.delivery_notes {
            delivery.delivery_notes = Some(notes);
        }
        if matches!(
            input.delivery_status,
            DeliveryStatus::Failed | DeliveryStatus::Returned
        ) {
            delivery.failure_reason = input.failure_reason;
        }
        delivery.updated_at = now;
        delivery.clone()
    };

    // Correlate onto the order. The order transition is validated too; a
    // mismatch (e.g. the pharmacist never marked the order in transit) is
    // logged but does not fail the courier's update.
    let order_next = match updated.delivery_status {
        DeliveryStatus::PickedUp => Some(OrderStatus::InDelivery),
        DeliveryStatus::Delivered => Some(OrderStatus::Delivered),
        _ => None,
    };
    if let Some(next) = order_next {
        match orders::transition_in_place(&mut tables, updated.order_id, next) {
            Ok(order) => tables.push_notification(
                order.user_id,
                NotificationKind::Delivery,
                "Delivery update",
                format!("Order {} is now {next:?}", order.order_number),
            ),
            Err(err) => tracing::warn!(
                order_id = updated.order_id,
                delivery_id,
                %err,
                "delivery status applied but order transition skipped"
            ),
        }
    }
    Ok(updated)
}

/// Live position update, only by the assignee and only while the delivery
/// is actually moving.
pub async fn update_location(
    store: &MarketStore,
    courier_id: i32,
    delivery_id: i32,
    input: UpdateLocation,
) -> Result<DeliveryEntity, AppError> {
    let mut tables = store.write().await;
    let delivery = tables
        .deliveries
        .get_mut(&delivery_id)
        .filter(|delivery| delivery.delivery_person_id == Some(courier_id))
        .ok_or(AppError::NotFound)?;
    if !delivery.delivery_status.is_active() {
        return Err(AppError::Validation(
            "Location can only be updated on an active delivery".into(),
        ));
    }
    delivery.current_latitude = Some(input.latitude);
    delivery.current_longitude = Some(input.longitude);
    delivery.updated_at = Utc::now();
    Ok(delivery.clone())
}

/// The courier's assignments, most recently touched first.
pub async fn my_deliveries(store: &MarketStore, courier_id: i32) -> Vec<DeliveryEntity> {
    let tables = store.read().await;
    let mut deliveries: Vec<_> = tables
        .deliveries
        .values()
        .filter(|delivery| delivery.delivery_person_id == Some(courier_id))
        .cloned()
        .collect();
    deliveries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    deliveries
}

/// Tracking view for the order's owner.
pub async fn order_delivery(
    store: &MarketStore,
    user_id: i32,
    order_id: i32,
) -> Result<DeliveryEntity, AppError> {
    let tables = store.read().await;
    tables
        .orders
        .get(&order_id)
        .filter(|order| order.user_id == user_id)
        .ok_or(AppError::NotFound)?;
    tables
        .delivery_by_order
        .get(&order_id)
        .and_then(|id| tables.deliveries.get(id))
        .cloned()
        .ok_or(AppError::NotFound)
}
