//! Payment correlator: at most one payment per order, status transitions
//! guarded by the payment state machine.

use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    core::{auth::AuthUser, error::AppError},
    models::{NotificationKind, PaymentEntity, PaymentMethod, PaymentStatus, Role},
    store::{MarketStore, Tables},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreatePayment {
    pub payment_method: PaymentMethod,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdatePaymentStatus {
    pub payment_status: PaymentStatus,
    /// External reference. When omitted on a successful settlement, one is
    /// generated.
    #[serde(default)]
    pub transaction_id: Option<String>,
}

/// Creates the pending payment for an order the caller owns. An order
/// carries at most one payment; the amount is always the order's
/// `final_amount`, never client-supplied.
pub async fn create_payment(
    store: &MarketStore,
    user_id: i32,
    order_id: i32,
    input: CreatePayment,
) -> Result<PaymentEntity, AppError> {
    let mut tables = store.write().await;
    let order = tables
        .orders
        .get(&order_id)
        .filter(|order| order.user_id == user_id)
        .cloned()
        .ok_or(AppError::NotFound)?;
    if order.status.is_terminal() {
        return Err(AppError::Validation(
            "Cannot create a payment for a closed order".into(),
        ));
    }
    if tables.payment_by_order.contains_key(&order_id) {
        return Err(AppError::Validation(
            "Order already has a payment".into(),
        ));
    }

    let now = Utc::now();
    let id = tables.allocate_id();
    let payment = PaymentEntity {
        id,
        order_id,
        payment_method: input.payment_method,
        payment_status: PaymentStatus::Pending,
        amount: order.final_amount,
        transaction_id: None,
        payment_date: now,
        updated_at: now,
    };
    tables.payments.insert(id, payment.clone());
    tables.payment_by_order.insert(order_id, id);
    Ok(payment)
}

/// Moves a payment through its state machine. The order's owner may drive
/// the usual pending/processing/success/failed flow; refunds are
/// admin-only.
pub async fn update_status(
    store: &MarketStore,
    actor: AuthUser,
    payment_id: i32,
    input: UpdatePaymentStatus,
) -> Result<PaymentEntity, AppError> {
    let mut tables = store.write().await;
    let payment = tables
        .payments
        .get(&payment_id)
        .cloned()
        .ok_or(AppError::NotFound)?;
    let order = tables
        .orders
        .get(&payment.order_id)
        .cloned()
        .ok_or(AppError::NotFound)?;
    if actor.role != Role::Admin && order.user_id != actor.id {
        return Err(AppError::NotFound);
    }
    if input.payment_status == PaymentStatus::Refunded && actor.role != Role::Admin {
        return Err(AppError::Forbidden("Refunds require an administrator".into()));
    }
    if !payment
        .payment_status
        .can_transition_to(input.payment_status)
    {
        return Err(AppError::Validation(format!(
            "Payment cannot move from {:?} to {:?}",
            payment.payment_status, input.payment_status
        )));
    }

    let now = Utc::now();
    let updated = {
        let payment = tables
            .payments
            .get_mut(&payment_id)
            .ok_or(AppError::NotFound)?;
        payment.payment_status = input.payment_status;
        if let Some(reference) = input.transaction_id {
            payment.transaction_id = Some(reference);
        } else if input.payment_status == PaymentStatus::Success
            && payment.transaction_id.is_none()
        {
            payment.transaction_id = Some(Uuid::new_v4().simple().to_string());
        }
        payment.updated_at = now;
        payment.clone()
    };

    let (title, body) = match updated.payment_status {
        PaymentStatus::Success => (
            "Payment confirmed",
            format!("Payment for order {} was received", order.order_number),
        ),
        PaymentStatus::Failed => (
            "Payment failed",
            format!("Payment for order {} failed", order.order_number),
        ),
        PaymentStatus::Refunded => (
            "Payment refunded",
            format!("Payment for order {} was refunded", order.order_number),
        ),
        _ => (
            "Payment update",
            format!(
                "Payment for order {} is now {:?}",
                order.order_number, updated.payment_status
            ),
        ),
    };
    tables.push_notification(order.user_id, NotificationKind::Payment, title, body);
    Ok(updated)
}

/// Payment attached to an order the caller owns.
pub async fn order_payment(
    store: &MarketStore,
    user_id: i32,
    order_id: i32,
) -> Result<PaymentEntity, AppError> {
    let tables = store.read().await;
    tables
        .orders
        .get(&order_id)
        .filter(|order| order.user_id == user_id)
        .ok_or(AppError::NotFound)?;
    tables
        .payment_by_order
        .get(&order_id)
        .and_then(|id| tables.payments.get(id))
        .cloned()
        .ok_or(AppError::NotFound)
}

/// Settled revenue only. Pending, processing, failed and refunded payments
/// never count.
pub(crate) fn settled_revenue(tables: &Tables) -> f64 {
    tables
        .payments
        .values()
        .filter(|payment| payment.payment_status == PaymentStatus::Success)
        .map(|payment| payment.amount)
        .sum()
}
