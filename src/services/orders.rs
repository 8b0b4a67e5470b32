//! Order engine: converts a cart into immutable per-pharmacy order
//! snapshots, drives the order lifecycle and keeps stock conserved.

use std::collections::BTreeMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    core::{auth::AuthUser, config::Config, error::AppError},
    models::{
        CartItemEntity, DeliveryEntity, DeliveryStatus, NotificationKind, OrderEntity,
        OrderItemEntity, OrderStatus, PaymentEntity, PaymentMethod, PaymentStatus,
        PrescriptionEntity, Role,
    },
    store::{MarketStore, Tables},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct CheckoutRequest {
    #[serde(default)]
    pub delivery_address: Option<String>,
    #[serde(default)]
    pub delivery_phone: Option<String>,
    #[serde(default)]
    pub customer_notes: Option<String>,
    /// When present, a pending payment is created alongside each order.
    #[serde(default)]
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct OrderView {
    pub order: OrderEntity,
    pub order_items: Vec<OrderItemEntity>,
    pub payment: Option<PaymentEntity>,
    pub delivery: Option<DeliveryEntity>,
    pub prescription: Option<PrescriptionEntity>,
}

pub(crate) fn order_view(tables: &Tables, order: OrderEntity) -> OrderView {
    let order_items = tables.items_of_order(order.id);
    let payment = tables
        .payment_by_order
        .get(&order.id)
        .and_then(|id| tables.payments.get(id))
        .cloned();
    let delivery = tables
        .delivery_by_order
        .get(&order.id)
        .and_then(|id| tables.deliveries.get(id))
        .cloned();
    let prescription = tables
        .prescription_by_order
        .get(&order.id)
        .and_then(|id| tables.prescriptions.get(id))
        .cloned();
    OrderView {
        order,
        order_items,
        payment,
        delivery,
        prescription,
    }
}

/// Converts the caller's cart into orders, one per pharmacy represented in
/// it. The whole conversion happens inside one store transaction:
///
/// 1. every line is re-validated against live medicine state (visibility,
///    minimum quantity, stock) — any violation aborts everything;
/// 2. stock is decremented, item snapshots are frozen, order numbers are
///    generated, deliveries (and optionally payments) are created;
/// 3. the consumed cart lines are cleared.
pub async fn checkout(
    store: &MarketStore,
    config: &Config,
    user_id: i32,
    request: CheckoutRequest,
) -> Result<Vec<OrderView>, AppError> {
    let mut tables = store.write().await;

    let cart_id = tables
        .cart_by_user
        .get(&user_id)
        .copied()
        .ok_or_else(|| AppError::Validation("Cart is empty".into()))?;
    let lines = tables.items_of_cart(cart_id);
    if lines.is_empty() {
        return Err(AppError::Validation("Cart is empty".into()));
    }

    // Phase 1: validate every line before touching anything, so a failure on
    // the last line cannot leave a partial decrement behind.
    for line in &lines {
        let medicine = tables
            .medicines
            .get(&line.medicine_id)
            .ok_or_else(|| AppError::Validation("A cart item is no longer available".into()))?;
        if !medicine.is_active || !medicine.is_approved {
            return Err(AppError::Validation(format!(
                "\"{}\" is no longer available for purchase",
                medicine.name
            )));
        }
        if line.quantity < medicine.min_order_quantity {
            return Err(AppError::Validation(format!(
                "Minimum order quantity for \"{}\" is {}",
                medicine.name, medicine.min_order_quantity
            )));
        }
        if line.quantity > medicine.stock_quantity {
            return Err(AppError::StockConflict {
                medicine_id: medicine.id,
                requested: line.quantity,
                available: medicine.stock_quantity,
            });
        }
    }

    // Orders are pharmacy-scoped: group the cart by owning pharmacy and
    // create one order per group. BTreeMap keeps the output order stable.
    let mut groups: BTreeMap<i32, Vec<CartItemEntity>> = BTreeMap::new();
    for line in lines {
        let pharmacy_id = tables.medicines[&line.medicine_id].pharmacy_id;
        groups.entry(pharmacy_id).or_default().push(line);
    }

    let now = Utc::now();
    let mut created = Vec::with_capacity(groups.len());

    for (pharmacy_id, group) in groups {
        let requires_prescription = group.iter().any(|line| {
            tables.medicines[&line.medicine_id].requires_prescription
        });
        let total_amount: f64 = group.iter().map(|line| line.subtotal()).sum();
        let delivery_fee = config.delivery_fee;
        let discount_amount = 0.0;
        let final_amount = total_amount + delivery_fee - discount_amount;

        let order_id = tables.allocate_id();
        let order_number = tables.generate_order_number();
        let order = OrderEntity {
            id: order_id,
            user_id,
            pharmacy_id,
            order_number,
            status: if requires_prescription {
                OrderStatus::PendingPrescription
            } else {
                OrderStatus::Pending
            },
            total_amount,
            delivery_fee,
            discount_amount,
            final_amount,
            delivery_address: request.delivery_address.clone(),
            delivery_phone: request.delivery_phone.clone(),
            customer_notes: request.customer_notes.clone(),
            pharmacy_notes: None,
            order_date: now,
            updated_at: now,
            completed_at: None,
        };
        tables.insert_order(order.clone());

        for line in &group {
            // Safe to mutate now: phase 1 vetted every line.
            let medicine = tables
                .medicines
                .get_mut(&line.medicine_id)
                .ok_or_else(|| anyhow::anyhow!("validated medicine vanished mid-transaction"))?;
            medicine.stock_quantity -= line.quantity;
            medicine.sales_count += line.quantity;
            let medicine_name = medicine.name.clone();

            let item_id = tables.allocate_id();
            tables.order_items.insert(
                item_id,
                OrderItemEntity {
                    id: item_id,
                    order_id,
                    medicine_id: Some(line.medicine_id),
                    medicine_name,
                    quantity: line.quantity,
                    unit_price: line.selected_price,
                    subtotal: line.subtotal(),
                    is_package: line.is_package,
                    package_details: line.package_details.clone(),
                },
            );
        }

        let delivery_id = tables.allocate_id();
        tables.deliveries.insert(
            delivery_id,
            DeliveryEntity {
                id: delivery_id,
                order_id,
                delivery_person_id: None,
                delivery_status: DeliveryStatus::Pending,
                tracking_number: None,
                assigned_date: None,
                pickup_date: None,
                delivery_date: None,
                current_latitude: None,
                current_longitude: None,
                delivery_notes: None,
                failure_reason: None,
                updated_at: now,
            },
        );
        tables.delivery_by_order.insert(order_id, delivery_id);

        if let Some(method) = request.payment_method {
            let payment_id = tables.allocate_id();
            tables.payments.insert(
                payment_id,
                PaymentEntity {
                    id: payment_id,
                    order_id,
                    payment_method: method,
                    payment_status: PaymentStatus::Pending,
                    amount: final_amount,
                    transaction_id: None,
                    payment_date: now,
                    updated_at: now,
                },
            );
            tables.payment_by_order.insert(order_id, payment_id);
        }

        tables.push_notification(
            user_id,
            NotificationKind::Order,
            "Order placed",
            format!("Your order {} has been placed", order.order_number),
        );
        created.push(order);
    }

    // Clear the consumed cart lines.
    tables.cart_items.retain(|_, item| item.cart_id != cart_id);
    if let Some(cart) = tables.carts.get_mut(&cart_id) {
        cart.updated_at = now;
    }

    Ok(created
        .into_iter()
        .map(|order| order_view(&tables, order))
        .collect())
}

/// Applies a lifecycle transition, enforcing the state machine and the
/// prescription gate. `completed_at` is stamped exactly once, on entering
/// `Delivered`.
pub(crate) fn transition_in_place(
    tables: &mut Tables,
    order_id: i32,
    next: OrderStatus,
) -> Result<OrderEntity, AppError> {
    let current = tables
        .orders
        .get(&order_id)
        .ok_or(AppError::NotFound)?
        .status;
    if !current.can_transition_to(next) {
        return Err(AppError::Validation(format!(
            "Order cannot move from {current:?} to {next:?}"
        )));
    }
    if next == OrderStatus::UnderReview
        && !tables.prescription_by_order.contains_key(&order_id)
    {
        return Err(AppError::Validation(
            "Order has no prescription to review".into(),
        ));
    }
    if next == OrderStatus::Validated {
        let validated = tables
            .prescription_by_order
            .get(&order_id)
            .and_then(|id| tables.prescriptions.get(id))
            .is_some_and(|p| p.is_validated);
        if !validated {
            return Err(AppError::Validation(
                "Order requires a validated prescription".into(),
            ));
        }
    }

    let order = tables
        .orders
        .get_mut(&order_id)
        .ok_or(AppError::NotFound)?;
    order.status = next;
    order.updated_at = Utc::now();
    if next == OrderStatus::Delivered && order.completed_at.is_none() {
        order.completed_at = Some(order.updated_at);
    }
    Ok(order.clone())
}

/// Cancels an order and undoes its side effects: every snapshot quantity is
/// returned to the referenced medicine's stock (the exact inverse of the
/// checkout decrement) and a still-open payment is marked failed.
pub(crate) fn cancel_in_place(
    tables: &mut Tables,
    order_id: i32,
) -> Result<OrderEntity, AppError> {
    let order = tables.orders.get(&order_id).ok_or(AppError::NotFound)?;
    if order.status.is_terminal() {
        return Err(AppError::Validation(format!(
            "Order in status {:?} cannot be cancelled",
            order.status
        )));
    }

    for item in tables.items_of_order(order_id) {
        if let Some(medicine_id) = item.medicine_id
            && let Some(medicine) = tables.medicines.get_mut(&medicine_id)
        {
            medicine.stock_quantity += item.quantity;
            medicine.sales_count = medicine.sales_count.saturating_sub(item.quantity);
        }
    }

    if let Some(payment) = tables
        .payment_by_order
        .get(&order_id)
        .copied()
        .and_then(|id| tables.payments.get_mut(&id))
        && matches!(
            payment.payment_status,
            PaymentStatus::Pending | PaymentStatus::Processing
        )
    {
        payment.payment_status = PaymentStatus::Failed;
        payment.updated_at = Utc::now();
    }

    let order = tables
        .orders
        .get_mut(&order_id)
        .ok_or(AppError::NotFound)?;
    order.status = OrderStatus::Cancelled;
    order.updated_at = Utc::now();
    let order = order.clone();

    tables.push_notification(
        order.user_id,
        NotificationKind::Order,
        "Order cancelled",
        format!("Order {} has been cancelled", order.order_number),
    );
    Ok(order)
}

fn actor_may_manage(tables: &Tables, actor: AuthUser, order: &OrderEntity) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Pharmacist => tables
            .pharmacy_by_owner
            .get(&actor.id)
            .is_some_and(|pharmacy_id| *pharmacy_id == order.pharmacy_id),
        _ => order.user_id == actor.id,
    }
}

/// Cancellation entry point for clients (own orders), the owning pharmacist
/// and admins.
pub async fn cancel_order(
    store: &MarketStore,
    actor: AuthUser,
    order_id: i32,
) -> Result<OrderEntity, AppError> {
    let mut tables = store.write().await;
    let order = tables
        .orders
        .get(&order_id)
        .cloned()
        .ok_or(AppError::NotFound)?;
    if !actor_may_manage(&tables, actor, &order) {
        return Err(AppError::NotFound);
    }
    cancel_in_place(&mut tables, order_id)
}

/// Pharmacist-driven progress on an own-pharmacy order (preparing, ready
/// for pickup, in delivery). Cancellation goes through `cancel_order` so the
/// stock restore always runs.
pub async fn advance_status(
    store: &MarketStore,
    actor: AuthUser,
    order_id: i32,
    next: OrderStatus,
) -> Result<OrderEntity, AppError> {
    if next == OrderStatus::Cancelled {
        return cancel_order(store, actor, order_id).await;
    }
    let mut tables = store.write().await;
    let order = tables
        .orders
        .get(&order_id)
        .cloned()
        .ok_or(AppError::NotFound)?;
    if !actor_may_manage(&tables, actor, &order) {
        return Err(AppError::NotFound);
    }
    let updated = transition_in_place(&mut tables, order_id, next)?;
    tables.push_notification(
        updated.user_id,
        NotificationKind::Order,
        "Order update",
        format!("Order {} is now {next:?}", updated.order_number),
    );
    Ok(updated)
}

/// One order, scoped to its owner (wrong owner reads as not-found).
pub async fn get_order(
    store: &MarketStore,
    user_id: i32,
    order_id: i32,
) -> Result<OrderView, AppError> {
    let tables = store.read().await;
    let order = tables
        .orders
        .get(&order_id)
        .filter(|order| order.user_id == user_id)
        .cloned()
        .ok_or(AppError::NotFound)?;
    Ok(order_view(&tables, order))
}

/// All of the caller's orders, most recently updated first.
pub async fn my_orders(store: &MarketStore, user_id: i32) -> Vec<OrderView> {
    let tables = store.read().await;
    let mut orders: Vec<OrderEntity> = tables
        .orders_by_user
        .get(&user_id)
        .into_iter()
        .flatten()
        .filter_map(|id| tables.orders.get(id))
        .cloned()
        .collect();
    orders.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    orders
        .into_iter()
        .map(|order| order_view(&tables, order))
        .collect()
}

/// Incoming orders for the caller's pharmacy.
pub async fn pharmacy_orders(
    store: &MarketStore,
    owner_id: i32,
) -> Result<Vec<OrderView>, AppError> {
    let tables = store.read().await;
    let pharmacy_id = tables
        .pharmacy_by_owner
        .get(&owner_id)
        .copied()
        .ok_or(AppError::NotFound)?;
    let mut orders: Vec<OrderEntity> = tables
        .orders_by_pharmacy
        .get(&pharmacy_id)
        .into_iter()
        .flatten()
        .filter_map(|id| tables.orders.get(id))
        .cloned()
        .collect();
    orders.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    Ok(orders
        .into_iter()
        .map(|order| order_view(&tables, order))
        .collect())
}
