//! Admin moderation: pharmacy verification, medicine approval and the
//! dashboard counters.

use std::collections::HashMap;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    core::error::AppError,
    models::{
        MedicineEntity, NotificationKind, OrderStatus, PharmacyEntity, Role,
    },
    services::payments,
    store::MarketStore,
};

/// Listing filter shared by the moderation queues.
#[derive(Debug, Clone, Copy, Default, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ModerationFilter {
    #[default]
    All,
    /// Accepts `verified` too, for the pharmacy listing.
    #[serde(alias = "verified")]
    Approved,
    Pending,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ModerationQuery {
    #[serde(default)]
    pub filter: ModerationFilter,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct RejectRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct DashboardStats {
    pub total_users: usize,
    pub total_clients: usize,
    pub total_pharmacists: usize,
    pub total_pharmacies: usize,
    pub verified_pharmacies: usize,
    pub total_products: usize,
    pub pending_products: usize,
    pub total_orders: usize,
    pub orders_by_status: HashMap<String, usize>,
    /// Sum of settled payment amounts (delivery fees included).
    pub total_revenue: f64,
}

pub async fn list_pharmacies(
    store: &MarketStore,
    query: ModerationQuery,
) -> Vec<PharmacyEntity> {
    let tables = store.read().await;
    let mut pharmacies: Vec<_> = tables
        .pharmacies
        .values()
        .filter(|pharmacy| match query.filter {
            ModerationFilter::All => true,
            ModerationFilter::Approved => pharmacy.is_verified,
            ModerationFilter::Pending => !pharmacy.is_verified,
        })
        .cloned()
        .collect();
    pharmacies.sort_by_key(|pharmacy| pharmacy.id);
    pharmacies
}

pub async fn list_medicines(
    store: &MarketStore,
    query: ModerationQuery,
) -> Vec<MedicineEntity> {
    let tables = store.read().await;
    let mut medicines: Vec<_> = tables
        .medicines
        .values()
        .filter(|medicine| match query.filter {
            ModerationFilter::All => true,
            ModerationFilter::Approved => medicine.is_approved,
            ModerationFilter::Pending => !medicine.is_approved,
        })
        .cloned()
        .collect();
    medicines.sort_by_key(|medicine| medicine.id);
    medicines
}

/// Marks a pharmacy verified. Idempotent; verifying twice is a no-op.
pub async fn verify_pharmacy(
    store: &MarketStore,
    pharmacy_id: i32,
) -> Result<PharmacyEntity, AppError> {
    let mut tables = store.write().await;
    let pharmacy = {
        let pharmacy = tables
            .pharmacies
            .get_mut(&pharmacy_id)
            .ok_or(AppError::NotFound)?;
        pharmacy.is_verified = true;
        pharmacy.updated_at = Utc::now();
        pharmacy.clone()
    };
    tables.push_notification(
        pharmacy.owner_id,
        NotificationKind::System,
        "Pharmacy verified",
        format!("Your pharmacy \"{}\" has been verified", pharmacy.name),
    );
    Ok(pharmacy)
}

/// Withdraws verification. The reason is logged, not persisted.
pub async fn reject_pharmacy(
    store: &MarketStore,
    pharmacy_id: i32,
    input: RejectRequest,
) -> Result<PharmacyEntity, AppError> {
    let mut tables = store.write().await;
    let pharmacy = {
        let pharmacy = tables
            .pharmacies
            .get_mut(&pharmacy_id)
            .ok_or(AppError::NotFound)?;
        pharmacy.is_verified = false;
        pharmacy.updated_at = Utc::now();
        pharmacy.clone()
    };
    tracing::info!(
        pharmacy_id,
        reason = input.reason.as_deref().unwrap_or("not specified"),
        "pharmacy verification rejected"
    );
    tables.push_notification(
        pharmacy.owner_id,
        NotificationKind::System,
        "Pharmacy verification rejected",
        format!("Verification for \"{}\" was rejected", pharmacy.name),
    );
    Ok(pharmacy)
}

/// Releases a medicine onto the platform. Idempotent.
pub async fn approve_medicine(
    store: &MarketStore,
    medicine_id: i32,
) -> Result<MedicineEntity, AppError> {
    let mut tables = store.write().await;
    let medicine = {
        let medicine = tables
            .medicines
            .get_mut(&medicine_id)
            .ok_or(AppError::NotFound)?;
        medicine.is_approved = true;
        medicine.updated_at = Utc::now();
        medicine.clone()
    };
    if let Some(owner_id) = tables
        .pharmacies
        .get(&medicine.pharmacy_id)
        .map(|pharmacy| pharmacy.owner_id)
    {
        tables.push_notification(
            owner_id,
            NotificationKind::System,
            "Product approved",
            format!("\"{}\" is now listed on the platform", medicine.name),
        );
    }
    Ok(medicine)
}

/// Pulls a medicine off the platform. Existing order snapshots are
/// untouched; only future visibility changes.
pub async fn reject_medicine(
    store: &MarketStore,
    medicine_id: i32,
    input: RejectRequest,
) -> Result<MedicineEntity, AppError> {
    let mut tables = store.write().await;
    let medicine = {
        let medicine = tables
            .medicines
            .get_mut(&medicine_id)
            .ok_or(AppError::NotFound)?;
        medicine.is_approved = false;
        medicine.updated_at = Utc::now();
        medicine.clone()
    };
    tracing::info!(
        medicine_id,
        reason = input.reason.as_deref().unwrap_or("not specified"),
        "medicine approval rejected"
    );
    if let Some(owner_id) = tables
        .pharmacies
        .get(&medicine.pharmacy_id)
        .map(|pharmacy| pharmacy.owner_id)
    {
        tables.push_notification(
            owner_id,
            NotificationKind::System,
            "Product rejected",
            format!("\"{}\" was removed from the platform listing", medicine.name),
        );
    }
    Ok(medicine)
}

pub async fn dashboard(store: &MarketStore) -> DashboardStats {
    let tables = store.read().await;
    let mut orders_by_status: HashMap<String, usize> = HashMap::new();
    for order in tables.orders.values() {
        let key = match serde_json::to_value(order.status) {
            Ok(serde_json::Value::String(s)) => s,
            _ => format!("{:?}", order.status),
        };
        *orders_by_status.entry(key).or_default() += 1;
    }
    DashboardStats {
        total_users: tables.users.len(),
        total_clients: tables
            .users
            .values()
            .filter(|user| user.role == Role::Client)
            .count(),
        total_pharmacists: tables
            .users
            .values()
            .filter(|user| user.role == Role::Pharmacist)
            .count(),
        total_pharmacies: tables.pharmacies.len(),
        verified_pharmacies: tables
            .pharmacies
            .values()
            .filter(|pharmacy| pharmacy.is_verified)
            .count(),
        total_products: tables.medicines.len(),
        pending_products: tables
            .medicines
            .values()
            .filter(|medicine| !medicine.is_approved)
            .count(),
        total_orders: tables.orders.len(),
        orders_by_status,
        total_revenue: payments::settled_revenue(&tables),
    }
}

/// Admin-wide order listing, optionally narrowed to one status.
pub async fn all_orders(
    store: &MarketStore,
    status: Option<OrderStatus>,
) -> Vec<crate::services::orders::OrderView> {
    let tables = store.read().await;
    let mut orders: Vec<_> = tables
        .orders
        .values()
        .filter(|order| status.is_none_or(|s| order.status == s))
        .cloned()
        .collect();
    orders.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
    orders
        .into_iter()
        .map(|order| crate::services::orders::order_view(&tables, order))
        .collect()
}
