//! Per-user notification feed.

use crate::{
    core::error::AppError,
    models::NotificationEntity,
    store::MarketStore,
};

/// The caller's notifications, newest first.
pub async fn list(store: &MarketStore, user_id: i32) -> Vec<NotificationEntity> {
    let tables = store.read().await;
    let mut notifications: Vec<_> = tables
        .notifications
        .values()
        .filter(|notification| notification.user_id == user_id)
        .cloned()
        .collect();
    notifications.sort_by(|a, b| b.send_date.cmp(&a.send_date));
    notifications
}

/// Marks one of the caller's notifications read. Idempotent.
pub async fn mark_read(
    store: &MarketStore,
    user_id: i32,
    notification_id: i32,
) -> Result<NotificationEntity, AppError> {
    let mut tables = store.write().await;
    let notification = tables
        .notifications
        .get_mut(&notification_id)
        .filter(|notification| notification.user_id == user_id)
        .ok_or(AppError::NotFound)?;
    notification.is_read = true;
    Ok(notification.clone())
}
