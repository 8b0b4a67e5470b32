//! In-memory arena store: entities keyed by integer id with explicit
//! foreign-key fields, plus the secondary indices the services query by.
//!
//! `MarketStore` wraps the tables in an `Arc<RwLock>`; holding the write
//! guard for the duration of a service call is the transaction. Stock
//! read-check-write sequences therefore never interleave between callers.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use uuid::Uuid;

use crate::models::{
    CartEntity, CartItemEntity, CategoryEntity, DeliveryEntity, MedicineEntity,
    NotificationEntity, NotificationKind, OrderEntity, OrderItemEntity, PaymentEntity,
    PharmacyEntity, PharmacyReviewEntity, PrescriptionEntity, Role, SubCategoryEntity, UserEntity,
};

#[derive(Debug, Default)]
pub struct Tables {
    next_id: i32,

    pub users: HashMap<i32, UserEntity>,
    pub tokens: HashMap<String, i32>,
    pub pharmacies: HashMap<i32, PharmacyEntity>,
    pub categories: HashMap<i32, CategoryEntity>,
    pub subcategories: HashMap<i32, SubCategoryEntity>,
    pub medicines: HashMap<i32, MedicineEntity>,
    pub carts: HashMap<i32, CartEntity>,
    pub cart_items: HashMap<i32, CartItemEntity>,
    pub orders: HashMap<i32, OrderEntity>,
    pub order_items: HashMap<i32, OrderItemEntity>,
    pub prescriptions: HashMap<i32, PrescriptionEntity>,
    pub payments: HashMap<i32, PaymentEntity>,
    pub deliveries: HashMap<i32, DeliveryEntity>,
    pub reviews: HashMap<i32, PharmacyReviewEntity>,
    pub notifications: HashMap<i32, NotificationEntity>,

    // Secondary indices. No back-pointers on entities, only these lookups.
    pub pharmacy_by_owner: HashMap<i32, i32>,
    pub cart_by_user: HashMap<i32, i32>,
    pub medicines_by_pharmacy: HashMap<i32, Vec<i32>>,
    pub orders_by_user: HashMap<i32, Vec<i32>>,
    pub orders_by_pharmacy: HashMap<i32, Vec<i32>>,
    pub payment_by_order: HashMap<i32, i32>,
    pub delivery_by_order: HashMap<i32, i32>,
    pub prescription_by_order: HashMap<i32, i32>,
    pub order_numbers: HashSet<String>,
}

impl Tables {
    /// Single id sequence shared by every table.
    pub fn allocate_id(&mut self) -> i32 {
        self.next_id += 1;
        self.next_id
    }

    // --- users & tokens (fixed-interface credential store) ---

    pub fn create_user(
        &mut self,
        first_name: &str,
        last_name: &str,
        email: &str,
        role: Role,
    ) -> UserEntity {
        let id = self.allocate_id();
        let user = UserEntity {
            id,
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            email: email.to_string(),
            role,
            created_at: Utc::now(),
        };
        self.users.insert(id, user.clone());
        user
    }

    pub fn issue_token(&mut self, user_id: i32) -> Option<String> {
        if !self.users.contains_key(&user_id) {
            return None;
        }
        let token = Uuid::new_v4().simple().to_string();
        self.tokens.insert(token.clone(), user_id);
        Some(token)
    }

    pub fn user_by_token(&self, token: &str) -> Option<&UserEntity> {
        self.tokens.get(token).and_then(|id| self.users.get(id))
    }

    // --- catalog ---

    pub fn insert_pharmacy(&mut self, pharmacy: PharmacyEntity) {
        self.pharmacy_by_owner.insert(pharmacy.owner_id, pharmacy.id);
        self.pharmacies.insert(pharmacy.id, pharmacy);
    }

    pub fn insert_medicine(&mut self, medicine: MedicineEntity) {
        self.medicines_by_pharmacy
            .entry(medicine.pharmacy_id)
            .or_default()
            .push(medicine.id);
        self.medicines.insert(medicine.id, medicine);
    }

    /// Hard delete. Order item snapshots keep their denormalized fields and
    /// go SET-NULL on the reference; cart lines for the medicine are dropped.
    pub fn remove_medicine(&mut self, medicine_id: i32) -> Option<MedicineEntity> {
        let medicine = self.medicines.remove(&medicine_id)?;
        if let Some(ids) = self.medicines_by_pharmacy.get_mut(&medicine.pharmacy_id) {
            ids.retain(|id| *id != medicine_id);
        }
        self.cart_items
            .retain(|_, item| item.medicine_id != medicine_id);
        for item in self.order_items.values_mut() {
            if item.medicine_id == Some(medicine_id) {
                item.medicine_id = None;
            }
        }
        Some(medicine)
    }

    // --- carts ---

    pub fn get_or_create_cart(&mut self, user_id: i32) -> CartEntity {
        if let Some(cart_id) = self.cart_by_user.get(&user_id)
            && let Some(cart) = self.carts.get(cart_id)
        {
            return cart.clone();
        }
        let id = self.allocate_id();
        let now = Utc::now();
        let cart = CartEntity {
            id,
            user_id,
            created_at: now,
            updated_at: now,
        };
        self.carts.insert(id, cart.clone());
        self.cart_by_user.insert(user_id, id);
        cart
    }

    pub fn items_of_cart(&self, cart_id: i32) -> Vec<CartItemEntity> {
        let mut items: Vec<_> = self
            .cart_items
            .values()
            .filter(|item| item.cart_id == cart_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.id);
        items
    }

    // --- orders ---

    pub fn insert_order(&mut self, order: OrderEntity) {
        self.orders_by_user
            .entry(order.user_id)
            .or_default()
            .push(order.id);
        self.orders_by_pharmacy
            .entry(order.pharmacy_id)
            .or_default()
            .push(order.id);
        self.order_numbers.insert(order.order_number.clone());
        self.orders.insert(order.id, order);
    }

    pub fn items_of_order(&self, order_id: i32) -> Vec<OrderItemEntity> {
        let mut items: Vec<_> = self
            .order_items
            .values()
            .filter(|item| item.order_id == order_id)
            .cloned()
            .collect();
        items.sort_by_key(|item| item.id);
        items
    }

    /// Unique `ORD-XXXXXXXX` number; the uuid suffix is re-rolled on the
    /// (improbable) collision with an existing order.
    pub fn generate_order_number(&mut self) -> String {
        loop {
            let suffix = Uuid::new_v4().simple().to_string()[..8].to_uppercase();
            let number = format!("ORD-{suffix}");
            if !self.order_numbers.contains(&number) {
                self.order_numbers.insert(number.clone());
                return number;
            }
        }
    }

    // --- notifications (best-effort, never fails the caller) ---

    pub fn push_notification(
        &mut self,
        user_id: i32,
        kind: NotificationKind,
        title: &str,
        content: String,
    ) {
        if !self.users.contains_key(&user_id) {
            // Fire-and-forget: a missing recipient must not fail the
            // transition that triggered the notification.
            tracing::warn!(user_id, title, "dropping notification for unknown user");
            return;
        }
        let id = self.allocate_id();
        self.notifications.insert(
            id,
            NotificationEntity {
                id,
                user_id,
                kind,
                title: title.to_string(),
                content,
                is_read: false,
                send_date: Utc::now(),
            },
        );
    }
}

/// Shared handle on the tables. Cloning is cheap; all clones see one arena.
#[derive(Clone, Default)]
pub struct MarketStore {
    inner: Arc<RwLock<Tables>>,
}

impl MarketStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.inner.read().await
    }

    /// Write guard. One guard scope per mutating service call; the guard is
    /// the transaction boundary.
    pub async fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.inner.write().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cart_is_created_lazily_and_reused() {
        let store = MarketStore::new();
        let mut tables = store.write().await;
        let user = tables.create_user("Ana", "K", "ana@example.com", Role::Client);
        let first = tables.get_or_create_cart(user.id);
        let second = tables.get_or_create_cart(user.id);
        assert_eq!(first.id, second.id);
        assert_eq!(tables.carts.len(), 1);
    }

    #[tokio::test]
    async fn order_numbers_are_unique_and_prefixed() {
        let store = MarketStore::new();
        let mut tables = store.write().await;
        let mut seen = HashSet::new();
        for _ in 0..100 {
            let number = tables.generate_order_number();
            assert!(number.starts_with("ORD-"));
            assert_eq!(number.len(), "ORD-".len() + 8);
            assert!(seen.insert(number));
        }
    }

    #[tokio::test]
    async fn token_round_trip() {
        let store = MarketStore::new();
        let mut tables = store.write().await;
        let user = tables.create_user("Admin", "A", "admin@example.com", Role::Admin);
        let token = tables.issue_token(user.id).unwrap();
        assert_eq!(tables.user_by_token(&token).unwrap().id, user.id);
        assert!(tables.user_by_token("bogus").is_none());
        assert!(tables.issue_token(9999).is_none());
    }
}
