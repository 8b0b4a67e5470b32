//! Cart engine: one lazily-created cart per user, per-line price snapshots,
//! stock and minimum-order-quantity checks on every mutation.
//!
//! Stock checks here are advisory; checkout re-validates everything against
//! live stock inside its own transaction.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::{
    core::{config::Config, error::AppError},
    models::{CartEntity, CartItemEntity, MedicineEntity},
    store::{MarketStore, Tables},
};

#[derive(Debug, Serialize, ToSchema)]
pub struct CartView {
    pub cart: CartEntity,
    pub cart_items: Vec<CartItemEntity>,
    pub total_price: f64,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct CartSummary {
    /// Sum of line quantities.
    pub item_count: u32,
    /// Sum over lines of quantity x snapshot price (not live catalog price).
    pub total_amount: f64,
    pub pharmacy_ids: Vec<i32>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct AddToCart {
    pub medicine_id: i32,
    pub quantity: u32,
    #[serde(default)]
    pub selected_price: Option<f64>,
    #[serde(default)]
    pub is_package: Option<bool>,
    #[serde(default)]
    pub package_details: Option<Value>,
}

fn cart_view(tables: &Tables, cart: CartEntity) -> CartView {
    let cart_items = tables.items_of_cart(cart.id);
    let total_price = cart_items.iter().map(|item| item.subtotal()).sum();
    CartView {
        cart,
        cart_items,
        total_price,
    }
}

fn check_quantity(medicine: &MedicineEntity, quantity: u32) -> Result<(), AppError> {
    if quantity == 0 {
        return Err(AppError::Validation(
            "Quantity must be greater than zero".into(),
        ));
    }
    if quantity < medicine.min_order_quantity {
        return Err(AppError::Validation(format!(
            "Minimum order quantity for \"{}\" is {}",
            medicine.name, medicine.min_order_quantity
        )));
    }
    if quantity > medicine.stock_quantity {
        return Err(AppError::StockConflict {
            medicine_id: medicine.id,
            requested: quantity,
            available: medicine.stock_quantity,
        });
    }
    Ok(())
}

/// Fetches (creating if needed) the caller's cart.
pub async fn get_cart(store: &MarketStore, user_id: i32) -> CartView {
    let mut tables = store.write().await;
    let cart = tables.get_or_create_cart(user_id);
    cart_view(&tables, cart)
}

/// Adds a line, or merges into the existing line for the same medicine:
/// quantities add up and are re-validated as a whole; the price snapshot and
/// package fields take the latest call's values.
pub async fn add_item(
    store: &MarketStore,
    config: &Config,
    user_id: i32,
    input: AddToCart,
) -> Result<(CartView, CartItemEntity), AppError> {
    let mut tables = store.write().await;

    let medicine = tables
        .medicines
        .get(&input.medicine_id)
        .ok_or(AppError::NotFound)?
        .clone();
    if !medicine.is_active || !medicine.is_approved {
        return Err(AppError::Validation(format!(
            "\"{}\" is not available for purchase",
            medicine.name
        )));
    }

    let cart = tables.get_or_create_cart(user_id);
    let now = Utc::now();

    let existing_id = tables
        .cart_items
        .values()
        .find(|item| item.cart_id == cart.id && item.medicine_id == medicine.id)
        .map(|item| item.id);

    let line = match existing_id {
        Some(item_id) => {
            let merged = tables.cart_items[&item_id]
                .quantity
                .checked_add(input.quantity)
                .ok_or(AppError::StockConflict {
                    medicine_id: medicine.id,
                    requested: u32::MAX,
                    available: medicine.stock_quantity,
                })?;
            check_quantity(&medicine, merged)?;
            let item = tables
                .cart_items
                .get_mut(&item_id)
                .ok_or(AppError::NotFound)?;
            item.quantity = merged;
            // last write wins on price/package metadata
            if let Some(price) = input.selected_price {
                item.selected_price = price;
            }
            if let Some(is_package) = input.is_package {
                item.is_package = is_package;
            }
            if let Some(details) = input.package_details {
                item.package_details = details;
            }
            item.updated_at = now;
            item.clone()
        }
        None => {
            if tables.items_of_cart(cart.id).len() >= config.max_cart_size {
                return Err(AppError::Validation(format!(
                    "Cart cannot hold more than {} items",
                    config.max_cart_size
                )));
            }
            check_quantity(&medicine, input.quantity)?;
            let id = tables.allocate_id();
            let item = CartItemEntity {
                id,
                cart_id: cart.id,
                medicine_id: medicine.id,
                quantity: input.quantity,
                selected_price: input.selected_price.unwrap_or(medicine.price),
                is_package: input.is_package.unwrap_or(false),
                package_details: input
                    .package_details
                    .unwrap_or_else(|| Value::Object(Default::default())),
                created_at: now,
                updated_at: now,
            };
            tables.cart_items.insert(id, item.clone());
            item
        }
    };

    if let Some(cart) = tables.carts.get_mut(&cart.id) {
        cart.updated_at = now;
    }
    let cart = tables.carts[&cart.id].clone();
    Ok((cart_view(&tables, cart), line))
}

/// Sets a line's quantity, re-validating against the current catalog state.
pub async fn update_item(
    store: &MarketStore,
    user_id: i32,
    item_id: i32,
    quantity: u32,
) -> Result<CartView, AppError> {
    let mut tables = store.write().await;
    let cart_id = tables
        .cart_by_user
        .get(&user_id)
        .copied()
        .ok_or(AppError::NotFound)?;
    let item = tables
        .cart_items
        .get(&item_id)
        .filter(|item| item.cart_id == cart_id)
        .cloned()
        .ok_or(AppError::NotFound)?;
    let medicine = tables
        .medicines
        .get(&item.medicine_id)
        .cloned()
        .ok_or(AppError::NotFound)?;
    check_quantity(&medicine, quantity)?;

    let now = Utc::now();
    if let Some(item) = tables.cart_items.get_mut(&item_id) {
        item.quantity = quantity;
        item.updated_at = now;
    }
    if let Some(cart) = tables.carts.get_mut(&cart_id) {
        cart.updated_at = now;
    }
    let cart = tables.carts[&cart_id].clone();
    Ok(cart_view(&tables, cart))
}

/// Removes a line. Idempotent: a missing cart or line is treated as
/// already-removed.
pub async fn remove_item(store: &MarketStore, user_id: i32, item_id: i32) -> CartView {
    let mut tables = store.write().await;
    let cart = tables.get_or_create_cart(user_id);
    let owned = tables
        .cart_items
        .get(&item_id)
        .is_some_and(|item| item.cart_id == cart.id);
    if owned {
        tables.cart_items.remove(&item_id);
        if let Some(cart) = tables.carts.get_mut(&cart.id) {
            cart.updated_at = Utc::now();
        }
    }
    let cart = tables.carts[&cart.id].clone();
    cart_view(&tables, cart)
}

/// Empties the cart. Idempotent.
pub async fn clear(store: &MarketStore, user_id: i32) -> CartView {
    let mut tables = store.write().await;
    let cart = tables.get_or_create_cart(user_id);
    tables.cart_items.retain(|_, item| item.cart_id != cart.id);
    if let Some(cart) = tables.carts.get_mut(&cart.id) {
        cart.updated_at = Utc::now();
    }
    let cart = tables.carts[&cart.id].clone();
    cart_view(&tables, cart)
}

/// Aggregate view over the snapshot prices.
pub async fn summary(store: &MarketStore, user_id: i32) -> CartSummary {
    let tables = store.read().await;
    let Some(cart_id) = tables.cart_by_user.get(&user_id).copied() else {
        return CartSummary {
            item_count: 0,
            total_amount: 0.0,
            pharmacy_ids: vec![],
        };
    };
    let items = tables.items_of_cart(cart_id);
    let item_count = items.iter().map(|item| item.quantity).sum();
    let total_amount = items.iter().map(|item| item.subtotal()).sum();
    let mut pharmacy_ids: Vec<i32> = items
        .iter()
        .filter_map(|item| tables.medicines.get(&item.medicine_id))
        .map(|m| m.pharmacy_id)
        .collect();
    pharmacy_ids.sort_unstable();
    pharmacy_ids.dedup();
    CartSummary {
        item_count,
        total_amount,
        pharmacy_ids,
    }
}
