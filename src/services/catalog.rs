//! Catalog store: categories, pharmacies, medicines and the buyer-facing
//! visibility rules.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use crate::{
    core::error::AppError,
    models::{CategoryEntity, MedicineEntity, PharmacyEntity, SubCategoryEntity},
    store::MarketStore,
};

/// Sort fields allow-listed for the public listing. Anything else silently
/// falls back to `CreatedAt`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortBy {
    CreatedAt,
    Price,
    Name,
}

impl SortBy {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("price") => SortBy::Price,
            Some("name") => SortBy::Name,
            _ => SortBy::CreatedAt,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn parse(raw: Option<&str>) -> Self {
        match raw {
            Some("asc") => SortOrder::Asc,
            _ => SortOrder::Desc,
        }
    }
}

/// Explicit filter/sort configuration for the public product listing.
#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct ProductQuery {
    #[serde(default)]
    pub bestseller: Option<bool>,
    #[serde(default)]
    pub pharmacy_id: Option<i32>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, rename = "subCategory")]
    pub sub_category: Option<String>,
    #[serde(default, rename = "sortBy")]
    pub sort_by: Option<String>,
    #[serde(default, rename = "sortOrder")]
    pub sort_order: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub limit: Option<u32>,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct Pagination {
    pub total: usize,
    pub page: u32,
    pub page_size: u32,
    pub total_pharmacies: usize,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct ProductListing {
    pub products: Vec<MedicineEntity>,
    pub pagination: Pagination,
}

/// Paginated visible-product listing. Totals are counted before the page
/// slice is applied, so they are stable across pages.
pub async fn list_visible(store: &MarketStore, query: &ProductQuery) -> ProductListing {
    let tables = store.read().await;

    let category_id = query
        .category
        .as_deref()
        .and_then(|name| tables.categories.values().find(|c| c.name == name))
        .map(|c| c.id);
    let subcategory_id = query
        .sub_category
        .as_deref()
        .and_then(|name| tables.subcategories.values().find(|s| s.name == name))
        .map(|s| s.id);

    let mut matches: Vec<&MedicineEntity> = tables
        .medicines
        .values()
        .filter(|m| m.is_visible_on_platform())
        .filter(|m| !query.bestseller.unwrap_or(false) || m.bestseller)
        .filter(|m| query.pharmacy_id.is_none_or(|id| m.pharmacy_id == id))
        .filter(|m| {
            query.category.is_none() || (category_id.is_some() && m.category_id == category_id)
        })
        .filter(|m| {
            query.sub_category.is_none()
                || (subcategory_id.is_some() && m.subcategory_id == subcategory_id)
        })
        .collect();

    let sort_by = SortBy::parse(query.sort_by.as_deref());
    let sort_order = SortOrder::parse(query.sort_order.as_deref());
    match sort_by {
        SortBy::CreatedAt => matches.sort_by_key(|m| m.created_at),
        SortBy::Price => matches.sort_by(|a, b| a.price.total_cmp(&b.price)),
        SortBy::Name => matches.sort_by(|a, b| a.name.cmp(&b.name)),
    }
    if sort_order == SortOrder::Desc {
        matches.reverse();
    }

    // Count before pagination: the page slice must never affect totals.
    let total = matches.len();
    let total_pharmacies = {
        let mut ids: Vec<i32> = matches.iter().map(|m| m.pharmacy_id).collect();
        ids.sort_unstable();
        ids.dedup();
        ids.len()
    };

    let page = query.page.unwrap_or(1).max(1);
    let page_size = query.limit.unwrap_or(100).max(1);
    // widen before multiplying: page and limit are caller-supplied
    let start = (page as usize - 1).saturating_mul(page_size as usize);
    let products = matches
        .into_iter()
        .skip(start)
        .take(page_size as usize)
        .cloned()
        .collect();

    ProductListing {
        products,
        pagination: Pagination {
            total,
            page,
            page_size,
            total_pharmacies,
        },
    }
}

/// Single product detail. Only active, approved products are served;
/// each hit bumps the view counter.
pub async fn product_detail(store: &MarketStore, id: i32) -> Result<MedicineEntity, AppError> {
    let mut tables = store.write().await;
    let medicine = tables.medicines.get_mut(&id).ok_or(AppError::NotFound)?;
    if !medicine.is_active || !medicine.is_approved {
        return Err(AppError::NotFound);
    }
    medicine.views_count += 1;
    Ok(medicine.clone())
}

/// One pharmacy's visible products.
pub async fn pharmacy_products(
    store: &MarketStore,
    pharmacy_id: i32,
) -> Result<Vec<MedicineEntity>, AppError> {
    let tables = store.read().await;
    if !tables.pharmacies.contains_key(&pharmacy_id) {
        return Err(AppError::NotFound);
    }
    let ids = tables
        .medicines_by_pharmacy
        .get(&pharmacy_id)
        .cloned()
        .unwrap_or_default();
    Ok(ids
        .iter()
        .filter_map(|id| tables.medicines.get(id))
        .filter(|m| m.is_visible_on_platform())
        .cloned()
        .collect())
}

// --- categories ---

pub async fn list_categories(store: &MarketStore) -> Vec<CategoryEntity> {
    let tables = store.read().await;
    let mut categories: Vec<_> = tables
        .categories
        .values()
        .filter(|c| c.is_active)
        .cloned()
        .collect();
    categories.sort_by(|a, b| a.name.cmp(&b.name));
    categories
}

pub async fn create_category(
    store: &MarketStore,
    name: &str,
    description: Option<String>,
) -> Result<CategoryEntity, AppError> {
    let mut tables = store.write().await;
    if tables.categories.values().any(|c| c.name == name) {
        return Err(AppError::Validation(format!(
            "Category \"{name}\" already exists"
        )));
    }
    let id = tables.allocate_id();
    let category = CategoryEntity {
        id,
        name: name.to_string(),
        description,
        is_active: true,
    };
    tables.categories.insert(id, category.clone());
    Ok(category)
}

pub async fn list_subcategories(
    store: &MarketStore,
    category_id: i32,
) -> Result<Vec<SubCategoryEntity>, AppError> {
    let tables = store.read().await;
    if !tables.categories.contains_key(&category_id) {
        return Err(AppError::NotFound);
    }
    let mut subcategories: Vec<_> = tables
        .subcategories
        .values()
        .filter(|s| s.category_id == category_id && s.is_active)
        .cloned()
        .collect();
    subcategories.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(subcategories)
}

pub async fn create_subcategory(
    store: &MarketStore,
    category_id: i32,
    name: &str,
    description: Option<String>,
) -> Result<SubCategoryEntity, AppError> {
    let mut tables = store.write().await;
    if !tables.categories.contains_key(&category_id) {
        return Err(AppError::NotFound);
    }
    // (category, name) unique
    if tables
        .subcategories
        .values()
        .any(|s| s.category_id == category_id && s.name == name)
    {
        return Err(AppError::Validation(format!(
            "Subcategory \"{name}\" already exists in this category"
        )));
    }
    let id = tables.allocate_id();
    let subcategory = SubCategoryEntity {
        id,
        category_id,
        name: name.to_string(),
        description,
        is_active: true,
    };
    tables.subcategories.insert(id, subcategory.clone());
    Ok(subcategory)
}

// --- pharmacy registration ---

#[derive(Debug, Deserialize, ToSchema)]
pub struct RegisterPharmacy {
    pub name: String,
    pub address: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

pub async fn register_pharmacy(
    store: &MarketStore,
    owner_id: i32,
    input: RegisterPharmacy,
) -> Result<PharmacyEntity, AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::Validation("Pharmacy name is required".into()));
    }
    let mut tables = store.write().await;
    if tables.pharmacy_by_owner.contains_key(&owner_id) {
        return Err(AppError::Validation(
            "This account already owns a pharmacy".into(),
        ));
    }
    let id = tables.allocate_id();
    let now = Utc::now();
    let pharmacy = PharmacyEntity {
        id,
        name: input.name,
        address: input.address,
        phone: input.phone,
        email: input.email,
        owner_id,
        is_open: true,
        is_verified: false,
        rating: 0.0,
        total_reviews: 0,
        created_at: now,
        updated_at: now,
    };
    tables.insert_pharmacy(pharmacy.clone());
    Ok(pharmacy)
}

// --- pharmacist product management ---

#[derive(Debug, Deserialize, ToSchema)]
pub struct CreateMedicine {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub generic_name: Option<String>,
    #[serde(default)]
    pub manufacturer: Option<String>,
    #[serde(default)]
    pub dosage: Option<String>,
    pub price: f64,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub quantity_price_list: Option<Value>,
    #[serde(default)]
    pub min_order_quantity: Option<u32>,
    #[serde(default)]
    pub stock_quantity: Option<u32>,
    #[serde(default)]
    pub category_id: Option<i32>,
    #[serde(default)]
    pub subcategory_id: Option<i32>,
    #[serde(default)]
    pub requires_prescription: bool,
    #[serde(default)]
    pub bestseller: bool,
    #[serde(default)]
    pub images: Vec<String>,
}

#[derive(Debug, Default, Deserialize, ToSchema)]
pub struct UpdateMedicine {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub dosage: Option<String>,
    #[serde(default)]
    pub price: Option<f64>,
    #[serde(default)]
    pub unit_price: Option<f64>,
    #[serde(default)]
    pub quantity_price_list: Option<Value>,
    #[serde(default)]
    pub min_order_quantity: Option<u32>,
    #[serde(default)]
    pub stock_quantity: Option<u32>,
    #[serde(default)]
    pub category_id: Option<i32>,
    #[serde(default)]
    pub subcategory_id: Option<i32>,
    #[serde(default)]
    pub requires_prescription: Option<bool>,
    #[serde(default)]
    pub bestseller: Option<bool>,
    #[serde(default)]
    pub is_active: Option<bool>,
    #[serde(default)]
    pub images: Option<Vec<String>>,
}

fn owned_pharmacy_id(tables: &crate::store::Tables, owner_id: i32) -> Result<i32, AppError> {
    tables
        .pharmacy_by_owner
        .get(&owner_id)
        .copied()
        .ok_or_else(|| AppError::Validation("Register a pharmacy before managing products".into()))
}

/// Creates a product for the caller's pharmacy. New products start
/// unapproved and only become buyer-visible after admin moderation.
pub async fn create_medicine(
    store: &MarketStore,
    owner_id: i32,
    input: CreateMedicine,
) -> Result<MedicineEntity, AppError> {
    if input.name.trim().is_empty() {
        return Err(AppError::Validation("Product name is required".into()));
    }
    if input.price <= 0.0 {
        return Err(AppError::Validation("Price must be positive".into()));
    }
    let min_order_quantity = input.min_order_quantity.unwrap_or(1);
    if min_order_quantity < 1 {
        return Err(AppError::Validation(
            "min_order_quantity must be at least 1".into(),
        ));
    }

    let mut tables = store.write().await;
    let pharmacy_id = owned_pharmacy_id(&tables, owner_id)?;
    if let Some(category_id) = input.category_id
        && !tables.categories.contains_key(&category_id)
    {
        return Err(AppError::Validation("Unknown category".into()));
    }
    if let Some(subcategory_id) = input.subcategory_id
        && !tables.subcategories.contains_key(&subcategory_id)
    {
        return Err(AppError::Validation("Unknown subcategory".into()));
    }

    let id = tables.allocate_id();
    let now = Utc::now();
    let medicine = MedicineEntity {
        id,
        name: input.name,
        description: input.description,
        generic_name: input.generic_name,
        manufacturer: input.manufacturer,
        dosage: input.dosage,
        price: input.price,
        unit_price: input.unit_price.unwrap_or(0.0),
        quantity_price_list: input.quantity_price_list.unwrap_or_else(|| Value::Array(vec![])),
        min_order_quantity,
        stock_quantity: input.stock_quantity.unwrap_or(0),
        category_id: input.category_id,
        subcategory_id: input.subcategory_id,
        pharmacy_id,
        requires_prescription: input.requires_prescription,
        bestseller: input.bestseller,
        is_active: true,
        is_approved: false,
        images: input.images,
        views_count: 0,
        sales_count: 0,
        created_at: now,
        updated_at: now,
    };
    tables.insert_medicine(medicine.clone());
    Ok(medicine)
}

/// All of the caller's own products, approved or not.
pub async fn own_products(
    store: &MarketStore,
    owner_id: i32,
) -> Result<Vec<MedicineEntity>, AppError> {
    let tables = store.read().await;
    let pharmacy_id = owned_pharmacy_id(&tables, owner_id)?;
    let ids = tables
        .medicines_by_pharmacy
        .get(&pharmacy_id)
        .cloned()
        .unwrap_or_default();
    Ok(ids
        .iter()
        .filter_map(|id| tables.medicines.get(id))
        .cloned()
        .collect())
}

/// Updates one of the caller's products. Wrong-owner access is reported as
/// not-found so product ids cannot be probed across pharmacies. The owning
/// pharmacy itself is immutable.
pub async fn update_medicine(
    store: &MarketStore,
    owner_id: i32,
    medicine_id: i32,
    input: UpdateMedicine,
) -> Result<MedicineEntity, AppError> {
    let mut tables = store.write().await;
    let pharmacy_id = owned_pharmacy_id(&tables, owner_id)?;
    if let Some(category_id) = input.category_id
        && !tables.categories.contains_key(&category_id)
    {
        return Err(AppError::Validation("Unknown category".into()));
    }
    if let Some(subcategory_id) = input.subcategory_id
        && !tables.subcategories.contains_key(&subcategory_id)
    {
        return Err(AppError::Validation("Unknown subcategory".into()));
    }
    let medicine = tables
        .medicines
        .get_mut(&medicine_id)
        .filter(|m| m.pharmacy_id == pharmacy_id)
        .ok_or(AppError::NotFound)?;

    if let Some(price) = input.price {
        if price <= 0.0 {
            return Err(AppError::Validation("Price must be positive".into()));
        }
        medicine.price = price;
    }
    if let Some(min) = input.min_order_quantity {
        if min < 1 {
            return Err(AppError::Validation(
                "min_order_quantity must be at least 1".into(),
            ));
        }
        medicine.min_order_quantity = min;
    }
    if let Some(name) = input.name {
        medicine.name = name;
    }
    if let Some(description) = input.description {
        medicine.description = Some(description);
    }
    if let Some(dosage) = input.dosage {
        medicine.dosage = Some(dosage);
    }
    if let Some(unit_price) = input.unit_price {
        medicine.unit_price = unit_price;
    }
    if let Some(list) = input.quantity_price_list {
        medicine.quantity_price_list = list;
    }
    if let Some(stock) = input.stock_quantity {
        medicine.stock_quantity = stock;
    }
    if let Some(category_id) = input.category_id {
        medicine.category_id = Some(category_id);
    }
    if let Some(subcategory_id) = input.subcategory_id {
        medicine.subcategory_id = Some(subcategory_id);
    }
    if let Some(requires) = input.requires_prescription {
        medicine.requires_prescription = requires;
    }
    if let Some(bestseller) = input.bestseller {
        medicine.bestseller = bestseller;
    }
    if let Some(is_active) = input.is_active {
        medicine.is_active = is_active;
    }
    if let Some(images) = input.images {
        medicine.images = images;
    }
    medicine.updated_at = Utc::now();
    Ok(medicine.clone())
}

/// Hard delete, owner only. Existing order snapshots are unaffected.
pub async fn delete_medicine(
    store: &MarketStore,
    owner_id: i32,
    medicine_id: i32,
) -> Result<MedicineEntity, AppError> {
    let mut tables = store.write().await;
    let pharmacy_id = owned_pharmacy_id(&tables, owner_id)?;
    let owned = tables
        .medicines
        .get(&medicine_id)
        .is_some_and(|m| m.pharmacy_id == pharmacy_id);
    if !owned {
        return Err(AppError::NotFound);
    }
    tables.remove_medicine(medicine_id).ok_or(AppError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sort_field_falls_back_silently() {
        assert_eq!(SortBy::parse(Some("price")), SortBy::Price);
        assert_eq!(SortBy::parse(Some("name")), SortBy::Name);
        assert_eq!(SortBy::parse(Some("created_at")), SortBy::CreatedAt);
        // unknown fields never reach the sort, they fall back
        assert_eq!(SortBy::parse(Some("__proto__")), SortBy::CreatedAt);
        assert_eq!(SortBy::parse(Some("pharmacy__owner__password")), SortBy::CreatedAt);
        assert_eq!(SortBy::parse(None), SortBy::CreatedAt);
    }

    #[test]
    fn sort_order_defaults_to_desc() {
        assert_eq!(SortOrder::parse(Some("asc")), SortOrder::Asc);
        assert_eq!(SortOrder::parse(Some("desc")), SortOrder::Desc);
        assert_eq!(SortOrder::parse(Some("sideways")), SortOrder::Desc);
        assert_eq!(SortOrder::parse(None), SortOrder::Desc);
    }
}
