use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

// Users

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Client,
    Pharmacist,
    Delivery,
    Admin,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct UserEntity {
    pub id: i32,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

// Pharmacies

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PharmacyEntity {
    pub id: i32,
    pub name: String,
    pub address: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub owner_id: i32,
    pub is_open: bool,
    pub is_verified: bool,
    /// Derived from stored reviews, never client-writable.
    pub rating: f64,
    pub total_reviews: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Categories

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategoryEntity {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SubCategoryEntity {
    pub id: i32,
    pub category_id: i32,
    pub name: String,
    pub description: Option<String>,
    pub is_active: bool,
}

// Medicines

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct MedicineEntity {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub generic_name: Option<String>,
    pub manufacturer: Option<String>,
    pub dosage: Option<String>,
    pub price: f64,
    pub unit_price: f64,
    /// Optional tiered-quantity price packs, stored as raw JSON.
    pub quantity_price_list: Value,
    pub min_order_quantity: u32,
    pub stock_quantity: u32,
    pub category_id: Option<i32>,
    pub subcategory_id: Option<i32>,
    /// Owning pharmacy, immutable after creation.
    pub pharmacy_id: i32,
    pub requires_prescription: bool,
    pub bestseller: bool,
    pub is_active: bool,
    pub is_approved: bool,
    /// Image URLs, stored as absolute URL strings.
    pub images: Vec<String>,
    pub views_count: u32,
    pub sales_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MedicineEntity {
    pub fn is_in_stock(&self) -> bool {
        self.stock_quantity > 0
    }

    /// A product is buyer-visible only when active, admin-approved and in stock.
    pub fn is_visible_on_platform(&self) -> bool {
        self.is_active && self.is_approved && self.is_in_stock()
    }
}

// Carts

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartEntity {
    pub id: i32,
    pub user_id: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CartItemEntity {
    pub id: i32,
    pub cart_id: i32,
    pub medicine_id: i32,
    pub quantity: u32,
    /// Price snapshot taken at add-time, decoupled from the live catalog price.
    pub selected_price: f64,
    pub is_package: bool,
    pub package_details: Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItemEntity {
    pub fn subtotal(&self) -> f64 {
        self.quantity as f64 * self.selected_price
    }
}

// Orders

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Pending,
    PendingPrescription,
    UnderReview,
    Validated,
    Preparing,
    ReadyForPickup,
    InDelivery,
    Delivered,
    Cancelled,
}

impl OrderStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, OrderStatus::Delivered | OrderStatus::Cancelled)
    }

    /// Forward transitions of the order lifecycle. `Cancelled` is reachable
    /// from every non-terminal state.
    pub fn can_transition_to(&self, next: OrderStatus) -> bool {
        use OrderStatus::*;
        if next == Cancelled {
            return !self.is_terminal();
        }
        matches!(
            (self, next),
            (Pending, Preparing)
                | (PendingPrescription, UnderReview)
                | (UnderReview, Validated)
                | (Validated, Preparing)
                | (Preparing, ReadyForPickup)
                | (ReadyForPickup, InDelivery)
                | (InDelivery, Delivered)
        )
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderEntity {
    pub id: i32,
    pub user_id: i32,
    pub pharmacy_id: i32,
    /// Globally unique, generated once at checkout.
    pub order_number: String,
    pub status: OrderStatus,
    pub total_amount: f64,
    pub delivery_fee: f64,
    pub discount_amount: f64,
    pub final_amount: f64,
    pub delivery_address: Option<String>,
    pub delivery_phone: Option<String>,
    pub customer_notes: Option<String>,
    pub pharmacy_notes: Option<String>,
    pub order_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct OrderItemEntity {
    pub id: i32,
    pub order_id: i32,
    /// SET-NULL relation: cleared if the medicine is later deleted.
    pub medicine_id: Option<i32>,
    /// Denormalized at checkout so display never depends on the live catalog.
    pub medicine_name: String,
    pub quantity: u32,
    pub unit_price: f64,
    pub subtotal: f64,
    pub is_package: bool,
    pub package_details: Value,
}

// Prescriptions

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PrescriptionEntity {
    pub id: i32,
    pub order_id: i32,
    pub file_url: String,
    pub upload_date: DateTime<Utc>,
    pub is_validated: bool,
    pub validated_by: Option<i32>,
    pub validation_date: Option<DateTime<Utc>>,
    pub rejection_reason: Option<String>,
}

// Payments

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    MobileMoney,
    Paypal,
    CreditCard,
    CashOnDelivery,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    Pending,
    Processing,
    Success,
    Failed,
    Refunded,
}

impl PaymentStatus {
    /// Payment transitions are loosely ordered (a failed payment may retry),
    /// but `Refunded` must only follow `Success` and is terminal.
    pub fn can_transition_to(&self, next: PaymentStatus) -> bool {
        use PaymentStatus::*;
        match (self, next) {
            (Refunded, _) => false,
            (Success, Refunded) => true,
            (Success, _) => false,
            (_, Refunded) => false,
            (a, b) => *a != b,
        }
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PaymentEntity {
    pub id: i32,
    pub order_id: i32,
    pub payment_method: PaymentMethod,
    pub payment_status: PaymentStatus,
    pub amount: f64,
    pub transaction_id: Option<String>,
    pub payment_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Deliveries

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeliveryStatus {
    Pending,
    Assigned,
    PickedUp,
    InProgress,
    Delivered,
    Failed,
    Returned,
}

impl DeliveryStatus {
    pub fn is_active(&self) -> bool {
        use DeliveryStatus::*;
        matches!(self, Assigned | PickedUp | InProgress)
    }

    pub fn can_transition_to(&self, next: DeliveryStatus) -> bool {
        use DeliveryStatus::*;
        matches!(
            (self, next),
            (Pending, Assigned)
                | (Assigned, PickedUp)
                | (PickedUp, InProgress)
                | (InProgress, Delivered)
                | (Assigned | PickedUp | InProgress, Failed | Returned)
        )
    }
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DeliveryEntity {
    pub id: i32,
    pub order_id: i32,
    pub delivery_person_id: Option<i32>,
    pub delivery_status: DeliveryStatus,
    pub tracking_number: Option<String>,
    pub assigned_date: Option<DateTime<Utc>>,
    pub pickup_date: Option<DateTime<Utc>>,
    pub delivery_date: Option<DateTime<Utc>>,
    pub current_latitude: Option<f64>,
    pub current_longitude: Option<f64>,
    pub delivery_notes: Option<String>,
    pub failure_reason: Option<String>,
    pub updated_at: DateTime<Utc>,
}

// Reviews

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PharmacyReviewEntity {
    pub id: i32,
    pub pharmacy_id: i32,
    pub user_id: i32,
    pub order_id: i32,
    pub rating: u8,
    pub comment: Option<String>,
    pub is_verified_purchase: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Notifications

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Order,
    Payment,
    Delivery,
    Prescription,
    System,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct NotificationEntity {
    pub id: i32,
    pub user_id: i32,
    pub kind: NotificationKind,
    pub title: String,
    pub content: String,
    pub is_read: bool,
    pub send_date: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_status_happy_path() {
        use OrderStatus::*;
        let chain = [Pending, Preparing, ReadyForPickup, InDelivery, Delivered];
        for pair in chain.windows(2) {
            assert!(
                pair[0].can_transition_to(pair[1]),
                "{:?} -> {:?}",
                pair[0],
                pair[1]
            );
        }
    }

    #[test]
    fn order_status_prescription_path() {
        use OrderStatus::*;
        assert!(PendingPrescription.can_transition_to(UnderReview));
        assert!(UnderReview.can_transition_to(Validated));
        assert!(Validated.can_transition_to(Preparing));
        // no skipping the review gate
        assert!(!PendingPrescription.can_transition_to(Preparing));
        assert!(!UnderReview.can_transition_to(Preparing));
    }

    #[test]
    fn cancelled_reachable_from_non_terminal_only() {
        use OrderStatus::*;
        for s in [
            Pending,
            PendingPrescription,
            UnderReview,
            Validated,
            Preparing,
            ReadyForPickup,
            InDelivery,
        ] {
            assert!(s.can_transition_to(Cancelled), "{s:?}");
        }
        assert!(!Delivered.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Cancelled));
        assert!(!Cancelled.can_transition_to(Pending));
    }

    #[test]
    fn refund_only_after_success() {
        use PaymentStatus::*;
        assert!(Success.can_transition_to(Refunded));
        assert!(!Pending.can_transition_to(Refunded));
        assert!(!Processing.can_transition_to(Refunded));
        assert!(!Failed.can_transition_to(Refunded));
        assert!(!Refunded.can_transition_to(Pending));
        // failed -> processing retry is allowed
        assert!(Failed.can_transition_to(Processing));
        // success is settled, apart from refunds
        assert!(!Success.can_transition_to(Failed));
    }

    #[test]
    fn delivery_location_window() {
        use DeliveryStatus::*;
        assert!(Assigned.is_active() && PickedUp.is_active() && InProgress.is_active());
        assert!(!Pending.is_active() && !Delivered.is_active() && !Failed.is_active());
        assert!(Pending.can_transition_to(Assigned));
        assert!(!Pending.can_transition_to(PickedUp));
        assert!(InProgress.can_transition_to(Returned));
        assert!(!Delivered.can_transition_to(Failed));
    }

    #[test]
    fn medicine_visibility_predicate() {
        let mut m = MedicineEntity {
            id: 1,
            name: "Paracetamol".into(),
            description: None,
            generic_name: None,
            manufacturer: None,
            dosage: Some("500mg".into()),
            price: 10.0,
            unit_price: 10.0,
            quantity_price_list: serde_json::json!([]),
            min_order_quantity: 1,
            stock_quantity: 5,
            category_id: None,
            subcategory_id: None,
            pharmacy_id: 1,
            requires_prescription: false,
            bestseller: false,
            is_active: true,
            is_approved: true,
            images: vec![],
            views_count: 0,
            sales_count: 0,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert!(m.is_visible_on_platform());
        m.stock_quantity = 0;
        assert!(!m.is_visible_on_platform());
        m.stock_quantity = 5;
        m.is_approved = false;
        assert!(!m.is_visible_on_platform());
        m.is_approved = true;
        m.is_active = false;
        assert!(!m.is_visible_on_platform());
    }
}
