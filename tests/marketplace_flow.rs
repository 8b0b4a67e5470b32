//! End-to-end flows over the service layer, driven through a fresh in-memory
//! store per test.

use medex_marketplace::{
    core::{auth::AuthUser, config::Config, error::AppError},
    models::{DeliveryStatus, OrderStatus, PaymentMethod, PaymentStatus, Role},
    services::{
        cart::{self, AddToCart},
        catalog::{self, CreateMedicine, ProductQuery, RegisterPharmacy, UpdateMedicine},
        deliveries::{self, AssignDelivery, UpdateDeliveryStatus, UpdateLocation},
        moderation::{self, RejectRequest},
        orders::{self, CheckoutRequest},
        payments::{self, CreatePayment, UpdatePaymentStatus},
        prescriptions::{self, AttachPrescription, RejectPrescription},
        reviews::{self, SubmitReview},
    },
    store::MarketStore,
};

async fn seed_user(store: &MarketStore, role: Role) -> AuthUser {
    let mut tables = store.write().await;
    let n = tables.users.len();
    let user = tables.create_user("Test", "User", &format!("user{n}@example.com"), role);
    AuthUser {
        id: user.id,
        role: user.role,
    }
}

/// Registers and verifies a pharmacy for `owner`, returns its id.
async fn seed_pharmacy(store: &MarketStore, owner: AuthUser, name: &str) -> i32 {
    let pharmacy = catalog::register_pharmacy(
        store,
        owner.id,
        RegisterPharmacy {
            name: name.to_string(),
            address: "1 Main St".to_string(),
            phone: None,
            email: None,
        },
    )
    .await
    .unwrap();
    moderation::verify_pharmacy(store, pharmacy.id).await.unwrap();
    pharmacy.id
}

fn medicine_input(name: &str, price: f64, stock: u32, min: u32) -> CreateMedicine {
    CreateMedicine {
        name: name.to_string(),
        description: None,
        generic_name: None,
        manufacturer: None,
        dosage: None,
        price,
        unit_price: None,
        quantity_price_list: None,
        min_order_quantity: Some(min),
        stock_quantity: Some(stock),
        category_id: None,
        subcategory_id: None,
        requires_prescription: false,
        bestseller: false,
        images: vec![],
    }
}

/// Creates and approves a medicine owned by `owner`'s pharmacy.
async fn seed_medicine(
    store: &MarketStore,
    owner: AuthUser,
    name: &str,
    price: f64,
    stock: u32,
    min: u32,
) -> i32 {
    let medicine = catalog::create_medicine(store, owner.id, medicine_input(name, price, stock, min))
        .await
        .unwrap();
    moderation::approve_medicine(store, medicine.id).await.unwrap();
    medicine.id
}

fn add(medicine_id: i32, quantity: u32) -> AddToCart {
    AddToCart {
        medicine_id,
        quantity,
        selected_price: None,
        is_package: None,
        package_details: None,
    }
}

fn checkout_req(payment_method: Option<PaymentMethod>) -> CheckoutRequest {
    CheckoutRequest {
        delivery_address: Some("2 Side St".to_string()),
        delivery_phone: Some("555-0100".to_string()),
        customer_notes: None,
        payment_method,
    }
}

async fn stock_of(store: &MarketStore, medicine_id: i32) -> u32 {
    store.read().await.medicines[&medicine_id].stock_quantity
}

/// Drives a pending order through the pharmacist's happy path to delivered.
async fn deliver_order(store: &MarketStore, pharmacist: AuthUser, order_id: i32) {
    for next in [
        OrderStatus::Preparing,
        OrderStatus::ReadyForPickup,
        OrderStatus::InDelivery,
        OrderStatus::Delivered,
    ] {
        orders::advance_status(store, pharmacist, order_id, next)
            .await
            .unwrap();
    }
}

#[tokio::test]
async fn multi_pharmacy_cart_splits_into_one_order_per_pharmacy() {
    let store = MarketStore::new();
    let config = Config::default();
    let client = seed_user(&store, Role::Client).await;
    let owner_a = seed_user(&store, Role::Pharmacist).await;
    let owner_b = seed_user(&store, Role::Pharmacist).await;
    let pharmacy_a = seed_pharmacy(&store, owner_a, "Alpha").await;
    let pharmacy_b = seed_pharmacy(&store, owner_b, "Beta").await;
    let med_a = seed_medicine(&store, owner_a, "Aspirin", 100.0, 10, 1).await;
    let med_b = seed_medicine(&store, owner_b, "Ibuprofen", 200.0, 10, 1).await;

    cart::add_item(&store, &config, client.id, add(med_a, 2)).await.unwrap();
    cart::add_item(&store, &config, client.id, add(med_b, 1)).await.unwrap();

    let created = orders::checkout(&store, &config, client.id, checkout_req(None))
        .await
        .unwrap();
    assert_eq!(created.len(), 2);

    let pharmacies: Vec<i32> = created.iter().map(|view| view.order.pharmacy_id).collect();
    assert!(pharmacies.contains(&pharmacy_a) && pharmacies.contains(&pharmacy_b));
    for view in &created {
        assert_eq!(view.order_items.len(), 1);
        assert!(view.order.order_number.starts_with("ORD-"));
        assert_eq!(
            view.order.final_amount,
            view.order.total_amount + config.delivery_fee
        );
        // delivery row exists from the moment of checkout
        let delivery = view.delivery.as_ref().unwrap();
        assert_eq!(delivery.delivery_status, DeliveryStatus::Pending);
    }

    // the consumed cart is empty afterwards
    let view = cart::get_cart(&store, client.id).await;
    assert!(view.cart_items.is_empty());
}

#[tokio::test]
async fn concurrent_checkouts_never_oversell() {
    let store = MarketStore::new();
    let config = Config::default();
    let owner = seed_user(&store, Role::Pharmacist).await;
    seed_pharmacy(&store, owner, "Alpha").await;
    let medicine = seed_medicine(&store, owner, "Amoxicillin", 50.0, 5, 1).await;

    let first = seed_user(&store, Role::Client).await;
    let second = seed_user(&store, Role::Client).await;
    cart::add_item(&store, &config, first.id, add(medicine, 5)).await.unwrap();
    cart::add_item(&store, &config, second.id, add(medicine, 5)).await.unwrap();

    let mut handles = Vec::new();
    for user in [first, second] {
        let store = store.clone();
        let config = config.clone();
        handles.push(tokio::spawn(async move {
            orders::checkout(&store, &config, user.id, checkout_req(None)).await
        }));
    }
    let mut successes = 0;
    let mut conflicts = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => successes += 1,
            Err(AppError::StockConflict { available, .. }) => {
                assert_eq!(available, 0);
                conflicts += 1;
            }
            Err(other) => panic!("unexpected error: {other}"),
        }
    }
    assert_eq!((successes, conflicts), (1, 1));
    assert_eq!(stock_of(&store, medicine).await, 0);
}

#[tokio::test]
async fn cancel_restores_stock_and_fails_open_payment() {
    let store = MarketStore::new();
    let config = Config::default();
    let client = seed_user(&store, Role::Client).await;
    let owner = seed_user(&store, Role::Pharmacist).await;
    seed_pharmacy(&store, owner, "Alpha").await;
    let medicine = seed_medicine(&store, owner, "Aspirin", 100.0, 10, 1).await;

    cart::add_item(&store, &config, client.id, add(medicine, 3)).await.unwrap();
    let created = orders::checkout(
        &store,
        &config,
        client.id,
        checkout_req(Some(PaymentMethod::MobileMoney)),
    )
    .await
    .unwrap();
    let order_id = created[0].order.id;
    assert_eq!(stock_of(&store, medicine).await, 7);
    assert_eq!(store.read().await.medicines[&medicine].sales_count, 3);

    let cancelled = orders::cancel_order(&store, client, order_id).await.unwrap();
    assert_eq!(cancelled.status, OrderStatus::Cancelled);
    assert_eq!(stock_of(&store, medicine).await, 10);
    assert_eq!(store.read().await.medicines[&medicine].sales_count, 0);

    let payment = payments::order_payment(&store, client.id, order_id).await.unwrap();
    assert_eq!(payment.payment_status, PaymentStatus::Failed);

    // a cancelled order cannot be cancelled again
    assert!(orders::cancel_order(&store, client, order_id).await.is_err());
}

#[tokio::test]
async fn cart_merge_revalidates_summed_quantity() {
    let store = MarketStore::new();
    let config = Config::default();
    let client = seed_user(&store, Role::Client).await;
    let owner = seed_user(&store, Role::Pharmacist).await;
    seed_pharmacy(&store, owner, "Alpha").await;
    let medicine = seed_medicine(&store, owner, "Aspirin", 100.0, 5, 2).await;

    // below the minimum
    assert!(
        cart::add_item(&store, &config, client.id, add(medicine, 1))
            .await
            .is_err()
    );

    let (view, line) = cart::add_item(&store, &config, client.id, add(medicine, 3))
        .await
        .unwrap();
    assert_eq!(line.quantity, 3);
    assert_eq!(view.cart_items.len(), 1);

    // merging 3 + 3 exceeds the stock of 5
    let err = cart::add_item(&store, &config, client.id, add(medicine, 3))
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        AppError::StockConflict {
            requested: 6,
            available: 5,
            ..
        }
    ));

    // the failed merge left the line untouched
    let view = cart::get_cart(&store, client.id).await;
    assert_eq!(view.cart_items.len(), 1);
    assert_eq!(view.cart_items[0].quantity, 3);

    // a merge within stock folds into the same line, never a second one
    let (view, line) = cart::add_item(&store, &config, client.id, add(medicine, 2))
        .await
        .unwrap();
    assert_eq!(view.cart_items.len(), 1);
    assert_eq!(line.quantity, 5);
}

#[tokio::test]
async fn unapproved_or_out_of_stock_products_are_invisible() {
    let store = MarketStore::new();
    let config = Config::default();
    let client = seed_user(&store, Role::Client).await;
    let owner = seed_user(&store, Role::Pharmacist).await;
    seed_pharmacy(&store, owner, "Alpha").await;

    let medicine = catalog::create_medicine(&store, owner.id, medicine_input("Aspirin", 100.0, 5, 1))
        .await
        .unwrap();

    // unapproved: not listed, not addable
    let listing = catalog::list_visible(&store, &ProductQuery::default()).await;
    assert!(listing.products.is_empty());
    assert!(
        cart::add_item(&store, &config, client.id, add(medicine.id, 1))
            .await
            .is_err()
    );

    moderation::approve_medicine(&store, medicine.id).await.unwrap();
    let listing = catalog::list_visible(&store, &ProductQuery::default()).await;
    assert_eq!(listing.products.len(), 1);

    // out of stock drops it from the listing, but detail still serves it
    catalog::update_medicine(
        &store,
        owner.id,
        medicine.id,
        UpdateMedicine {
            stock_quantity: Some(0),
            ..Default::default()
        },
    )
    .await
    .unwrap();
    let listing = catalog::list_visible(&store, &ProductQuery::default()).await;
    assert!(listing.products.is_empty());
    assert!(catalog::product_detail(&store, medicine.id).await.is_ok());
}

#[tokio::test]
async fn pagination_totals_are_stable_across_pages() {
    let store = MarketStore::new();
    let owner_a = seed_user(&store, Role::Pharmacist).await;
    let owner_b = seed_user(&store, Role::Pharmacist).await;
    seed_pharmacy(&store, owner_a, "Alpha").await;
    seed_pharmacy(&store, owner_b, "Beta").await;
    for i in 0..3 {
        seed_medicine(&store, owner_a, &format!("A{i}"), 100.0, 5, 1).await;
    }
    for i in 0..2 {
        seed_medicine(&store, owner_b, &format!("B{i}"), 100.0, 5, 1).await;
    }

    let mut seen = Vec::new();
    for page in 1..=3 {
        let listing = catalog::list_visible(
            &store,
            &ProductQuery {
                page: Some(page),
                limit: Some(2),
                ..Default::default()
            },
        )
        .await;
        assert_eq!(listing.pagination.total, 5);
        assert_eq!(listing.pagination.total_pharmacies, 2);
        seen.extend(listing.products.iter().map(|m| m.id));
    }
    seen.sort_unstable();
    seen.dedup();
    assert_eq!(seen.len(), 5);
}

#[tokio::test]
async fn absurd_page_numbers_return_an_empty_page_with_stable_totals() {
    let store = MarketStore::new();
    let owner = seed_user(&store, Role::Pharmacist).await;
    seed_pharmacy(&store, owner, "Alpha").await;
    seed_medicine(&store, owner, "Aspirin", 100.0, 5, 1).await;

    let listing = catalog::list_visible(
        &store,
        &ProductQuery {
            page: Some(50_000_000),
            limit: Some(100),
            ..Default::default()
        },
    )
    .await;
    assert!(listing.products.is_empty());
    assert_eq!(listing.pagination.total, 1);
    assert_eq!(listing.pagination.page, 50_000_000);

    // u32::MAX on both knobs must not wrap either
    let listing = catalog::list_visible(
        &store,
        &ProductQuery {
            page: Some(u32::MAX),
            limit: Some(u32::MAX),
            ..Default::default()
        },
    )
    .await;
    assert!(listing.products.is_empty());
    assert_eq!(listing.pagination.total, 1);
}

#[tokio::test]
async fn cart_merge_rejects_quantities_beyond_u32() {
    let store = MarketStore::new();
    let config = Config::default();
    let client = seed_user(&store, Role::Client).await;
    let owner = seed_user(&store, Role::Pharmacist).await;
    seed_pharmacy(&store, owner, "Alpha").await;
    let medicine = seed_medicine(&store, owner, "Saline", 1.0, u32::MAX, 1).await;

    let huge = 3_000_000_000;
    cart::add_item(&store, &config, client.id, add(medicine, huge)).await.unwrap();

    // 3e9 + 3e9 does not fit in u32; the merge must fail, not wrap under
    // the stock cap
    let err = cart::add_item(&store, &config, client.id, add(medicine, huge))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::StockConflict { .. }));

    let view = cart::get_cart(&store, client.id).await;
    assert_eq!(view.cart_items[0].quantity, huge);
}

#[tokio::test]
async fn update_rejects_unknown_category_ids() {
    let store = MarketStore::new();
    let owner = seed_user(&store, Role::Pharmacist).await;
    seed_pharmacy(&store, owner, "Alpha").await;
    let medicine = seed_medicine(&store, owner, "Aspirin", 100.0, 5, 1).await;

    let err = catalog::update_medicine(
        &store,
        owner.id,
        medicine,
        UpdateMedicine {
            category_id: Some(9999),
            ..Default::default()
        },
    )
    .await
    .unwrap_err();
    assert!(matches!(err, AppError::Validation(_)));
    assert!(matches!(
        catalog::update_medicine(
            &store,
            owner.id,
            medicine,
            UpdateMedicine {
                subcategory_id: Some(9999),
                ..Default::default()
            },
        )
        .await,
        Err(AppError::Validation(_))
    ));

    // the rejected update left the product untouched and listed
    let listing = catalog::list_visible(&store, &ProductQuery::default()).await;
    assert_eq!(listing.products.len(), 1);
    assert_eq!(listing.products[0].category_id, None);
}

#[tokio::test]
async fn order_snapshots_survive_catalog_mutation_and_deletion() {
    let store = MarketStore::new();
    let config = Config::default();
    let client = seed_user(&store, Role::Client).await;
    let owner = seed_user(&store, Role::Pharmacist).await;
    seed_pharmacy(&store, owner, "Alpha").await;
    let medicine = seed_medicine(&store, owner, "Aspirin", 100.0, 10, 1).await;

    cart::add_item(&store, &config, client.id, add(medicine, 2)).await.unwrap();
    let created = orders::checkout(&store, &config, client.id, checkout_req(None))
        .await
        .unwrap();
    let order_id = created[0].order.id;

    catalog::update_medicine(
        &store,
        owner.id,
        medicine,
        UpdateMedicine {
            name: Some("Renamed".to_string()),
            price: Some(999.0),
            ..Default::default()
        },
    )
    .await
    .unwrap();

    let view = orders::get_order(&store, client.id, order_id).await.unwrap();
    assert_eq!(view.order_items[0].medicine_name, "Aspirin");
    assert_eq!(view.order_items[0].unit_price, 100.0);
    assert_eq!(view.order.total_amount, 200.0);

    // deleting the medicine nulls the reference but keeps the snapshot
    catalog::delete_medicine(&store, owner.id, medicine).await.unwrap();
    let view = orders::get_order(&store, client.id, order_id).await.unwrap();
    assert_eq!(view.order_items[0].medicine_id, None);
    assert_eq!(view.order_items[0].medicine_name, "Aspirin");
}

#[tokio::test]
async fn prescription_gate_blocks_until_validated() {
    let store = MarketStore::new();
    let config = Config::default();
    let client = seed_user(&store, Role::Client).await;
    let owner = seed_user(&store, Role::Pharmacist).await;
    let admin = seed_user(&store, Role::Admin).await;
    seed_pharmacy(&store, owner, "Alpha").await;

    let mut input = medicine_input("Tramadol", 300.0, 10, 1);
    input.requires_prescription = true;
    let medicine = catalog::create_medicine(&store, owner.id, input).await.unwrap();
    moderation::approve_medicine(&store, medicine.id).await.unwrap();

    cart::add_item(&store, &config, client.id, add(medicine.id, 1)).await.unwrap();
    let created = orders::checkout(&store, &config, client.id, checkout_req(None))
        .await
        .unwrap();
    let order_id = created[0].order.id;
    assert_eq!(created[0].order.status, OrderStatus::PendingPrescription);

    // the pharmacist cannot skip the review gate
    assert!(
        orders::advance_status(&store, owner, order_id, OrderStatus::Preparing)
            .await
            .is_err()
    );

    let prescription = prescriptions::attach(
        &store,
        client.id,
        order_id,
        AttachPrescription {
            file_url: "https://files.example.com/rx-1.pdf".to_string(),
        },
    )
    .await
    .unwrap();
    let view = orders::get_order(&store, client.id, order_id).await.unwrap();
    assert_eq!(view.order.status, OrderStatus::UnderReview);

    // still gated while under review
    assert!(
        orders::advance_status(&store, owner, order_id, OrderStatus::Preparing)
            .await
            .is_err()
    );

    prescriptions::validate(&store, admin.id, prescription.id).await.unwrap();
    let view = orders::get_order(&store, client.id, order_id).await.unwrap();
    assert_eq!(view.order.status, OrderStatus::Validated);

    orders::advance_status(&store, owner, order_id, OrderStatus::Preparing)
        .await
        .unwrap();
}

#[tokio::test]
async fn review_queue_is_unreachable_without_an_attached_prescription() {
    let store = MarketStore::new();
    let config = Config::default();
    let client = seed_user(&store, Role::Client).await;
    let owner = seed_user(&store, Role::Pharmacist).await;
    seed_pharmacy(&store, owner, "Alpha").await;

    let mut input = medicine_input("Tramadol", 300.0, 10, 1);
    input.requires_prescription = true;
    let medicine = catalog::create_medicine(&store, owner.id, input).await.unwrap();
    moderation::approve_medicine(&store, medicine.id).await.unwrap();

    cart::add_item(&store, &config, client.id, add(medicine.id, 1)).await.unwrap();
    let created = orders::checkout(&store, &config, client.id, checkout_req(None))
        .await
        .unwrap();
    let order_id = created[0].order.id;

    // nothing to review yet, so the pharmacist cannot move the order there;
    // doing so would lock the client out of ever attaching one
    assert!(
        orders::advance_status(&store, owner, order_id, OrderStatus::UnderReview)
            .await
            .is_err()
    );
    let view = orders::get_order(&store, client.id, order_id).await.unwrap();
    assert_eq!(view.order.status, OrderStatus::PendingPrescription);

    // the client can still attach, which is what queues the review
    prescriptions::attach(
        &store,
        client.id,
        order_id,
        AttachPrescription {
            file_url: "https://files.example.com/rx-3.pdf".to_string(),
        },
    )
    .await
    .unwrap();
    let view = orders::get_order(&store, client.id, order_id).await.unwrap();
    assert_eq!(view.order.status, OrderStatus::UnderReview);
}

#[tokio::test]
async fn prescription_rejection_cancels_order_and_restores_stock() {
    let store = MarketStore::new();
    let config = Config::default();
    let client = seed_user(&store, Role::Client).await;
    let owner = seed_user(&store, Role::Pharmacist).await;
    let admin = seed_user(&store, Role::Admin).await;
    seed_pharmacy(&store, owner, "Alpha").await;

    let mut input = medicine_input("Tramadol", 300.0, 4, 1);
    input.requires_prescription = true;
    let medicine = catalog::create_medicine(&store, owner.id, input).await.unwrap();
    moderation::approve_medicine(&store, medicine.id).await.unwrap();

    cart::add_item(&store, &config, client.id, add(medicine.id, 4)).await.unwrap();
    let created = orders::checkout(&store, &config, client.id, checkout_req(None))
        .await
        .unwrap();
    let order_id = created[0].order.id;
    assert_eq!(stock_of(&store, medicine.id).await, 0);

    let prescription = prescriptions::attach(
        &store,
        client.id,
        order_id,
        AttachPrescription {
            file_url: "https://files.example.com/rx-2.pdf".to_string(),
        },
    )
    .await
    .unwrap();
    prescriptions::reject(
        &store,
        admin.id,
        prescription.id,
        RejectPrescription {
            reason: Some("Illegible".to_string()),
        },
    )
    .await
    .unwrap();

    let view = orders::get_order(&store, client.id, order_id).await.unwrap();
    assert_eq!(view.order.status, OrderStatus::Cancelled);
    assert_eq!(
        view.prescription.unwrap().rejection_reason.as_deref(),
        Some("Illegible")
    );
    assert_eq!(stock_of(&store, medicine.id).await, 4);
}

#[tokio::test]
async fn review_requires_delivery_and_updates_in_place() {
    let store = MarketStore::new();
    let config = Config::default();
    let client = seed_user(&store, Role::Client).await;
    let owner = seed_user(&store, Role::Pharmacist).await;
    let pharmacy = seed_pharmacy(&store, owner, "Alpha").await;
    let medicine = seed_medicine(&store, owner, "Aspirin", 100.0, 10, 1).await;

    cart::add_item(&store, &config, client.id, add(medicine, 1)).await.unwrap();
    let created = orders::checkout(&store, &config, client.id, checkout_req(None))
        .await
        .unwrap();
    let order_id = created[0].order.id;

    // not delivered yet
    assert!(
        reviews::submit(
            &store,
            client.id,
            pharmacy,
            SubmitReview {
                order_id,
                rating: 5,
                comment: None
            }
        )
        .await
        .is_err()
    );

    deliver_order(&store, owner, order_id).await;
    reviews::submit(
        &store,
        client.id,
        pharmacy,
        SubmitReview {
            order_id,
            rating: 4,
            comment: Some("Quick".to_string()),
        },
    )
    .await
    .unwrap();

    // resubmission replaces, never duplicates
    reviews::submit(
        &store,
        client.id,
        pharmacy,
        SubmitReview {
            order_id,
            rating: 2,
            comment: None,
        },
    )
    .await
    .unwrap();

    let (pharmacy_entity, review_list) = reviews::pharmacy_reviews(&store, pharmacy).await.unwrap();
    assert_eq!(review_list.len(), 1);
    assert_eq!(review_list[0].rating, 2);
    assert_eq!(pharmacy_entity.total_reviews, 1);
    assert_eq!(pharmacy_entity.rating, 2.0);
}

#[tokio::test]
async fn moderation_toggles_are_idempotent() {
    let store = MarketStore::new();
    let owner = seed_user(&store, Role::Pharmacist).await;
    let pharmacy = seed_pharmacy(&store, owner, "Alpha").await;
    let medicine = seed_medicine(&store, owner, "Aspirin", 100.0, 5, 1).await;

    let verified = moderation::verify_pharmacy(&store, pharmacy).await.unwrap();
    assert!(verified.is_verified);

    let rejected = moderation::reject_pharmacy(&store, pharmacy, RejectRequest { reason: None })
        .await
        .unwrap();
    assert!(!rejected.is_verified);

    let approved = moderation::approve_medicine(&store, medicine).await.unwrap();
    assert!(approved.is_approved);
    let approved_again = moderation::approve_medicine(&store, medicine).await.unwrap();
    assert!(approved_again.is_approved);

    let pulled = moderation::reject_medicine(
        &store,
        medicine,
        RejectRequest {
            reason: Some("Mislabeled".to_string()),
        },
    )
    .await
    .unwrap();
    assert!(!pulled.is_approved);

    assert!(matches!(
        moderation::approve_medicine(&store, 9999).await,
        Err(AppError::NotFound)
    ));
}

#[tokio::test]
async fn refunds_require_success_and_an_admin() {
    let store = MarketStore::new();
    let config = Config::default();
    let client = seed_user(&store, Role::Client).await;
    let admin = seed_user(&store, Role::Admin).await;
    let owner = seed_user(&store, Role::Pharmacist).await;
    seed_pharmacy(&store, owner, "Alpha").await;
    let medicine = seed_medicine(&store, owner, "Aspirin", 100.0, 10, 1).await;

    cart::add_item(&store, &config, client.id, add(medicine, 2)).await.unwrap();
    let created = orders::checkout(&store, &config, client.id, checkout_req(None))
        .await
        .unwrap();
    let order_id = created[0].order.id;

    let payment = payments::create_payment(
        &store,
        client.id,
        order_id,
        CreatePayment {
            payment_method: PaymentMethod::CreditCard,
        },
    )
    .await
    .unwrap();
    assert_eq!(payment.amount, created[0].order.final_amount);

    // a second payment on the same order is refused
    assert!(
        payments::create_payment(
            &store,
            client.id,
            order_id,
            CreatePayment {
                payment_method: PaymentMethod::Paypal,
            }
        )
        .await
        .is_err()
    );

    // refund before success is invalid even for the admin
    assert!(
        payments::update_status(
            &store,
            admin,
            payment.id,
            UpdatePaymentStatus {
                payment_status: PaymentStatus::Refunded,
                transaction_id: None,
            }
        )
        .await
        .is_err()
    );

    let settled = payments::update_status(
        &store,
        client,
        payment.id,
        UpdatePaymentStatus {
            payment_status: PaymentStatus::Success,
            transaction_id: None,
        },
    )
    .await
    .unwrap();
    assert!(settled.transaction_id.is_some());

    // the order's owner cannot refund themselves
    assert!(matches!(
        payments::update_status(
            &store,
            client,
            payment.id,
            UpdatePaymentStatus {
                payment_status: PaymentStatus::Refunded,
                transaction_id: None,
            }
        )
        .await,
        Err(AppError::Forbidden(_))
    ));

    let refunded = payments::update_status(
        &store,
        admin,
        payment.id,
        UpdatePaymentStatus {
            payment_status: PaymentStatus::Refunded,
            transaction_id: None,
        },
    )
    .await
    .unwrap();
    assert_eq!(refunded.payment_status, PaymentStatus::Refunded);

    // refunded is terminal
    assert!(
        payments::update_status(
            &store,
            admin,
            payment.id,
            UpdatePaymentStatus {
                payment_status: PaymentStatus::Pending,
                transaction_id: None,
            }
        )
        .await
        .is_err()
    );
}

#[tokio::test]
async fn ownership_is_scoped_as_not_found() {
    let store = MarketStore::new();
    let config = Config::default();
    let client = seed_user(&store, Role::Client).await;
    let stranger = seed_user(&store, Role::Client).await;
    let owner = seed_user(&store, Role::Pharmacist).await;
    let other_owner = seed_user(&store, Role::Pharmacist).await;
    seed_pharmacy(&store, owner, "Alpha").await;
    seed_pharmacy(&store, other_owner, "Beta").await;
    let medicine = seed_medicine(&store, owner, "Aspirin", 100.0, 10, 1).await;

    cart::add_item(&store, &config, client.id, add(medicine, 1)).await.unwrap();
    let created = orders::checkout(&store, &config, client.id, checkout_req(None))
        .await
        .unwrap();
    let order_id = created[0].order.id;

    assert!(matches!(
        orders::get_order(&store, stranger.id, order_id).await,
        Err(AppError::NotFound)
    ));
    assert!(matches!(
        orders::advance_status(&store, other_owner, order_id, OrderStatus::Preparing).await,
        Err(AppError::NotFound)
    ));
    assert!(matches!(
        catalog::update_medicine(
            &store,
            other_owner.id,
            medicine,
            UpdateMedicine::default()
        )
        .await,
        Err(AppError::NotFound)
    ));
}

#[tokio::test]
async fn delivery_flow_correlates_order_lifecycle() {
    let store = MarketStore::new();
    let config = Config::default();
    let client = seed_user(&store, Role::Client).await;
    let owner = seed_user(&store, Role::Pharmacist).await;
    let courier = seed_user(&store, Role::Delivery).await;
    let intruder = seed_user(&store, Role::Delivery).await;
    seed_pharmacy(&store, owner, "Alpha").await;
    let medicine = seed_medicine(&store, owner, "Aspirin", 100.0, 10, 1).await;

    cart::add_item(&store, &config, client.id, add(medicine, 1)).await.unwrap();
    let created = orders::checkout(&store, &config, client.id, checkout_req(None))
        .await
        .unwrap();
    let order_id = created[0].order.id;
    let delivery_id = created[0].delivery.as_ref().unwrap().id;

    // pharmacist readies the order
    orders::advance_status(&store, owner, order_id, OrderStatus::Preparing).await.unwrap();
    orders::advance_status(&store, owner, order_id, OrderStatus::ReadyForPickup)
        .await
        .unwrap();

    // a client cannot be assigned as courier
    assert!(
        deliveries::assign(
            &store,
            delivery_id,
            AssignDelivery {
                delivery_person_id: client.id
            }
        )
        .await
        .is_err()
    );

    let assigned = deliveries::assign(
        &store,
        delivery_id,
        AssignDelivery {
            delivery_person_id: courier.id,
        },
    )
    .await
    .unwrap();
    assert!(assigned.tracking_number.unwrap().starts_with("TRK-"));
    assert!(assigned.assigned_date.is_some());

    // location updates are assignee-only
    assert!(
        deliveries::update_location(
            &store,
            intruder.id,
            delivery_id,
            UpdateLocation {
                latitude: 0.0,
                longitude: 0.0
            }
        )
        .await
        .is_err()
    );
    deliveries::update_location(
        &store,
        courier.id,
        delivery_id,
        UpdateLocation {
            latitude: 6.13,
            longitude: 1.22,
        },
    )
    .await
    .unwrap();

    let picked = deliveries::update_status(
        &store,
        courier.id,
        delivery_id,
        UpdateDeliveryStatus {
            delivery_status: DeliveryStatus::PickedUp,
            delivery_notes: None,
            failure_reason: None,
        },
    )
    .await
    .unwrap();
    assert!(picked.pickup_date.is_some());
    let view = orders::get_order(&store, client.id, order_id).await.unwrap();
    assert_eq!(view.order.status, OrderStatus::InDelivery);

    deliveries::update_status(
        &store,
        courier.id,
        delivery_id,
        UpdateDeliveryStatus {
            delivery_status: DeliveryStatus::InProgress,
            delivery_notes: None,
            failure_reason: None,
        },
    )
    .await
    .unwrap();
    let delivered = deliveries::update_status(
        &store,
        courier.id,
        delivery_id,
        UpdateDeliveryStatus {
            delivery_status: DeliveryStatus::Delivered,
            delivery_notes: Some("Left with the customer".to_string()),
            failure_reason: None,
        },
    )
    .await
    .unwrap();
    assert!(delivered.delivery_date.is_some());

    let view = orders::get_order(&store, client.id, order_id).await.unwrap();
    assert_eq!(view.order.status, OrderStatus::Delivered);
    let completed_at = view.order.completed_at.unwrap();

    // no more location updates once the delivery is closed
    assert!(
        deliveries::update_location(
            &store,
            courier.id,
            delivery_id,
            UpdateLocation {
                latitude: 0.0,
                longitude: 0.0
            }
        )
        .await
        .is_err()
    );

    // completed_at is stamped exactly once
    let view = orders::get_order(&store, client.id, order_id).await.unwrap();
    assert_eq!(view.order.completed_at.unwrap(), completed_at);
}

#[tokio::test]
async fn dashboard_counts_settled_revenue_only() {
    let store = MarketStore::new();
    let config = Config::default();
    let client = seed_user(&store, Role::Client).await;
    let admin = seed_user(&store, Role::Admin).await;
    let owner = seed_user(&store, Role::Pharmacist).await;
    seed_pharmacy(&store, owner, "Alpha").await;
    let medicine = seed_medicine(&store, owner, "Aspirin", 100.0, 20, 1).await;

    // one settled payment, one left pending
    for settle in [true, false] {
        cart::add_item(&store, &config, client.id, add(medicine, 1)).await.unwrap();
        let created = orders::checkout(
            &store,
            &config,
            client.id,
            checkout_req(Some(PaymentMethod::MobileMoney)),
        )
        .await
        .unwrap();
        if settle {
            let payment = created[0].payment.as_ref().unwrap();
            payments::update_status(
                &store,
                admin,
                payment.id,
                UpdatePaymentStatus {
                    payment_status: PaymentStatus::Success,
                    transaction_id: None,
                },
            )
            .await
            .unwrap();
        }
    }

    let stats = moderation::dashboard(&store).await;
    assert_eq!(stats.total_orders, 2);
    assert_eq!(stats.total_pharmacies, 1);
    assert_eq!(stats.total_revenue, 100.0 + config.delivery_fee);
}

#[tokio::test]
async fn notifications_record_order_milestones() {
    let store = MarketStore::new();
    let config = Config::default();
    let client = seed_user(&store, Role::Client).await;
    let owner = seed_user(&store, Role::Pharmacist).await;
    seed_pharmacy(&store, owner, "Alpha").await;
    let medicine = seed_medicine(&store, owner, "Aspirin", 100.0, 10, 1).await;

    cart::add_item(&store, &config, client.id, add(medicine, 1)).await.unwrap();
    orders::checkout(&store, &config, client.id, checkout_req(None))
        .await
        .unwrap();

    let feed = medex_marketplace::services::notifications::list(&store, client.id).await;
    assert!(!feed.is_empty());
    assert!(feed.iter().all(|n| !n.is_read));

    let first = feed[0].id;
    let read = medex_marketplace::services::notifications::mark_read(&store, client.id, first)
        .await
        .unwrap();
    assert!(read.is_read);

    // someone else's notification reads as missing
    let stranger = seed_user(&store, Role::Client).await;
    assert!(matches!(
        medex_marketplace::services::notifications::mark_read(&store, stranger.id, first).await,
        Err(AppError::NotFound)
    ));
}
