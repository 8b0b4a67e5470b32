//! Pharmacy reviews: one per (pharmacy, user, order), gated on a delivered
//! order, with the pharmacy's aggregate rating recomputed on every write.

use chrono::Utc;
use serde::Deserialize;
use utoipa::ToSchema;

use crate::{
    core::error::AppError,
    models::{OrderStatus, PharmacyEntity, PharmacyReviewEntity},
    store::{MarketStore, Tables},
};

#[derive(Debug, Deserialize, ToSchema)]
pub struct SubmitReview {
    pub order_id: i32,
    pub rating: u8,
    #[serde(default)]
    pub comment: Option<String>,
}

fn recompute_rating(tables: &mut Tables, pharmacy_id: i32) {
    let ratings: Vec<u8> = tables
        .reviews
        .values()
        .filter(|review| review.pharmacy_id == pharmacy_id)
        .map(|review| review.rating)
        .collect();
    if let Some(pharmacy) = tables.pharmacies.get_mut(&pharmacy_id) {
        pharmacy.total_reviews = ratings.len() as u32;
        pharmacy.rating = if ratings.is_empty() {
            0.0
        } else {
            ratings.iter().map(|r| *r as f64).sum::<f64>() / ratings.len() as f64
        };
        pharmacy.updated_at = Utc::now();
    }
}

/// Creates or updates the caller's review for the pharmacy that fulfilled
/// one of their delivered orders. Resubmitting for the same order replaces
/// the earlier rating and comment.
pub async fn submit(
    store: &MarketStore,
    user_id: i32,
    pharmacy_id: i32,
    input: SubmitReview,
) -> Result<PharmacyReviewEntity, AppError> {
    if !(1..=5).contains(&input.rating) {
        return Err(AppError::Validation("Rating must be between 1 and 5".into()));
    }
    let mut tables = store.write().await;
    let order = tables
        .orders
        .get(&input.order_id)
        .filter(|order| order.user_id == user_id)
        .cloned()
        .ok_or(AppError::NotFound)?;
    if order.pharmacy_id != pharmacy_id {
        return Err(AppError::Validation(
            "Order was not fulfilled by this pharmacy".into(),
        ));
    }
    if order.status != OrderStatus::Delivered {
        return Err(AppError::Validation(
            "Only delivered orders can be reviewed".into(),
        ));
    }

    let now = Utc::now();
    let existing_id = tables
        .reviews
        .values()
        .find(|review| {
            review.pharmacy_id == order.pharmacy_id
                && review.user_id == user_id
                && review.order_id == order.id
        })
        .map(|review| review.id);

    let review = match existing_id {
        Some(id) => {
            let review = tables.reviews.get_mut(&id).ok_or(AppError::NotFound)?;
            review.rating = input.rating;
            review.comment = input.comment;
            review.updated_at = now;
            review.clone()
        }
        None => {
            let id = tables.allocate_id();
            let review = PharmacyReviewEntity {
                id,
                pharmacy_id: order.pharmacy_id,
                user_id,
                order_id: order.id,
                rating: input.rating,
                comment: input.comment,
                is_verified_purchase: true,
                created_at: now,
                updated_at: now,
            };
            tables.reviews.insert(id, review.clone());
            review
        }
    };

    recompute_rating(&mut tables, order.pharmacy_id);
    Ok(review)
}

/// Public listing of a pharmacy's reviews, newest first.
pub async fn pharmacy_reviews(
    store: &MarketStore,
    pharmacy_id: i32,
) -> Result<(PharmacyEntity, Vec<PharmacyReviewEntity>), AppError> {
    let tables = store.read().await;
    let pharmacy = tables
        .pharmacies
        .get(&pharmacy_id)
        .cloned()
        .ok_or(AppError::NotFound)?;
    let mut reviews: Vec<_> = tables
        .reviews
        .values()
        .filter(|review| review.pharmacy_id == pharmacy_id)
        .cloned()
        .collect();
    reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    Ok((pharmacy, reviews))
}
