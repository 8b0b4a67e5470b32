pub mod admin;
pub mod carts;
pub mod categories;
pub mod deliveries;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod pharmacy;
pub mod products;
pub mod reviews;
