pub mod cart;
pub mod catalog;
pub mod deliveries;
pub mod moderation;
pub mod notifications;
pub mod orders;
pub mod payments;
pub mod prescriptions;
pub mod reviews;
