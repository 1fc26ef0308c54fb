pub mod booking;
pub mod notifications;
pub mod subscriptions;
pub mod whatsapp;
