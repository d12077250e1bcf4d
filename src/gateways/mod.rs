pub mod notification;
pub mod payment;
