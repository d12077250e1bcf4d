pub mod consumers;
pub mod publisher;
