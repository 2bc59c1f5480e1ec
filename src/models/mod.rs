pub mod chat;
pub mod spark;
