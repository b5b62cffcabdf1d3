pub mod admin;
pub mod auth;
pub mod client;
pub mod crm;
pub mod dashboard;
pub mod team;
pub mod ticket;
