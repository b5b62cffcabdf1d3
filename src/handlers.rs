pub mod admin;
pub mod team;
pub mod clients;
pub mod tickets;
pub mod dashboard;
pub mod crm;
