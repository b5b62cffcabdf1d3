pub mod auth;
pub mod identity;
pub mod sla;
pub mod team_service;
pub mod client_service;
pub mod ticket_service;
pub mod dashboard_service;
pub mod crm_service;
