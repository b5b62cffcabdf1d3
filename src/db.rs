pub mod team_repo;
pub use team_repo::TeamRepository;
pub mod client_repo;
pub use client_repo::ClientRepository;
pub mod ticket_repo;
pub use ticket_repo::TicketRepository;
pub mod crm_repo;
pub use crm_repo::CrmRepository;
