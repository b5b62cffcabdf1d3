// src/docs.rs

use utoipa::OpenApi;
use utoipa::openapi::security::{Http, HttpAuthScheme, SecurityScheme};
use crate::handlers;
use crate::models;
use crate::services;

#[derive(OpenApi)]
#[openapi(
    paths(
        // --- Admin ---
        handlers::admin::invite_user,
        handlers::admin::resend_invite,
        handlers::admin::delete_user,
        handlers::admin::update_user_details,
        handlers::admin::get_team_members,

        // --- Team ---
        handlers::team::get_me,
        handlers::team::list_roles,

        // --- Clients ---
        handlers::clients::create_client,
        handlers::clients::list_clients,
        handlers::clients::get_client,
        handlers::clients::update_client,
        handlers::clients::delete_client,

        // --- Tickets ---
        handlers::tickets::create_ticket,
        handlers::tickets::list_tickets,
        handlers::tickets::get_board,
        handlers::tickets::get_ticket,
        handlers::tickets::update_ticket,
        handlers::tickets::change_status,
        handlers::tickets::get_history,

        // --- Dashboard ---
        handlers::dashboard::get_summary,

        // --- CRM ---
        handlers::crm::create_funnel,
        handlers::crm::list_funnels,
        handlers::crm::add_stage,
        handlers::crm::get_funnel_board,
        handlers::crm::create_deal,
        handlers::crm::list_deals,
        handlers::crm::update_deal,
        handlers::crm::delete_deal,
        handlers::crm::move_deal,
        handlers::crm::set_deal_status,
        handlers::crm::create_company,
        handlers::crm::list_companies,
        handlers::crm::create_contact,
        handlers::crm::list_contacts,
    ),
    components(
        schemas(
            // --- Admin / Team ---
            models::admin::InviteUserPayload,
            models::admin::ResendInvitePayload,
            models::admin::DeleteUserPayload,
            models::admin::UpdateUserDetailsPayload,
            models::admin::MessageResponse,
            models::admin::InviteUserResponse,
            models::admin::UpdateUserDetailsResponse,
            models::team::Profile,
            models::team::Role,
            models::team::MemberStatus,
            models::team::TeamMember,
            models::team::MeResponse,
            models::auth::AuthUser,

            // --- Clients ---
            models::client::Client,
            handlers::clients::ClientPayload,

            // --- Tickets ---
            models::ticket::TicketStatus,
            models::ticket::TicketPriority,
            models::ticket::Ticket,
            models::ticket::TicketView,
            models::ticket::TicketHistoryEntry,
            models::ticket::BoardColumn,
            models::ticket::TicketSortField,
            models::ticket::SortOrder,
            services::sla::SlaStatus,
            services::sla::SlaEvaluation,
            handlers::tickets::TicketPayload,
            handlers::tickets::ChangeStatusPayload,

            // --- Dashboard ---
            models::dashboard::DashboardSummary,

            // --- CRM ---
            models::crm::DealStatus,
            models::crm::Funnel,
            models::crm::FunnelWithStages,
            models::crm::Stage,
            models::crm::Deal,
            models::crm::BoardStage,
            models::crm::FunnelBoard,
            models::crm::Company,
            models::crm::Contact,
            handlers::crm::CreateFunnelPayload,
            handlers::crm::AddStagePayload,
            handlers::crm::CreateDealPayload,
            handlers::crm::UpdateDealPayload,
            handlers::crm::MoveDealPayload,
            handlers::crm::DealStatusPayload,
            handlers::crm::CompanyPayload,
            handlers::crm::ContactPayload,
        )
    ),
    tags(
        (name = "Admin", description = "Convites e gestão da equipe via provedor de identidade"),
        (name = "Team", description = "Perfil do usuário e cargos"),
        (name = "Clients", description = "Cadastro de clientes"),
        (name = "Tickets", description = "Chamados, SLA e pipeline"),
        (name = "Dashboard", description = "Indicadores do painel de chamados"),
        (name = "CRM", description = "Funis, etapas, negócios, empresas e contatos")
    ),
    modifiers(&SecurityAddon)
)]
pub struct ApiDoc;

struct SecurityAddon;

impl utoipa::Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "api_jwt",
            SecurityScheme::Http(
                Http::new(HttpAuthScheme::Bearer)
            ),
        );
    }
}
