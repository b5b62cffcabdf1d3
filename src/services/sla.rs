// src/services/sla.rs
//
// Avaliação de SLA: função pura da data de abertura, do prazo em horas
// e de um `now` sempre injetado pelo chamador.

use std::sync::Arc;

use chrono::{DateTime, Duration, FixedOffset, Utc};
use serde::Serialize;
use utoipa::ToSchema;

use crate::common::i18n::I18nStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum SlaStatus {
    OnTrack,
    DueToday,
    Late,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SlaEvaluation {
    pub status: SlaStatus,
    pub is_late: bool,
    pub due_today: bool,
    pub deadline: DateTime<Utc>,
    // Negativo quando o prazo já passou
    pub minutes_remaining: i64,
    #[schema(example = "2h restantes")]
    pub label: String,
}

#[derive(Clone)]
pub struct SlaEvaluator {
    // Fuso usado para decidir se o prazo cai "hoje"
    offset: FixedOffset,
    i18n: Arc<I18nStore>,
}

impl SlaEvaluator {
    pub fn new(offset: FixedOffset, i18n: Arc<I18nStore>) -> Self {
        Self { offset, i18n }
    }

    pub fn evaluate(
        &self,
        created_at: DateTime<Utc>,
        sla_hours: i32,
        now: DateTime<Utc>,
        lang: &str,
    ) -> SlaEvaluation {
        let deadline = created_at + Duration::hours(i64::from(sla_hours));

        // Prazo zero ou negativo: atrasado desde a abertura
        let is_late = now > deadline || (sla_hours <= 0 && now >= created_at);
        let due_today = !is_late
            && deadline.with_timezone(&self.offset).date_naive()
                == now.with_timezone(&self.offset).date_naive();

        let minutes_remaining = (deadline - now).num_minutes();
        let duration = format_duration(minutes_remaining.abs());
        let label = if is_late {
            self.i18n.translate_with(lang, "sla.overdue", &[("duration", &duration)])
        } else {
            self.i18n.translate_with(lang, "sla.remaining", &[("duration", &duration)])
        };

        let status = if is_late {
            SlaStatus::Late
        } else if due_today {
            SlaStatus::DueToday
        } else {
            SlaStatus::OnTrack
        };

        SlaEvaluation {
            status,
            is_late,
            due_today,
            deadline,
            minutes_remaining,
            label,
        }
    }
}

/// "1d 4h", "3h", "2h 15min", "40min".
pub fn format_duration(total_minutes: i64) -> String {
    let days = total_minutes / (24 * 60);
    let hours = (total_minutes % (24 * 60)) / 60;
    let minutes = total_minutes % 60;

    if days > 0 {
        format!("{}d {}h", days, hours)
    } else if hours > 0 && minutes > 0 {
        format!("{}h {}min", hours, minutes)
    } else if hours > 0 {
        format!("{}h", hours)
    } else {
        format!("{}min", minutes)
    }
}
