//! Deterministic synthetic tickets for demos and local training runs

use crate::models::{Ticket, TicketCategory, TicketPriority, TicketStatus};
use chrono::{DateTime, Duration, Utc};
use uuid::Uuid;

/// Seeded tickets are spread over this many days before `now`
pub const SEED_WINDOW_DAYS: i64 = 90;

const UUID_PREFIX: u128 = 0x5eed_0000_0000_4000_8000_0000_0000_0000;

const STATUSES: [TicketStatus; 4] = [
    TicketStatus::Open,
    TicketStatus::InProgress,
    TicketStatus::Resolved,
    TicketStatus::Closed,
];

const PRIORITIES: [TicketPriority; 3] = [
    TicketPriority::Low,
    TicketPriority::Medium,
    TicketPriority::High,
];

fn titles(category: TicketCategory) -> [&'static str; 3] {
    match category {
        TicketCategory::Billing => [
            "Invoice not received",
            "Payment failed on checkout",
            "Double charge on my credit card",
        ],
        TicketCategory::Account => [
            "Cannot reset password",
            "Account locked after login attempts",
            "Email change not working",
        ],
        TicketCategory::Bug => [
            "Error 500 on dashboard",
            "Mobile app crashes on startup",
            "Search returns no results",
        ],
        TicketCategory::Feature => [
            "Request for dark mode",
            "Add export to CSV option",
            "Support for SSO login",
        ],
        TicketCategory::Other => [
            "General question about pricing",
            "Feedback on user interface",
            "Issue not categorized",
        ],
    }
}

/// Generate `count` labeled tickets cycling through every category.
///
/// Output depends only on `count` and `now`.
pub fn generate_tickets(count: usize, now: DateTime<Utc>) -> Vec<Ticket> {
    let window_minutes = SEED_WINDOW_DAYS * 24 * 60;

    (0..count)
        .map(|i| {
            let category = TicketCategory::ALL[i % TicketCategory::ALL.len()];
            let title = titles(category)[(i / TicketCategory::ALL.len()) % 3];
            let status = STATUSES[(i / 2) % STATUSES.len()];
            let priority = PRIORITIES[(i / 3) % PRIORITIES.len()];

            let offset = if count > 1 {
                window_minutes * i as i64 / (count as i64 - 1)
            } else {
                0
            };
            let created_at = now - Duration::minutes(offset);

            let mut ticket = Ticket::new(
                title,
                format!(
                    "Synthetic ticket {} about {}. Auto-generated for demo.",
                    i + 1,
                    category
                ),
            )
            .with_category(category)
            .with_status(status)
            .with_priority(priority)
            .with_created_at(created_at);

            ticket.id = Uuid::from_u128(UUID_PREFIX + i as u128);
            if matches!(status, TicketStatus::Resolved | TicketStatus::Closed) {
                let resolved_at = created_at + Duration::hours((i as i64 * 7) % 72 + 1);
                ticket.resolved_at = Some(resolved_at);
                ticket.updated_at = resolved_at;
            }
            ticket
        })
        .collect()
}
