//! Shared fixtures for the integration tests

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use ticket_triage_ml::{
    config::Config,
    error::{AppError, Result},
    ml::TicketMlService,
    models::{Ticket, TicketCategory, TicketStatus},
    state::{ArtifactRepository, InMemoryArtifactRepository, InMemoryTicketSource},
};

/// Ticket created `days_ago` days before now
pub fn ticket(
    title: &str,
    description: &str,
    category: Option<TicketCategory>,
    days_ago: i64,
) -> Ticket {
    let mut ticket =
        Ticket::new(title, description).with_created_at(Utc::now() - Duration::days(days_ago));
    ticket.category = category;
    ticket
}

/// The three-ticket corpus from the usage walkthrough
pub fn walkthrough_tickets() -> Vec<Ticket> {
    vec![
        ticket("Invoice not received", "", Some(TicketCategory::Billing), 1),
        ticket("Error 500 on dashboard", "", Some(TicketCategory::Bug), 2),
        ticket("Add export to CSV", "", Some(TicketCategory::Feature), 3),
    ]
}

/// Richer corpus where the billing tickets talk about payments
pub fn support_tickets() -> Vec<Ticket> {
    vec![
        ticket(
            "Invoice not received",
            "I have not received the invoice for my payment",
            Some(TicketCategory::Billing),
            1,
        ),
        ticket(
            "Payment failed on checkout",
            "My card payment failed twice",
            Some(TicketCategory::Billing),
            2,
        ),
        ticket(
            "Double charge on my credit card",
            "The payment was charged twice",
            Some(TicketCategory::Billing),
            3,
        ),
        ticket(
            "Cannot reset password",
            "The password reset email never arrives",
            Some(TicketCategory::Account),
            4,
        ),
        ticket(
            "Account locked after login attempts",
            "My account is locked",
            Some(TicketCategory::Account),
            5,
        ),
        ticket(
            "Error 500 on dashboard",
            "The dashboard shows a server error",
            Some(TicketCategory::Bug),
            6,
        ),
        ticket(
            "Mobile app crashes on startup",
            "The app crashes with an error",
            Some(TicketCategory::Bug),
            7,
        ),
        ticket(
            "Request for dark mode",
            "Please add a dark theme",
            Some(TicketCategory::Feature),
            8,
        )
        .with_status(TicketStatus::Closed),
        ticket("Untriaged request", "Someone should look at this", None, 9),
    ]
}

pub struct Harness {
    pub service: TicketMlService,
    pub source: Arc<InMemoryTicketSource>,
    pub repository: Arc<dyn ArtifactRepository>,
}

pub fn harness(tickets: Vec<Ticket>) -> Harness {
    harness_with_repository(tickets, Arc::new(InMemoryArtifactRepository::new()))
}

pub fn harness_with_repository(
    tickets: Vec<Ticket>,
    repository: Arc<dyn ArtifactRepository>,
) -> Harness {
    let source = Arc::new(InMemoryTicketSource::from_tickets(tickets).unwrap());
    let service = TicketMlService::new(Config::default(), source.clone(), repository.clone());
    Harness {
        service,
        source,
        repository,
    }
}

/// In-memory repository whose writes start failing once `fail_writes` is called
pub struct FailingArtifactRepository {
    inner: InMemoryArtifactRepository,
    failing: AtomicBool,
}

impl FailingArtifactRepository {
    pub fn new() -> Self {
        Self {
            inner: InMemoryArtifactRepository::new(),
            failing: AtomicBool::new(false),
        }
    }

    pub fn fail_writes(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }
}

#[async_trait]
impl ArtifactRepository for FailingArtifactRepository {
    async fn read(&self) -> Result<Option<Vec<u8>>> {
        self.inner.read().await
    }

    async fn write(&self, bytes: &[u8]) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AppError::Storage("disk full".to_string()));
        }
        self.inner.write(bytes).await
    }

    fn location(&self) -> String {
        "failing://memory".to_string()
    }
}

/// Parse Prometheus exposition format into metric name -> lines
pub fn parse_prometheus_output(output: &str) -> HashMap<String, Vec<String>> {
    let mut metrics = HashMap::new();
    let mut current_metric = String::new();

    for line in output.lines().map(str::trim).filter(|l| !l.is_empty()) {
        if line.starts_with("# HELP") || line.starts_with("# TYPE") {
            let parts: Vec<&str> = line.split_whitespace().collect();
            if parts.len() >= 3 {
                current_metric = parts[2].to_string();
                metrics
                    .entry(current_metric.clone())
                    .or_insert_with(Vec::new)
                    .push(line.to_string());
            }
        } else if !line.starts_with('#') && !current_metric.is_empty() {
            metrics
                .entry(current_metric.clone())
                .or_insert_with(Vec::new)
                .push(line.to_string());
        }
    }

    metrics
}
