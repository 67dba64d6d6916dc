use crate::error::{AppError, Result};
use crate::models::{CorpusTicket, LabeledTicket, Ticket};
use crate::state::TicketSource;
use async_trait::async_trait;
use dashmap::DashMap;
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;
use validator::Validate;

/// In-memory ticket store (for the CLI and testing)
#[derive(Clone)]
pub struct InMemoryTicketSource {
    tickets: Arc<DashMap<Uuid, Ticket>>,
}

impl InMemoryTicketSource {
    pub fn new() -> Self {
        Self {
            tickets: Arc::new(DashMap::new()),
        }
    }

    /// Build a store from tickets, validating each one
    pub fn from_tickets(tickets: impl IntoIterator<Item = Ticket>) -> Result<Self> {
        let store = Self::new();
        for ticket in tickets {
            store.insert(ticket)?;
        }
        Ok(store)
    }

    /// Load a JSON array of tickets
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            AppError::Source(format!("Failed to read tickets from {:?}: {}", path, e))
        })?;
        let tickets: Vec<Ticket> = serde_json::from_str(&raw)?;

        tracing::info!(path = ?path, count = tickets.len(), "Loaded ticket corpus");
        Self::from_tickets(tickets)
    }

    /// Insert or replace a ticket
    pub fn insert(&self, ticket: Ticket) -> Result<()> {
        ticket.validate()?;
        tracing::debug!(ticket_id = %ticket.id, "Ticket stored");
        self.tickets.insert(ticket.id, ticket);
        Ok(())
    }

    pub fn get(&self, id: &Uuid) -> Option<Ticket> {
        self.tickets.get(id).map(|entry| entry.clone())
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }
}

impl Default for InMemoryTicketSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TicketSource for InMemoryTicketSource {
    async fn fetch_labeled_corpus(&self) -> Result<Vec<LabeledTicket>> {
        let mut tickets: Vec<Ticket> = self
            .tickets
            .iter()
            .filter(|entry| entry.category.is_some())
            .map(|entry| entry.value().clone())
            .collect();

        // DashMap iteration order is arbitrary; keep training input stable
        tickets.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));

        Ok(tickets.iter().filter_map(Ticket::to_labeled).collect())
    }

    async fn fetch_recent_corpus(
        &self,
        exclude_id: &Uuid,
        limit: usize,
    ) -> Result<Vec<CorpusTicket>> {
        let mut tickets: Vec<CorpusTicket> = self
            .tickets
            .iter()
            .filter(|entry| entry.key() != exclude_id)
            .map(|entry| entry.value().to_corpus())
            .collect();

        // Sort by creation time (newest first)
        tickets.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(a.id.cmp(&b.id)));
        tickets.truncate(limit);

        Ok(tickets)
    }
}
