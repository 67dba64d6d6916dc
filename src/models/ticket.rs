use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};
use uuid::Uuid;
use validator::Validate;

/// A support ticket as owned by the external ticket store
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct Ticket {
    /// Unique identifier
    pub id: Uuid,

    /// Short summary
    #[validate(length(min = 1, max = 200))]
    pub title: String,

    /// Free-text body
    #[serde(default)]
    pub description: String,

    /// Workflow status
    #[serde(default)]
    pub status: TicketStatus,

    /// Priority
    #[serde(default)]
    pub priority: TicketPriority,

    /// Functional category, absent until someone (or the classifier) sets it
    #[serde(default)]
    pub category: Option<TicketCategory>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,

    /// Set while the ticket is resolved
    #[serde(default)]
    pub resolved_at: Option<DateTime<Utc>>,
}

impl Ticket {
    /// Create a new open ticket
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            status: TicketStatus::Open,
            priority: TicketPriority::Medium,
            category: None,
            created_at: now,
            updated_at: now,
            resolved_at: None,
        }
    }

    pub fn with_category(mut self, category: TicketCategory) -> Self {
        self.category = Some(category);
        self
    }

    pub fn with_status(mut self, status: TicketStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_priority(mut self, priority: TicketPriority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_created_at(mut self, created_at: DateTime<Utc>) -> Self {
        self.created_at = created_at;
        self.updated_at = created_at;
        self
    }

    /// Row handed to training when the ticket is labeled
    pub fn to_labeled(&self) -> Option<LabeledTicket> {
        self.category.map(|category| LabeledTicket {
            title: self.title.clone(),
            description: self.description.clone(),
            category: category.to_string(),
        })
    }

    /// Row handed to the similarity corpus
    pub fn to_corpus(&self) -> CorpusTicket {
        CorpusTicket {
            id: self.id,
            title: self.title.clone(),
            description: self.description.clone(),
            status: self.status,
            category: self.category,
            created_at: self.created_at,
        }
    }
}

/// Workflow status
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketStatus {
    #[default]
    Open,
    InProgress,
    Resolved,
    Closed,
}

/// Ticket priority
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TicketPriority {
    Low,
    #[default]
    Medium,
    High,
}

/// Functional category; the string form is the classifier label
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Display,
    EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum TicketCategory {
    Billing,
    Account,
    Bug,
    Feature,
    Other,
}

impl TicketCategory {
    pub const ALL: [TicketCategory; 5] = [
        TicketCategory::Billing,
        TicketCategory::Account,
        TicketCategory::Bug,
        TicketCategory::Feature,
        TicketCategory::Other,
    ];
}

/// Training row: ticket text plus its category label
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledTicket {
    pub title: String,
    pub description: String,
    pub category: String,
}

/// Similarity corpus row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorpusTicket {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub status: TicketStatus,
    pub category: Option<TicketCategory>,
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn test_ticket_creation() {
        let ticket = Ticket::new("Invoice not received", "");

        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.priority, TicketPriority::Medium);
        assert!(ticket.category.is_none());
        assert!(ticket.to_labeled().is_none());
        assert!(ticket.validate().is_ok());
    }

    #[test]
    fn test_title_validation() {
        let empty = Ticket::new("", "body");
        assert!(empty.validate().is_err());

        let long = Ticket::new("x".repeat(201), "body");
        assert!(long.validate().is_err());
    }

    #[test]
    fn test_enum_wire_names() {
        assert_eq!(TicketStatus::InProgress.to_string(), "IN_PROGRESS");
        assert_eq!(TicketCategory::Billing.to_string(), "billing");
        assert_eq!(
            TicketCategory::from_str("feature").unwrap(),
            TicketCategory::Feature
        );
        assert_eq!(
            serde_json::to_string(&TicketStatus::Resolved).unwrap(),
            "\"RESOLVED\""
        );
    }

    #[test]
    fn test_labeled_and_corpus_rows() {
        let ticket = Ticket::new("Error 500 on dashboard", "after login")
            .with_category(TicketCategory::Bug)
            .with_status(TicketStatus::InProgress);

        let labeled = ticket.to_labeled().unwrap();
        assert_eq!(labeled.category, "bug");
        assert_eq!(labeled.description, "after login");

        let row = ticket.to_corpus();
        assert_eq!(row.id, ticket.id);
        assert_eq!(row.status, TicketStatus::InProgress);
        assert_eq!(row.category, Some(TicketCategory::Bug));
    }
}
