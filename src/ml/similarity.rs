use crate::error::Result;
use crate::ml::features::{build_text, cosine_similarity};
use crate::ml::metrics::ML_METRICS;
use crate::ml::models::{CorpusWindow, SimilarTicket, TopK};
use crate::ml::store::ModelStore;
use crate::models::{CorpusTicket, Ticket};
use crate::state::TicketSource;
use rayon::prelude::*;
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Ranks recent tickets by TF-IDF cosine similarity to a target ticket.
///
/// Uses the vectorizer of the current model; without one it returns nothing.
pub struct SimilarityEngine {
    source: Arc<dyn TicketSource>,
    store: Arc<ModelStore>,
}

impl SimilarityEngine {
    pub fn new(source: Arc<dyn TicketSource>, store: Arc<ModelStore>) -> Self {
        Self { source, store }
    }

    /// Up to `top_k` of the `max_corpus` most recent other tickets, most similar first
    pub async fn find_similar(
        &self,
        target: &Ticket,
        top_k: TopK,
        max_corpus: CorpusWindow,
    ) -> Result<Vec<SimilarTicket>> {
        let started = Instant::now();
        let result = self.rank(target, top_k, max_corpus).await;
        let elapsed = started.elapsed().as_secs_f64();

        let outcome = match &result {
            Ok(Some(ranked)) if ranked.is_empty() => "empty",
            Ok(Some(_)) => "ranked",
            Ok(None) => "untrained",
            Err(_) => "failed",
        };
        ML_METRICS.record_similarity(outcome, elapsed);

        result.map(Option::unwrap_or_default)
    }

    /// `None` when no model has been trained
    async fn rank(
        &self,
        target: &Ticket,
        top_k: TopK,
        max_corpus: CorpusWindow,
    ) -> Result<Option<Vec<SimilarTicket>>> {
        let artifact = match self.store.load().await? {
            Some(artifact) => artifact,
            None => return Ok(None),
        };

        let corpus = self
            .source
            .fetch_recent_corpus(&target.id, max_corpus.get())
            .await?;
        if corpus.is_empty() {
            return Ok(Some(Vec::new()));
        }

        let vectorizer = &artifact.vectorizer;
        let target_vector =
            vectorizer.transform(&build_text(Some(&target.title), Some(&target.description)));

        let scores: Vec<f64> = corpus
            .par_iter()
            .map(|t| {
                let vector = vectorizer.transform(&build_text(Some(&t.title), Some(&t.description)));
                cosine_similarity(&target_vector, &vector)
            })
            .collect();

        let mut ranked: Vec<SimilarTicket> = corpus
            .into_iter()
            .zip(scores)
            .map(|(t, similarity)| to_similar(t, similarity))
            .collect();

        // Stable: equal scores keep the corpus (most recent first) order
        ranked.sort_by(|a, b| b.similarity.total_cmp(&a.similarity));
        ranked.truncate(top_k.get());

        debug!(
            ticket_id = %target.id,
            results = ranked.len(),
            "Ranked similar tickets"
        );
        Ok(Some(ranked))
    }
}

fn to_similar(ticket: CorpusTicket, similarity: f64) -> SimilarTicket {
    SimilarTicket {
        id: ticket.id,
        title: ticket.title,
        status: ticket.status,
        category: ticket.category,
        similarity,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{TrainingConfig, VectorizerConfig};
    use crate::ml::training::TrainingPipeline;
    use crate::models::TicketCategory;
    use crate::state::{InMemoryArtifactRepository, InMemoryTicketSource};
    use chrono::{Duration, Utc};

    struct Fixture {
        engine: SimilarityEngine,
        tickets: Vec<Ticket>,
    }

    async fn fixture(train: bool) -> Fixture {
        let now = Utc::now();
        let tickets = vec![
            Ticket::new("Invoice not received", "invoice missing")
                .with_category(TicketCategory::Billing)
                .with_created_at(now - Duration::days(1)),
            Ticket::new("Invoice total wrong", "invoice amount")
                .with_category(TicketCategory::Billing)
                .with_created_at(now - Duration::days(2)),
            Ticket::new("Error 500 on dashboard", "server error")
                .with_category(TicketCategory::Bug)
                .with_created_at(now - Duration::days(3)),
            Ticket::new("Request for dark mode", "")
                .with_category(TicketCategory::Feature)
                .with_created_at(now - Duration::days(4)),
        ];

        let source = Arc::new(InMemoryTicketSource::from_tickets(tickets.clone()).unwrap());
        let store = Arc::new(ModelStore::new(Arc::new(InMemoryArtifactRepository::new())));
        if train {
            TrainingPipeline::new(
                source.clone(),
                store.clone(),
                VectorizerConfig::default(),
                TrainingConfig::default(),
            )
            .train()
            .await
            .unwrap();
        }

        Fixture {
            engine: SimilarityEngine::new(source, store),
            tickets,
        }
    }

    #[tokio::test]
    async fn test_untrained_returns_empty() {
        let f = fixture(false).await;
        let result = f
            .engine
            .find_similar(&f.tickets[0], TopK::default(), CorpusWindow::default())
            .await
            .unwrap();

        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn test_ranking_excludes_target_and_sorts() {
        let f = fixture(true).await;
        let result = f
            .engine
            .find_similar(&f.tickets[0], TopK::default(), CorpusWindow::default())
            .await
            .unwrap();

        assert_eq!(result.len(), 3);
        assert!(result.iter().all(|s| s.id != f.tickets[0].id));
        assert_eq!(result[0].id, f.tickets[1].id);
        assert!(result[0].similarity > 0.0);
        assert!(result.windows(2).all(|w| w[0].similarity >= w[1].similarity));
        assert!(result.iter().all(|s| (0.0..=1.0).contains(&s.similarity)));
    }

    #[tokio::test]
    async fn test_ties_keep_recency_order() {
        let f = fixture(true).await;
        let target = Ticket::new("Unrelated words only", "");
        let result = f
            .engine
            .find_similar(&target, TopK::default(), CorpusWindow::default())
            .await
            .unwrap();

        assert_eq!(result.len(), 4);
        assert!(result.iter().all(|s| s.similarity == 0.0));
        let ids: Vec<_> = result.iter().map(|s| s.id).collect();
        let expected: Vec<_> = f.tickets.iter().map(|t| t.id).collect();
        assert_eq!(ids, expected);
    }

    #[tokio::test]
    async fn test_bounds_respected() {
        let f = fixture(true).await;

        let one = f
            .engine
            .find_similar(&f.tickets[0], TopK::new(1).unwrap(), CorpusWindow::default())
            .await
            .unwrap();
        assert_eq!(one.len(), 1);

        let window = f
            .engine
            .find_similar(&f.tickets[3], TopK::default(), CorpusWindow::new(2).unwrap())
            .await
            .unwrap();
        assert_eq!(window.len(), 2);
        // only the two most recent tickets are considered
        assert!(window
            .iter()
            .all(|s| s.id == f.tickets[0].id || s.id == f.tickets[1].id));
    }
}
