//! Best-label reduction
//!
//! Folds completed `(term, matches)` batches into one [`LabeledMessage`] per
//! identity, keeping the label whose match scored highest. The reducer is
//! owned by the single consumer of the fan-out, so it needs no locking.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use domain_vector::MessagePayload;
use tracing::warn;

use crate::metrics;
use crate::models::{LabeledMessage, LabeledRecord, MessageIdentity, SearchMatch};
use crate::taxonomy::Taxonomy;

pub struct BestLabelReducer {
    taxonomy: Arc<Taxonomy>,
    messages: Vec<LabeledMessage>,
    index: HashMap<MessageIdentity, usize>,
    conflicted: HashSet<MessageIdentity>,
    ignored_scores: usize,
}

impl BestLabelReducer {
    pub fn new(taxonomy: Arc<Taxonomy>) -> Self {
        Self {
            taxonomy,
            messages: Vec::new(),
            index: HashMap::new(),
            conflicted: HashSet::new(),
            ignored_scores: 0,
        }
    }

    /// Register corpus messages up front so they are reported as unlabeled
    /// when no term matches them.
    pub fn seed<'a, I>(&mut self, payloads: I)
    where
        I: IntoIterator<Item = &'a MessagePayload>,
    {
        for payload in payloads {
            let identity = MessageIdentity::new(&payload.time, &payload.account);
            self.entry(identity, &payload.location, &payload.message);
        }
    }

    /// Fold one completed term into the map.
    ///
    /// A match replaces the current label only when it scores strictly
    /// higher, so on a tie the term processed first keeps the message.
    pub fn apply(&mut self, term: &str, matches: &[SearchMatch]) {
        let label = term.to_lowercase();
        let main_category = self.taxonomy.main_category_of(term).to_string();

        for m in matches {
            if m.score.is_nan() {
                self.ignored_scores += 1;
                warn!(term = %term, identity = %m.identity, "Ignoring match with NaN score");
                continue;
            }

            let idx = self.entry(m.identity.clone(), &m.location, &m.message);
            let message = &mut self.messages[idx];

            if m.score > message.best_score {
                message.best_label = Some(label.clone());
                message.best_score = m.score;
                message.main_category = Some(main_category.clone());
            }
        }
    }

    fn entry(&mut self, identity: MessageIdentity, location: &str, text: &str) -> usize {
        if let Some(&idx) = self.index.get(&identity) {
            let existing = &self.messages[idx];
            if (existing.location != location || existing.message != text)
                && self.conflicted.insert(identity.clone())
            {
                metrics::record_payload_conflict();
                warn!(
                    identity = %identity,
                    kept_location = %existing.location,
                    other_location = %location,
                    "Identity seen with a different payload, keeping the first"
                );
            }
            return idx;
        }

        let idx = self.messages.len();
        self.messages
            .push(LabeledMessage::unlabeled(&identity, location, text));
        self.index.insert(identity, idx);
        idx
    }

    pub fn get(&self, identity: &MessageIdentity) -> Option<&LabeledMessage> {
        self.index.get(identity).map(|&idx| &self.messages[idx])
    }

    /// Messages in first-seen order
    pub fn messages(&self) -> &[LabeledMessage] {
        &self.messages
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn labeled_count(&self) -> usize {
        self.messages.iter().filter(|m| m.is_labeled()).count()
    }

    pub fn unlabeled_count(&self) -> usize {
        self.len() - self.labeled_count()
    }

    /// Number of identities that reappeared with a different payload
    pub fn conflicts(&self) -> usize {
        self.conflicted.len()
    }

    pub fn ignored_scores(&self) -> usize {
        self.ignored_scores
    }

    /// Labeled messages as export rows, in first-seen order. Unlabeled
    /// messages are dropped.
    pub fn into_records(self) -> Vec<LabeledRecord> {
        self.messages
            .iter()
            .filter_map(LabeledMessage::to_record)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::UNCATEGORIZED;

    fn taxonomy() -> Arc<Taxonomy> {
        Arc::new(Taxonomy::from_pairs([
            ("Hazards", vec!["flood", "fire"]),
            ("Other", vec!["earthquake"]),
            ("Needs", vec!["rescue"]),
        ]))
    }

    fn hit(account: &str, score: f32) -> SearchMatch {
        SearchMatch::new("2020-04-06 10:00", account, "Easton", format!("msg from {account}"), score)
    }

    fn id(account: &str) -> MessageIdentity {
        MessageIdentity::new("2020-04-06 10:00", account)
    }

    #[test]
    fn test_highest_score_wins_across_terms() {
        let mut reducer = BestLabelReducer::new(taxonomy());
        reducer.apply("flood", &[hit("A", 0.9), hit("B", 0.3)]);
        reducer.apply("earthquake", &[hit("B", 0.7)]);

        let a = reducer.get(&id("A")).unwrap();
        assert_eq!(a.best_label.as_deref(), Some("flood"));
        assert_eq!(a.main_category.as_deref(), Some("Hazards"));
        assert_eq!(a.best_score, 0.9);

        let b = reducer.get(&id("B")).unwrap();
        assert_eq!(b.best_label.as_deref(), Some("earthquake"));
        assert_eq!(b.main_category.as_deref(), Some("Other"));
        assert_eq!(b.best_score, 0.7);
    }

    #[test]
    fn test_equal_score_keeps_first_processed() {
        let mut reducer = BestLabelReducer::new(taxonomy());
        reducer.apply("fire", &[hit("A", 0.5)]);
        reducer.apply("flood", &[hit("A", 0.5)]);
        assert_eq!(reducer.get(&id("A")).unwrap().best_label.as_deref(), Some("fire"));

        let mut reversed = BestLabelReducer::new(taxonomy());
        reversed.apply("flood", &[hit("A", 0.5)]);
        reversed.apply("fire", &[hit("A", 0.5)]);
        assert_eq!(reversed.get(&id("A")).unwrap().best_label.as_deref(), Some("flood"));
    }

    #[test]
    fn test_label_is_lowercased_and_unknown_term_uncategorized() {
        let mut reducer = BestLabelReducer::new(taxonomy());
        reducer.apply("FLOOD", &[hit("A", 0.4)]);
        reducer.apply("Aftershock", &[hit("B", 0.4)]);

        let a = reducer.get(&id("A")).unwrap();
        assert_eq!(a.best_label.as_deref(), Some("flood"));
        assert_eq!(a.main_category.as_deref(), Some("Hazards"));

        let b = reducer.get(&id("B")).unwrap();
        assert_eq!(b.best_label.as_deref(), Some("aftershock"));
        assert_eq!(b.main_category.as_deref(), Some(UNCATEGORIZED));
    }

    #[test]
    fn test_nan_scores_never_win() {
        let mut reducer = BestLabelReducer::new(taxonomy());
        reducer.apply("flood", &[hit("A", f32::NAN)]);
        assert!(reducer.get(&id("A")).is_none());
        assert_eq!(reducer.ignored_scores(), 1);

        reducer.apply("fire", &[hit("A", 0.2)]);
        reducer.apply("flood", &[hit("A", f32::NAN)]);
        assert_eq!(reducer.get(&id("A")).unwrap().best_label.as_deref(), Some("fire"));
    }

    #[test]
    fn test_first_payload_kept_and_conflict_counted() {
        let mut reducer = BestLabelReducer::new(taxonomy());
        reducer.apply("flood", &[SearchMatch::new("t", "A", "Easton", "first", 0.3)]);
        reducer.apply("fire", &[SearchMatch::new("t", "A", "Weston", "second", 0.8)]);

        let a = reducer.get(&MessageIdentity::new("t", "A")).unwrap();
        assert_eq!(a.location, "Easton");
        assert_eq!(a.message, "first");
        assert_eq!(a.best_label.as_deref(), Some("fire"));
        assert_eq!(reducer.conflicts(), 1);
        assert_eq!(reducer.len(), 1);
    }

    #[test]
    fn test_conflicts_count_identities_not_occurrences() {
        let mut reducer = BestLabelReducer::new(taxonomy());
        reducer.apply("flood", &[SearchMatch::new("t", "A", "Easton", "first", 0.3)]);
        for term in ["fire", "earthquake", "rescue"] {
            reducer.apply(term, &[SearchMatch::new("t", "A", "Weston", "second", 0.1)]);
        }
        assert_eq!(reducer.conflicts(), 1);

        reducer.apply("fire", &[SearchMatch::new("t", "B", "Easton", "one", 0.2)]);
        reducer.apply("flood", &[SearchMatch::new("t", "B", "Easton", "two", 0.2)]);
        reducer.apply("flood", &[SearchMatch::new("t", "C", "Easton", "same", 0.2)]);
        reducer.apply("fire", &[SearchMatch::new("t", "C", "Easton", "same", 0.2)]);
        assert_eq!(reducer.conflicts(), 2);
    }

    #[test]
    fn test_seeded_messages_stay_unlabeled_without_matches() {
        let corpus = vec![
            MessagePayload::new("2020-04-06 10:00", "Easton", "A", "msg from A"),
            MessagePayload::new("2020-04-06 10:00", "Easton", "C", "msg from C"),
        ];
        let mut reducer = BestLabelReducer::new(taxonomy());
        reducer.seed(&corpus);
        reducer.apply("flood", &[hit("A", 0.6)]);

        assert_eq!(reducer.len(), 2);
        assert_eq!(reducer.labeled_count(), 1);
        assert_eq!(reducer.unlabeled_count(), 1);
        assert_eq!(reducer.conflicts(), 0);

        let records = reducer.into_records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].account, "A");
    }

    #[test]
    fn test_records_follow_first_seen_order() {
        let mut reducer = BestLabelReducer::new(taxonomy());
        reducer.apply("fire", &[hit("C", 0.2), hit("A", 0.2)]);
        reducer.apply("flood", &[hit("B", 0.9), hit("A", 0.9)]);

        let accounts: Vec<_> = reducer
            .into_records()
            .into_iter()
            .map(|r| r.account)
            .collect();
        assert_eq!(accounts, vec!["C", "A", "B"]);
    }
}
