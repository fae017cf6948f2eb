use std::fmt;

use domain_vector::{MessageHit, MessagePayload};
use serde::{Deserialize, Serialize};

/// Main category assigned when a term has no parent in the taxonomy.
pub const UNCATEGORIZED: &str = "uncategorized";

/// Identity of one logical message: the `(time, account)` pair.
///
/// Two records are the same message iff both fields are equal; location and
/// text do not take part.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MessageIdentity {
    pub time: String,
    pub account: String,
}

impl MessageIdentity {
    pub fn new(time: impl Into<String>, account: impl Into<String>) -> Self {
        Self {
            time: time.into(),
            account: account.into(),
        }
    }
}

impl fmt::Display for MessageIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.time, self.account)
    }
}

/// One hit returned by a term query
#[derive(Debug, Clone, PartialEq)]
pub struct SearchMatch {
    pub identity: MessageIdentity,
    pub location: String,
    pub message: String,
    pub score: f32,
}

impl SearchMatch {
    pub fn new(
        time: impl Into<String>,
        account: impl Into<String>,
        location: impl Into<String>,
        message: impl Into<String>,
        score: f32,
    ) -> Self {
        Self {
            identity: MessageIdentity::new(time, account),
            location: location.into(),
            message: message.into(),
            score,
        }
    }
}

impl From<MessageHit> for SearchMatch {
    fn from(hit: MessageHit) -> Self {
        Self {
            identity: MessageIdentity::new(hit.time, hit.account),
            location: hit.location,
            message: hit.message,
            score: hit.score,
        }
    }
}

/// Per-identity accumulator owned by the reducer.
#[derive(Debug, Clone, PartialEq)]
pub struct LabeledMessage {
    pub time: String,
    pub location: String,
    pub account: String,
    pub message: String,
    pub best_label: Option<String>,
    /// `f32::NEG_INFINITY` until the first match lands.
    pub best_score: f32,
    pub main_category: Option<String>,
}

impl LabeledMessage {
    pub fn unlabeled(identity: &MessageIdentity, location: &str, message: &str) -> Self {
        Self {
            time: identity.time.clone(),
            location: location.to_string(),
            account: identity.account.clone(),
            message: message.to_string(),
            best_label: None,
            best_score: f32::NEG_INFINITY,
            main_category: None,
        }
    }

    pub fn from_payload(payload: &MessagePayload) -> Self {
        Self {
            time: payload.time.clone(),
            location: payload.location.clone(),
            account: payload.account.clone(),
            message: payload.message.clone(),
            best_label: None,
            best_score: f32::NEG_INFINITY,
            main_category: None,
        }
    }

    pub fn identity(&self) -> MessageIdentity {
        MessageIdentity::new(&self.time, &self.account)
    }

    pub fn is_labeled(&self) -> bool {
        self.best_label.is_some()
    }

    /// Export row, or `None` while unlabeled.
    pub fn to_record(&self) -> Option<LabeledRecord> {
        let label = self.best_label.clone()?;
        Some(LabeledRecord {
            time: self.time.clone(),
            location: self.location.clone(),
            account: self.account.clone(),
            message: self.message.clone(),
            label,
            main_category: self
                .main_category
                .clone()
                .unwrap_or_else(|| UNCATEGORIZED.to_string()),
            score: Some(self.best_score),
        })
    }
}

/// One row of the labeled dataset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecord {
    pub time: String,
    pub location: String,
    pub account: String,
    pub message: String,
    pub label: String,
    pub main_category: String,
    /// Present for rows produced by a run; absent in pre-labeled imports.
    /// Older exports name the column `best_score`.
    #[serde(default, alias = "best_score")]
    pub score: Option<f32>,
}

impl LabeledRecord {
    pub fn identity(&self) -> MessageIdentity {
        MessageIdentity::new(&self.time, &self.account)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_ignores_content() {
        let a = SearchMatch::new("t1", "u1", "North", "bridge down", 0.5);
        let b = SearchMatch::new("t1", "u1", "South", "different text", 0.9);
        assert_eq!(a.identity, b.identity);
        assert_ne!(a.identity, MessageIdentity::new("t1", "u2"));
    }

    #[test]
    fn test_unlabeled_message_has_no_record() {
        let message = LabeledMessage::unlabeled(&MessageIdentity::new("t1", "u1"), "loc", "msg");
        assert!(!message.is_labeled());
        assert_eq!(message.best_score, f32::NEG_INFINITY);
        assert!(message.to_record().is_none());
    }

    #[test]
    fn test_record_defaults_missing_main_category() {
        let mut message = LabeledMessage::unlabeled(&MessageIdentity::new("t1", "u1"), "loc", "msg");
        message.best_label = Some("flood".to_string());
        message.best_score = 0.4;

        let record = message.to_record().unwrap();
        assert_eq!(record.label, "flood");
        assert_eq!(record.main_category, UNCATEGORIZED);
        assert_eq!(record.score, Some(0.4));
        assert_eq!(record.identity(), MessageIdentity::new("t1", "u1"));
    }

    #[test]
    fn test_match_from_hit() {
        let hit = MessageHit {
            time: "t1".into(),
            location: "Easton".into(),
            account: "u9".into(),
            message: "power out".into(),
            label: "power".into(),
            score: 0.77,
        };
        let m = SearchMatch::from(hit);
        assert_eq!(m.identity, MessageIdentity::new("t1", "u9"));
        assert_eq!(m.location, "Easton");
        assert_eq!(m.score, 0.77);
    }
}
