use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use qdrant_client::Qdrant;
use qdrant_client::qdrant::{
    self, CreateCollectionBuilder, Distance, PointId, PointStruct, ScrollPointsBuilder,
    SearchPointsBuilder, UpsertPointsBuilder, Value as QdrantValue, VectorParamsBuilder,
};
use tracing::{debug, info, instrument};

use super::QdrantConfig;
use crate::error::{VectorError, VectorResult};
use crate::models::{IndexedMessage, MessagePayload, ScoredMessage, SearchQuery};
use crate::repository::MessageRepository;

/// Qdrant-backed implementation of MessageRepository
pub struct QdrantRepository {
    client: Qdrant,
    collection: String,
}

impl QdrantRepository {
    pub async fn new(config: QdrantConfig) -> VectorResult<Self> {
        let mut builder = Qdrant::from_url(&config.url);

        if let Some(api_key) = config.api_key {
            builder = builder.api_key(api_key);
        }

        builder = builder.timeout(Duration::from_secs(config.timeout_secs));

        let client = builder
            .build()
            .map_err(|e| VectorError::Config(format!("Failed to build client: {}", e)))?;

        Ok(Self {
            client,
            collection: config.collection,
        })
    }

    pub fn from_client(client: Qdrant, collection: impl Into<String>) -> Self {
        Self {
            client,
            collection: collection.into(),
        }
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    fn point_id_to_string(point_id: Option<&PointId>) -> String {
        match point_id.and_then(|p| p.point_id_options.as_ref()) {
            Some(qdrant::point_id::PointIdOptions::Uuid(uuid)) => uuid.clone(),
            Some(qdrant::point_id::PointIdOptions::Num(num)) => num.to_string(),
            None => String::new(),
        }
    }
}

/// Decode a stored payload. Returns `None` for points stored without one.
pub(crate) fn payload_from_qdrant(payload: &HashMap<String, QdrantValue>) -> Option<MessagePayload> {
    if payload.is_empty() {
        return None;
    }

    let field = |key: &str| {
        payload
            .get(key)
            .and_then(qdrant_value_to_string)
            .unwrap_or_default()
    };

    Some(MessagePayload {
        time: field("time"),
        location: field("location"),
        account: field("account"),
        message: field("message"),
    })
}

/// Encode a message for storage. Fields are always written as strings.
pub(crate) fn payload_to_qdrant(
    payload: MessagePayload,
    embedding_model: String,
) -> HashMap<String, QdrantValue> {
    HashMap::from([
        ("time".to_string(), QdrantValue::from(payload.time)),
        ("location".to_string(), QdrantValue::from(payload.location)),
        ("account".to_string(), QdrantValue::from(payload.account)),
        ("message".to_string(), QdrantValue::from(payload.message)),
        ("embedding_model".to_string(), QdrantValue::from(embedding_model)),
    ])
}

/// Scalars are rendered as text; the corpus was ingested from CSV, so a
/// numeric account id and a string account id name the same sender.
fn qdrant_value_to_string(val: &QdrantValue) -> Option<String> {
    use qdrant::value::Kind;

    match &val.kind {
        Some(Kind::StringValue(s)) => Some(s.clone()),
        Some(Kind::IntegerValue(i)) => Some(i.to_string()),
        Some(Kind::DoubleValue(f)) => Some(f.to_string()),
        Some(Kind::BoolValue(b)) => Some(b.to_string()),
        _ => None,
    }
}

#[async_trait]
impl MessageRepository for QdrantRepository {
    #[instrument(skip(self, query), fields(collection = %self.collection, limit = query.limit))]
    async fn search(&self, query: SearchQuery) -> VectorResult<Vec<ScoredMessage>> {
        let mut builder =
            SearchPointsBuilder::new(&self.collection, query.vector, query.limit as u64);

        if let Some(threshold) = query.score_threshold {
            builder = builder.score_threshold(threshold);
        }

        builder = builder.with_payload(query.with_payloads);

        let response = self.client.search_points(builder).await?;

        let mut hits = Vec::with_capacity(response.result.len());
        for point in response.result {
            let Some(payload) = payload_from_qdrant(&point.payload) else {
                debug!("Skipping point without payload");
                continue;
            };
            hits.push(ScoredMessage {
                id: Self::point_id_to_string(point.id.as_ref()),
                score: point.score,
                payload,
            });
        }

        Ok(hits)
    }

    #[instrument(skip(self), fields(collection = %self.collection))]
    async fn scroll_all(&self, page_size: u32) -> VectorResult<Vec<MessagePayload>> {
        let mut payloads = Vec::new();
        let mut offset: Option<PointId> = None;

        loop {
            let mut builder = ScrollPointsBuilder::new(&self.collection)
                .limit(page_size)
                .with_payload(true)
                .with_vectors(false);

            if let Some(next) = offset.take() {
                builder = builder.offset(next);
            }

            let page = self.client.scroll(builder).await?;
            debug!(points = page.result.len(), "Fetched scroll page");

            payloads.extend(
                page.result
                    .iter()
                    .filter_map(|point| payload_from_qdrant(&point.payload)),
            );

            match page.next_page_offset {
                Some(next) => offset = Some(next),
                None => break,
            }
        }

        info!(points = payloads.len(), "Loaded message corpus");
        Ok(payloads)
    }

    async fn health_check(&self) -> VectorResult<()> {
        self.client.health_check().await?;
        Ok(())
    }

    #[instrument(skip(self), fields(collection = %self.collection))]
    async fn ensure_collection(&self, dimension: u64) -> VectorResult<bool> {
        if self.client.collection_exists(&self.collection).await? {
            debug!("Collection already exists");
            return Ok(false);
        }

        let builder = CreateCollectionBuilder::new(&self.collection)
            .vectors_config(VectorParamsBuilder::new(dimension, Distance::Cosine));
        self.client.create_collection(builder).await?;

        info!(dimension, "Created collection");
        Ok(true)
    }

    #[instrument(skip(self, points), fields(collection = %self.collection, points = points.len()))]
    async fn upsert_batch(&self, points: Vec<IndexedMessage>) -> VectorResult<usize> {
        if points.is_empty() {
            return Ok(0);
        }

        let points: Vec<PointStruct> = points
            .into_iter()
            .map(|p| {
                PointStruct::new(
                    p.id,
                    p.vector,
                    payload_to_qdrant(p.payload, p.embedding_model),
                )
            })
            .collect();
        let count = points.len();

        let builder = UpsertPointsBuilder::new(&self.collection, points).wait(true);
        self.client.upsert_points(builder).await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn value(s: &str) -> QdrantValue {
        QdrantValue::from(s.to_string())
    }

    #[test]
    fn test_payload_decoding_reads_string_fields() {
        let payload = HashMap::from([
            ("time".to_string(), value("2020-04-06 00:00:00")),
            ("location".to_string(), value("Old Town")),
            ("account".to_string(), value("Opportunities2")),
            ("message".to_string(), value("smell gas near the bridge")),
        ]);

        let decoded = payload_from_qdrant(&payload).unwrap();
        assert_eq!(decoded.time, "2020-04-06 00:00:00");
        assert_eq!(decoded.location, "Old Town");
        assert_eq!(decoded.account, "Opportunities2");
        assert_eq!(decoded.message, "smell gas near the bridge");
    }

    #[test]
    fn test_payload_decoding_defaults_missing_and_renders_numbers() {
        let payload = HashMap::from([
            ("time".to_string(), value("t1")),
            ("account".to_string(), QdrantValue::from(4521_i64)),
        ]);

        let decoded = payload_from_qdrant(&payload).unwrap();
        assert_eq!(decoded.account, "4521");
        assert_eq!(decoded.location, "");
        assert_eq!(decoded.message, "");
    }

    #[test]
    fn test_stored_payload_decodes_back() {
        let message = MessagePayload::new("2020-04-06 00:00:00", "Old Town", "u1", "smell gas");
        let encoded = payload_to_qdrant(message.clone(), "all-MiniLM-L12-v2".to_string());

        assert_eq!(
            encoded.get("embedding_model").and_then(qdrant_value_to_string),
            Some("all-MiniLM-L12-v2".to_string())
        );
        assert_eq!(payload_from_qdrant(&encoded), Some(message));
    }

    #[test]
    fn test_empty_payload_is_skipped() {
        assert!(payload_from_qdrant(&HashMap::new()).is_none());
    }

    #[test]
    fn test_point_id_rendering() {
        assert_eq!(
            QdrantRepository::point_id_to_string(Some(&PointId::from(42_u64))),
            "42"
        );
        assert_eq!(QdrantRepository::point_id_to_string(None), "");
    }
}
