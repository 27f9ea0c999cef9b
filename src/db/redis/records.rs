use futures::StreamExt;
use redis::aio::MultiplexedConnection;
use redis::{AsyncCommands, Client};
use std::collections::HashMap;
use std::fmt::Display;
use tokio::sync::mpsc;

use crate::{
    error::{AppError, AppResult},
    models::{FieldUpdate, IdentityId, ListKind, MovieEntry, Record},
    services::sync::{RecordSubscription, RecordSynchronizer, SUBSCRIPTION_BUFFER},
};

/// Redis keys used by the record store
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RecordKey {
    /// Hash holding one JSON-encoded field per list
    Record(IdentityId),
    /// Pub/sub channel announcing record changes
    Changes(IdentityId),
}

impl Display for RecordKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RecordKey::Record(id) => write!(f, "record:{}", id),
            RecordKey::Changes(id) => write!(f, "record-changed:{}", id),
        }
    }
}

fn persist_error(e: impl Display) -> AppError {
    AppError::PersistFailure(e.to_string())
}

/// Record store backed by Redis hashes and pub/sub
///
/// Each write runs as a MULTI/EXEC transaction that replaces the touched hash
/// fields and publishes on the record's change channel. Subscribers reload the
/// hash on every message, so they always converge on the latest stored value.
#[derive(Clone)]
pub struct RedisRecordStore {
    client: Client,
}

impl RedisRecordStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    async fn connection(&self) -> AppResult<MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(persist_error)
    }

    /// Reads the full record, `None` when the identity has none yet
    async fn load_record(
        conn: &mut MultiplexedConnection,
        key: &RecordKey,
    ) -> AppResult<Option<Record>> {
        let fields: HashMap<String, String> = conn
            .hgetall(key.to_string())
            .await
            .map_err(persist_error)?;

        if fields.is_empty() {
            return Ok(None);
        }

        Ok(Some(decode_record(&fields)?))
    }
}

/// Builds a record from its hash fields; absent lists are empty
fn decode_record(fields: &HashMap<String, String>) -> AppResult<Record> {
    let mut record = Record::default();

    for (name, json) in fields {
        let Some(kind) = ListKind::from_field_name(name) else {
            continue;
        };
        let entries: Vec<MovieEntry> = serde_json::from_str(json).map_err(|e| {
            AppError::Internal(format!("Corrupt {} field in record: {}", kind, e))
        })?;
        record.apply(FieldUpdate::new(kind, entries));
    }

    Ok(record)
}

#[async_trait::async_trait]
impl RecordSynchronizer for RedisRecordStore {
    async fn subscribe(&self, identity: &IdentityId) -> AppResult<RecordSubscription> {
        let mut pubsub = self.client.get_async_pubsub().await.map_err(persist_error)?;
        pubsub
            .subscribe(RecordKey::Changes(identity.clone()).to_string())
            .await
            .map_err(persist_error)?;

        // Subscribe before the first read so no change between the two is missed
        let mut conn = self.connection().await?;
        let key = RecordKey::Record(identity.clone());
        let initial = Self::load_record(&mut conn, &key).await?;

        let (tx, updates) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let subscriber = identity.clone();

        let feeder = tokio::spawn(async move {
            if let Some(record) = initial {
                if tx.send(record).await.is_err() {
                    return;
                }
            }

            let mut messages = pubsub.on_message();
            while messages.next().await.is_some() {
                match Self::load_record(&mut conn, &key).await {
                    Ok(Some(record)) => {
                        if tx.send(record).await.is_err() {
                            tracing::debug!(identity = %subscriber, "Redis record subscription closed");
                            return;
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(identity = %subscriber, error = %e, "Failed to reload record after change");
                    }
                }
            }

            // dropping `tx` ends the subscription, which the list store reports as unsynced
            tracing::error!(identity = %subscriber, "Redis change feed ended, record no longer synced");
        });

        tracing::debug!(identity = %identity, "Subscribed to record changes");

        Ok(RecordSubscription::new(updates, feeder))
    }

    async fn write_fields(
        &self,
        identity: &IdentityId,
        updates: Vec<FieldUpdate>,
    ) -> AppResult<()> {
        let key = RecordKey::Record(identity.clone()).to_string();
        let mut fields = Vec::with_capacity(updates.len());

        let mut pipe = redis::pipe();
        pipe.atomic();
        for update in &updates {
            let json = serde_json::to_string(&update.entries)
                .map_err(|e| AppError::Internal(format!("Record serialization error: {}", e)))?;
            pipe.hset(&key, update.field.field_name(), json).ignore();
            fields.push(update.field.field_name());
        }
        pipe.publish(
            RecordKey::Changes(identity.clone()).to_string(),
            fields.join(","),
        )
        .ignore();

        let mut conn = self.connection().await?;
        let _: () = pipe.query_async(&mut conn).await.map_err(|e| {
            tracing::error!(identity = %identity, error = %e, "Record write failed");
            persist_error(e)
        })?;

        tracing::debug!(identity = %identity, fields = %fields.join(","), "Record fields written");

        Ok(())
    }

    async fn ensure_record(&self, identity: &IdentityId) -> AppResult<()> {
        let key = RecordKey::Record(identity.clone()).to_string();

        let mut pipe = redis::pipe();
        pipe.atomic();
        for kind in ListKind::ALL {
            pipe.hset_nx(&key, kind.field_name(), "[]").ignore();
        }
        pipe.publish(RecordKey::Changes(identity.clone()).to_string(), "created")
            .ignore();

        let mut conn = self.connection().await?;
        let _: () = pipe.query_async(&mut conn).await.map_err(persist_error)?;

        Ok(())
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}
