use std::{collections::BTreeMap, sync::Mutex};

use chrono::{DateTime, Utc};
use rskafka::{
    client::{
        partition::{Compression, PartitionClient, UnknownTopicHandling},
        ClientBuilder,
    },
    record::Record,
};
use rust_client::domain::Reading;

use super::{ReadingSink, SinkError, SinkKind};

/// Stable content id for a reading, derived from meter id and timestamp.
pub fn event_id(reading: &Reading) -> String {
    let mut h = blake3::Hasher::new();
    let id = reading.meter_id.as_bytes();
    h.update(&(id.len() as u32).to_le_bytes());
    h.update(id);
    h.update(&reading.timestamp.unix_timestamp_nanos().to_le_bytes());
    h.finalize().to_hex().to_string()
}

/// Partition index for a message key. Stable across process restarts.
pub fn partition_index(key: &str, partitions: usize) -> usize {
    let digest = blake3::hash(key.as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&digest.as_bytes()[..8]);
    (u64::from_le_bytes(prefix) % partitions.max(1) as u64) as usize
}

fn record_timestamp(reading: &Reading) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(reading.timestamp.unix_timestamp(), reading.timestamp.nanosecond())
        .unwrap_or_else(Utc::now)
}

/// Kafka record for a reading: key = meter id, value = reading JSON.
pub fn encode_record(reading: &Reading) -> Result<Record, SinkError> {
    let value = serde_json::to_vec(reading)?;
    let headers = BTreeMap::from([("event_id".to_string(), event_id(reading).into_bytes())]);

    Ok(Record {
        key: Some(reading.meter_id.as_bytes().to_vec()),
        value: Some(value),
        headers,
        timestamp: record_timestamp(reading),
    })
}

/// Records waiting for the next flush, tagged with their partition index.
#[derive(Default)]
struct PendingBatch {
    records: Vec<(usize, Record)>,
}

impl PendingBatch {
    fn push(&mut self, partition: usize, record: Record) {
        self.records.push((partition, record));
    }

    fn len(&self) -> usize {
        self.records.len()
    }

    /// Empty the batch, grouping records per partition in arrival order.
    fn drain_grouped(&mut self, partitions: usize) -> Vec<Vec<Record>> {
        let mut groups: Vec<Vec<Record>> = (0..partitions.max(1)).map(|_| Vec::new()).collect();
        let last = groups.len() - 1;
        for (idx, record) in self.records.drain(..) {
            groups[idx.min(last)].push(record);
        }
        groups
    }
}

/// Publishes readings to a Kafka topic.
///
/// `deliver` only serializes and buffers; the buffered records of a tick are
/// produced together by `flush`, one request per partition.
pub struct KafkaSink {
    topic: String,
    /// Partition id and client, indexed by `partition_index`.
    partitions: Vec<(i32, PartitionClient)>,
    pending: Mutex<PendingBatch>,
}

impl KafkaSink {
    pub async fn connect(bootstrap_servers: &[String], topic: &str) -> Result<Self, SinkError> {
        if bootstrap_servers.is_empty() {
            return Err(SinkError::Unavailable("no Kafka bootstrap servers configured".to_string()));
        }

        let client = ClientBuilder::new(bootstrap_servers.to_vec())
            .build()
            .await
            .map_err(|e| SinkError::Broker(format!("failed to connect to Kafka: {e}")))?;

        let topics = client
            .list_topics()
            .await
            .map_err(|e| SinkError::Broker(format!("failed to list Kafka topics: {e}")))?;

        // Unknown topics are left to broker auto-creation on partition 0.
        let partition_ids: Vec<i32> = topics
            .into_iter()
            .find(|t| t.name == topic)
            .map(|t| t.partitions.into_iter().collect())
            .filter(|ids: &Vec<i32>| !ids.is_empty())
            .unwrap_or_else(|| vec![0]);

        let mut partitions = Vec::with_capacity(partition_ids.len());
        for id in &partition_ids {
            let pc = client
                .partition_client(topic.to_string(), *id, UnknownTopicHandling::Retry)
                .await
                .map_err(|e| SinkError::Broker(format!("failed to open partition {id} of '{topic}': {e}")))?;
            partitions.push((*id, pc));
        }

        tracing::info!(topic, partitions = partitions.len(), "Kafka producer initialized");

        Ok(Self {
            topic: topic.to_string(),
            partitions,
            pending: Mutex::new(PendingBatch::default()),
        })
    }

    fn take_pending(&self) -> Vec<Vec<Record>> {
        match self.pending.lock() {
            Ok(mut guard) => guard.drain_grouped(self.partitions.len()),
            Err(poisoned) => poisoned.into_inner().drain_grouped(self.partitions.len()),
        }
    }
}

#[async_trait::async_trait]
impl ReadingSink for KafkaSink {
    fn kind(&self) -> SinkKind {
        SinkKind::Broker
    }

    async fn deliver(&self, reading: &Reading) -> Result<(), SinkError> {
        let record = encode_record(reading)?;
        let idx = partition_index(&reading.meter_id, self.partitions.len());

        let pending = {
            let mut guard = self
                .pending
                .lock()
                .map_err(|_| SinkError::Broker("pending batch lock poisoned".to_string()))?;
            guard.push(idx, record);
            guard.len()
        };
        tracing::debug!(meter_id = %reading.meter_id, pending, "reading queued for Kafka");
        Ok(())
    }

    async fn flush(&self) -> Result<(), SinkError> {
        // The lock is released here, before any network I/O.
        let groups = self.take_pending();

        let mut produced = 0usize;
        let mut failures = Vec::new();
        for ((id, pc), records) in self.partitions.iter().zip(groups) {
            if records.is_empty() {
                continue;
            }
            let count = records.len();
            match pc.produce(records, Compression::NoCompression).await {
                Ok(_) => produced += count,
                Err(e) => {
                    metrics::counter!("meter_broker_flush_failures_total").increment(1);
                    failures.push(format!("partition {id}: {e}"));
                }
            }
        }

        metrics::counter!("meter_broker_records_produced_total").increment(produced as u64);

        if failures.is_empty() {
            tracing::debug!(topic = %self.topic, produced, "Kafka batch flushed");
            Ok(())
        } else {
            Err(SinkError::Broker(failures.join("; ")))
        }
    }

    async fn close(&self) -> Result<(), SinkError> {
        // Produce anything still buffered; the client has no explicit close.
        self.flush().await
    }
}
