use std::collections::HashMap;
use std::time::Duration;

use rdkafka::config::ClientConfig;
use rdkafka::consumer::{CommitMode, Consumer, StreamConsumer};
use rdkafka::message::Message;
use rdkafka::{Offset, TopicPartitionList};
use tracing::debug;

use crate::bus::{Bus, OffsetReset, RawMessage};
use crate::error::{Error, Result};

/// Production [`Bus`] backed by `rdkafka`'s async `StreamConsumer`.
///
/// Grounded in the source's `KafkaConsumer` construction
/// (`message_consumer_kafka.py::MessageConsumer.__init__`):
/// `enable.auto.commit=false` and the topic's `auto.offset.reset` chosen
/// from `ignore_initial_delay` by the caller.
pub struct KafkaBus {
    consumer: StreamConsumer,
}

impl KafkaBus {
    pub fn new(
        bootstrap_servers: &[String],
        topic: &str,
        group_id: &str,
        offset_reset: OffsetReset,
    ) -> Result<Self> {
        if bootstrap_servers.is_empty() {
            return Err(Error::Configuration(
                "bootstrap_servers must be a non-empty list of broker addresses".to_string(),
            ));
        }
        let reset = match offset_reset {
            OffsetReset::Earliest => "earliest",
            OffsetReset::Latest => "latest",
        };
        let consumer: StreamConsumer = ClientConfig::new()
            .set("bootstrap.servers", bootstrap_servers.join(","))
            .set("group.id", group_id)
            .set("enable.auto.commit", "false")
            .set("auto.offset.reset", reset)
            .create()?;
        consumer.subscribe(&[topic])?;
        debug!(topic, group_id, reset, "subscribed to kafka topic");
        Ok(Self { consumer })
    }
}

#[async_trait::async_trait]
impl Bus for KafkaBus {
    async fn poll(&self, timeout: Duration) -> Result<Option<RawMessage>> {
        match tokio::time::timeout(timeout, self.consumer.recv()).await {
            Ok(Ok(borrowed)) => {
                let key = borrowed
                    .key()
                    .map(|bytes| String::from_utf8_lossy(bytes).into_owned());
                let payload = borrowed.payload().unwrap_or(&[]).to_vec();
                Ok(Some(RawMessage {
                    partition: borrowed.partition(),
                    offset: borrowed.offset(),
                    key,
                    payload,
                }))
            }
            Ok(Err(e)) => Err(Error::from(e)),
            Err(_elapsed) => Ok(None),
        }
    }

    fn commit(&self, message: &RawMessage) -> Result<()> {
        let mut tpl = TopicPartitionList::new();
        let topic = self.consumer.subscription()?;
        let topic_name = topic
            .elements()
            .first()
            .map(|e| e.topic().to_string())
            .unwrap_or_default();
        tpl.add_partition_offset(&topic_name, message.partition, Offset::Offset(message.offset + 1))?;
        self.consumer.commit(&tpl, CommitMode::Sync)?;
        Ok(())
    }

    fn seek_to_end(&self) -> Result<()> {
        let subscription = self.consumer.subscription()?;
        for element in subscription.elements() {
            let (_, high) = self
                .consumer
                .fetch_watermarks(element.topic(), element.partition(), Duration::from_secs(5))?;
            self.consumer
                .seek(element.topic(), element.partition(), Offset::Offset(high), Duration::from_secs(5))?;
        }
        let assignment = self.consumer.assignment()?;
        self.consumer.commit(&assignment, CommitMode::Sync)?;
        Ok(())
    }

    fn end_offsets(&self) -> Result<HashMap<i32, i64>> {
        let assignment = self.consumer.assignment()?;
        let mut out = HashMap::new();
        for element in assignment.elements() {
            let (_, high) = self
                .consumer
                .fetch_watermarks(element.topic(), element.partition(), Duration::from_secs(5))?;
            out.insert(element.partition(), high);
        }
        Ok(out)
    }

    fn committed_offsets(&self) -> Result<HashMap<i32, i64>> {
        let committed = self.consumer.committed(Duration::from_secs(5))?;
        let mut out = HashMap::new();
        for element in committed.elements() {
            let offset = match element.offset() {
                Offset::Offset(o) => o,
                _ => 0,
            };
            out.insert(element.partition(), offset);
        }
        Ok(out)
    }

    fn assignment(&self) -> Result<Vec<i32>> {
        let assignment = self.consumer.assignment()?;
        Ok(assignment.elements().iter().map(|e| e.partition()).collect())
    }

    fn close(&self) {
        debug!("closing kafka consumer");
    }
}
