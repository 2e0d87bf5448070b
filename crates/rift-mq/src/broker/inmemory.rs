//! In-memory broker.
//!
//! Queues deliver each message to exactly one of the competing consumers;
//! topics fan out to every consumer subscribed at publish time. Deliveries are
//! transactional: a rolled back (or dropped) delivery goes back to the
//! destination until `max_redeliveries` is exceeded, then it is dead-lettered.

use super::{
    Acknowledge, BrokerAdapter, BrokerError, BrokerFlavor, Delivery, InboundMessage,
    MessageConsumer, OutboundMessage,
};
use crate::stub::{Destination, DestinationType};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Notify};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Options for [`InMemoryBroker`]
#[derive(Debug, Clone)]
pub struct InMemoryBrokerOptions {
    pub flavor: BrokerFlavor,
    /// Queue manager used in IBM MQ style addresses
    pub queue_manager: String,
    pub max_redeliveries: u32,
}

impl Default for InMemoryBrokerOptions {
    fn default() -> Self {
        Self {
            flavor: BrokerFlavor::ActiveMq,
            queue_manager: "QM1".to_string(),
            max_redeliveries: 6,
        }
    }
}

/// Buffered message stream with a pending counter
struct Mailbox {
    tx: mpsc::UnboundedSender<InboundMessage>,
    rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<InboundMessage>>,
    pending: AtomicUsize,
}

impl Mailbox {
    fn new() -> Arc<Self> {
        let (tx, rx) = mpsc::unbounded_channel();
        Arc::new(Self {
            tx,
            rx: tokio::sync::Mutex::new(rx),
            pending: AtomicUsize::new(0),
        })
    }

    fn push(&self, message: InboundMessage) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        if self.tx.send(message).is_err() {
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }

    fn len(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }
}

struct Shared {
    options: InMemoryBrokerOptions,
    queues: Mutex<HashMap<String, Arc<Mailbox>>>,
    /// Topic name -> consumer id -> consumer inbox
    topics: Mutex<HashMap<String, HashMap<u64, Arc<Mailbox>>>>,
    sent: Mutex<Vec<OutboundMessage>>,
    sent_notify: Notify,
    dead_letters: Mutex<Vec<InboundMessage>>,
    unreachable: Mutex<HashSet<String>>,
    next_consumer_id: AtomicU64,
    open_consumers: AtomicUsize,
}

impl Shared {
    fn queue(&self, name: &str) -> Arc<Mailbox> {
        let mut queues = self.queues.lock();
        Arc::clone(queues.entry(name.to_string()).or_insert_with(Mailbox::new))
    }

    fn is_unreachable(&self, name: &str) -> bool {
        self.unreachable.lock().contains(name)
    }

    fn dead_letter(&self, message: InboundMessage) {
        warn!(
            destination = %message.destination,
            message_id = ?message.message_id,
            redeliveries = message.redelivery_count,
            "Redelivery limit reached, moving message to dead letter queue"
        );
        self.dead_letters.lock().push(message);
    }
}

/// Process-local broker implementing [`BrokerAdapter`]
#[derive(Clone)]
pub struct InMemoryBroker {
    shared: Arc<Shared>,
}

impl InMemoryBroker {
    pub fn new(options: InMemoryBrokerOptions) -> Self {
        Self {
            shared: Arc::new(Shared {
                options,
                queues: Mutex::new(HashMap::new()),
                topics: Mutex::new(HashMap::new()),
                sent: Mutex::new(Vec::new()),
                sent_notify: Notify::new(),
                dead_letters: Mutex::new(Vec::new()),
                unreachable: Mutex::new(HashSet::new()),
                next_consumer_id: AtomicU64::new(1),
                open_consumers: AtomicUsize::new(0),
            }),
        }
    }

    pub fn with_flavor(flavor: BrokerFlavor) -> Self {
        Self::new(InMemoryBrokerOptions {
            flavor,
            ..Default::default()
        })
    }

    pub fn flavor(&self) -> BrokerFlavor {
        self.shared.options.flavor
    }

    /// Put a message on a destination as an external producer would.
    ///
    /// The destination address and message id are filled in the way the
    /// configured broker flavour reports them. Returns the message id.
    pub fn publish(&self, destination: &Destination, mut message: InboundMessage) -> String {
        let options = &self.shared.options;
        message.destination = options
            .flavor
            .render_address(destination, &options.queue_manager);
        let message_id = message
            .message_id
            .get_or_insert_with(|| format!("ID:{}", uuid::Uuid::new_v4()))
            .clone();

        match destination.kind {
            DestinationType::Queue => self.shared.queue(&destination.name).push(message),
            DestinationType::Topic => {
                let topics = self.shared.topics.lock();
                match topics.get(&destination.name) {
                    Some(subscribers) if !subscribers.is_empty() => {
                        for inbox in subscribers.values() {
                            inbox.push(message.clone());
                        }
                    }
                    _ => debug!(topic = %destination.name, "Published to topic without subscribers"),
                }
            }
        }
        message_id
    }

    /// Make a destination refuse consumers and sends
    pub fn set_unreachable(&self, name: &str, unreachable: bool) {
        let mut set = self.shared.unreachable.lock();
        if unreachable {
            set.insert(name.to_string());
        } else {
            set.remove(name);
        }
    }

    /// Everything sent through [`BrokerAdapter::send`]
    pub fn sent_messages(&self) -> Vec<OutboundMessage> {
        self.shared.sent.lock().clone()
    }

    /// Wait until at least `count` messages were sent or the timeout elapses
    pub async fn wait_for_sent(&self, count: usize, timeout: Duration) -> Vec<OutboundMessage> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let notified = self.shared.sent_notify.notified();
            {
                let sent = self.shared.sent.lock();
                if sent.len() >= count {
                    return sent.clone();
                }
            }
            if tokio::time::timeout_at(deadline, notified).await.is_err() {
                return self.sent_messages();
            }
        }
    }

    pub fn dead_letters(&self) -> Vec<InboundMessage> {
        self.shared.dead_letters.lock().clone()
    }

    /// Messages waiting on a queue
    pub fn queue_depth(&self, name: &str) -> usize {
        self.shared
            .queues
            .lock()
            .get(name)
            .map(|q| q.len())
            .unwrap_or(0)
    }

    pub fn open_consumer_count(&self) -> usize {
        self.shared.open_consumers.load(Ordering::SeqCst)
    }
}

impl Default for InMemoryBroker {
    fn default() -> Self {
        Self::new(InMemoryBrokerOptions::default())
    }
}

#[async_trait]
impl BrokerAdapter for InMemoryBroker {
    fn name(&self) -> &str {
        self.shared.options.flavor.as_str()
    }

    async fn open_consumer(
        &self,
        destination: &Destination,
    ) -> Result<Arc<dyn MessageConsumer>, BrokerError> {
        if self.shared.is_unreachable(&destination.name) {
            return Err(BrokerError::Unreachable(destination.to_string()));
        }

        let id = self.shared.next_consumer_id.fetch_add(1, Ordering::SeqCst);
        let mailbox = match destination.kind {
            DestinationType::Queue => self.shared.queue(&destination.name),
            DestinationType::Topic => {
                let inbox = Mailbox::new();
                self.shared
                    .topics
                    .lock()
                    .entry(destination.name.clone())
                    .or_default()
                    .insert(id, Arc::clone(&inbox));
                inbox
            }
        };
        self.shared.open_consumers.fetch_add(1, Ordering::SeqCst);
        debug!(consumer_id = id, destination = %destination, "Opened in-memory consumer");

        Ok(Arc::new(InMemoryConsumer {
            id,
            destination: destination.clone(),
            mailbox,
            closed: CancellationToken::new(),
            shared: Arc::clone(&self.shared),
        }))
    }

    async fn send(&self, message: OutboundMessage) -> Result<(), BrokerError> {
        if self.shared.is_unreachable(&message.destination.name) {
            return Err(BrokerError::SendFailed {
                destination: message.destination.to_string(),
                reason: "destination unreachable".to_string(),
            });
        }

        let mut inbound = InboundMessage::new(String::new(), message.payload.clone());
        inbound.properties = message.headers.clone();
        inbound.correlation_id = message.correlation_id.clone();
        inbound.reply_to = message.reply_to.clone();
        self.publish(&message.destination, inbound);

        self.shared.sent.lock().push(message);
        self.shared.sent_notify.notify_waiters();
        Ok(())
    }
}

struct InMemoryConsumer {
    id: u64,
    destination: Destination,
    mailbox: Arc<Mailbox>,
    closed: CancellationToken,
    shared: Arc<Shared>,
}

#[async_trait]
impl MessageConsumer for InMemoryConsumer {
    async fn receive(&self) -> Option<Delivery> {
        let mailbox = Arc::clone(&self.mailbox);
        let message = tokio::select! {
            _ = self.closed.cancelled() => return None,
            message = async {
                let mut rx = mailbox.rx.lock().await;
                rx.recv().await
            } => message?,
        };
        mailbox.pending.fetch_sub(1, Ordering::SeqCst);

        let ack = InMemoryAck {
            message: Some(message.clone()),
            mailbox,
            shared: Arc::clone(&self.shared),
        };
        Some(Delivery::new(message, Box::new(ack)))
    }

    fn backlog(&self) -> usize {
        self.mailbox.len()
    }

    fn close(&self) {
        if self.closed.is_cancelled() {
            return;
        }
        self.closed.cancel();
        if self.destination.kind.is_topic() {
            if let Some(subscribers) = self.shared.topics.lock().get_mut(&self.destination.name) {
                subscribers.remove(&self.id);
            }
        }
        self.shared.open_consumers.fetch_sub(1, Ordering::SeqCst);
        debug!(consumer_id = self.id, destination = %self.destination, "Closed in-memory consumer");
    }
}

impl Drop for InMemoryConsumer {
    fn drop(&mut self) {
        self.close();
    }
}

/// Transaction of one in-memory delivery. Dropping it uncommitted rolls back.
struct InMemoryAck {
    message: Option<InboundMessage>,
    mailbox: Arc<Mailbox>,
    shared: Arc<Shared>,
}

impl InMemoryAck {
    fn requeue(&mut self) {
        let Some(mut message) = self.message.take() else {
            return;
        };
        message.redelivery_count += 1;
        if message.redelivery_count > self.shared.options.max_redeliveries {
            self.shared.dead_letter(message);
        } else {
            debug!(
                message_id = ?message.message_id,
                redeliveries = message.redelivery_count,
                "Rolling back delivery"
            );
            self.mailbox.push(message);
        }
    }
}

impl Acknowledge for InMemoryAck {
    fn commit(mut self: Box<Self>) {
        self.message = None;
    }

    fn rollback(mut self: Box<Self>) {
        self.requeue();
    }
}

impl Drop for InMemoryAck {
    fn drop(&mut self) {
        self.requeue();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn text(delivery: &Delivery) -> String {
        delivery.message.text_content()
    }

    #[tokio::test]
    async fn test_queue_delivers_to_one_consumer() {
        let broker = InMemoryBroker::default();
        let dest = Destination::queue("ORDERS");
        let a = broker.open_consumer(&dest).await.unwrap();
        let b = broker.open_consumer(&dest).await.unwrap();

        broker.publish(&dest, InboundMessage::new("", "one"));
        let delivery = a.receive().await.unwrap();
        assert_eq!(text(&delivery), "one");
        assert_eq!(delivery.message.destination, "queue://ORDERS");
        delivery.commit();

        assert_eq!(a.backlog(), 0);
        assert_eq!(b.backlog(), 0);
    }

    #[tokio::test]
    async fn test_topic_fans_out() {
        let broker = InMemoryBroker::default();
        let dest = Destination::topic("EVENTS");
        let a = broker.open_consumer(&dest).await.unwrap();
        let b = broker.open_consumer(&dest).await.unwrap();

        broker.publish(&dest, InboundMessage::new("", "hello"));
        assert_eq!(text(&a.receive().await.unwrap()), "hello");
        assert_eq!(text(&b.receive().await.unwrap()), "hello");
    }

    #[tokio::test]
    async fn test_rollback_redelivers_with_count() {
        let broker = InMemoryBroker::default();
        let dest = Destination::queue("ORDERS");
        let consumer = broker.open_consumer(&dest).await.unwrap();

        broker.publish(&dest, InboundMessage::new("", "retry me"));
        consumer.receive().await.unwrap().rollback();

        let again = consumer.receive().await.unwrap();
        assert_eq!(again.message.redelivery_count, 1);
        again.commit();
        assert_eq!(broker.queue_depth("ORDERS"), 0);
    }

    #[tokio::test]
    async fn test_dropped_delivery_is_rolled_back() {
        let broker = InMemoryBroker::default();
        let dest = Destination::queue("ORDERS");
        let consumer = broker.open_consumer(&dest).await.unwrap();

        broker.publish(&dest, InboundMessage::new("", "lost?"));
        drop(consumer.receive().await.unwrap());
        assert_eq!(broker.queue_depth("ORDERS"), 1);
    }

    #[tokio::test]
    async fn test_dead_letter_after_max_redeliveries() {
        let broker = InMemoryBroker::new(InMemoryBrokerOptions {
            max_redeliveries: 1,
            ..Default::default()
        });
        let dest = Destination::queue("ORDERS");
        let consumer = broker.open_consumer(&dest).await.unwrap();

        broker.publish(&dest, InboundMessage::new("", "poison"));
        consumer.receive().await.unwrap().rollback();
        consumer.receive().await.unwrap().rollback();

        assert_eq!(broker.dead_letters().len(), 1);
        assert_eq!(broker.queue_depth("ORDERS"), 0);
    }

    #[tokio::test]
    async fn test_closed_consumer_returns_none() {
        let broker = InMemoryBroker::default();
        let consumer = broker
            .open_consumer(&Destination::queue("ORDERS"))
            .await
            .unwrap();
        assert_eq!(broker.open_consumer_count(), 1);
        broker.close_consumer(Arc::clone(&consumer)).await;
        assert!(consumer.receive().await.is_none());
        assert_eq!(broker.open_consumer_count(), 0);
    }

    #[tokio::test]
    async fn test_unreachable_destination() {
        let broker = InMemoryBroker::default();
        broker.set_unreachable("DOWN", true);
        let result = broker.open_consumer(&Destination::queue("DOWN")).await;
        assert!(matches!(result, Err(BrokerError::Unreachable(_))));

        let send = broker
            .send(OutboundMessage::new(Destination::queue("DOWN"), "x"))
            .await;
        assert!(matches!(send, Err(BrokerError::SendFailed { .. })));
    }

    #[tokio::test]
    async fn test_send_records_and_routes() {
        let broker = InMemoryBroker::with_flavor(BrokerFlavor::IbmMq);
        let dest = Destination::queue("REPLIES");
        let mut message = OutboundMessage::new(dest.clone(), "ACK");
        message.correlation_id = Some("c-1".to_string());
        broker.send(message).await.unwrap();

        let sent = broker.wait_for_sent(1, Duration::from_millis(100)).await;
        assert_eq!(sent.len(), 1);

        let consumer = broker.open_consumer(&dest).await.unwrap();
        let delivery = consumer.receive().await.unwrap();
        assert_eq!(delivery.message.destination, "queue:///QM1/REPLIES");
        assert_eq!(delivery.message.correlation_id.as_deref(), Some("c-1"));
        delivery.commit();
    }

    #[test]
    fn test_extract_props_adds_identity_headers() {
        let broker = InMemoryBroker::default();
        let message = InboundMessage::new("queue://A", "x")
            .with_property("region", "EU")
            .with_message_id("ID:1")
            .with_correlation_id("C:1");
        let props = broker.extract_props(&message);
        assert_eq!(props.get("region").map(String::as_str), Some("EU"));
        assert_eq!(props.get("JMSMessageID").map(String::as_str), Some("ID:1"));
        assert_eq!(props.get("JMSCorrelationID").map(String::as_str), Some("C:1"));
    }
}
