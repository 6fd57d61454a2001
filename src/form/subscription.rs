use std::sync::Arc;

use tracing::trace;

use super::path::FieldPath;
use super::store::{FormResult, FormStore, read_lock, write_lock};

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SubscriptionId(u64);

type Subscriber = Arc<dyn Fn(&FieldPath) + Send + Sync>;

#[derive(Default)]
pub(super) struct SubscriberRegistry {
    next_id: u64,
    entries: Vec<(SubscriptionId, Subscriber)>,
}

impl SubscriberRegistry {
    fn insert(&mut self, subscriber: Subscriber) -> SubscriptionId {
        self.next_id += 1;
        let id = SubscriptionId(self.next_id);
        self.entries.push((id, subscriber));
        id
    }

    fn remove(&mut self, id: SubscriptionId) -> bool {
        let before = self.entries.len();
        self.entries.retain(|(entry, _)| *entry != id);
        self.entries.len() != before
    }

    fn snapshot(&self) -> Vec<Subscriber> {
        self.entries
            .iter()
            .map(|(_, subscriber)| subscriber.clone())
            .collect()
    }
}

impl FormStore {
    /// Registers `callback` to run after every committed value change.
    ///
    /// Callbacks run synchronously in registration order with the changed
    /// path, and may read the store.
    pub fn subscribe(
        &self,
        callback: impl Fn(&FieldPath) + Send + Sync + 'static,
    ) -> FormResult<SubscriptionId> {
        let mut subscribers = write_lock(&self.subscribers, "registering subscriber")?;
        Ok(subscribers.insert(Arc::new(callback)))
    }

    pub fn unsubscribe(&self, id: SubscriptionId) -> FormResult<bool> {
        Ok(write_lock(&self.subscribers, "removing subscriber")?.remove(id))
    }

    pub(super) fn notify(&self, path: &FieldPath) -> FormResult<()> {
        let subscribers = read_lock(&self.subscribers, "reading subscribers")?.snapshot();
        trace!(path = %path, subscribers = subscribers.len(), "notifying subscribers");
        for subscriber in subscribers {
            subscriber(path);
        }
        Ok(())
    }
}
