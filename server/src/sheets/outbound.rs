//! Outbound push of local changes to the spreadsheet.
//!
//! [`OutboundHook`] runs inside the store's mutation path, so it only
//! enqueues. [`spawn_pusher`] drains the queue and delivers each message
//! once; failures are logged and dropped.

use custody_engine::{ChangeEvent, ChangeHook, HookError, Origin};
use tokio::{sync::mpsc, task::JoinHandle};

use super::{PushMessage, SheetClient};

pub struct OutboundHook {
    sender: mpsc::UnboundedSender<PushMessage>,
}

impl OutboundHook {
    pub fn new(sender: mpsc::UnboundedSender<PushMessage>) -> Self {
        Self { sender }
    }
}

impl ChangeHook for OutboundHook {
    fn name(&self) -> &str {
        "sheet-push"
    }

    fn on_change(&mut self, event: &ChangeEvent) -> Result<(), HookError> {
        // Imported rows already live in the sheet
        if event.origin == Origin::Remote {
            return Ok(());
        }
        self.sender
            .send(PushMessage::from_event(event))
            .map_err(|_| "push queue closed".into())
    }
}

/// Deliver queued messages until every sender is dropped.
pub fn spawn_pusher(
    client: SheetClient,
    mut receiver: mpsc::UnboundedReceiver<PushMessage>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(message) = receiver.recv().await {
            match client.push(&message).await {
                Ok(()) => tracing::debug!(kind = %message.kind, "pushed change to sheet"),
                Err(e) => tracing::warn!(kind = %message.kind, "sheet push failed: {}", e),
            }
        }
        tracing::debug!("sheet pusher stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use custody_engine::{Change, NewItem};

    fn event(origin: Origin) -> ChangeEvent {
        ChangeEvent {
            change: Change::ItemDeleted { id: "item_1".into() },
            origin,
            timestamp: 5,
        }
    }

    #[test]
    fn only_local_changes_are_queued() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut hook = OutboundHook::new(tx);

        hook.on_change(&event(Origin::Remote)).unwrap();
        hook.on_change(&event(Origin::Local)).unwrap();

        let message = rx.try_recv().unwrap();
        assert_eq!(message.kind, "delete_inventory");
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn closed_queue_is_reported() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let mut hook = OutboundHook::new(tx);
        assert!(hook.on_change(&event(Origin::Local)).is_err());

        // The store still commits when the hook fails
        let mut store = custody_engine::RecordStore::new(
            Box::new(custody_engine::MemoryStorage::new()),
            custody_engine::StoreMode::Local,
        );
        store.register_hook(Box::new(hook));
        assert!(store.add_item(NewItem::new("Drill", 1, 1), 1).is_ok());
        assert_eq!(store.items().len(), 1);
    }
}
