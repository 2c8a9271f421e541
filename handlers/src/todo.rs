use std::future::Future;
use std::io::ErrorKind;
use std::sync::Arc;
use tokio::sync::{ mpsc, oneshot, RwLock };
use uuid::Uuid;
use domains::Event;
use domains::event::{ EventKind, EventRecord };
use domains::events::Publish;
use domains::item::{ ItemDraft, ItemStatus, ToDoItem };
use domains::errors::{ MutationError, PersistenceError, PublishError };
use repos::item::Repo as ItemRepo;
use repos::event_log::Repo as EventLog;
use log::{ info, warn, error };


/// What the coordinator does when an event can't be published.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PublishMode {

    /// Log the failure and report the mutation as a success. The response
    /// never waits on the queue.
    #[default]
    FireAndForget,

    /// Wait for the queue and report a failed publication to the caller.
    /// The persisted change is kept either way.
    Strict,

}


/// The mutation coordinator binds every change made to a to-do item to
/// the event describing it.
///
/// Each mutation runs in the same order: persist the change while holding
/// the item repo's write lock, build the Event Record, append it to the
/// event log and put it on the bus, then let go of the lock. Because the
/// event is queued before the lock is released, events reach the bus in
/// the order their changes were committed. That sequence runs on a task
/// of its own so a caller that goes away half way can't cut it short.
#[derive(Debug, Clone)]
pub struct Coordinator {

    /// The entity store
    items: Arc<RwLock<ItemRepo>>,

    /// The append-only history of events
    event_log: Arc<RwLock<EventLog>>,

    /// The message bus that publishes events to the queue
    bus_tx: mpsc::UnboundedSender<Event>,

    /// Whether mutations append their events to the event log
    log_events: bool,

    /// How publication failures are reported
    mode: PublishMode,

}


/// What is left to check once the item lock has been let go
#[derive(Debug)]
struct Pending {
    log_error: Option<PersistenceError>,
    ack: Option<oneshot::Receiver<Result<(), PublishError>>>,
    bus_error: Option<PublishError>,
}


impl Coordinator {

    /// Create a coordinator on top of the repos and the bus.
    pub fn new(
        items: Arc<RwLock<ItemRepo>>,
        event_log: Arc<RwLock<EventLog>>,
        bus_tx: mpsc::UnboundedSender<Event>,
        log_events: bool,
        mode: PublishMode
    ) -> Coordinator {

        Coordinator { items, event_log, bus_tx, log_events, mode }

    }

    /// All the items belonging to a user
    pub async fn get_items(&self, user_id: Uuid) -> Vec<ToDoItem> {

        self.items.read().await.find_all(user_id)

    }

    /// All the items belonging to a user that are at a certain status
    pub async fn get_items_by_status(&self, user_id: Uuid, item_status: ItemStatus) -> Vec<ToDoItem> {

        self.items.read().await.find_by_status(user_id, item_status)

    }

    /// A single item belonging to a user
    pub async fn get_item(&self, user_id: Uuid, item_id: i64) -> Option<ToDoItem> {

        self.items.read().await.find_by_id(user_id, item_id)

    }

    /// Create an item for a user and publish an ItemAdded event.
    pub async fn create_item(&self, user_id: Uuid, draft: &ItemDraft) -> Result<ToDoItem, MutationError> {

        let (item, pending) = detached(self.clone().commit_create(user_id, draft.clone())).await?;

        self.settle(pending).await?;
        Ok(item)

    }

    /// Replace the title, status and due date of an item and publish an
    /// ItemUpdated event. Returns `None` if the user has no such item.
    pub async fn update_item(&self, user_id: Uuid, draft: &ItemDraft) -> Result<Option<ToDoItem>, MutationError> {

        let item_id = match draft.item_id {
            Some(item_id) if item_id > 0 => item_id,
            _ => return Ok(None),
        };

        let updated = detached(self.clone().commit_update(user_id, item_id, draft.clone())).await?;
        self.settle_found(updated).await

    }

    /// Change the status of an item and publish an ItemPatched event.
    /// Returns `None` if the user has no such item.
    pub async fn patch_item_status(
        &self,
        user_id: Uuid,
        item_id: i64,
        item_status: ItemStatus
    ) -> Result<Option<ToDoItem>, MutationError> {

        let patched = detached(self.clone().commit_patch(user_id, item_id, item_status)).await?;
        self.settle_found(patched).await

    }

    /// Remove an item and publish an ItemDeleted event carrying what the
    /// item looked like before it was removed. Returns `None` if the user
    /// has no such item.
    pub async fn delete_item(&self, user_id: Uuid, item_id: i64) -> Result<Option<ToDoItem>, MutationError> {

        let deleted = detached(self.clone().commit_delete(user_id, item_id)).await?;
        self.settle_found(deleted).await

    }

    async fn commit_create(self, user_id: Uuid, draft: ItemDraft) -> Result<(ToDoItem, Pending), MutationError> {

        let mut items = self.items.write().await;

        let item = ToDoItem::from_draft(user_id, draft.item_id.unwrap_or(0), &draft);
        let item = items.add(item).await.map_err(|e| {
            error!(target: "todos", "Something went wrong while creating a to-do item for user {}: {}", user_id, e);
            e
        })?;

        info!(target: "todos", "Created to-do item {} for user {}.", item.item_id, user_id);

        let pending = self.publish(EventKind::ItemAdded, &item).await;
        Ok((item, pending))

    }

    async fn commit_update(
        self,
        user_id: Uuid,
        item_id: i64,
        draft: ItemDraft
    ) -> Result<Option<(ToDoItem, Pending)>, MutationError> {

        let mut items = self.items.write().await;

        let mut item = match items.find_by_id(user_id, item_id) {
            Some(item) => item,
            None => return Ok(None),
        };

        item.apply(&draft);

        let item = items.update(item).await.map_err(|e| {
            error!(target: "todos", "Something went wrong while updating to-do item {} for user {}: {}", item_id, user_id, e);
            e
        })?;

        info!(target: "todos", "Updated to-do item {} for user {}.", item_id, user_id);

        let pending = self.publish(EventKind::ItemUpdated, &item).await;
        Ok(Some((item, pending)))

    }

    async fn commit_patch(
        self,
        user_id: Uuid,
        item_id: i64,
        item_status: ItemStatus
    ) -> Result<Option<(ToDoItem, Pending)>, MutationError> {

        let mut items = self.items.write().await;

        let mut item = match items.find_by_id(user_id, item_id) {
            Some(item) => item,
            None => return Ok(None),
        };

        item.item_status = item_status;

        let item = items.update(item).await.map_err(|e| {
            error!(target: "todos", "Something went wrong while updating the status of to-do item {} for user {}: {}", item_id, user_id, e);
            e
        })?;

        info!(target: "todos", "Patched to-do item {} for user {} to {}.", item_id, user_id, item_status);

        let pending = self.publish(EventKind::ItemPatched, &item).await;
        Ok(Some((item, pending)))

    }

    async fn commit_delete(self, user_id: Uuid, item_id: i64) -> Result<Option<(ToDoItem, Pending)>, MutationError> {

        let mut items = self.items.write().await;

        let item = match items.remove(user_id, item_id).await {
            Ok(Some(item)) => item,
            Ok(None) => return Ok(None),
            Err(e) => {
                error!(target: "todos", "Something went wrong while deleting to-do item {} for user {}: {}", item_id, user_id, e);
                return Err(e.into());
            }
        };

        info!(target: "todos", "Deleted to-do item {} for user {}.", item_id, user_id);

        let pending = self.publish(EventKind::ItemDeleted, &item).await;
        Ok(Some((item, pending)))

    }

    /// Every record in the event log, oldest first
    pub async fn list_events(&self) -> Vec<EventRecord> {

        self.event_log.read().await.list_all()

    }

    /// Every record in the event log describing one aggregate, oldest first
    pub async fn list_events_for(&self, aggregate_id: Uuid) -> Vec<EventRecord> {

        self.event_log.read().await.list_by_aggregate(aggregate_id)

    }

    /// Append a record straight to the event log. Unlike the events
    /// produced by mutations, a record the log refuses is reported.
    pub async fn append_event(&self, event: EventRecord) -> Result<EventRecord, PersistenceError> {

        self.event_log.write().await.append(event).await.map_err(|e| {
            error!(target: "events", "Something went wrong while creating an event: {}", e);
            e
        })

    }

    /// Build the event for a mutation, append it to the event log and put
    /// it on the bus. Must be called while the item lock is held.
    async fn publish(&self, kind: EventKind, item: &ToDoItem) -> Pending {

        let mut pending = Pending { log_error: None, ack: None, bus_error: None };

        let record = match EventRecord::for_item(kind, item) {
            Ok(record) => record,
            Err(e) => {
                error!(target: "events", "Could not build the {} event for to-do item {}: {}", kind.as_str(), item.item_id, e);
                pending.log_error = Some(e.into());
                return pending;
            }
        };

        if self.log_events {

            if let Err(e) = self.event_log.write().await.append(record.clone()).await {
                error!(target: "events", "Could not append the {} event {} to the event log: {}", kind.as_str(), record.get_id(), e);
                pending.log_error = Some(e);
            }

        }

        let publish = match self.mode {
            PublishMode::FireAndForget => Publish::fire_and_forget(record),
            PublishMode::Strict => {
                let (publish, ack) = Publish::acknowledged(record);
                pending.ack = Some(ack);
                publish
            }
        };

        if let Err(e) = self.bus_tx.send(Event::Publish(publish)) {
            warn!(target: "bus", "The bus has shut down, could not publish the {} event for to-do item {}.", kind.as_str(), item.item_id);
            pending.ack = None;
            pending.bus_error = Some(PublishError::Fatal(format!("the message bus is closed: {}", e)));
        }

        pending

    }

    /// Settle a mutation that may not have found its item
    async fn settle_found(&self, found: Option<(ToDoItem, Pending)>) -> Result<Option<ToDoItem>, MutationError> {

        match found {
            Some((item, pending)) => {
                self.settle(pending).await?;
                Ok(Some(item))
            },
            None => Ok(None),
        }

    }

    /// Decide what the caller hears about the publication. In fire and
    /// forget mode the answer is always fine, in strict mode the caller
    /// waits for the queue.
    async fn settle(&self, pending: Pending) -> Result<(), MutationError> {

        if self.mode == PublishMode::FireAndForget {
            return Ok(());
        }

        if let Some(e) = pending.log_error {
            return Err(e.into());
        }

        if let Some(e) = pending.bus_error {
            return Err(e.into());
        }

        match pending.ack {
            Some(ack) => match ack.await {
                Ok(result) => result.map_err(MutationError::from),
                Err(_) => Err(PublishError::Fatal("the message bus dropped the event".to_string()).into()),
            },
            None => Ok(()),
        }

    }

}


/// Run the commit of a mutation on its own task. The task owns the item
/// lock from the write until the event is on the bus, and it carries on
/// when the caller stops waiting, so a saved change is never left without
/// its event.
async fn detached<T, F>(commit: F) -> Result<T, MutationError>
where
    F: Future<Output = Result<T, MutationError>> + Send + 'static,
    T: Send + 'static,
{

    match tokio::spawn(commit).await {
        Ok(result) => result,
        Err(e) => {
            error!(target: "todos", "A mutation stopped before it finished: {}", e);
            Err(PersistenceError::Io(std::io::Error::new(ErrorKind::Other, e)).into())
        }
    }

}
