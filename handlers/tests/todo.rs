use async_trait::async_trait;
use domains::Event;
use domains::event::{ EventRecord, AGGREGATE_NAME };
use domains::errors::{ MutationError, PersistenceError, PublishError };
use domains::item::{ ItemDraft, ItemStatus, ToDoItem };
use handlers::publish::{ deliver, PublishStats };
use handlers::todo::{ Coordinator, PublishMode };
use queue::publisher::Publisher;
use queue::retry::RetryPolicy;
use repos::event_log::Repo as EventLog;
use repos::item::Repo as ItemRepo;
use serde_json::{ json, Value };
use std::fs::{ create_dir_all, remove_dir_all };
use std::path::PathBuf;
use std::sync::{ Arc, Mutex };
use time::{ Duration, OffsetDateTime };
use tokio::sync::{ mpsc, RwLock };
use uuid::Uuid;


// A queue that keeps every message it is sent, or fails every send
#[derive(Debug)]
struct MemoryQueue {
    messages: Mutex<Vec<String>>,
    failure: Option<PublishError>,
}

impl MemoryQueue {

    fn new(failure: Option<PublishError>) -> Arc<MemoryQueue> {
        Arc::new(MemoryQueue { messages: Mutex::new(Vec::new()), failure })
    }

    fn messages(&self) -> Vec<Value> {
        self.messages
            .lock()
            .unwrap()
            .iter()
            .map(|message| serde_json::from_str(message).unwrap())
            .collect()
    }

}

#[async_trait]
impl Publisher for MemoryQueue {

    fn target(&self) -> &str {
        "memory"
    }

    fn queue_name(&self) -> &str {
        "todo"
    }

    async fn send(&self, message_body: &str) -> Result<(), PublishError> {

        match &self.failure {
            Some(error) => Err(error.clone()),
            None => {
                self.messages.lock().unwrap().push(message_body.to_string());
                Ok(())
            }
        }

    }

}

// helper function to build a coordinator over in-memory repos. Events put
// on the bus are delivered to the queue by a small forwarding task.
fn setup(mode: PublishMode, queue: Arc<MemoryQueue>) -> (Coordinator, Arc<PublishStats>) {

    let (tx, mut rx) = mpsc::unbounded_channel();
    let stats = Arc::new(PublishStats::default());
    let task_stats = stats.clone();

    tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            if let Event::Publish(publish) = event {
                let _ = deliver(Some(queue.as_ref() as &dyn Publisher), publish, &RetryPolicy::default(), &task_stats).await;
            }
        }
    });

    let coordinator = Coordinator::new(
        Arc::new(RwLock::new(ItemRepo::default())),
        Arc::new(RwLock::new(EventLog::new(None).unwrap())),
        tx,
        true,
        mode
    );

    (coordinator, stats)

}

// helper function to build a coordinator and keep the bus receiver so the
// test can look at exactly what was put on the bus
fn setup_with_bus(log_events: bool) -> (Coordinator, mpsc::UnboundedReceiver<Event>) {

    let (tx, rx) = mpsc::unbounded_channel();

    let coordinator = Coordinator::new(
        Arc::new(RwLock::new(ItemRepo::default())),
        Arc::new(RwLock::new(EventLog::new(None).unwrap())),
        tx,
        log_events,
        PublishMode::FireAndForget
    );

    (coordinator, rx)

}

// helper function to build a coordinator whose event log is saved to a
// file that can't be written to. The log path is turned into a directory
// once the log is open, so every append fails.
fn setup_with_broken_log(mode: PublishMode) -> (Coordinator, mpsc::UnboundedReceiver<Event>, PathBuf) {

    let dir = PathBuf::from(format!("./test_data/{}/", Uuid::new_v4()));
    let filepath = dir.join("events.jsonl");

    let event_log = EventLog::new(Some(filepath.clone())).unwrap();
    create_dir_all(&filepath).unwrap();

    let (tx, rx) = mpsc::unbounded_channel();

    let coordinator = Coordinator::new(
        Arc::new(RwLock::new(ItemRepo::default())),
        Arc::new(RwLock::new(event_log)),
        tx,
        true,
        mode
    );

    (coordinator, rx, dir)

}

// helper function to create a valid draft
fn draft(title: &str) -> ItemDraft {

    ItemDraft {
        item_id: None,
        item_title: title.to_string(),
        item_status: ItemStatus::ToDo,
        item_due_on: Some(OffsetDateTime::now_utc() + Duration::days(1)),
    }

}

// helper function to take the next record off the bus
fn next_record(rx: &mut mpsc::UnboundedReceiver<Event>) -> EventRecord {

    match rx.try_recv() {
        Ok(Event::Publish(publish)) => publish.record,
        other => panic!("expected a publication on the bus, got {:?}", other),
    }

}


#[tokio::test]
async fn create_publishes_an_item_added_event() {

    let (coordinator, mut rx) = setup_with_bus(true);
    let user_id = Uuid::new_v4();

    let item = coordinator.create_item(user_id, &draft("buy milk")).await.unwrap();
    let record = next_record(&mut rx);

    assert_eq!(item.item_id, 1);
    assert_eq!(record.get_type(), "ItemAdded");
    assert_eq!(record.get_aggregate_id(), user_id);
    assert_eq!(record.get_aggregate_name(), AGGREGATE_NAME);

    let payload: ToDoItem = serde_json::from_str(record.get_payload()).unwrap();
    assert_eq!(payload, item);

    assert_eq!(coordinator.list_events().await, vec![record]);

}


#[tokio::test]
async fn create_with_a_taken_id_is_a_conflict_and_publishes_nothing() {

    let (coordinator, mut rx) = setup_with_bus(true);
    let user_id = Uuid::new_v4();

    let mut first = draft("buy milk");
    first.item_id = Some(7);
    coordinator.create_item(user_id, &first).await.unwrap();
    next_record(&mut rx);

    let result = coordinator.create_item(user_id, &first).await;

    assert!(matches!(result, Err(MutationError::Persistence(PersistenceError::Conflict(_)))));
    assert!(rx.try_recv().is_err());
    assert_eq!(coordinator.list_events().await.len(), 1);

}


#[tokio::test]
async fn create_with_an_id_too_large_to_count_past_is_refused() {

    let (coordinator, mut rx) = setup_with_bus(true);
    let user_id = Uuid::new_v4();

    let mut too_large = draft("buy milk");
    too_large.item_id = Some(i64::MAX);

    let result = coordinator.create_item(user_id, &too_large).await;

    assert!(matches!(result, Err(MutationError::Persistence(PersistenceError::Invalid(_)))));
    assert!(rx.try_recv().is_err());
    assert!(coordinator.get_items(user_id).await.is_empty());

    // the store keeps handing out ids as normal
    let item = coordinator.create_item(user_id, &draft("buy bread")).await.unwrap();
    assert_eq!(item.item_id, 1);

}


#[tokio::test]
async fn update_replaces_the_item_and_publishes_a_snapshot() {

    let (coordinator, mut rx) = setup_with_bus(true);
    let user_id = Uuid::new_v4();

    let item = coordinator.create_item(user_id, &draft("buy milk")).await.unwrap();
    next_record(&mut rx);

    let mut changes = draft("buy oat milk");
    changes.item_id = Some(item.item_id);
    changes.item_status = ItemStatus::InProgress;

    let updated = coordinator.update_item(user_id, &changes).await.unwrap().unwrap();
    let record = next_record(&mut rx);

    assert_eq!(updated.item_title, "buy oat milk");
    assert_eq!(updated.item_status, ItemStatus::InProgress);
    assert_eq!(record.get_type(), "ItemUpdated");
    assert_eq!(serde_json::from_str::<ToDoItem>(record.get_payload()).unwrap(), updated);
    assert_eq!(coordinator.get_item(user_id, item.item_id).await, Some(updated));

}


#[tokio::test]
async fn update_of_a_missing_item_is_empty_and_silent() {

    let (coordinator, mut rx) = setup_with_bus(true);
    let user_id = Uuid::new_v4();

    let mut missing = draft("buy milk");
    missing.item_id = Some(42);
    assert!(coordinator.update_item(user_id, &missing).await.unwrap().is_none());

    missing.item_id = None;
    assert!(coordinator.update_item(user_id, &missing).await.unwrap().is_none());

    assert!(rx.try_recv().is_err());
    assert!(coordinator.list_events().await.is_empty());

}


#[tokio::test]
async fn users_cannot_touch_each_others_items() {

    let (coordinator, mut rx) = setup_with_bus(true);
    let owner = Uuid::new_v4();
    let intruder = Uuid::new_v4();

    let item = coordinator.create_item(owner, &draft("buy milk")).await.unwrap();
    next_record(&mut rx);

    assert!(coordinator.get_item(intruder, item.item_id).await.is_none());
    assert!(coordinator.patch_item_status(intruder, item.item_id, ItemStatus::Completed).await.unwrap().is_none());
    assert!(coordinator.delete_item(intruder, item.item_id).await.unwrap().is_none());

    assert!(rx.try_recv().is_err());
    assert_eq!(coordinator.get_item(owner, item.item_id).await, Some(item));

}


#[tokio::test]
async fn patch_publishes_only_the_new_status() {

    let (coordinator, mut rx) = setup_with_bus(true);
    let user_id = Uuid::new_v4();

    let item = coordinator.create_item(user_id, &draft("buy milk")).await.unwrap();
    next_record(&mut rx);

    let patched = coordinator
        .patch_item_status(user_id, item.item_id, ItemStatus::Completed)
        .await
        .unwrap()
        .unwrap();
    let record = next_record(&mut rx);

    assert_eq!(patched.item_status, ItemStatus::Completed);
    assert_eq!(patched.item_title, item.item_title);
    assert_eq!(record.get_type(), "ItemPatched");

    let payload: Value = serde_json::from_str(record.get_payload()).unwrap();
    assert_eq!(payload, json!({"item_id": item.item_id, "item_status": "Completed"}));

}


#[tokio::test]
async fn delete_publishes_the_item_as_it_was() {

    let (coordinator, mut rx) = setup_with_bus(true);
    let user_id = Uuid::new_v4();

    let item = coordinator.create_item(user_id, &draft("buy milk")).await.unwrap();
    next_record(&mut rx);

    let deleted = coordinator.delete_item(user_id, item.item_id).await.unwrap();
    let record = next_record(&mut rx);

    assert_eq!(deleted, Some(item.clone()));
    assert_eq!(record.get_type(), "ItemDeleted");
    assert_eq!(serde_json::from_str::<ToDoItem>(record.get_payload()).unwrap(), item);
    assert!(coordinator.get_item(user_id, item.item_id).await.is_none());

    // deleting it again finds nothing and says nothing
    assert!(coordinator.delete_item(user_id, item.item_id).await.unwrap().is_none());
    assert!(rx.try_recv().is_err());

}


#[tokio::test]
async fn queries_filter_by_user_and_status() {

    let (coordinator, _rx) = setup_with_bus(true);
    let user_id = Uuid::new_v4();

    let first = coordinator.create_item(user_id, &draft("buy milk")).await.unwrap();
    let second = coordinator.create_item(user_id, &draft("walk the dog")).await.unwrap();
    coordinator.create_item(Uuid::new_v4(), &draft("someone else's")).await.unwrap();
    coordinator.patch_item_status(user_id, second.item_id, ItemStatus::InProgress).await.unwrap();

    assert_eq!(coordinator.get_items(user_id).await.len(), 2);
    assert_eq!(coordinator.get_items_by_status(user_id, ItemStatus::ToDo).await, vec![first]);
    assert_eq!(coordinator.get_items_by_status(user_id, ItemStatus::InProgress).await.len(), 1);
    assert!(coordinator.get_items_by_status(user_id, ItemStatus::Completed).await.is_empty());

}


#[tokio::test]
async fn events_reach_the_bus_in_commit_order() {

    let (coordinator, mut rx) = setup_with_bus(true);
    let user_id = Uuid::new_v4();

    let mut tasks = Vec::new();
    for i in 0..20 {
        let coordinator = coordinator.clone();
        tasks.push(tokio::spawn(async move {
            coordinator.create_item(user_id, &draft(&format!("task {}", i))).await.unwrap()
        }));
    }

    for task in tasks {
        task.await.unwrap();
    }

    // item ids are handed out under the same lock the events are queued
    // under, so the bus must see them in increasing order
    let mut ids = Vec::new();
    while let Ok(Event::Publish(publish)) = rx.try_recv() {
        let item: ToDoItem = serde_json::from_str(publish.record.get_payload()).unwrap();
        ids.push(item.item_id);
    }

    assert_eq!(ids, (1..=20).collect::<Vec<i64>>());

    let logged: Vec<i64> = coordinator
        .list_events_for(user_id)
        .await
        .iter()
        .map(|record| serde_json::from_str::<ToDoItem>(record.get_payload()).unwrap().item_id)
        .collect();
    assert_eq!(logged, ids);

}


#[tokio::test]
async fn event_log_can_be_turned_off() {

    let (coordinator, mut rx) = setup_with_bus(false);

    coordinator.create_item(Uuid::new_v4(), &draft("buy milk")).await.unwrap();

    assert_eq!(next_record(&mut rx).get_type(), "ItemAdded");
    assert!(coordinator.list_events().await.is_empty());

}


#[tokio::test]
async fn fire_and_forget_hides_queue_failures() {

    let queue = MemoryQueue::new(Some(PublishError::Fatal("queue does not exist".to_string())));
    let (coordinator, stats) = setup(PublishMode::FireAndForget, queue.clone());
    let user_id = Uuid::new_v4();

    let item = coordinator.create_item(user_id, &draft("buy milk")).await.unwrap();

    // give the forwarding task a moment to try the queue
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;

    assert_eq!(coordinator.get_item(user_id, item.item_id).await, Some(item));
    assert_eq!(stats.snapshot().fatal, 1);
    assert!(queue.messages().is_empty());

}


#[tokio::test]
async fn strict_mode_waits_for_the_queue() {

    let queue = MemoryQueue::new(None);
    let (coordinator, stats) = setup(PublishMode::Strict, queue.clone());
    let user_id = Uuid::new_v4();

    let item = coordinator.create_item(user_id, &draft("buy milk")).await.unwrap();

    // the mutation only returned once the queue had the message
    let messages = queue.messages();
    assert_eq!(messages.len(), 1);
    assert_eq!(messages[0]["event_type"], "ItemAdded");
    assert_eq!(messages[0]["aggregate_id"], user_id.to_string());
    assert_eq!(serde_json::from_str::<ToDoItem>(messages[0]["payload"].as_str().unwrap()).unwrap(), item);
    assert_eq!(stats.snapshot().sent, 1);

}


#[tokio::test]
async fn strict_mode_reports_transient_failures_and_keeps_the_change() {

    let queue = MemoryQueue::new(Some(PublishError::Transient("throttled".to_string())));
    let (coordinator, stats) = setup(PublishMode::Strict, queue);
    let user_id = Uuid::new_v4();

    let result = coordinator.create_item(user_id, &draft("buy milk")).await;

    match result {
        Err(MutationError::Publish(error)) => assert!(error.is_transient()),
        other => panic!("expected a transient publish error, got {:?}", other),
    }

    // the item was committed before publication was attempted
    assert_eq!(coordinator.get_items(user_id).await.len(), 1);
    assert_eq!(coordinator.list_events().await.len(), 1);
    assert_eq!(stats.snapshot().transient, 1);

}


#[tokio::test]
async fn strict_mode_reports_fatal_failures() {

    let queue = MemoryQueue::new(Some(PublishError::Fatal("queue does not exist".to_string())));
    let (coordinator, _stats) = setup(PublishMode::Strict, queue);
    let user_id = Uuid::new_v4();

    let result = coordinator.create_item(user_id, &draft("buy milk")).await;

    assert!(matches!(result, Err(MutationError::Publish(PublishError::Fatal(_)))));
    assert_eq!(coordinator.get_items(user_id).await.len(), 1);

}


#[tokio::test]
async fn strict_mode_reports_a_closed_bus() {

    let (tx, rx) = mpsc::unbounded_channel();
    drop(rx);

    let coordinator = Coordinator::new(
        Arc::new(RwLock::new(ItemRepo::default())),
        Arc::new(RwLock::new(EventLog::new(None).unwrap())),
        tx,
        true,
        PublishMode::Strict
    );

    let result = coordinator.create_item(Uuid::new_v4(), &draft("buy milk")).await;

    assert!(matches!(result, Err(MutationError::Publish(PublishError::Fatal(_)))));

}


#[tokio::test]
async fn append_event_refuses_duplicates() {

    let (coordinator, _rx) = setup_with_bus(true);
    let record = EventRecord::new("ItemAdded", Uuid::new_v4(), AGGREGATE_NAME, "{}".to_string());

    assert_eq!(coordinator.append_event(record.clone()).await.unwrap(), record);

    let result = coordinator.append_event(record.clone()).await;
    assert!(matches!(result, Err(PersistenceError::Conflict(_))));

    assert_eq!(coordinator.list_events_for(record.get_aggregate_id()).await, vec![record]);

}


#[tokio::test]
async fn append_event_refuses_incomplete_records() {

    let (coordinator, _rx) = setup_with_bus(true);

    let no_type = EventRecord::new("", Uuid::new_v4(), AGGREGATE_NAME, "{}".to_string());
    let no_aggregate = EventRecord::new("ItemAdded", Uuid::nil(), AGGREGATE_NAME, "{}".to_string());

    assert!(matches!(coordinator.append_event(no_type).await, Err(PersistenceError::Invalid(_))));
    assert!(matches!(coordinator.append_event(no_aggregate).await, Err(PersistenceError::Invalid(_))));
    assert!(coordinator.list_events().await.is_empty());

}


#[tokio::test]
async fn a_committed_change_gets_its_event_after_the_caller_gives_up() {

    let (tx, mut rx) = mpsc::unbounded_channel();
    let items = Arc::new(RwLock::new(ItemRepo::default()));
    let event_log = Arc::new(RwLock::new(EventLog::new(None).unwrap()));

    let coordinator = Coordinator::new(items.clone(), event_log.clone(), tx, true, PublishMode::FireAndForget);
    let user_id = Uuid::new_v4();

    // hold up the event log so the mutation stalls after the item is saved
    let guard = event_log.write().await;

    let result = tokio::time::timeout(
        std::time::Duration::from_millis(50),
        coordinator.create_item(user_id, &draft("buy milk"))
    ).await;

    assert!(result.is_err());
    drop(guard);

    // the rest of the mutation carries on without the caller
    for _ in 0..100 {
        if event_log.read().await.event_count() == 1 {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }

    assert_eq!(items.read().await.item_count(), 1);
    assert_eq!(event_log.read().await.event_count(), 1);
    assert_eq!(next_record(&mut rx).get_type(), "ItemAdded");

}


#[tokio::test]
async fn fire_and_forget_keeps_the_change_when_the_event_log_fails() {

    let (coordinator, mut rx, dir) = setup_with_broken_log(PublishMode::FireAndForget);
    let user_id = Uuid::new_v4();

    let item = coordinator.create_item(user_id, &draft("buy milk")).await.unwrap();

    assert_eq!(coordinator.get_item(user_id, item.item_id).await, Some(item));
    assert!(coordinator.list_events().await.is_empty());

    // the queue still hears about it
    assert_eq!(next_record(&mut rx).get_type(), "ItemAdded");

    remove_dir_all(dir).unwrap();

}


#[tokio::test]
async fn strict_mode_reports_an_event_log_failure_and_keeps_the_change() {

    let (coordinator, _rx, dir) = setup_with_broken_log(PublishMode::Strict);
    let user_id = Uuid::new_v4();

    let result = coordinator.create_item(user_id, &draft("buy milk")).await;

    assert!(matches!(result, Err(MutationError::Persistence(PersistenceError::Io(_)))));
    assert_eq!(coordinator.get_items(user_id).await.len(), 1);
    assert!(coordinator.list_events().await.is_empty());

    remove_dir_all(dir).unwrap();

}
