use domains::item::{ ItemDraft, ItemStatus, ToDoItem, MAX_TITLE_LENGTH };
use serde_json::json;
use time::{ Duration, OffsetDateTime };
use uuid::Uuid;


// Helper function to generate a valid draft
fn test_draft() -> ItemDraft {

    ItemDraft {
        item_id: None,
        item_title: "Buy milk".to_string(),
        item_status: ItemStatus::ToDo,
        item_due_on: Some(OffsetDateTime::now_utc() + Duration::hours(1)),
    }

}


#[test]
fn valid_draft_passes() {

    assert_eq!(test_draft().validate(OffsetDateTime::now_utc()), Ok(()));

}


#[test]
fn empty_title_is_rejected() {

    let mut draft = test_draft();
    draft.item_title = "   ".to_string();

    assert_eq!(
        draft.validate(OffsetDateTime::now_utc()),
        Err(vec!["ToDo Item Title should not be empty".to_string()])
    );

}


#[test]
fn long_title_is_rejected() {

    let mut draft = test_draft();
    draft.item_title = "a".repeat(MAX_TITLE_LENGTH + 1);

    assert_eq!(
        draft.validate(OffsetDateTime::now_utc()),
        Err(vec!["ToDo Item Title should be no more than 100 characters".to_string()])
    );

}


#[test]
fn unspecified_status_is_rejected() {

    let mut draft = test_draft();
    draft.item_status = ItemStatus::NotSpecified;

    assert_eq!(
        draft.validate(OffsetDateTime::now_utc()),
        Err(vec!["ToDo Item Status should not be empty".to_string()])
    );

}


#[test]
fn draft_deserializes_from_a_request_body() {

    let draft: ItemDraft = serde_json::from_value(json!({
        "item_title": "Buy milk",
        "item_status": "InProgress",
        "item_due_on": "2030-01-01T09:00:00Z"
    })).unwrap();

    assert_eq!(draft.item_id, None);
    assert_eq!(draft.item_status, ItemStatus::InProgress);
    assert_eq!(draft.item_due_on.unwrap().year(), 2030);

}


#[test]
fn unknown_status_fails_to_deserialize() {

    let draft = serde_json::from_value::<ItemDraft>(json!({
        "item_title": "Buy milk",
        "item_status": "Done"
    }));

    assert!(draft.is_err());

}


#[test]
fn apply_overwrites_mutable_fields_only() {

    let user_id = Uuid::new_v4();
    let mut item = ToDoItem::from_draft(user_id, 7, &test_draft());

    let mut update = test_draft();
    update.item_id = Some(99);
    update.item_title = "Buy oat milk".to_string();
    update.item_status = ItemStatus::Completed;

    item.apply(&update);

    assert_eq!(item.item_id, 7);
    assert_eq!(item.user_id, user_id);
    assert_eq!(item.item_title, "Buy oat milk");
    assert_eq!(item.item_status, ItemStatus::Completed);

}


#[test]
fn item_serializes_with_snake_case_keys() {

    let item = ToDoItem::from_draft(Uuid::new_v4(), 1, &test_draft());
    let value = serde_json::to_value(&item).unwrap();

    let keys = value.as_object().unwrap();
    assert!(keys.contains_key("item_id"));
    assert!(keys.contains_key("item_title"));
    assert!(keys.contains_key("item_status"));
    assert!(keys.contains_key("user_id"));
    assert!(keys.contains_key("item_due_on"));

}


#[test]
fn update_draft_must_name_its_item() {

    let now = OffsetDateTime::now_utc();
    let mut draft = test_draft();

    assert_eq!(
        draft.validate_update(now),
        Err(vec!["ToDo Item Id should not be empty".to_string()])
    );

    draft.item_id = Some(0);
    draft.item_title = String::new();

    assert_eq!(
        draft.validate_update(now),
        Err(vec![
            "ToDo Item Id should be greater than 0".to_string(),
            "ToDo Item Title should not be empty".to_string(),
        ])
    );

    draft.item_id = Some(3);
    draft.item_title = "Buy milk".to_string();

    assert_eq!(draft.validate_update(now), Ok(()));

}
