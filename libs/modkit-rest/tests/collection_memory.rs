#![allow(clippy::unwrap_used, clippy::expect_used)]

//! Collection operations against the in-memory engine.

use modkit_db::{JoinSpec, MemoryDb, MemoryStore, Record, StorageEngine};
use modkit_query::{FilterOp, FilterPredicate, QueryOptions, ResourceQuery, Sort};
use modkit_rest::pagination::{FIRST, LAST, NEXT, PREVIOUS};
use modkit_rest::{
    Attribute, Collection, CollectionConfig, CollectionError, Link, Relationships, UrlTemplate,
};
use modkit_security::ConstraintMap;
use serde_json::{Value, json};

fn rec(v: Value) -> Record {
    match v {
        Value::Object(m) => m,
        _ => unreachable!(),
    }
}

struct Fixture {
    db: MemoryDb,
    users: Collection<MemoryStore>,
}

async fn fixture() -> Fixture {
    let db = MemoryDb::new();
    let groups = db.store("groups");
    groups
        .insert(&rec(json!({ "id": 1, "name": "Flintstones" })))
        .await
        .unwrap();
    let pets = db.store("pets");
    pets.insert(&rec(json!({ "name": "Dino", "ownerId": 1 })))
        .await
        .unwrap();
    pets.insert(&rec(json!({ "name": "Baby Puss", "ownerId": 1 })))
        .await
        .unwrap();

    let store = db.store("users");
    store
        .insert(&rec(json!({ "name": "Fred", "groupId": 1 })))
        .await
        .unwrap();
    store
        .insert(&rec(json!({ "name": "Wilma", "groupId": 1 })))
        .await
        .unwrap();

    let relationships = Relationships::new()
        .with(
            "group",
            JoinSpec::belongs_to("groups", "groupId"),
            UrlTemplate::parse("/users/<%=id%>/group").unwrap(),
        )
        .with(
            "pets",
            JoinSpec::has_many("pets", "ownerId"),
            UrlTemplate::parse("/users/<%=id%>/pets").unwrap(),
        );
    let users = Collection::new("users", store).with_relationships(relationships);
    Fixture { db, users }
}

fn self_links(elements: &[modkit_rest::Resource]) -> Vec<&str> {
    elements.iter().map(|e| e.self_link.as_str()).collect()
}

fn href<'a>(r: &'a modkit_rest::Resource, name: &str) -> Option<&'a str> {
    r.link(name).and_then(Link::as_str)
}

#[tokio::test]
async fn list_links_each_element_by_id() {
    let f = fixture().await;
    let r = f
        .users
        .list("/users", &ResourceQuery::new(), None)
        .await
        .unwrap();

    assert_eq!(self_links(&r.elements), vec!["/users/1", "/users/2"]);
    assert_eq!(
        r.elements[0].attribute("name"),
        Some(&Attribute::Value(json!("Fred")))
    );
    let meta = r.meta.unwrap();
    assert_eq!(meta.count, 2);
    assert_eq!(meta.page.size, 10);
    assert_eq!(meta.page.count, 1);
}

#[tokio::test]
async fn like_filter_with_unmatched_constraint_is_empty() {
    let f = fixture().await;
    let q = ResourceQuery::new().with_filter(FilterPredicate::leaf(
        "name",
        FilterOp::Like,
        "wilma%",
    ));
    let constraint = ConstraintMap::new().eq("groupId", 2);

    let r = f.users.list("/users", &q, Some(&constraint)).await.unwrap();
    assert!(r.elements.is_empty());
    assert_eq!(r.meta.unwrap().count, 0);

    let r = f.users.list("/users", &q, None).await.unwrap();
    assert_eq!(self_links(&r.elements), vec!["/users/2"]);
}

#[tokio::test]
async fn user_filter_cannot_widen_constraint() {
    let f = fixture().await;
    f.users
        .store()
        .insert(&rec(json!({ "name": "Barney", "groupId": 2 })))
        .await
        .unwrap();
    let constraint = ConstraintMap::new().eq("groupId", 1);

    for filter in [
        FilterPredicate::eq("groupId", 2),
        FilterPredicate::or(vec![
            FilterPredicate::eq("groupId", 2),
            FilterPredicate::eq("name", "Barney"),
        ]),
        FilterPredicate::not(FilterPredicate::eq("groupId", 1)),
    ] {
        let q = ResourceQuery::new().with_filter(filter);
        let r = f.users.list("/users", &q, Some(&constraint)).await.unwrap();
        assert!(r.elements.is_empty(), "{:?}", q.filter());
    }
}

#[tokio::test]
async fn sparse_fieldset_keeps_identifier() {
    let f = fixture().await;
    let q = ResourceQuery::new().with_fields("users", ["name"]);
    let r = f.users.list("/users", &q, None).await.unwrap();

    let keys: Vec<&str> = r.elements[0].attributes.keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["id", "name"]);
}

#[tokio::test]
async fn sort_and_paging() {
    let f = fixture().await;
    for name in ["Barney", "Betty", "Pebbles"] {
        f.users
            .store()
            .insert(&rec(json!({ "name": name, "groupId": 2 })))
            .await
            .unwrap();
    }
    let q = ResourceQuery::new()
        .with_page(2, 2)
        .with_sort(Sort::new().desc("name"));
    let r = f.users.list("/users", &q, None).await.unwrap();

    let names: Vec<Value> = r
        .elements
        .iter()
        .map(|e| e.attribute("name").and_then(Attribute::as_value).cloned().unwrap())
        .collect();
    assert_eq!(names, vec![json!("Fred"), json!("Betty")]);

    let meta = r.meta.unwrap();
    assert_eq!((meta.count, meta.page.number, meta.page.count), (5, 2, 3));
    assert!(href(&r, PREVIOUS).unwrap().contains("page%5Bnumber%5D=1"));
    assert!(href(&r, NEXT).unwrap().contains("page%5Bnumber%5D=3"));
    assert!(href(&r, LAST).unwrap().contains("page%5Bnumber%5D=3"));
    assert!(href(&r, NEXT).unwrap().contains("sort=-name"));
}

#[tokio::test]
async fn pagination_boundaries() {
    let f = fixture().await;

    let first = ResourceQuery::new().with_page(1, 1);
    let r = f.users.list("/users", &first, None).await.unwrap();
    assert!(href(&r, PREVIOUS).is_none());
    assert!(href(&r, NEXT).is_some());

    let last = ResourceQuery::new().with_page(2, 1);
    let r = f.users.list("/users", &last, None).await.unwrap();
    assert!(href(&r, PREVIOUS).is_some());
    assert!(href(&r, NEXT).is_none());

    let only = ResourceQuery::new();
    let r = f.users.list("/users", &only, None).await.unwrap();
    assert!(href(&r, PREVIOUS).is_none());
    assert!(href(&r, NEXT).is_none());
    assert_eq!(href(&r, FIRST), href(&r, LAST));
}

#[tokio::test]
async fn page_size_is_clamped_and_defaulted() {
    let f = fixture().await;
    let users = Collection::new("users", f.db.store("users")).with_config(CollectionConfig {
        default_page_size: 1,
        max_page_size: 1,
        ..CollectionConfig::default()
    });

    let r = users
        .list("/users", &ResourceQuery::new().with_page(0, 50), None)
        .await
        .unwrap();
    let meta = r.meta.unwrap();
    assert_eq!((meta.page.number, meta.page.size), (1, 1));
    assert_eq!(r.elements.len(), 1);
}

#[tokio::test]
async fn include_single_and_array_relationships() {
    let f = fixture().await;
    let q = ResourceQuery::new().with_include(["group", "pets", "unknown"]);
    let fred = f
        .users
        .get("/users/1", 1, &q, None)
        .await
        .unwrap()
        .expect("fred");

    assert!(fred.attribute("group").is_none());
    assert!(fred.attribute("pets").is_none());
    assert!(fred.attribute("unknown").is_none());
    assert_eq!(href(&fred, "group"), Some("/users/1/group"));
    assert_eq!(
        fred.link("pets"),
        Some(&Link::Many(vec![
            "/users/1/pets".to_owned(),
            "/users/1/pets".to_owned()
        ]))
    );
    // One include per occurrence: the group plus two pets.
    assert_eq!(fred.includes.len(), 3);
    let included: Vec<&str> = fred.includes.iter().map(|i| i.self_link.as_str()).collect();
    assert_eq!(included.iter().filter(|l| **l == "/users/1/pets").count(), 2);
    assert!(included.contains(&"/users/1/group"));
}

#[tokio::test]
async fn array_links_use_parent_fields_not_item_fields() {
    let f = fixture().await;
    let wilma_pet = f
        .db
        .store("pets")
        .insert(&rec(json!({ "id": 7, "name": "Hoppy", "ownerId": 2 })))
        .await
        .unwrap();
    assert_eq!(wilma_pet.values["id"], json!(7));

    let q = ResourceQuery::new().with_include(["pets"]);
    let wilma = f.users.get("/users/2", 2, &q, None).await.unwrap().unwrap();
    assert_eq!(
        wilma.link("pets"),
        Some(&Link::Many(vec!["/users/2/pets".to_owned()]))
    );
    assert_eq!(
        wilma.includes[0].attribute("name"),
        Some(&Attribute::Value(json!("Hoppy")))
    );
}

#[tokio::test]
async fn sparse_fieldset_with_include_keeps_link_fields() {
    let f = fixture().await;
    let users = Collection::new("users", f.db.store("users")).with_relationships(
        Relationships::new()
            .with(
                "group",
                JoinSpec::belongs_to("groups", "groupId"),
                UrlTemplate::parse("/groups/<%=groupId%>").unwrap(),
            )
            .with(
                "pets",
                JoinSpec::has_many("pets", "ownerId"),
                UrlTemplate::parse("/users/<%=id%>/pets").unwrap(),
            ),
    );
    let q = ResourceQuery::new()
        .with_fields("users", ["name"])
        .with_include(["group", "pets"]);

    let r = users.list("/users", &q, None).await.unwrap();
    let fred = &r.elements[0];
    assert_eq!(href(fred, "group"), Some("/groups/1"));
    assert_eq!(
        fred.link("pets"),
        Some(&Link::Many(vec![
            "/users/1/pets".to_owned(),
            "/users/1/pets".to_owned()
        ]))
    );
    assert_eq!(fred.attribute("groupId"), Some(&Attribute::Value(json!(1))));
    // Fred's group and two pets, Wilma's group.
    assert_eq!(r.includes.len(), 4);

    let fred = users.get("/users/1", 1, &q, None).await.unwrap().unwrap();
    assert_eq!(href(&fred, "group"), Some("/groups/1"));
}

#[tokio::test]
async fn list_includes_are_not_deduplicated() {
    let f = fixture().await;
    let q = ResourceQuery::new().with_include(["group"]);
    let r = f.users.list("/users", &q, None).await.unwrap();
    // Both users share the group; it appears once per user.
    assert_eq!(r.includes.len(), 2);
    assert_eq!(r.includes[0].attributes, r.includes[1].attributes);
    assert_eq!(r.includes[0].self_link, "/users/1/group");
    assert_eq!(r.includes[1].self_link, "/users/2/group");
}

#[tokio::test]
async fn get_not_found_and_excluded_are_equivalent() {
    let f = fixture().await;
    let q = ResourceQuery::new();

    let missing = f.users.get("/users/42", 42, &q, None).await.unwrap();
    let excluded = f
        .users
        .get(
            "/users/1",
            1,
            &q,
            Some(&ConstraintMap::new().eq("groupId", 2)),
        )
        .await
        .unwrap();
    assert!(missing.is_none());
    assert!(excluded.is_none());

    let found = f.users.get("/users/1", 1, &q, None).await.unwrap().unwrap();
    assert_eq!(found.self_link, "/users/1");
}

#[tokio::test]
async fn create_rejects_payload_outside_constraint() {
    let f = fixture().await;
    let constraint = ConstraintMap::new().eq("groupId", 2);

    let err = f
        .users
        .create(
            "/users",
            &rec(json!({ "name": "Dino", "groupId": 1 })),
            Some(&constraint),
        )
        .await
        .unwrap_err();
    match err {
        CollectionError::ConstraintViolation(v) => assert_eq!(v.field, "groupId"),
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(f.db.rows("users").len(), 2);

    let err = f
        .users
        .create("/users", &rec(json!({ "name": "Dino" })), Some(&constraint))
        .await
        .unwrap_err();
    assert!(err.is_client_error());
    assert_eq!(f.db.rows("users").len(), 2);
}

#[tokio::test]
async fn create_inserts_payload_and_links_new_row() {
    let f = fixture().await;
    let constraint = ConstraintMap::new().eq("groupId", 2);
    let r = f
        .users
        .create(
            "/users",
            &rec(json!({ "name": "Barney", "groupId": 2 })),
            Some(&constraint),
        )
        .await
        .unwrap();

    assert_eq!(r.self_link, "/users/3");
    assert_eq!(r.attribute("name"), Some(&Attribute::Value(json!("Barney"))));
    assert_eq!(f.db.rows("users").len(), 3);
}

#[tokio::test]
async fn update_outside_constraint_leaves_row_unchanged() {
    let f = fixture().await;
    let constraint = ConstraintMap::new().eq("groupId", 2);
    let out = f
        .users
        .update(
            "/users/1",
            1,
            &rec(json!({ "name": "Freddie", "groupId": 2 })),
            Some(&constraint),
        )
        .await
        .unwrap();

    assert!(out.is_none());
    assert_eq!(f.db.rows("users")[0]["name"], json!("Fred"));
    assert_eq!(f.db.rows("users")[0]["groupId"], json!(1));
}

#[tokio::test]
async fn update_rejects_payload_moving_row_out_of_constraint() {
    let f = fixture().await;
    let constraint = ConstraintMap::new().eq("groupId", 1);
    let err = f
        .users
        .update(
            "/users/1",
            1,
            &rec(json!({ "groupId": 2 })),
            Some(&constraint),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, CollectionError::ConstraintViolation(_)));
    assert_eq!(f.db.rows("users")[0]["groupId"], json!(1));
}

#[tokio::test]
async fn update_without_constrained_field_is_rejected() {
    let f = fixture().await;
    let constraint = ConstraintMap::new().eq("groupId", 1);
    let err = f
        .users
        .update(
            "/users/1",
            1,
            &rec(json!({ "name": "Freddie" })),
            Some(&constraint),
        )
        .await
        .unwrap_err();

    match err {
        CollectionError::ConstraintViolation(v) => {
            assert_eq!(v.field, "groupId");
            assert_eq!(v.actual, Value::Null);
        }
        other => panic!("unexpected {other:?}"),
    }
    assert_eq!(f.db.rows("users")[0]["name"], json!("Fred"));
}

#[tokio::test]
async fn update_returns_updated_row() {
    let f = fixture().await;
    let constraint = ConstraintMap::new().eq("groupId", 1);
    let r = f
        .users
        .update(
            "/users/1",
            1,
            &rec(json!({ "name": "Freddie", "groupId": 1 })),
            Some(&constraint),
        )
        .await
        .unwrap()
        .unwrap();

    assert_eq!(r.self_link, "/users/1");
    assert_eq!(r.attribute("name"), Some(&Attribute::Value(json!("Freddie"))));
    assert_eq!(r.attribute("groupId"), Some(&Attribute::Value(json!(1))));
}

#[tokio::test]
async fn delete_counts_and_respects_constraint() {
    let f = fixture().await;
    assert_eq!(f.users.delete(42, None).await.unwrap(), 0);
    assert_eq!(
        f.users
            .delete(1, Some(&ConstraintMap::new().eq("groupId", 2)))
            .await
            .unwrap(),
        0
    );
    assert_eq!(f.users.delete(1, None).await.unwrap(), 1);
    assert_eq!(f.db.rows("users").len(), 1);
}

#[tokio::test]
async fn invalid_filter_is_a_client_error() {
    let f = fixture().await;
    let q = ResourceQuery::new().with_filter(FilterPredicate::leaf("id", FilterOp::In, 1));
    let err = f.users.list("/users", &q, None).await.unwrap_err();
    assert!(matches!(err, CollectionError::InvalidFilter(_)));
    assert!(err.is_client_error());
}

#[tokio::test]
async fn serialized_collection_shape() {
    let f = fixture().await;
    let q = ResourceQuery::new()
        .with_fields("users", ["name"])
        .with_filter(FilterPredicate::eq("name", "Fred"));
    let r = f.users.list("/users", &q, None).await.unwrap();
    let v = serde_json::to_value(&r).unwrap();

    assert_eq!(v["$self"], json!("/users"));
    assert_eq!(
        v["elements"],
        json!([{ "$self": "/users/1", "attributes": { "id": 1, "name": "Fred" } }])
    );
    assert_eq!(
        v["meta"],
        json!({ "count": 1, "page": { "number": 1, "size": 10, "count": 1 } })
    );
    assert!(v["links"]["$first"].is_string());
    assert!(v.get("includes").is_none());
}
