mod common;

use common::{context, names, seeded_store};
use quarry::storage::Scope;
use quarry::{Delete, QueryContext, QueryError, Select, Update, Value};

#[test]
fn test_bulk_update_reports_affected_rows() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let username = m.attr("username").unwrap();
    let age = m.attr("age").unwrap();

    let stale = ctx
        .fetch_all(&Select::from(&m).order_by(age.asc()).build().unwrap())
        .unwrap();

    let affected = ctx
        .bulk_update(
            Update::table(&m)
                .set(&username, "guest")
                .unwrap()
                .filter(age.lt(28)),
        )
        .unwrap();
    assert_eq!(affected, 2);

    // rows fetched before the update keep their old values
    assert_eq!(names(&stale), ["member1", "member2", "member3", "member4"]);

    let fresh = ctx
        .fetch_all(&Select::from(&m).order_by(age.asc()).build().unwrap())
        .unwrap();
    assert_eq!(names(&fresh), ["guest", "guest", "member3", "member4"]);
}

#[test]
fn test_bulk_add_and_delete() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let age = m.attr("age").unwrap();

    let affected = ctx
        .bulk_update(Update::table(&m).set(&age, age.add(1)).unwrap())
        .unwrap();
    assert_eq!(affected, 4);

    let ages: Vec<(i64,)> = ctx
        .fetch_all_as(&Select::from(&m).select([&age]).order_by(age.asc()).build().unwrap())
        .unwrap();
    assert_eq!(ages, [(11,), (21,), (31,), (41,)]);

    let deleted = ctx.bulk_delete(Delete::from(&m).filter(age.gt(18))).unwrap();
    assert_eq!(deleted, 3);
    assert_eq!(ctx.storage().len("Member"), 1);
}

#[test]
fn test_update_matching_nothing() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let age = m.attr("age").unwrap();

    let affected = ctx
        .bulk_update(Update::table(&m).set(&age, 0).unwrap().filter(age.gt(1000)))
        .unwrap();
    assert_eq!(affected, 0);
}

#[test]
fn test_invalid_mutations_rejected() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let age = m.attr("age").unwrap();

    assert!(matches!(
        Update::table(&m).filter(age.gt(1)).build(),
        Err(QueryError::EmptyUpdate(_))
    ));
    assert!(matches!(
        Update::table(&m).set(&age, "old"),
        Err(QueryError::TypeMismatch { .. })
    ));
    assert!(matches!(
        Update::table(&m).set(&age, Value::Null),
        Err(QueryError::TypeMismatch { .. })
    ));

    let other = ctx.path("Team", "t").unwrap();
    assert!(matches!(
        Update::table(&m).set(&other.attr("name").unwrap(), "x"),
        Err(QueryError::UnknownAttribute { .. })
    ));
}

#[test]
fn test_scope_rollback_discards_mutations() {
    let store = seeded_store();
    let ctx = QueryContext::new(store.catalog().clone(), &store);
    let m = ctx.path("Member", "m").unwrap();
    let age = m.attr("age").unwrap();

    let scope = Scope::begin(&store).unwrap();
    ctx.bulk_delete(Delete::from(&m).filter(age.lt(28))).unwrap();
    assert_eq!(store.len("Member"), 2);
    scope.rollback().unwrap();
    assert_eq!(store.len("Member"), 4);

    let scope = Scope::begin(&store).unwrap();
    ctx.bulk_delete(Delete::from(&m).filter(age.lt(28))).unwrap();
    scope.commit().unwrap();
    assert_eq!(store.len("Member"), 2);
}

#[test]
fn test_dropped_scope_rolls_back() {
    let store = seeded_store();
    let ctx = QueryContext::new(store.catalog().clone(), &store);
    let m = ctx.path("Member", "m").unwrap();

    {
        let _scope = Scope::begin(&store).unwrap();
        ctx.bulk_delete(Delete::from(&m)).unwrap();
        assert_eq!(store.len("Member"), 0);
    }
    assert_eq!(store.len("Member"), 4);
}
