mod common;

use common::{add_member, context, names, seeded_store, usernames};
use quarry::predicate::{ops, Condition, ConditionBuilder};
use quarry::query::JoinKind;
use quarry::{QueryContext, QueryError, Select, Value};

#[test]
fn test_find_by_username() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let spec = Select::from(&m)
        .filter(m.attr("username").unwrap().eq("member1"))
        .build()
        .unwrap();

    let row = ctx.fetch_one(&spec).unwrap().unwrap();
    assert_eq!(row.try_get::<String>("username").unwrap(), "member1");
    assert_eq!(row.try_get::<i64>("age").unwrap(), 10);
}

#[test]
fn test_search_with_builder_matches_combinators() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let username = m.attr("username").unwrap();
    let age = m.attr("age").unwrap();

    let name_param: Option<&str> = Some("member1");
    let age_param: Option<i64> = None;

    let mut builder = ConditionBuilder::new();
    builder
        .and_if(name_param, |n| username.eq(n))
        .and_if(age_param, |a| age.eq(a));
    let from_builder = Select::from(&m).filter(builder.finish()).build().unwrap();

    let from_ops = Select::from(&m)
        .filter(ops::equals(&username, name_param).and(ops::equals(&age, age_param)))
        .build()
        .unwrap();

    assert_eq!(from_builder, from_ops);
    assert_eq!(names(&ctx.fetch_all(&from_builder).unwrap()), ["member1"]);
}

#[test]
fn test_empty_search_returns_everything() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let age = m.attr("age").unwrap();
    let none: Option<i64> = None;

    let spec = Select::from(&m)
        .filter_all([ops::greater_or_equal(&age, none), ops::like(&age.string_value(), None)])
        .build()
        .unwrap();

    assert!(spec.predicate().is_absent());
    assert_eq!(ctx.fetch_count(&spec).unwrap(), 4);
}

#[test]
fn test_filter_all_and_or() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let username = m.attr("username").unwrap();
    let age = m.attr("age").unwrap();

    let spec = Select::from(&m)
        .filter_all([username.eq("member1"), age.eq(10)])
        .build()
        .unwrap();
    assert_eq!(ctx.fetch_all(&spec).unwrap().len(), 1);

    let spec = Select::from(&m)
        .filter(age.eq(10) | age.eq(40))
        .order_by(age.asc())
        .build()
        .unwrap();
    assert_eq!(names(&ctx.fetch_all(&spec).unwrap()), ["member1", "member4"]);

    let spec = Select::from(&m)
        .filter((age.eq(10) | age.eq(40)).not())
        .order_by(age.asc())
        .build()
        .unwrap();
    assert_eq!(names(&ctx.fetch_all(&spec).unwrap()), ["member2", "member3"]);
}

#[test]
fn test_sort_with_nulls_last() {
    let store = seeded_store();
    add_member(&store, None, 100, None);
    add_member(&store, Some("member5"), 100, None);
    add_member(&store, Some("member6"), 100, None);
    let ctx = QueryContext::new(store.catalog().clone(), store);

    let m = ctx.path("Member", "m").unwrap();
    let age = m.attr("age").unwrap();
    let username = m.attr("username").unwrap();
    let spec = Select::from(&m)
        .filter(age.eq(100))
        .order_by(age.desc())
        .order_by(username.asc().nulls_last())
        .build()
        .unwrap();

    let rows = ctx.fetch_all(&spec).unwrap();
    assert_eq!(
        usernames(&rows),
        [Some("member5".to_string()), Some("member6".to_string()), None]
    );

    let spec = Select::from(&m)
        .filter(age.eq(100))
        .order_by(username.asc().nulls_first())
        .build()
        .unwrap();
    assert_eq!(usernames(&ctx.fetch_all(&spec).unwrap())[0], None);
}

#[test]
fn test_paging() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let spec = Select::from(&m)
        .order_by(m.attr("username").unwrap().desc())
        .page(1, 2)
        .build()
        .unwrap();

    assert_eq!(names(&ctx.fetch_all(&spec).unwrap()), ["member3", "member2"]);

    let page = ctx.fetch_page(&spec).unwrap();
    assert_eq!(page.total, 4);
    assert_eq!(page.offset, 1);
    assert_eq!(page.limit, Some(2));
    assert_eq!(page.len(), 2);
    assert!(page.has_next());
}

#[test]
fn test_page_past_the_end() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let spec = Select::from(&m).page(10, 2).build().unwrap();

    let page = ctx.fetch_page(&spec).unwrap();
    assert!(page.is_empty());
    assert_eq!(page.total, 4);
    assert!(!page.has_next());
}

#[test]
fn test_fetch_first_and_fetch_one() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let age = m.attr("age").unwrap();

    let spec = Select::from(&m).order_by(age.desc()).build().unwrap();
    let first = ctx.fetch_first(&spec).unwrap().unwrap();
    assert_eq!(first.try_get::<String>("username").unwrap(), "member4");

    assert!(matches!(ctx.fetch_one(&spec), Err(QueryError::TooManyResults(4))));
}

#[test]
fn test_distinct() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let team_id = m.attr("team_id").unwrap();

    let spec = Select::from(&m)
        .select([team_id.clone()])
        .distinct()
        .order_by(team_id.asc())
        .build()
        .unwrap();
    let ids: Vec<(i64,)> = ctx.fetch_all_as(&spec).unwrap();
    assert_eq!(ids, [(1,), (2,)]);
}

#[test]
fn test_like_in_between() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let username = m.attr("username").unwrap();
    let age = m.attr("age").unwrap();

    let like = Select::from(&m)
        .filter(username.like("%ber_"))
        .build()
        .unwrap();
    assert_eq!(ctx.fetch_count(&like).unwrap(), 4);

    let within = Select::from(&m)
        .filter(age.is_in([10, 30]))
        .order_by(age.asc())
        .build()
        .unwrap();
    assert_eq!(names(&ctx.fetch_all(&within).unwrap()), ["member1", "member3"]);

    let outside = Select::from(&m)
        .filter(age.is_not_in([10, 30]))
        .order_by(age.asc())
        .build()
        .unwrap();
    assert_eq!(names(&ctx.fetch_all(&outside).unwrap()), ["member2", "member4"]);

    let between = Select::from(&m)
        .filter(age.between(20, 30))
        .order_by(age.asc())
        .build()
        .unwrap();
    assert_eq!(names(&ctx.fetch_all(&between).unwrap()), ["member2", "member3"]);
}

#[test]
fn test_null_comparisons_are_unknown() {
    let store = seeded_store();
    add_member(&store, None, 50, None);
    let ctx = QueryContext::new(store.catalog().clone(), store);
    let m = ctx.path("Member", "m").unwrap();
    let username = m.attr("username").unwrap();

    let ne = Select::from(&m).filter(username.ne("member1")).build().unwrap();
    assert_eq!(ctx.fetch_count(&ne).unwrap(), 3);

    let null = Select::from(&m).filter(username.is_null()).build().unwrap();
    assert_eq!(ctx.fetch_count(&null).unwrap(), 1);

    let not_null = Select::from(&m).filter(username.is_not_null()).build().unwrap();
    assert_eq!(ctx.fetch_count(&not_null).unwrap(), 4);
}

#[test]
fn test_inner_join_on_relationship() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let t = ctx.path("Team", "t").unwrap();

    let spec = Select::from(&m)
        .join(m.relation("team").unwrap(), &t)
        .unwrap()
        .filter(t.attr("name").unwrap().eq("teamA"))
        .order_by(m.attr("age").unwrap().asc())
        .build()
        .unwrap();

    assert_eq!(names(&ctx.fetch_all(&spec).unwrap()), ["member1", "member2"]);
}

#[test]
fn test_join_rejects_wrong_target() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let other = ctx.path("Member", "o").unwrap();

    let err = Select::from(&m).join(m.relation("team").unwrap(), &other).unwrap_err();
    assert!(matches!(err, QueryError::InvalidJoin(_)));
    assert!(matches!(m.relation("friends"), Err(QueryError::UnknownAttribute { .. })));
}

#[test]
fn test_theta_join() {
    let store = seeded_store();
    add_member(&store, Some("teamA"), 0, None);
    add_member(&store, Some("teamB"), 0, None);
    add_member(&store, Some("teamC"), 0, None);
    let ctx = QueryContext::new(store.catalog().clone(), store);

    let m = ctx.path("Member", "m").unwrap();
    let t = ctx.path("Team", "t").unwrap();
    let spec = Select::from(&m)
        .also_from(&t)
        .filter(m.attr("username").unwrap().eq(t.attr("name").unwrap()))
        .order_by(m.attr("username").unwrap().asc())
        .build()
        .unwrap();

    assert_eq!(names(&ctx.fetch_all(&spec).unwrap()), ["teamA", "teamB"]);
}

#[test]
fn test_left_join_with_on_keeps_every_member() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let t = ctx.path("Team", "t").unwrap();
    let team_name = t.attr("name").unwrap();

    let spec = Select::from(&m)
        .select([m.attr("username").unwrap(), team_name.clone()])
        .left_join(m.relation("team").unwrap(), &t)
        .unwrap()
        .on(team_name.eq("teamA"))
        .unwrap()
        .order_by(m.attr("age").unwrap().asc())
        .build()
        .unwrap();

    let rows: Vec<(String, Option<String>)> = ctx.fetch_all_as(&spec).unwrap();
    assert_eq!(
        rows,
        [
            ("member1".to_string(), Some("teamA".to_string())),
            ("member2".to_string(), Some("teamA".to_string())),
            ("member3".to_string(), None),
            ("member4".to_string(), None),
        ]
    );
}

#[test]
fn test_adhoc_left_join_on_unrelated_entity() {
    let store = seeded_store();
    add_member(&store, Some("teamA"), 0, None);
    let ctx = QueryContext::new(store.catalog().clone(), store);

    let m = ctx.path("Member", "m").unwrap();
    let t = ctx.path("Team", "t").unwrap();
    let team_name = t.attr("name").unwrap();
    let spec = Select::from(&m)
        .select([m.attr("username").unwrap(), team_name.clone()])
        .join_entity(
            JoinKind::LeftOuter,
            &t,
            m.attr("username").unwrap().eq(&team_name),
        )
        .unwrap()
        .build()
        .unwrap();

    let rows = ctx.fetch_all(&spec).unwrap();
    assert_eq!(rows.len(), 5);
    let matched: Vec<_> = rows
        .iter()
        .filter(|r| !r.get_named("name").unwrap().is_null())
        .collect();
    assert_eq!(matched.len(), 1);
    assert_eq!(matched[0].get_named("username"), Some(&Value::from("teamA")));
}

#[test]
fn test_fetch_join_loads_relationship() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let t = ctx.path("Team", "t").unwrap();

    let plain = Select::from(&m)
        .filter(m.attr("username").unwrap().eq("member1"))
        .build()
        .unwrap();
    let row = ctx.fetch_one(&plain).unwrap().unwrap();
    assert!(!row.is_loaded("team"));

    let fetched = Select::from(&m)
        .join(m.relation("team").unwrap(), &t)
        .unwrap()
        .fetch_join()
        .unwrap()
        .filter(m.attr("username").unwrap().eq("member1"))
        .build()
        .unwrap();
    let row = ctx.fetch_one(&fetched).unwrap().unwrap();
    assert!(row.is_loaded("team"));
    let team = row.related("team").unwrap();
    assert_eq!(team.try_get::<String>("name").unwrap(), "teamA");
}

#[test]
fn test_fetch_join_requires_relationship() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let t = ctx.path("Team", "t").unwrap();

    let err = Select::from(&m)
        .join_entity(JoinKind::Inner, &t, Condition::absent())
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidJoin(_)));

    let err = Select::from(&m)
        .join_entity(
            JoinKind::Inner,
            &t,
            m.attr("team_id").unwrap().eq(t.id()),
        )
        .unwrap()
        .fetch_join()
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidJoin(_)));
}

#[test]
fn test_unknown_names_fail_at_build() {
    let ctx = context();
    assert!(matches!(ctx.path("Ghost", "g"), Err(QueryError::UnknownEntity(_))));

    let m = ctx.path("Member", "m").unwrap();
    assert!(matches!(m.attr("salary"), Err(QueryError::UnknownAttribute { .. })));

    let err = Select::from(&m)
        .filter(m.attr("age").unwrap().eq("ten"))
        .build()
        .unwrap_err();
    assert!(matches!(err, QueryError::TypeMismatch { .. }));
}

#[test]
fn test_filter_on_unjoined_alias_fails_at_build() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let t = ctx.path("Team", "t").unwrap();

    let err = Select::from(&m)
        .filter(t.attr("name").unwrap().eq("teamA"))
        .build()
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidJoin(_)));

    // joined under `t`, ordered by a second, never joined Team alias
    let other = ctx.path("Team", "other").unwrap();
    let err = Select::from(&m)
        .join(m.relation("team").unwrap(), &t)
        .unwrap()
        .order_by(other.attr("name").unwrap().asc())
        .build()
        .unwrap_err();
    assert!(matches!(err, QueryError::InvalidJoin(_)));
}

#[derive(Default)]
struct MemberSearch<'a> {
    username: Option<&'a str>,
    team_name: Option<&'a str>,
    age_goe: Option<i64>,
    age_loe: Option<i64>,
}

fn search(
    ctx: &QueryContext<quarry::MemoryStore>,
    criteria: &MemberSearch<'_>,
) -> Vec<(String, String)> {
    let m = ctx.path("Member", "m").unwrap();
    let t = ctx.path("Team", "t").unwrap();
    let age = m.attr("age").unwrap();
    let team_name = t.attr("name").unwrap();

    let spec = Select::from(&m)
        .select([m.attr("username").unwrap(), team_name.clone()])
        .left_join(m.relation("team").unwrap(), &t)
        .unwrap()
        .filter_all([
            ops::equals(&m.attr("username").unwrap(), criteria.username),
            ops::equals(&team_name, criteria.team_name),
            ops::range_between(&age, criteria.age_goe, criteria.age_loe),
        ])
        .order_by(age.asc())
        .build()
        .unwrap();
    ctx.fetch_all_as(&spec).unwrap()
}

#[test]
fn test_member_search() {
    let ctx = context();

    let found = search(
        &ctx,
        &MemberSearch {
            team_name: Some("teamB"),
            age_goe: Some(35),
            age_loe: Some(40),
            ..MemberSearch::default()
        },
    );
    assert_eq!(found, [("member4".to_string(), "teamB".to_string())]);

    let found = search(
        &ctx,
        &MemberSearch {
            age_loe: Some(20),
            ..MemberSearch::default()
        },
    );
    assert_eq!(found.len(), 2);

    assert_eq!(search(&ctx, &MemberSearch::default()).len(), 4);
    assert!(search(
        &ctx,
        &MemberSearch {
            username: Some("member1"),
            team_name: Some("teamB"),
            ..MemberSearch::default()
        }
    )
    .is_empty());
}
