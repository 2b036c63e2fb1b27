mod common;

use common::{context, names};
use proptest::prelude::*;
use quarry::predicate::{ops, Condition, ConditionBuilder};
use quarry::sql::select_to_string;
use quarry::Select;

const MEMBERS: [(&str, i64); 4] =
    [("member1", 10), ("member2", 20), ("member3", 30), ("member4", 40)];

fn arb_username() -> impl Strategy<Value = Option<String>> {
    prop_oneof![
        Just(None),
        (1..=5usize).prop_map(|n| Some(format!("member{n}"))),
    ]
}

fn arb_age() -> impl Strategy<Value = Option<i64>> {
    prop::option::of(0..50i64)
}

proptest! {
    #[test]
    fn absent_criteria_do_not_change_the_query(
        username in arb_username(),
        min_age in arb_age(),
        max_age in arb_age(),
    ) {
        let ctx = context();
        let m = ctx.path("Member", "m").unwrap();
        let username_col = m.attr("username").unwrap();
        let age = m.attr("age").unwrap();

        let with_absent = Select::from(&m)
            .filter_all([
                ops::equals(&username_col, username.as_deref()),
                ops::greater_or_equal(&age, min_age),
                ops::less_or_equal(&age, max_age),
            ])
            .order_by(age.asc())
            .build()
            .unwrap();

        let mut builder = ConditionBuilder::new();
        builder
            .and_if(username.as_deref(), |u| username_col.eq(u))
            .and_if(min_age, |a| age.goe(a))
            .and_if(max_age, |a| age.loe(a));
        let only_present = Select::from(&m)
            .filter(builder.finish())
            .order_by(age.asc())
            .build()
            .unwrap();

        prop_assert_eq!(&with_absent, &only_present);
        prop_assert_eq!(select_to_string(&with_absent), select_to_string(&only_present));

        let expected: Vec<&str> = MEMBERS
            .iter()
            .filter(|(name, a)| {
                username.as_deref().is_none_or(|u| u == *name)
                    && min_age.is_none_or(|min| *a >= min)
                    && max_age.is_none_or(|max| *a <= max)
            })
            .map(|(name, _)| *name)
            .collect();
        prop_assert_eq!(names(&ctx.fetch_all(&with_absent).unwrap()), expected);
    }

    #[test]
    fn absent_is_identity_for_and_or(age_a in 0..50i64, age_b in 0..50i64) {
        let ctx = context();
        let m = ctx.path("Member", "m").unwrap();
        let age = m.attr("age").unwrap();
        let cond = age.gt(age_a).or(age.lt(age_b));

        prop_assert_eq!(cond.clone().and(Condition::absent()), cond.clone());
        prop_assert_eq!(Condition::absent().or(cond.clone()), cond.clone());
        prop_assert_eq!(ops::and([Condition::absent(), cond.clone()]), cond.clone());
        prop_assert!(ops::not(Condition::absent()).is_absent());
    }
}

#[test]
fn test_no_criteria_renders_without_where() {
    let ctx = context();
    let m = ctx.path("Member", "m").unwrap();
    let none: Option<i64> = None;
    let spec = Select::from(&m)
        .filter(ops::equals(&m.attr("age").unwrap(), none))
        .build()
        .unwrap();

    assert!(!select_to_string(&spec).contains("WHERE"));
}
