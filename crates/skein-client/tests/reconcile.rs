//! Engine-to-reconciler round trips: events produced by real mutations
//! must drive the cache to the store's state, with propagated changes
//! classified and the right derived views staled.

use skein_core::event::{ChangeEvent, ChangeKind, Scope};
use skein_core::model::{ItemId, UserId};
use skein_core::propagate::FieldChanges;
use skein_core::{Engine, EngineConfig, ListType};

use skein_client::{
    CacheReconciler, Classification, Dependency, ListCache, Outcome, ViewKey,
};

fn alice() -> UserId {
    UserId::new_unchecked("su-alice")
}

fn reconciler_for(engine: &Engine, user: &UserId) -> CacheReconciler {
    CacheReconciler::new(
        user.clone(),
        engine.config().propagation_recency_window_ms,
    )
}

#[test]
fn cache_converges_with_the_store() {
    let mut engine = Engine::in_memory(EngineConfig::default()).expect("engine");
    let list = engine
        .create_list(&alice(), "Chores", ListType::Simple)
        .expect("list");

    let rx = engine.events().subscribe(Scope::List(list.id.clone()));
    let mut reconciler = reconciler_for(&engine, &alice());
    reconciler.track_list(list.clone());

    let swept = engine
        .create_item(&alice(), &list.id, "sweep", None)
        .expect("item");
    let mopped = engine
        .create_item(&alice(), &list.id, "mop", None)
        .expect("item");
    engine.delete_item(&alice(), &swept.id).expect("delete");

    for event in rx.try_iter() {
        reconciler.apply_at(&event, event.wall_ts_us());
    }

    let cache = reconciler.list(&list.id).expect("tracked");
    let ids: Vec<&str> = cache.items().iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec![mopped.id.as_str()]);
}

#[test]
fn replayed_events_do_not_change_the_cache() {
    let mut engine = Engine::in_memory(EngineConfig::default()).expect("engine");
    let list = engine
        .create_list(&alice(), "Chores", ListType::Simple)
        .expect("list");
    let rx = engine.events().subscribe(Scope::List(list.id.clone()));
    let mut reconciler = reconciler_for(&engine, &alice());
    reconciler.track_list(list.clone());

    engine
        .create_item(&alice(), &list.id, "sweep", None)
        .expect("item");
    let events: Vec<ChangeEvent> = rx.try_iter().collect();

    for event in &events {
        assert!(matches!(
            reconciler.apply_at(event, event.wall_ts_us()),
            Outcome::Applied(_)
        ));
    }
    // Second delivery of the same events.
    for event in &events {
        assert_eq!(
            reconciler.apply_at(event, event.wall_ts_us()),
            Outcome::DroppedDuplicate
        );
    }
    assert_eq!(reconciler.list(&list.id).map(ListCache::len), Some(1));
}

#[test]
fn propagated_events_are_classified_from_their_tag() {
    let mut engine = Engine::in_memory(EngineConfig::default()).expect("engine");
    let plans = engine
        .create_list(&alice(), "Plans", ListType::Simple)
        .expect("list");
    let groceries = engine
        .create_list(&alice(), "Groceries", ListType::Grocery)
        .expect("list");
    let dinner = engine
        .create_item(&alice(), &plans.id, "dinner", None)
        .expect("item");
    let wine = engine
        .create_item(&alice(), &groceries.id, "wine", None)
        .expect("item");
    engine
        .create_parent_child_link(&alice(), &dinner.id, std::slice::from_ref(&wine.id))
        .expect("link");

    let rx = engine.events().subscribe(Scope::User(alice()));
    let mut reconciler = reconciler_for(&engine, &alice());
    reconciler.track_list(engine.get_list(&alice(), &plans.id).expect("list"));
    reconciler.track_list(engine.get_list(&alice(), &groceries.id).expect("list"));

    engine
        .update_item_with_propagation(&alice(), &dinner.id, &FieldChanges::status(true))
        .expect("propagate");

    let mut classifications = Vec::new();
    for event in rx.try_iter() {
        if let Outcome::Applied(classification) =
            reconciler.apply_at(&event, event.wall_ts_us())
        {
            classifications.push((event.item_id().cloned(), classification));
        }
    }
    assert_eq!(
        classifications,
        vec![
            (Some(dinner.id.clone()), Classification::UserEdit),
            (Some(wine.id.clone()), Classification::Propagated),
        ]
    );

    let cached_wine = reconciler
        .list(&groceries.id)
        .and_then(|cache| cache.get(&wine.id))
        .expect("cached");
    assert!(cached_wine.is_completed);
}

#[test]
fn untagged_events_fall_back_to_the_recency_heuristic() {
    let mut reconciler = CacheReconciler::new(alice(), 5_000);

    // Hand-built events from a producer that stamps no cause.
    let mut engine = Engine::in_memory(EngineConfig::default()).expect("engine");
    let list = engine
        .create_list(&alice(), "A", ListType::Simple)
        .expect("list");
    let parent = engine
        .create_item(&alice(), &list.id, "p", None)
        .expect("item");
    let child = engine
        .create_item(&alice(), &list.id, "c", None)
        .expect("item");
    engine
        .create_parent_child_link(&alice(), &parent.id, std::slice::from_ref(&child.id))
        .expect("link");
    let parent = engine.get_item(&alice(), &parent.id).expect("parent");
    let child = engine.get_item(&alice(), &child.id).expect("child");

    reconciler.track_list(list.clone());
    for item in [&parent, &child] {
        reconciler.apply_at(
            &ChangeEvent::Item {
                kind: ChangeKind::Insert,
                before: None,
                after: Some(item.clone()),
                cause: None,
                wall_ts_us: 0,
            },
            0,
        );
    }

    // Flip timestamps sit after the stored ones so the events are not
    // dropped as stale.
    let flip = |item: &skein_core::model::Item, delta_us: i64| {
        let ts = item.updated_at_us + delta_us;
        let mut after = item.clone();
        after.is_completed = true;
        after.updated_at_us = ts;
        let event = ChangeEvent::Item {
            kind: ChangeKind::Update,
            before: Some(item.clone()),
            after: Some(after),
            cause: None,
            wall_ts_us: ts,
        };
        (event, ts)
    };

    // Parent flip reads as a user edit (no parents of its own).
    let (event, ts) = flip(&parent, 1_000);
    assert_eq!(
        reconciler.apply_at(&event, ts),
        Outcome::Applied(Classification::UserEdit)
    );
    // Child flip delivered promptly, and the child has a parent: propagated.
    let (event, ts) = flip(&child, 2_000);
    assert_eq!(
        reconciler.apply_at(&event, ts),
        Outcome::Applied(Classification::Propagated)
    );
}

#[test]
fn untagged_child_flip_delivered_late_reads_as_a_user_edit() {
    let mut reconciler = CacheReconciler::new(alice(), 5_000);
    let mut engine = Engine::in_memory(EngineConfig::default()).expect("engine");
    let list = engine
        .create_list(&alice(), "A", ListType::Simple)
        .expect("list");
    let parent = engine
        .create_item(&alice(), &list.id, "p", None)
        .expect("item");
    let child = engine
        .create_item(&alice(), &list.id, "c", None)
        .expect("item");
    engine
        .create_parent_child_link(&alice(), &parent.id, std::slice::from_ref(&child.id))
        .expect("link");
    let child = engine.get_item(&alice(), &child.id).expect("child");

    reconciler.track_list(list);
    reconciler.apply_at(
        &ChangeEvent::Item {
            kind: ChangeKind::Insert,
            before: None,
            after: Some(child.clone()),
            cause: None,
            wall_ts_us: 0,
        },
        0,
    );

    // The flip only arrives a full minute after it happened: far outside
    // the recency window, so it cannot be trailing a cascade.
    let flipped_at = child.updated_at_us + 1_000;
    let mut after = child.clone();
    after.is_completed = true;
    after.updated_at_us = flipped_at;
    let event = ChangeEvent::Item {
        kind: ChangeKind::Update,
        before: Some(child),
        after: Some(after),
        cause: None,
        wall_ts_us: flipped_at,
    };
    assert_eq!(
        reconciler.apply_at(&event, flipped_at + 60_000_000),
        Outcome::Applied(Classification::UserEdit)
    );
}

#[test]
fn rollup_goes_stale_when_propagation_runs_through_untracked_lists() {
    let mut engine = Engine::in_memory(EngineConfig::default()).expect("engine");
    let plans = engine
        .create_list(&alice(), "Plans", ListType::Simple)
        .expect("list");
    let groceries = engine
        .create_list(&alice(), "Groceries", ListType::Grocery)
        .expect("list");
    let dinner = engine
        .create_item(&alice(), &plans.id, "dinner", None)
        .expect("item");
    let wine = engine
        .create_item(&alice(), &groceries.id, "wine", None)
        .expect("item");
    let opener = engine
        .create_item(&alice(), &groceries.id, "opener", None)
        .expect("item");
    engine
        .create_parent_child_link(&alice(), &dinner.id, std::slice::from_ref(&wine.id))
        .expect("link");
    engine
        .create_parent_child_link(&alice(), &wine.id, std::slice::from_ref(&opener.id))
        .expect("link");

    let rx = engine.events().subscribe(Scope::User(alice()));
    let mut reconciler = reconciler_for(&engine, &alice());
    // Only the plans list is mirrored; the cascade ends two lists away.
    reconciler.track_list(engine.get_list(&alice(), &plans.id).expect("list"));

    let rollup = ViewKey::CrossListQuery(alice());
    reconciler
        .views_mut()
        .register(rollup.clone(), [Dependency::Item(opener.id.clone())]);

    engine
        .update_item_with_propagation(&alice(), &dinner.id, &FieldChanges::status(true))
        .expect("propagate");
    for event in rx.try_iter() {
        reconciler.apply_at(&event, event.wall_ts_us());
    }

    assert!(
        reconciler.views().is_stale(&rollup),
        "rollup reading an untracked descendant must go stale"
    );
}

#[test]
fn link_change_stales_views_on_both_endpoints() {
    let mut engine = Engine::in_memory(EngineConfig::default()).expect("engine");
    let plans = engine
        .create_list(&alice(), "Plans", ListType::Simple)
        .expect("list");
    let groceries = engine
        .create_list(&alice(), "Groceries", ListType::Grocery)
        .expect("list");
    let dinner = engine
        .create_item(&alice(), &plans.id, "dinner", None)
        .expect("item");
    let wine = engine
        .create_item(&alice(), &groceries.id, "wine", None)
        .expect("item");

    let rx = engine.events().subscribe(Scope::User(alice()));
    let mut reconciler = reconciler_for(&engine, &alice());
    reconciler.track_list(engine.get_list(&alice(), &plans.id).expect("list"));
    reconciler.track_list(engine.get_list(&alice(), &groceries.id).expect("list"));

    // Views computed before the link: each item's link badge, the grocery
    // list summary, and a cross-list rollup that read both items.
    let dinner_badge = ViewKey::LinkSummary(dinner.id.clone());
    let wine_badge = ViewKey::LinkSummary(wine.id.clone());
    let grocery_summary = ViewKey::ListSummary(groceries.id.clone());
    let rollup = ViewKey::CrossListQuery(alice());
    reconciler
        .views_mut()
        .register(dinner_badge.clone(), [Dependency::Item(dinner.id.clone())]);
    reconciler
        .views_mut()
        .register(wine_badge.clone(), [Dependency::Item(wine.id.clone())]);
    reconciler
        .views_mut()
        .register(grocery_summary.clone(), [Dependency::List(groceries.id.clone())]);
    reconciler.views_mut().register(
        rollup.clone(),
        [
            Dependency::Item(dinner.id.clone()),
            Dependency::Item(wine.id.clone()),
        ],
    );

    engine
        .create_parent_child_link(&alice(), &dinner.id, std::slice::from_ref(&wine.id))
        .expect("link");
    for event in rx.try_iter() {
        reconciler.apply_at(&event, event.wall_ts_us());
    }

    assert!(reconciler.views().is_stale(&dinner_badge));
    assert!(reconciler.views().is_stale(&wine_badge));
    assert!(reconciler.views().is_stale(&grocery_summary));
    assert!(reconciler.views().is_stale(&rollup));
}

#[test]
fn multi_level_propagation_stales_summaries_in_every_touched_list() {
    let mut engine = Engine::in_memory(EngineConfig::default()).expect("engine");
    let plans = engine
        .create_list(&alice(), "Plans", ListType::Simple)
        .expect("list");
    let groceries = engine
        .create_list(&alice(), "Groceries", ListType::Grocery)
        .expect("list");
    let dinner = engine
        .create_item(&alice(), &plans.id, "dinner", None)
        .expect("item");
    let wine = engine
        .create_item(&alice(), &groceries.id, "wine", None)
        .expect("item");
    let opener = engine
        .create_item(&alice(), &groceries.id, "opener", None)
        .expect("item");
    engine
        .create_parent_child_link(&alice(), &dinner.id, std::slice::from_ref(&wine.id))
        .expect("link");
    engine
        .create_parent_child_link(&alice(), &wine.id, std::slice::from_ref(&opener.id))
        .expect("link");

    let rx = engine.events().subscribe(Scope::User(alice()));
    let mut reconciler = reconciler_for(&engine, &alice());
    reconciler.track_list(engine.get_list(&alice(), &plans.id).expect("list"));
    reconciler.track_list(engine.get_list(&alice(), &groceries.id).expect("list"));

    let plans_summary = ViewKey::ListSummary(plans.id.clone());
    let grocery_summary = ViewKey::ListSummary(groceries.id.clone());
    reconciler
        .views_mut()
        .register(plans_summary.clone(), [Dependency::List(plans.id.clone())]);
    reconciler
        .views_mut()
        .register(grocery_summary.clone(), [Dependency::List(groceries.id.clone())]);

    engine
        .update_item_with_propagation(&alice(), &dinner.id, &FieldChanges::status(true))
        .expect("propagate");
    for event in rx.try_iter() {
        reconciler.apply_at(&event, event.wall_ts_us());
    }

    assert!(reconciler.views().is_stale(&plans_summary));
    assert!(reconciler.views().is_stale(&grocery_summary));

    let opener_id: &ItemId = &opener.id;
    let cached = reconciler
        .list(&groceries.id)
        .and_then(|cache| cache.get(opener_id))
        .expect("cached");
    assert!(cached.is_completed, "second-level descendant reconciled");
}
