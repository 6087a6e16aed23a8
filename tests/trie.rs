//! Wildcard matching laws (spec §8) against the subscription trie.

use mqtt_broker_core::mqtt::trie::Trie;

#[test]
fn literal_filter_matches_only_the_same_topic() {
    let mut trie = Trie::new();
    trie.subscribe("sensors/temp", 1);

    assert_eq!(trie.matching_sessions("sensors/temp").into_iter().collect::<Vec<_>>(), vec![1]);
    assert!(trie.matching_sessions("sensors/temp2").is_empty());
    assert!(trie.matching_sessions("sensors").is_empty());
}

#[test]
fn single_level_wildcard_matches_exactly_one_segment() {
    let mut trie = Trie::new();
    trie.subscribe("a/+/c", 1);

    assert!(!trie.matching_sessions("a/x/c").is_empty());
    assert!(!trie.matching_sessions("a/anything/c").is_empty());
    assert!(trie.matching_sessions("a/x/y/c").is_empty());
    assert!(trie.matching_sessions("a//c").is_empty());
    assert!(trie.matching_sessions("a/c").is_empty());
}

#[test]
fn multi_level_wildcard_matches_the_prefix_and_everything_under_it() {
    let mut trie = Trie::new();
    trie.subscribe("a/#", 1);

    assert!(!trie.matching_sessions("a").is_empty());
    assert!(!trie.matching_sessions("a/b").is_empty());
    assert!(!trie.matching_sessions("a/b/c").is_empty());
    assert!(trie.matching_sessions("ab").is_empty());
}

#[test]
fn bare_hash_matches_everything_except_dollar_prefixed_topics() {
    let mut trie = Trie::new();
    trie.subscribe("#", 1);

    assert!(!trie.matching_sessions("anything").is_empty());
    assert!(!trie.matching_sessions("a/b/c").is_empty());
    assert!(trie.matching_sessions("$SYS/uptime").is_empty());
}

#[test]
fn scenario_3_multi_level_wildcard() {
    let mut trie = Trie::new();
    trie.subscribe("logs/#", 7);

    for topic in ["logs", "logs/a", "logs/a/b"] {
        assert!(!trie.matching_sessions(topic).is_empty(), "expected {topic} to match logs/#");
    }
    assert!(trie.matching_sessions("loghouse").is_empty());
}

#[test]
fn scenario_2_single_level_wildcard_with_overlapping_subscribers() {
    let mut trie = Trie::new();
    trie.subscribe("home/+/temp", 1); // X
    trie.subscribe("home/kitchen/temp", 2); // Y

    let matches = trie.matching_sessions("home/kitchen/temp");
    assert_eq!(matches.len(), 2);
    assert!(matches.contains(&1));
    assert!(matches.contains(&2));

    assert!(trie.matching_sessions("home/kitchen/outer/temp").is_empty());
}

#[test]
fn unsubscribe_removes_exactly_that_sessions_interest() {
    let mut trie = Trie::new();
    trie.subscribe("a/b", 1);
    trie.subscribe("a/b", 2);

    trie.unsubscribe("a/b", 1);
    let matches = trie.matching_sessions("a/b");
    assert_eq!(matches.len(), 1);
    assert!(matches.contains(&2));

    trie.unsubscribe("a/b", 2);
    assert!(trie.matching_sessions("a/b").is_empty());
}

#[test]
fn duplicate_subscribe_is_idempotent_for_matching() {
    let mut trie = Trie::new();
    trie.subscribe("a/b", 1);
    trie.subscribe("a/b", 1);

    assert_eq!(trie.matching_sessions("a/b").len(), 1);
}
