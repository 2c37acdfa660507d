//! End-to-end evaluation scenarios through the public client API.

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
    thread,
    time::Duration,
};

use featureflags::{
    Client, DecisionSource, Error, FlagDefinition, FlagListResponse, FlagSource, FlagValue,
    Groups, PollerConfig, PollerState, Properties, PropertyValue,
};

struct JsonSource(Vec<FlagDefinition>);

impl FlagSource for JsonSource {
    fn fetch_flags(&mut self) -> featureflags::Result<Vec<FlagDefinition>> {
        Ok(self.0.clone())
    }
}

struct UnauthorizedSource;

impl FlagSource for UnauthorizedSource {
    fn fetch_flags(&mut self) -> featureflags::Result<Vec<FlagDefinition>> {
        thread::sleep(Duration::from_millis(5));
        Err(Error::Unauthorized)
    }
}

#[derive(Clone, Default)]
struct RecordingDecider {
    requests: Arc<Mutex<Vec<(String, Groups)>>>,
}

impl DecisionSource for RecordingDecider {
    fn decide(
        &self,
        subject_id: &str,
        groups: &Groups,
    ) -> featureflags::Result<HashMap<String, FlagValue>> {
        self.requests
            .lock()
            .unwrap()
            .push((subject_id.to_owned(), groups.clone()));
        Ok(HashMap::from([
            ("server-side".to_owned(), FlagValue::from("variant-from-server")),
            ("server-off".to_owned(), FlagValue::Boolean(false)),
            ("no-rules".to_owned(), FlagValue::Boolean(true)),
        ]))
    }
}

const FLAGS: &str = r#"
{
  "results": [
    {"key": "beta", "is_simple_flag": true, "rollout_percentage": null, "active": false},
    {"key": "rollout50", "is_simple_flag": true, "rollout_percentage": 50, "active": true},
    {
      "key": "multivariate",
      "is_simple_flag": false,
      "active": true,
      "filters": {
        "groups": [{"properties": [{"key": "plan", "operator": "exact", "value": ["pro", "team"], "type": "person"}]}],
        "multivariate": {"variants": [{"key": "A", "rollout_percentage": 30}, {"key": "B", "rollout_percentage": 70}]}
      }
    },
    {
      "key": "adults",
      "is_simple_flag": false,
      "active": true,
      "filters": {"groups": [{"properties": [{"key": "age", "operator": "gte", "value": 18}]}]}
    },
    {
      "key": "future-operator",
      "is_simple_flag": false,
      "active": true,
      "filters": {"groups": [{"properties": [{"key": "age", "operator": "is_date_before", "value": "2020-01-01"}]}]}
    },
    {
      "key": "server-side",
      "is_simple_flag": false,
      "active": true,
      "filters": {
        "aggregation_group_type_index": 0,
        "groups": [{"properties": []}],
        "multivariate": {"variants": [{"key": "control"}, {"key": "test"}]}
      }
    },
    {
      "key": "server-off",
      "is_simple_flag": false,
      "active": true,
      "filters": {"groups": [{}], "multivariate": {"variants": [{"key": "control", "rollout_percentage": 50}, {"key": "test"}]}}
    },
    {"key": "no-rules", "is_simple_flag": false, "active": true}
  ]
}
"#;

fn client() -> (Client, RecordingDecider) {
    let flags: FlagListResponse = serde_json::from_str(FLAGS).unwrap();
    let decider = RecordingDecider::default();
    let client = Client::with_sources(
        JsonSource(flags.results),
        decider.clone(),
        Arc::new(|_: &str, _: &Error| {}),
        PollerConfig::default(),
    )
    .unwrap();
    (client, decider)
}

fn properties(entries: &[(&str, PropertyValue)]) -> Properties {
    entries
        .iter()
        .map(|(key, value)| ((*key).to_owned(), value.clone()))
        .collect()
}

#[test]
fn inactive_flag_is_excluded() {
    let (client, _) = client();

    let snapshot = client.get_feature_flags();
    assert!(snapshot.flags().iter().all(|flag| flag.key != "beta"));
    assert_eq!(snapshot.len(), 7);

    let none = Properties::new();
    assert!(client.is_feature_enabled("beta", "alice", true, &none, &none));
    assert!(!client.is_feature_enabled("beta", "alice", false, &none, &none));
    assert_eq!(client.poller_state(), PollerState::Ready);

    client.shutdown().unwrap();
}

#[test]
fn simple_rollout_is_stable() {
    let (client, decider) = client();
    let none = Properties::new();

    let first = client.get_feature_flag("rollout50", "user-42", true.into(), &none, &none);
    for _ in 0..50 {
        assert_eq!(
            client.get_feature_flag("rollout50", "user-42", true.into(), &none, &none),
            first
        );
    }
    assert!(first.as_boolean().is_some());
    assert!(decider.requests.lock().unwrap().is_empty());

    client.shutdown().unwrap();
}

#[test]
fn multivariate_resolves_to_defined_variants() {
    let (client, _) = client();
    let pro = properties(&[("plan", "pro".into())]);
    let none = Properties::new();

    let mut seen = HashMap::new();
    for i in 0..500 {
        let value =
            client.get_feature_flag("multivariate", &format!("user-{i}"), false.into(), &pro, &none);
        let key = value.as_variant().expect("variant").to_owned();
        assert!(key == "A" || key == "B", "{key}");
        *seen.entry(key).or_insert(0) += 1;
    }
    assert_eq!(seen.len(), 2);

    // "multivariate.user-42variant" hashes to ~0.60.
    assert_eq!(
        client.get_feature_flag("multivariate", "user-42", false.into(), &pro, &none),
        FlagValue::from("B")
    );

    let free = properties(&[("plan", "free".into())]);
    assert_eq!(
        client.get_feature_flag("multivariate", "user-42", true.into(), &free, &none),
        FlagValue::Boolean(false)
    );

    client.shutdown().unwrap();
}

#[test]
fn predicate_errors_fall_back_to_default() {
    let (client, _) = client();
    let none = Properties::new();

    // Missing property.
    assert!(client.is_feature_enabled("adults", "alice", true, &none, &none));
    // Not orderable.
    let text_age = properties(&[("age", "twenty".into())]);
    assert!(!client.is_feature_enabled("adults", "alice", false, &text_age, &none));

    let adult = properties(&[("age", 30.into())]);
    assert!(client.is_feature_enabled("adults", "alice", false, &adult, &none));
    let minor = properties(&[("age", 12.into())]);
    assert!(!client.is_feature_enabled("adults", "alice", true, &minor, &none));

    client.shutdown().unwrap();
}

#[test]
fn unknown_operator_does_not_match() {
    let (client, _) = client();
    let none = Properties::new();
    let age = properties(&[("age", 30.into())]);

    assert!(!client.is_feature_enabled("future-operator", "alice", true, &age, &none));

    client.shutdown().unwrap();
}

#[test]
fn flag_without_rules_is_disabled() {
    let (client, decider) = client();
    let none = Properties::new();

    assert_eq!(
        client.get_feature_flag("no-rules", "alice", true.into(), &none, &none),
        FlagValue::Boolean(false)
    );
    assert!(decider.requests.lock().unwrap().is_empty());

    client.shutdown().unwrap();
}

#[test]
fn incomplete_variants_are_decided_remotely() {
    let (client, decider) = client();
    let none = Properties::new();

    assert_eq!(
        client.get_feature_flag("server-side", "alice", false.into(), &none, &none),
        FlagValue::from("variant-from-server")
    );
    assert!(!client.is_feature_enabled("server-off", "alice", true, &none, &none));

    let requests = decider.requests.lock().unwrap();
    assert_eq!(requests.len(), 2);
    assert_eq!(requests[0].0, "alice");
    // Group-aggregated flags fall back without group context.
    assert!(requests[0].1.is_empty());
    drop(requests);

    client.shutdown().unwrap();
}

#[test]
fn remote_flag_with_group_context() {
    let (client, decider) = client();
    let groups = Groups::from([("company".to_owned(), "acme".to_owned())]);

    assert_eq!(
        client.get_remote_flag("server-side", "alice", &groups),
        Some(FlagValue::from("variant-from-server"))
    );
    assert_eq!(
        client.get_remote_flag("not-on-server", "alice", &groups),
        Some(FlagValue::Boolean(false))
    );
    assert_eq!(decider.requests.lock().unwrap()[0].1, groups);

    client.shutdown().unwrap();
}

#[test]
fn concurrent_readers_see_the_same_snapshot() {
    let (client, _) = client();
    let client = Arc::new(client);
    let evaluations = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let client = Arc::clone(&client);
            let evaluations = Arc::clone(&evaluations);
            std::thread::spawn(move || {
                let none = Properties::new();
                for _ in 0..100 {
                    client.get_feature_flag("rollout50", "user-42", true.into(), &none, &none);
                    evaluations.fetch_add(1, Ordering::SeqCst);
                }
                client.get_feature_flags().len()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), 7);
    }
    assert_eq!(evaluations.load(Ordering::SeqCst), 800);

    match Arc::try_unwrap(client) {
        Ok(client) => client.shutdown().unwrap(),
        Err(_) => panic!("client still shared"),
    }
}

#[test]
fn stop_releases_readers_waiting_for_first_load() {
    let client = Arc::new(
        Client::with_sources(
            UnauthorizedSource,
            RecordingDecider::default(),
            Arc::new(|_: &str, _: &Error| {}),
            PollerConfig::new()
                .with_interval(Duration::from_millis(10))
                .with_jitter(Duration::ZERO),
        )
        .unwrap(),
    );

    let reader = {
        let client = Arc::clone(&client);
        thread::spawn(move || {
            let none = Properties::new();
            client.is_feature_enabled("rollout50", "alice", true, &none, &none)
        })
    };

    thread::sleep(Duration::from_millis(50));
    assert!(!reader.is_finished());

    client.stop();
    assert!(reader.join().unwrap());
    assert!(matches!(
        client.poller_state(),
        PollerState::ShuttingDown | PollerState::Stopped
    ));
    assert!(client.get_feature_flags().is_empty());

    match Arc::try_unwrap(client) {
        Ok(client) => client.shutdown().unwrap(),
        Err(_) => panic!("client still shared"),
    }
}
