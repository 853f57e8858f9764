use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use weakbus::error::BusError;
use weakbus::weakbus::demo::{KlasseA, KlasseB, NachrichtVonA, NachrichtVonB};
use weakbus::weakbus::{HandlerResult, LivenessToken, MessageBus};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[derive(Debug, Clone, PartialEq)]
struct Ping(u32);

#[derive(Debug, Clone, PartialEq)]
struct Pong(u32);

type Journal = Arc<Mutex<Vec<String>>>;

struct Listener {
    name: &'static str,
    journal: Journal,
}

impl Listener {
    fn new(name: &'static str, journal: &Journal) -> Arc<Self> {
        Arc::new(Self { name, journal: journal.clone() })
    }

    fn on_ping(&self, ping: &Ping) -> HandlerResult {
        self.journal.lock().unwrap().push(format!("{}:ping:{}", self.name, ping.0));
        Ok(())
    }

    fn on_pong(&self, pong: &Pong) -> HandlerResult {
        self.journal.lock().unwrap().push(format!("{}:pong:{}", self.name, pong.0));
        Ok(())
    }
}

fn entries(journal: &Journal) -> Vec<String> {
    journal.lock().unwrap().clone()
}

#[test]
fn only_subscribers_of_the_exact_type_are_invoked() {
    init_logger();
    let bus = MessageBus::new();
    let journal = Journal::default();
    let pinger = Listener::new("p", &journal);
    let ponger = Listener::new("q", &journal);

    bus.subscribe_bound(&pinger, Listener::on_ping);
    bus.subscribe_bound(&ponger, Listener::on_pong);

    let delivery = bus.publish(&Ping(1)).unwrap();

    assert_eq!(delivery.delivered, 1);
    assert_eq!(entries(&journal), vec!["p:ping:1"]);
}

#[test]
fn subscribers_run_in_registration_order() {
    init_logger();
    let bus = MessageBus::new();
    let journal = Journal::default();
    let s1 = Listener::new("s1", &journal);
    let s2 = Listener::new("s2", &journal);
    let s3 = Listener::new("s3", &journal);

    bus.subscribe_bound(&s1, Listener::on_ping);
    bus.subscribe_bound(&s2, Listener::on_ping);
    bus.subscribe_bound(&s3, Listener::on_ping);

    bus.publish(&Ping(7)).unwrap();

    assert_eq!(entries(&journal), vec!["s1:ping:7", "s2:ping:7", "s3:ping:7"]);
}

#[test]
fn dropped_receivers_are_pruned_on_next_publish() {
    init_logger();
    let bus = MessageBus::new();
    let journal = Journal::default();
    let s1 = Listener::new("s1", &journal);
    let s2 = Listener::new("s2", &journal);
    let s3 = Listener::new("s3", &journal);

    bus.subscribe_bound(&s1, Listener::on_ping);
    bus.subscribe_bound(&s2, Listener::on_ping);
    bus.subscribe_bound(&s3, Listener::on_ping);
    drop(s2);

    // Dead entries stay until a publish of the same type
    assert_eq!(bus.subscriber_count::<Ping>(), 3);
    assert_eq!(bus.alive_count::<Ping>(), 2);
    bus.publish(&Pong(0)).unwrap();
    assert_eq!(bus.subscriber_count::<Ping>(), 3);

    let delivery = bus.publish(&Ping(1)).unwrap();
    assert_eq!(delivery.delivered, 2);
    assert_eq!(delivery.pruned, 1);
    assert_eq!(bus.subscriber_count::<Ping>(), 2);

    let delivery = bus.publish(&Ping(2)).unwrap();
    assert_eq!(delivery.pruned, 0);
    assert_eq!(
        entries(&journal),
        vec!["s1:ping:1", "s3:ping:1", "s1:ping:2", "s3:ping:2"]
    );
}

#[test]
fn receiver_dropped_by_earlier_handler_is_skipped() {
    init_logger();
    let bus = MessageBus::new();
    let journal = Journal::default();
    let victim = Listener::new("victim", &journal);
    let holder = Arc::new(Mutex::new(Some(victim.clone())));
    drop(victim);

    let slot = holder.clone();
    bus.subscribe(move |_: &Ping| {
        slot.lock().unwrap().take();
        Ok(())
    });
    if let Some(victim) = holder.lock().unwrap().as_ref() {
        bus.subscribe_bound(victim, Listener::on_ping);
    }

    let delivery = bus.publish(&Ping(3)).unwrap();

    assert_eq!(delivery.delivered, 1);
    assert_eq!(delivery.pruned, 1);
    assert!(entries(&journal).is_empty());
}

#[test]
fn removed_topic_delivers_nothing() {
    init_logger();
    let bus = MessageBus::new();
    let journal = Journal::default();
    let listener = Listener::new("l", &journal);

    bus.subscribe_bound(&listener, Listener::on_ping);
    assert!(bus.remove_topic::<Ping>());
    assert_eq!(bus.publish(&Ping(1)).unwrap().delivered, 0);

    bus.subscribe_bound(&listener, Listener::on_ping);
    assert_eq!(bus.publish(&Ping(2)).unwrap().delivered, 1);

    assert!(bus.remove_topic::<Ping>());
    assert!(!bus.remove_topic::<Ping>());
    assert_eq!(bus.publish(&Ping(3)).unwrap().delivered, 0);
    assert_eq!(entries(&journal), vec!["l:ping:2"]);
}

#[test]
fn removing_one_topic_leaves_others_alone() {
    init_logger();
    let bus = MessageBus::new();
    let journal = Journal::default();
    let listener = Listener::new("l", &journal);

    bus.subscribe_bound(&listener, Listener::on_ping);
    bus.remove_topic::<Pong>();

    assert!(bus.has_topic::<Ping>());
    assert_eq!(bus.publish(&Ping(4)).unwrap().delivered, 1);
    assert_eq!(entries(&journal), vec!["l:ping:4"]);
}

#[test]
fn subscriber_added_by_handler_waits_for_next_publish() {
    init_logger();
    let bus = Arc::new(MessageBus::new());
    let late_hits = Arc::new(AtomicUsize::new(0));
    let registered = Arc::new(AtomicBool::new(false));

    let inner = Arc::downgrade(&bus);
    let hits = late_hits.clone();
    bus.subscribe(move |_: &Ping| {
        if !registered.swap(true, Ordering::SeqCst) {
            if let Some(bus) = inner.upgrade() {
                let hits = hits.clone();
                bus.subscribe(move |_: &Ping| {
                    hits.fetch_add(1, Ordering::SeqCst);
                    Ok(())
                });
            }
        }
        Ok(())
    });

    let first = bus.publish(&Ping(1)).unwrap();
    assert_eq!(first.delivered, 1);
    assert_eq!(late_hits.load(Ordering::SeqCst), 0);
    assert_eq!(bus.subscriber_count::<Ping>(), 2);

    let second = bus.publish(&Ping(2)).unwrap();
    assert_eq!(second.delivered, 2);
    assert_eq!(late_hits.load(Ordering::SeqCst), 1);
    assert_eq!(bus.subscriber_count::<Ping>(), 2);
}

#[test]
fn handler_error_reaches_publisher_and_stops_dispatch() {
    init_logger();
    let bus = MessageBus::new();
    let journal = Journal::default();
    let late = Listener::new("late", &journal);

    bus.subscribe(|ping: &Ping| {
        if ping.0 == 0 {
            return Err(format!("cannot handle ping {}", ping.0).into());
        }
        Ok(())
    });
    bus.subscribe_bound(&late, Listener::on_ping);

    let err = bus.publish(&Ping(0)).unwrap_err();
    match &err {
        BusError::Handler { topic, .. } => assert!(topic.ends_with("Ping")),
        other => panic!("unexpected error: {other}"),
    }
    assert_eq!(
        err.handler_source().map(|e| e.to_string()),
        Some("cannot handle ping 0".to_string())
    );
    assert!(entries(&journal).is_empty());

    bus.publish(&Ping(1)).unwrap();
    assert_eq!(entries(&journal), vec!["late:ping:1"]);
}

#[test]
fn request_and_response_are_delivered_nested() {
    init_logger();
    let bus = Arc::new(MessageBus::new());
    let a = KlasseA::new(bus.clone());
    let b = KlasseB::new(bus.clone());

    let delivery = a.start().unwrap();

    assert_eq!(delivery.delivered, 1);
    assert_eq!(
        b.received(),
        vec![NachrichtVonA { text: "Hallo von A".to_string(), zahl: 123 }]
    );
    let answers = a.received();
    assert_eq!(answers.len(), 1);
    assert!(answers[0].erfolg);
}

#[test]
fn b_stops_reacting_after_topic_removal() {
    init_logger();
    let bus = Arc::new(MessageBus::new());
    let a = KlasseA::new(bus.clone());
    let b = KlasseB::new(bus.clone());
    a.start().unwrap();

    bus.remove_topic::<NachrichtVonA>();
    let delivery = a.start().unwrap();

    assert_eq!(delivery.delivered, 0);
    assert_eq!(b.received().len(), 1);
    assert_eq!(a.received().len(), 1);
    assert!(bus.has_topic::<NachrichtVonB>());
}

#[test]
fn temporary_receiver_is_never_invoked() {
    init_logger();
    let bus = MessageBus::new();
    let journal = Journal::default();

    {
        let temporary = Listener::new("tmp", &journal);
        bus.subscribe_bound(&temporary, Listener::on_ping);
        let token = LivenessToken::new();
        let sink = journal.clone();
        bus.subscribe_guarded(&token, move |ping: &Ping| {
            sink.lock().unwrap().push(format!("guarded:{}", ping.0));
            Ok(())
        });
        assert_eq!(bus.subscriber_count::<Ping>(), 2);
    }

    let delivery = bus.publish(&Ping(9)).unwrap();

    assert_eq!(delivery.delivered, 0);
    assert_eq!(delivery.pruned, 2);
    assert_eq!(bus.subscriber_count::<Ping>(), 0);
    assert!(entries(&journal).is_empty());
}

#[test]
fn bus_is_shared_across_threads() {
    init_logger();
    let bus = Arc::new(MessageBus::new());
    let journal = Journal::default();
    let listener = Listener::new("t", &journal);
    bus.subscribe_bound(&listener, Listener::on_ping);

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let bus = bus.clone();
            std::thread::spawn(move || bus.publish(&Ping(i)).map(|d| d.delivered))
        })
        .collect();

    let delivered: usize = workers.into_iter().map(|w| w.join().unwrap().unwrap()).sum();
    assert_eq!(delivered, 4);
    assert_eq!(entries(&journal).len(), 4);
}
