use groundtrack::bus::EventBus;
use groundtrack::clock::SimTime;
use std::sync::{Arc, Mutex};

fn sim_time(elapsed: f64) -> SimTime {
    SimTime {
        epoch_seconds: elapsed,
        elapsed_seconds: elapsed,
    }
}

#[test]
fn test_faulting_subscriber_does_not_mask_delivery_to_others() {
    let mut bus = EventBus::new();
    let delivered = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&delivered);
    bus.subscribe_tick(move |_| {
        sink.lock().unwrap().push("before");
        Err("subscriber outage".into())
    });

    let sink = Arc::clone(&delivered);
    bus.subscribe_tick(move |_| {
        sink.lock().unwrap().push("after");
        Ok(())
    });

    bus.publish_tick(&sim_time(1.0));

    // The failing subscriber ran first and failed, yet delivery reached the
    // subscriber registered behind it.
    assert_eq!(*delivered.lock().unwrap(), vec!["before", "after"]);
}

#[test]
fn test_panicking_subscriber_is_contained_at_the_bus_boundary() {
    let mut bus = EventBus::new();
    let delivered = Arc::new(Mutex::new(0u32));

    bus.subscribe_tick(|_| panic!("handler bug"));

    let sink = Arc::clone(&delivered);
    bus.subscribe_tick(move |_| {
        *sink.lock().unwrap() += 1;
        Ok(())
    });

    // Both publishes survive the panicking handler.
    bus.publish_tick(&sim_time(1.0));
    bus.publish_tick(&sim_time(2.0));

    assert_eq!(*delivered.lock().unwrap(), 2);
}

#[test]
fn test_delivery_is_synchronous_and_ordered_across_publishes() {
    let mut bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    for tag in ["a", "b"] {
        let log = Arc::clone(&log);
        bus.subscribe_tick(move |time| {
            log.lock().unwrap().push((tag, time.elapsed_seconds));
            Ok(())
        });
    }

    bus.publish_tick(&sim_time(1.0));
    bus.publish_tick(&sim_time(2.0));

    assert_eq!(
        *log.lock().unwrap(),
        vec![("a", 1.0), ("b", 1.0), ("a", 2.0), ("b", 2.0)]
    );
}

#[test]
fn test_unsubscribed_handler_is_skipped_mid_sequence() {
    let mut bus = EventBus::new();
    let log = Arc::new(Mutex::new(Vec::new()));

    let sink = Arc::clone(&log);
    let first = bus.subscribe_tick(move |_| {
        sink.lock().unwrap().push("first");
        Ok(())
    });
    let sink = Arc::clone(&log);
    bus.subscribe_tick(move |_| {
        sink.lock().unwrap().push("second");
        Ok(())
    });

    bus.publish_tick(&sim_time(1.0));
    assert!(bus.unsubscribe(first));
    bus.publish_tick(&sim_time(2.0));

    assert_eq!(
        *log.lock().unwrap(),
        vec!["first", "second", "second"]
    );
}
