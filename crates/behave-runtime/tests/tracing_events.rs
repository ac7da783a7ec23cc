#![forbid(unsafe_code)]

//! Structured log events emitted by the runtime.

use std::rc::Rc;
use std::sync::{Arc, Mutex};

use behave_core::testing::TestElement;
use behave_core::{ELEMENT, HostType, InteractivityConfig};
use behave_runtime::{
    AttachableCollection, AttachableRef, Behavior, BehaviorAttachment, LifetimeRegistry,
    LifetimeTarget, WeakLifetimeObserver,
};
use futures::executor::LocalPool;
use tracing::Level;
use tracing_subscriber::layer::{Context, SubscriberExt};
use tracing_subscriber::Layer;

#[derive(Debug, Clone)]
struct Captured {
    level: Level,
    message: String,
}

#[derive(Clone, Default)]
struct Capture {
    events: Arc<Mutex<Vec<Captured>>>,
}

impl Capture {
    fn messages_at(&self, level: Level) -> Vec<String> {
        self.events
            .lock()
            .expect("capture lock")
            .iter()
            .filter(|e| e.level == level)
            .map(|e| e.message.clone())
            .collect()
    }
}

impl<S: tracing::Subscriber> Layer<S> for Capture {
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        struct Msg(Option<String>);
        impl tracing::field::Visit for Msg {
            fn record_str(&mut self, field: &tracing::field::Field, value: &str) {
                if field.name() == "message" {
                    self.0 = Some(value.to_string());
                }
            }
            fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
                if field.name() == "message" {
                    self.0 = Some(format!("{value:?}").trim_matches('"').to_string());
                }
            }
        }
        let mut msg = Msg(None);
        event.record(&mut msg);
        self.events.lock().expect("capture lock").push(Captured {
            level: *event.metadata().level(),
            message: msg.0.unwrap_or_default(),
        });
    }
}

fn capture() -> (Capture, tracing::subscriber::DefaultGuard) {
    let capture = Capture::default();
    let subscriber = tracing_subscriber::registry().with(capture.clone());
    let guard = tracing::subscriber::set_default(subscriber);
    (capture, guard)
}

static BUTTON: HostType = HostType::derived("Button", &ELEMENT);

struct ButtonOnly;

impl Behavior for ButtonOnly {
    fn type_constraint(&self) -> &'static HostType {
        &BUTTON
    }
}

struct Plain;

impl Behavior for Plain {}

#[test]
fn failed_member_attach_during_load_is_warned_and_skipped() {
    let (capture, _guard) = capture();
    let pool = LocalPool::new();
    let el = TestElement::new("plain", Rc::new(pool.spawner()));
    let c = AttachableCollection::with_config(InteractivityConfig::new());
    let picky = BehaviorAttachment::new(ButtonOnly);
    let plain = BehaviorAttachment::new(Plain);
    c.push(Rc::clone(&picky) as AttachableRef).unwrap();
    c.push(Rc::clone(&plain) as AttachableRef).unwrap();

    c.associated_object_loaded(&el.host_ref());
    assert!(!picky.is_attached());
    assert!(plain.is_attached());
    assert_eq!(capture.messages_at(Level::WARN), ["member failed to attach"]);
    assert!(capture
        .messages_at(Level::DEBUG)
        .contains(&"collection loaded".to_string()));
}

#[test]
fn dropped_notification_is_traced_not_warned() {
    struct Nothing;
    impl LifetimeTarget for Nothing {
        fn associated_object_loaded(&self, _host: &behave_core::HostRef) {}
        fn associated_object_unloaded(&self, _host: &behave_core::HostRef) {}
    }

    let (capture, _guard) = capture();
    let pool = LocalPool::new();
    let el = TestElement::new("row", Rc::new(pool.spawner()));
    let registry = Rc::new(LifetimeRegistry::new());
    let target: Rc<dyn LifetimeTarget> = Rc::new(Nothing);
    let handle = registry.register(Rc::downgrade(&target));
    let _observer = WeakLifetimeObserver::observe(&el.host_ref(), &registry, handle);
    drop(target);

    el.load();
    assert!(capture
        .messages_at(Level::TRACE)
        .contains(&"lifetime target gone; notification dropped".to_string()));
    assert!(capture.messages_at(Level::WARN).is_empty());
    assert!(capture.messages_at(Level::ERROR).is_empty());
}

#[test]
fn missed_unload_is_logged_at_debug() {
    let (capture, _guard) = capture();
    let pool = LocalPool::new();
    let (e1, e2) = (
        TestElement::new("a", Rc::new(pool.spawner())),
        TestElement::new("b", Rc::new(pool.spawner())),
    );
    let c = AttachableCollection::with_config(InteractivityConfig::new());
    c.push(BehaviorAttachment::new(Plain) as AttachableRef).unwrap();
    c.associated_object_loaded(&e1.host_ref());
    c.associated_object_loaded(&e2.host_ref());
    assert!(capture
        .messages_at(Level::DEBUG)
        .contains(&"load without unload; unloading previous host".to_string()));
}
