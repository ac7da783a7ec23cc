#![forbid(unsafe_code)]

//! Recording behaviors and collection hooks.

use std::sync::LazyLock;

use behave_core::{ELEMENT, HostRef, HostType, PropertyKey, Value};
use behave_runtime::{Behavior, CollectionHooks};

use crate::log::{EventKind, LifecycleLog};

/// Renders a context value for log labels: `&str`, `String`, integers, or
/// the type name for anything else; `-` for empty.
#[must_use]
pub fn describe_context(value: Option<&Value>) -> String {
    let Some(value) = value else {
        return "-".to_string();
    };
    if let Some(s) = value.downcast_ref::<&str>() {
        return (*s).to_string();
    }
    if let Some(s) = value.downcast_ref::<String>() {
        return s.clone();
    }
    if let Some(n) = value.downcast_ref::<usize>() {
        return n.to_string();
    }
    if let Some(n) = value.downcast_ref::<i64>() {
        return n.to_string();
    }
    value.type_name().to_string()
}

/// Logs every hook under its name.
#[derive(Debug, Clone)]
pub struct RecordingBehavior {
    name: String,
    log: LifecycleLog,
    constraint: &'static HostType,
}

impl RecordingBehavior {
    pub fn new(name: impl Into<String>, log: &LifecycleLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
            constraint: &ELEMENT,
        }
    }

    /// Require hosts of `constraint` (or a subtype).
    #[must_use]
    pub fn constrained_to(mut self, constraint: &'static HostType) -> Self {
        self.constraint = constraint;
        self
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Behavior for RecordingBehavior {
    fn type_constraint(&self) -> &'static HostType {
        self.constraint
    }

    fn on_attached(&self, host: &HostRef) {
        self.log
            .record(EventKind::Attached, &*self.name, Some(host.host_id()), None);
    }

    fn on_detaching(&self, host: &HostRef) {
        self.log
            .record(EventKind::Detaching, &*self.name, Some(host.host_id()), None);
    }

    fn on_data_context_changed(&self, _old: Option<&Value>, new: Option<&Value>) {
        self.log.record(
            EventKind::ContextChanged,
            &*self.name,
            None,
            Some(describe_context(new)),
        );
    }
}

/// Host property that [`StampBehavior`]s append to.
pub static STAMPS: LazyLock<PropertyKey> = LazyLock::new(|| PropertyKey::register("Stamps"));

/// Appends its name to the host's [`STAMPS`] list on attach and removes it
/// on detach. Two of these on one host expose attach order through the
/// host's own state.
#[derive(Debug, Clone)]
pub struct StampBehavior {
    name: &'static str,
}

impl StampBehavior {
    #[must_use]
    pub const fn new(name: &'static str) -> Self {
        Self { name }
    }
}

/// Current stamps on `host`, oldest first.
#[must_use]
pub fn stamps(host: &HostRef) -> Vec<&'static str> {
    host.properties()
        .get(*STAMPS)
        .and_then(|v| v.downcast_ref::<Vec<&'static str>>().cloned())
        .unwrap_or_default()
}

impl Behavior for StampBehavior {
    fn on_attached(&self, host: &HostRef) {
        let mut list = stamps(host);
        list.push(self.name);
        host.properties().set(*STAMPS, Value::new(list));
    }

    fn on_detaching(&self, host: &HostRef) {
        let mut list = stamps(host);
        list.retain(|s| *s != self.name);
        if list.is_empty() {
            host.properties().clear(*STAMPS);
        } else {
            host.properties().set(*STAMPS, Value::new(list));
        }
    }
}

/// Collection hooks that log under a name.
#[derive(Debug, Clone)]
pub struct RecordingHooks {
    name: String,
    log: LifecycleLog,
}

impl RecordingHooks {
    pub fn new(name: impl Into<String>, log: &LifecycleLog) -> Self {
        Self {
            name: name.into(),
            log: log.clone(),
        }
    }
}

impl CollectionHooks for RecordingHooks {
    fn on_attached(&self, host: &HostRef) {
        self.log.record(
            EventKind::CollectionAttached,
            &*self.name,
            Some(host.host_id()),
            None,
        );
    }

    fn on_detaching(&self, host: &HostRef) {
        self.log.record(
            EventKind::CollectionDetaching,
            &*self.name,
            Some(host.host_id()),
            None,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use behave_core::testing::TestElement;
    use behave_runtime::BehaviorAttachment;
    use futures::executor::LocalPool;
    use std::rc::Rc;

    #[test]
    fn describe_known_and_unknown_values() {
        assert_eq!(describe_context(None), "-");
        assert_eq!(describe_context(Some(&Value::new("row"))), "row");
        assert_eq!(describe_context(Some(&Value::new(String::from("s")))), "s");
        assert_eq!(describe_context(Some(&Value::new(7_usize))), "7");
        assert!(describe_context(Some(&Value::new(1.5_f32))).contains("f32"));
    }

    #[test]
    fn recording_behavior_logs_hooks() {
        let pool = LocalPool::new();
        let el = TestElement::new("h", Rc::new(pool.spawner()));
        el.set_context(Some(Value::new("ctx")));
        let log = LifecycleLog::new();
        let b = BehaviorAttachment::new(RecordingBehavior::new("b", &log));
        b.attach(&el.host_ref()).unwrap();
        b.detach();
        assert_eq!(log.labels(), ["context b ctx", "attach b", "detach b"]);
    }

    #[test]
    fn stamps_follow_attach_and_detach() {
        let pool = LocalPool::new();
        let el = TestElement::new("h", Rc::new(pool.spawner()));
        let host = el.host_ref();
        let (a, b) = (
            BehaviorAttachment::new(StampBehavior::new("a")),
            BehaviorAttachment::new(StampBehavior::new("b")),
        );
        a.attach(&host).unwrap();
        b.attach(&host).unwrap();
        assert_eq!(stamps(&host), ["a", "b"]);
        a.detach();
        assert_eq!(stamps(&host), ["b"]);
        b.detach();
        assert!(stamps(&host).is_empty());
        assert!(!el.property_map().contains(*STAMPS));
    }
}
