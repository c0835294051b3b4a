//! Event subscription service owned by one preview surface.
//!
//! Components subscribe to an event kind on a target (the whole document or one
//! node) and get back a typed handle. The only way to remove a listener is to give
//! its handle back, so a component cannot detach someone else's listener.

use std::marker::PhantomData;

use serde::Serialize;

use crate::preview::tree::{NodeRef, PreviewTree};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    SelectionChange,
    Click,
    PointerDown,
    KeyDown,
    Resize,
    Mutation,
}

/// Marker types naming one event kind at the type level.
pub trait EventType {
    const KIND: EventKind;
}

macro_rules! event_types {
    ($($name:ident => $kind:ident),* $(,)?) => {
        $(
            #[derive(Debug)]
            pub struct $name;

            impl EventType for $name {
                const KIND: EventKind = EventKind::$kind;
            }
        )*
    };
}

event_types! {
    SelectionChange => SelectionChange,
    Click => Click,
    PointerDown => PointerDown,
    KeyDown => KeyDown,
    Resize => Resize,
    Mutation => Mutation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Subscriber {
    Toolbar,
    SyncBridge,
    Paginator,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    Document,
    Node(NodeRef),
}

/// Handle returned by `subscribe`. Not `Clone`: dropping it without unsubscribing
/// leaks the listener, which `EventBus::listener_count` makes visible in tests.
#[derive(Debug)]
#[must_use = "dropping a subscription handle leaves the listener attached"]
pub struct Subscription<E: EventType> {
    id: u64,
    _kind: PhantomData<E>,
}

#[derive(Debug)]
struct Listener {
    id: u64,
    kind: EventKind,
    target: Target,
    subscriber: Subscriber,
}

#[derive(Debug, Default)]
pub struct EventBus {
    next_id: u64,
    listeners: Vec<Listener>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe<E: EventType>(&mut self, target: Target, subscriber: Subscriber) -> Subscription<E> {
        self.next_id += 1;
        self.listeners.push(Listener {
            id: self.next_id,
            kind: E::KIND,
            target,
            subscriber,
        });
        Subscription {
            id: self.next_id,
            _kind: PhantomData,
        }
    }

    /// Removes the listener behind `handle`. Returns false if it was already gone.
    pub fn unsubscribe<E: EventType>(&mut self, handle: Subscription<E>) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|l| l.id != handle.id);
        self.listeners.len() < before
    }

    /// Subscribers that should see an event of `kind` raised at `origin`.
    ///
    /// Document listeners always match. Node listeners match when their node is
    /// `origin` or one of its ancestors in `tree`. Each subscriber appears once.
    pub fn dispatch(&self, kind: EventKind, tree: &PreviewTree, origin: Option<NodeRef>) -> Vec<Subscriber> {
        let path = origin
            .and_then(|o| tree.resolve(o))
            .map(|n| tree.ancestors(n))
            .unwrap_or_default();

        let mut out = Vec::new();
        for listener in self.listeners.iter().filter(|l| l.kind == kind) {
            let hit = match listener.target {
                Target::Document => true,
                Target::Node(handle) => tree.resolve(handle).is_some_and(|n| path.contains(&n)),
            };
            if hit && !out.contains(&listener.subscriber) {
                out.push(listener.subscriber);
            }
        }
        out
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }

    pub fn count_for(&self, subscriber: Subscriber) -> usize {
        self.listeners
            .iter()
            .filter(|l| l.subscriber == subscriber)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::preview::tree::Tag;

    #[test]
    fn test_unsubscribe_consumes_handle() {
        let mut bus = EventBus::new();
        let handle: Subscription<KeyDown> = bus.subscribe(Target::Document, Subscriber::Toolbar);
        assert_eq!(bus.listener_count(), 1);
        assert!(bus.unsubscribe(handle));
        assert_eq!(bus.listener_count(), 0);
    }

    #[test]
    fn test_node_listener_matches_descendant_origin() {
        let mut tree = PreviewTree::new();
        let field = tree.create_element(Tag::Field);
        tree.append_child(tree.root(), field);
        let text = tree.create_text("Rust");
        tree.append_child(field, text);

        let mut bus = EventBus::new();
        let _click: Subscription<Click> =
            bus.subscribe(Target::Node(tree.node_ref(field)), Subscriber::SyncBridge);
        let _keys: Subscription<KeyDown> = bus.subscribe(Target::Document, Subscriber::Toolbar);

        assert_eq!(
            bus.dispatch(EventKind::Click, &tree, Some(tree.node_ref(text))),
            vec![Subscriber::SyncBridge]
        );
        assert!(bus
            .dispatch(EventKind::Click, &tree, Some(tree.node_ref(tree.root())))
            .is_empty());
        assert_eq!(
            bus.dispatch(EventKind::KeyDown, &tree, None),
            vec![Subscriber::Toolbar]
        );
    }

    #[test]
    fn test_node_listener_from_old_tree_never_fires() {
        let mut old = PreviewTree::new();
        let field = old.create_element(Tag::Field);
        old.append_child(old.root(), field);

        let mut bus = EventBus::new();
        let _click: Subscription<Click> =
            bus.subscribe(Target::Node(old.node_ref(field)), Subscriber::SyncBridge);

        let mut fresh = PreviewTree::new();
        let same_index = fresh.create_element(Tag::Field);
        fresh.append_child(fresh.root(), same_index);
        assert!(bus
            .dispatch(EventKind::Click, &fresh, Some(fresh.node_ref(same_index)))
            .is_empty());
    }
}
