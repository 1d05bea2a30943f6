//! Message router — kind-keyed dispatch of inbound messages.
//!
//! Subscribers register a callback per [`MessageKind`] at startup; the
//! router is then moved onto the link I/O task and invokes callbacks
//! synchronously on that task, in registration order. Handlers must
//! therefore stay short: hand the work to a channel or a store, never
//! block.

use log::debug;

use super::message::{Message, MessageKind, KIND_COUNT};

type Handler = Box<dyn FnMut(&Message) + Send>;

/// Routing table plus dispatch counters.
pub struct MessageRouter {
    handlers: [Vec<Handler>; KIND_COUNT],
    routed: u32,
    unhandled: u32,
}

impl Default for MessageRouter {
    fn default() -> Self {
        Self::new()
    }
}

impl MessageRouter {
    pub fn new() -> Self {
        Self {
            handlers: core::array::from_fn(|_| Vec::new()),
            routed: 0,
            unhandled: 0,
        }
    }

    /// Register a callback for one message kind. Multiple callbacks per
    /// kind are allowed and fire in registration order.
    pub fn subscribe(&mut self, kind: MessageKind, handler: impl FnMut(&Message) + Send + 'static) {
        self.handlers[kind as usize].push(Box::new(handler));
    }

    /// Dispatch a validated message to every subscriber of its kind.
    pub fn route(&mut self, msg: &Message) {
        let slot = &mut self.handlers[msg.kind() as usize];
        if slot.is_empty() {
            self.unhandled = self.unhandled.wrapping_add(1);
            debug!("router: no subscriber for {}", msg.kind().wire_name());
            return;
        }
        for handler in slot.iter_mut() {
            handler(msg);
        }
        self.routed = self.routed.wrapping_add(1);
    }

    /// Messages dispatched to at least one subscriber.
    pub fn routed(&self) -> u32 {
        self.routed
    }

    /// Messages that arrived with no subscriber registered.
    pub fn unhandled(&self) -> u32 {
        self.unhandled
    }
}
