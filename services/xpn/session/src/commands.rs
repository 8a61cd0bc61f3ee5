//! Command encoder: turns command events into wire envelopes.
//!
//! Each command kind has its own bus topic so callers can publish a
//! single command without string-keyed dispatch. The encoder listens on
//! every one of them, serializes the command into its envelope, and
//! republishes the JSON on the outbound send topic.

use tracing::debug;
use xpn_bus::{Event, EventBus, Topic};
use xpn_wire::CommandKind;

/// Bridges command topics to the outbound message topic
pub struct CommandEncoder {
    bus: EventBus,
}

impl CommandEncoder {
    pub fn new(bus: EventBus) -> Self {
        Self { bus }
    }

    /// Subscribe to every command topic
    pub fn add_listeners(&self) {
        for kind in CommandKind::ALL {
            let bus = self.bus.clone();
            self.bus.subscribe_always(Topic::Command(kind), move |event| {
                let Event::Command(command) = event else {
                    return;
                };
                let json = command.clone().into_envelope().to_json();
                debug!(kind = ?command.kind(), "encoding command");
                bus.publish(Topic::ConnSendMessage, Event::Message(json));
            });
        }
    }

    /// Drop every command topic subscription
    pub fn remove_listeners(&self) {
        for kind in CommandKind::ALL {
            self.bus.unsubscribe_all(&Topic::Command(kind));
        }
    }
}
