//! Events delivered to bot handlers.
//!
//! Wire events are produced by the client from server lines. Module events
//! (`NickToAccount`, `AccountResolved`) are published by handlers themselves
//! through the bus.

use std::collections::HashMap;

use crate::irc::Prefix;

/// Events that flow through the [`EventBus`](crate::bus::EventBus).
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// Successfully connected to the server.
    Connected,

    /// IRC registration complete. `nick` is our confirmed nick.
    Registered {
        nick: String,
    },

    /// Someone (possibly us) joined a channel.
    Joined {
        channel: String,
        nick: String,
    },

    /// Someone left a channel.
    Parted {
        channel: String,
        nick: String,
        reason: String,
    },

    /// Someone was kicked from a channel.
    Kicked {
        channel: String,
        nick: String,
        by: String,
        reason: String,
    },

    /// Someone quit the server.
    UserQuit {
        nick: String,
        reason: String,
    },

    /// A user changed nick.
    NickChanged {
        old_nick: String,
        new_nick: String,
    },

    /// A PRIVMSG in a channel or private message.
    Message {
        from: String,
        target: String,
        text: String,
        /// IRCv3 message tags (empty if none).
        tags: HashMap<String, String>,
    },

    /// A NOTICE from a user or service (prefix has a hostmask).
    Notice {
        source: Prefix,
        target: String,
        text: String,
    },

    /// A NOTICE or numeric from the server itself.
    ServerNotice {
        text: String,
    },

    /// Connection was closed.
    Disconnected {
        reason: String,
    },

    /// Ask for the services account behind a nick.
    NickToAccount(AccountRequest),

    /// Answer to a [`Event::NickToAccount`] request, routed by its continuation name.
    AccountResolved(AccountResolved),
}

/// A nick→account lookup request.
///
/// `continuation` names the [`Event::AccountResolved`] topic the answer is
/// published under; `args` comes back untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountRequest {
    pub nick: String,
    pub continuation: String,
    pub args: serde_json::Value,
}

impl AccountRequest {
    pub fn new(nick: impl Into<String>, continuation: impl Into<String>, args: serde_json::Value) -> Self {
        Self {
            nick: nick.into(),
            continuation: continuation.into(),
            args,
        }
    }
}

/// Result of a nick→account lookup. `account` is `None` when the nick is
/// not identified to services.
#[derive(Debug, Clone, PartialEq)]
pub struct AccountResolved {
    pub continuation: String,
    pub nick: String,
    pub account: Option<String>,
    pub args: serde_json::Value,
}

/// Subscription key for bus handlers.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Topic {
    Connected,
    Registered,
    Joined,
    Parted,
    Kicked,
    UserQuit,
    NickChanged,
    Message,
    Notice,
    ServerNotice,
    Disconnected,
    NickToAccount,
    /// [`Event::AccountResolved`] with the given continuation name.
    Continuation(String),
}

impl Event {
    /// The topic this event is routed under.
    pub fn topic(&self) -> Topic {
        match self {
            Event::Connected => Topic::Connected,
            Event::Registered { .. } => Topic::Registered,
            Event::Joined { .. } => Topic::Joined,
            Event::Parted { .. } => Topic::Parted,
            Event::Kicked { .. } => Topic::Kicked,
            Event::UserQuit { .. } => Topic::UserQuit,
            Event::NickChanged { .. } => Topic::NickChanged,
            Event::Message { .. } => Topic::Message,
            Event::Notice { .. } => Topic::Notice,
            Event::ServerNotice { .. } => Topic::ServerNotice,
            Event::Disconnected { .. } => Topic::Disconnected,
            Event::NickToAccount(_) => Topic::NickToAccount,
            Event::AccountResolved(r) => Topic::Continuation(r.continuation.clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn resolved_events_route_by_continuation() {
        let event = Event::AccountResolved(AccountResolved {
            continuation: "greet".into(),
            nick: "alice".into(),
            account: None,
            args: json!(null),
        });
        assert_eq!(event.topic(), Topic::Continuation("greet".into()));
    }

    #[test]
    fn request_topic() {
        let event = Event::NickToAccount(AccountRequest::new("bob", "greet", json!({"n": 1})));
        assert_eq!(event.topic(), Topic::NickToAccount);
        assert_eq!(Event::Connected.topic(), Topic::Connected);
    }
}
