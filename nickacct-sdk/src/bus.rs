//! Typed event bus for bot modules.
//!
//! Handlers declare the [`Topic`]s they care about and are called
//! synchronously, one event at a time. A handler reacts through its
//! [`Context`]: it can queue follow-up events (delivered after the current
//! one, in FIFO order) and outbound IRC commands (returned from
//! [`EventBus::publish`] for the caller to write to the connection).

use std::collections::{HashMap, VecDeque};

use crate::casemap::irc_eq;
use crate::client::Command;
use crate::event::{Event, Topic};

/// Upper bound on events processed by a single `publish` call.
const MAX_CASCADE: usize = 1024;

/// A bot module registered on the bus.
pub trait Handler: Send {
    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Topics this handler is subscribed to.
    fn topics(&self) -> Vec<Topic>;

    /// React to an event on one of the subscribed topics.
    fn handle(&mut self, event: &Event, ctx: &mut Context<'_>);
}

/// What a handler may do in response to an event.
pub struct Context<'a> {
    own_nick: &'a str,
    events: &'a mut VecDeque<Event>,
    commands: &'a mut Vec<Command>,
}

impl Context<'_> {
    /// Whether `nick` is the bot itself.
    pub fn is_me(&self, nick: &str) -> bool {
        !self.own_nick.is_empty() && irc_eq(self.own_nick, nick)
    }

    /// Queue a follow-up event for delivery after the current one.
    pub fn dispatch(&mut self, event: Event) {
        self.events.push_back(event);
    }

    /// Queue an outbound command.
    pub fn send(&mut self, command: Command) {
        self.commands.push(command);
    }

    pub fn privmsg(&mut self, target: &str, text: &str) {
        self.send(Command::Privmsg {
            target: target.to_string(),
            text: text.to_string(),
        });
    }
}

/// Routes events to registered handlers by topic.
#[derive(Default)]
pub struct EventBus {
    handlers: Vec<Box<dyn Handler>>,
    routes: HashMap<Topic, Vec<usize>>,
    own_nick: String,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for the topics it declares. Handlers sharing a
    /// topic are called in registration order.
    pub fn register<H: Handler + 'static>(&mut self, handler: H) -> &mut Self {
        let id = self.handlers.len();
        let topics = handler.topics();
        tracing::debug!(handler = handler.name(), ?topics, "Registering handler");
        for topic in topics {
            self.routes.entry(topic).or_default().push(id);
        }
        self.handlers.push(Box::new(handler));
        self
    }

    /// The bot's current nick as last seen on the wire.
    pub fn own_nick(&self) -> &str {
        &self.own_nick
    }

    /// Deliver `event` and every follow-up event it causes. Returns the
    /// outbound commands in the order handlers queued them.
    pub fn publish(&mut self, event: Event) -> Vec<Command> {
        let mut queue = VecDeque::from([event]);
        let mut commands = Vec::new();
        let mut processed = 0usize;

        while let Some(event) = queue.pop_front() {
            processed += 1;
            if processed > MAX_CASCADE {
                tracing::warn!(
                    dropped = queue.len() + 1,
                    "Event cascade limit reached, dropping remaining events"
                );
                break;
            }

            self.track_own_nick(&event);

            let topic = event.topic();
            let Some(ids) = self.routes.get(&topic) else {
                tracing::trace!(?topic, "No handler for topic");
                continue;
            };
            for &id in ids {
                let mut ctx = Context {
                    own_nick: &self.own_nick,
                    events: &mut queue,
                    commands: &mut commands,
                };
                self.handlers[id].handle(&event, &mut ctx);
            }
        }

        commands
    }

    fn track_own_nick(&mut self, event: &Event) {
        match event {
            Event::Registered { nick } => {
                self.own_nick = nick.clone();
            }
            Event::NickChanged { old_nick, new_nick } if irc_eq(old_nick, &self.own_nick) => {
                tracing::info!(old = %old_nick, new = %new_nick, "Own nick changed");
                self.own_nick = new_nick.clone();
            }
            _ => {}
        }
    }
}
