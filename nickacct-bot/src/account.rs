//! `!account <nick>`: look up who a nick is identified as.
//!
//! The command itself only publishes a lookup request; the answer comes back
//! through the `account_reply` continuation carrying the reply target.

use nickacct_sdk::bus::{Context, Handler};
use nickacct_sdk::event::{AccountRequest, AccountResolved, Event, Topic};
use serde_json::json;

/// Continuation name used for lookups started by this command.
pub const CONTINUATION: &str = "account_reply";

pub struct AccountCommand {
    prefix: String,
}

impl AccountCommand {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    fn on_message(&self, from: &str, target: &str, text: &str, ctx: &mut Context<'_>) {
        if ctx.is_me(from) {
            return;
        }
        let Some(rest) = text.strip_prefix(&self.prefix) else {
            return;
        };
        let mut words = rest.split_whitespace();
        if !words.next().is_some_and(|w| w.eq_ignore_ascii_case("account")) {
            return;
        }

        // Private messages are answered to the sender
        let reply_to = if ctx.is_me(target) { from } else { target };
        let Some(nick) = words.next() else {
            ctx.privmsg(reply_to, &format!("Usage: {}account <nick>", self.prefix));
            return;
        };

        tracing::info!(asker = %from, nick = %nick, "Account lookup");
        ctx.dispatch(Event::NickToAccount(AccountRequest::new(
            nick,
            CONTINUATION,
            json!({ "target": reply_to, "asker": from }),
        )));
    }

    fn on_resolved(&self, resolved: &AccountResolved, ctx: &mut Context<'_>) {
        let Some(target) = resolved.args.get("target").and_then(|t| t.as_str()) else {
            tracing::warn!(args = %resolved.args, "Account reply without a target");
            return;
        };
        let text = match resolved.account {
            Some(ref account) => format!("{} is logged in as {account}", resolved.nick),
            None => format!("{} is not logged in", resolved.nick),
        };
        ctx.privmsg(target, &text);
    }
}

impl Handler for AccountCommand {
    fn name(&self) -> &'static str {
        "account_command"
    }

    fn topics(&self) -> Vec<Topic> {
        vec![Topic::Message, Topic::Continuation(CONTINUATION.to_string())]
    }

    fn handle(&mut self, event: &Event, ctx: &mut Context<'_>) {
        match event {
            Event::Message {
                from, target, text, ..
            } => self.on_message(from, target, text, ctx),
            Event::AccountResolved(resolved) => self.on_resolved(resolved, ctx),
            _ => {}
        }
    }
}
