//! Nick → services account resolution.
//!
//! Listens for [`Event::NickToAccount`] requests and answers each one with an
//! [`Event::AccountResolved`] under the requested continuation, using either
//! the cache or a NickServ `ACC` query. Cached bindings are dropped when the
//! nick's presence changes (QUIT, PART, KICK) and follow NICK changes.
//!
//! Queries are tied to the connection they were sent on: after a reconnect,
//! every nick that still has waiters is queried again once registered. An
//! `ACC` query that never gets an answer on a live connection leaves its
//! waiters queued; there is no timeout.

use std::collections::{HashMap, HashSet, VecDeque};

use nickacct_sdk::bus::{Context, Handler};
use nickacct_sdk::casemap::{irc_eq, irc_to_lower};
use nickacct_sdk::event::{AccountRequest, AccountResolved, Event, Topic};
use nickacct_sdk::irc::Prefix;
use regex::Regex;

/// NickServ access level meaning "identified to the account".
const ACC_LOGGED_IN: char = '3';

/// The trusted services identity: `NickServ` or `NickServ@services.host`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceIdentity {
    nick: String,
    host: Option<String>,
}

impl ServiceIdentity {
    pub fn parse(raw: &str) -> Self {
        match raw.split_once('@') {
            Some((nick, host)) => Self {
                nick: nick.to_string(),
                host: Some(host.to_string()),
            },
            None => Self {
                nick: raw.to_string(),
                host: None,
            },
        }
    }

    /// PRIVMSG target for queries.
    pub fn target(&self) -> String {
        match self.host {
            Some(ref host) => format!("{}@{host}", self.nick),
            None => self.nick.clone(),
        }
    }

    /// Whether a notice source is this service.
    pub fn matches(&self, source: &Prefix) -> bool {
        if !irc_eq(&self.nick, &source.nick) {
            return false;
        }
        match (&self.host, &source.host) {
            (None, _) => true,
            (Some(want), Some(got)) => want.eq_ignore_ascii_case(got),
            (Some(_), None) => false,
        }
    }
}

/// A parsed `<nick> -> <account> ACC <level>` reply.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccReply {
    pub nick: String,
    pub account: String,
    /// The level digit as sent; any digit other than `3` means not logged in.
    pub level: char,
}

impl AccReply {
    pub fn is_logged_in(&self) -> bool {
        self.level == ACC_LOGGED_IN
    }
}

/// One queued request.
#[derive(Debug, Clone)]
struct Waiter {
    /// Nick as the requester spelled it.
    nick: String,
    continuation: String,
    args: serde_json::Value,
}

/// The nick-to-account resolver module.
pub struct NickToAccount {
    service: ServiceIdentity,
    acc_pattern: Regex,
    /// Case-folded nick → case-folded account.
    cache: HashMap<String, String>,
    /// Case-folded nick → waiters in arrival order.
    pending: HashMap<String, VecDeque<Waiter>>,
    /// Case-folded nicks with an `ACC` query sent on the current connection.
    queried: HashSet<String>,
}

impl NickToAccount {
    pub fn new(service: ServiceIdentity) -> Self {
        Self {
            service,
            acc_pattern: Regex::new(r"^(\S+) -> (\S+) ACC (\d)").expect("static ACC pattern"),
            cache: HashMap::new(),
            pending: HashMap::new(),
            queried: HashSet::new(),
        }
    }

    /// Cached account for `nick`, if any.
    pub fn cached(&self, nick: &str) -> Option<&str> {
        self.cache.get(&irc_to_lower(nick)).map(String::as_str)
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Number of requests waiting on `nick`.
    pub fn pending_len(&self, nick: &str) -> usize {
        self.pending.get(&irc_to_lower(nick)).map_or(0, VecDeque::len)
    }

    /// Parse an `ACC` reply line. Anything else yields `None`.
    pub fn parse_acc(&self, text: &str) -> Option<AccReply> {
        let caps = self.acc_pattern.captures(text)?;
        Some(AccReply {
            nick: caps[1].to_string(),
            account: irc_to_lower(&caps[2]),
            level: caps[3].chars().next()?,
        })
    }

    fn request(&mut self, req: &AccountRequest, ctx: &mut Context<'_>) {
        let key = irc_to_lower(&req.nick);
        self.pending.entry(key.clone()).or_default().push_back(Waiter {
            nick: req.nick.clone(),
            continuation: req.continuation.clone(),
            args: req.args.clone(),
        });

        if let Some(account) = self.cache.get(&key).cloned() {
            tracing::debug!(nick = %req.nick, account = %account, "Account cache hit");
            self.resolve(&key, Some(account), ctx);
        } else if self.queried.contains(&key) {
            tracing::debug!(nick = %req.nick, "ACC query already outstanding");
        } else {
            self.query(key, &req.nick, ctx);
        }
    }

    fn query(&mut self, key: String, nick: &str, ctx: &mut Context<'_>) {
        tracing::debug!(nick = %nick, service = %self.service.target(), "Querying account");
        ctx.privmsg(&self.service.target(), &format!("ACC {nick} *"));
        self.queried.insert(key);
    }

    /// Re-send queries lost with the previous connection.
    fn requery_pending(&mut self, ctx: &mut Context<'_>) {
        let mut lost: Vec<(String, String)> = self
            .pending
            .iter()
            .filter(|(key, _)| !self.queried.contains(*key))
            .filter_map(|(key, waiters)| Some((key.clone(), waiters.front()?.nick.clone())))
            .collect();
        lost.sort();
        for (key, nick) in lost {
            self.query(key, &nick, ctx);
        }
    }

    fn notice(&mut self, source: &Prefix, target: &str, text: &str, ctx: &mut Context<'_>) {
        if !ctx.is_me(target) || !self.service.matches(source) {
            return;
        }
        let Some(reply) = self.parse_acc(text) else {
            tracing::debug!(text, "Ignoring non-ACC notice from services");
            return;
        };

        let key = irc_to_lower(&reply.nick);
        if reply.is_logged_in() {
            tracing::debug!(nick = %reply.nick, account = %reply.account, "Nick is logged in");
            self.cache.insert(key.clone(), reply.account.clone());
            self.resolve(&key, Some(reply.account), ctx);
        } else {
            tracing::debug!(nick = %reply.nick, level = %reply.level, "Nick is not logged in");
            self.resolve(&key, None, ctx);
        }
    }

    /// Replay every waiter on `key` with `account`, in arrival order.
    fn resolve(&mut self, key: &str, account: Option<String>, ctx: &mut Context<'_>) {
        self.queried.remove(key);
        let Some(waiters) = self.pending.remove(key) else {
            return;
        };
        for waiter in waiters {
            ctx.dispatch(Event::AccountResolved(AccountResolved {
                continuation: waiter.continuation,
                nick: waiter.nick,
                account: account.clone(),
                args: waiter.args,
            }));
        }
    }

    fn forget(&mut self, nick: &str) {
        if let Some(account) = self.cache.remove(&irc_to_lower(nick)) {
            tracing::trace!(nick, account = %account, "Dropped cached account");
        }
    }

    fn rename(&mut self, old_nick: &str, new_nick: &str) {
        if let Some(account) = self.cache.remove(&irc_to_lower(old_nick)) {
            self.cache.insert(irc_to_lower(new_nick), account);
        }
    }
}

impl Handler for NickToAccount {
    fn name(&self) -> &'static str {
        "nick_to_account"
    }

    fn topics(&self) -> Vec<Topic> {
        vec![
            Topic::NickToAccount,
            Topic::Notice,
            Topic::UserQuit,
            Topic::Parted,
            Topic::Kicked,
            Topic::NickChanged,
            Topic::Disconnected,
            Topic::Registered,
        ]
    }

    fn handle(&mut self, event: &Event, ctx: &mut Context<'_>) {
        match event {
            Event::NickToAccount(req) => self.request(req, ctx),
            Event::Notice { source, target, text } => self.notice(source, target, text, ctx),
            Event::UserQuit { nick, .. } | Event::Parted { nick, .. } | Event::Kicked { nick, .. } => {
                self.forget(nick)
            }
            Event::NickChanged { old_nick, new_nick } => self.rename(old_nick, new_nick),
            Event::Disconnected { .. } => {
                tracing::debug!(entries = self.cache.len(), "Clearing account cache");
                self.cache.clear();
                self.queried.clear();
            }
            Event::Registered { .. } => self.requery_pending(ctx),
            _ => {}
        }
    }
}
