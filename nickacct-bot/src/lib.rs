//! nickacct-bot: NickServ-backed nick → account resolution.
//!
//! - `resolver`: the nick-to-account module, usable by any bot on the bus
//! - `account`: a `!account <nick>` command built on top of it
//! - `config`: file + command-line configuration

pub mod account;
pub mod config;
pub mod resolver;

use nickacct_sdk::bus::EventBus;

use crate::account::AccountCommand;
use crate::config::Settings;
use crate::resolver::{NickToAccount, ServiceIdentity};

/// Build the bus with every module this bot runs.
pub fn build_bus(settings: &Settings) -> EventBus {
    let mut bus = EventBus::new();
    bus.register(NickToAccount::new(ServiceIdentity::parse(&settings.nickserv)))
        .register(AccountCommand::new(settings.prefix.clone()));
    bus
}
