//! nickacct-sdk: a small IRC client framework for bot modules.
//!
//! The client owns the connection and turns server lines into typed
//! [`event::Event`]s; bot modules implement [`bus::Handler`] and are driven
//! synchronously by a [`bus::EventBus`].

pub mod bus;
pub mod casemap;
pub mod client;
pub mod event;
pub mod irc;
