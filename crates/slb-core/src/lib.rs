//! Core of the shopping list chat bot.
//!
//! This crate is framework-agnostic: the messaging platform lives behind
//! [`messaging::port::MessagingPort`], implemented in adapter crates.

pub mod audit;
pub mod bot;
pub mod command;
pub mod config;
pub mod domain;
pub mod engine;
pub mod errors;
pub mod locks;
pub mod logging;
pub mod messages;
pub mod messaging;
pub mod normalize;
pub mod passcode;
pub mod store;

pub use errors::{Error, Result};
