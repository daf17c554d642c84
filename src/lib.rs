#[macro_use]
extern crate tracing;

pub mod backend;
pub mod cli;
pub mod deferred;
pub mod icon;
pub mod layout;
pub mod manager;
pub mod names;
pub mod observer;
pub mod tray;
pub mod utils;

#[cfg(test)]
mod tests;
