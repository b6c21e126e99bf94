pub mod adapter;
pub mod config;
pub mod controller;
pub mod error;
pub mod identity;
pub mod reconnect;
pub mod registry;
pub mod state;
pub mod timer;
