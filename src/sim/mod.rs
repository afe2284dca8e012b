pub mod batch;
pub mod config;
pub mod controller;
pub mod cost;
pub mod damper;
pub mod drive;
pub mod engine;
pub mod events;
pub mod filter;
pub mod house;
pub mod schedule;
pub mod state;
pub mod ventilation;
