//! Hardware-independent core library for growhat-rs
//!
//! This crate contains all platform-agnostic logic for the Grow HAT plant
//! monitor: frequency meters for the capacitive moisture probes, the
//! saturation model, pump and piezo actuators, the per-channel watering and
//! alarm state machine, settings persistence and the tick cycle that ties them
//! together.
//!
//! It is `#![no_std]` with `extern crate alloc` so it compiles on both the
//! Raspberry Pi and desktop hosts (for the monitor simulation and tests).

#![no_std]

extern crate alloc;

pub mod actuators;
pub mod alarm;
pub mod app_state;
pub mod board;
pub mod channel;
pub mod config;
pub mod gpio;
pub mod input;
pub mod sensors;
pub mod storage;
pub mod timing;

#[cfg(test)]
mod mock;
