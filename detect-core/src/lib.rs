#![no_std]

// Shared logic for the peer presence detector.
//
// This crate stays portable across MCU firmware and host tooling by avoiding the
// Rust standard library. Hardware access goes through the traits exposed by
// `detector` and `deferred`; each target supplies its own implementations.

pub mod console;
pub mod deferred;
pub mod detector;
pub mod state;
pub mod telemetry;
