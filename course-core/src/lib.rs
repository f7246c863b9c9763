#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Course control logic for the line-following task robot.
//
// Everything here stays free of the Rust standard library so the same state
// machines run on the MCU firmware and inside the host emulator. Hardware is
// reached only through the port traits in `sensors` and `sequences`.

pub mod base;
pub mod config;
pub mod console;
pub mod control;
pub mod drive;
pub mod orchestrator;
pub mod sensors;
pub mod sequences;
pub mod telemetry;
