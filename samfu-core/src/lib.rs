//! Core protocol and pipeline logic for acquiring Samsung mobile device
//! firmware.
//!
//! This crate implements the coupled set of subsystems needed to detect a
//! connected Samsung phone over a serial transport, identify it, query
//! Samsung's update servers for the latest applicable build, download the
//! encrypted package (with resume), decrypt it, extract and verify its
//! components, and maintain a local, idempotent content repository that
//! survives interruption and restart.
//!
//! This crate does not flash firmware onto a device, re-sign or re-package
//! firmware, support non-Samsung devices, or drive anything beyond a single
//! device session at a time. It has no GUI, no bundled configuration file
//! format, and no region-name table — those are left to callers such as
//! `samfu-cli`.
//!
//! # Layout
//!
//! - [`crypto`]: AES/MD5 primitives used by the FUS challenge/response and
//!   the ENC4 firmware container format.
//! - [`serial`]: serial port enumeration and framed, timeout-bounded I/O.
//! - [`device`]: the AT and Odin device channels and the mode coordinator
//!   that bridges them.
//! - [`fota`]: the read-only FOTA version probe.
//! - [`fus`]: the authenticated FUS RPC client and its XML message codec.
//! - [`version`]: firmware version code normalization.
//! - [`acquire`]: the download, decrypt, and extraction engines.
//! - [`repo`]: the persistent SQLite-backed repository.
//! - [`orchestrator`]: the end-to-end pipeline state machine.
//! - [`config`]: the finite set of configuration knobs the core accepts.

pub mod acquire;
pub mod config;
pub mod crypto;
pub mod device;
pub mod fota;
pub mod fus;
pub mod orchestrator;
pub mod repo;
pub mod serial;
pub mod version;
