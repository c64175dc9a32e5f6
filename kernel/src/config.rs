// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Data structure for storing compile-time configuration options.
//!
//! Configuration is a typed `const` object rather than scattered `#[cfg]`
//! attributes. All code paths guarded by a configuration value are still
//! type-checked by the compiler, and the constant folds away at build time,
//! so a disabled option costs nothing in the resulting binary.

/// Data structure holding compile-time configuration options.
///
/// To change the configuration, enable the matching Cargo feature of the
/// kernel crate from the board crate.
pub struct Config {
    /// Whether USB controller drivers should trace every packet they move to
    /// the debug output.
    ///
    /// If enabled, drivers print the endpoint, direction and size of each
    /// FIFO transfer and the raw status registers seen by each interrupt.
    /// This is very chatty and will overflow the debug buffer on a busy bus.
    pub trace_usb: bool,
}

/// A unique instance of `Config` where compile-time configuration options are
/// defined. Notably, this is the only location where we permit `#[cfg(x)]` to
/// be used to configure code based on Cargo features.
pub const CONFIG: Config = Config {
    trace_usb: cfg!(feature = "trace_usb"),
};
