// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Core Kernel Support
//!
//! The kernel crate holds the shared code that chip drivers and boards use:
//! the Hardware Interface Layer (HIL) definitions, the standard error type,
//! the kernel debug writer and compile-time configuration.
//!
//! Most `unsafe` code is in this kernel crate.

#![warn(unreachable_pub)]
#![no_std]

#[cfg(test)]
extern crate std;

#[macro_use]
pub mod debug;
pub mod config;
pub mod hil;
pub mod platform;
pub mod utilities;

mod errorcode;

pub use crate::errorcode::ErrorCode;
