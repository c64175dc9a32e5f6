// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Peripheral implementations for the Ingenic JZ4740 SoC.

#![crate_name = "jz4740"]
#![crate_type = "rlib"]
#![no_std]

#[cfg(test)]
extern crate std;

pub mod chip;
pub mod cpm;
pub mod interrupts;
pub mod udc;
