// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Named interrupts of the JZ4740 interrupt controller.

pub const I2C: u32 = 1;
pub const UHC: u32 = 3;
pub const UART1: u32 = 8;
pub const UART0: u32 = 9;
pub const SADC: u32 = 12;
pub const MSC: u32 = 14;
pub const RTC: u32 = 15;
pub const SSI: u32 = 16;
pub const CIM: u32 = 17;
pub const AIC: u32 = 18;
pub const ETH: u32 = 19;
pub const DMAC: u32 = 20;
pub const TCU2: u32 = 21;
pub const TCU1: u32 = 22;
pub const TCU0: u32 = 23;
pub const UDC: u32 = 24;
pub const IPU: u32 = 29;
pub const LCD: u32 = 30;
