// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interrupt mapping for the JZ4740 peripherals.

use kernel::hil;
use kernel::platform::{ClockInterface, InterruptService};

use crate::interrupts;
use crate::udc::{self, UdcMmio, UdcRegisterBank, UDC_BASE};

/// This struct, when initialized, instantiates all peripheral drivers for
/// the JZ4740. If a board wishes to use only a subset of these peripherals,
/// this should not be used or imported, and a modified version should be
/// constructed manually in main.rs.
pub struct Jz4740DefaultPeripherals<'a, R: UdcRegisterBank = UdcMmio> {
    pub udc: udc::Udc<'a, R>,
}

impl<'a> Jz4740DefaultPeripherals<'a> {
    /// `udc_power` gates the controller clock and PHY, usually a
    /// [`crate::cpm::UdcPower`]. `vbus` reads the VBUS detect pin.
    pub fn new(udc_power: &'a dyn ClockInterface, vbus: &'a dyn hil::gpio::Input) -> Self {
        Self {
            udc: udc::Udc::new(UdcMmio::new(UDC_BASE), udc_power, vbus),
        }
    }
}

impl<'a, R: UdcRegisterBank> InterruptService for Jz4740DefaultPeripherals<'a, R> {
    unsafe fn service_interrupt(&self, interrupt: u32) -> bool {
        match interrupt {
            interrupts::UDC => self.udc.handle_interrupt(),
            _ => return false,
        }
        true
    }
}
