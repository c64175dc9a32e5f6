// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Clock and Power Manager (CPM).
//!
//! Only the pieces peripheral drivers need are exposed: the module clock
//! gates and the USB PHY power switch.

use kernel::platform::ClockInterface;
use kernel::utilities::registers::interfaces::{ReadWriteable, Readable};
use kernel::utilities::registers::{register_bitfields, register_structs, ReadWrite};
use kernel::utilities::StaticRef;

register_structs! {
    pub CpmRegisters {
        (0x00 => _reserved0),
        (0x20 => clkgr: ReadWrite<u32, CLKGR::Register>),
        (0x24 => scr: ReadWrite<u32, SCR::Register>),
        (0x28 => @END),
    }
}

register_bitfields![u32,
    // A set bit stops the module clock.
    CLKGR [
        UART0 OFFSET(0) NUMBITS(1) [],
        TCU OFFSET(1) NUMBITS(1) [],
        RTC OFFSET(2) NUMBITS(1) [],
        I2C OFFSET(3) NUMBITS(1) [],
        SSI OFFSET(4) NUMBITS(1) [],
        AIC1 OFFSET(5) NUMBITS(1) [],
        AIC2 OFFSET(6) NUMBITS(1) [],
        MSC OFFSET(7) NUMBITS(1) [],
        SADC OFFSET(8) NUMBITS(1) [],
        CIM OFFSET(9) NUMBITS(1) [],
        LCD OFFSET(10) NUMBITS(1) [],
        UDC OFFSET(11) NUMBITS(1) [],
        DMAC OFFSET(12) NUMBITS(1) [],
        IPU OFFSET(13) NUMBITS(1) [],
        UHC OFFSET(14) NUMBITS(1) [],
        UART1 OFFSET(15) NUMBITS(1) []
    ],
    SCR [
        USBPHY_ENABLE OFFSET(6) NUMBITS(1) []
    ]
];

const CPM_BASE: StaticRef<CpmRegisters> =
    unsafe { StaticRef::new(0xB000_0000 as *const CpmRegisters) };

pub struct Cpm {
    registers: StaticRef<CpmRegisters>,
}

impl Cpm {
    pub const fn new() -> Cpm {
        Cpm::with_registers(CPM_BASE)
    }

    const fn with_registers(registers: StaticRef<CpmRegisters>) -> Cpm {
        Cpm { registers }
    }

    pub fn is_enabled_udc_clock(&self) -> bool {
        !self.registers.clkgr.is_set(CLKGR::UDC)
    }

    pub fn enable_udc_clock(&self) {
        self.registers.clkgr.modify(CLKGR::UDC::CLEAR);
    }

    pub fn disable_udc_clock(&self) {
        self.registers.clkgr.modify(CLKGR::UDC::SET);
    }

    pub fn is_enabled_usb_phy(&self) -> bool {
        self.registers.scr.is_set(SCR::USBPHY_ENABLE)
    }

    pub fn enable_usb_phy(&self) {
        self.registers.scr.modify(SCR::USBPHY_ENABLE::SET);
    }

    pub fn disable_usb_phy(&self) {
        self.registers.scr.modify(SCR::USBPHY_ENABLE::CLEAR);
    }
}

/// Power domain of the USB device controller: its module clock plus the PHY.
pub struct UdcPower<'a> {
    cpm: &'a Cpm,
}

impl<'a> UdcPower<'a> {
    pub const fn new(cpm: &'a Cpm) -> UdcPower<'a> {
        UdcPower { cpm }
    }
}

impl ClockInterface for UdcPower<'_> {
    fn is_enabled(&self) -> bool {
        self.cpm.is_enabled_udc_clock() && self.cpm.is_enabled_usb_phy()
    }

    fn enable(&self) {
        self.cpm.enable_udc_clock();
        self.cpm.enable_usb_phy();
    }

    fn disable(&self) {
        self.cpm.disable_usb_phy();
        self.cpm.disable_udc_clock();
    }
}
