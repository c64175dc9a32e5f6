// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Register map of the JZ4740 UDC (a Mentor MUSBHSFC core).
//!
//! The driver does not touch the MMIO block directly. It goes through
//! [`UdcRegisterBank`], which names every register it uses, so that the
//! endpoint state machines can run against a simulated controller in tests.
//! Register values are decoded with the bitfields below through
//! `LocalRegisterCopy`.

use kernel::utilities::registers::interfaces::{Readable, Writeable};
use kernel::utilities::registers::{
    register_bitfields, register_structs, FieldValue, LocalRegisterCopy, ReadOnly, ReadWrite,
    RegisterLongName, UIntLike,
};
use kernel::utilities::StaticRef;

/// Number of FIFO ports in the register map.
pub const N_FIFOS: usize = 16;

register_structs! {
    pub UdcRegisters {
        (0x000 => faddr: ReadWrite<u8>),
        (0x001 => power: ReadWrite<u8, POWER::Register>),
        (0x002 => intrin: ReadOnly<u16>),
        (0x004 => introut: ReadOnly<u16>),
        (0x006 => intrine: ReadWrite<u16>),
        (0x008 => introute: ReadWrite<u16>),
        (0x00a => intrusb: ReadOnly<u8, INTRUSB::Register>),
        (0x00b => intrusbe: ReadWrite<u8, INTRUSB::Register>),
        (0x00c => frame: ReadOnly<u16>),
        (0x00e => index: ReadWrite<u8>),
        (0x00f => testmode: ReadWrite<u8, TESTMODE::Register>),
        (0x010 => inmaxp: ReadWrite<u16>),
        // CSR0 while endpoint 0 is selected, low half of INCSR otherwise.
        (0x012 => csr: ReadWrite<u8>),
        (0x013 => incsrh: ReadWrite<u8>),
        (0x014 => outmaxp: ReadWrite<u16>),
        (0x016 => outcsr: ReadWrite<u16, OUTCSR::Register>),
        // COUNT0 while endpoint 0 is selected, OUTCOUNT otherwise.
        (0x018 => count: ReadOnly<u16>),
        (0x01a => _reserved0),
        (0x020 => fifo: [ReadWrite<u32>; N_FIFOS]),
        (0x060 => _reserved1),
        (0x200 => dma_intr: ReadOnly<u8>),
        (0x201 => _reserved2),
        (0x204 => cntl1: ReadWrite<u32>),
        (0x208 => _reserved3),
        (0x214 => cntl2: ReadWrite<u32>),
        (0x218 => @END),
    }
}

register_bitfields![u8,
    pub POWER [
        SUSPENDM OFFSET(0) NUMBITS(1) [],
        SUSPENDMODE OFFSET(1) NUMBITS(1) [],
        RESUME OFFSET(2) NUMBITS(1) [],
        RESET OFFSET(3) NUMBITS(1) [],
        HSMODE OFFSET(4) NUMBITS(1) [],
        HSENAB OFFSET(5) NUMBITS(1) [],
        SOFTCONN OFFSET(6) NUMBITS(1) [],
        ISOUPDATE OFFSET(7) NUMBITS(1) []
    ],
    pub INTRUSB [
        SUSPEND OFFSET(0) NUMBITS(1) [],
        RESUME OFFSET(1) NUMBITS(1) [],
        RESET OFFSET(2) NUMBITS(1) [],
        SOF OFFSET(3) NUMBITS(1) []
    ],
    pub CSR0 [
        OUTPKTRDY OFFSET(0) NUMBITS(1) [],
        INPKTRDY OFFSET(1) NUMBITS(1) [],
        SENTSTALL OFFSET(2) NUMBITS(1) [],
        DATAEND OFFSET(3) NUMBITS(1) [],
        SETUPEND OFFSET(4) NUMBITS(1) [],
        SENDSTALL OFFSET(5) NUMBITS(1) [],
        SVDOUTPKTRDY OFFSET(6) NUMBITS(1) [],
        SVDSETUPEND OFFSET(7) NUMBITS(1) []
    ],
    pub TESTMODE [
        SE0NAK OFFSET(0) NUMBITS(1) [],
        J OFFSET(1) NUMBITS(1) [],
        K OFFSET(2) NUMBITS(1) [],
        PACKET OFFSET(3) NUMBITS(1) [],
        FORCE_HS OFFSET(4) NUMBITS(1) [],
        FORCE_FS OFFSET(5) NUMBITS(1) [],
        FIFO_ACCESS OFFSET(6) NUMBITS(1) [],
        FORCE_HOST OFFSET(7) NUMBITS(1) []
    ]
];

register_bitfields![u16,
    pub INCSR [
        INPKTRDY OFFSET(0) NUMBITS(1) [],
        FFNOTEMPT OFFSET(1) NUMBITS(1) [],
        UNDERRUN OFFSET(2) NUMBITS(1) [],
        FF OFFSET(3) NUMBITS(1) [],
        SENDSTALL OFFSET(4) NUMBITS(1) [],
        SENTSTALL OFFSET(5) NUMBITS(1) [],
        CDT OFFSET(6) NUMBITS(1) [],
        DMAREQMODE OFFSET(10) NUMBITS(1) [],
        DMAREQENAB OFFSET(12) NUMBITS(1) [],
        MODE OFFSET(13) NUMBITS(1) [],
        ISO OFFSET(14) NUMBITS(1) [],
        AUTOSET OFFSET(15) NUMBITS(1) []
    ],
    pub OUTCSR [
        OUTPKTRDY OFFSET(0) NUMBITS(1) [],
        FFFULL OFFSET(1) NUMBITS(1) [],
        OVERRUN OFFSET(2) NUMBITS(1) [],
        DATAERR OFFSET(3) NUMBITS(1) [],
        FF OFFSET(4) NUMBITS(1) [],
        SENDSTALL OFFSET(5) NUMBITS(1) [],
        SENTSTALL OFFSET(6) NUMBITS(1) [],
        CDT OFFSET(7) NUMBITS(1) [],
        DMAREQMODE OFFSET(11) NUMBITS(1) [],
        DNYT OFFSET(12) NUMBITS(1) [],
        DMAREQENAB OFFSET(13) NUMBITS(1) [],
        ISO OFFSET(14) NUMBITS(1) [],
        AUTOCLR OFFSET(15) NUMBITS(1) []
    ]
];

/// UDC block, through the uncached KSEG1 window.
pub const UDC_BASE: StaticRef<UdcRegisters> =
    unsafe { StaticRef::new(0xB304_0000 as *const UdcRegisters) };

/// Registers the driver accesses.
///
/// The CSR and count registers are banked: they refer to the endpoint
/// last written to `Index`.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Register {
    FunctionAddress,
    Power,
    /// Per-endpoint IN interrupt status, cleared on read.
    IntrIn,
    /// Per-endpoint OUT interrupt status, cleared on read.
    IntrOut,
    IntrInEnable,
    IntrOutEnable,
    /// Bus event status, cleared on read.
    IntrUsb,
    IntrUsbEnable,
    Frame,
    Index,
    TestMode,
    InMaxPacket,
    Csr0,
    InCsr,
    OutMaxPacket,
    OutCsr,
    /// COUNT0 for endpoint 0, OUTCOUNT for the others.
    Count,
    /// DMA interrupt status, cleared on read.
    DmaIntr,
    DmaControl1,
    DmaControl2,
}

/// Access to the UDC registers and FIFO ports.
///
/// FIFO ports are streams: every read pops and every write pushes, either a
/// little-endian 32-bit word or a single byte.
pub trait UdcRegisterBank {
    fn read(&self, register: Register) -> u32;
    fn write(&self, register: Register, value: u32);

    fn set_bits(&self, register: Register, mask: u32) {
        self.write(register, self.read(register) | mask);
    }

    fn clear_bits(&self, register: Register, mask: u32) {
        self.write(register, self.read(register) & !mask);
    }

    fn fifo_read_word(&self, fifo: usize) -> u32;
    fn fifo_read_byte(&self, fifo: usize) -> u8;
    fn fifo_write_word(&self, fifo: usize, word: u32);
    fn fifo_write_byte(&self, fifo: usize, byte: u8);
}

impl<B: UdcRegisterBank + ?Sized> UdcRegisterBank for &B {
    fn read(&self, register: Register) -> u32 {
        (**self).read(register)
    }

    fn write(&self, register: Register, value: u32) {
        (**self).write(register, value)
    }

    fn set_bits(&self, register: Register, mask: u32) {
        (**self).set_bits(register, mask)
    }

    fn clear_bits(&self, register: Register, mask: u32) {
        (**self).clear_bits(register, mask)
    }

    fn fifo_read_word(&self, fifo: usize) -> u32 {
        (**self).fifo_read_word(fifo)
    }

    fn fifo_read_byte(&self, fifo: usize) -> u8 {
        (**self).fifo_read_byte(fifo)
    }

    fn fifo_write_word(&self, fifo: usize, word: u32) {
        (**self).fifo_write_word(fifo, word)
    }

    fn fifo_write_byte(&self, fifo: usize, byte: u8) {
        (**self).fifo_write_byte(fifo, byte)
    }
}

/// Raw bits of a field value, for the untyped register bank interface.
pub(crate) fn bits<T, R>(value: FieldValue<T, R>) -> u32
where
    T: UIntLike + Into<u32>,
    R: RegisterLongName,
{
    let mut reg = LocalRegisterCopy::<T, R>::new(T::zero());
    reg.write(value);
    reg.get().into()
}

/// The memory-mapped controller.
pub struct UdcMmio {
    registers: StaticRef<UdcRegisters>,
}

impl UdcMmio {
    pub const fn new(registers: StaticRef<UdcRegisters>) -> UdcMmio {
        UdcMmio { registers }
    }

    fn fifo_port(&self, fifo: usize) -> *mut u8 {
        &self.registers.fifo[fifo] as *const ReadWrite<u32> as *mut u8
    }
}

impl UdcRegisterBank for UdcMmio {
    fn read(&self, register: Register) -> u32 {
        let regs = &*self.registers;
        match register {
            Register::FunctionAddress => regs.faddr.get().into(),
            Register::Power => regs.power.get().into(),
            Register::IntrIn => regs.intrin.get().into(),
            Register::IntrOut => regs.introut.get().into(),
            Register::IntrInEnable => regs.intrine.get().into(),
            Register::IntrOutEnable => regs.introute.get().into(),
            Register::IntrUsb => regs.intrusb.get().into(),
            Register::IntrUsbEnable => regs.intrusbe.get().into(),
            Register::Frame => regs.frame.get().into(),
            Register::Index => regs.index.get().into(),
            Register::TestMode => regs.testmode.get().into(),
            Register::InMaxPacket => regs.inmaxp.get().into(),
            Register::Csr0 => regs.csr.get().into(),
            Register::InCsr => u32::from(regs.csr.get()) | (u32::from(regs.incsrh.get()) << 8),
            Register::OutMaxPacket => regs.outmaxp.get().into(),
            Register::OutCsr => regs.outcsr.get().into(),
            Register::Count => regs.count.get().into(),
            Register::DmaIntr => regs.dma_intr.get().into(),
            Register::DmaControl1 => regs.cntl1.get(),
            Register::DmaControl2 => regs.cntl2.get(),
        }
    }

    fn write(&self, register: Register, value: u32) {
        let regs = &*self.registers;
        match register {
            Register::FunctionAddress => regs.faddr.set(value as u8),
            Register::Power => regs.power.set(value as u8),
            Register::IntrInEnable => regs.intrine.set(value as u16),
            Register::IntrOutEnable => regs.introute.set(value as u16),
            Register::IntrUsbEnable => regs.intrusbe.set(value as u8),
            Register::Index => regs.index.set(value as u8),
            Register::TestMode => regs.testmode.set(value as u8),
            Register::InMaxPacket => regs.inmaxp.set(value as u16),
            Register::Csr0 => regs.csr.set(value as u8),
            Register::InCsr => {
                // Mode bits first, so INPKTRDY is raised with the final
                // configuration in place.
                regs.incsrh.set((value >> 8) as u8);
                regs.csr.set(value as u8);
            }
            Register::OutMaxPacket => regs.outmaxp.set(value as u16),
            Register::OutCsr => regs.outcsr.set(value as u16),
            Register::DmaControl1 => regs.cntl1.set(value),
            Register::DmaControl2 => regs.cntl2.set(value),
            Register::IntrIn
            | Register::IntrOut
            | Register::IntrUsb
            | Register::Frame
            | Register::Count
            | Register::DmaIntr => {}
        }
    }

    fn fifo_read_word(&self, fifo: usize) -> u32 {
        self.registers.fifo[fifo].get()
    }

    fn fifo_read_byte(&self, fifo: usize) -> u8 {
        // Safety: the port is a valid MMIO address and byte accesses pop a
        // single byte from the FIFO.
        unsafe { core::ptr::read_volatile(self.fifo_port(fifo)) }
    }

    fn fifo_write_word(&self, fifo: usize, word: u32) {
        self.registers.fifo[fifo].set(word);
    }

    fn fifo_write_byte(&self, fifo: usize, byte: u8) {
        // Safety: as for `fifo_read_byte`.
        unsafe { core::ptr::write_volatile(self.fifo_port(fifo), byte) }
    }
}
