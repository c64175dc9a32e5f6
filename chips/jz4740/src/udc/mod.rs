// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! USB device controller (UDC) of the JZ4740.
//!
//! The controller is a Mentor MUSBHSFC core with three endpoints: the
//! control endpoint, a bulk IN/OUT pair and an interrupt IN endpoint. All
//! data moves through the endpoint FIFO ports by programmed I/O; the DMA
//! engine is left disabled.
//!
//! The driver only moves packets. SETUP packets are passed raw to the
//! [`hil::usb::Client`], which answers them through `send` on endpoint 0
//! and owns the buffers of data transfers.
//!
//! Every mutation of endpoint transfer state from outside the interrupt
//! handler happens with the controller's interrupt enables cleared, so the
//! handler never observes a half-queued transfer.

use core::cell::Cell;

use kernel::debug;
use kernel::hil;
use kernel::hil::usb::{DeviceSpeed, TestMode, TransferBuffer, TransferDirection, TransferType};
use kernel::platform::ClockInterface;
use kernel::utilities::registers::LocalRegisterCopy;
use kernel::ErrorCode;

/// Per-packet tracing, compiled in with the kernel's `trace_usb` feature.
macro_rules! udc_trace {
    ($($arg:tt)+) => {
        if kernel::config::CONFIG.trace_usb {
            kernel::debug!($($arg)+);
        }
    };
}

mod data;
mod ep0;
mod fifo;
#[cfg(test)]
pub(crate) mod sim;

pub mod endpoint;
pub mod registers;

pub use self::endpoint::{EndpointDescriptor, JZ4740_ENDPOINTS, N_ENDPOINTS};
pub use self::ep0::Ep0State;
pub use self::registers::{UdcMmio, UdcRegisterBank, UDC_BASE};

use self::endpoint::Endpoint;
use self::registers::{bits, Register, CSR0, INCSR, INTRUSB, OUTCSR, POWER, TESTMODE};

/// Endpoint numbers carry the direction in bit 7 on the wire.
const ENDPOINT_NUMBER_MASK: usize = 0x7f;

/// Driver for the JZ4740 USB device controller.
///
/// `R` is the register bank; boards use the memory-mapped [`UdcMmio`].
/// `power` gates the controller clock and PHY, `vbus` senses the cable.
pub struct Udc<'a, R: UdcRegisterBank = UdcMmio> {
    registers: R,
    power: &'a dyn ClockInterface,
    vbus: &'a dyn hil::gpio::Input,
    endpoints: [Endpoint<'a>; N_ENDPOINTS],
    ep0_state: Cell<Ep0State>,
    client: Cell<Option<&'a dyn hil::usb::Client<'a>>>,
    enabled: Cell<bool>,
}

impl<'a, R: UdcRegisterBank> Udc<'a, R> {
    pub const fn new(
        registers: R,
        power: &'a dyn ClockInterface,
        vbus: &'a dyn hil::gpio::Input,
    ) -> Udc<'a, R> {
        Udc::with_endpoints(registers, power, vbus, JZ4740_ENDPOINTS)
    }

    pub const fn with_endpoints(
        registers: R,
        power: &'a dyn ClockInterface,
        vbus: &'a dyn hil::gpio::Input,
        endpoints: [EndpointDescriptor; N_ENDPOINTS],
    ) -> Udc<'a, R> {
        Udc {
            registers,
            power,
            vbus,
            endpoints: [
                Endpoint::new(endpoints[0]),
                Endpoint::new(endpoints[1]),
                Endpoint::new(endpoints[2]),
                Endpoint::new(endpoints[3]),
                Endpoint::new(endpoints[4]),
            ],
            ep0_state: Cell::new(Ep0State::Idle),
            client: Cell::new(None),
            enabled: Cell::new(false),
        }
    }

    pub fn ep0_state(&self) -> Ep0State {
        self.ep0_state.get()
    }

    fn endpoint(&self, number: usize, direction: TransferDirection) -> Option<&Endpoint<'a>> {
        self.endpoints
            .iter()
            .find(|ep| ep.number() == number && ep.direction() == direction)
    }

    fn select_endpoint(&self, number: usize) {
        self.registers.write(Register::Index, number as u32);
    }

    fn csr0(&self) -> LocalRegisterCopy<u8, CSR0::Register> {
        LocalRegisterCopy::new(self.registers.read(Register::Csr0) as u8)
    }

    fn set_csr0(&self, csr0: LocalRegisterCopy<u8, CSR0::Register>) {
        self.registers.write(Register::Csr0, csr0.get().into());
    }

    fn in_csr(&self) -> LocalRegisterCopy<u16, INCSR::Register> {
        LocalRegisterCopy::new(self.registers.read(Register::InCsr) as u16)
    }

    fn set_in_csr(&self, csr: LocalRegisterCopy<u16, INCSR::Register>) {
        self.registers.write(Register::InCsr, csr.get().into());
    }

    fn out_csr(&self) -> LocalRegisterCopy<u16, OUTCSR::Register> {
        LocalRegisterCopy::new(self.registers.read(Register::OutCsr) as u16)
    }

    fn set_out_csr(&self, csr: LocalRegisterCopy<u16, OUTCSR::Register>) {
        self.registers.write(Register::OutCsr, csr.get().into());
    }

    fn is_high_speed(&self) -> bool {
        let power: LocalRegisterCopy<u8, POWER::Register> =
            LocalRegisterCopy::new(self.registers.read(Register::Power) as u8);
        power.is_set(POWER::HSMODE)
    }

    /// Run `f` with all controller interrupt sources masked.
    ///
    /// The enables are left cleared if `f` shut the controller down, for
    /// instance from a client callback.
    fn atomic<F, T>(&self, f: F) -> T
    where
        F: FnOnce() -> T,
    {
        let in_enable = self.registers.read(Register::IntrInEnable);
        let out_enable = self.registers.read(Register::IntrOutEnable);
        let usb_enable = self.registers.read(Register::IntrUsbEnable);
        self.registers.write(Register::IntrInEnable, 0);
        self.registers.write(Register::IntrOutEnable, 0);
        self.registers.write(Register::IntrUsbEnable, 0);

        let result = f();

        if self.enabled.get() {
            self.registers.write(Register::IntrInEnable, in_enable);
            self.registers.write(Register::IntrOutEnable, out_enable);
            self.registers.write(Register::IntrUsbEnable, usb_enable);
        }
        result
    }

    /// Hand a finished transfer back to the client.
    ///
    /// The endpoint is emptied before the callback so the client can queue
    /// the next transfer from inside it.
    fn complete_transfer(&self, ep: &Endpoint<'a>) {
        if let Some((buffer, transferred)) = ep.finish() {
            udc_trace!(
                "jz4740 udc: ep{} {:?} complete, {} bytes",
                ep.number(),
                ep.direction(),
                transferred
            );
            if let Some(client) = self.client.get() {
                client.transfer_complete(ep.number(), ep.direction(), Ok(()), transferred, buffer);
            }
        }
    }

    pub fn handle_interrupt(&self) {
        let usb_events: LocalRegisterCopy<u8, INTRUSB::Register> = LocalRegisterCopy::new(
            (self.registers.read(Register::IntrUsb) & !bits(INTRUSB::SOF::SET)) as u8,
        );
        let intr_in = self.registers.read(Register::IntrIn);
        let intr_out = self.registers.read(Register::IntrOut);
        let intr_dma = self.registers.read(Register::DmaIntr);

        if usb_events.get() == 0 && intr_in == 0 && intr_out == 0 && intr_dma == 0 {
            return;
        }
        udc_trace!(
            "jz4740 udc: irq usb={:#x} in={:#x} out={:#x} dma={:#x}",
            usb_events.get(),
            intr_in,
            intr_out,
            intr_dma
        );

        let ep0_bit = self
            .endpoint(0, TransferDirection::In)
            .map_or(0, |ep| ep.interrupt_bit());
        if intr_in & ep0_bit != 0 {
            self.control_handler();
        }
        // A client callback may shut the controller down part way through.
        // Nothing is dispatched after that.
        for ep in self.endpoints.iter() {
            if self.enabled.get()
                && !ep.is_control()
                && ep.direction() == TransferDirection::In
                && intr_in & ep.interrupt_bit() != 0
            {
                self.in_handler(ep);
            }
        }
        for ep in self.endpoints.iter() {
            if self.enabled.get()
                && !ep.is_control()
                && ep.direction() == TransferDirection::Out
                && intr_out & ep.interrupt_bit() != 0
            {
                self.out_handler(ep);
            }
        }
        if !self.enabled.get() {
            return;
        }
        if usb_events.is_set(INTRUSB::RESET) {
            self.bus_reset();
        }
        if usb_events.is_set(INTRUSB::SUSPEND) {
            debug!("jz4740 udc: suspend");
        }
        if usb_events.is_set(INTRUSB::RESUME) {
            debug!("jz4740 udc: resume");
        }
    }

    /// Bring the controller and every endpoint to the post-reset state and
    /// attach to the bus.
    fn bus_reset(&self) {
        debug!("jz4740 udc: bus reset");

        self.ep0_state.set(Ep0State::Idle);

        self.registers.write(Register::IntrInEnable, 0);
        self.registers.write(Register::IntrOutEnable, 0);
        self.registers.write(Register::IntrUsbEnable, 0);

        self.registers.write(Register::DmaControl1, 0);
        self.registers.write(Register::DmaControl2, 0);

        self.registers.write(Register::FunctionAddress, 0);

        self.registers.write(
            Register::Power,
            bits(POWER::SOFTCONN::SET + POWER::HSENAB::SET + POWER::SUSPENDM::SET),
        );

        self.select_endpoint(0);
        self.registers.write(
            Register::Csr0,
            bits(CSR0::SVDOUTPKTRDY::SET + CSR0::SVDSETUPEND::SET),
        );

        for ep in self.endpoints.iter() {
            ep.clear();
            if !ep.is_control() {
                self.setup_endpoint(ep);
            }
        }

        self.registers.set_bits(Register::IntrInEnable, 1);
        self.registers
            .set_bits(Register::IntrUsbEnable, bits(INTRUSB::RESET::SET));

        if let Some(client) = self.client.get() {
            client.bus_reset();
        }
    }

    /// Program packet size, mode and interrupt enable of a data endpoint.
    fn setup_endpoint(&self, ep: &Endpoint<'a>) {
        self.select_endpoint(ep.number());
        ep.update_fifo_capacity(self.is_high_speed());
        let capacity = ep.fifo_capacity() as u32;

        match ep.direction() {
            TransferDirection::In => {
                self.registers.write(Register::InMaxPacket, capacity);
                let mut csr: LocalRegisterCopy<u16, INCSR::Register> = LocalRegisterCopy::new(0);
                csr.write(INCSR::FF::SET + INCSR::CDT::SET + INCSR::MODE::SET);
                if ep.uses_dma() {
                    csr.modify(INCSR::DMAREQENAB::SET + INCSR::AUTOSET::SET);
                }
                self.registers
                    .set_bits(Register::IntrInEnable, ep.interrupt_bit());
                self.set_in_csr(csr);
            }
            TransferDirection::Out => {
                self.registers.write(Register::OutMaxPacket, capacity);
                let mut csr: LocalRegisterCopy<u16, OUTCSR::Register> = LocalRegisterCopy::new(0);
                csr.write(OUTCSR::FF::SET + OUTCSR::CDT::SET);
                if ep.transfer_type() == TransferType::Interrupt {
                    csr.modify(OUTCSR::DNYT::SET);
                }
                if ep.uses_dma() {
                    csr.modify(
                        OUTCSR::DMAREQENAB::SET + OUTCSR::AUTOCLR::SET + OUTCSR::DMAREQMODE::SET,
                    );
                }
                self.registers
                    .set_bits(Register::IntrOutEnable, ep.interrupt_bit());
                self.set_out_csr(csr);
            }
        }
    }
}

impl<'a, R: UdcRegisterBank> hil::usb::UsbDeviceController<'a> for Udc<'a, R> {
    fn set_client(&self, client: &'a dyn hil::usb::Client<'a>) {
        self.client.set(Some(client));
    }

    fn initialize(&self) {
        debug!("jz4740 udc: initialize");
        self.power.enable();
        self.enabled.set(true);
        self.bus_reset();
    }

    fn shutdown(&self) {
        debug!("jz4740 udc: shutdown");
        self.registers.write(Register::IntrInEnable, 0);
        self.registers.write(Register::IntrOutEnable, 0);
        self.registers.write(Register::IntrUsbEnable, 0);

        self.registers.write(Register::DmaControl1, 0);
        self.registers.write(Register::DmaControl2, 0);

        self.registers
            .clear_bits(Register::Power, bits(POWER::SOFTCONN::SET));

        self.enabled.set(false);
        self.power.disable();
    }

    fn send(
        &self,
        endpoint: usize,
        buffer: Option<&'a [u8]>,
        length: usize,
    ) -> Result<(), ErrorCode> {
        let endpoint = endpoint & ENDPOINT_NUMBER_MASK;
        udc_trace!("jz4740 udc: send ep{} {} bytes", endpoint, length);

        // Status stage of a request without data: the hardware
        // acknowledges it on its own.
        if endpoint == 0 && buffer.is_none() && length == 0 {
            return Ok(());
        }
        if !self.enabled.get() {
            return Err(ErrorCode::OFF);
        }
        let ep = self
            .endpoint(endpoint, TransferDirection::In)
            .ok_or(ErrorCode::INVAL)?;
        let buffer = buffer.ok_or(ErrorCode::INVAL)?;
        if length > buffer.len() {
            return Err(ErrorCode::SIZE);
        }
        if ep.uses_dma() {
            return Err(ErrorCode::NOSUPPORT);
        }

        self.atomic(|| {
            if ep.is_control() {
                // A new response replaces whatever was left of the last one.
                ep.start(TransferBuffer::In(buffer), length);
                self.ep0_state.set(Ep0State::Transmitting);
                self.ep0_transmit();
            } else {
                if ep.in_flight() {
                    return Err(ErrorCode::BUSY);
                }
                ep.start(TransferBuffer::In(buffer), length);
                self.in_handler(ep);
            }
            Ok(())
        })
    }

    fn receive(
        &self,
        endpoint: usize,
        buffer: Option<&'a mut [u8]>,
        length: usize,
    ) -> Result<(), (ErrorCode, Option<&'a mut [u8]>)> {
        let endpoint = endpoint & ENDPOINT_NUMBER_MASK;
        udc_trace!("jz4740 udc: receive ep{} {} bytes", endpoint, length);

        if endpoint == 0 {
            // Control OUT data stages are not supported; a bare receive
            // only acknowledges the status stage.
            return match buffer {
                None if length == 0 => Ok(()),
                None => Err((ErrorCode::INVAL, None)),
                Some(buffer) => Err((ErrorCode::NOSUPPORT, Some(buffer))),
            };
        }
        if !self.enabled.get() {
            return Err((ErrorCode::OFF, buffer));
        }
        let ep = match self.endpoint(endpoint, TransferDirection::Out) {
            Some(ep) => ep,
            None => return Err((ErrorCode::INVAL, buffer)),
        };
        let buffer = match buffer {
            Some(buffer) => buffer,
            None => return Err((ErrorCode::INVAL, None)),
        };
        if length > buffer.len() {
            return Err((ErrorCode::SIZE, Some(buffer)));
        }
        if ep.uses_dma() {
            return Err((ErrorCode::NOSUPPORT, Some(buffer)));
        }

        self.atomic(|| {
            if ep.in_flight() {
                return Err((ErrorCode::BUSY, Some(buffer)));
            }
            ep.start(TransferBuffer::Out(buffer), length);
            Ok(())
        })
    }

    fn cancel_all_transfers(&self) {
        udc_trace!("jz4740 udc: cancel all transfers");
        if !self.enabled.get() {
            // Clock gated: the FIFOs are reset with the controller anyway.
            for ep in self.endpoints.iter() {
                ep.clear();
            }
            self.ep0_state.set(Ep0State::Idle);
            return;
        }
        self.atomic(|| {
            for ep in self.endpoints.iter() {
                ep.clear();
                self.select_endpoint(ep.number());
                self.flush_fifo(ep);
            }
            self.ep0_state.set(Ep0State::Idle);
        });
    }

    fn stall(
        &self,
        endpoint: usize,
        stall: bool,
        direction: TransferDirection,
    ) -> Result<(), ErrorCode> {
        let endpoint = endpoint & ENDPOINT_NUMBER_MASK;
        let ep = self
            .endpoint(endpoint, direction)
            .ok_or(ErrorCode::INVAL)?;
        if !self.enabled.get() {
            return Err(ErrorCode::OFF);
        }
        debug!(
            "jz4740 udc: {} ep{} {:?}",
            if stall { "stall" } else { "unstall" },
            endpoint,
            direction
        );

        self.select_endpoint(endpoint);
        if ep.is_control() {
            if stall {
                self.registers
                    .set_bits(Register::Csr0, bits(CSR0::SENDSTALL::SET));
            } else {
                self.registers
                    .clear_bits(Register::Csr0, bits(CSR0::SENDSTALL::SET));
            }
            return Ok(());
        }

        match direction {
            TransferDirection::In => {
                let mut csr = self.in_csr();
                if stall {
                    csr.modify(INCSR::SENDSTALL::SET);
                } else {
                    // Leaving the halt state restarts the data toggle.
                    csr.modify(INCSR::SENDSTALL::CLEAR + INCSR::CDT::SET);
                }
                self.set_in_csr(csr);
            }
            TransferDirection::Out => {
                let mut csr = self.out_csr();
                if stall {
                    csr.modify(OUTCSR::SENDSTALL::SET);
                } else {
                    csr.modify(OUTCSR::SENDSTALL::CLEAR + OUTCSR::CDT::SET);
                }
                self.set_out_csr(csr);
            }
        }
        Ok(())
    }

    fn is_stalled(
        &self,
        endpoint: usize,
        direction: TransferDirection,
    ) -> Result<bool, ErrorCode> {
        let endpoint = endpoint & ENDPOINT_NUMBER_MASK;
        let ep = self
            .endpoint(endpoint, direction)
            .ok_or(ErrorCode::INVAL)?;
        if !self.enabled.get() {
            return Err(ErrorCode::OFF);
        }

        self.select_endpoint(endpoint);
        if ep.is_control() {
            return Ok(self.csr0().is_set(CSR0::SENDSTALL));
        }
        Ok(match direction {
            TransferDirection::In => self.in_csr().is_set(INCSR::SENDSTALL),
            TransferDirection::Out => self.out_csr().is_set(OUTCSR::SENDSTALL),
        })
    }

    fn port_speed(&self) -> DeviceSpeed {
        if self.enabled.get() && self.is_high_speed() {
            DeviceSpeed::High
        } else {
            DeviceSpeed::Full
        }
    }

    fn connected(&self) -> bool {
        self.vbus.read()
    }

    fn set_address(&self, address: u8) {
        debug!("jz4740 udc: set address {}", address);
        if !self.enabled.get() {
            return;
        }
        self.registers
            .write(Register::FunctionAddress, u32::from(address & 0x7f));
    }

    fn set_test_mode(&self, mode: TestMode) {
        debug!("jz4740 udc: test mode {:?}", mode);
        if !self.enabled.get() {
            return;
        }
        let mut test_mode: LocalRegisterCopy<u8, TESTMODE::Register> =
            LocalRegisterCopy::new(self.registers.read(Register::TestMode) as u8);
        match mode {
            TestMode::Disabled => test_mode.modify(
                TESTMODE::SE0NAK::CLEAR
                    + TESTMODE::J::CLEAR
                    + TESTMODE::K::CLEAR
                    + TESTMODE::PACKET::CLEAR,
            ),
            TestMode::J => test_mode.modify(TESTMODE::J::SET),
            TestMode::K => test_mode.modify(TESTMODE::K::SET),
            TestMode::Se0Nak => test_mode.modify(TESTMODE::SE0NAK::SET),
            TestMode::Packet => test_mode.modify(TESTMODE::PACKET::SET),
        }
        self.registers
            .write(Register::TestMode, test_mode.get().into());
    }

    fn request_endpoint(
        &self,
        transfer_type: TransferType,
        direction: TransferDirection,
    ) -> Result<usize, ErrorCode> {
        let ep = self
            .endpoints
            .iter()
            .find(|ep| {
                !ep.is_control()
                    && ep.transfer_type() == transfer_type
                    && ep.direction() == direction
                    && !ep.is_claimed()
            })
            .ok_or(ErrorCode::INVAL)?;
        ep.set_claimed(true);
        Ok(ep.number())
    }

    fn release_endpoint(&self, endpoint: usize, direction: TransferDirection) {
        if let Some(ep) = self.endpoint(endpoint & ENDPOINT_NUMBER_MASK, direction) {
            ep.set_claimed(false);
        }
    }
}
