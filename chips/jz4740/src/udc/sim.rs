// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Simulated UDC for the driver tests.
//!
//! Models what the driver relies on: index-banked CSRs, read-to-clear
//! interrupt status, FIFO ports as byte streams, and IN packets leaving as
//! soon as INPKTRDY is written (raising the endpoint's IN interrupt, as the
//! hardware does once the host has collected the packet).

use core::cell::{Cell, RefCell};
use std::boxed::Box;
use std::collections::VecDeque;
use std::mem;
use std::vec::Vec;

use kernel::hil;
use kernel::hil::usb::{TransferBuffer, TransferDirection, UsbDeviceController};
use kernel::platform::ClockInterface;
use kernel::ErrorCode;

use super::endpoint::{EndpointDescriptor, JZ4740_ENDPOINTS, N_ENDPOINTS};
use super::registers::{bits, Register, UdcRegisterBank, CSR0, INCSR, OUTCSR, POWER};
use super::Udc;

const N_SIM_ENDPOINTS: usize = 3;

/// A packet handed to the host.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Packet {
    pub(crate) endpoint: usize,
    pub(crate) data: Vec<u8>,
    /// Sent with DATAEND: last packet of a control transfer.
    pub(crate) data_end: bool,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub(crate) struct FifoAccesses {
    pub(crate) word_reads: usize,
    pub(crate) byte_reads: usize,
    pub(crate) word_writes: usize,
    pub(crate) byte_writes: usize,
}

#[derive(Default)]
struct State {
    index: usize,
    faddr: u32,
    power: u32,
    high_speed: bool,
    intr_in: u32,
    intr_out: u32,
    intr_usb: u32,
    dma_intr: u32,
    intr_in_enable: u32,
    intr_out_enable: u32,
    intr_usb_enable: u32,
    test_mode: u32,
    dma_control: [u32; 2],
    csr0: u32,
    in_csr: [u32; N_SIM_ENDPOINTS],
    out_csr: [u32; N_SIM_ENDPOINTS],
    in_maxp: [u32; N_SIM_ENDPOINTS],
    out_maxp: [u32; N_SIM_ENDPOINTS],
    rx: [VecDeque<u8>; N_SIM_ENDPOINTS],
    tx: [Vec<u8>; N_SIM_ENDPOINTS],
    sent: Vec<Packet>,
    flushes: Vec<(usize, TransferDirection)>,
    toggle_resets: Vec<(usize, TransferDirection)>,
    writes: Vec<(Register, u32)>,
    fifo: FifoAccesses,
}

impl State {
    fn value(&self, register: Register) -> u32 {
        let index = self.index;
        match register {
            Register::FunctionAddress => self.faddr,
            Register::Power => {
                if self.high_speed {
                    self.power | bits(POWER::HSMODE::SET)
                } else {
                    self.power
                }
            }
            Register::IntrIn => self.intr_in,
            Register::IntrOut => self.intr_out,
            Register::IntrUsb => self.intr_usb,
            Register::DmaIntr => self.dma_intr,
            Register::IntrInEnable => self.intr_in_enable,
            Register::IntrOutEnable => self.intr_out_enable,
            Register::IntrUsbEnable => self.intr_usb_enable,
            Register::Frame => 0,
            Register::Index => index as u32,
            Register::TestMode => self.test_mode,
            Register::InMaxPacket => self.in_maxp[index],
            Register::OutMaxPacket => self.out_maxp[index],
            Register::Csr0 | Register::InCsr if index == 0 => self.csr0,
            Register::Csr0 => self.in_csr[index] & 0xff,
            Register::InCsr => self.in_csr[index],
            Register::OutCsr => self.out_csr[index],
            Register::Count => self.rx[index].len() as u32,
            Register::DmaControl1 => self.dma_control[0],
            Register::DmaControl2 => self.dma_control[1],
        }
    }

    fn write_csr0(&mut self, value: u32) {
        if value & bits(CSR0::SVDOUTPKTRDY::SET) != 0 {
            self.csr0 &= !bits(CSR0::OUTPKTRDY::SET);
            self.rx[0].clear();
        }
        if value & bits(CSR0::SVDSETUPEND::SET) != 0 {
            self.csr0 &= !bits(CSR0::SETUPEND::SET);
        }
        if value & bits(CSR0::SENTSTALL::SET) == 0 {
            self.csr0 &= !bits(CSR0::SENTSTALL::SET);
        }
        let send_stall = bits(CSR0::SENDSTALL::SET);
        self.csr0 = (self.csr0 & !send_stall) | (value & send_stall);

        let data_end = value & bits(CSR0::DATAEND::SET) != 0;
        if value & bits(CSR0::INPKTRDY::SET) != 0 {
            let data = mem::take(&mut self.tx[0]);
            self.sent.push(Packet {
                endpoint: 0,
                data,
                data_end,
            });
            self.intr_in |= 1;
        } else if data_end {
            self.sent.push(Packet {
                endpoint: 0,
                data: Vec::new(),
                data_end,
            });
        }
    }

    fn write_in_csr(&mut self, value: u32) {
        let index = self.index;
        let config = bits(INCSR::SENDSTALL::SET) | 0xff00;
        let mut csr = (self.in_csr[index] & !config) | (value & config);
        if value & bits(INCSR::SENTSTALL::SET) == 0 {
            csr &= !bits(INCSR::SENTSTALL::SET);
        }
        if value & bits(INCSR::UNDERRUN::SET) == 0 {
            csr &= !bits(INCSR::UNDERRUN::SET);
        }
        if value & bits(INCSR::FF::SET) != 0 {
            self.tx[index].clear();
            self.flushes.push((index, TransferDirection::In));
        }
        if value & bits(INCSR::CDT::SET) != 0 {
            self.toggle_resets.push((index, TransferDirection::In));
        }
        if value & bits(INCSR::INPKTRDY::SET) != 0 {
            let data = mem::take(&mut self.tx[index]);
            self.sent.push(Packet {
                endpoint: index,
                data,
                data_end: false,
            });
            self.intr_in |= 1 << index;
        }
        self.in_csr[index] = csr;
    }

    fn write_out_csr(&mut self, value: u32) {
        let index = self.index;
        let config = bits(OUTCSR::SENDSTALL::SET) | 0xff00;
        let mut csr = (self.out_csr[index] & !config) | (value & config);
        if value & bits(OUTCSR::SENTSTALL::SET) == 0 {
            csr &= !bits(OUTCSR::SENTSTALL::SET);
        }
        if value & bits(OUTCSR::OUTPKTRDY::SET) == 0 || value & bits(OUTCSR::FF::SET) != 0 {
            csr &= !bits(OUTCSR::OUTPKTRDY::SET);
            self.rx[index].clear();
        }
        if value & bits(OUTCSR::FF::SET) != 0 {
            self.flushes.push((index, TransferDirection::Out));
        }
        if value & bits(OUTCSR::CDT::SET) != 0 {
            self.toggle_resets.push((index, TransferDirection::Out));
        }
        self.out_csr[index] = csr;
    }
}

pub(crate) struct SimUdc {
    state: RefCell<State>,
}

impl SimUdc {
    pub(crate) fn new() -> SimUdc {
        SimUdc {
            state: RefCell::new(State::default()),
        }
    }

    pub(crate) fn set_high_speed(&self, high_speed: bool) {
        self.state.borrow_mut().high_speed = high_speed;
    }

    /// The host sends a SETUP packet to endpoint 0.
    pub(crate) fn host_setup(&self, setup: &[u8]) {
        let mut state = self.state.borrow_mut();
        state.rx[0] = setup.iter().copied().collect();
        state.csr0 |= bits(CSR0::OUTPKTRDY::SET);
        state.intr_in |= 1;
    }

    /// The host ends a control transfer early.
    pub(crate) fn host_setup_end(&self) {
        let mut state = self.state.borrow_mut();
        state.csr0 |= bits(CSR0::SETUPEND::SET);
        state.intr_in |= 1;
    }

    /// The host sends a data packet to an OUT endpoint.
    pub(crate) fn host_out(&self, endpoint: usize, data: &[u8]) {
        self.load_rx(endpoint, data);
        let mut state = self.state.borrow_mut();
        state.out_csr[endpoint] |= bits(OUTCSR::OUTPKTRDY::SET);
        state.intr_out |= 1 << endpoint;
    }

    /// A STALL handshake went out on an endpoint.
    pub(crate) fn stall_sent(&self, endpoint: usize, direction: TransferDirection) {
        let mut state = self.state.borrow_mut();
        match (endpoint, direction) {
            (0, _) => {
                state.csr0 |= bits(CSR0::SENTSTALL::SET);
                state.intr_in |= 1;
            }
            (_, TransferDirection::In) => {
                state.in_csr[endpoint] |= bits(INCSR::SENTSTALL::SET);
                state.intr_in |= 1 << endpoint;
            }
            (_, TransferDirection::Out) => {
                state.out_csr[endpoint] |= bits(OUTCSR::SENTSTALL::SET);
                state.intr_out |= 1 << endpoint;
            }
        }
    }

    /// The host collected the packet waiting in an IN FIFO.
    pub(crate) fn raise_in(&self, endpoint: usize) {
        self.state.borrow_mut().intr_in |= 1 << endpoint;
    }

    pub(crate) fn raise_usb(&self, events: u32) {
        self.state.borrow_mut().intr_usb |= events;
    }

    pub(crate) fn raise_dma(&self, channels: u32) {
        self.state.borrow_mut().dma_intr |= channels;
    }

    /// Keep the IN FIFO of an endpoint reported as not empty.
    pub(crate) fn set_in_fifo_busy(&self, endpoint: usize, busy: bool) {
        let mut state = self.state.borrow_mut();
        let not_empty = bits(INCSR::FFNOTEMPT::SET);
        if busy {
            state.in_csr[endpoint] |= not_empty;
        } else {
            state.in_csr[endpoint] &= !not_empty;
        }
    }

    /// Put bytes in an OUT FIFO without raising any status.
    pub(crate) fn load_rx(&self, fifo: usize, data: &[u8]) {
        self.state.borrow_mut().rx[fifo] = data.iter().copied().collect();
    }

    pub(crate) fn rx_pending(&self, fifo: usize) -> usize {
        self.state.borrow().rx[fifo].len()
    }

    pub(crate) fn tx_pending(&self, fifo: usize) -> Vec<u8> {
        self.state.borrow().tx[fifo].clone()
    }

    pub(crate) fn take_sent(&self) -> Vec<Packet> {
        mem::take(&mut self.state.borrow_mut().sent)
    }

    pub(crate) fn flushes(&self) -> Vec<(usize, TransferDirection)> {
        self.state.borrow().flushes.clone()
    }

    pub(crate) fn toggle_resets(&self) -> Vec<(usize, TransferDirection)> {
        self.state.borrow().toggle_resets.clone()
    }

    pub(crate) fn writes(&self) -> Vec<(Register, u32)> {
        self.state.borrow().writes.clone()
    }

    pub(crate) fn fifo_accesses(&self) -> FifoAccesses {
        self.state.borrow().fifo
    }

    /// Register value as seen by the driver, without read side effects.
    pub(crate) fn peek(&self, register: Register) -> u32 {
        self.state.borrow().value(register)
    }

    /// Banked register of a given endpoint, whatever `Index` holds.
    pub(crate) fn peek_banked(&self, endpoint: usize, register: Register) -> u32 {
        let mut state = self.state.borrow_mut();
        let index = mem::replace(&mut state.index, endpoint);
        let value = state.value(register);
        state.index = index;
        value
    }

    pub(crate) fn reset_logs(&self) {
        let mut state = self.state.borrow_mut();
        state.sent.clear();
        state.flushes.clear();
        state.toggle_resets.clear();
        state.writes.clear();
        state.fifo = FifoAccesses::default();
        state.intr_in = 0;
        state.intr_out = 0;
        state.intr_usb = 0;
    }
}

impl UdcRegisterBank for SimUdc {
    fn read(&self, register: Register) -> u32 {
        let mut state = self.state.borrow_mut();
        let value = state.value(register);
        match register {
            Register::IntrIn => state.intr_in = 0,
            Register::IntrOut => state.intr_out = 0,
            Register::IntrUsb => state.intr_usb = 0,
            Register::DmaIntr => state.dma_intr = 0,
            _ => {}
        }
        value
    }

    fn write(&self, register: Register, value: u32) {
        let mut state = self.state.borrow_mut();
        state.writes.push((register, value));
        let index = state.index;
        match register {
            Register::FunctionAddress => state.faddr = value & 0x7f,
            Register::Power => state.power = value & !bits(POWER::HSMODE::SET),
            Register::IntrInEnable => state.intr_in_enable = value,
            Register::IntrOutEnable => state.intr_out_enable = value,
            Register::IntrUsbEnable => state.intr_usb_enable = value,
            Register::Index => state.index = value as usize,
            Register::TestMode => state.test_mode = value,
            Register::InMaxPacket => state.in_maxp[index] = value,
            Register::OutMaxPacket => state.out_maxp[index] = value,
            Register::Csr0 | Register::InCsr if index == 0 => state.write_csr0(value),
            Register::Csr0 => {
                let high = state.in_csr[index] & 0xff00;
                state.write_in_csr(high | (value & 0xff));
            }
            Register::InCsr => state.write_in_csr(value),
            Register::OutCsr => state.write_out_csr(value),
            Register::DmaControl1 => state.dma_control[0] = value,
            Register::DmaControl2 => state.dma_control[1] = value,
            Register::IntrIn
            | Register::IntrOut
            | Register::IntrUsb
            | Register::Frame
            | Register::Count
            | Register::DmaIntr => {}
        }
    }

    fn fifo_read_word(&self, fifo: usize) -> u32 {
        let mut state = self.state.borrow_mut();
        state.fifo.word_reads += 1;
        let mut word = [0u8; 4];
        for byte in word.iter_mut() {
            *byte = state.rx[fifo].pop_front().unwrap_or(0);
        }
        u32::from_le_bytes(word)
    }

    fn fifo_read_byte(&self, fifo: usize) -> u8 {
        let mut state = self.state.borrow_mut();
        state.fifo.byte_reads += 1;
        state.rx[fifo].pop_front().unwrap_or(0)
    }

    fn fifo_write_word(&self, fifo: usize, word: u32) {
        let mut state = self.state.borrow_mut();
        state.fifo.word_writes += 1;
        state.tx[fifo].extend_from_slice(&word.to_le_bytes());
    }

    fn fifo_write_byte(&self, fifo: usize, byte: u8) {
        let mut state = self.state.borrow_mut();
        state.fifo.byte_writes += 1;
        state.tx[fifo].push(byte);
    }
}

pub(crate) struct SimPower {
    enabled: Cell<bool>,
}

impl ClockInterface for SimPower {
    fn is_enabled(&self) -> bool {
        self.enabled.get()
    }

    fn enable(&self) {
        self.enabled.set(true);
    }

    fn disable(&self) {
        self.enabled.set(false);
    }
}

pub(crate) struct SimVbus {
    pub(crate) present: Cell<bool>,
}

impl hil::gpio::Input for SimVbus {
    fn read(&self) -> bool {
        self.present.get()
    }
}

/// A finished transfer as seen by the client.
#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) struct Completion {
    pub(crate) endpoint: usize,
    pub(crate) direction: TransferDirection,
    pub(crate) status: Result<(), ErrorCode>,
    pub(crate) transferred: usize,
    /// The first `transferred` bytes of a returned OUT buffer.
    pub(crate) data: Vec<u8>,
    pub(crate) buffer_len: usize,
}

/// Upstream USB core stand-in that records every callback.
pub(crate) struct MockClient {
    pub(crate) requests: RefCell<Vec<Vec<u8>>>,
    pub(crate) completions: RefCell<Vec<Completion>>,
    pub(crate) resets: Cell<usize>,
    /// Answer every control request with this response on endpoint 0.
    pub(crate) response: Cell<Option<&'static [u8]>>,
    pub(crate) controller: Cell<Option<&'static dyn UsbDeviceController<'static>>>,
    /// Result of the last `send` issued from inside a callback.
    pub(crate) last_send: Cell<Option<Result<(), ErrorCode>>>,
    /// Queue this IN transfer on endpoint 1 when one completes.
    pub(crate) chained: Cell<Option<&'static [u8]>>,
    /// Shut the controller down when a transfer completes.
    pub(crate) shutdown_on_complete: Cell<bool>,
}

impl hil::usb::Client<'static> for MockClient {
    fn ctrl_request(&self, setup: &[u8]) {
        self.requests.borrow_mut().push(setup.to_vec());
        if let (Some(controller), Some(response)) = (self.controller.get(), self.response.get()) {
            self.last_send
                .set(Some(controller.send(0, Some(response), response.len())));
        }
    }

    fn transfer_complete(
        &self,
        endpoint: usize,
        direction: TransferDirection,
        status: Result<(), ErrorCode>,
        transferred: usize,
        buffer: TransferBuffer<'static>,
    ) {
        let buffer_len = buffer.len();
        let data = match buffer {
            TransferBuffer::Out(data) => data[..transferred].to_vec(),
            TransferBuffer::In(_) => Vec::new(),
        };
        self.completions.borrow_mut().push(Completion {
            endpoint,
            direction,
            status,
            transferred,
            data,
            buffer_len,
        });
        if self.shutdown_on_complete.get() {
            if let Some(controller) = self.controller.get() {
                controller.shutdown();
            }
        }
        if let (Some(controller), Some(next)) = (self.controller.get(), self.chained.take()) {
            self.last_send
                .set(Some(controller.send(endpoint, Some(next), next.len())));
        }
    }

    fn bus_reset(&self) {
        self.resets.set(self.resets.get() + 1);
    }
}

pub(crate) type SimDriver = Udc<'static, &'static SimUdc>;

/// A driver wired to a simulated controller and a recording client.
pub(crate) struct Harness {
    pub(crate) sim: &'static SimUdc,
    pub(crate) power: &'static SimPower,
    pub(crate) vbus: &'static SimVbus,
    pub(crate) client: &'static MockClient,
    pub(crate) udc: &'static SimDriver,
}

impl Harness {
    pub(crate) fn new(endpoints: [EndpointDescriptor; N_ENDPOINTS], high_speed: bool) -> Harness {
        let sim: &'static SimUdc = Box::leak(Box::new(SimUdc::new()));
        sim.set_high_speed(high_speed);
        let power: &'static SimPower = Box::leak(Box::new(SimPower {
            enabled: Cell::new(false),
        }));
        let vbus: &'static SimVbus = Box::leak(Box::new(SimVbus {
            present: Cell::new(true),
        }));
        let client: &'static MockClient = Box::leak(Box::new(MockClient {
            requests: RefCell::new(Vec::new()),
            completions: RefCell::new(Vec::new()),
            resets: Cell::new(0),
            response: Cell::new(None),
            controller: Cell::new(None),
            last_send: Cell::new(None),
            chained: Cell::new(None),
            shutdown_on_complete: Cell::new(false),
        }));
        let udc: &'static SimDriver = Box::leak(Box::new(Udc::with_endpoints(
            sim, power, vbus, endpoints,
        )));
        udc.set_client(client);
        client.controller.set(Some(udc));
        Harness {
            sim,
            power,
            vbus,
            client,
            udc,
        }
    }

    /// Default endpoint layout at high speed, initialized, with the logs of
    /// the initialization discarded.
    pub(crate) fn initialized() -> Harness {
        let h = Harness::new(JZ4740_ENDPOINTS, true);
        h.udc.initialize();
        h.sim.reset_logs();
        h.client.resets.set(0);
        h
    }

    pub(crate) fn completions(&self) -> Vec<Completion> {
        self.client.completions.borrow().clone()
    }
}

pub(crate) fn leak_in(data: &[u8]) -> &'static [u8] {
    Box::leak(data.to_vec().into_boxed_slice())
}

pub(crate) fn leak_out(len: usize) -> &'static mut [u8] {
    Box::leak(std::vec![0u8; len].into_boxed_slice())
}
