// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Control endpoint state machine.

use super::endpoint::EP0_PACKET_SIZE;
use super::registers::{Register, UdcRegisterBank, CSR0};
use super::Udc;
use core::cmp;
use kernel::hil::usb::TransferDirection;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Ep0State {
    /// Waiting for a SETUP packet.
    Idle,
    /// Control OUT data stage. Never entered: such requests are rejected
    /// by `receive`.
    Receiving,
    /// Feeding the response to the last request to the host.
    Transmitting,
}

impl<'a, R: UdcRegisterBank> Udc<'a, R> {
    /// Service an endpoint 0 interrupt.
    pub(super) fn control_handler(&self) {
        self.select_endpoint(0);
        let mut csr0 = self.csr0();
        udc_trace!(
            "jz4740 udc: ep0 csr0={:#x} state={:?}",
            csr0.get(),
            self.ep0_state.get()
        );

        if csr0.is_set(CSR0::SENTSTALL) {
            csr0.modify(CSR0::SENTSTALL::CLEAR);
            self.set_csr0(csr0);
            self.ep0_state.set(Ep0State::Idle);
            return;
        }

        // The host ended the transfer before the data stage was over. The
        // hardware has already flushed the FIFO.
        if csr0.is_set(CSR0::SETUPEND) {
            csr0.modify(CSR0::SVDSETUPEND::SET);
            self.set_csr0(csr0);
            self.ep0_state.set(Ep0State::Idle);
            return;
        }

        match self.ep0_state.get() {
            Ep0State::Idle => {
                if csr0.is_set(CSR0::OUTPKTRDY) {
                    let count = cmp::min(
                        self.registers.read(Register::Count) as usize,
                        EP0_PACKET_SIZE,
                    );
                    let mut setup = [0u8; EP0_PACKET_SIZE];
                    self.read_fifo(0, &mut setup[..count]);
                    csr0.modify(CSR0::SVDOUTPKTRDY::SET);
                    self.set_csr0(csr0);

                    if let Some(client) = self.client.get() {
                        client.ctrl_request(&setup[..count]);
                    }
                }
            }
            Ep0State::Transmitting => self.ep0_transmit(),
            Ep0State::Receiving => {}
        }
    }

    /// Load the next packet of the pending endpoint 0 response.
    pub(super) fn ep0_transmit(&self) {
        let ep = match self.endpoint(0, TransferDirection::In) {
            Some(ep) => ep,
            None => return,
        };
        self.select_endpoint(0);
        let mut csr0 = self.csr0();

        if ep.requested_length() == 0 {
            // Zero length data stage: only the handshake.
            csr0.modify(CSR0::SVDOUTPKTRDY::SET + CSR0::DATAEND::SET);
            self.set_csr0(csr0);
            ep.clear();
            self.ep0_state.set(Ep0State::Idle);
            return;
        }

        let chunk = ep.next_chunk();
        self.fill_fifo(ep, chunk);
        ep.advance(chunk);

        if ep.is_done() {
            csr0.modify(CSR0::INPKTRDY::SET + CSR0::DATAEND::SET);
            self.set_csr0(csr0);
            ep.clear();
            self.ep0_state.set(Ep0State::Idle);
        } else {
            csr0.modify(CSR0::INPKTRDY::SET);
            self.set_csr0(csr0);
        }
    }
}
