// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Bulk and interrupt endpoint handlers.

use super::endpoint::Endpoint;
use super::registers::{Register, UdcRegisterBank, INCSR, OUTCSR};
use super::Udc;

impl<'a, R: UdcRegisterBank> Udc<'a, R> {
    /// Load the next packet of the endpoint's IN transfer.
    ///
    /// Runs from the interrupt raised when the previous packet left the FIFO
    /// and once when the transfer is queued.
    pub(super) fn in_handler(&self, ep: &Endpoint<'a>) {
        self.select_endpoint(ep.number());
        let mut csr = self.in_csr();
        udc_trace!("jz4740 udc: ep{} in csr={:#x}", ep.number(), csr.get());

        if !ep.in_flight() || ep.uses_dma() {
            return;
        }

        if csr.is_set(INCSR::SENTSTALL) {
            csr.modify(INCSR::SENTSTALL::CLEAR);
            self.set_in_csr(csr);
            return;
        }

        // The previous packet has not been collected by the host yet.
        if csr.is_set(INCSR::FFNOTEMPT) {
            udc_trace!("jz4740 udc: ep{} fifo not empty", ep.number());
            return;
        }

        let chunk = ep.next_chunk();
        self.fill_fifo(ep, chunk);
        csr.modify(INCSR::INPKTRDY::SET);
        self.set_in_csr(csr);
        ep.advance(chunk);

        if ep.is_done() {
            self.complete_transfer(ep);
        }
    }

    /// Unload a received packet into the endpoint's OUT transfer.
    pub(super) fn out_handler(&self, ep: &Endpoint<'a>) {
        self.select_endpoint(ep.number());
        let mut csr = self.out_csr();
        udc_trace!("jz4740 udc: ep{} out csr={:#x}", ep.number(), csr.get());

        if !ep.in_flight() || ep.uses_dma() {
            return;
        }

        if csr.is_set(OUTCSR::SENTSTALL) {
            csr.modify(OUTCSR::SENTSTALL::CLEAR);
            self.set_out_csr(csr);
            return;
        }

        // Nothing to unload; a zero length packet still sets OUTPKTRDY.
        if !csr.is_set(OUTCSR::OUTPKTRDY) {
            return;
        }

        let size = self.registers.read(Register::Count) as usize;
        let stored = self.drain_fifo(ep, size);
        ep.advance(stored);

        csr.modify(OUTCSR::OUTPKTRDY::CLEAR);
        self.set_out_csr(csr);

        if size < ep.fifo_capacity() || ep.is_done() {
            self.complete_transfer(ep);
        }
    }
}
