// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! FIFO transfer engine.
//!
//! Payload moves through the 32-bit port one word at a time; the tail that
//! does not fill a word goes through byte accesses to the same port.

use super::endpoint::Endpoint;
use super::registers::{bits, Register, UdcRegisterBank, INCSR, OUTCSR};
use super::Udc;
use core::cmp;
use kernel::hil::usb::{TransferBuffer, TransferDirection};

impl<'a, R: UdcRegisterBank> Udc<'a, R> {
    pub(super) fn read_fifo(&self, fifo: usize, dest: &mut [u8]) {
        udc_trace!("jz4740 udc: read fifo{} {} bytes", fifo, dest.len());
        let mut words = dest.chunks_exact_mut(4);
        for word in &mut words {
            word.copy_from_slice(&self.registers.fifo_read_word(fifo).to_le_bytes());
        }
        for byte in words.into_remainder() {
            *byte = self.registers.fifo_read_byte(fifo);
        }
    }

    pub(super) fn write_fifo(&self, fifo: usize, src: &[u8]) {
        udc_trace!("jz4740 udc: write fifo{} {} bytes", fifo, src.len());
        let words = src.chunks_exact(4);
        let tail = words.remainder();
        for word in words {
            self.registers
                .fifo_write_word(fifo, u32::from_le_bytes([word[0], word[1], word[2], word[3]]));
        }
        for &byte in tail {
            self.registers.fifo_write_byte(fifo, byte);
        }
    }

    /// Pop and drop `count` bytes.
    pub(super) fn discard_fifo(&self, fifo: usize, count: usize) {
        for _ in 0..count / 4 {
            self.registers.fifo_read_word(fifo);
        }
        for _ in 0..count % 4 {
            self.registers.fifo_read_byte(fifo);
        }
    }

    /// Push the next `size` bytes of the endpoint's IN transfer.
    pub(super) fn fill_fifo(&self, ep: &Endpoint<'a>, size: usize) {
        let start = ep.progress();
        ep.map_buffer(|buffer| {
            if let TransferBuffer::In(data) = buffer {
                self.write_fifo(ep.fifo(), &data[start..start + size]);
            }
        });
    }

    /// Pop a `size` byte packet into the endpoint's OUT transfer.
    ///
    /// Returns how many bytes were stored. Bytes past the requested length
    /// of the transfer are read out and dropped.
    pub(super) fn drain_fifo(&self, ep: &Endpoint<'a>, size: usize) -> usize {
        let start = ep.progress();
        let stored = cmp::min(size, ep.remaining());
        let stored = ep
            .map_buffer(|buffer| match buffer {
                TransferBuffer::Out(data) => {
                    self.read_fifo(ep.fifo(), &mut data[start..start + stored]);
                    stored
                }
                TransferBuffer::In(_) => 0,
            })
            .unwrap_or(0);
        if size > stored {
            udc_trace!(
                "jz4740 udc: ep{} dropping {} bytes",
                ep.number(),
                size - stored
            );
            self.discard_fifo(ep.fifo(), size - stored);
        }
        stored
    }

    /// Drop the packet in progress. The endpoint must be selected. Endpoint
    /// 0 has no flush control.
    pub(super) fn flush_fifo(&self, ep: &Endpoint<'a>) {
        if ep.is_control() {
            return;
        }
        match ep.direction() {
            TransferDirection::In => self
                .registers
                .set_bits(Register::InCsr, bits(INCSR::FF::SET)),
            TransferDirection::Out => self
                .registers
                .set_bits(Register::OutCsr, bits(OUTCSR::FF::SET)),
        }
    }
}
