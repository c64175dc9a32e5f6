// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Endpoint table.
//!
//! One entry per endpoint number and direction. The descriptor part is fixed
//! when the driver is built; the transfer part (buffer, requested length and
//! progress) is filled in when a transfer is queued and emptied when it
//! completes or is cancelled. A buffer is present exactly while a transfer
//! is in flight.

use core::cell::Cell;
use core::cmp;

use kernel::hil::usb::{TransferBuffer, TransferDirection, TransferType};

/// Number of entries in the endpoint table.
pub const N_ENDPOINTS: usize = 5;

/// Packet size of the control endpoint.
pub const EP0_PACKET_SIZE: usize = 64;

/// Bulk packet size at full speed.
const FULL_SPEED_BULK_PACKET_SIZE: usize = 64;

/// Bulk packet size at high speed.
const HIGH_SPEED_BULK_PACKET_SIZE: usize = 512;

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct EndpointDescriptor {
    pub number: usize,
    pub direction: TransferDirection,
    pub transfer_type: TransferType,
    /// Bytes per packet. Bulk endpoints re-derive this from the link speed
    /// at every bus reset.
    pub packet_size: usize,
    /// Endpoint is serviced by the DMA engine and never through its FIFO
    /// port.
    pub uses_dma: bool,
}

impl EndpointDescriptor {
    pub const fn new(
        number: usize,
        direction: TransferDirection,
        transfer_type: TransferType,
        packet_size: usize,
    ) -> EndpointDescriptor {
        EndpointDescriptor {
            number,
            direction,
            transfer_type,
            packet_size,
            uses_dma: false,
        }
    }

    pub const fn with_dma(self) -> EndpointDescriptor {
        EndpointDescriptor {
            uses_dma: true,
            ..self
        }
    }
}

/// Endpoints of the JZ4740: the control pipe, a bulk pair on endpoint 1
/// and an interrupt IN pipe on endpoint 2.
pub const JZ4740_ENDPOINTS: [EndpointDescriptor; N_ENDPOINTS] = [
    EndpointDescriptor::new(
        0,
        TransferDirection::Out,
        TransferType::Control,
        EP0_PACKET_SIZE,
    ),
    EndpointDescriptor::new(
        0,
        TransferDirection::In,
        TransferType::Control,
        EP0_PACKET_SIZE,
    ),
    EndpointDescriptor::new(
        1,
        TransferDirection::Out,
        TransferType::Bulk,
        HIGH_SPEED_BULK_PACKET_SIZE,
    ),
    EndpointDescriptor::new(
        1,
        TransferDirection::In,
        TransferType::Bulk,
        HIGH_SPEED_BULK_PACKET_SIZE,
    ),
    EndpointDescriptor::new(2, TransferDirection::In, TransferType::Interrupt, 64),
];

pub struct Endpoint<'a> {
    descriptor: EndpointDescriptor,
    fifo_capacity: Cell<usize>,
    buffer: Cell<Option<TransferBuffer<'a>>>,
    requested_length: Cell<usize>,
    progress: Cell<usize>,
    claimed: Cell<bool>,
}

impl<'a> Endpoint<'a> {
    pub const fn new(descriptor: EndpointDescriptor) -> Endpoint<'a> {
        Endpoint {
            descriptor,
            fifo_capacity: Cell::new(descriptor.packet_size),
            buffer: Cell::new(None),
            requested_length: Cell::new(0),
            progress: Cell::new(0),
            claimed: Cell::new(false),
        }
    }

    pub fn number(&self) -> usize {
        self.descriptor.number
    }

    pub fn direction(&self) -> TransferDirection {
        self.descriptor.direction
    }

    pub fn transfer_type(&self) -> TransferType {
        self.descriptor.transfer_type
    }

    pub fn is_control(&self) -> bool {
        self.descriptor.transfer_type == TransferType::Control
    }

    pub fn uses_dma(&self) -> bool {
        self.descriptor.uses_dma
    }

    /// FIFO port of the endpoint. On this controller each endpoint number
    /// has its own port.
    pub fn fifo(&self) -> usize {
        self.descriptor.number
    }

    pub fn fifo_capacity(&self) -> usize {
        self.fifo_capacity.get()
    }

    /// Bit of this endpoint in the INTRIN/INTROUT registers and their
    /// enables.
    pub fn interrupt_bit(&self) -> u32 {
        1 << self.descriptor.number
    }

    /// Re-derive the packet size for the negotiated link speed.
    pub fn update_fifo_capacity(&self, high_speed: bool) {
        let capacity = match self.descriptor.transfer_type {
            TransferType::Bulk if high_speed => HIGH_SPEED_BULK_PACKET_SIZE,
            TransferType::Bulk => FULL_SPEED_BULK_PACKET_SIZE,
            _ => self.descriptor.packet_size,
        };
        self.fifo_capacity.set(capacity);
    }

    pub fn requested_length(&self) -> usize {
        self.requested_length.get()
    }

    pub fn progress(&self) -> usize {
        self.progress.get()
    }

    pub fn remaining(&self) -> usize {
        self.requested_length.get() - self.progress.get()
    }

    /// Size of the next packet of the current transfer.
    pub fn next_chunk(&self) -> usize {
        cmp::min(self.remaining(), self.fifo_capacity())
    }

    pub fn in_flight(&self) -> bool {
        self.map_buffer(|_| ()).is_some()
    }

    /// Record a new transfer. The caller checks that `length` fits in the
    /// buffer.
    pub fn start(&self, buffer: TransferBuffer<'a>, length: usize) {
        self.buffer.set(Some(buffer));
        self.requested_length.set(length);
        self.progress.set(0);
    }

    pub fn advance(&self, bytes: usize) {
        let progress = cmp::min(self.progress.get() + bytes, self.requested_length.get());
        self.progress.set(progress);
    }

    pub fn is_done(&self) -> bool {
        self.progress.get() >= self.requested_length.get()
    }

    /// Run `f` on the transfer buffer, if a transfer is in flight.
    pub fn map_buffer<F, R>(&self, f: F) -> Option<R>
    where
        F: FnOnce(&mut TransferBuffer<'a>) -> R,
    {
        let mut buffer = self.buffer.take()?;
        let result = f(&mut buffer);
        self.buffer.set(Some(buffer));
        Some(result)
    }

    /// End the current transfer, returning its buffer and the number of
    /// bytes moved.
    pub fn finish(&self) -> Option<(TransferBuffer<'a>, usize)> {
        let buffer = self.buffer.take();
        let transferred = self.progress.get();
        self.requested_length.set(0);
        self.progress.set(0);
        buffer.map(|buffer| (buffer, transferred))
    }

    /// Drop the current transfer, if any.
    pub fn clear(&self) {
        let _ = self.finish();
    }

    pub fn is_claimed(&self) -> bool {
        self.claimed.get()
    }

    pub fn set_claimed(&self, claimed: bool) {
        self.claimed.set(claimed);
    }
}
