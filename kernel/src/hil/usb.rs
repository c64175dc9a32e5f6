// Licensed under the Apache License, Version 2.0 or the MIT License.
// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright Tock Contributors 2022.

//! Interface to USB device controller hardware.
//!
//! A device controller moves packets between endpoint FIFOs and memory.
//! It does not parse control requests: every SETUP packet is handed to the
//! [`Client`], which answers through [`UsbDeviceController::send`] on
//! endpoint 0.

use crate::ErrorCode;

/// Endpoint transfer types supported by the device controllers.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransferType {
    Control,
    Bulk,
    Interrupt,
}

/// Direction of a transfer, seen from the host.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TransferDirection {
    /// Device to host.
    In,
    /// Host to device.
    Out,
}

/// Negotiated link speed.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum DeviceSpeed {
    Full,
    High,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum UsbDetect {
    Inserted,
    Extracted,
}

/// USB 2.0 electrical compliance test modes (USB 2.0 section 7.1.20).
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TestMode {
    Disabled,
    J,
    K,
    Se0Nak,
    Packet,
}

/// Buffer of a transfer, handed back to the client once the transfer ends.
#[derive(Debug)]
pub enum TransferBuffer<'a> {
    In(&'a [u8]),
    Out(&'a mut [u8]),
}

impl TransferBuffer<'_> {
    pub fn direction(&self) -> TransferDirection {
        match self {
            TransferBuffer::In(_) => TransferDirection::In,
            TransferBuffer::Out(_) => TransferDirection::Out,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            TransferBuffer::In(buf) => buf.len(),
            TransferBuffer::Out(buf) => buf.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// USB device controller client interface.
///
/// This is the upstream USB core: it decodes control requests and owns the
/// buffers of data transfers.
pub trait Client<'a> {
    /// Called once per SETUP packet with the raw bytes read from the control
    /// endpoint FIFO (normally the 8 byte setup record).
    fn ctrl_request(&self, setup: &[u8]);

    /// Called once when a data endpoint transfer finishes.
    ///
    /// `transferred` is the number of bytes moved, which for an OUT transfer
    /// ended by a short packet may be less than the requested length.
    fn transfer_complete(
        &self,
        endpoint: usize,
        direction: TransferDirection,
        status: Result<(), ErrorCode>,
        transferred: usize,
        buffer: TransferBuffer<'a>,
    );

    /// Called after the controller has handled a reset signalled by the host.
    fn bus_reset(&self);
}

/// USB device controller interface.
pub trait UsbDeviceController<'a> {
    fn set_client(&self, client: &'a dyn Client<'a>);

    /// Power up the controller, reset every endpoint and attach to the bus.
    fn initialize(&self);

    /// Detach from the bus and power the controller down.
    fn shutdown(&self);

    /// Queue an IN transfer of `length` bytes of `buffer`.
    ///
    /// On endpoint 0 this is the response to the last control request. A
    /// `None` buffer with zero length on endpoint 0 acknowledges a request
    /// that has no data stage and touches no hardware.
    fn send(
        &self,
        endpoint: usize,
        buffer: Option<&'a [u8]>,
        length: usize,
    ) -> Result<(), ErrorCode>;

    /// Same as `send`. Controllers that can only send synchronously may
    /// override this to reject the request.
    fn send_nonblocking(
        &self,
        endpoint: usize,
        buffer: Option<&'a [u8]>,
        length: usize,
    ) -> Result<(), ErrorCode> {
        self.send(endpoint, buffer, length)
    }

    /// Queue an OUT transfer of up to `length` bytes into `buffer`.
    ///
    /// The buffer is returned through `Client::transfer_complete`, or with
    /// the error if the transfer is not accepted.
    fn receive(
        &self,
        endpoint: usize,
        buffer: Option<&'a mut [u8]>,
        length: usize,
    ) -> Result<(), (ErrorCode, Option<&'a mut [u8]>)>;

    /// Abort every outstanding transfer without notifying the client.
    fn cancel_all_transfers(&self);

    fn stall(
        &self,
        endpoint: usize,
        stall: bool,
        direction: TransferDirection,
    ) -> Result<(), ErrorCode>;

    fn is_stalled(&self, endpoint: usize, direction: TransferDirection)
        -> Result<bool, ErrorCode>;

    fn port_speed(&self) -> DeviceSpeed;

    /// Whether a host is supplying VBUS.
    fn connected(&self) -> bool;

    fn detect(&self) -> UsbDetect {
        if self.connected() {
            UsbDetect::Inserted
        } else {
            UsbDetect::Extracted
        }
    }

    fn set_address(&self, address: u8);

    fn set_test_mode(&self, mode: TestMode);

    /// Claim a free data endpoint and return its number.
    fn request_endpoint(
        &self,
        transfer_type: TransferType,
        direction: TransferDirection,
    ) -> Result<usize, ErrorCode>;

    fn release_endpoint(&self, endpoint: usize, direction: TransferDirection);
}
