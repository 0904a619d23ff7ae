//! # httplink - serial HTTP bridge engine
//!
//! Protocol engine for driving an HTTP-capable companion microcontroller
//! over a UART link. The companion does the networking; this crate does the
//! wire protocol: newline-delimited `[COMMAND]payload` frames out, marker
//! lines and streamed response bodies back in. Designed for `no_std`
//! environments with no heap allocation.
//!
//! ## Architecture
//!
//! - **Transport** ([`transport`]): trait seams for the serial port, the
//!   watchdog, delays, and wake signals, plus a lock-free single-producer
//!   ring for moving bytes out of interrupt context.
//! - **Link engine** ([`link`]): [`link::Connection`] owns the port and runs
//!   the whole protocol — line reassembly, marker classification, the
//!   request state machine, binary capture to a storage sink, and watchdog
//!   recovery.
//! - **Commands** ([`command`]): typed builders for the full command set,
//!   from `[PING]` to `[POST/BYTES]`.
//! - **Blocking helper** ([`blocking`]): one-call send / poll / parse for
//!   synchronous callers.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use httplink::link::{Config, Connection};
//! use httplink::transport::RxQueue;
//! # use httplink::transport::{SerialControl, SerialPort, Watchdog};
//! # use httplink::storage::StorageSink;
//! # use httplink::error::AcquireError;
//! # struct Uart;
//! # impl SerialPort for Uart {
//! #     type Error = ();
//! #     fn write(&mut self, _buf: &[u8]) -> Result<(), ()> { Ok(()) }
//! #     fn flush(&mut self) -> Result<(), ()> { Ok(()) }
//! # }
//! # struct UartControl;
//! # impl SerialControl for UartControl {
//! #     type Port = Uart;
//! #     fn acquire(&mut self, _baud: u32) -> Result<Uart, AcquireError> { Ok(Uart) }
//! # }
//! # struct Timer;
//! # impl Watchdog for Timer {
//! #     fn start(&mut self, _ms: u32) {}
//! #     fn restart(&mut self, _ms: u32) {}
//! #     fn stop(&mut self) {}
//! #     fn is_running(&self) -> bool { false }
//! #     fn has_expired(&self) -> bool { false }
//! # }
//! # struct Sink;
//! # impl StorageSink for Sink {
//! #     type Error = ();
//! #     fn append(&mut self, _path: &str, _data: &[u8], _truncate: bool) -> Result<(), ()> {
//! #         Ok(())
//! #     }
//! # }
//!
//! static mut RX: RxQueue = RxQueue::new();
//!
//! // Safety: split is called once; the ISR half goes to the receive
//! // interrupt, the consumer half stays with the connection.
//! let (_isr, rx) = unsafe { (*(&raw mut RX)).split() };
//!
//! let mut control = UartControl;
//! let mut conn = Connection::open(&mut control, Config::default(), rx, Sink, Timer).unwrap();
//!
//! conn.ping().unwrap();
//! // ... pump bytes, wait for [PONG], then issue requests:
//! conn.get("https://example.com/api/status").unwrap();
//! ```
//!
//! ## Optional Features
//!
//! - `std`: Enable standard library support (default: disabled)
//! - `defmt`: Enable defmt logging support for embedded debugging

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(missing_docs)]
#![warn(missing_debug_implementations)]

/// Error taxonomy for the transport, send, and request layers.
pub mod error;

/// Transport trait seams and the interrupt-to-task byte ring.
pub mod transport;

/// Storage seam for persisting response data.
pub mod storage;

/// Wire-format constants, marker classification, and link states.
pub mod protocol;

/// The connection engine: lifecycle, reassembly, and the state machine.
pub mod link;

/// Typed command builders.
pub mod command;

/// Synchronous request helper for callers without an event loop.
pub mod blocking;
