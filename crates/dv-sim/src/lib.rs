//! Digital-Voice Gateway Simulation Library
//!
//! This crate provides stand-ins for everything the gateway talks to, so
//! routing and adapters can be exercised without sockets or hardware:
//!
//! - **MemoryLink**: an in-process datagram pair implementing `DatagramLink`
//! - **VirtualTranscoder**: a deterministic transcoder that resizes blocks
//! - **streams**: builders for complete native transmissions per mode
//!
//! # Example
//!
//! ```rust
//! use dv_gateway::DatagramLink;
//! use dv_sim::MemoryLink;
//!
//! let (mut gateway, remote) = MemoryLink::pair(
//!     "127.0.0.1:20011".parse().unwrap(),
//!     "127.0.0.1:20010".parse().unwrap(),
//! );
//! remote.push(b"DSRP\x0A");
//!
//! let mut buf = [0u8; 64];
//! let (len, from) = gateway.try_recv(&mut buf).unwrap().unwrap();
//! assert_eq!(&buf[..len], b"DSRP\x0A");
//! assert_eq!(from, remote.local_addr());
//! ```

pub mod link;
pub mod streams;
pub mod transcoder;

pub use link::MemoryLink;
pub use transcoder::{ConversionLog, VirtualTranscoder};
