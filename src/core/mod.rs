//! # Core Protocol Components
//!
//! Low-level frame handling, codecs, and the message value type.
//!
//! ## Components
//! - **Message**: protocol id, declared length and payload
//! - **Packet**: header encode/decode and size enforcement
//! - **Codec**: Tokio codec for framing over byte streams
//!
//! ## Wire Format
//! ```text
//! [Length(4, LE)] [Protocol(4, LE)] [Payload(Length)]
//! ```
//!
//! ## Limits
//! - Declared length is validated before the payload is allocated
//! - A maximum of `0` means unlimited

pub mod codec;
pub mod message;
pub mod packet;
