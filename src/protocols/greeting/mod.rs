//! Greeting protocol implementation.
//!
//! There is no framing: whatever a single read returns is one unit, and the
//! reply for that unit is the literal prefix followed by the unit unchanged.
//!
//! ```text
//! Request:  world\n
//! Response: Hello world\n
//! ```
//!
//! A fragmented request is answered fragment by fragment:
//!
//! ```text
//! Request:  wor          ld\n
//! Response: Hello wor    Hello ld\n
//! ```

pub mod reply;

pub use reply::reply;
