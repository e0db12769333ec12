//! Protocol implementations.
//!
//! - `greeting`: prefixes every inbound chunk with `Hello ` and sends it back
//!   on the same connection.

pub mod greeting;
