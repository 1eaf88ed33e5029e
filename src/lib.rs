//! Textual assembly codec for a quantum gate instruction set.
//!
//! ```
//! use qgate::asm::Codec;
//!
//! let codec = Codec::default();
//! let instr = codec.parse_instruction("q.cx %a[0, %n, 1], %b : register<4>, qubit").unwrap();
//! assert_eq!(instr.operands().len(), 3);
//! assert_eq!(
//!     codec.print_instruction(&instr).unwrap(),
//!     "q.cx %a[0, %n, 1], %b : register<4>, qubit"
//! );
//! ```

pub mod asm; // lexer, parsers and printers
pub mod config; // json config for the binary
pub mod diagnostics; // positions, sinks, rendering
pub mod error; // error enums
pub mod ir; // in-memory model
pub mod resolve; // value reference resolvers


pub use asm::{Codec, ParseOptions};
pub use error::Error;
