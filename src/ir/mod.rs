pub mod catalog; // instruction kind metadata
pub mod instr; // instruction records, operand groups, builders
pub mod types; // interned value types
