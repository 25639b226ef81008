pub mod config;
pub mod memory;
pub mod trace;
mod utils;

pub use memory::{translate, Fault, PageTable, Tlb, Translator};
