#![allow(dead_code)]

pub mod strategies;
pub mod test_adapter;

pub use strategies::*;
pub use test_adapter::*;
