// src/lib.rs
pub mod cnpj;
pub mod config;
pub mod error;
pub mod fetch;
pub mod model;
pub mod operators;
pub mod pipeline;
pub mod process;
pub mod sink;
