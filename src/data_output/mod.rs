// src/data_output/mod.rs

pub mod export;

// src/data_output/mod.rs
