// src/data_input/mod.rs

pub mod trial_data;
pub mod trial_parser;

// src/data_input/mod.rs
