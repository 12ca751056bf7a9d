// src/models/mod.rs
pub mod api;
