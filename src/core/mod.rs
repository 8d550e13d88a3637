pub mod adapter;
pub mod capability;
pub mod demo;
pub mod error;
pub mod formatter;
pub mod parameters;
pub mod predict;
pub mod prediction;
pub mod registry;
pub mod settings;
pub mod signature;
pub mod trace;
