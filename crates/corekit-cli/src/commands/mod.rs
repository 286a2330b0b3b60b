pub mod checks;
pub mod config;
pub mod describe;
pub mod validate;
