pub mod parse;
pub mod service;
