pub mod bridge;
pub mod executor;
#[cfg(test)]
pub(crate) mod fake;
pub mod locator;
pub mod parse;
pub mod paths;
pub mod runner;
