pub mod encode;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod sse_parser;
pub mod types;

#[cfg(test)]
pub(crate) mod test_server;
