pub mod dispatcher;
pub mod input;
pub mod keys;
pub mod speech;

#[cfg(test)]
pub(crate) mod mock;
