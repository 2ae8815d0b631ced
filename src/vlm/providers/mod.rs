pub mod dummy;
pub mod openai_compatible;
pub mod remote;
