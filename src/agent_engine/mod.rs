pub mod engine;
pub mod history;
pub mod loop_control;
pub mod parser;
pub mod persona;
pub mod state;
