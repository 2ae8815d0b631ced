pub mod screenshot;
pub mod still;
pub mod traits;
pub mod types;
