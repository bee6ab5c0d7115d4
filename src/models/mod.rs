pub mod account;
pub mod price_point;
pub mod product;

// Re-exports for convenience
pub use account::*;
pub use price_point::*;
pub use product::*;
