mod account;
mod audit;
mod order;
mod product;

pub use account::*;
pub use audit::*;
pub use order::*;
pub use product::*;
