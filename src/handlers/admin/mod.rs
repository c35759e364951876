pub mod accounts;
pub mod orders;
