//! Domain models for the pharmacy indent system.

mod item;
mod request;
mod row;

pub use item::*;
pub use request::*;
pub use row::*;
