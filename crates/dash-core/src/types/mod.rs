//! Core data types: enums, exchange-neutral records, stored rows and the
//! view shapes returned to the dashboard.

pub mod account;
pub mod enums;
pub mod symbol;
pub mod trading;
pub mod views;

pub use account::*;
pub use enums::*;
pub use symbol::*;
pub use trading::*;
pub use views::*;
