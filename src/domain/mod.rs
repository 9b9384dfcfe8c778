pub mod price;
pub mod result;
pub mod session;
pub mod tariff;
pub mod types;
pub mod vehicle;

pub use price::*;
pub use result::*;
pub use session::*;
pub use tariff::*;
pub use types::*;
pub use vehicle::*;
