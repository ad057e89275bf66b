pub mod decision;
pub mod forecast;
pub mod reading;

pub use decision::*;
pub use forecast::*;
pub use reading::*;
