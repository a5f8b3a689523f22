pub mod config;
pub mod policy;
pub mod request;
pub mod status;
pub mod validator;

pub use config::*;
pub use policy::*;
pub use request::*;
pub use status::*;
pub use validator::*;
