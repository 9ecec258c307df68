pub mod authorization_request;
pub mod error;
pub mod jws;
pub mod object;
pub mod response;
pub mod util;
pub mod x509;
