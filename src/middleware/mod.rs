//! Request screening and response header middleware, layered onto the router
//! in [`crate::routes::router`].

pub mod security_headers;
pub mod validation;
