//! Tag colors and bulk tag mutations for the sner front end.

pub mod config;
pub mod mutation;
pub mod studio;
pub mod tags;
#[doc(hidden)]
pub mod test_support;
