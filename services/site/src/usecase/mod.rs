pub mod login;
pub mod registration;
pub mod session;
pub mod stream;
