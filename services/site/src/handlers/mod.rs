pub mod status;
pub mod stream;
pub mod webauthn;
