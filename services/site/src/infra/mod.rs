pub mod challenge_store;
pub mod connections;
pub mod db;
pub mod events;
pub mod webauthn;
