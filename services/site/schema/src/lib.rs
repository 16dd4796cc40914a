//! sea-orm entities for the site database.

pub mod passkeys;
pub mod users;
