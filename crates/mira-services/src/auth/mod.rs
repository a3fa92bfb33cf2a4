//! Magic-link login and role administration.

mod email;
mod login;

pub use email::{magic_link_body, Mailer, SmtpMailer, MAGIC_LINK_SUBJECT};
pub use login::{AuthService, IssuedLoginToken};
