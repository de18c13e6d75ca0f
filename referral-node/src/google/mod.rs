//! Google contacts access: stored OAuth credentials, the consent flow, and
//! the People API provider.

pub mod credentials;
pub mod oauth;
pub mod people;

pub use credentials::{AuthorizedUser, CredentialError, CredentialStore};
pub use oauth::{ClientSecrets, OAuthFlow};
pub use people::PeopleApiProvider;
