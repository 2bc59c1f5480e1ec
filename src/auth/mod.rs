pub mod endpoint;
pub mod signer;

pub use endpoint::ConnectionBuilder;
pub use signer::CredentialSigner;
