pub mod signer;

pub use signer::SigV4Signer;
