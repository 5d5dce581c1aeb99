pub mod error;
pub mod ext_serde;
pub mod file;

pub type CertResult<T> = Result<T, error::Error>;
