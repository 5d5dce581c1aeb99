pub mod http;
pub mod start;
