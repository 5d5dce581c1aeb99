pub mod format;
pub mod request;
pub mod response;
pub mod server;

pub use self::format::ResponseFormat;
pub use self::request::{HyperRequest, Request};
pub use self::response::{ContentType, HttpResponse, HyperResponse};
pub use self::server::HttpServer;
