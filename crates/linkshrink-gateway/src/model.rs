mod health;
mod url;

pub use health::PingResponse;
pub use url::{BatchRequestItem, BatchResponseItem, ShortenRequest, ShortenResponse};
