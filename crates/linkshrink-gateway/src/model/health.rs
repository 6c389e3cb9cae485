use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct PingResponse {
    pub status: &'static str,
    pub backend: &'static str,
}
