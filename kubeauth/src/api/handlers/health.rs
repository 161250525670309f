/// Liveness check. Only proves the process is serving HTTP; the identity backend is not consulted.
pub async fn healthcheck() -> &'static str {
    "ok"
}
