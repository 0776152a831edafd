use std::net::TcpListener;

/// Base URL of a local port nothing listens on.
pub fn unreachable_intermediary_url() -> std::io::Result<String> {
    let port = TcpListener::bind(("127.0.0.1", 0))?.local_addr()?.port();
    Ok(format!("http://127.0.0.1:{port}"))
}
