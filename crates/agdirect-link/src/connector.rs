use tracing::debug;

use crate::config::LinkConfig;
use crate::connection::Connection;
use crate::error::Result;

/// Connect to an AGDirect server with default settings.
pub fn connect(host: &str, port: u16) -> Result<Connection> {
    connect_with_config(&LinkConfig::new(host, port))
}

/// Connect with explicit configuration.
///
/// Polls the address up to `poll_count` times, then waits for the server's
/// greeting. The returned connection is ready for calls.
pub fn connect_with_config(config: &LinkConfig) -> Result<Connection> {
    debug!(address = %config.address(), poll_count = config.poll_count, "connecting");
    let stream = agdirect_transport::connect(&config.host, config.port, &config.connect_config())?;
    Connection::handshake(stream, config.clone())
}

#[cfg(test)]
mod tests {
    use std::thread;

    use agdirect_transport::{TcpEndpoint, TransportError};

    use super::*;
    use crate::error::LinkError;
    use crate::handshake::{send_greeting, Greeting};

    fn quick(port: u16) -> LinkConfig {
        LinkConfig {
            poll_count: 1,
            poll_interval_ms: 10,
            timeout_ms: 200,
            ..LinkConfig::new("127.0.0.1", port)
        }
    }

    fn greet_once(greeting: Greeting) -> Result<LinkConfig> {
        let endpoint = TcpEndpoint::bind("127.0.0.1:0").expect("endpoint should bind");
        let config = quick(endpoint.port());
        let server = thread::spawn(move || {
            let mut stream = endpoint.accept().expect("endpoint should accept");
            send_greeting(&mut stream, greeting).expect("greeting should send");
            // hold the socket until the client has read the byte
            thread::sleep(std::time::Duration::from_millis(100));
        });
        let result = connect_with_config(&config).map(|conn| conn.config().clone());
        server.join().expect("server thread should finish");
        result
    }

    #[test]
    fn accepted_greeting_yields_connection() {
        let config = greet_once(Greeting::Accept).expect("client should connect");
        assert_eq!(config.host, "127.0.0.1");
    }

    #[test]
    fn full_server_is_reported() {
        assert!(matches!(
            greet_once(Greeting::TooManyConnections),
            Err(LinkError::TooManyConnections)
        ));
    }

    #[test]
    fn rejection_is_reported() {
        assert!(matches!(greet_once(Greeting::Reject), Err(LinkError::Rejected)));
    }

    #[test]
    fn silent_server_times_out() {
        let endpoint = TcpEndpoint::bind("127.0.0.1:0").expect("endpoint should bind");
        let config = LinkConfig {
            timeout_ms: 20,
            ..quick(endpoint.port())
        };
        let server = thread::spawn(move || {
            let _stream = endpoint.accept().expect("endpoint should accept");
            thread::sleep(std::time::Duration::from_millis(400));
        });
        let err = connect_with_config(&config).unwrap_err();
        assert!(matches!(err, LinkError::GreetingTimeout(_)));
        server.join().expect("server thread should finish");
    }

    #[test]
    fn nothing_listening_is_a_transport_error() {
        let port = {
            let endpoint = TcpEndpoint::bind("127.0.0.1:0").expect("endpoint should bind");
            endpoint.port()
        };
        let err = connect_with_config(&quick(port)).unwrap_err();
        assert!(matches!(
            err,
            LinkError::Transport(TransportError::Connect { attempts: 1, .. })
        ));
    }
}
