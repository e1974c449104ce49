//! Non-blocking status/control channel.
//!
//! # Protocol
//!
//! Plain HTTP/1.0, one request per connection, at most one connection per
//! control tick:
//!
//! | Path | Response |
//! |------|----------|
//! | `/hri_toggle` | `204 No Content`; flips the mode, stops the wheels when entering PAUSE |
//! | `/status` | `200 OK` JSON `{"distance_cm": "<d.d>", "hri_mode": "<WORK|PAUSE>"}` |
//! | anything else | `200 OK` dashboard page polling `/status` at 1 Hz |
//!
//! # Blocking bounds
//!
//! `accept` never blocks: an empty backlog returns immediately. Once a
//! connection is accepted the request read is bounded by the configured read
//! timeout and buffer size.
//!
//! # Failure handling
//!
//! The connection is wrapped in a [`ConnectionGuard`] and closed when the
//! guard drops, on every path. Socket failures, including a failure to set
//! up an accepted socket, and malformed requests are logged and end only
//! that connection. Actuator failures and `accept`
//! errors other than "would block" are returned to the control loop.

use crate::core::types::OperatingMode;
use crate::drivers::MotionActuator;
use crate::error::{Error, Result};
use crate::state::RobotState;
use serde::Serialize;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpListener, TcpStream, ToSocketAddrs};
use std::ops::{Deref, DerefMut};
use std::time::Duration;

/// Static dashboard page
pub const DASHBOARD_HTML: &str = include_str!("dashboard.html");

const NO_CONTENT: &str = "HTTP/1.0 204 No Content\r\n\r\n";
const JSON_HEADER: &str = "HTTP/1.0 200 OK\r\nContent-Type: application/json\r\n\r\n";
const HTML_HEADER: &str = "HTTP/1.0 200 OK\r\nContent-Type: text/html\r\n\r\n";

/// One accepted client connection
pub trait Connection: Read + Write + Send {
    /// Release the connection. Must be safe to call on a broken socket.
    fn close(&mut self);
}

impl Connection for TcpStream {
    fn close(&mut self) {
        let _ = self.shutdown(Shutdown::Both);
    }
}

/// Source of pending connections
pub trait Acceptor: Send {
    /// Take one pending connection without blocking; `None` if there is none
    fn try_accept(&mut self) -> Result<Option<Box<dyn Connection>>>;
}

/// Non-blocking TCP listener
pub struct TcpAcceptor {
    listener: TcpListener,
    io_timeout: Option<Duration>,
}

impl TcpAcceptor {
    pub fn bind<A: ToSocketAddrs>(addr: A, read_timeout: Duration) -> Result<Self> {
        let listener = TcpListener::bind(addr)?;
        listener.set_nonblocking(true)?;
        Ok(Self {
            listener,
            io_timeout: (!read_timeout.is_zero()).then_some(read_timeout),
        })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.listener.local_addr()?)
    }
}

impl Acceptor for TcpAcceptor {
    fn try_accept(&mut self) -> Result<Option<Box<dyn Connection>>> {
        match self.listener.accept() {
            Ok((stream, addr)) => {
                log::debug!("Accepted connection from {}", addr);
                match prepare_stream(&stream, self.io_timeout) {
                    Ok(()) => Ok(Some(Box::new(stream))),
                    Err(e) => {
                        // Dropping the stream closes it; the listener is fine
                        log::warn!("Dropping connection from {}: {}", addr, e);
                        Ok(None)
                    }
                }
            }
            Err(e) if e.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(e) => Err(Error::Io(e)),
        }
    }
}

/// Blocking mode with bounded reads and writes for an accepted stream
fn prepare_stream(stream: &TcpStream, timeout: Option<Duration>) -> io::Result<()> {
    // Some platforms hand out sockets that inherit non-blocking mode
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(timeout)?;
    stream.set_write_timeout(timeout)?;
    Ok(())
}

/// Closes the wrapped connection when dropped
pub struct ConnectionGuard {
    conn: Box<dyn Connection>,
}

impl ConnectionGuard {
    pub fn new(conn: Box<dyn Connection>) -> Self {
        Self { conn }
    }
}

impl Deref for ConnectionGuard {
    type Target = dyn Connection;

    fn deref(&self) -> &Self::Target {
        self.conn.as_ref()
    }
}

impl DerefMut for ConnectionGuard {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.conn.as_mut()
    }
}

impl Drop for ConnectionGuard {
    fn drop(&mut self) {
        self.conn.close();
    }
}

/// Request target
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    Toggle,
    Status,
    Dashboard,
}

impl Route {
    /// Route from the raw request text (`METHOD PATH ...`)
    pub fn from_request(request: &str) -> Result<Self> {
        let path = request
            .split(' ')
            .nth(1)
            .ok_or_else(|| Error::BadRequest(format!("no path in {:?}", first_line(request))))?;
        Ok(Self::from_path(path))
    }

    pub fn from_path(path: &str) -> Self {
        match path {
            "/hri_toggle" => Self::Toggle,
            "/status" => Self::Status,
            _ => Self::Dashboard,
        }
    }
}

fn first_line(request: &str) -> &str {
    request.lines().next().unwrap_or("")
}

/// Body of `/status`
#[derive(Debug, Serialize)]
pub struct StatusPayload {
    pub distance_cm: String,
    pub hri_mode: &'static str,
}

impl StatusPayload {
    pub fn from_state(state: &RobotState) -> Self {
        Self {
            distance_cm: state.last_distance().status_text(),
            hri_mode: state.mode().label(),
        }
    }

    /// JSON with `", "` and `": "` separators
    pub fn to_json(&self) -> Result<String> {
        let mut out = Vec::with_capacity(64);
        let mut ser = serde_json::Serializer::with_formatter(&mut out, SpacedFormatter);
        self.serialize(&mut ser)?;
        String::from_utf8(out).map_err(|e| Error::Other(e.to_string()))
    }
}

/// Compact JSON with a space after every separator
struct SpacedFormatter;

impl serde_json::ser::Formatter for SpacedFormatter {
    fn begin_object_key<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }

    fn begin_object_value<W: ?Sized + Write>(&mut self, writer: &mut W) -> io::Result<()> {
        writer.write_all(b": ")
    }

    fn begin_array_value<W: ?Sized + Write>(&mut self, writer: &mut W, first: bool) -> io::Result<()> {
        if first {
            Ok(())
        } else {
            writer.write_all(b", ")
        }
    }
}

/// Poll-driven request handler
pub struct CommandChannel {
    acceptor: Box<dyn Acceptor>,
    buffer: Vec<u8>,
    served: u64,
}

impl CommandChannel {
    pub fn new(acceptor: Box<dyn Acceptor>, buffer_bytes: usize) -> Self {
        Self {
            acceptor,
            buffer: vec![0; buffer_bytes.max(1)],
            served: 0,
        }
    }

    /// Requests answered since start
    pub fn served(&self) -> u64 {
        self.served
    }

    /// Service at most one pending connection.
    ///
    /// Returns the route served, or `None` when nothing was pending or the
    /// request failed at the socket/parse level.
    pub fn poll(
        &mut self,
        state: &mut RobotState,
        motors: &mut dyn MotionActuator,
        now: Duration,
    ) -> Result<Option<Route>> {
        let Some(conn) = self.acceptor.try_accept()? else {
            return Ok(None);
        };
        let mut conn = ConnectionGuard::new(conn);

        match self.serve(&mut conn, state, motors, now) {
            Ok(route) => {
                self.served += 1;
                log::debug!("Served {:?}", route);
                Ok(Some(route))
            }
            Err(e @ (Error::Io(_) | Error::BadRequest(_))) => {
                log::warn!("Dropping request: {}", e);
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    fn serve(
        &mut self,
        conn: &mut ConnectionGuard,
        state: &mut RobotState,
        motors: &mut dyn MotionActuator,
        now: Duration,
    ) -> Result<Route> {
        let n = conn.read(&mut self.buffer)?;
        let request = String::from_utf8_lossy(&self.buffer[..n]);
        let route = Route::from_request(&request)?;

        if route == Route::Toggle && state.toggle_mode(now) == OperatingMode::Pause {
            // A WORK command may already be applied this tick
            motors.stop()?;
        }

        let response = render(route, state)?;
        conn.write_all(response.as_bytes())?;
        conn.flush()?;
        Ok(route)
    }
}

/// Full response (status line, headers, body) for a route
pub fn render(route: Route, state: &RobotState) -> Result<String> {
    Ok(match route {
        Route::Toggle => NO_CONTENT.to_string(),
        Route::Status => {
            let body = StatusPayload::from_state(state).to_json()?;
            format!("{}{}", JSON_HEADER, body)
        }
        Route::Dashboard => format!("{}{}", HTML_HEADER, DASHBOARD_HTML),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::DistanceReading;
    use crate::devices::mock::{MotorEvent, RecordingMotors};
    use parking_lot::Mutex;
    use std::collections::VecDeque;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    /// In-memory connection with shared output and close flag
    struct MemoryConnection {
        input: io::Cursor<Vec<u8>>,
        output: Arc<Mutex<Vec<u8>>>,
        closed: Arc<AtomicBool>,
        fail_write: bool,
    }

    impl Read for MemoryConnection {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for MemoryConnection {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            if self.fail_write {
                return Err(io::Error::new(io::ErrorKind::BrokenPipe, "peer gone"));
            }
            self.output.lock().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Connection for MemoryConnection {
        fn close(&mut self) {
            self.closed.store(true, Ordering::SeqCst);
        }
    }

    struct Peer {
        output: Arc<Mutex<Vec<u8>>>,
        closed: Arc<AtomicBool>,
    }

    impl Peer {
        fn response(&self) -> String {
            String::from_utf8(self.output.lock().clone()).unwrap()
        }

        fn closed(&self) -> bool {
            self.closed.load(Ordering::SeqCst)
        }
    }

    #[derive(Default)]
    struct MemoryAcceptor {
        pending: Arc<Mutex<VecDeque<MemoryConnection>>>,
    }

    impl MemoryAcceptor {
        fn queue(&self, request: &str, fail_write: bool) -> Peer {
            let output = Arc::new(Mutex::new(Vec::new()));
            let closed = Arc::new(AtomicBool::new(false));
            self.pending.lock().push_back(MemoryConnection {
                input: io::Cursor::new(request.as_bytes().to_vec()),
                output: Arc::clone(&output),
                closed: Arc::clone(&closed),
                fail_write,
            });
            Peer { output, closed }
        }
    }

    impl Acceptor for MemoryAcceptor {
        fn try_accept(&mut self) -> Result<Option<Box<dyn Connection>>> {
            Ok(self
                .pending
                .lock()
                .pop_front()
                .map(|c| Box::new(c) as Box<dyn Connection>))
        }
    }

    struct BrokenAcceptor;

    impl Acceptor for BrokenAcceptor {
        fn try_accept(&mut self) -> Result<Option<Box<dyn Connection>>> {
            Err(Error::Io(io::Error::new(
                io::ErrorKind::ConnectionAborted,
                "listener torn down",
            )))
        }
    }

    fn setup() -> (CommandChannel, Arc<Mutex<VecDeque<MemoryConnection>>>) {
        let acceptor = MemoryAcceptor::default();
        let pending = Arc::clone(&acceptor.pending);
        (CommandChannel::new(Box::new(acceptor), 1024), pending)
    }

    fn queue(pending: &Arc<Mutex<VecDeque<MemoryConnection>>>, request: &str, fail_write: bool) -> Peer {
        MemoryAcceptor {
            pending: Arc::clone(pending),
        }
        .queue(request, fail_write)
    }

    #[test]
    fn test_status_body_format() {
        let mut state = RobotState::new(OperatingMode::Work, Duration::ZERO);
        state.record_distance(DistanceReading::Valid(7.26));
        let json = StatusPayload::from_state(&state).to_json().unwrap();
        assert_eq!(json, r#"{"distance_cm": "7.3", "hri_mode": "WORK"}"#);
    }

    #[test]
    fn test_status_body_for_dropout_stays_numeric() {
        let mut state = RobotState::new(OperatingMode::Work, Duration::ZERO);
        state.record_distance(DistanceReading::from_raw_cm(-1.0));
        let json = StatusPayload::from_state(&state).to_json().unwrap();
        assert_eq!(json, r#"{"distance_cm": "-1.0", "hri_mode": "WORK"}"#);

        let body: serde_json::Value = serde_json::from_str(&json).unwrap();
        let cm: f32 = body["distance_cm"].as_str().unwrap().parse().unwrap();
        assert!(cm <= 0.0);
    }

    #[test]
    fn test_route_parsing() {
        assert_eq!(
            Route::from_request("GET /hri_toggle HTTP/1.1\r\n").unwrap(),
            Route::Toggle
        );
        assert_eq!(
            Route::from_request("GET /status HTTP/1.1\r\n").unwrap(),
            Route::Status
        );
        assert_eq!(
            Route::from_request("GET / HTTP/1.1\r\n").unwrap(),
            Route::Dashboard
        );
        assert_eq!(
            Route::from_request("GET /favicon.ico HTTP/1.1\r\n").unwrap(),
            Route::Dashboard
        );
        assert!(matches!(
            Route::from_request("garbage"),
            Err(Error::BadRequest(_))
        ));
    }

    #[test]
    fn test_nothing_pending_returns_immediately() {
        let (mut channel, _) = setup();
        let mut state = RobotState::new(OperatingMode::Work, Duration::ZERO);
        let mut motors = RecordingMotors::new();

        let route = channel.poll(&mut state, &mut motors, Duration::ZERO).unwrap();
        assert_eq!(route, None);
        assert!(motors.events().is_empty());
    }

    #[test]
    fn test_toggle_into_pause_stops_and_closes() {
        let (mut channel, pending) = setup();
        let peer = queue(&pending, "GET /hri_toggle HTTP/1.1\r\n\r\n", false);
        let mut state = RobotState::new(OperatingMode::Work, Duration::ZERO);
        let mut motors = RecordingMotors::new();

        let route = channel.poll(&mut state, &mut motors, Duration::ZERO).unwrap();

        assert_eq!(route, Some(Route::Toggle));
        assert_eq!(state.mode(), OperatingMode::Pause);
        assert_eq!(motors.events(), vec![MotorEvent::Stop]);
        assert_eq!(peer.response(), "HTTP/1.0 204 No Content\r\n\r\n");
        assert!(peer.closed());
    }

    #[test]
    fn test_toggle_into_work_does_not_stop() {
        let (mut channel, pending) = setup();
        queue(&pending, "GET /hri_toggle HTTP/1.1\r\n\r\n", false);
        let mut state = RobotState::new(OperatingMode::Pause, Duration::ZERO);
        let mut motors = RecordingMotors::new();

        channel.poll(&mut state, &mut motors, Duration::ZERO).unwrap();

        assert_eq!(state.mode(), OperatingMode::Work);
        assert!(motors.events().is_empty());
    }

    #[test]
    fn test_status_response() {
        let (mut channel, pending) = setup();
        let peer = queue(&pending, "GET /status HTTP/1.1\r\nHost: bot\r\n\r\n", false);
        let mut state = RobotState::new(OperatingMode::Pause, Duration::ZERO);
        state.record_distance(DistanceReading::Valid(123.46));
        let mut motors = RecordingMotors::new();

        channel.poll(&mut state, &mut motors, Duration::ZERO).unwrap();

        assert_eq!(
            peer.response(),
            "HTTP/1.0 200 OK\r\nContent-Type: application/json\r\n\r\n\
             {\"distance_cm\": \"123.5\", \"hri_mode\": \"PAUSE\"}"
        );
    }

    #[test]
    fn test_unknown_path_serves_dashboard() {
        let (mut channel, pending) = setup();
        let peer = queue(&pending, "GET /index.html HTTP/1.1\r\n\r\n", false);
        let mut state = RobotState::new(OperatingMode::Pause, Duration::ZERO);
        let mut motors = RecordingMotors::new();

        let route = channel.poll(&mut state, &mut motors, Duration::ZERO).unwrap();

        assert_eq!(route, Some(Route::Dashboard));
        let response = peer.response();
        assert!(response.starts_with("HTTP/1.0 200 OK\r\nContent-Type: text/html\r\n\r\n"));
        assert!(response.contains("fetch('/status')"));
        assert!(response.contains("1000)"));
    }

    #[test]
    fn test_bad_request_is_contained_and_closed() {
        let (mut channel, pending) = setup();
        let peer = queue(&pending, "", false);
        let mut state = RobotState::new(OperatingMode::Work, Duration::ZERO);
        let mut motors = RecordingMotors::new();

        let route = channel.poll(&mut state, &mut motors, Duration::ZERO).unwrap();

        assert_eq!(route, None);
        assert!(peer.closed());
        assert_eq!(state.mode(), OperatingMode::Work);
        assert_eq!(channel.served(), 0);
    }

    #[test]
    fn test_write_failure_still_closes() {
        let (mut channel, pending) = setup();
        let peer = queue(&pending, "GET /status HTTP/1.1\r\n\r\n", true);
        let mut state = RobotState::new(OperatingMode::Work, Duration::ZERO);
        let mut motors = RecordingMotors::new();

        let route = channel.poll(&mut state, &mut motors, Duration::ZERO).unwrap();

        assert_eq!(route, None);
        assert!(peer.closed());
    }

    #[test]
    fn test_one_connection_per_poll() {
        let (mut channel, pending) = setup();
        queue(&pending, "GET /status HTTP/1.1\r\n\r\n", false);
        queue(&pending, "GET /status HTTP/1.1\r\n\r\n", false);
        let mut state = RobotState::new(OperatingMode::Work, Duration::ZERO);
        let mut motors = RecordingMotors::new();

        channel.poll(&mut state, &mut motors, Duration::ZERO).unwrap();
        assert_eq!(pending.lock().len(), 1);
    }

    #[test]
    fn test_toggle_stop_failure_closes_and_propagates() {
        let (mut channel, pending) = setup();
        let peer = queue(&pending, "GET /hri_toggle HTTP/1.1\r\n\r\n", false);
        let mut state = RobotState::new(OperatingMode::Work, Duration::ZERO);
        let mut motors = RecordingMotors::new();
        motors.fail_next_stop();

        let result = channel.poll(&mut state, &mut motors, Duration::ZERO);

        assert!(matches!(result, Err(Error::Device(_))));
        assert!(peer.closed());
        assert_eq!(peer.response(), "");
        assert_eq!(state.mode(), OperatingMode::Pause);
        assert!(motors.events().is_empty());
    }

    #[test]
    fn test_accept_failure_propagates() {
        let mut channel = CommandChannel::new(Box::new(BrokenAcceptor), 1024);
        let mut state = RobotState::new(OperatingMode::Work, Duration::ZERO);
        let mut motors = RecordingMotors::new();
        assert!(channel.poll(&mut state, &mut motors, Duration::ZERO).is_err());
    }

    fn accept_within(acceptor: &mut TcpAcceptor, attempts: usize) -> Option<Box<dyn Connection>> {
        for _ in 0..attempts {
            if let Some(conn) = acceptor.try_accept().unwrap() {
                return Some(conn);
            }
            std::thread::sleep(Duration::from_millis(2));
        }
        None
    }

    #[test]
    fn test_stream_setup_failure_drops_only_that_connection() {
        let mut acceptor = TcpAcceptor::bind("127.0.0.1:0", Duration::from_millis(500)).unwrap();
        let addr = acceptor.local_addr().unwrap();
        // The socket layer rejects a zero timeout
        acceptor.io_timeout = Some(Duration::ZERO);

        let mut client = TcpStream::connect(addr).unwrap();
        client.set_read_timeout(Some(Duration::from_secs(2))).unwrap();
        assert!(accept_within(&mut acceptor, 50).is_none());
        let mut buf = [0u8; 8];
        assert_eq!(client.read(&mut buf).unwrap(), 0);

        acceptor.io_timeout = Some(Duration::from_millis(500));
        let _next = TcpStream::connect(addr).unwrap();
        assert!(accept_within(&mut acceptor, 50).is_some());
    }
}
