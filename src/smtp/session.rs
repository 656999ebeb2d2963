use std::io::{self, Read, Write};
use std::net::{SocketAddr, TcpStream, ToSocketAddrs};
use std::time::Duration;

use native_tls::{HandshakeError, TlsConnector, TlsStream};
use secrecy::ExposeSecret;

use super::SmtpError;
use super::auth::{self, Mechanism};
use super::options::SmtpOptions;
use super::types::{Credentials, Extensions, SmtpReply, Stage};
use crate::mx::Endpoint;

/// Longest reply line accepted, CRLF included. RFC 5321 allows 512 bytes;
/// servers with long extension lists go past that.
const MAX_LINE: usize = 4096;

#[derive(Debug)]
enum StreamState {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
    Invalid,
}

#[derive(Debug)]
struct SmtpStream {
    state: StreamState,
    buffer: Vec<u8>,
}

impl SmtpStream {
    fn connect(addr: &SocketAddr, connect: Duration, command: Duration) -> io::Result<Self> {
        let stream = TcpStream::connect_timeout(addr, connect)?;
        stream.set_read_timeout(Some(command))?;
        stream.set_write_timeout(Some(command))?;
        Ok(Self {
            state: StreamState::Plain(stream),
            buffer: Vec::new(),
        })
    }

    fn is_tls(&self) -> bool {
        matches!(self.state, StreamState::Tls(_))
    }

    fn upgrade_tls(&mut self, domain: &str, connector: &TlsConnector) -> Result<(), SmtpError> {
        let plain = match std::mem::replace(&mut self.state, StreamState::Invalid) {
            StreamState::Plain(stream) => stream,
            StreamState::Tls(stream) => {
                self.state = StreamState::Tls(stream);
                return Ok(());
            }
            StreamState::Invalid => {
                return Err(SmtpError::io(Stage::StartTls, invalid_state()));
            }
        };
        // Anything buffered before the handshake would be a plaintext
        // injection (RFC 3207 §6).
        self.buffer.clear();
        let tls = complete_handshake(connector, domain, plain)?;
        self.state = StreamState::Tls(Box::new(tls));
        Ok(())
    }

    fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        match &mut self.state {
            StreamState::Plain(stream) => {
                stream.write_all(data)?;
                stream.flush()
            }
            StreamState::Tls(stream) => {
                stream.write_all(data)?;
                stream.flush()
            }
            StreamState::Invalid => Err(invalid_state()),
        }
    }

    fn send_line(&mut self, line: &str) -> io::Result<()> {
        let mut data = Vec::with_capacity(line.len() + 2);
        data.extend_from_slice(line.as_bytes());
        data.extend_from_slice(b"\r\n");
        self.write_all(&data)
    }

    fn read_reply(&mut self) -> io::Result<SmtpReply> {
        let mut lines = Vec::new();
        let mut code: Option<u16> = None;
        loop {
            let line = self.read_line()?;
            if line.len() < 3 || !line.is_char_boundary(3) {
                return Err(invalid_data(format!("invalid reply: {line}")));
            }
            let parsed_code = line[..3]
                .parse::<u16>()
                .map_err(|_| invalid_data(format!("invalid code in line: {line}")))?;
            match code {
                Some(existing) if existing != parsed_code => {
                    return Err(invalid_data(format!(
                        "inconsistent reply codes: {existing} vs {parsed_code}"
                    )));
                }
                Some(_) => {}
                None => code = Some(parsed_code),
            }
            let is_last = line.as_bytes().get(3) != Some(&b'-');
            lines.push(line.get(4..).unwrap_or_default().to_string());
            if is_last {
                return Ok(SmtpReply {
                    code: parsed_code,
                    lines,
                });
            }
        }
    }

    fn read_line(&mut self) -> io::Result<String> {
        loop {
            let newline = self.buffer.iter().position(|byte| *byte == b'\n');
            if newline.map_or(self.buffer.len(), |pos| pos + 1) > MAX_LINE {
                return Err(invalid_data(format!("reply line exceeds {MAX_LINE} bytes")));
            }
            if let Some(pos) = newline {
                let mut line = self.buffer.drain(..=pos).collect::<Vec<_>>();
                if line.ends_with(b"\r\n") {
                    line.truncate(line.len() - 2);
                } else {
                    line.truncate(line.len() - 1);
                }
                return String::from_utf8(line)
                    .map_err(|err| invalid_data(format!("utf8 error: {err}")));
            }

            let mut buf = [0u8; 512];
            let read = match &mut self.state {
                StreamState::Plain(stream) => stream.read(&mut buf)?,
                StreamState::Tls(stream) => stream.read(&mut buf)?,
                StreamState::Invalid => return Err(invalid_state()),
            };
            if read == 0 {
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "connection closed",
                ));
            }
            self.buffer.extend_from_slice(&buf[..read]);
        }
    }
}

fn invalid_state() -> io::Error {
    io::Error::other("invalid stream state")
}

fn invalid_data(message: String) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message)
}

fn complete_handshake(
    connector: &TlsConnector,
    domain: &str,
    stream: TcpStream,
) -> Result<TlsStream<TcpStream>, SmtpError> {
    match connector.connect(domain, stream) {
        Ok(tls) => Ok(tls),
        Err(HandshakeError::Failure(err)) => Err(SmtpError::tls(err)),
        Err(HandshakeError::WouldBlock(mut mid)) => loop {
            match mid.handshake() {
                Ok(tls) => break Ok(tls),
                Err(HandshakeError::Failure(err)) => break Err(SmtpError::tls(err)),
                Err(HandshakeError::WouldBlock(next)) => mid = next,
            }
        },
    }
}

/// One open connection to one server. Dropping the session closes the
/// socket, whichever step failed.
pub(crate) struct SmtpSession {
    endpoint: Endpoint,
    stream: SmtpStream,
    extensions: Extensions,
}

impl SmtpSession {
    pub(crate) fn connect(endpoint: &Endpoint, options: &SmtpOptions) -> Result<Self, SmtpError> {
        let addresses: Vec<SocketAddr> = (endpoint.host.as_str(), endpoint.port)
            .to_socket_addrs()
            .map_err(|source| SmtpError::Connect {
                host: endpoint.to_string(),
                source,
            })?
            .collect();

        let mut last_err = None;
        for addr in &addresses {
            match SmtpStream::connect(addr, options.connect_timeout, options.command_timeout) {
                Ok(stream) => {
                    tracing::debug!(server = %endpoint, peer = %addr, "connected");
                    return Ok(Self {
                        endpoint: endpoint.clone(),
                        stream,
                        extensions: Extensions::default(),
                    });
                }
                Err(err) => last_err = Some(err),
            }
        }
        Err(match last_err {
            Some(source) => SmtpError::Connect {
                host: endpoint.to_string(),
                source,
            },
            None => SmtpError::NoAddress {
                host: endpoint.to_string(),
            },
        })
    }

    pub(crate) fn is_tls(&self) -> bool {
        self.stream.is_tls()
    }

    pub(crate) fn extensions(&self) -> &Extensions {
        &self.extensions
    }

    fn read(&mut self, stage: Stage) -> Result<SmtpReply, SmtpError> {
        let reply = self
            .stream
            .read_reply()
            .map_err(|err| SmtpError::io(stage, err))?;
        tracing::trace!(server = %self.endpoint, code = reply.code, "S: {}", reply.message());
        Ok(reply)
    }

    fn command(&mut self, line: &str, stage: Stage) -> Result<SmtpReply, SmtpError> {
        tracing::trace!(server = %self.endpoint, "C: {line}");
        self.stream
            .send_line(line)
            .map_err(|err| SmtpError::io(stage, err))?;
        self.read(stage)
    }

    /// Sends `line` and requires a reply in the given class.
    fn expect(&mut self, line: &str, stage: Stage, class: u16) -> Result<SmtpReply, SmtpError> {
        let reply = self.command(line, stage)?;
        if reply.code / 100 != class {
            return Err(unexpected(stage, &reply));
        }
        Ok(reply)
    }

    pub(crate) fn read_greeting(&mut self) -> Result<SmtpReply, SmtpError> {
        let reply = self.read(Stage::Greeting)?;
        if !reply.is_positive_completion() {
            return Err(unexpected(Stage::Greeting, &reply));
        }
        Ok(reply)
    }

    /// EHLO, falling back to HELO (no extensions) when EHLO is refused.
    pub(crate) fn hello(&mut self, name: &str) -> Result<(), SmtpError> {
        let reply = self.command(&format!("EHLO {name}"), Stage::Ehlo)?;
        if reply.is_positive_completion() {
            self.extensions = Extensions::from_ehlo(&reply);
            return Ok(());
        }
        self.expect(&format!("HELO {name}"), Stage::Ehlo, 2)?;
        self.extensions = Extensions::default();
        Ok(())
    }

    pub(crate) fn starttls(&mut self, connector: &TlsConnector) -> Result<(), SmtpError> {
        self.expect("STARTTLS", Stage::StartTls, 2)?;
        let host = self.endpoint.host.clone();
        self.stream.upgrade_tls(&host, connector)?;
        tracing::debug!(server = %self.endpoint, "STARTTLS negotiated");
        Ok(())
    }

    pub(crate) fn authenticate(&mut self, credentials: &Credentials) -> Result<(), SmtpError> {
        let mechanism = Mechanism::choose(&self.extensions).ok_or_else(|| {
            SmtpError::AuthUnsupported {
                host: self.endpoint.to_string(),
            }
        })?;
        let password = credentials.password.expose_secret();
        tracing::trace!(server = %self.endpoint, ?mechanism, "C: AUTH <redacted>");
        let reply = match mechanism {
            Mechanism::Plain => {
                let response = auth::plain_response(&credentials.login, password);
                self.auth_step(&format!("AUTH PLAIN {response}"))?
            }
            Mechanism::Login => {
                let reply = self.auth_step("AUTH LOGIN")?;
                let reply = self.auth_continue(reply, &auth::encode(&credentials.login))?;
                self.auth_continue(reply, &auth::encode(password))?
            }
        };
        if reply.code != 235 {
            return Err(SmtpError::Auth {
                code: reply.code,
                message: reply.message(),
            });
        }
        Ok(())
    }

    fn auth_step(&mut self, line: &str) -> Result<SmtpReply, SmtpError> {
        self.stream
            .send_line(line)
            .map_err(|err| SmtpError::io(Stage::Auth, err))?;
        self.read(Stage::Auth)
    }

    fn auth_continue(&mut self, previous: SmtpReply, line: &str) -> Result<SmtpReply, SmtpError> {
        if previous.code != 334 {
            return Err(SmtpError::Auth {
                code: previous.code,
                message: previous.message(),
            });
        }
        self.auth_step(line)
    }

    pub(crate) fn mail_from(&mut self, sender: &str) -> Result<(), SmtpError> {
        self.expect(&format!("MAIL FROM:<{sender}>"), Stage::MailFrom, 2)?;
        Ok(())
    }

    /// Returns the server's verdict on one recipient. Only a closing
    /// connection (421) counts as a session failure.
    pub(crate) fn rcpt_to(&mut self, recipient: &str) -> Result<SmtpReply, SmtpError> {
        let reply = self.command(&format!("RCPT TO:<{recipient}>"), Stage::RcptTo)?;
        if reply.code == 421 {
            return Err(unexpected(Stage::RcptTo, &reply));
        }
        Ok(reply)
    }

    pub(crate) fn data(&mut self, message: &[u8]) -> Result<SmtpReply, SmtpError> {
        let reply = self.command("DATA", Stage::Data)?;
        if !reply.is_positive_intermediate() {
            return Err(unexpected(Stage::Data, &reply));
        }
        let payload = dot_stuff(message);
        self.stream
            .write_all(&payload)
            .map_err(|err| SmtpError::io(Stage::Data, err))?;
        let reply = self.read(Stage::Data)?;
        if !reply.is_positive_completion() {
            return Err(unexpected(Stage::Data, &reply));
        }
        Ok(reply)
    }

    /// Best effort: the transaction outcome is already known.
    pub(crate) fn quit(&mut self) {
        if let Err(err) = self.command("QUIT", Stage::Quit) {
            tracing::debug!(server = %self.endpoint, error = %err, "QUIT failed");
        }
    }
}

fn unexpected(stage: Stage, reply: &SmtpReply) -> SmtpError {
    SmtpError::Reply {
        stage,
        code: reply.code,
        message: reply.message(),
    }
}

/// DATA payload: bare LF becomes CRLF, lines starting with '.' get an
/// extra '.', and the terminating `.` line is appended.
pub(crate) fn dot_stuff(message: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(message.len() + message.len() / 32 + 5);
    let mut at_line_start = true;
    let mut prev = 0u8;
    for &byte in message {
        if at_line_start && byte == b'.' {
            out.push(b'.');
        }
        if byte == b'\n' && prev != b'\r' {
            out.push(b'\r');
        }
        out.push(byte);
        at_line_start = byte == b'\n';
        prev = byte;
    }
    if !out.is_empty() && !out.ends_with(b"\r\n") {
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(b".\r\n");
    out
}
