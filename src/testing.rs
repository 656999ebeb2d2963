//! Loopback scripted SMTP server for tests.

use std::io::{self, BufRead, BufReader, Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::{Arc, Mutex};
use std::thread;

use native_tls::{Identity, TlsAcceptor};

use crate::mx::Endpoint;

/// One scripted exchange: the client line must start with the first
/// element, the server answers with the second. An expectation of `"."`
/// consumes a whole DATA payload up to the terminating dot.
pub(crate) type Script = Vec<(&'static str, &'static str)>;

pub(crate) struct MockServer {
    pub port: u16,
    /// Every line received, in order, across all connections.
    pub log: Arc<Mutex<Vec<String>>>,
    handle: thread::JoinHandle<()>,
}

impl MockServer {
    /// Serves one connection per script, sequentially.
    pub(crate) fn spawn(greeting: &'static str, scripts: Vec<Script>) -> Self {
        Self::start(greeting, scripts, false)
    }

    /// Like [`MockServer::spawn`], but a `STARTTLS` answered with 220
    /// switches the connection to TLS under a fresh self-signed certificate.
    pub(crate) fn spawn_tls(greeting: &'static str, scripts: Vec<Script>) -> Self {
        Self::start(greeting, scripts, true)
    }

    fn start(greeting: &'static str, scripts: Vec<Script>, tls: bool) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind mock server");
        let port = listener.local_addr().expect("addr").port();
        let log = Arc::new(Mutex::new(Vec::new()));
        let server_log = Arc::clone(&log);
        let handle = thread::spawn(move || {
            let acceptor = tls.then(self_signed_acceptor);
            for script in scripts {
                let Ok((stream, _)) = listener.accept() else {
                    return;
                };
                let _ = handle_session(stream, greeting, script, acceptor.as_ref(), &server_log);
            }
        });
        Self { port, log, handle }
    }

    pub(crate) fn endpoint(&self) -> Endpoint {
        Endpoint::new("127.0.0.1", self.port)
    }

    pub(crate) fn finish(self) -> Vec<String> {
        self.handle.join().expect("server thread");
        let log = self.log.lock().expect("log lock");
        log.clone()
    }
}

fn self_signed_acceptor() -> TlsAcceptor {
    let certified = rcgen::generate_simple_self_signed(vec!["mock.smtp.test".to_string()])
        .expect("self-signed certificate");
    let identity = Identity::from_pkcs8(
        certified.cert.pem().as_bytes(),
        certified.key_pair.serialize_pem().as_bytes(),
    )
    .expect("tls identity");
    TlsAcceptor::new(identity).expect("tls acceptor")
}

fn handle_session(
    mut stream: TcpStream,
    greeting: &str,
    script: Script,
    acceptor: Option<&TlsAcceptor>,
    log: &Mutex<Vec<String>>,
) -> io::Result<()> {
    stream.write_all(greeting.as_bytes())?;
    stream.flush()?;
    let mut script = script.into_iter();
    if let Some(plain) = converse(stream, &mut script, acceptor.is_some(), log)? {
        let Some(acceptor) = acceptor else {
            return Ok(());
        };
        let secured = acceptor
            .accept(plain)
            .map_err(|err| io::Error::other(err.to_string()))?;
        log.lock().expect("log lock").push("<tls>".to_string());
        converse(secured, &mut script, false, log)?;
    }
    Ok(())
}

/// Plays the script until it runs out, or until an accepted `STARTTLS`
/// when `upgrade` is set, in which case the raw stream is handed back.
fn converse<S: Read + Write>(
    stream: S,
    script: &mut std::vec::IntoIter<(&'static str, &'static str)>,
    upgrade: bool,
    log: &Mutex<Vec<String>>,
) -> io::Result<Option<S>> {
    let mut reader = BufReader::new(stream);
    for (expected, response) in script.by_ref() {
        if expected == "." {
            let mut body = String::new();
            loop {
                let mut line = String::new();
                if reader.read_line(&mut line)? == 0 {
                    return Ok(None);
                }
                if line == ".\r\n" {
                    break;
                }
                body.push_str(&line);
            }
            log.lock().expect("log lock").push(format!("<body>{body}"));
        } else {
            let mut line = String::new();
            if reader.read_line(&mut line)? == 0 {
                return Ok(None);
            }
            let line = line.trim_end().to_string();
            let matches = line.starts_with(expected);
            log.lock().expect("log lock").push(line);
            if !matches {
                reader.get_mut().write_all(b"500 5.5.1 unexpected command\r\n")?;
                return Ok(None);
            }
        }
        let stream = reader.get_mut();
        stream.write_all(response.as_bytes())?;
        stream.flush()?;
        if upgrade && expected == "STARTTLS" && response.starts_with("220") {
            // The client waits for the 220 before its handshake, so nothing
            // is left in the read buffer.
            return Ok(Some(reader.into_inner()));
        }
    }
    Ok(None)
}

/// A port nothing listens on.
pub(crate) fn dead_endpoint() -> Endpoint {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().expect("addr").port();
    drop(listener);
    Endpoint::new("127.0.0.1", port)
}

pub(crate) const GREETING: &str = "220 mock.smtp.test ESMTP\r\n";
