//! MikroTik RouterOS API client
//!
//! The API speaks in sentences: a sequence of length-prefixed words closed
//! by an empty word. Commands are sent as `/path/command` followed by
//! `=attribute=value` words; the router answers with `!re` sentences for
//! each result row and a final `!done`. Errors come back as `!trap` (the
//! command failed, `!done` still follows) or `!fatal` (the connection is
//! being closed).

use super::{LogSource, SourceError};
use crate::config::RouterConfig;
use crate::models::LogEntry;
use std::collections::HashMap;
use std::io::{self, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::Duration;

/// Attributes of one `!re` reply
pub type Reply = HashMap<String, String>;

/// Encode a word length using the API's variable-width prefix
pub fn encode_length(len: usize) -> Vec<u8> {
    let len = len as u32;
    if len < 0x80 {
        vec![len as u8]
    } else if len < 0x4000 {
        let v = len | 0x8000;
        vec![(v >> 8) as u8, v as u8]
    } else if len < 0x20_0000 {
        let v = len | 0xC0_0000;
        vec![(v >> 16) as u8, (v >> 8) as u8, v as u8]
    } else if len < 0x1000_0000 {
        let v = len | 0xE000_0000;
        vec![(v >> 24) as u8, (v >> 16) as u8, (v >> 8) as u8, v as u8]
    } else {
        vec![0xF0, (len >> 24) as u8, (len >> 16) as u8, (len >> 8) as u8, len as u8]
    }
}

/// Read a word length prefix
pub fn decode_length<R: Read>(reader: &mut R) -> io::Result<usize> {
    let first = read_byte(reader)? as usize;

    let (extra, mut len) = if first & 0x80 == 0 {
        (0, first)
    } else if first & 0xC0 == 0x80 {
        (1, first & 0x3F)
    } else if first & 0xE0 == 0xC0 {
        (2, first & 0x1F)
    } else if first & 0xF0 == 0xE0 {
        (3, first & 0x0F)
    } else if first == 0xF0 {
        (4, 0)
    } else {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("reserved length prefix 0x{:02x}", first),
        ));
    };

    for _ in 0..extra {
        len = (len << 8) | read_byte(reader)? as usize;
    }
    Ok(len)
}

fn read_byte<R: Read>(reader: &mut R) -> io::Result<u8> {
    let mut buf = [0u8; 1];
    reader.read_exact(&mut buf)?;
    Ok(buf[0])
}

/// Split an `=key=value` word; the value may itself contain `=`
fn parse_attribute(word: &str) -> Option<(&str, &str)> {
    word.strip_prefix('=')?.split_once('=')
}

/// Sentence-level API connection over any byte stream
pub struct ApiConnection<S> {
    stream: S,
}

impl<S: Read + Write> ApiConnection<S> {
    pub fn new(stream: S) -> Self {
        ApiConnection { stream }
    }

    pub fn write_sentence(&mut self, words: &[&str]) -> io::Result<()> {
        let mut buf = Vec::new();
        for word in words {
            buf.extend(encode_length(word.len()));
            buf.extend_from_slice(word.as_bytes());
        }
        buf.push(0);
        self.stream.write_all(&buf)?;
        self.stream.flush()
    }

    pub fn read_sentence(&mut self) -> Result<Vec<String>, SourceError> {
        let mut words = Vec::new();
        loop {
            let len = decode_length(&mut self.stream)?;
            if len == 0 {
                return Ok(words);
            }
            let mut buf = vec![0u8; len];
            self.stream.read_exact(&mut buf)?;
            let word = String::from_utf8(buf)
                .map_err(|e| SourceError::Protocol(format!("word is not UTF-8: {}", e)))?;
            words.push(word);
        }
    }

    /// Run a command and collect its `!re` replies
    ///
    /// A `!trap` is held until the trailing `!done` so the connection stays
    /// in step for the next command.
    pub fn command(&mut self, words: &[&str]) -> Result<Vec<Reply>, SourceError> {
        self.write_sentence(words)?;

        let mut replies = Vec::new();
        let mut trap: Option<String> = None;

        loop {
            let sentence = self.read_sentence()?;
            let Some((kind, attributes)) = sentence.split_first() else {
                continue;
            };
            let attributes: Reply = attributes
                .iter()
                .filter_map(|w| parse_attribute(w))
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect();

            match kind.as_str() {
                "!re" => replies.push(attributes),
                // RouterOS 7.18+ announces a result-less command before !done
                "!empty" => {}
                "!done" => {
                    if let Some(ret) = attributes.get("ret") {
                        replies.push(HashMap::from([("ret".to_string(), ret.clone())]));
                    }
                    break;
                }
                "!trap" => {
                    let message = attributes
                        .get("message")
                        .cloned()
                        .unwrap_or_else(|| "unknown error".to_string());
                    trap.get_or_insert(message);
                }
                "!fatal" => {
                    let message = sentence.get(1).cloned().unwrap_or_default();
                    return Err(SourceError::Trap(format!("fatal: {}", message)));
                }
                other => {
                    return Err(SourceError::Protocol(format!("unexpected reply {:?}", other)));
                }
            }
        }

        match trap {
            Some(message) => Err(SourceError::Trap(message)),
            None => Ok(replies),
        }
    }

    /// Plaintext login as used by RouterOS 6.43 and later
    pub fn login(&mut self, username: &str, password: &str) -> Result<(), SourceError> {
        let name = format!("=name={}", username);
        let password = format!("=password={}", password);

        let replies = match self.command(&["/login", &name, &password]) {
            Ok(replies) => replies,
            Err(SourceError::Trap(message)) => return Err(SourceError::Login(message)),
            Err(e) => return Err(e),
        };

        if replies.iter().any(|r| r.contains_key("ret")) {
            return Err(SourceError::Login(
                "router asked for challenge login, which requires RouterOS 6.43 or later".to_string(),
            ));
        }
        Ok(())
    }

    /// Fetch the router's log buffer
    pub fn print_log(&mut self) -> Result<Vec<LogEntry>, SourceError> {
        let replies = self.command(&["/log/print"])?;
        Ok(replies
            .into_iter()
            .map(|mut reply| LogEntry {
                timestamp: reply.remove("time").unwrap_or_default(),
                message: reply.remove("message").unwrap_or_default(),
                topics: reply
                    .get("topics")
                    .map(|t| {
                        t.split(',')
                            .filter(|s| !s.is_empty())
                            .map(String::from)
                            .collect()
                    })
                    .unwrap_or_default(),
            })
            .collect())
    }

    /// Ask the router to close the session; the answer is not awaited
    pub fn quit(&mut self) -> io::Result<()> {
        self.write_sentence(&["/quit"])
    }

    pub fn into_inner(self) -> S {
        self.stream
    }
}

/// Logged-in API session with a router
///
/// Dropping the session sends `/quit` and closes the socket, so the
/// connection is released on every exit path.
pub struct RouterOsSession {
    connection: ApiConnection<TcpStream>,
    address: String,
}

impl RouterOsSession {
    pub fn connect(config: &RouterConfig) -> Result<Self, SourceError> {
        let address = format!("{}:{}", config.host, config.port);
        let timeout = config.timeout_seconds.map(Duration::from_secs);

        let stream = Self::open_stream(&address, timeout).map_err(|source| SourceError::Connect {
            address: address.clone(),
            source,
        })?;
        stream.set_read_timeout(timeout)?;
        stream.set_write_timeout(timeout)?;

        let mut connection = ApiConnection::new(stream);
        connection.login(&config.username, &config.password)?;
        log::info!("Logged in to {} as {}", address, config.username);

        Ok(RouterOsSession { connection, address })
    }

    fn open_stream(address: &str, timeout: Option<Duration>) -> io::Result<TcpStream> {
        match timeout {
            None => TcpStream::connect(address),
            Some(timeout) => {
                let mut last_err = io::Error::new(io::ErrorKind::NotFound, "address resolved to nothing");
                for addr in address.to_socket_addrs()? {
                    match TcpStream::connect_timeout(&addr, timeout) {
                        Ok(stream) => return Ok(stream),
                        Err(e) => last_err = e,
                    }
                }
                Err(last_err)
            }
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }
}

impl LogSource for RouterOsSession {
    fn fetch_entries(&mut self) -> Result<Vec<LogEntry>, SourceError> {
        self.connection.print_log()
    }
}

impl Drop for RouterOsSession {
    fn drop(&mut self) {
        if let Err(e) = self.connection.quit() {
            log::debug!("Could not send /quit to {}: {}", self.address, e);
        }
        let _ = self.connection.stream.shutdown(Shutdown::Both);
        log::debug!("Disconnected from {}", self.address);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    /// Replays canned router output and records what the client sent
    struct ScriptedStream {
        input: Cursor<Vec<u8>>,
        output: Vec<u8>,
    }

    impl ScriptedStream {
        fn new(sentences: &[&[&str]]) -> Self {
            let mut input = Vec::new();
            for sentence in sentences {
                for word in sentence.iter() {
                    input.extend(encode_length(word.len()));
                    input.extend_from_slice(word.as_bytes());
                }
                input.push(0);
            }
            ScriptedStream {
                input: Cursor::new(input),
                output: Vec::new(),
            }
        }
    }

    impl Read for ScriptedStream {
        fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            self.input.read(buf)
        }
    }

    impl Write for ScriptedStream {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.output.write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn sent_sentences(output: &[u8]) -> Vec<Vec<String>> {
        let mut conn = ApiConnection::new(ScriptedStream {
            input: Cursor::new(output.to_vec()),
            output: Vec::new(),
        });
        let mut sentences = Vec::new();
        while (conn.stream.input.position() as usize) < output.len() {
            sentences.push(conn.read_sentence().unwrap());
        }
        sentences
    }

    #[test]
    fn test_length_prefix_boundaries() {
        assert_eq!(encode_length(0), vec![0x00]);
        assert_eq!(encode_length(0x7F), vec![0x7F]);
        assert_eq!(encode_length(0x80), vec![0x80, 0x80]);
        assert_eq!(encode_length(0x3FFF), vec![0xBF, 0xFF]);
        assert_eq!(encode_length(0x4000), vec![0xC0, 0x40, 0x00]);
        assert_eq!(encode_length(0x20_0000), vec![0xE0, 0x20, 0x00, 0x00]);
        assert_eq!(encode_length(0x1000_0000), vec![0xF0, 0x10, 0x00, 0x00, 0x00]);

        for len in [0usize, 0x7F, 0x80, 0x3FFF, 0x4000, 0x1F_FFFF, 0x20_0000, 0x0FFF_FFFF, 0x1000_0000] {
            let encoded = encode_length(len);
            assert_eq!(decode_length(&mut Cursor::new(encoded)).unwrap(), len);
        }
    }

    #[test]
    fn test_reserved_prefix_rejected() {
        assert!(decode_length(&mut Cursor::new(vec![0xF8])).is_err());
    }

    #[test]
    fn test_attribute_values_may_contain_equals() {
        assert_eq!(parse_attribute("=message=a=b"), Some(("message", "a=b")));
        assert_eq!(parse_attribute("!re"), None);
    }

    #[test]
    fn test_login_and_print_log() {
        let stream = ScriptedStream::new(&[
            &["!done"],
            &[
                "!re",
                "=.id=*1",
                "=time=jan/02 10:00:00",
                "=topics=system,error,critical",
                "=message=login failure for user admin from 10.0.0.5 via ssh",
            ],
            &["!re", "=.id=*2", "=time=10:00:01", "=topics=system,info", "=message=dhcp lease"],
            &["!done"],
        ]);

        let mut conn = ApiConnection::new(stream);
        conn.login("admin", "secret").unwrap();
        let entries = conn.print_log().unwrap();

        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].timestamp, "jan/02 10:00:00");
        assert_eq!(entries[0].topics, vec!["system", "error", "critical"]);
        assert_eq!(entries[0].message, "login failure for user admin from 10.0.0.5 via ssh");
        assert_eq!(entries[1].message, "dhcp lease");

        let sent = sent_sentences(&conn.into_inner().output);
        assert_eq!(sent[0], vec!["/login", "=name=admin", "=password=secret"]);
        assert_eq!(sent[1], vec!["/log/print"]);
    }

    #[test]
    fn test_empty_log_buffer() {
        let stream = ScriptedStream::new(&[&["!empty"], &["!done"]]);
        let mut conn = ApiConnection::new(stream);
        assert_eq!(conn.print_log().unwrap(), Vec::new());
    }

    #[test]
    fn test_login_trap_is_login_error() {
        let stream = ScriptedStream::new(&[
            &["!trap", "=message=invalid user name or password (6)"],
            &["!done"],
        ]);

        let mut conn = ApiConnection::new(stream);
        match conn.login("admin", "wrong") {
            Err(SourceError::Login(message)) => assert!(message.contains("invalid user name")),
            other => panic!("expected login error, got {:?}", other),
        }
    }

    #[test]
    fn test_challenge_login_rejected() {
        let stream = ScriptedStream::new(&[&["!done", "=ret=ebddd18775b1a5a2a5ab2e1a0a4f5e33"]]);

        let mut conn = ApiConnection::new(stream);
        assert!(matches!(conn.login("admin", "pw"), Err(SourceError::Login(_))));
    }

    #[test]
    fn test_trap_waits_for_done() {
        let stream = ScriptedStream::new(&[
            &["!trap", "=message=no such command"],
            &["!done"],
            &["!re", "=time=10:00:00", "=message=failed"],
            &["!done"],
        ]);

        let mut conn = ApiConnection::new(stream);
        assert!(matches!(conn.print_log(), Err(SourceError::Trap(_))));
        // Still in step for the next command
        assert_eq!(conn.print_log().unwrap().len(), 1);
    }

    #[test]
    fn test_fatal_aborts() {
        let stream = ScriptedStream::new(&[&["!fatal", "session terminated on request"]]);

        let mut conn = ApiConnection::new(stream);
        assert!(matches!(conn.print_log(), Err(SourceError::Trap(_))));
    }

    #[test]
    fn test_truncated_stream_is_io_error() {
        let mut input = encode_length(10);
        input.extend_from_slice(b"!re");

        let mut conn = ApiConnection::new(ScriptedStream {
            input: Cursor::new(input),
            output: Vec::new(),
        });
        assert!(matches!(conn.read_sentence(), Err(SourceError::Io(_))));
    }

    #[test]
    fn test_quit_sends_command() {
        let mut conn = ApiConnection::new(ScriptedStream::new(&[]));
        conn.quit().unwrap();
        let sent = sent_sentences(&conn.into_inner().output);
        assert_eq!(sent, vec![vec!["/quit".to_string()]]);
    }

    #[test]
    fn test_connect_refused_is_connect_error() {
        // Bind then drop to find a port nothing listens on
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let config = RouterConfig {
            host: "127.0.0.1".to_string(),
            port,
            timeout_seconds: Some(2),
            ..RouterConfig::default()
        };

        assert!(matches!(
            RouterOsSession::connect(&config),
            Err(SourceError::Connect { .. })
        ));
    }
}
