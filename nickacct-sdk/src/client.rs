//! IRC client connection.
//!
//! Manages the TCP (or TLS) connection, IRC registration and keepalive, and
//! turns server lines into [`Event`]s. Consumers send [`Command`]s back
//! through a [`ClientHandle`].
//!
//! ## Reconnection
//!
//! [`run_with_reconnect`] drives a synchronous event handler (typically an
//! [`EventBus`](crate::bus::EventBus)) across reconnects, with exponential
//! backoff (2→4→8→16→30s cap by default) and channel rejoin.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use rand::Rng;
use tokio::io::{AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_rustls::TlsConnector;
use tokio_rustls::rustls;

use crate::event::Event;
use crate::irc::{Message, Prefix};

/// Configuration for connecting to an IRC server.
#[derive(Debug, Clone)]
pub struct ConnectConfig {
    /// Server address (host:port).
    pub server_addr: String,
    /// Desired nickname.
    pub nick: String,
    /// Username (ident).
    pub user: String,
    /// Real name.
    pub realname: String,
    /// Use TLS.
    pub tls: bool,
    /// Skip TLS certificate verification (for self-signed certs).
    pub tls_insecure: bool,
}

impl Default for ConnectConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:6667".to_string(),
            nick: "acctbot".to_string(),
            user: "acctbot".to_string(),
            realname: "nick to account resolver".to_string(),
            tls: false,
            tls_insecure: false,
        }
    }
}

/// Commands the consumer can send to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Join(String),
    Privmsg { target: String, text: String },
    Raw(String),
    Quit(Option<String>),
}

impl Command {
    /// The wire form of this command, without CR-LF.
    pub fn to_line(&self) -> String {
        match self {
            Command::Join(channel) => Message::new("JOIN", vec![channel.clone()]).to_string(),
            Command::Privmsg { target, text } => {
                Message::new("PRIVMSG", vec![target.clone(), text.clone()]).to_string()
            }
            Command::Raw(line) => line.clone(),
            Command::Quit(Some(m)) => format!("QUIT :{m}"),
            Command::Quit(None) => "QUIT".to_string(),
        }
    }
}

/// A handle to a running IRC client connection.
#[derive(Clone)]
pub struct ClientHandle {
    cmd_tx: mpsc::Sender<Command>,
}

impl ClientHandle {
    pub async fn send(&self, command: Command) -> Result<()> {
        self.cmd_tx.send(command).await?;
        Ok(())
    }

    /// Send a batch of commands in order.
    pub async fn send_all(&self, commands: Vec<Command>) -> Result<()> {
        for command in commands {
            self.send(command).await?;
        }
        Ok(())
    }

    /// Join multiple channels at once.
    pub async fn join_many(&self, channels: &[String]) -> Result<()> {
        if channels.is_empty() {
            return Ok(());
        }
        // IRC allows comma-separated JOIN
        self.send(Command::Join(channels.join(","))).await
    }
}

/// A connection that has completed TCP (and optionally TLS) but hasn't
/// started IRC registration yet.
pub enum EstablishedConnection {
    Plain(TcpStream),
    Tls(Box<tokio_rustls::client::TlsStream<TcpStream>>),
}

/// Establish TCP (and optionally TLS) connection to the server.
pub async fn establish_connection(config: &ConnectConfig) -> Result<EstablishedConnection> {
    // Auto-detect TLS from port if not explicitly set
    let use_tls = config.tls || config.server_addr.ends_with(":6697");
    let mode = if use_tls { "TLS" } else { "plain" };

    tracing::debug!("Resolving {}...", config.server_addr);
    let tcp = TcpStream::connect(&config.server_addr)
        .await
        .map_err(|e| anyhow::anyhow!("TCP connect to {} failed: {e}", config.server_addr))?;
    tracing::debug!("TCP connected to {} ({mode})", config.server_addr);

    if !use_tls {
        return Ok(EstablishedConnection::Plain(tcp));
    }

    let tls_config = if config.tls_insecure {
        tracing::debug!("TLS: insecure mode (skipping cert verification)");
        rustls_insecure_config()
    } else {
        rustls_default_config()
    };
    let connector = TlsConnector::from(Arc::new(tls_config));
    let server_name = config
        .server_addr
        .rsplit_once(':')
        .map(|(host, _)| host)
        .unwrap_or(&config.server_addr);
    let dns_name = rustls::pki_types::ServerName::try_from(server_name.to_string())?;
    let tls_stream = connector
        .connect(dns_name, tcp)
        .await
        .map_err(|e| anyhow::anyhow!("TLS handshake with {} failed: {e}", config.server_addr))?;
    tracing::debug!("TLS handshake complete");
    Ok(EstablishedConnection::Tls(Box::new(tls_stream)))
}

/// Run the IRC protocol over an already-established connection.
///
/// Returns a handle for sending commands and a receiver for events.
/// The protocol runs in a spawned task. Every connection ends with exactly
/// one [`Event::Disconnected`], whatever closed it.
pub fn connect_with_stream(
    conn: EstablishedConnection,
    config: ConnectConfig,
) -> (ClientHandle, mpsc::Receiver<Event>) {
    let (event_tx, event_rx) = mpsc::channel(4096);
    let (cmd_tx, cmd_rx) = mpsc::channel(256);

    let handle = ClientHandle { cmd_tx };

    tokio::spawn(async move {
        let _ = event_tx.send(Event::Connected).await;
        let result = match conn {
            EstablishedConnection::Plain(tcp) => {
                let (reader, writer) = tokio::io::split(tcp);
                run_irc(BufReader::new(reader), writer, &config, event_tx.clone(), cmd_rx).await
            }
            EstablishedConnection::Tls(tls) => {
                let (reader, writer) = tokio::io::split(*tls);
                run_irc(BufReader::new(reader), writer, &config, event_tx.clone(), cmd_rx).await
            }
        };
        let reason = match result {
            Ok(reason) => reason,
            Err(e) => e.to_string(),
        };
        tracing::debug!(reason = %reason, "Connection closed");
        let _ = event_tx.send(Event::Disconnected { reason }).await;
    });

    (handle, event_rx)
}

fn install_crypto_provider() {
    #[cfg(feature = "ring")]
    {
        let _ = rustls::crypto::ring::default_provider().install_default();
    }
    #[cfg(all(feature = "aws-lc-rs", not(feature = "ring")))]
    {
        let _ = rustls::crypto::aws_lc_rs::default_provider().install_default();
    }
}

fn rustls_default_config() -> rustls::ClientConfig {
    install_crypto_provider();

    let root_store =
        rustls::RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    rustls::ClientConfig::builder()
        .with_root_certificates(root_store)
        .with_no_client_auth()
}

fn rustls_insecure_config() -> rustls::ClientConfig {
    install_crypto_provider();
    rustls::ClientConfig::builder()
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(InsecureVerifier))
        .with_no_client_auth()
}

#[derive(Debug)]
struct InsecureVerifier;

impl rustls::client::danger::ServerCertVerifier for InsecureVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &rustls::pki_types::CertificateDer<'_>,
        _intermediates: &[rustls::pki_types::CertificateDer<'_>],
        _server_name: &rustls::pki_types::ServerName<'_>,
        _ocsp_response: &[u8],
        _now: rustls::pki_types::UnixTime,
    ) -> Result<rustls::client::danger::ServerCertVerified, rustls::Error> {
        Ok(rustls::client::danger::ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &rustls::pki_types::CertificateDer<'_>,
        _dss: &rustls::DigitallySignedStruct,
    ) -> Result<rustls::client::danger::HandshakeSignatureValid, rustls::Error> {
        Ok(rustls::client::danger::HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<rustls::SignatureScheme> {
        rustls::crypto::CryptoProvider::get_default()
            .map(|p| p.signature_verification_algorithms.supported_schemes())
            .unwrap_or_default()
    }
}

/// Returns why the connection ended; I/O errors propagate instead.
async fn run_irc<R, W>(
    mut reader: R,
    mut writer: W,
    config: &ConnectConfig,
    event_tx: mpsc::Sender<Event>,
    mut cmd_rx: mpsc::Receiver<Command>,
) -> Result<String>
where
    R: tokio::io::AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    writer
        .write_all(format!("NICK {}\r\n", config.nick).as_bytes())
        .await?;
    writer
        .write_all(format!("USER {} 0 * :{}\r\n", config.user, config.realname).as_bytes())
        .await?;

    let mut registered = false;
    let mut nick_tries: u32 = 0;
    let mut pending_commands: Vec<Command> = Vec::new();
    let mut line_buf = String::new();
    let mut last_activity = tokio::time::Instant::now();
    let ping_interval = Duration::from_secs(60);
    let ping_timeout = Duration::from_secs(120);
    let mut next_ping = last_activity + ping_interval;

    loop {
        tokio::select! {
            result = reader.read_line(&mut line_buf) => {
                let n = result?;
                if n == 0 {
                    return Ok("EOF".to_string());
                }
                last_activity = tokio::time::Instant::now();
                next_ping = last_activity + ping_interval;

                let msg = match Message::parse(&line_buf) {
                    Ok(msg) => msg,
                    Err(e) => {
                        tracing::debug!(error = %e, line = %line_buf.trim_end(), "Skipping unparseable line");
                        line_buf.clear();
                        continue;
                    }
                };
                line_buf.clear();

                match msg.command.as_str() {
                    "PING" => {
                        let token = msg.params.first().map(|s| s.as_str()).unwrap_or("");
                        writer.write_all(format!("PONG :{token}\r\n").as_bytes()).await?;
                    }
                    // ERR_NICKNAMEINUSE before registration: try a variant of the configured nick
                    "433" if !registered => {
                        nick_tries = nick_tries.saturating_add(1);
                        if nick_tries <= 5 {
                            let alt = format!("{}{}", config.nick, nick_tries);
                            writer.write_all(format!("NICK {alt}\r\n").as_bytes()).await?;
                        } else {
                            return Ok("Nick in use".to_string());
                        }
                    }
                    "001" => {
                        registered = true;
                        if let Some(event) = translate(&msg) {
                            let _ = event_tx.send(event).await;
                        }
                        // Flush any commands that were queued before registration
                        for cmd in pending_commands.drain(..) {
                            execute_command(&mut writer, &cmd).await?;
                        }
                    }
                    _ => {
                        if let Some(event) = translate(&msg) {
                            let _ = event_tx.send(event).await;
                        }
                    }
                }
            }
            Some(cmd) = cmd_rx.recv() => {
                if registered || matches!(cmd, Command::Quit(_)) {
                    execute_command(&mut writer, &cmd).await?;
                    if !registered {
                        return Ok("Quit".to_string());
                    }
                } else {
                    // Queue until registered
                    pending_commands.push(cmd);
                }
            }
            // Periodic client-to-server PING and timeout detection
            _ = tokio::time::sleep_until(next_ping) => {
                if last_activity.elapsed() > ping_timeout {
                    return Ok("Ping timeout".to_string());
                }
                writer.write_all(b"PING :keepalive\r\n").await?;
                next_ping = tokio::time::Instant::now() + ping_interval;
            }
        }
    }
}

/// Map a server line to the event it represents, if any.
pub fn translate(msg: &Message) -> Option<Event> {
    let nick = || msg.source_nick().unwrap_or("").to_string();
    match msg.command.as_str() {
        "001" => Some(Event::Registered {
            nick: msg.params.first().cloned().unwrap_or_default(),
        }),
        "JOIN" => Some(Event::Joined {
            channel: msg.params.first().cloned()?,
            nick: nick(),
        }),
        "PART" => Some(Event::Parted {
            channel: msg.params.first().cloned()?,
            nick: nick(),
            reason: msg.params.get(1).cloned().unwrap_or_default(),
        }),
        "KICK" if msg.params.len() >= 2 => Some(Event::Kicked {
            channel: msg.params[0].clone(),
            nick: msg.params[1].clone(),
            by: msg.source_nick().unwrap_or("server").to_string(),
            reason: msg.params.get(2).cloned().unwrap_or_default(),
        }),
        "QUIT" => Some(Event::UserQuit {
            nick: nick(),
            reason: msg.params.first().cloned().unwrap_or_default(),
        }),
        "NICK" => {
            let old_nick = nick();
            let new_nick = msg.params.first().cloned().unwrap_or_default();
            (!old_nick.is_empty() && !new_nick.is_empty())
                .then_some(Event::NickChanged { old_nick, new_nick })
        }
        "PRIVMSG" if msg.params.len() >= 2 => Some(Event::Message {
            from: nick(),
            target: msg.params[0].clone(),
            text: msg.params[1].clone(),
            tags: msg.tags.clone(),
        }),
        "NOTICE" if msg.params.len() >= 2 => {
            let prefix = msg.prefix.as_deref().unwrap_or("");
            // Server NOTICE (no hostmask in prefix) → ServerNotice
            if prefix.is_empty() || !(prefix.contains('!') || prefix.contains('@')) {
                Some(Event::ServerNotice {
                    text: msg.params[1].clone(),
                })
            } else {
                Some(Event::Notice {
                    source: Prefix::parse(prefix),
                    target: msg.params[0].clone(),
                    text: msg.params[1].clone(),
                })
            }
        }
        "ERROR" => Some(Event::ServerNotice {
            text: msg.params.join(" "),
        }),
        command => {
            // Error numerics surface as ServerNotice; skip our nick (param[0])
            let num = command.parse::<u16>().ok()?;
            if (400..600).contains(&num) {
                let text = if msg.params.len() > 1 {
                    msg.params[1..].join(" ")
                } else {
                    msg.params.join(" ")
                };
                Some(Event::ServerNotice { text })
            } else {
                None
            }
        }
    }
}

/// Execute a single IRC command on the wire.
async fn execute_command<W: AsyncWrite + Unpin>(writer: &mut W, cmd: &Command) -> Result<()> {
    tracing::trace!(?cmd, "Sending");
    writer
        .write_all(format!("{}\r\n", cmd.to_line()).as_bytes())
        .await?;
    Ok(())
}

/// Reconnect policy for [`run_with_reconnect`].
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
    /// Channels to rejoin after reconnecting.
    pub channels: Vec<String>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(30),
            backoff_factor: 2.0,
            channels: Vec::new(),
        }
    }
}

impl ReconnectConfig {
    /// Next backoff delay after `delay`, with up to 25% jitter, capped at `max_delay`.
    pub fn next_delay(&self, delay: Duration) -> Duration {
        let jitter = rand_jitter(delay.as_millis() as u64 / 4);
        Duration::from_millis(
            ((delay.as_millis() as f64 * self.backoff_factor) as u64 + jitter)
                .min(self.max_delay.as_millis() as u64),
        )
    }
}

/// Run an event loop with automatic reconnection.
///
/// `handler` is called for each event and returns the commands to send in
/// response. When disconnected, the loop reconnects with exponential
/// backoff and rejoins configured channels once registered.
///
/// Runs until the process exits; connection failures are retried forever.
pub async fn run_with_reconnect<F>(
    config: ConnectConfig,
    reconnect_config: ReconnectConfig,
    mut handler: F,
) -> Result<()>
where
    F: FnMut(Event) -> Vec<Command>,
{
    let mut delay = reconnect_config.initial_delay;
    let mut consecutive_failures = 0u32;

    loop {
        let conn = match establish_connection(&config).await {
            Ok(c) => {
                consecutive_failures = 0;
                delay = reconnect_config.initial_delay;
                c
            }
            Err(e) => {
                consecutive_failures += 1;
                tracing::warn!(
                    error = %e,
                    attempt = consecutive_failures,
                    delay_secs = delay.as_secs(),
                    "Connection failed, retrying"
                );
                tokio::time::sleep(delay).await;
                delay = reconnect_config.next_delay(delay);
                continue;
            }
        };

        let (handle, mut events) = connect_with_stream(conn, config.clone());
        let mut saw_disconnect = false;

        while let Some(event) = events.recv().await {
            let registered = matches!(&event, Event::Registered { .. });
            let disconnected = matches!(&event, Event::Disconnected { .. });

            let commands = handler(event);
            if !disconnected {
                if let Err(e) = handle.send_all(commands).await {
                    tracing::error!(error = %e, "Failed to queue commands");
                }
            }
            // JOINs sent before registration are dropped by servers
            if registered {
                let _ = handle.join_many(&reconnect_config.channels).await;
            }
            if disconnected {
                saw_disconnect = true;
                break;
            }
        }
        // The connection task died without saying why
        if !saw_disconnect {
            handler(Event::Disconnected {
                reason: "connection closed".to_string(),
            });
        }

        tracing::info!(delay_secs = delay.as_secs(), "Disconnected, will reconnect");
        tokio::time::sleep(delay).await;
        delay = reconnect_config.next_delay(delay);
    }
}

fn rand_jitter(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    rand::thread_rng().gen_range(0..max)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(line: &str) -> Option<Event> {
        translate(&Message::parse(line).unwrap())
    }

    #[test]
    fn translate_presence_changes() {
        assert_eq!(
            event(":alice!a@h QUIT :Ping timeout"),
            Some(Event::UserQuit {
                nick: "alice".into(),
                reason: "Ping timeout".into()
            })
        );
        assert_eq!(
            event(":alice!a@h PART #chan"),
            Some(Event::Parted {
                channel: "#chan".into(),
                nick: "alice".into(),
                reason: String::new()
            })
        );
        assert_eq!(
            event(":op!o@h KICK #chan bob :spam"),
            Some(Event::Kicked {
                channel: "#chan".into(),
                nick: "bob".into(),
                by: "op".into(),
                reason: "spam".into()
            })
        );
        assert_eq!(
            event(":alice!a@h NICK :alice_"),
            Some(Event::NickChanged {
                old_nick: "alice".into(),
                new_nick: "alice_".into()
            })
        );
    }

    #[test]
    fn translate_service_notice_keeps_hostmask() {
        let ev = event(":NickServ!NickServ@services.example.net NOTICE acctbot :alice -> alice ACC 3");
        match ev {
            Some(Event::Notice { source, target, text }) => {
                assert_eq!(source.nick, "NickServ");
                assert_eq!(source.host.as_deref(), Some("services.example.net"));
                assert_eq!(target, "acctbot");
                assert_eq!(text, "alice -> alice ACC 3");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn translate_server_notice() {
        assert_eq!(
            event(":irc.example.net NOTICE * :*** Looking up your hostname"),
            Some(Event::ServerNotice {
                text: "*** Looking up your hostname".into()
            })
        );
    }

    #[test]
    fn translate_registration_and_errors() {
        assert_eq!(
            event(":irc.example.net 001 acctbot :Welcome"),
            Some(Event::Registered { nick: "acctbot".into() })
        );
        assert_eq!(
            event(":irc.example.net 401 acctbot ghost :No such nick"),
            Some(Event::ServerNotice {
                text: "ghost No such nick".into()
            })
        );
        assert_eq!(event(":irc.example.net 372 acctbot :- motd"), None);
    }

    #[test]
    fn command_wire_form() {
        let cmd = Command::Privmsg {
            target: "NickServ@services.example.net".into(),
            text: "ACC alice *".into(),
        };
        assert_eq!(cmd.to_line(), "PRIVMSG NickServ@services.example.net :ACC alice *");
        assert_eq!(Command::Join("#a,#b".into()).to_line(), "JOIN #a,#b");
        assert_eq!(Command::Quit(None).to_line(), "QUIT");
        assert_eq!(Command::Quit(Some("bye".into())).to_line(), "QUIT :bye");
    }

    #[test]
    fn backoff_is_capped() {
        let rc = ReconnectConfig::default();
        let mut delay = rc.initial_delay;
        for _ in 0..10 {
            delay = rc.next_delay(delay);
            assert!(delay <= rc.max_delay);
        }
        assert_eq!(delay, rc.max_delay);
    }

    #[tokio::test]
    async fn registration_then_commands_flush() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let (server_read, mut server_write) = tokio::io::split(server_io);
        let mut server_lines = BufReader::new(server_read).lines();

        let (event_tx, mut event_rx) = mpsc::channel(64);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let config = ConnectConfig::default();

        let task = tokio::spawn(async move {
            let (r, w) = tokio::io::split(client_io);
            run_irc(BufReader::new(r), w, &config, event_tx, cmd_rx).await
        });

        assert_eq!(server_lines.next_line().await.unwrap().unwrap(), "NICK acctbot");
        assert!(server_lines.next_line().await.unwrap().unwrap().starts_with("USER acctbot"));

        // Queued before registration
        cmd_tx.send(Command::Join("#chan".into())).await.unwrap();

        server_write
            .write_all(b":irc.example.net 001 acctbot :Welcome\r\n")
            .await
            .unwrap();

        assert_eq!(
            event_rx.recv().await,
            Some(Event::Registered { nick: "acctbot".into() })
        );
        assert_eq!(server_lines.next_line().await.unwrap().unwrap(), "JOIN #chan");

        server_write.write_all(b"PING :tok\r\n").await.unwrap();
        assert_eq!(server_lines.next_line().await.unwrap().unwrap(), "PONG :tok");

        drop(server_write);
        drop(server_lines);
        assert_eq!(task.await.unwrap().unwrap(), "EOF");
    }

    #[tokio::test(start_paused = true)]
    async fn keepalive_pings_once_per_interval_then_times_out() {
        let (client_io, server_io) = tokio::io::duplex(4096);
        let (server_read, _server_write) = tokio::io::split(server_io);
        let mut server_lines = BufReader::new(server_read).lines();

        let (event_tx, _event_rx) = mpsc::channel(64);
        let (_cmd_tx, cmd_rx) = mpsc::channel(16);
        let config = ConnectConfig::default();

        let task = tokio::spawn(async move {
            let (r, w) = tokio::io::split(client_io);
            run_irc(BufReader::new(r), w, &config, event_tx, cmd_rx).await
        });

        assert_eq!(server_lines.next_line().await.unwrap().unwrap(), "NICK acctbot");
        assert!(server_lines.next_line().await.unwrap().unwrap().starts_with("USER acctbot"));

        // Silent server: one PING after 60s, then nothing for another 30s
        assert_eq!(server_lines.next_line().await.unwrap().unwrap(), "PING :keepalive");
        let quiet = tokio::time::timeout(Duration::from_secs(30), server_lines.next_line()).await;
        assert!(quiet.is_err(), "keepalive repeated early: {quiet:?}");

        assert_eq!(server_lines.next_line().await.unwrap().unwrap(), "PING :keepalive");
        assert_eq!(task.await.unwrap().unwrap(), "Ping timeout");
    }

    #[tokio::test]
    async fn quit_before_registration_still_reports_disconnect() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let tcp = TcpStream::connect(addr).await.unwrap();
        let (server_io, _) = listener.accept().await.unwrap();
        let mut server_lines = BufReader::new(server_io).lines();

        let (handle, mut events) =
            connect_with_stream(EstablishedConnection::Plain(tcp), ConnectConfig::default());
        assert_eq!(events.recv().await, Some(Event::Connected));
        assert_eq!(server_lines.next_line().await.unwrap().unwrap(), "NICK acctbot");

        handle.send(Command::Quit(Some("bye".into()))).await.unwrap();
        assert_eq!(
            events.recv().await,
            Some(Event::Disconnected { reason: "Quit".into() })
        );
        assert!(server_lines.next_line().await.unwrap().unwrap().starts_with("USER acctbot"));
        assert_eq!(server_lines.next_line().await.unwrap().unwrap(), "QUIT :bye");
    }
}
