use crate::{
    config::SmtpConfig,
    error::{ConfigError, Error, SendError},
    message::Envelope,
};
use lettre::{
    address::Envelope as SmtpEnvelope,
    transport::smtp::{
        authentication::{Credentials, Mechanism},
        client::{SmtpConnection, TlsParameters},
        extension::{ClientId, Extension},
    },
};
use std::time::Duration;
use tracing::{debug, error, info, warn};

pub const SMTP_PORT: u16 = 25;

/// `host[:port]`, port 25 when absent. IPv6 literals need brackets to carry a port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerAddress {
    host: String,
    port: u16,
}

impl ServerAddress {
    pub fn parse(server: &str) -> Self {
        let server = server.trim();
        let server = if server.is_empty() { "localhost" } else { server };
        if let Some((host, port)) = server.rsplit_once(':') {
            let bracketed = host.starts_with('[') && host.ends_with(']');
            if let (true, Ok(port)) = (bracketed || !host.contains(':'), port.parse::<u16>()) {
                return Self {
                    host: host.trim_start_matches('[').trim_end_matches(']').to_string(),
                    port,
                };
            }
        }
        Self {
            host: server.trim_start_matches('[').trim_end_matches(']').to_string(),
            port: SMTP_PORT,
        }
    }

    pub fn get_host(&self) -> &str {
        &self.host
    }

    pub fn get_port(&self) -> u16 {
        self.port
    }
}

/// One open SMTP session. Opening it already sent EHLO.
pub trait SmtpSession {
    fn supports_starttls(&self) -> bool;
    /// Upgrades to TLS and identifies again over the encrypted channel.
    fn starttls(&mut self) -> Result<(), SendError>;
    fn login(&mut self, credentials: &Credentials) -> Result<(), SendError>;
    fn send(&mut self, envelope: &SmtpEnvelope, message: &[u8]) -> Result<(), SendError>;
    fn quit(&mut self) -> Result<(), SendError>;
}

pub trait Connector: Send + Sync {
    type Session: SmtpSession;

    fn connect(&self, server: &ServerAddress) -> Result<Self::Session, SendError>;
}

pub struct LettreConnector {
    hello_name: ClientId,
    timeout: Option<Duration>,
}

impl LettreConnector {
    pub fn new(hello_name: Option<String>, timeout: Option<Duration>) -> Self {
        Self {
            hello_name: hello_name.map(ClientId::Domain).unwrap_or_default(),
            timeout,
        }
    }

    pub fn from_config(config: &SmtpConfig) -> Self {
        Self::new(
            config.hello_name.to_owned(),
            config.timeout_seconds.map(Duration::from_secs),
        )
    }
}

impl Connector for LettreConnector {
    type Session = LettreSession;

    fn connect(&self, server: &ServerAddress) -> Result<LettreSession, SendError> {
        let connection = SmtpConnection::connect(
            (server.get_host(), server.get_port()),
            self.timeout,
            &self.hello_name,
            None,
            None,
        )
        .map_err(|err| SendError::Connect(format!("{}:{}: {}", server.host, server.port, err)))?;
        Ok(LettreSession {
            connection,
            host: server.get_host().to_string(),
            hello_name: self.hello_name.to_owned(),
        })
    }
}

pub struct LettreSession {
    connection: SmtpConnection,
    host: String,
    hello_name: ClientId,
}

impl SmtpSession for LettreSession {
    fn supports_starttls(&self) -> bool {
        self.connection
            .server_info()
            .supports_feature(Extension::StartTls)
    }

    fn starttls(&mut self) -> Result<(), SendError> {
        let tls_parameters = TlsParameters::new(self.host.to_owned())?;
        self.connection
            .starttls(&tls_parameters, &self.hello_name)?;
        Ok(())
    }

    fn login(&mut self, credentials: &Credentials) -> Result<(), SendError> {
        let _ = self
            .connection
            .auth(&[Mechanism::Plain, Mechanism::Login], credentials)?;
        Ok(())
    }

    fn send(&mut self, envelope: &SmtpEnvelope, message: &[u8]) -> Result<(), SendError> {
        let _ = self.connection.send(envelope, message)?;
        Ok(())
    }

    fn quit(&mut self) -> Result<(), SendError> {
        match self.connection.quit() {
            Ok(_) => Ok(()),
            Err(err) => {
                self.connection.abort();
                Err(err.into())
            }
        }
    }
}

/// Session parameters after the test server override has been applied.
#[derive(Debug, Clone)]
struct SessionSettings {
    server: ServerAddress,
    starttls: bool,
    credentials: Option<(String, String)>,
}

impl SessionSettings {
    fn from_config(config: &SmtpConfig) -> Result<Self, ConfigError> {
        if let Some(test_server) = config.test_server.as_ref() {
            return Ok(Self {
                server: ServerAddress::parse(test_server),
                starttls: false,
                credentials: None,
            });
        }
        let credentials = match config.user.as_ref().filter(|user| !user.is_empty()) {
            Some(user) => match config.password.as_ref().filter(|password| !password.is_empty()) {
                Some(password) => Some((user.to_owned(), password.to_owned())),
                None => return Err(ConfigError::MissingSmtpPassword),
            },
            None => None,
        };
        Ok(Self {
            server: ServerAddress::parse(&config.server),
            starttls: config.starttls,
            credentials,
        })
    }
}

pub struct SmtpManager<C: Connector = LettreConnector> {
    connector: C,
    settings: SessionSettings,
}

impl SmtpManager<LettreConnector> {
    pub fn from_config(config: &SmtpConfig) -> Result<Self, Error> {
        Self::new(config, LettreConnector::from_config(config))
    }
}

impl<C: Connector> SmtpManager<C> {
    /// Fails with [`ConfigError::MissingSmtpPassword`] when a user is configured without a
    /// password, so no connection is ever attempted with half the credentials.
    pub fn new(config: &SmtpConfig, connector: C) -> Result<Self, Error> {
        Ok(Self {
            connector,
            settings: SessionSettings::from_config(config)?,
        })
    }

    pub fn get_server(&self) -> &ServerAddress {
        &self.settings.server
    }

    pub fn get_connector(&self) -> &C {
        &self.connector
    }

    /// Sends over a fresh session. QUIT goes out on every path once connected, and a
    /// failing QUIT never replaces the error that ended the conversation.
    pub fn send(&self, envelope: &Envelope) -> Result<(), Error> {
        let message = envelope.to_message()?;
        let formatted = message.formatted();
        #[cfg(feature = "debug-logging")]
        tracing::debug!("Outgoing message headers {:?}", message.headers());

        let mut session = self.connector.connect(&self.settings.server)?;
        let result = self.converse(&mut session, message.envelope(), &formatted);
        if let Err(err) = session.quit() {
            debug!("Closing SMTP session failed: {}", err);
        }
        match result {
            Ok(()) => {
                info!("Sent email to {}", envelope.get_recipient_email());
                Ok(())
            }
            Err(err) => {
                error!(
                    "Sending email to {} failed: {}",
                    envelope.get_recipient_email(),
                    err
                );
                Err(err.into())
            }
        }
    }

    fn converse(
        &self,
        session: &mut C::Session,
        envelope: &SmtpEnvelope,
        message: &[u8],
    ) -> Result<(), SendError> {
        if self.settings.starttls {
            if !session.supports_starttls() {
                warn!("{} does not advertise STARTTLS", self.settings.server.host);
                return Err(SendError::StartTlsUnsupported);
            }
            session.starttls()?;
            debug!("Upgraded SMTP session to TLS");
        }
        if let Some((user, password)) = self.settings.credentials.as_ref() {
            session.login(&Credentials::new(user.to_owned(), password.to_owned()))?;
            debug!("Authenticated as {}", user);
        }
        session.send(envelope, message)
    }
}

#[cfg(test)]
pub(crate) mod mock {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq, Eq)]
    pub enum Call {
        Connect(String, u16),
        StartTls,
        Login,
        Send {
            from: Option<String>,
            to: Vec<String>,
            message: String,
        },
        Quit,
    }

    /// Records every session call. Failures are scripted per step.
    #[derive(Clone, Default)]
    pub struct MockConnector {
        pub calls: Arc<Mutex<Vec<Call>>>,
        pub advertise_starttls: bool,
        pub refuse_connection: bool,
        pub reject_send: Option<String>,
        pub reject_login: Option<String>,
    }

    impl MockConnector {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().clone()
        }

        pub fn sent_messages(&self) -> Vec<String> {
            self.calls()
                .into_iter()
                .filter_map(|call| match call {
                    Call::Send { message, .. } => Some(message),
                    _ => None,
                })
                .collect()
        }
    }

    pub struct MockSession {
        connector: MockConnector,
    }

    impl MockSession {
        fn record(&self, call: Call) {
            self.connector.calls.lock().push(call);
        }
    }

    impl Connector for MockConnector {
        type Session = MockSession;

        fn connect(&self, server: &ServerAddress) -> Result<MockSession, SendError> {
            if self.refuse_connection {
                return Err(SendError::Connect("connection refused".to_string()));
            }
            self.calls
                .lock()
                .push(Call::Connect(server.get_host().to_string(), server.get_port()));
            Ok(MockSession {
                connector: self.clone(),
            })
        }
    }

    impl SmtpSession for MockSession {
        fn supports_starttls(&self) -> bool {
            self.connector.advertise_starttls
        }

        fn starttls(&mut self) -> Result<(), SendError> {
            self.record(Call::StartTls);
            Ok(())
        }

        fn login(&mut self, _credentials: &Credentials) -> Result<(), SendError> {
            self.record(Call::Login);
            match self.connector.reject_login.as_ref() {
                Some(reason) => Err(SendError::Protocol(reason.to_owned())),
                None => Ok(()),
            }
        }

        fn send(&mut self, envelope: &SmtpEnvelope, message: &[u8]) -> Result<(), SendError> {
            self.record(Call::Send {
                from: envelope.from().map(ToString::to_string),
                to: envelope.to().iter().map(ToString::to_string).collect(),
                message: String::from_utf8_lossy(message).into_owned(),
            });
            match self.connector.reject_send.as_ref() {
                Some(reason) => Err(SendError::Protocol(reason.to_owned())),
                None => Ok(()),
            }
        }

        fn quit(&mut self) -> Result<(), SendError> {
            self.record(Call::Quit);
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::{Call, MockConnector};
    use super::*;
    use crate::message::{build_envelope, Headers};
    use pretty_assertions::assert_eq;

    fn config() -> SmtpConfig {
        SmtpConfig {
            server: "test.local".to_string(),
            mail_from: "noreply@example.org".to_string(),
            ..SmtpConfig::default()
        }
    }

    fn envelope() -> Envelope {
        build_envelope(
            "A B",
            "a@b.com",
            "Example",
            "noreply@example.org",
            "Hi",
            "Hello",
            Headers::new(),
        )
    }

    #[test]
    fn server_address_parsing() {
        assert_eq!(ServerAddress::parse("test.local").get_port(), 25);
        assert_eq!(ServerAddress::parse("").get_host(), "localhost");
        let address = ServerAddress::parse("mail.example.org:587");
        assert_eq!((address.get_host(), address.get_port()), ("mail.example.org", 587));
        let address = ServerAddress::parse("[::1]:2525");
        assert_eq!((address.get_host(), address.get_port()), ("::1", 2525));
        let address = ServerAddress::parse("::1");
        assert_eq!((address.get_host(), address.get_port()), ("::1", 25));
    }

    #[test]
    fn plain_session_connects_sends_and_quits() {
        let connector = MockConnector::default();
        let manager = SmtpManager::new(&config(), connector.clone()).unwrap();
        manager.send(&envelope()).unwrap();

        let calls = connector.calls();
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], Call::Connect("test.local".to_string(), 25));
        match &calls[1] {
            Call::Send { from, to, message } => {
                assert_eq!(from.as_deref(), Some("noreply@example.org"));
                assert_eq!(to, &vec!["a@b.com".to_string()]);
                assert!(message.contains("Subject: Hi\r\n"));
                assert!(message.contains("To: \"A B\" <a@b.com>\r\n"));
                assert!(message.contains("\r\n\r\nHello"));
            }
            other => panic!("expected send, got {:?}", other),
        }
        assert_eq!(calls[2], Call::Quit);
    }

    #[test]
    fn starttls_and_login_run_before_send() {
        let connector = MockConnector {
            advertise_starttls: true,
            ..MockConnector::default()
        };
        let config = SmtpConfig {
            starttls: true,
            user: Some("mailer".to_string()),
            password: Some("secret".to_string()),
            ..config()
        };
        SmtpManager::new(&config, connector.clone())
            .unwrap()
            .send(&envelope())
            .unwrap();

        let calls = connector.calls();
        assert_eq!(calls[1], Call::StartTls);
        assert_eq!(calls[2], Call::Login);
        assert!(matches!(&calls[3], Call::Send { .. }));
        assert_eq!(calls.last(), Some(&Call::Quit));
    }

    #[test]
    fn starttls_unsupported_fails_and_still_quits() {
        let connector = MockConnector::default();
        let config = SmtpConfig {
            starttls: true,
            ..config()
        };
        let result = SmtpManager::new(&config, connector.clone())
            .unwrap()
            .send(&envelope());
        assert!(matches!(
            result,
            Err(Error::Send(SendError::StartTlsUnsupported))
        ));
        assert_eq!(
            connector.calls(),
            vec![Call::Connect("test.local".to_string(), 25), Call::Quit]
        );
    }

    #[test]
    fn user_without_password_fails_before_connecting() {
        let connector = MockConnector::default();
        let config = SmtpConfig {
            user: Some("mailer".to_string()),
            ..config()
        };
        let result = SmtpManager::new(&config, connector.clone());
        assert!(matches!(
            result,
            Err(Error::Config(ConfigError::MissingSmtpPassword))
        ));
        assert!(connector.calls().is_empty());
    }

    #[test]
    fn rejected_send_carries_the_diagnostic_and_quits() {
        let connector = MockConnector {
            reject_send: Some("550 mailbox unavailable".to_string()),
            ..MockConnector::default()
        };
        let result = SmtpManager::new(&config(), connector.clone())
            .unwrap()
            .send(&envelope());
        match result {
            Err(Error::Send(SendError::Protocol(diagnostic))) => {
                assert!(diagnostic.contains("550"))
            }
            other => panic!("expected protocol error, got {:?}", other),
        }
        assert_eq!(connector.calls().last(), Some(&Call::Quit));
    }

    #[test]
    fn rejected_login_skips_send_and_quits() {
        let connector = MockConnector {
            reject_login: Some("535 authentication failed".to_string()),
            ..MockConnector::default()
        };
        let config = SmtpConfig {
            user: Some("mailer".to_string()),
            password: Some("wrong".to_string()),
            ..config()
        };
        let result = SmtpManager::new(&config, connector.clone())
            .unwrap()
            .send(&envelope());
        assert!(matches!(result, Err(Error::Send(SendError::Protocol(_)))));
        assert!(connector.sent_messages().is_empty());
        assert_eq!(connector.calls().last(), Some(&Call::Quit));
    }

    #[test]
    fn refused_connection_is_a_send_error_without_quit() {
        let connector = MockConnector {
            refuse_connection: true,
            ..MockConnector::default()
        };
        let result = SmtpManager::new(&config(), connector.clone())
            .unwrap()
            .send(&envelope());
        assert!(matches!(result, Err(Error::Send(SendError::Connect(_)))));
        assert!(connector.calls().is_empty());
    }

    #[test]
    fn test_server_bypasses_starttls_and_login() {
        let connector = MockConnector::default();
        let config = SmtpConfig {
            starttls: true,
            user: Some("mailer".to_string()),
            test_server: Some("localhost:2525".to_string()),
            ..config()
        };
        SmtpManager::new(&config, connector.clone())
            .unwrap()
            .send(&envelope())
            .unwrap();
        let calls = connector.calls();
        assert_eq!(calls[0], Call::Connect("localhost".to_string(), 2525));
        assert!(matches!(&calls[1], Call::Send { .. }));
        assert_eq!(calls[2], Call::Quit);
    }

    #[test]
    fn invalid_recipient_never_connects() {
        let connector = MockConnector::default();
        let envelope = build_envelope(
            "A B",
            "nonsense",
            "Example",
            "noreply@example.org",
            "Hi",
            "Hello",
            Headers::new(),
        );
        let result = SmtpManager::new(&config(), connector.clone())
            .unwrap()
            .send(&envelope);
        assert!(matches!(
            result,
            Err(Error::Send(SendError::InvalidAddress(_)))
        ));
        assert!(connector.calls().is_empty());
    }
}
