use crate::error::SendError;
use lettre::message::header::{
    ContentTransferEncoding, ContentType, Header, HeaderName, HeaderValue,
};
use lettre::message::{Body, Mailbox};
use lettre::{Address, Message};
use std::collections::BTreeMap;
use std::error::Error as StdError;

/// Extra headers for a single message.
pub type Headers = BTreeMap<String, String>;

/// Headers the composer always sets itself; extra headers with these names are dropped.
const RESERVED_HEADERS: [&str; 8] = [
    "from",
    "to",
    "subject",
    "date",
    "x-mailer",
    "content-type",
    "content-transfer-encoding",
    "mime-version",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XMailer(String);

impl Default for XMailer {
    fn default() -> Self {
        Self(format!("{} {}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")))
    }
}

impl Header for XMailer {
    fn name() -> HeaderName {
        HeaderName::new_from_ascii_str("X-Mailer")
    }

    fn parse(s: &str) -> Result<Self, Box<dyn StdError + Send + Sync>> {
        Ok(Self(s.to_string()))
    }

    fn display(&self) -> HeaderValue {
        HeaderValue::new(Self::name(), self.0.to_owned())
    }
}

/// A composed email waiting for transmission. Nothing is validated until
/// [`Envelope::to_message`] runs.
#[derive(Debug, Clone)]
pub struct Envelope {
    recipient_name: String,
    recipient_email: String,
    sender_name: String,
    sender_address: String,
    subject: String,
    body: String,
    headers: Headers,
}

pub fn build_envelope(
    recipient_name: &str,
    recipient_email: &str,
    sender_name: &str,
    sender_address: &str,
    subject: &str,
    body: &str,
    headers: Headers,
) -> Envelope {
    Envelope {
        recipient_name: recipient_name.to_string(),
        recipient_email: recipient_email.to_string(),
        sender_name: sender_name.to_string(),
        sender_address: sender_address.to_string(),
        subject: subject.to_string(),
        body: body.to_string(),
        headers,
    }
}

fn mailbox(name: &str, email: &str) -> Result<Mailbox, SendError> {
    let address: Address = email
        .trim()
        .parse()
        .map_err(|err| SendError::InvalidAddress(format!("{email}: {err}")))?;
    let name = name.trim();
    Ok(Mailbox::new(
        (!name.is_empty()).then(|| name.to_string()),
        address,
    ))
}

impl Envelope {
    pub fn get_recipient_email(&self) -> &str {
        &self.recipient_email
    }

    pub fn get_subject(&self) -> &str {
        &self.subject
    }

    pub fn get_body(&self) -> &str {
        &self.body
    }

    pub fn get_headers(&self) -> &Headers {
        &self.headers
    }

    /// Builds the MIME message. Its SMTP envelope runs from the sender address to the
    /// single recipient. The body goes out 8bit, byte for byte as rendered.
    pub fn to_message(&self) -> Result<Message, SendError> {
        let body = Body::new_with_encoding(self.body.to_owned(), ContentTransferEncoding::EightBit)
            .map_err(|_| SendError::Compose("body has lines longer than 998 bytes".to_string()))?;
        let mut message = Message::builder()
            .from(mailbox(&self.sender_name, &self.sender_address)?)
            .to(mailbox(&self.recipient_name, &self.recipient_email)?)
            .subject(self.subject.as_str())
            .date_now()
            .header(XMailer::default())
            .header(ContentType::TEXT_PLAIN)
            .body(body)
            .map_err(|err| SendError::Compose(err.to_string()))?;
        for (name, value) in self.headers.iter() {
            if RESERVED_HEADERS.contains(&name.to_ascii_lowercase().as_str()) {
                continue;
            }
            let header_name = HeaderName::new_from_ascii(name.to_owned())
                .map_err(|err| SendError::Compose(format!("{name}: {err}")))?;
            message
                .headers_mut()
                .insert_raw(HeaderValue::new(header_name, value.to_owned()));
        }
        Ok(message)
    }
}
