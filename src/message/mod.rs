//! Parsed, display-ready view of a stored mail record.
//!
//! A [`Message`] is derived from a [`MailRecord`] and never written back: it
//! parses the raw MIME text once (via `mailparse`), keeps the envelope headers
//! the inbox shows, and renders the body for a web view on demand.
//!
//! # Body rendering
//!
//! [`Message::content`] assembles the text first:
//!
//! - **Single-part**: the decoded body as-is, whatever its content type
//! - **Multipart**: top-level parts in order; a part carrying a filename is
//!   replaced by [`ATTACHMENT_PLACEHOLDER`], `text/plain` and `text/html`
//!   parts are kept and followed by a blank line, everything else is dropped
//!
//! and then runs it through [`render::render_body`] (escape, `<br />`, wrap).

pub mod render;
mod transport;

use crate::cache::MailRecord;
use mailparse::{MailHeaderMap, ParsedMail, parse_mail};

pub use transport::{MailboxListing, MessageTransportRecord};

/// Text emitted in place of every attachment part
pub const ATTACHMENT_PLACEHOLDER: &str =
    "\nSorry but the attachment has been stripped from this message!";

/// Body of a message, by shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Payload {
    Single(String),
    Parts(Vec<Part>),
}

/// One top-level part of a multipart message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Part {
    /// Lowercased MIME type, e.g. `text/plain`
    pub content_type: String,
    pub filename: Option<String>,
    /// Body with transfer encoding and charset decoded
    pub body: String,
}

impl Part {
    fn from_parsed(part: &ParsedMail<'_>) -> Self {
        let disposition = part.get_content_disposition();
        let filename = disposition
            .params
            .get("filename")
            .or_else(|| part.ctype.params.get("name"))
            .cloned();

        Self {
            content_type: part.ctype.mimetype.to_ascii_lowercase(),
            filename,
            body: body_text(part),
        }
    }

    pub fn is_attachment(&self) -> bool {
        self.filename.is_some()
    }

    pub fn is_displayable(&self) -> bool {
        matches!(self.content_type.as_str(), "text/plain" | "text/html")
    }
}

/// Parsed view of one [`MailRecord`].
#[derive(Debug, Clone)]
pub struct Message {
    id: i64,
    is_read: bool,
    sender: Option<String>,
    received_date: Option<String>,
    subject: Option<String>,
    payload: Payload,
}

impl Message {
    /// Parse a stored record.
    ///
    /// Never fails: text that cannot be parsed as MIME at all is treated as a
    /// header-less single-part body.
    pub fn new(record: &MailRecord) -> Self {
        let (sender, received_date, subject, payload) =
            match parse_mail(record.raw_message.as_bytes()) {
                Ok(parsed) => {
                    let payload = if parsed.subparts.is_empty() {
                        Payload::Single(body_text(&parsed))
                    } else {
                        Payload::Parts(parsed.subparts.iter().map(Part::from_parsed).collect())
                    };
                    (
                        parsed.headers.get_first_value("From"),
                        parsed.headers.get_first_value("Date"),
                        parsed.headers.get_first_value("Subject"),
                        payload,
                    )
                }
                Err(e) => {
                    log::warn!(
                        "message {} is not parseable MIME, showing raw text: {}",
                        record.message_id,
                        e
                    );
                    (None, None, None, Payload::Single(record.raw_message.clone()))
                }
            };

        Self {
            id: record.message_id,
            is_read: record.read_state,
            sender,
            received_date,
            subject,
            payload,
        }
    }

    pub fn id(&self) -> i64 {
        self.id
    }

    pub fn read_state(&self) -> bool {
        self.is_read
    }

    /// Raw `From` header value
    pub fn sender(&self) -> Option<&str> {
        self.sender.as_deref()
    }

    /// Raw `Date` header value
    pub fn received_date(&self) -> Option<&str> {
        self.received_date.as_deref()
    }

    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    pub fn payload(&self) -> &Payload {
        &self.payload
    }

    /// Body rendered for display: escaped, `<br />`-delimited, wrapped.
    ///
    /// Text is taken from the decoded body, not the raw payload: transfer
    /// encodings (base64, quoted-printable) are undone and the declared
    /// charset is converted to UTF-8 before rendering.
    pub fn content(&self) -> String {
        render::render_body(&assemble_text(self.id, &self.payload))
    }

    pub fn to_transport(&self) -> MessageTransportRecord {
        MessageTransportRecord {
            subject: self.subject.clone(),
            recieved_date: self.received_date.clone(),
            sender: self.sender.clone(),
            content: self.content(),
            msg_id: self.id,
            read_state: self.is_read,
        }
    }
}

impl From<&MailRecord> for Message {
    fn from(record: &MailRecord) -> Self {
        Self::new(record)
    }
}

/// Gather the displayable text of a payload before rendering.
fn assemble_text(id: i64, payload: &Payload) -> String {
    match payload {
        Payload::Single(body) => body.clone(),
        Payload::Parts(parts) => {
            let mut output = String::new();
            for part in parts {
                if part.is_attachment() {
                    log::debug!(
                        "stripping attachment {:?} from message {}",
                        part.filename,
                        id
                    );
                    output.push_str(ATTACHMENT_PLACEHOLDER);
                    continue;
                }
                if part.is_displayable() {
                    output.push_str(&part.body);
                    output.push_str("\n\n");
                }
            }
            output
        }
    }
}

/// Decoded body text, falling back to a lossy read of the raw bytes.
fn body_text(part: &ParsedMail<'_>) -> String {
    part.get_body()
        .or_else(|_| {
            part.get_body_raw()
                .map(|raw| String::from_utf8_lossy(&raw).into_owned())
        })
        .unwrap_or_default()
}
