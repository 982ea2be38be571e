//! MIME decoding of one incoming advisory message.

use crate::error::PipelineError;
use mailparse::{DispositionType, MailHeaderMap, ParsedMail};

/// Header fields and decoded text of one message. Built once, never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RawEmail {
    pub subject: String,
    pub from: String,
    /// RFC 822 date as sent; may be malformed.
    pub date: String,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct MessageHeaders {
    pub subject: String,
    pub from: String,
    pub date: String,
}

/// A parsed message whose body has not been decoded yet, so callers can
/// screen on headers first.
pub struct DecodedMessage<'a> {
    parsed: ParsedMail<'a>,
    pub headers: MessageHeaders,
}

pub struct MessageDecoder;

impl MessageDecoder {
    pub fn parse(raw: &[u8]) -> Result<DecodedMessage<'_>, PipelineError> {
        let parsed = mailparse::parse_mail(raw).map_err(|e| PipelineError::EmptyBody {
            reason: format!("Failed to parse message: {e}"),
        })?;

        let header = |name: &str| {
            parsed
                .headers
                .get_first_value(name)
                .unwrap_or_default()
                .replace(['\r', '\n'], "")
        };
        let headers = MessageHeaders {
            subject: header("Subject").trim().to_string(),
            from: header("From").trim().to_string(),
            date: header("Date").trim().to_string(),
        };
        log::debug!(
            "Parsed message '{}' from '{}' ({} MIME parts)",
            headers.subject,
            headers.from,
            parsed.subparts.len()
        );

        Ok(DecodedMessage { parsed, headers })
    }

    pub fn decode(raw: &[u8]) -> Result<RawEmail, PipelineError> {
        Self::parse(raw)?.into_raw_email()
    }
}

impl<'a> DecodedMessage<'a> {
    /// First non-attachment `text/plain` part of a multipart message, or the sole payload.
    pub fn body(&self) -> Result<String, PipelineError> {
        let body = if self.parsed.subparts.is_empty() {
            decode_part(&self.parsed)
        } else {
            let part = find_text_part(&self.parsed).ok_or_else(|| PipelineError::EmptyBody {
                reason: "no text/plain part in multipart message".to_string(),
            })?;
            decode_part(part)
        };

        if body.trim().is_empty() {
            return Err(PipelineError::EmptyBody {
                reason: "message body is empty".to_string(),
            });
        }
        Ok(body)
    }

    pub fn into_raw_email(self) -> Result<RawEmail, PipelineError> {
        let body = self.body()?;
        let MessageHeaders {
            subject,
            from,
            date,
        } = self.headers;
        Ok(RawEmail {
            subject,
            from,
            date,
            body,
        })
    }
}

fn is_attachment(part: &ParsedMail) -> bool {
    let disposition = part.get_content_disposition();
    disposition.disposition == DispositionType::Attachment
        || disposition.params.contains_key("filename")
        || part.ctype.params.contains_key("name")
}

fn find_text_part<'p, 'a>(part: &'p ParsedMail<'a>) -> Option<&'p ParsedMail<'a>> {
    if part.subparts.is_empty() {
        return (part.ctype.mimetype.eq_ignore_ascii_case("text/plain") && !is_attachment(part))
            .then_some(part);
    }
    part.subparts.iter().find_map(find_text_part)
}

// Invalid byte sequences are replaced rather than rejected.
fn decode_part(part: &ParsedMail) -> String {
    match part.get_body() {
        Ok(body) => body,
        Err(e) => {
            log::warn!("Failed to decode {} part, using raw bytes: {}", part.ctype.mimetype, e);
            part.get_body_raw()
                .map(|raw| String::from_utf8_lossy(&raw).into_owned())
                .unwrap_or_default()
        }
    }
}
