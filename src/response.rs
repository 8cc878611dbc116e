//! Lock property bodies
//!
//! `LOCK` / `UNLOCK` responses carry a WebDAV property set describing the
//! lock the server currently holds:
//!
//! ```xml
//! <d:prop xmlns:d="DAV:" xmlns:nc="http://nextcloud.org/ns">
//!  <nc:lock>1</nc:lock>
//!  <nc:lock-owner-type>0</nc:lock-owner-type>
//!  <nc:lock-owner>john</nc:lock-owner>
//!  <nc:lock-owner-displayname>John Doe</nc:lock-owner-displayname>
//!  <nc:lock-owner-editor>john</nc:lock-owner-editor>
//!  <nc:lock-time>1650619678</nc:lock-time>
//!  <nc:lock-timeout>300</nc:lock-timeout>
//!  <nc:lock-token>files_lock/310997d7-...</nc:lock-token>
//! </d:prop>
//! ```
//!
//! Elements are matched by local name. A missing, empty or self-closing
//! `lock` element means there is no active lock.

use quick_xml::events::Event;
use quick_xml::Reader;
use thiserror::Error;

use crate::lock_state::{holder_label, LockOwnerType};

/// Why a body could not be used
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BodyError {
    #[error("response body is empty")]
    Empty,

    #[error("malformed lock properties: {0}")]
    Malformed(String),
}

/// Lock properties reported by the server
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LockProperties {
    pub lock_present: bool,
    pub owner_type: Option<LockOwnerType>,
    pub owner_id: Option<String>,
    pub owner_display_name: Option<String>,
    pub owner_editor_app: Option<String>,
    pub lock_time: Option<i64>,
    pub lock_timeout: Option<i64>,
    /// Opaque; only used to correlate log lines
    pub lock_token: Option<String>,
}

/// Owner of an existing lock, as reported in a rejection
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LockHolder {
    pub owner_id: String,
    pub display_name: String,
    pub editor_app: String,
    pub owner_type: LockOwnerType,
}

impl LockHolder {
    pub fn label(&self) -> String {
        holder_label(
            &self.display_name,
            &self.owner_id,
            &self.editor_app,
            self.owner_type,
        )
    }
}

impl LockProperties {
    /// Parse a property-set body
    pub fn parse(body: &str) -> Result<Self, BodyError> {
        if body.trim().is_empty() {
            return Err(BodyError::Empty);
        }

        let mut reader = Reader::from_str(body);
        reader.config_mut().trim_text(true);

        let mut props = LockProperties::default();
        let mut saw_element = false;
        let mut current: Option<String> = None;
        let mut text = String::new();

        loop {
            match reader.read_event() {
                Ok(Event::Start(e)) => {
                    saw_element = true;
                    current = Some(local_name(e.local_name().as_ref()));
                    text.clear();
                }
                Ok(Event::Empty(_)) => {
                    saw_element = true;
                    // Self-closing elements carry no value.
                    current = None;
                    text.clear();
                }
                Ok(Event::Text(t)) => {
                    let value = t
                        .unescape()
                        .map_err(|err| BodyError::Malformed(err.to_string()))?;
                    text.push_str(&value);
                }
                Ok(Event::CData(t)) => {
                    text.push_str(&String::from_utf8_lossy(&t));
                }
                Ok(Event::End(_)) => {
                    if let Some(name) = current.take() {
                        props.assign(&name, text.trim());
                    }
                    text.clear();
                }
                Ok(Event::Eof) => break,
                Ok(_) => {}
                Err(err) => {
                    return Err(BodyError::Malformed(format!(
                        "at byte {}: {}",
                        reader.buffer_position(),
                        err
                    )))
                }
            }
        }

        if !saw_element {
            return Err(BodyError::Malformed("no elements".to_string()));
        }

        Ok(props)
    }

    fn assign(&mut self, name: &str, value: &str) {
        match name {
            "lock" => self.lock_present = value == "1" || value.eq_ignore_ascii_case("true"),
            "lock-owner-type" => {
                self.owner_type = value.parse::<i64>().ok().map(LockOwnerType::from_wire)
            }
            "lock-owner" => self.owner_id = non_empty(value),
            "lock-owner-displayname" => self.owner_display_name = non_empty(value),
            "lock-owner-editor" => self.owner_editor_app = non_empty(value),
            "lock-time" => self.lock_time = value.parse().ok(),
            "lock-timeout" => self.lock_timeout = value.parse().ok(),
            "lock-token" => self.lock_token = non_empty(value),
            _ => {}
        }
    }

    /// Owner described by the body, empty strings for missing fields
    pub fn holder(&self) -> LockHolder {
        LockHolder {
            owner_id: self.owner_id.clone().unwrap_or_default(),
            display_name: self.owner_display_name.clone().unwrap_or_default(),
            editor_app: self.owner_editor_app.clone().unwrap_or_default(),
            owner_type: self.owner_type.unwrap_or_default(),
        }
    }
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

fn non_empty(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LOCKED_BODY: &str = r#"<?xml version="1.0"?>
<d:prop xmlns:d="DAV:" xmlns:s="http://sabredav.org/ns" xmlns:oc="http://owncloud.org/ns" xmlns:nc="http://nextcloud.org/ns">
 <nc:lock>1</nc:lock>
 <nc:lock-owner-type>1</nc:lock-owner-type>
 <nc:lock-owner>john</nc:lock-owner>
 <nc:lock-owner-displayname>John Doe</nc:lock-owner-displayname>
 <nc:lock-owner-editor>Text</nc:lock-owner-editor>
 <nc:lock-time>1650619678</nc:lock-time>
 <nc:lock-timeout>300</nc:lock-timeout>
 <nc:lock-token>files_lock/310997d7-0aae-4e48-97e1-eeb6be6e2202</nc:lock-token>
</d:prop>
"#;

    #[test]
    fn parses_every_lock_field() {
        let props = LockProperties::parse(LOCKED_BODY).unwrap();
        assert!(props.lock_present);
        assert_eq!(props.owner_type, Some(LockOwnerType::Token));
        assert_eq!(props.owner_id.as_deref(), Some("john"));
        assert_eq!(props.owner_display_name.as_deref(), Some("John Doe"));
        assert_eq!(props.owner_editor_app.as_deref(), Some("Text"));
        assert_eq!(props.lock_time, Some(1650619678));
        assert_eq!(props.lock_timeout, Some(300));
        assert_eq!(
            props.lock_token.as_deref(),
            Some("files_lock/310997d7-0aae-4e48-97e1-eeb6be6e2202")
        );
        assert_eq!(props.holder().label(), "John Doe (Text)");
    }

    #[test]
    fn self_closing_lock_means_unlocked() {
        let body = r#"<d:prop xmlns:d="DAV:" xmlns:nc="http://nextcloud.org/ns">
 <nc:lock/>
 <nc:lock-owner>john</nc:lock-owner>
</d:prop>"#;
        let props = LockProperties::parse(body).unwrap();
        assert!(!props.lock_present);
        assert_eq!(props.owner_id.as_deref(), Some("john"));
    }

    #[test]
    fn missing_lock_element_means_unlocked() {
        let body = r#"<d:prop xmlns:d="DAV:"><d:getetag>"x"</d:getetag></d:prop>"#;
        let props = LockProperties::parse(body).unwrap();
        assert!(!props.lock_present);
    }

    #[test]
    fn zero_lock_value_means_unlocked() {
        let body = r#"<d:prop xmlns:d="DAV:" xmlns:nc="http://nextcloud.org/ns"><nc:lock>0</nc:lock></d:prop>"#;
        assert!(!LockProperties::parse(body).unwrap().lock_present);
    }

    #[test]
    fn empty_and_malformed_bodies_are_rejected() {
        assert_eq!(LockProperties::parse("  \n"), Err(BodyError::Empty));
        assert!(matches!(
            LockProperties::parse("<d:prop><nc:lock>1</d:prop>"),
            Err(BodyError::Malformed(_))
        ));
        assert!(matches!(
            LockProperties::parse("Internal Server Error"),
            Err(BodyError::Malformed(_))
        ));
    }

    #[test]
    fn unparseable_numbers_are_dropped() {
        let body = r#"<d:prop xmlns:nc="http://nextcloud.org/ns"><nc:lock>1</nc:lock><nc:lock-time>soon</nc:lock-time></d:prop>"#;
        let props = LockProperties::parse(body).unwrap();
        assert!(props.lock_present);
        assert_eq!(props.lock_time, None);
    }
}
