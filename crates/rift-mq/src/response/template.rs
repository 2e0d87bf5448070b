//! Reply payload and header templating.
//!
//! # Supported Template Variables
//!
//! - `${message.body}` - The inbound body as text
//! - `${message.destination}` - Inbound destination name (scheme stripped)
//! - `${message.messageId}` - Inbound message id
//! - `${message.correlationId}` - Inbound correlation id
//! - `${message.properties.<name>}` - Inbound string property
//! - `${stub.id}` - Id of the matched stub
//! - `${stub.name}` - Name of the matched stub (falls back to the id)
//!
//! Unknown variables render as an empty string.
//!
//! # Example
//!
//! ```yaml
//! response:
//!   payload: '{"status": "ACCEPTED", "order": "${message.properties.orderId}"}'
//!   headers:
//!     X-Handled-By: '${stub.name}'
//! ```

use crate::broker::InboundMessage;
use crate::matcher::extract_destination_name;
use crate::stub::StubRecord;
use regex::Regex;
use std::collections::HashMap;
use std::sync::OnceLock;

static TEMPLATE_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_template_regex() -> &'static Regex {
    TEMPLATE_REGEX.get_or_init(|| {
        Regex::new(r"\$\{(message|stub)\.([a-zA-Z_][a-zA-Z0-9_]*)(?:\.([^}]+))?\}").unwrap()
    })
}

/// Values available to reply templates
#[derive(Debug, Clone, Default)]
pub struct TemplateContext {
    pub body: String,
    pub destination: String,
    pub message_id: Option<String>,
    pub correlation_id: Option<String>,
    pub properties: HashMap<String, String>,
    pub stub_id: String,
    pub stub_name: String,
}

impl TemplateContext {
    pub fn new(stub: &StubRecord, message: &InboundMessage, content: &str) -> Self {
        Self {
            body: content.to_string(),
            destination: extract_destination_name(&message.destination).to_string(),
            message_id: message.message_id.clone(),
            correlation_id: message.correlation_id.clone(),
            properties: message.properties.clone(),
            stub_id: stub.id.clone(),
            stub_name: stub.label().to_string(),
        }
    }

    /// Look up `scope.field[.name]`
    fn get(&self, scope: &str, field: &str, name: Option<&str>) -> Option<String> {
        match (scope, field, name) {
            ("message", "body", None) => Some(self.body.clone()),
            ("message", "destination", None) => Some(self.destination.clone()),
            ("message", "messageId", None) => self.message_id.clone(),
            ("message", "correlationId", None) => self.correlation_id.clone(),
            ("message", "properties", Some(name)) => self.properties.get(name).cloned(),
            ("stub", "id", None) => Some(self.stub_id.clone()),
            ("stub", "name", None) => Some(self.stub_name.clone()),
            _ => None,
        }
    }
}

/// Substitute `${message.*}` and `${stub.*}` variables
pub fn process_template(template: &str, context: &TemplateContext) -> String {
    if !has_template_variables(template) {
        return template.to_string();
    }
    get_template_regex()
        .replace_all(template, |caps: &regex::Captures| {
            let name = caps.get(3).map(|m| m.as_str());
            context.get(&caps[1], &caps[2], name).unwrap_or_default()
        })
        .to_string()
}

pub fn has_template_variables(s: &str) -> bool {
    get_template_regex().is_match(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::Destination;

    fn context() -> TemplateContext {
        let stub = StubRecord::new("stub-1", Destination::queue("ORDERS")).with_name("orders");
        let message = InboundMessage::new("queue://ORDERS", "hello")
            .with_message_id("ID:1")
            .with_correlation_id("corr-9")
            .with_property("orderId", "42")
            .with_property("x.dotted", "yes");
        TemplateContext::new(&stub, &message, "hello")
    }

    #[test]
    fn test_message_variables() {
        let ctx = context();
        assert_eq!(
            process_template("${message.body}@${message.destination}", &ctx),
            "hello@ORDERS"
        );
        assert_eq!(process_template("${message.messageId}", &ctx), "ID:1");
        assert_eq!(process_template("${message.correlationId}", &ctx), "corr-9");
    }

    #[test]
    fn test_property_variables() {
        let ctx = context();
        assert_eq!(
            process_template(r#"{"order": "${message.properties.orderId}"}"#, &ctx),
            r#"{"order": "42"}"#
        );
        assert_eq!(
            process_template("${message.properties.x.dotted}", &ctx),
            "yes"
        );
    }

    #[test]
    fn test_stub_variables() {
        let ctx = context();
        assert_eq!(process_template("${stub.id}/${stub.name}", &ctx), "stub-1/orders");
    }

    #[test]
    fn test_unknown_variables_render_empty() {
        let ctx = context();
        assert_eq!(process_template("[${message.properties.missing}]", &ctx), "[]");
        assert_eq!(process_template("[${stub.priority}]", &ctx), "[]");
    }

    #[test]
    fn test_no_variables() {
        let ctx = context();
        assert_eq!(process_template("ACK", &ctx), "ACK");
        assert_eq!(process_template("${other.thing}", &ctx), "${other.thing}");
    }

    #[test]
    fn test_has_template_variables() {
        assert!(has_template_variables("${message.body}"));
        assert!(has_template_variables("x ${stub.id} y"));
        assert!(!has_template_variables("${request.path}"));
        assert!(!has_template_variables("plain"));
    }
}
