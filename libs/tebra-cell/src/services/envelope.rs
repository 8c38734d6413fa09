use std::io::Cursor;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};

use crate::error::TebraError;
use crate::models::TebraCredentials;

pub const SOAP_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const KAREO_NS: &str = "http://www.kareo.com/api/schemas/";

/// One outbound operation: `kar:{action}/kar:request/kar:{section}` holding
/// `fields` in order. Absent optional values are simply not pushed.
#[derive(Debug, Clone)]
pub struct SoapRequest {
    pub action: &'static str,
    pub section: &'static str,
    pub fields: Vec<(&'static str, String)>,
}

impl SoapRequest {
    pub fn new(action: &'static str, section: &'static str) -> Self {
        Self {
            action,
            section,
            fields: Vec::new(),
        }
    }

    pub fn field(mut self, name: &'static str, value: impl Into<String>) -> Self {
        self.fields.push((name, value.into()));
        self
    }

    pub fn optional_field(self, name: &'static str, value: Option<impl Into<String>>) -> Self {
        match value {
            Some(value) => self.field(name, value),
            None => self,
        }
    }

    pub fn soap_action(&self) -> String {
        format!("{}{}", KAREO_NS, self.action)
    }
}

/// Serialises a request envelope. Every value goes through the XML writer's
/// text escaping.
pub fn build_envelope(credentials: &TebraCredentials, request: &SoapRequest) -> Result<String, TebraError> {
    let mut writer = Writer::new(Cursor::new(Vec::new()));

    write(&mut writer, Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;

    let mut envelope = BytesStart::new("soap:Envelope");
    envelope.push_attribute(("xmlns:soap", SOAP_NS));
    envelope.push_attribute(("xmlns:kar", KAREO_NS));
    write(&mut writer, Event::Start(envelope))?;
    write(&mut writer, Event::Empty(BytesStart::new("soap:Header")))?;
    start(&mut writer, "soap:Body")?;

    let action = format!("kar:{}", request.action);
    start(&mut writer, &action)?;
    start(&mut writer, "kar:request")?;

    start(&mut writer, "kar:RequestHeader")?;
    text_element(&mut writer, "kar:CustomerKey", &credentials.customer_key)?;
    text_element(&mut writer, "kar:User", &credentials.username)?;
    text_element(&mut writer, "kar:Password", &credentials.password)?;
    end(&mut writer, "kar:RequestHeader")?;

    let section = format!("kar:{}", request.section);
    start(&mut writer, &section)?;
    for (name, value) in &request.fields {
        text_element(&mut writer, &format!("kar:{}", name), value)?;
    }
    end(&mut writer, &section)?;

    end(&mut writer, "kar:request")?;
    end(&mut writer, &action)?;
    end(&mut writer, "soap:Body")?;
    end(&mut writer, "soap:Envelope")?;

    String::from_utf8(writer.into_inner().into_inner())
        .map_err(|e| TebraError::Encoding(format!("Envelope is not UTF-8: {}", e)))
}

fn write<'a, W: std::io::Write>(writer: &mut Writer<W>, event: Event<'a>) -> Result<(), TebraError> {
    writer
        .write_event(event)
        .map_err(|e| TebraError::Encoding(e.to_string()))
}

fn start<W: std::io::Write>(writer: &mut Writer<W>, name: &str) -> Result<(), TebraError> {
    write(writer, Event::Start(BytesStart::new(name)))
}

fn end<W: std::io::Write>(writer: &mut Writer<W>, name: &str) -> Result<(), TebraError> {
    write(writer, Event::End(BytesEnd::new(name)))
}

fn text_element<W: std::io::Write>(writer: &mut Writer<W>, name: &str, value: &str) -> Result<(), TebraError> {
    start(writer, name)?;
    write(writer, Event::Text(BytesText::new(value)))?;
    end(writer, name)
}

// ==============================================================================
// RESPONSE TREE
// ==============================================================================

/// Namespace-stripped element tree of a response document.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct XmlNode {
    pub name: String,
    pub text: String,
    pub children: Vec<XmlNode>,
}

impl XmlNode {
    fn named(name: String) -> Self {
        Self {
            name,
            ..Self::default()
        }
    }

    pub fn child(&self, name: &str) -> Option<&XmlNode> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn path(&self, names: &[&str]) -> Option<&XmlNode> {
        names.iter().try_fold(self, |node, name| node.child(name))
    }

    /// Trimmed, non-empty text of a direct child.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.child(name)
            .map(|c| c.text.trim())
            .filter(|t| !t.is_empty())
    }

    /// First present field among `names`.
    pub fn first_field(&self, names: &[&str]) -> Option<&str> {
        names.iter().find_map(|name| self.field(name))
    }
}

pub fn parse_document(xml: &str) -> Result<XmlNode, TebraError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<XmlNode> = Vec::new();
    let mut root: Option<XmlNode> = None;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) => {
                stack.push(XmlNode::named(local_name(e.local_name().as_ref())));
            }
            Ok(Event::Empty(e)) => {
                let node = XmlNode::named(local_name(e.local_name().as_ref()));
                attach(&mut stack, &mut root, node);
            }
            Ok(Event::Text(t)) => {
                let text = t
                    .unescape()
                    .map_err(|e| TebraError::MalformedResponse(format!("Bad text content: {}", e)))?;
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&text);
                }
            }
            Ok(Event::CData(c)) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                }
            }
            Ok(Event::End(_)) => {
                let node = stack
                    .pop()
                    .ok_or_else(|| TebraError::MalformedResponse("Unbalanced end tag".to_string()))?;
                attach(&mut stack, &mut root, node);
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(e) => {
                return Err(TebraError::MalformedResponse(format!(
                    "XML parse error at byte {}: {}",
                    reader.buffer_position(),
                    e
                )));
            }
        }
    }

    if !stack.is_empty() {
        return Err(TebraError::MalformedResponse("Unclosed element".to_string()));
    }

    root.ok_or_else(|| TebraError::MalformedResponse("Empty document".to_string()))
}

fn local_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).into_owned()
}

fn attach(stack: &mut [XmlNode], root: &mut Option<XmlNode>, node: XmlNode) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(node),
        None => {
            if root.is_none() {
                *root = Some(node);
            }
        }
    }
}

/// Unwraps `Envelope/Body/{action}Response/{action}Result`. A missing result is
/// `Ok(None)`; a SOAP fault is an error.
pub fn unwrap_result(xml: &str, action: &str) -> Result<Option<XmlNode>, TebraError> {
    let root = parse_document(xml)?;

    if root.name != "Envelope" {
        return Err(TebraError::MalformedResponse(format!(
            "Expected SOAP Envelope, found <{}>",
            root.name
        )));
    }

    let body = root
        .child("Body")
        .ok_or_else(|| TebraError::MalformedResponse("Envelope has no Body".to_string()))?;

    if let Some(fault) = body.child("Fault") {
        let message = fault
            .field("faultstring")
            .or_else(|| fault.path(&["Reason", "Text"]).map(|t| t.text.trim()))
            .filter(|m| !m.is_empty())
            .unwrap_or("SOAP fault");
        return Err(TebraError::Fault(message.to_string()));
    }

    let response_name = format!("{}Response", action);
    let result_name = format!("{}Result", action);

    Ok(body
        .child(&response_name)
        .and_then(|response| response.child(&result_name))
        .cloned())
}
