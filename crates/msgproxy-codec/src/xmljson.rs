//! Root-preserving XML ⇄ JSON document conversion.
//!
//! Mapping: element name → object key, attributes → `@`-prefixed keys,
//! text-only element → string, mixed-content text → `#text`, repeated
//! sibling names → array, empty element → null. Text stays a string in
//! both directions; no number sniffing.

use bytes::Bytes;
use quick_xml::events::{BytesEnd, BytesStart, BytesText, Event};
use quick_xml::{Reader, Writer};
use serde_json::{Map, Value};

use msgproxy_core::{Result, StageError};

use crate::adapter::Encoder;

/// Parses an XML document and serialises it as JSON.
#[derive(Debug, Default)]
pub struct XmlToJson;

impl Encoder for XmlToJson {
    fn encode(&mut self, message: Bytes) -> Result<Bytes> {
        let (name, value) = parse_document(&message)?;
        let mut root = Map::new();
        root.insert(name, value);
        let json = serde_json::to_vec(&Value::Object(root))
            .map_err(|err| StageError::invalid_data(format!("json serialize: {err}")))?;
        Ok(Bytes::from(json))
    }
}

/// Parses a JSON document with a single root key and serialises it as XML.
#[derive(Debug, Default)]
pub struct JsonToXml;

impl Encoder for JsonToXml {
    fn encode(&mut self, message: Bytes) -> Result<Bytes> {
        let document: Value = serde_json::from_slice(&message)
            .map_err(|err| StageError::invalid_data(format!("json parse: {err}")))?;
        let root = match &document {
            Value::Object(map) if map.len() == 1 => map.iter().next().expect("len checked"),
            _ => {
                return Err(StageError::invalid_data(
                    "json document must be an object with exactly one root key",
                ))
            }
        };
        if matches!(root.1, Value::Array(_)) {
            return Err(StageError::invalid_data(
                "an array cannot be an xml root element",
            ));
        }

        let mut writer = Writer::new(Vec::new());
        write_element(&mut writer, root.0, root.1)?;
        Ok(Bytes::from(writer.into_inner()))
    }
}

/// One partially-built element while walking the XML event stream.
struct Frame {
    name: String,
    attrs: Map<String, Value>,
    children: Vec<(String, Value)>,
    text: String,
}

impl Frame {
    fn new(name: String, attrs: Map<String, Value>) -> Self {
        Self {
            name,
            attrs,
            children: Vec::new(),
            text: String::new(),
        }
    }

    fn into_value(self) -> (String, Value) {
        if self.attrs.is_empty() && self.children.is_empty() {
            let value = if self.text.is_empty() {
                Value::Null
            } else {
                Value::String(self.text)
            };
            return (self.name, value);
        }

        let mut object = self.attrs;
        for (name, value) in self.children {
            match object.get_mut(&name) {
                Some(Value::Array(items)) => items.push(value),
                Some(existing) => {
                    let first = existing.take();
                    *existing = Value::Array(vec![first, value]);
                }
                None => {
                    object.insert(name, value);
                }
            }
        }
        if !self.text.is_empty() {
            object.insert("#text".to_string(), Value::String(self.text));
        }
        (self.name, Value::Object(object))
    }
}

fn parse_document(input: &[u8]) -> Result<(String, Value)> {
    let mut reader = Reader::from_reader(input);
    reader.trim_text(true);

    let mut buf = Vec::new();
    let mut stack: Vec<Frame> = Vec::new();
    let mut root: Option<(String, Value)> = None;

    loop {
        match reader.read_event_into(&mut buf).map_err(xml_err)? {
            Event::Start(start) => {
                let frame = Frame::new(element_name(&start)?, element_attrs(&start)?);
                stack.push(frame);
            }
            Event::Empty(start) => {
                let frame = Frame::new(element_name(&start)?, element_attrs(&start)?);
                attach(&mut stack, &mut root, frame.into_value())?;
            }
            Event::Text(text) => {
                if let Some(frame) = stack.last_mut() {
                    frame.text.push_str(&text.unescape().map_err(xml_err)?);
                }
            }
            Event::CData(cdata) => {
                if let Some(frame) = stack.last_mut() {
                    let raw = cdata.into_inner();
                    let text = std::str::from_utf8(&raw)
                        .map_err(|err| StageError::invalid_data(format!("cdata utf-8: {err}")))?;
                    frame.text.push_str(text);
                }
            }
            Event::End(_) => {
                let frame = stack
                    .pop()
                    .ok_or_else(|| StageError::invalid_data("unbalanced closing tag"))?;
                attach(&mut stack, &mut root, frame.into_value())?;
            }
            Event::Eof => break,
            // Declarations, comments, processing instructions, doctypes.
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(StageError::invalid_data("unclosed xml element"));
    }
    root.ok_or_else(|| StageError::invalid_data("xml document has no root element"))
}

fn attach(
    stack: &mut [Frame],
    root: &mut Option<(String, Value)>,
    finished: (String, Value),
) -> Result<()> {
    if let Some(parent) = stack.last_mut() {
        parent.children.push(finished);
        return Ok(());
    }
    if root.is_some() {
        return Err(StageError::invalid_data(
            "xml document has more than one root element",
        ));
    }
    *root = Some(finished);
    Ok(())
}

fn element_name(start: &BytesStart<'_>) -> Result<String> {
    std::str::from_utf8(start.name().as_ref())
        .map(str::to_owned)
        .map_err(|err| StageError::invalid_data(format!("element name utf-8: {err}")))
}

fn element_attrs(start: &BytesStart<'_>) -> Result<Map<String, Value>> {
    let mut attrs = Map::new();
    for attr in start.attributes() {
        let attr = attr.map_err(xml_err)?;
        let key = std::str::from_utf8(attr.key.as_ref())
            .map_err(|err| StageError::invalid_data(format!("attribute name utf-8: {err}")))?;
        let value = attr.unescape_value().map_err(xml_err)?;
        attrs.insert(format!("@{key}"), Value::String(value.into_owned()));
    }
    Ok(attrs)
}

fn write_element<W: std::io::Write>(writer: &mut Writer<W>, name: &str, value: &Value) -> Result<()> {
    let mut start = BytesStart::new(name);
    let mut text: Option<String> = None;
    let mut children: Vec<(&String, &Value)> = Vec::new();

    match value {
        Value::Null => {
            return writer.write_event(Event::Empty(start)).map_err(xml_err);
        }
        Value::String(s) => text = Some(s.clone()),
        Value::Number(n) => text = Some(n.to_string()),
        Value::Bool(b) => text = Some(b.to_string()),
        Value::Object(map) => {
            for (key, child) in map {
                if let Some(attr) = key.strip_prefix('@') {
                    start.push_attribute((attr, scalar_text(child)?.as_str()));
                } else if key == "#text" {
                    text = Some(scalar_text(child)?);
                } else {
                    children.push((key, child));
                }
            }
        }
        Value::Array(_) => {
            return Err(StageError::invalid_data(
                "array values are only valid under an element key",
            ))
        }
    }

    if children.is_empty() && text.is_none() {
        return writer.write_event(Event::Empty(start)).map_err(xml_err);
    }

    writer.write_event(Event::Start(start)).map_err(xml_err)?;
    for (key, child) in children {
        match child {
            Value::Array(items) => {
                for item in items {
                    write_element(writer, key, item)?;
                }
            }
            other => write_element(writer, key, other)?,
        }
    }
    if let Some(text) = text {
        writer
            .write_event(Event::Text(BytesText::new(&text)))
            .map_err(xml_err)?;
    }
    writer
        .write_event(Event::End(BytesEnd::new(name)))
        .map_err(xml_err)
}

fn scalar_text(value: &Value) -> Result<String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        other => Err(StageError::invalid_data(format!(
            "expected scalar text value, got {other}"
        ))),
    }
}

fn xml_err(err: impl std::fmt::Display) -> StageError {
    StageError::invalid_data(format!("xml: {err}"))
}
