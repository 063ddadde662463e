//! Thin layer over quick-xml: an indenting writer and a small element tree.

use crate::error::{DeckError, xml_error};
use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use std::collections::BTreeMap;

pub(crate) struct XmlWriter {
    inner: Writer<Vec<u8>>,
}

impl XmlWriter {
    pub fn new() -> Result<Self, DeckError> {
        let mut inner = Writer::new_with_indent(Vec::new(), b' ', 2);
        inner
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))
            .map_err(xml_error)?;
        Ok(Self { inner })
    }

    pub fn start(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), DeckError> {
        let elem = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.inner.write_event(Event::Start(elem)).map_err(xml_error)
    }

    pub fn end(&mut self, name: &str) -> Result<(), DeckError> {
        self.inner
            .write_event(Event::End(BytesEnd::new(name)))
            .map_err(xml_error)
    }

    pub fn empty(&mut self, name: &str, attrs: &[(&str, &str)]) -> Result<(), DeckError> {
        let elem = BytesStart::new(name).with_attributes(attrs.iter().copied());
        self.inner.write_event(Event::Empty(elem)).map_err(xml_error)
    }

    /// `<name>text</name>`
    pub fn text_element(&mut self, name: &str, text: &str) -> Result<(), DeckError> {
        self.start(name, &[])?;
        self.inner
            .write_event(Event::Text(BytesText::new(text)))
            .map_err(xml_error)?;
        self.end(name)
    }

    pub fn finish(self) -> Result<String, DeckError> {
        let mut bytes = self.inner.into_inner();
        bytes.push(b'\n');
        String::from_utf8(bytes).map_err(xml_error)
    }
}

/// A parsed element: attributes, concatenated text and children.
#[derive(Debug, Clone, Default)]
pub(crate) struct Element {
    pub name: String,
    pub attrs: BTreeMap<String, String>,
    pub text: String,
    pub children: Vec<Element>,
}

impl Element {
    pub fn attr(&self, key: &str) -> Option<&str> {
        self.attrs.get(key).map(String::as_str)
    }

    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn from_start(start: &BytesStart<'_>) -> Result<Self, DeckError> {
        let mut elem = Element {
            name: String::from_utf8_lossy(start.name().as_ref()).into_owned(),
            ..Default::default()
        };
        for attr in start.attributes() {
            let attr = attr.map_err(xml_error)?;
            let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
            let value = attr.unescape_value().map_err(xml_error)?.into_owned();
            elem.attrs.insert(key, value);
        }
        Ok(elem)
    }
}

/// Parse a document into its root element.
pub(crate) fn parse(text: &str) -> Result<Element, DeckError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Element> = Vec::new();
    let mut root = None;
    loop {
        match reader.read_event().map_err(xml_error)? {
            Event::Start(e) => stack.push(Element::from_start(&e)?),
            Event::Empty(e) => {
                let elem = Element::from_start(&e)?;
                attach(&mut stack, &mut root, elem);
            }
            Event::End(_) => {
                let elem = stack
                    .pop()
                    .ok_or_else(|| DeckError::Xml("unbalanced closing tag".into()))?;
                attach(&mut stack, &mut root, elem);
            }
            Event::Text(t) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&t.unescape().map_err(xml_error)?);
                }
            }
            Event::CData(c) => {
                if let Some(top) = stack.last_mut() {
                    top.text.push_str(&String::from_utf8_lossy(&c));
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }
    if !stack.is_empty() {
        return Err(DeckError::Xml("unexpected end of document".into()));
    }
    root.ok_or_else(|| DeckError::Xml("document has no root element".into()))
}

fn attach(stack: &mut [Element], root: &mut Option<Element>, elem: Element) {
    match stack.last_mut() {
        Some(parent) => parent.children.push(elem),
        None => *root = Some(elem),
    }
}
