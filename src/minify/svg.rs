use anyhow::{Context, Result};
use xml::{
    attribute::OwnedAttribute,
    name::OwnedName,
    reader::{self, EventReader, ParserConfig},
    writer::EmitterConfig,
};

/// Drops comments, the XML declaration and whitespace between elements. The
/// element tree, attributes and text content are written back unchanged.
///
/// Whitespace-only text inside `<text>` elements, or anywhere under
/// `xml:space="preserve"`, separates rendered words and is kept.
pub fn minify(data: &[u8]) -> Result<Vec<u8>> {
    let parser_config = ParserConfig::new().ignore_comments(true);
    let reader = EventReader::new_with_config(data, parser_config);

    let mut output = Vec::new();
    let mut writer = EmitterConfig::new()
        .perform_indent(false)
        .write_document_declaration(false)
        .create_writer(&mut output);

    // One entry per open element: whether whitespace inside it is kept.
    let mut preserve: Vec<bool> = Vec::new();

    for event in reader {
        let event = event.context("could not parse SVG")?;

        match &event {
            reader::XmlEvent::StartDocument { .. } | reader::XmlEvent::Comment(_) => continue,
            reader::XmlEvent::Whitespace(_) if !preserve.last().copied().unwrap_or(false) => {
                continue
            }
            reader::XmlEvent::EndDocument => break,
            reader::XmlEvent::StartElement {
                name, attributes, ..
            } => {
                let inherited = preserve.last().copied().unwrap_or(false);
                preserve.push(inherited || keeps_whitespace(name, attributes));
            }
            reader::XmlEvent::EndElement { .. } => {
                preserve.pop();
            }
            _ => {}
        }

        if let Some(event) = event.as_writer_event() {
            writer.write(event).context("could not write SVG")?;
        }
    }

    Ok(output)
}

fn keeps_whitespace(name: &OwnedName, attributes: &[OwnedAttribute]) -> bool {
    name.local_name == "text"
        || attributes.iter().any(|attribute| {
            attribute.name.prefix.as_deref() == Some("xml")
                && attribute.name.local_name == "space"
                && attribute.value == "preserve"
        })
}
