//! Streaming reader for the table dump of an XML project
//!
//! An XML `.ism` file is a relational dump:
//!
//! ```xml
//! <msi>
//!   <table name="File">
//!     <col key="yes" def="s72">File</col>
//!     <col def="S255">ISBuildSourcePath</col>
//!     <row><td>app.exe</td><td>&lt;ISProjectFolder&gt;\bin\app.exe</td></row>
//!   </table>
//! </msi>
//! ```
//!
//! [`TableReader`] walks the document with quick-xml events and hands out
//! one [`Table`] at a time. A table yields its column declarations and rows
//! as [`TableEntry`] values in document order.

use crate::{IsmError, Result};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

/// One item inside a `<table>` element
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TableEntry {
    /// A `<col>` declaration; the text names the column role
    Column(String),
    /// A `<row>` with the text of each `<td>` cell, positional
    Row(Vec<String>),
}

/// Forward-only table reader over an XML stream
pub struct TableReader<R: BufRead> {
    reader: Reader<R>,
    buf: Vec<u8>,
    /// Elements still open inside the table last handed out
    open: usize,
}

impl TableReader<BufReader<File>> {
    /// Open a project file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::open(path)?;
        Ok(Self::from_reader(BufReader::new(file)))
    }
}

impl<R: BufRead> TableReader<R> {
    pub fn from_reader(inner: R) -> Self {
        Self {
            reader: Reader::from_reader(inner),
            buf: Vec::new(),
            open: 0,
        }
    }

    /// Advance to the next `<table>` element
    ///
    /// Whatever is left of the previous table is skipped first, so a table
    /// handle may be dropped before it is fully read.
    pub fn next_table(&mut self) -> Result<Option<Table<'_, R>>> {
        self.skip_open()?;

        loop {
            match self.read_event()? {
                Event::Start(e) if e.name().as_ref() == b"table" => {
                    let name = self.table_name(&e)?;
                    self.open = 1;
                    return Ok(Some(Table { name, reader: self }));
                }
                Event::Empty(e) if e.name().as_ref() == b"table" => {
                    let name = self.table_name(&e)?;
                    self.open = 0;
                    return Ok(Some(Table { name, reader: self }));
                }
                Event::Eof => return Ok(None),
                _ => {}
            }
        }
    }

    fn read_event(&mut self) -> Result<Event<'static>> {
        self.buf.clear();
        match self.reader.read_event_into(&mut self.buf) {
            Ok(event) => Ok(event.into_owned()),
            Err(err) => Err(IsmError::Xml {
                position: self.reader.buffer_position(),
                message: err.to_string(),
            }),
        }
    }

    fn xml_error(&self, err: impl std::fmt::Display) -> IsmError {
        IsmError::Xml {
            position: self.reader.buffer_position(),
            message: err.to_string(),
        }
    }

    fn unexpected_eof(&self) -> IsmError {
        self.xml_error("unexpected end of document inside <table>")
    }

    fn table_name(&self, start: &BytesStart) -> Result<String> {
        let attr = start
            .try_get_attribute("name")
            .map_err(|err| self.xml_error(err))?;

        match attr {
            Some(attr) => Ok(attr
                .unescape_value()
                .map_err(|err| self.xml_error(err))?
                .into_owned()),
            None => {
                log::warn!("<table> without a name attribute");
                Ok(String::new())
            }
        }
    }

    fn skip_open(&mut self) -> Result<()> {
        while self.open > 0 {
            match self.read_event()? {
                Event::Start(_) => self.open += 1,
                Event::End(_) => self.open -= 1,
                Event::Eof => return Err(self.unexpected_eof()),
                _ => {}
            }
        }
        Ok(())
    }

    fn push_text(&self, event: &Event<'static>, text: &mut String) -> Result<()> {
        match event {
            Event::Text(e) => text.push_str(&e.unescape().map_err(|err| self.xml_error(err))?),
            Event::CData(e) => text.push_str(&String::from_utf8_lossy(e)),
            _ => {}
        }
        Ok(())
    }

    /// Read the text of an element whose start tag was just consumed
    fn read_element_text(&mut self) -> Result<String> {
        let mut text = String::new();
        let mut depth = 1usize;

        while depth > 0 {
            let event = self.read_event()?;
            match event {
                Event::Start(_) => depth += 1,
                Event::End(_) => depth -= 1,
                Event::Text(_) | Event::CData(_) => self.push_text(&event, &mut text)?,
                Event::Eof => return Err(self.unexpected_eof()),
                _ => {}
            }
        }

        self.open -= 1;
        Ok(text)
    }

    /// Read the cells of a `<row>` whose start tag was just consumed
    fn read_row(&mut self) -> Result<Vec<String>> {
        let mut cells = Vec::new();
        let mut depth = 1usize;
        // Text of the open <td> and the depth it was opened at
        let mut cell: Option<(String, usize)> = None;

        while depth > 0 {
            let event = self.read_event()?;
            match event {
                Event::Start(ref e) => {
                    depth += 1;
                    if cell.is_none() && e.name().as_ref() == b"td" {
                        cell = Some((String::new(), depth));
                    }
                }
                Event::Empty(ref e) => {
                    if cell.is_none() && e.name().as_ref() == b"td" {
                        cells.push(String::new());
                    }
                }
                Event::End(_) => {
                    if let Some((text, opened_at)) = cell.take() {
                        if opened_at == depth {
                            cells.push(cell_value(text));
                        } else {
                            cell = Some((text, opened_at));
                        }
                    }
                    depth -= 1;
                }
                Event::Text(_) | Event::CData(_) => {
                    if let Some((text, _)) = cell.as_mut() {
                        self.push_text(&event, text)?;
                    }
                }
                Event::Eof => return Err(self.unexpected_eof()),
                _ => {}
            }
        }

        self.open -= 1;
        Ok(cells)
    }
}

/// Whitespace-only cells count as empty
fn cell_value(text: String) -> String {
    if text.trim().is_empty() {
        String::new()
    } else {
        text
    }
}

/// A single `<table>` element being read
pub struct Table<'a, R: BufRead> {
    name: String,
    reader: &'a mut TableReader<R>,
}

impl<R: BufRead> Table<'_, R> {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Next column declaration or row, `None` at `</table>`
    pub fn next_entry(&mut self) -> Result<Option<TableEntry>> {
        while self.reader.open > 0 {
            match self.reader.read_event()? {
                Event::Start(e) => {
                    self.reader.open += 1;
                    match e.name().as_ref() {
                        b"col" => {
                            let role = self.reader.read_element_text()?;
                            return Ok(Some(TableEntry::Column(role.trim().to_string())));
                        }
                        b"row" => {
                            let cells = self.reader.read_row()?;
                            return Ok(Some(TableEntry::Row(cells)));
                        }
                        _ => {}
                    }
                }
                Event::Empty(e) => match e.name().as_ref() {
                    b"col" => return Ok(Some(TableEntry::Column(String::new()))),
                    b"row" => return Ok(Some(TableEntry::Row(Vec::new()))),
                    _ => {}
                },
                Event::End(_) => self.reader.open -= 1,
                Event::Eof => return Err(self.reader.unexpected_eof()),
                _ => {}
            }
        }
        Ok(None)
    }
}

impl<R: BufRead> Iterator for Table<'_, R> {
    type Item = Result<TableEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_entry().transpose()
    }
}
