//! Markdown parsing for the converter.
//!
//! Walks the pulldown-cmark event stream of one document and collects the
//! pieces that conversion rules can address: YAML front matter, the level-1
//! title, the body paragraphs before the first sub-heading, every level 2-6
//! section in document order, fenced code blocks, and tables that appear
//! before the first section.
//!
//! Section content is an ordered list of entries. Paragraphs and plain list
//! items are strings, an item with a nested list is `{item: [children]}`,
//! and table rows are maps from (aliased) header to cell text.

use crate::config::Extraction;
use crate::constants::ADDITIONAL_TABLE_PREFIX;
use crate::slug::slugify;
use indexmap::IndexMap;
use log::warn;
use pulldown_cmark::{CodeBlockKind, Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::LazyLock;

static BR_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)^<br\s*/?>$").unwrap());
static FRONT_MATTER_LINE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([^\s#:][^:]*):[ \t]+(\S.*?)\s*$").unwrap());

/// A fenced code block and the first word of its info string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FencedBlock {
    pub info: String,
    pub content: String,
}

/// Everything extracted from one markdown document.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ParsedMarkdown {
    pub front_matter: Map<String, Value>,
    pub title: Option<String>,
    pub body: Vec<Value>,
    /// Keyed by heading slug, in document order
    pub sections: IndexMap<String, Vec<Value>>,
    pub fenced: Vec<FencedBlock>,
    pub additional_tables: Vec<Value>,
}

/// Parses markdown content. `header_aliases` renames table header cells.
pub fn parse_markdown(content: &str, header_aliases: &IndexMap<String, String>) -> ParsedMarkdown {
    let options = Options::ENABLE_TABLES
        | Options::ENABLE_STRIKETHROUGH
        | Options::ENABLE_TASKLISTS
        | Options::ENABLE_YAML_STYLE_METADATA_BLOCKS;

    let mut builder = Builder::new(header_aliases);
    for event in Parser::new_ext(content, options) {
        builder.handle(event);
    }
    builder.doc
}

impl ParsedMarkdown {
    /// Runs one extraction. `None` means the markdown has no such field.
    pub fn extract(&self, extraction: &Extraction) -> Option<Value> {
        match extraction {
            Extraction::Title => self.title.clone().map(Value::String),
            Extraction::Body => {
                if self.body.is_empty() {
                    None
                } else {
                    Some(Value::String(flatten_text(&self.body, "\n\n")))
                }
            }
            Extraction::FrontMatter(key) => self.front_matter.get(key).cloned(),
            Extraction::Section(heading) => {
                self.sections.get(&slugify(heading)).map(|entries| Value::Array(entries.clone()))
            }
            Extraction::SectionText(heading) => self
                .sections
                .get(&slugify(heading))
                .map(|entries| Value::String(flatten_text(entries, "\n"))),
            Extraction::Fenced(info) => self
                .fenced
                .iter()
                .find(|block| block.info == *info)
                .map(|block| Value::String(block.content.clone())),
        }
    }

    /// Resolves a bare field name: front matter first, then the `title` and
    /// `body` built-ins, then a section with that heading.
    pub fn extract_named(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.front_matter.get(name) {
            return Some(value.clone());
        }
        match name {
            "title" => self.extract(&Extraction::Title),
            "body" => self.extract(&Extraction::Body),
            _ => self.extract(&Extraction::Section(name.to_string())),
        }
    }

    /// The whole document as one mapping: front matter, the title when the
    /// front matter has none, every section, then stray tables.
    pub fn to_document(&self) -> Map<String, Value> {
        let mut document = self.front_matter.clone();
        if let Some(title) = &self.title {
            if !document.contains_key("title") {
                document.insert("title".to_string(), Value::String(title.clone()));
            }
        }
        for (slug, entries) in &self.sections {
            document.insert(slug.clone(), Value::Array(entries.clone()));
        }
        for (index, table) in self.additional_tables.iter().enumerate() {
            document.insert(format!("{ADDITIONAL_TABLE_PREFIX}{index}"), table.clone());
        }
        document
    }
}

/// Flattens section entries into text, one entry per chunk.
fn flatten_text(entries: &[Value], separator: &str) -> String {
    let chunks: Vec<String> = entries.iter().map(entry_text).filter(|s| !s.is_empty()).collect();
    chunks.join(separator)
}

fn entry_text(entry: &Value) -> String {
    match entry {
        Value::String(s) => s.clone(),
        Value::Array(items) => flatten_text(items, "\n"),
        Value::Object(map) => map
            .iter()
            .map(|(key, value)| match value {
                Value::Array(children) if children.is_empty() => key.clone(),
                Value::Array(children) => format!("{key}\n{}", flatten_text(children, "\n")),
                Value::String(s) => format!("{key}: {s}"),
                other => format!("{key}: {other}"),
            })
            .collect::<Vec<_>>()
            .join("\n"),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Default)]
struct ItemState {
    text: String,
    children: Option<Vec<Value>>,
    table: Option<Vec<Value>>,
}

impl ItemState {
    fn into_value(self) -> Value {
        let text = self.text.trim().to_string();
        let nested = match (self.children, self.table) {
            (None, None) => return Value::String(text),
            (Some(mut children), Some(rows)) => {
                children.extend(rows);
                children
            }
            (Some(nested), None) | (None, Some(nested)) => nested,
        };
        let mut map = Map::new();
        map.insert(text, Value::Array(nested));
        Value::Object(map)
    }
}

#[derive(Default)]
struct TableState {
    header: Vec<String>,
    rows: Vec<Vec<String>>,
    row: Vec<String>,
}

struct Builder<'a> {
    aliases: &'a IndexMap<String, String>,
    doc: ParsedMarkdown,
    buffer: String,
    section: Option<String>,
    lists: Vec<Vec<Value>>,
    items: Vec<ItemState>,
    table: Option<TableState>,
    code_info: Option<Option<String>>,
    last_was_list: bool,
}

impl<'a> Builder<'a> {
    fn new(aliases: &'a IndexMap<String, String>) -> Self {
        Self {
            aliases,
            doc: ParsedMarkdown::default(),
            buffer: String::new(),
            section: None,
            lists: Vec::new(),
            items: Vec::new(),
            table: None,
            code_info: None,
            last_was_list: false,
        }
    }

    fn take_buffer(&mut self) -> String {
        std::mem::take(&mut self.buffer)
    }

    /// Moves pending inline text into the innermost open list item.
    fn flush_into_item(&mut self) {
        let text = self.take_buffer();
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        if let Some(item) = self.items.last_mut() {
            if !item.text.is_empty() {
                item.text.push('\n');
            }
            item.text.push_str(text);
        }
    }

    fn push_entry(&mut self, value: Value) {
        match &self.section {
            Some(slug) => self.doc.sections.entry(slug.clone()).or_default().push(value),
            None => self.doc.body.push(value),
        }
    }

    fn handle(&mut self, event: Event<'_>) {
        match event {
            Event::Start(tag) => self.start(tag),
            Event::End(tag) => self.end(tag),
            Event::Text(text) | Event::Code(text) => self.buffer.push_str(&text),
            Event::SoftBreak => self.buffer.push(' '),
            Event::HardBreak => self.buffer.push('\n'),
            Event::InlineHtml(html) | Event::Html(html) => {
                if BR_TAG.is_match(html.trim()) {
                    self.buffer.push('\n');
                }
            }
            _ => {}
        }
    }

    fn start(&mut self, tag: Tag<'_>) {
        match tag {
            Tag::MetadataBlock(_) => self.buffer.clear(),
            Tag::Heading { .. } => self.buffer.clear(),
            Tag::List(_) => {
                if !self.items.is_empty() {
                    self.flush_into_item();
                }
                self.lists.push(Vec::new());
            }
            Tag::Item => self.items.push(ItemState::default()),
            Tag::Table(_) => {
                if !self.items.is_empty() {
                    self.flush_into_item();
                }
                self.table = Some(TableState::default());
            }
            Tag::TableCell => self.buffer.clear(),
            Tag::CodeBlock(kind) => {
                if !self.items.is_empty() {
                    self.flush_into_item();
                }
                self.buffer.clear();
                self.code_info = Some(match kind {
                    CodeBlockKind::Fenced(info) => {
                        Some(info.split_whitespace().next().unwrap_or_default().to_string())
                    }
                    CodeBlockKind::Indented => None,
                });
            }
            _ => {}
        }
    }

    fn end(&mut self, tag: TagEnd) {
        match tag {
            TagEnd::MetadataBlock(_) => {
                let raw = self.take_buffer();
                match serde_yaml::from_str::<Value>(&raw) {
                    Ok(Value::Object(map)) => self.doc.front_matter = keep_scalar_text(map, &raw),
                    Ok(Value::Null) => {}
                    Ok(_) => warn!("Ignoring front matter that is not a mapping"),
                    Err(e) => warn!("Ignoring malformed front matter: {e}"),
                }
            }
            TagEnd::Heading(level) => {
                let text = self.take_buffer().trim().to_string();
                if level == HeadingLevel::H1 {
                    if self.doc.title.is_none() && self.section.is_none() {
                        self.doc.title = Some(text);
                    }
                    return;
                }
                let slug = slugify(&text);
                if slug.is_empty() {
                    return;
                }
                self.doc.sections.insert(slug.clone(), Vec::new());
                self.section = Some(slug);
                self.last_was_list = false;
            }
            TagEnd::Paragraph => {
                if !self.items.is_empty() {
                    self.flush_into_item();
                    return;
                }
                let text = self.take_buffer().trim().to_string();
                if !text.is_empty() {
                    self.push_entry(Value::String(text));
                    self.last_was_list = false;
                }
            }
            TagEnd::Item => {
                self.flush_into_item();
                if let Some(item) = self.items.pop() {
                    let value = item.into_value();
                    if let Some(list) = self.lists.last_mut() {
                        list.push(value);
                    }
                }
            }
            TagEnd::List(_) => {
                let entries = self.lists.pop().unwrap_or_default();
                if let Some(item) = self.items.last_mut() {
                    item.children.get_or_insert_with(Vec::new).extend(entries);
                } else {
                    for entry in entries {
                        self.push_entry(entry);
                    }
                    self.last_was_list = true;
                }
            }
            TagEnd::TableCell => {
                let cell = self.take_buffer().trim().to_string();
                if let Some(table) = self.table.as_mut() {
                    table.row.push(cell);
                }
            }
            TagEnd::TableHead => {
                if let Some(table) = self.table.as_mut() {
                    table.header = std::mem::take(&mut table.row)
                        .into_iter()
                        .map(|cell| self.aliases.get(&cell).cloned().unwrap_or(cell))
                        .collect();
                }
            }
            TagEnd::TableRow => {
                if let Some(table) = self.table.as_mut() {
                    let row = std::mem::take(&mut table.row);
                    table.rows.push(row);
                }
            }
            TagEnd::Table => {
                if let Some(table) = self.table.take() {
                    self.place_table(table_rows(table));
                }
            }
            TagEnd::CodeBlock => {
                let mut content = self.take_buffer();
                if content.ends_with('\n') {
                    content.pop();
                }
                match self.code_info.take().flatten() {
                    Some(info) => self.doc.fenced.push(FencedBlock { info, content }),
                    None if self.items.is_empty() => {
                        self.push_entry(Value::String(content));
                        self.last_was_list = false;
                    }
                    None => {
                        self.buffer = content;
                        self.flush_into_item();
                    }
                }
            }
            _ => {}
        }
    }

    /// A table inside a list item belongs to that item, a table right after
    /// a list belongs to its last item, any other table contributes rows to
    /// the current section. Tables before the first section stand alone.
    fn place_table(&mut self, rows: Vec<Value>) {
        if let Some(item) = self.items.last_mut() {
            item.table.get_or_insert_with(Vec::new).extend(rows);
            return;
        }

        let Some(slug) = self.section.clone() else {
            self.doc.additional_tables.push(Value::Array(rows));
            return;
        };

        let after_list = std::mem::take(&mut self.last_was_list);
        let entries = self.doc.sections.entry(slug).or_default();
        let attachable = after_list
            && match entries.last() {
                Some(Value::String(_)) => true,
                Some(Value::Object(map)) => map.len() == 1,
                _ => false,
            };
        if !attachable {
            entries.extend(rows);
            return;
        }

        if let Some(last) = entries.last_mut() {
            let item = match last {
                Value::String(text) => std::mem::take(text),
                Value::Object(map) => map.keys().next().cloned().unwrap_or_default(),
                _ => String::new(),
            };
            let mut map = Map::new();
            map.insert(item, Value::Array(rows));
            *last = Value::Object(map);
        }
    }
}

/// Front matter values are text: `document_rev: 1.10` stays `"1.10"`.
/// Top-level scalars take their source text, nested ones their display form.
fn keep_scalar_text(map: Map<String, Value>, raw: &str) -> Map<String, Value> {
    let source: IndexMap<&str, &str> = raw
        .lines()
        .filter_map(|line| FRONT_MATTER_LINE.captures(line))
        .filter_map(|caps| Some((caps.get(1)?.as_str().trim(), caps.get(2)?.as_str())))
        .collect();

    map.into_iter()
        .map(|(key, value)| {
            let value = match value {
                Value::Number(_) | Value::Bool(_) => match source.get(key.as_str()) {
                    Some(text) => Value::String(strip_comment(text).to_string()),
                    None => stringify_scalars(value),
                },
                other => stringify_scalars(other),
            };
            (key, value)
        })
        .collect()
}

fn strip_comment(text: &str) -> &str {
    match text.find(" #") {
        Some(index) => text[..index].trim_end(),
        None => text,
    }
}

fn stringify_scalars(value: Value) -> Value {
    match value {
        Value::Number(n) => Value::String(n.to_string()),
        Value::Bool(b) => Value::String(b.to_string()),
        Value::Array(items) => Value::Array(items.into_iter().map(stringify_scalars).collect()),
        Value::Object(map) => Value::Object(
            map.into_iter().map(|(key, value)| (key, stringify_scalars(value))).collect(),
        ),
        other => other,
    }
}

fn table_rows(table: TableState) -> Vec<Value> {
    table
        .rows
        .into_iter()
        .map(|row| {
            let map: Map<String, Value> = table
                .header
                .iter()
                .cloned()
                .zip(row.into_iter().map(Value::String))
                .collect();
            Value::Object(map)
        })
        .collect()
}
