//! Paginated transcript export.
//!
//! Pages are A4 with 2 cm margins. Text is set in the standard Helvetica
//! faces with WinAnsi encoding, so no font files are embedded; characters the
//! encoding cannot represent are written as `?`.

use super::{ExportView, SessionExporter};
use crate::config::{HexColor, OutputLayout};
use crate::error::ExportError;
use crate::message::TranscriptEntry;
use chrono::Local;
use lopdf::content::{Content, Operation};
use lopdf::{Document, Object, ObjectId, Stream, StringFormat, dictionary};
use std::fs;
use std::path::PathBuf;
use textwrap::core::Fragment;
use textwrap::wrap_algorithms::wrap_first_fit;

const PAGE_WIDTH: f32 = 595.28;
const PAGE_HEIGHT: f32 = 841.89;
const MARGIN: f32 = 56.69;
const TEXT_WIDTH: f32 = PAGE_WIDTH - 2.0 * MARGIN;
const FOOTER_Y: f32 = 35.43;

const TITLE: &str = "Conversation";
const BLACK: (f32, f32, f32) = (0.0, 0.0, 0.0);
const GREY: (f32, f32, f32) = (0.333, 0.333, 0.333);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Face {
    Regular,
    Bold,
    Oblique,
}

impl Face {
    const ALL: [Face; 3] = [Face::Regular, Face::Bold, Face::Oblique];

    fn resource(self) -> &'static str {
        match self {
            Face::Regular => "F1",
            Face::Bold => "F2",
            Face::Oblique => "F3",
        }
    }

    fn base_font(self) -> &'static str {
        match self {
            Face::Regular => "Helvetica",
            Face::Bold => "Helvetica-Bold",
            Face::Oblique => "Helvetica-Oblique",
        }
    }
}

/// Text styles: face, size, leading, space before, space after.
#[derive(Debug, Clone, Copy)]
struct Style {
    face: Face,
    size: f32,
    leading: f32,
    before: f32,
    after: f32,
}

const TITLE_STYLE: Style = Style { face: Face::Bold, size: 16.0, leading: 20.0, before: 0.0, after: 12.0 };
const META_STYLE: Style = Style { face: Face::Oblique, size: 9.0, leading: 12.0, before: 0.0, after: 18.0 };
const HEADING_STYLE: Style = Style { face: Face::Bold, size: 11.5, leading: 14.0, before: 6.0, after: 2.0 };
const BODY_STYLE: Style = Style { face: Face::Regular, size: 10.5, leading: 14.0, before: 0.0, after: 8.0 };
const FOOTER_SIZE: f32 = 9.0;

/// Writes the transcript as `<output>/Conversations_PDF/<name>.pdf`.
#[derive(Debug, Clone, Default)]
pub struct PdfExporter {
    layout: OutputLayout,
    label_colors: Vec<(String, HexColor)>,
}

impl PdfExporter {
    pub fn new(layout: OutputLayout) -> Self {
        Self {
            layout,
            label_colors: Vec::new(),
        }
    }

    /// Draws headings whose label equals `label` in `color`.
    pub fn with_label_color(mut self, label: impl Into<String>, color: HexColor) -> Self {
        self.label_colors.push((label.into(), color));
        self
    }

    fn heading_color(&self, label: &str) -> (f32, f32, f32) {
        self.label_colors
            .iter()
            .find(|(known, _)| known.trim() == label)
            .map(|(_, color)| color.to_rgb())
            .unwrap_or(BLACK)
    }

    /// Lays out the transcript into pages of positioned lines.
    fn paginate(&self, entries: &[TranscriptEntry], exported_at: &str) -> Vec<Vec<PlacedLine>> {
        let mut pages = Paginator::new();
        pages.paragraph(TITLE_STYLE, BLACK, TITLE);
        pages.paragraph(META_STYLE, GREY, &format!("Exported on {exported_at}"));

        for entry in entries {
            let label = match entry.label.trim() {
                "" => "Unknown",
                label => label,
            };
            pages.paragraph(HEADING_STYLE, self.heading_color(label), label);
            pages.paragraph(BODY_STYLE, BLACK, entry.content.trim());
        }

        pages.finish()
    }
}

impl SessionExporter for PdfExporter {
    fn export(&self, view: &ExportView<'_>) -> Result<PathBuf, ExportError> {
        let path = self.layout.pdf_path(view.name);
        let exported_at = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let pages = self.paginate(view.transcript.entries(), &exported_at);
        let bytes = render_document(&pages)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ExportError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, bytes).map_err(|source| ExportError::Io {
            path: path.clone(),
            source,
        })?;

        Ok(path)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct PlacedLine {
    face: Face,
    size: f32,
    color: (f32, f32, f32),
    x: f32,
    y: f32,
    text: String,
}

/// Fills pages top to bottom, breaking when the next line would cross the
/// bottom margin.
struct Paginator {
    pages: Vec<Vec<PlacedLine>>,
    y: f32,
}

impl Paginator {
    fn new() -> Self {
        Self {
            pages: vec![Vec::new()],
            y: PAGE_HEIGHT - MARGIN,
        }
    }

    fn paragraph(&mut self, style: Style, color: (f32, f32, f32), text: &str) {
        self.y -= style.before;
        for source_line in text.split('\n') {
            for line in wrap_line(source_line, style.face, style.size, TEXT_WIDTH) {
                self.line(style, color, line);
            }
        }
        self.y -= style.after;
    }

    fn line(&mut self, style: Style, color: (f32, f32, f32), text: String) {
        if self.y - style.leading < MARGIN {
            self.pages.push(Vec::new());
            self.y = PAGE_HEIGHT - MARGIN;
        }
        self.y -= style.leading;

        let y = self.y;
        if let Some(page) = self.pages.last_mut() {
            page.push(PlacedLine {
                face: style.face,
                size: style.size,
                color,
                x: MARGIN,
                y,
                text,
            });
        }
    }

    /// Adds the page footer to every page.
    fn finish(mut self) -> Vec<Vec<PlacedLine>> {
        for (index, page) in self.pages.iter_mut().enumerate() {
            let text = format!("Page {}", index + 1);
            let width = text_width(&text, Face::Regular, FOOTER_SIZE);
            page.push(PlacedLine {
                face: Face::Regular,
                size: FOOTER_SIZE,
                color: BLACK,
                x: PAGE_WIDTH - MARGIN - width,
                y: FOOTER_Y,
                text,
            });
        }
        self.pages
    }
}

/// A word measured in points.
#[derive(Debug)]
struct Word {
    text: String,
    width: f64,
    space: f64,
}

impl Fragment for Word {
    fn width(&self) -> f64 {
        self.width
    }

    fn whitespace_width(&self) -> f64 {
        self.space
    }

    fn penalty_width(&self) -> f64 {
        0.0
    }
}

/// Wraps one source line to `max_width` points. Words wider than a line are
/// split across lines.
fn wrap_line(line: &str, face: Face, size: f32, max_width: f32) -> Vec<String> {
    let space = f64::from(text_width(" ", face, size));
    let mut words = Vec::new();
    for word in line.split_whitespace() {
        for piece in split_to_width(word, face, size, max_width) {
            let width = f64::from(text_width(&piece, face, size));
            words.push(Word { text: piece, width, space });
        }
    }

    if words.is_empty() {
        return vec![String::new()];
    }

    wrap_first_fit(&words, &[f64::from(max_width)])
        .into_iter()
        .map(|line| {
            line.iter()
                .map(|word| word.text.as_str())
                .collect::<Vec<_>>()
                .join(" ")
        })
        .collect()
}

fn split_to_width(word: &str, face: Face, size: f32, max_width: f32) -> Vec<String> {
    let mut pieces = Vec::new();
    let mut current = String::new();
    let mut width = 0.0;
    for ch in word.chars() {
        let ch_width = char_width(ch, face, size);
        if !current.is_empty() && width + ch_width > max_width {
            pieces.push(std::mem::take(&mut current));
            width = 0.0;
        }
        current.push(ch);
        width += ch_width;
    }
    if !current.is_empty() {
        pieces.push(current);
    }
    pieces
}

fn text_width(text: &str, face: Face, size: f32) -> f32 {
    text.chars().map(|ch| char_width(ch, face, size)).sum()
}

/// Helvetica advance widths in 1/1000 em for printable ASCII.
const HELVETICA_WIDTHS: [u16; 95] = [
    278, 278, 355, 556, 556, 889, 667, 191, 333, 333, 389, 584, 278, 333, 278, 278, // ' '..'/'
    556, 556, 556, 556, 556, 556, 556, 556, 556, 556, 278, 278, 584, 584, 584, 556, // '0'..'?'
    1015, 667, 667, 722, 722, 667, 611, 778, 722, 278, 500, 667, 556, 833, 722, 778, // '@'..'O'
    667, 778, 722, 667, 611, 722, 667, 944, 667, 667, 611, 278, 278, 278, 469, 556, // 'P'..'_'
    333, 556, 556, 500, 556, 556, 278, 556, 556, 222, 222, 500, 222, 833, 556, 556, // '`'..'o'
    556, 556, 333, 500, 278, 556, 500, 722, 500, 500, 500, 334, 260, 334, 584, // 'p'..'~'
];

fn char_width(ch: char, face: Face, size: f32) -> f32 {
    let units = match ch {
        ' '..='~' => HELVETICA_WIDTHS[ch as usize - 0x20],
        _ => 556,
    };
    // Bold glyphs run about eight percent wider.
    let scale = if face == Face::Bold { 1.08 } else { 1.0 };
    f32::from(units) * scale * size / 1000.0
}

/// Encodes text for a WinAnsi font. Unmappable characters become `?`.
fn encode_win_ansi(text: &str) -> Vec<u8> {
    text.chars()
        .map(|ch| match ch {
            '\t' => b' ',
            ' '..='~' => ch as u8,
            '\u{A0}'..='\u{FF}' => ch as u32 as u8,
            '€' => 0x80,
            '‚' => 0x82,
            '„' => 0x84,
            '…' => 0x85,
            '‘' => 0x91,
            '’' => 0x92,
            '“' => 0x93,
            '”' => 0x94,
            '•' => 0x95,
            '–' => 0x96,
            '—' => 0x97,
            '™' => 0x99,
            'Œ' => 0x8C,
            'œ' => 0x9C,
            'Š' => 0x8A,
            'š' => 0x9A,
            'Ž' => 0x8E,
            'ž' => 0x9E,
            'Ÿ' => 0x9F,
            _ => b'?',
        })
        .collect()
}

fn render_document(pages: &[Vec<PlacedLine>]) -> Result<Vec<u8>, ExportError> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut fonts = lopdf::Dictionary::new();
    for face in Face::ALL {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => face.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(face.resource(), font_id);
    }
    let resources_id = doc.add_object(dictionary! { "Font" => fonts });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for lines in pages {
        let page_id = render_page(&mut doc, pages_id, lines)?;
        kids.push(page_id.into());
    }

    let page_count = kids.len() as i64;
    let media_box: Vec<Object> = vec![0.into(), 0.into(), PAGE_WIDTH.into(), PAGE_HEIGHT.into()];
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_count,
            "Resources" => resources_id,
            "MediaBox" => media_box,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    let info_id = doc.add_object(dictionary! {
        "Title" => Object::string_literal(TITLE),
        "Subject" => Object::string_literal("Chat transcript"),
    });
    doc.trailer.set("Root", catalog_id);
    doc.trailer.set("Info", info_id);
    doc.compress();

    let mut bytes = Vec::new();
    doc.save_to(&mut bytes)
        .map_err(|e| ExportError::Pdf(e.to_string()))?;
    Ok(bytes)
}

fn render_page(doc: &mut Document, parent: ObjectId, lines: &[PlacedLine]) -> Result<ObjectId, ExportError> {
    let mut operations = Vec::with_capacity(lines.len() * 6);
    for line in lines {
        let (r, g, b) = line.color;
        operations.push(Operation::new("BT", vec![]));
        operations.push(Operation::new("rg", vec![r.into(), g.into(), b.into()]));
        operations.push(Operation::new(
            "Tf",
            vec![line.face.resource().into(), line.size.into()],
        ));
        operations.push(Operation::new("Td", vec![line.x.into(), line.y.into()]));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(encode_win_ansi(&line.text), StringFormat::Literal)],
        ));
        operations.push(Operation::new("ET", vec![]));
    }

    let content = Content { operations };
    let encoded = content
        .encode()
        .map_err(|e| ExportError::Pdf(e.to_string()))?;
    let content_id = doc.add_object(Stream::new(dictionary! {}, encoded));

    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => parent,
        "Contents" => content_id,
    }))
}
