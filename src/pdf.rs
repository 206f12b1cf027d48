use std::path::Path;

use anyhow::{anyhow, bail};
use printpdf::image_crate::{self, DynamicImage};
use printpdf::{
    BuiltinFont, Color, Image, ImageTransform, IndirectFontRef, Line, Mm, PdfDocument,
    PdfDocumentReference, PdfLayerReference, Point, Rgb,
};

use crate::report::{Block, ReportDocument, SignatureSlot};

// US Letter, 0.75in side and bottom margins, 1.25in top margin for the header.
const PAGE_WIDTH: f32 = 215.9;
const PAGE_HEIGHT: f32 = 279.4;
const MARGIN_SIDE: f32 = 19.05;
const MARGIN_TOP: f32 = 31.75;
const MARGIN_BOTTOM: f32 = 19.05;

const PT_TO_MM: f32 = 0.352778;
const LINE_SPACING: f32 = 1.4;
const IMAGE_DPI: f32 = 300.0;

const HEADER_TEXT: &str = "Calidad Académica - Evaluación Docente";
const LOGO_HEIGHT: f32 = 16.0;
const SIGNATURE_COLUMN: f32 = 69.85;
const SIGNATURE_HEIGHT: f32 = 20.0;
const BULLET_INDENT: f32 = 6.0;

/// Rough Helvetica advance width; good enough for wrapping and centering.
pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * size * 0.5 * PT_TO_MM
}

/// Greedy word wrap. Words wider than `max_width` get a line of their own.
pub fn wrap_text(text: &str, max_width: f32, size: f32) -> Vec<String> {
    let mut lines = Vec::new();
    let mut current = String::new();

    for word in text.split_whitespace() {
        if current.is_empty() {
            current.push_str(word);
            continue;
        }
        let candidate = format!("{current} {word}");
        if text_width(&candidate, size) <= max_width {
            current = candidate;
        } else {
            lines.push(std::mem::take(&mut current));
            current.push_str(word);
        }
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines
}

fn load_image(path: &Path) -> Option<DynamicImage> {
    match image_crate::open(path) {
        Ok(image) => Some(image),
        Err(err) => {
            log::warn!("could not read image {}: {err}", path.display());
            None
        }
    }
}

fn rgb(r: f32, g: f32, b: f32) -> Color {
    Color::Rgb(Rgb::new(r, g, b, None))
}

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
}

impl Fonts {
    fn load(doc: &PdfDocumentReference) -> anyhow::Result<Self> {
        let font = |builtin| {
            doc.add_builtin_font(builtin)
                .map_err(|err| anyhow!("failed to load builtin font: {err:?}"))
        };
        Ok(Self {
            regular: font(BuiltinFont::Helvetica)?,
            bold: font(BuiltinFont::HelveticaBold)?,
            italic: font(BuiltinFont::HelveticaOblique)?,
        })
    }
}

#[derive(Clone, Copy)]
enum Align {
    Left(f32),
    Center,
}

struct PageWriter<'a> {
    doc: &'a PdfDocumentReference,
    fonts: &'a Fonts,
    logo: Option<&'a DynamicImage>,
    layer: PdfLayerReference,
    cursor: f32,
    page_number: usize,
    fresh: bool,
}

impl<'a> PageWriter<'a> {
    fn new(
        doc: &'a PdfDocumentReference,
        fonts: &'a Fonts,
        logo: Option<&'a DynamicImage>,
        layer: PdfLayerReference,
    ) -> Self {
        let mut writer = Self {
            doc,
            fonts,
            logo,
            layer,
            cursor: PAGE_HEIGHT - MARGIN_TOP,
            page_number: 1,
            fresh: true,
        };
        writer.decorate();
        writer
    }

    fn content_width(&self) -> f32 {
        PAGE_WIDTH - 2.0 * MARGIN_SIDE
    }

    fn new_page(&mut self) {
        let (page, layer) = self.doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
        self.layer = self.doc.get_page(page).get_layer(layer);
        self.page_number += 1;
        self.cursor = PAGE_HEIGHT - MARGIN_TOP;
        self.fresh = true;
        self.decorate();
    }

    /// Header with logo and rule, footer with the page number.
    fn decorate(&mut self) {
        if let Some(logo) = self.logo {
            self.place_image(logo, MARGIN_SIDE, PAGE_HEIGHT - 8.0 - LOGO_HEIGHT, None, Some(LOGO_HEIGHT));
        }

        let size = 9.0;
        let x = PAGE_WIDTH - MARGIN_SIDE - text_width(HEADER_TEXT, size);
        self.layer.set_fill_color(rgb(0.35, 0.35, 0.35));
        self.layer
            .use_text(HEADER_TEXT, size, Mm(x), Mm(PAGE_HEIGHT - 16.0), &self.fonts.italic);

        let footer = format!("Página {}", self.page_number);
        let x = (PAGE_WIDTH - text_width(&footer, size)) / 2.0;
        self.layer
            .use_text(footer, size, Mm(x), Mm(MARGIN_BOTTOM / 2.0), &self.fonts.regular);
        self.layer.set_fill_color(rgb(0.0, 0.0, 0.0));

        self.horizontal_rule(PAGE_HEIGHT - MARGIN_TOP + 4.0, MARGIN_SIDE, PAGE_WIDTH - MARGIN_SIDE);
    }

    fn horizontal_rule(&self, y: f32, from: f32, to: f32) {
        self.layer.set_outline_color(rgb(0.6, 0.6, 0.6));
        self.layer.set_outline_thickness(0.5);
        self.layer.add_line(Line {
            points: vec![(Point::new(Mm(from), Mm(y)), false), (Point::new(Mm(to), Mm(y)), false)],
            is_closed: false,
        });
    }

    fn ensure_space(&mut self, height: f32) {
        if self.cursor - height < MARGIN_BOTTOM && !self.fresh {
            self.new_page();
        }
    }

    fn skip(&mut self, height: f32) {
        if self.cursor - height < MARGIN_BOTTOM {
            self.new_page();
        } else {
            self.cursor -= height;
        }
    }

    fn text(&mut self, text: &str, size: f32, font: Font, align: Align, width: f32) {
        let line_height = size * PT_TO_MM * LINE_SPACING;
        for line in wrap_text(text, width, size) {
            self.ensure_space(line_height);
            self.cursor -= line_height;
            let x = match align {
                Align::Left(x) => x,
                Align::Center => (PAGE_WIDTH - text_width(&line, size)) / 2.0,
            };
            let face = match font {
                Font::Regular => &self.fonts.regular,
                Font::Bold => &self.fonts.bold,
                Font::Italic => &self.fonts.italic,
            };
            self.layer.use_text(line, size, Mm(x), Mm(self.cursor), face);
            self.fresh = false;
        }
    }

    /// Scales to `width` and/or `height` (mm) keeping the aspect ratio.
    fn place_image(&self, image: &DynamicImage, x: f32, y: f32, width: Option<f32>, height: Option<f32>) {
        let native_w = image.width().max(1) as f32 / IMAGE_DPI * 25.4;
        let native_h = image.height().max(1) as f32 / IMAGE_DPI * 25.4;
        let scale = match (width, height) {
            (Some(w), Some(h)) => (w / native_w).min(h / native_h),
            (Some(w), None) => w / native_w,
            (None, Some(h)) => h / native_h,
            (None, None) => 1.0,
        };

        Image::from_dynamic_image(image).add_to_layer(
            self.layer.clone(),
            ImageTransform {
                translate_x: Some(Mm(x)),
                translate_y: Some(Mm(y)),
                scale_x: Some(scale),
                scale_y: Some(scale),
                dpi: Some(IMAGE_DPI),
                ..Default::default()
            },
        );
    }

    fn figure(&mut self, path: &Path) {
        let Some(image) = load_image(path) else {
            self.notice("No se pudo incluir el gráfico.");
            return;
        };

        let max_height = PAGE_HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
        let width = self.content_width();
        let aspect = image.height().max(1) as f32 / image.width().max(1) as f32;
        let height = (width * aspect).min(max_height);
        let width = height / aspect;

        self.ensure_space(height);
        self.cursor -= height;
        let x = (PAGE_WIDTH - width) / 2.0;
        self.place_image(&image, x, self.cursor, Some(width), Some(height));
        self.fresh = false;
        self.skip(3.0);
    }

    fn notice(&mut self, text: &str) {
        self.layer.set_fill_color(rgb(0.45, 0.45, 0.45));
        let width = self.content_width();
        self.text(text, 10.0, Font::Italic, Align::Left(MARGIN_SIDE), width);
        self.layer.set_fill_color(rgb(0.0, 0.0, 0.0));
        self.skip(2.0);
    }

    fn signatures(&mut self, slots: &[SignatureSlot]) {
        let line_height = 10.0 * PT_TO_MM * LINE_SPACING;
        let tallest = slots.iter().map(|slot| slot.lines.len()).max().unwrap_or(0) + 1;
        self.ensure_space(SIGNATURE_HEIGHT + line_height * tallest as f32);

        let start = (PAGE_WIDTH - SIGNATURE_COLUMN * slots.len() as f32) / 2.0;
        let top = self.cursor;
        let mut bottom = top;

        for (idx, slot) in slots.iter().enumerate() {
            let left = start + SIGNATURE_COLUMN * idx as f32;
            let base = top - SIGNATURE_HEIGHT;
            if let Some(image) = slot.image.as_deref().and_then(load_image) {
                let inner = SIGNATURE_COLUMN - 10.0;
                self.place_image(&image, left + 5.0, base, Some(inner), Some(SIGNATURE_HEIGHT));
            }
            self.horizontal_rule(base, left + 5.0, left + SIGNATURE_COLUMN - 5.0);

            let mut y = base;
            for line in slot.lines.iter().flat_map(|line| wrap_text(line, SIGNATURE_COLUMN - 4.0, 10.0)) {
                y -= line_height;
                let x = left + (SIGNATURE_COLUMN - text_width(&line, 10.0)) / 2.0;
                self.layer.use_text(line, 10.0, Mm(x), Mm(y), &self.fonts.regular);
            }
            bottom = bottom.min(y);
        }

        self.cursor = bottom;
        self.fresh = false;
    }

    fn write_block(&mut self, block: &Block) {
        let width = self.content_width();
        match block {
            Block::Title(text) => {
                self.text(text, 18.0, Font::Bold, Align::Center, width);
            }
            Block::Heading(text) => {
                self.skip(3.0);
                self.text(text, 14.0, Font::Bold, Align::Left(MARGIN_SIDE), width);
                self.skip(2.0);
            }
            Block::SubjectHeading(text) => {
                self.layer.set_fill_color(rgb(0.1, 0.23, 0.45));
                self.text(text, 16.0, Font::Bold, Align::Left(MARGIN_SIDE), width);
                self.layer.set_fill_color(rgb(0.0, 0.0, 0.0));
                self.skip(3.0);
            }
            Block::Paragraph(text) => {
                self.text(text, 11.0, Font::Regular, Align::Left(MARGIN_SIDE), width);
                self.skip(2.0);
            }
            Block::Emphasis(text) => {
                self.text(text, 11.0, Font::Italic, Align::Left(MARGIN_SIDE), width);
            }
            Block::Strong(text) => {
                self.text(text, 11.0, Font::Bold, Align::Left(MARGIN_SIDE), width);
                self.skip(1.0);
            }
            Block::Bullet(text) => {
                let line_height = 11.0 * PT_TO_MM * LINE_SPACING;
                self.ensure_space(line_height);
                self.layer.use_text(
                    "-",
                    11.0,
                    Mm(MARGIN_SIDE + 2.0),
                    Mm(self.cursor - line_height),
                    &self.fonts.regular,
                );
                self.text(
                    text,
                    11.0,
                    Font::Regular,
                    Align::Left(MARGIN_SIDE + BULLET_INDENT),
                    width - BULLET_INDENT,
                );
                self.skip(1.0);
            }
            Block::Notice(text) => self.notice(text),
            Block::Image(path) => self.figure(path),
            Block::Spacer(height) => self.skip(*height),
            Block::Rule => {
                self.skip(2.0);
                self.horizontal_rule(self.cursor, MARGIN_SIDE, PAGE_WIDTH - MARGIN_SIDE);
                self.skip(2.0);
            }
            Block::PageBreak => {
                if !self.fresh {
                    self.new_page();
                }
            }
            Block::Signatures(slots) => self.signatures(slots),
        }
    }
}

#[derive(Clone, Copy)]
enum Font {
    Regular,
    Bold,
    Italic,
}

/// Serializes one or more teacher documents into a single PDF, each starting
/// on a fresh page with its own page numbering.
pub fn render_pdf(documents: &[ReportDocument]) -> anyhow::Result<Vec<u8>> {
    let title = match documents {
        [] => bail!("no report documents to render"),
        [single] => format!("Evaluación Docente: {}", single.docente),
        _ => "Evaluación Docente".to_string(),
    };

    let (doc, page, layer) = PdfDocument::new(&title, Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
    let fonts = Fonts::load(&doc)?;
    let mut first_layer = Some(doc.get_page(page).get_layer(layer));

    for document in documents {
        let logo = document.logo.as_deref().and_then(load_image);
        let layer = match first_layer.take() {
            Some(layer) => layer,
            None => {
                let (page, layer) = doc.add_page(Mm(PAGE_WIDTH), Mm(PAGE_HEIGHT), "Layer 1");
                doc.get_page(page).get_layer(layer)
            }
        };

        let mut writer = PageWriter::new(&doc, &fonts, logo.as_ref(), layer);
        for block in &document.blocks {
            writer.write_block(block);
        }
        log::debug!("laid out {} page(s) for {}", writer.page_number, document.docente);
    }

    doc.save_to_bytes()
        .map_err(|err| anyhow!("failed to serialize PDF: {err:?}"))
}
