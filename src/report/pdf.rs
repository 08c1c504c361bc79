//! PDF backend: paints a [`DocumentLayout`] with printpdf built-in fonts.
//!
//! The built-in Helvetica faces only cover WinAnsi (cp1252) and printpdf
//! drops anything else without complaint, so text is checked up front and
//! a document that would lose characters is refused.

use printpdf::path::{PaintMode, WindingOrder};
use printpdf::{
    BuiltinFont, Color, IndirectFontRef, Line, Mm, PdfDocument, PdfLayerReference, Point, Rect,
};

use super::layout::{DocumentLayout, DrawOp, FontStyle, Rgb, PAGE_HEIGHT_MM, PAGE_WIDTH_MM};
use super::RenderError;

struct Fonts {
    regular: IndirectFontRef,
    bold: IndirectFontRef,
    italic: IndirectFontRef,
}

impl Fonts {
    fn get(&self, style: FontStyle) -> &IndirectFontRef {
        match style {
            FontStyle::Regular => &self.regular,
            FontStyle::Bold => &self.bold,
            FontStyle::Italic => &self.italic,
        }
    }
}

fn color(rgb: Rgb) -> Color {
    let Rgb(r, g, b) = rgb;
    Color::Rgb(printpdf::Rgb::new(
        f32::from(r) / 255.0,
        f32::from(g) / 255.0,
        f32::from(b) / 255.0,
        None,
    ))
}

/// Flip a top-left based y coordinate into PDF user space.
fn pdf_y(y: f32) -> Mm {
    Mm(PAGE_HEIGHT_MM - y)
}

/// Whether a built-in font can show `c`.
///
/// Latin-1 plus the cp1252 punctuation block (curly quotes, dashes, euro...).
pub(crate) fn win_ansi(c: char) -> bool {
    matches!(c,
        ' '..='~'
        | '\u{A0}'..='\u{FF}'
        | '€' | '‚' | 'ƒ' | '„' | '…' | '†' | '‡' | 'ˆ' | '‰' | 'Š' | '‹' | 'Œ' | 'Ž'
        | '‘' | '’' | '“' | '”' | '•' | '–' | '—' | '˜' | '™' | 'š' | '›' | 'œ' | 'ž' | 'Ÿ'
    )
}

/// First text run holding a character the built-in fonts cannot show.
fn check_text(layout: &DocumentLayout) -> Result<(), RenderError> {
    let texts = layout.pages.iter().flat_map(|page| &page.ops).filter_map(|op| match op {
        DrawOp::Text { text, .. } => Some(text),
        _ => None,
    });

    for text in texts {
        if let Some(ch) = text.chars().find(|c| !win_ansi(*c)) {
            return Err(RenderError::UnsupportedText {
                ch,
                text: text.clone(),
            });
        }
    }
    Ok(())
}

/// Render a laid out document to PDF bytes.
///
/// # Errors
/// [`RenderError::UnsupportedText`] when any text falls outside WinAnsi.
pub fn render_pdf(layout: &DocumentLayout) -> Result<Vec<u8>, RenderError> {
    check_text(layout)?;

    let (doc, first_page, first_layer) = PdfDocument::new(
        layout.title.as_str(),
        Mm(PAGE_WIDTH_MM),
        Mm(PAGE_HEIGHT_MM),
        "Page 1",
    );

    let fonts = Fonts {
        regular: doc.add_builtin_font(BuiltinFont::Helvetica)?,
        bold: doc.add_builtin_font(BuiltinFont::HelveticaBold)?,
        italic: doc.add_builtin_font(BuiltinFont::HelveticaOblique)?,
    };

    for (index, page) in layout.pages.iter().enumerate() {
        let layer = if index == 0 {
            doc.get_page(first_page).get_layer(first_layer)
        } else {
            let (page_index, layer_index) = doc.add_page(
                Mm(PAGE_WIDTH_MM),
                Mm(PAGE_HEIGHT_MM),
                format!("Page {}", index + 1),
            );
            doc.get_page(page_index).get_layer(layer_index)
        };

        for op in &page.ops {
            paint(&layer, &fonts, op);
        }
    }

    Ok(doc.save_to_bytes()?)
}

fn paint(layer: &PdfLayerReference, fonts: &Fonts, op: &DrawOp) {
    match op {
        DrawOp::Text { x, y, size, style, text } => {
            layer.set_fill_color(color(Rgb(0, 0, 0)));
            layer.use_text(text.as_str(), *size, Mm(*x), pdf_y(*y), fonts.get(*style));
        }
        DrawOp::Rect { x, y, width, height, fill, border } => {
            let mode = match (fill, border) {
                (Some(_), true) => PaintMode::FillStroke,
                (Some(_), false) => PaintMode::Fill,
                (None, _) => PaintMode::Stroke,
            };
            if let Some(fill) = fill {
                layer.set_fill_color(color(*fill));
            }
            if *border {
                layer.set_outline_color(color(Rgb(0, 0, 0)));
                layer.set_outline_thickness(0.2);
            }
            let rect = Rect::new(Mm(*x), pdf_y(*y + *height), Mm(*x + *width), pdf_y(*y))
                .with_mode(mode)
                .with_winding(WindingOrder::NonZero);
            layer.add_rect(rect);
        }
        DrawOp::Line { x1, y1, x2, y2, color: stroke, thickness } => {
            layer.set_outline_color(color(*stroke));
            layer.set_outline_thickness(*thickness);
            layer.add_line(Line {
                points: vec![
                    (Point::new(Mm(*x1), pdf_y(*y1)), false),
                    (Point::new(Mm(*x2), pdf_y(*y2)), false),
                ],
                is_closed: false,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{NewCompany, NewSnapshot};
    use crate::report::sections::{SectionConfig, SectionPlan};
    use chrono::{TimeZone, Utc};

    #[test]
    fn test_render_produces_pdf_header() {
        let company = NewCompany::named("Acme").into_company(1);
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let snapshot = NewSnapshot::empty(1, at).into_snapshot(1);
        let plan = SectionPlan::resolve(&SectionConfig::all(), SectionPlan::PDF_BASE_PAGE);
        let layout = DocumentLayout::build(&company, &snapshot, &plan, at);

        let bytes = render_pdf(&layout).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    fn layout_for(company: crate::model::Company) -> DocumentLayout {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let snapshot = NewSnapshot::empty(company.id, at).into_snapshot(1);
        let plan = SectionPlan::resolve(&SectionConfig::all(), SectionPlan::PDF_BASE_PAGE);
        DocumentLayout::build(&company, &snapshot, &plan, at)
    }

    #[test]
    fn test_win_ansi_coverage() {
        for c in ['A', '~', ' ', 'Å', 'ü', 'ÿ', '€', '—', '’', 'Ÿ'] {
            assert!(win_ansi(c), "{c:?} should be supported");
        }
        for c in ['東', 'Ł', 'ő', 'Ж', '\u{7F}', '\n', '😀'] {
            assert!(!win_ansi(c), "{c:?} should be refused");
        }
    }

    #[test]
    fn test_latin1_names_render() {
        let company = NewCompany {
            country: Some("Zürich".into()),
            ..NewCompany::named("Åkesson & Söner – “Nord”")
        }
        .into_company(1);

        let bytes = render_pdf(&layout_for(company)).unwrap();
        assert!(bytes.starts_with(b"%PDF-"));
    }

    #[test]
    fn test_non_latin_name_is_refused_instead_of_dropped() {
        let company = NewCompany::named("Åkesson 東京").into_company(1);

        match render_pdf(&layout_for(company)) {
            Err(RenderError::UnsupportedText { ch, text }) => {
                assert_eq!(ch, '東');
                assert!(text.contains("Åkesson 東京"));
            }
            other => panic!("expected UnsupportedText, got {:?}", other.map(|b| b.len())),
        }
    }

    #[test]
    fn test_pdf_y_flips_origin() {
        assert_eq!(pdf_y(0.0), Mm(PAGE_HEIGHT_MM));
        assert_eq!(pdf_y(PAGE_HEIGHT_MM), Mm(0.0));
    }
}
