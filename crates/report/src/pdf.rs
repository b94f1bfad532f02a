//! PDF encoding of a laid-out report.

use lopdf::{Document, Object, ObjectId, Stream, dictionary};

use crate::error::RenderError;
use crate::layout::{
    BODY_FONT_SIZE, MARGIN, PAGE_HEIGHT, PAGE_WIDTH, Page, TITLE_FONT_SIZE, TITLE_Y, layout,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct ReportRenderer;

impl ReportRenderer {
    pub fn new() -> Self {
        Self
    }

    /// Render `text` as a multi-page PDF.
    ///
    /// CPU-bound; async callers should run it on the blocking pool.
    pub fn render(&self, text: &str) -> Result<Vec<u8>, RenderError> {
        encode(&layout(text))
    }
}

fn encode(pages: &[Page]) -> Result<Vec<u8>, RenderError> {
    let mut doc = Document::with_version("1.5");

    let pages_id = doc.new_object_id();

    let body_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica",
    });
    let title_font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Helvetica-Bold",
    });
    let resources_id = doc.add_object(dictionary! {
        "Font" => dictionary! {
            "F1" => body_font_id,
            "F2" => title_font_id,
        },
    });

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for page in pages {
        let content_id = doc.add_object(Stream::new(dictionary! {}, page_content(page).into_bytes()));
        let page_id: ObjectId = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Integer(i64::from(PAGE_WIDTH)),
                Object::Integer(i64::from(PAGE_HEIGHT)),
            ],
            "Resources" => resources_id,
            "Contents" => content_id,
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );

    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut buffer = Vec::new();
    doc.save_to(&mut buffer)?;
    Ok(buffer)
}

fn page_content(page: &Page) -> String {
    let mut content = String::new();

    if let Some(title) = page.title {
        content.push_str("BT\n");
        content.push_str(&format!("/F2 {TITLE_FONT_SIZE} Tf\n"));
        content.push_str(&format!("1 0 0 1 {MARGIN} {TITLE_Y} Tm\n"));
        content.push_str(&format!("({}) Tj\n", escape_pdf_string(title)));
        content.push_str("ET\n");
    }

    if !page.lines.is_empty() {
        content.push_str("BT\n");
        content.push_str(&format!("/F1 {BODY_FONT_SIZE} Tf\n"));
        for line in &page.lines {
            content.push_str(&format!(
                "1 0 0 1 {MARGIN} {} Tm ({}) Tj\n",
                line.y,
                escape_pdf_string(&line.text)
            ));
        }
        content.push_str("ET\n");
    }

    content
}

fn escape_pdf_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '(' | ')' | '\\' => {
                out.push('\\');
                out.push(c);
            }
            c if c.is_ascii() && !c.is_ascii_control() => out.push(c),
            _ => out.push('?'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_loadable_pdf() {
        let bytes = ReportRenderer::new().render("Hello (world)\nSecond line").unwrap();
        assert!(bytes.starts_with(b"%PDF-1.5"));

        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn page_count_follows_layout() {
        let text = (0..200).map(|i| format!("finding {i}")).collect::<Vec<_>>().join("\n");
        let expected = layout(&text).len();
        assert!(expected > 1);

        let bytes = ReportRenderer::new().render(&text).unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), expected);
    }

    #[test]
    fn empty_text_still_has_title_page() {
        let bytes = ReportRenderer::new().render("").unwrap();
        let doc = Document::load_mem(&bytes).unwrap();
        assert_eq!(doc.get_pages().len(), 1);
    }

    #[test]
    fn escapes_string_delimiters() {
        assert_eq!(escape_pdf_string(r"a(b)c\d"), r"a\(b\)c\\d");
        assert_eq!(escape_pdf_string("naïve"), "na?ve");
    }

    #[test]
    fn title_only_on_first_page() {
        let text = "x\n".repeat(120);
        let pages = layout(&text);
        assert!(page_content(&pages[0]).contains("(Equipment Diagnostic Report) Tj"));
        assert!(!page_content(&pages[1]).contains("/F2"));
    }
}
