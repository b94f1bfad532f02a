//! Text layout: sanitising, word-wrapping and pagination.
//!
//! Coordinates are PDF points with the origin at the bottom-left corner.

/// US letter.
pub const PAGE_WIDTH: i32 = 612;
pub const PAGE_HEIGHT: i32 = 792;

pub const MARGIN: i32 = 50;
pub const LEADING: i32 = 15;
pub const WRAP_COLUMNS: usize = 80;

pub const TITLE: &str = "Equipment Diagnostic Report";
pub const TITLE_FONT_SIZE: i32 = 16;
pub const BODY_FONT_SIZE: i32 = 10;

/// Baseline of the title on the first page.
pub const TITLE_Y: i32 = PAGE_HEIGHT - MARGIN;
/// First body baseline on the first page (below the title).
pub const FIRST_PAGE_BODY_Y: i32 = PAGE_HEIGHT - 100;
/// First body baseline on continuation pages.
pub const CONTINUATION_BODY_Y: i32 = PAGE_HEIGHT - MARGIN;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlacedLine {
    pub y: i32,
    pub text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Page {
    /// Only the first page carries the title.
    pub title: Option<&'static str>,
    pub lines: Vec<PlacedLine>,
}

/// Replace everything outside printable ASCII so the standard Type1 fonts can
/// show it; tabs become spaces.
pub fn sanitize(line: &str) -> String {
    line.chars()
        .map(|c| match c {
            '\t' => ' ',
            c if c.is_ascii() && !c.is_ascii_control() => c,
            _ => '?',
        })
        .collect()
}

/// Greedy word wrap at `width` columns. Words longer than `width` are split.
/// A blank input yields one empty line so paragraph spacing survives.
pub fn wrap(line: &str, width: usize) -> Vec<String> {
    let width = width.max(1);
    if line.chars().count() <= width {
        return vec![line.trim_end().to_string()];
    }

    let mut out = Vec::new();
    let mut current = String::new();
    let mut current_len = 0usize;

    for word in line.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > width {
            if current_len > 0 {
                out.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(width);
            out.push(word.into_iter().collect());
            word = rest;
        }

        let needed = if current_len == 0 { word.len() } else { current_len + 1 + word.len() };
        if needed > width {
            out.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current.extend(word.iter());
        current_len += word.len();
    }

    if current_len > 0 || out.is_empty() {
        out.push(current);
    }
    out
}

/// Lay `text` out over as many pages as needed.
///
/// Every baseline is at or above the bottom margin; a line that would fall
/// below it starts a new page.
pub fn layout(text: &str) -> Vec<Page> {
    let mut pages = vec![Page {
        title: Some(TITLE),
        lines: Vec::new(),
    }];
    let mut y = FIRST_PAGE_BODY_Y;

    for source_line in text.lines() {
        for wrapped in wrap(&sanitize(source_line), WRAP_COLUMNS) {
            if y < MARGIN {
                pages.push(Page::default());
                y = CONTINUATION_BODY_Y;
            }
            if let Some(page) = pages.last_mut() {
                page.lines.push(PlacedLine { y, text: wrapped });
            }
            y -= LEADING;
        }
    }

    pages
}
