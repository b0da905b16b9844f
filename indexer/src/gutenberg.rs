//! Project Gutenberg plain-text books: header metadata and body extraction.

use folio::DocId;
use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref EBOOK_NUMBER: Regex = Regex::new(r"#(\d+)").expect("valid regex");
    static ref START_NUMBER: Regex = Regex::new(r"(\d+)\s*\*\*\*$").expect("valid regex");
}

const START_MARKERS: &[&str] = &["*** START OF THE PROJECT GUTENBERG EBOOK", "*** START OF THIS PROJECT GUTENBERG EBOOK"];
const END_MARKERS: &[&str] = &["*** END OF THIS PROJECT GUTENBERG EBOOK", "*** END OF THE PROJECT GUTENBERG EBOOK"];

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Book {
    pub id: Option<DocId>,
    pub title: Option<String>,
    pub author: Option<String>,
    pub release_date: Option<String>,
    pub content: String,
}

pub fn parse(text: &str) -> Book {
    let lines: Vec<&str> = text.lines().collect();
    let mut book = Book::default();

    let start = lines.iter().position(|l| START_MARKERS.iter().any(|m| l.starts_with(m)));
    let header_end = start.unwrap_or(lines.len());
    for line in &lines[..header_end] {
        let line = line.trim();
        let lower = line.to_lowercase();
        if lower.starts_with("title: ") {
            book.title = non_empty(after(line, "title: "));
        } else if lower.starts_with("author: ") {
            book.author = non_empty(after(line, "author: "));
        } else if lower.starts_with("by ") {
            book.author = non_empty(after(line, "by "));
        } else if lower.starts_with("release date: ") {
            book.release_date = release_date(after(line, "release date: "));
            book.id = book.id.or_else(|| ebook_number(line));
        }
    }

    if let Some(start) = start {
        if book.id.is_none() {
            book.id = START_NUMBER
                .captures(lines[start].trim())
                .and_then(|c| c[1].parse().ok());
        }
        if book.title.is_none() || book.author.is_none() || book.release_date.is_none() {
            scan_front_matter(&lines[start + 1..], &mut book);
        }
    }

    let body_start = start.map_or(0, |s| s + 1);
    let body = lines[body_start.min(lines.len())..].join("\n");
    let body = END_MARKERS.iter().fold(body.as_str(), |acc, marker| acc.split(marker).next().unwrap_or(acc));
    book.content = body.trim().to_string();
    book
}

/// Older transcriptions repeat title and author after the START marker instead of before it.
fn scan_front_matter(lines: &[&str], book: &mut Book) {
    for line in lines.iter().map(|l| l.trim()).take_while(|l| !l.starts_with("Contents")) {
        if line.is_empty()
            || line.starts_with("There are")
            || line.starts_with("cover")
            || line.starts_with("Click on")
            || line.starts_with("[Illustration]")
        {
            continue;
        }
        let lower = line.to_lowercase();
        if book.title.is_none() {
            book.title = Some(line.to_string());
        } else if lower.starts_with("by ") {
            book.author = book.author.take().or_else(|| non_empty(after(line, "by ")));
        } else if lower.starts_with("copyright ") {
            book.release_date = book.release_date.take().or_else(|| release_date(after(line, "copyright ")));
            book.id = book.id.or_else(|| ebook_number(line));
        }
    }
}

/// `line` without its first `prefix.len()` bytes; the caller matched the prefix case-insensitively.
fn after<'a>(line: &'a str, prefix: &str) -> &'a str {
    line.get(prefix.len()..).unwrap_or("")
}

fn non_empty(s: &str) -> Option<String> {
    let s = s.trim();
    (!s.is_empty()).then(|| s.to_string())
}

fn release_date(rest: &str) -> Option<String> {
    non_empty(rest.split('[').next().unwrap_or(rest))
}

fn ebook_number(line: &str) -> Option<DocId> {
    EBOOK_NUMBER.captures(line).and_then(|c| c[1].parse().ok())
}
