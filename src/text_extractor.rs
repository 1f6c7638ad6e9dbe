//! Format-dispatched text extraction for content-based duplicate detection.
//!
//! Every extractor function is infallible from the caller's point of view:
//! failures are logged and `None` is returned, never propagated. Composite
//! formats (spreadsheets, presentations) are unzipped and their XML parsed
//! directly with `quick-xml`, the same way the teacher repo prefers
//! streaming parsers over loading a whole structure into memory.

use std::io::{Cursor, Read};

use quick_xml::events::Event;
use quick_xml::Reader;
use regex::Regex;
use tracing::warn;
use zip::ZipArchive;

/// Extracts normalized-ish text from `content`, dispatching on `mime` with a
/// filename-extension fallback. Returns `None` if the format isn't
/// recognized, extraction fails, or the result is empty after trimming.
pub fn extract(content: &[u8], mime: &str, filename: &str) -> Option<String> {
    let lower_name = filename.to_lowercase();

    let result = if mime == "application/pdf" || lower_name.ends_with(".pdf") {
        extract_pdf(content)
    } else if is_docx(mime, &lower_name) {
        extract_docx(content)
    } else if is_xlsx(mime, &lower_name) {
        extract_xlsx(content)
    } else if is_pptx(mime, &lower_name) {
        extract_pptx(content)
    } else if mime == "text/plain" || lower_name.ends_with(".txt") {
        extract_plain_text(content)
    } else if mime == "text/html" || lower_name.ends_with(".html") || lower_name.ends_with(".htm") {
        extract_html(content)
    } else {
        None
    };

    result.filter(|text| !text.trim().is_empty())
}

/// Lowercases and collapses all whitespace runs to a single space, trimming ends.
pub fn normalize(text: &str) -> String {
    let collapsed: String = text
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");
    collapsed
}

fn is_docx(mime: &str, lower_name: &str) -> bool {
    mime == "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
        || mime == "application/msword"
        || lower_name.ends_with(".docx")
        || lower_name.ends_with(".doc")
}

fn is_xlsx(mime: &str, lower_name: &str) -> bool {
    mime == "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet"
        || mime == "application/vnd.ms-excel"
        || lower_name.ends_with(".xlsx")
        || lower_name.ends_with(".xls")
}

fn is_pptx(mime: &str, lower_name: &str) -> bool {
    mime == "application/vnd.openxmlformats-officedocument.presentationml.presentation"
        || mime == "application/vnd.ms-powerpoint"
        || lower_name.ends_with(".pptx")
        || lower_name.ends_with(".ppt")
}

fn extract_pdf(content: &[u8]) -> Option<String> {
    match pdf_extract::extract_text_from_mem(content) {
        Ok(text) => Some(text),
        Err(err) => {
            warn!("pdf extraction failed: {err}");
            None
        }
    }
}

/// Word-processor documents are a zip of XML; body text lives in
/// `word/document.xml` as a sequence of `<w:p>` paragraphs, each containing
/// `<w:t>` text runs. Paragraphs (including table-cell paragraphs, which
/// nest the same way) are joined with a single newline.
fn extract_docx(content: &[u8]) -> Option<String> {
    let xml = read_zip_entry(content, "word/document.xml")?;
    let paragraphs = extract_paragraphs(&xml, b"w:p", b"w:t");
    if paragraphs.is_empty() {
        return None;
    }
    Some(paragraphs.join("\n"))
}

fn extract_xlsx(content: &[u8]) -> Option<String> {
    use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};

    let mut workbook: Xlsx<_> = match open_workbook_from_rs(Cursor::new(content)) {
        Ok(wb) => wb,
        Err(err) => {
            warn!("xlsx open failed: {err}");
            return None;
        }
    };

    let mut sections = Vec::new();
    for sheet_name in workbook.sheet_names().to_owned() {
        let range = match workbook.worksheet_range(&sheet_name) {
            Ok(range) => range,
            Err(_) => continue,
        };

        let mut rows = Vec::new();
        for row in range.rows() {
            let row_text = row
                .iter()
                .filter(|cell| !matches!(cell, Data::Empty))
                .map(data_to_string)
                .collect::<Vec<_>>()
                .join(" ");
            if !row_text.trim().is_empty() {
                rows.push(row_text);
            }
        }

        if !rows.is_empty() {
            sections.push(format!("Sheet: {sheet_name}\n{}", rows.join("\n")));
        }
    }

    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n\n"))
    }
}

fn data_to_string(cell: &calamine::Data) -> String {
    use calamine::Data;
    match cell {
        Data::Empty => String::new(),
        Data::String(s) => s.clone(),
        Data::Float(f) => f.to_string(),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => dt.to_string(),
        Data::DateTimeIso(s) => s.clone(),
        Data::DurationIso(s) => s.clone(),
        Data::Error(e) => format!("{e:?}"),
    }
}

/// Presentations are a zip with one XML part per slide under
/// `ppt/slides/slideN.xml`; text runs live in `<a:t>` elements.
fn extract_pptx(content: &[u8]) -> Option<String> {
    let mut archive = open_zip(content)?;
    let slide_re = Regex::new(r"^ppt/slides/slide(\d+)\.xml$").expect("static regex is valid");

    let mut slide_numbers: Vec<(u32, String)> = Vec::new();
    for i in 0..archive.len() {
        let Ok(entry) = archive.by_index(i) else {
            continue;
        };
        let name = entry.name().to_string();
        if let Some(caps) = slide_re.captures(&name) {
            if let Ok(num) = caps[1].parse::<u32>() {
                slide_numbers.push((num, name));
            }
        }
    }
    slide_numbers.sort_by_key(|(num, _)| *num);

    let mut sections = Vec::new();
    for (num, name) in slide_numbers {
        let Ok(mut entry) = archive.by_name(&name) else {
            continue;
        };
        let mut xml = String::new();
        if entry.read_to_string(&mut xml).is_err() {
            continue;
        }
        let lines = extract_leaf_text(&xml, b"a:t");
        if lines.is_empty() {
            continue;
        }
        sections.push(format!("Slide {num}:\n{}", lines.join("\n")));
    }

    if sections.is_empty() {
        None
    } else {
        Some(sections.join("\n\n"))
    }
}

fn extract_plain_text(content: &[u8]) -> Option<String> {
    match std::str::from_utf8(content) {
        Ok(text) => Some(text.to_string()),
        Err(_) => {
            let (text, _encoding, had_errors) = encoding_rs::WINDOWS_1252.decode(content);
            if had_errors {
                warn!("latin-1 fallback decode had replacement characters");
            }
            Some(text.into_owned())
        }
    }
}

fn extract_html(content: &[u8]) -> Option<String> {
    let text = std::str::from_utf8(content).ok()?;
    let tag_re = Regex::new(r"<[^>]+>").expect("static regex is valid");
    let stripped = tag_re.replace_all(text, "");
    let trimmed = stripped.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

fn open_zip(content: &[u8]) -> Option<ZipArchive<Cursor<&[u8]>>> {
    match ZipArchive::new(Cursor::new(content)) {
        Ok(archive) => Some(archive),
        Err(err) => {
            warn!("zip open failed: {err}");
            None
        }
    }
}

fn read_zip_entry(content: &[u8], entry_name: &str) -> Option<String> {
    let mut archive = open_zip(content)?;
    let mut entry = archive.by_name(entry_name).ok()?;
    let mut xml = String::new();
    entry.read_to_string(&mut xml).ok()?;
    Some(xml)
}

/// Groups leaf-text elements (`leaf_tag`, e.g. `w:t`) by the nearest enclosing
/// `container_tag` (e.g. `w:p`), concatenating each group's runs with no
/// separator. Used for word-processor paragraphs.
fn extract_paragraphs(xml: &str, container_tag: &[u8], leaf_tag: &[u8]) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut paragraphs = Vec::new();
    let mut current = String::new();
    let mut in_container = false;
    let mut in_leaf = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == container_tag => {
                in_container = true;
                current.clear();
            }
            Ok(Event::End(e)) if e.name().as_ref() == container_tag => {
                in_container = false;
                if !current.trim().is_empty() {
                    paragraphs.push(current.trim().to_string());
                }
            }
            Ok(Event::Start(e)) if e.name().as_ref() == leaf_tag => {
                in_leaf = true;
            }
            Ok(Event::End(e)) if e.name().as_ref() == leaf_tag => {
                in_leaf = false;
            }
            Ok(Event::Text(t)) if in_container && in_leaf => {
                if let Ok(text) = t.unescape() {
                    current.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                warn!("xml parse error during extraction: {err}");
                break;
            }
            _ => {}
        }
    }

    paragraphs
}

/// Collects the text content of every `leaf_tag` element, in document order,
/// without grouping by a container. Used for presentation slide runs.
fn extract_leaf_text(xml: &str, leaf_tag: &[u8]) -> Vec<String> {
    let mut reader = Reader::from_str(xml);
    reader.trim_text(true);

    let mut runs = Vec::new();
    let mut in_leaf = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == leaf_tag => in_leaf = true,
            Ok(Event::End(e)) if e.name().as_ref() == leaf_tag => in_leaf = false,
            Ok(Event::Text(t)) if in_leaf => {
                if let Ok(text) = t.unescape() {
                    let text = text.trim();
                    if !text.is_empty() {
                        runs.push(text.to_string());
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(err) => {
                warn!("xml parse error during extraction: {err}");
                break;
            }
            _ => {}
        }
    }

    runs
}
