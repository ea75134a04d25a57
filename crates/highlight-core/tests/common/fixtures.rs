//! Synthetic PDFs for integration tests

#![allow(dead_code)]

use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::path::Path;

/// Every printable ASCII glyph is 500/1000 em, so 6pt at 12pt.
fn monospace_font(doc: &mut Document) -> Object {
    let widths: Vec<Object> = (32..=126).map(|_| Object::Integer(500)).collect();
    let font_id = doc.add_object(dictionary! {
        "Type" => "Font",
        "Subtype" => "Type1",
        "BaseFont" => "Courier",
        "FirstChar" => 32,
        "LastChar" => 126,
        "Widths" => widths,
    });
    Object::Reference(font_id)
}

/// One BT..ET block per page, 12pt, first line at (72, 700), 20pt leading.
pub fn text_document(pages: &[&[&str]]) -> Document {
    let mut doc = Document::with_version("1.7");
    let pages_id = doc.new_object_id();
    let font = monospace_font(&mut doc);

    let mut kids = Vec::new();
    for lines in pages {
        let mut operations = vec![
            Operation::new("BT", vec![]),
            Operation::new("Tf", vec!["F1".into(), 12.into()]),
            Operation::new("TL", vec![20.into()]),
            Operation::new("Td", vec![72.into(), 700.into()]),
        ];
        for (i, line) in lines.iter().enumerate() {
            if i > 0 {
                operations.push(Operation::new("T*", vec![]));
            }
            operations.push(Operation::new("Tj", vec![Object::string_literal(*line)]));
        }
        operations.push(Operation::new("ET", vec![]));

        let content = Content { operations };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode().unwrap()));
        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "Font" => dictionary! { "F1" => font.clone() },
            },
        });
        kids.push(Object::Reference(page_id));
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
    doc
}

pub const FOX: &str = "The quick brown fox jumps over the lazy dog";
pub const JUGS: &str = "Pack my box with five dozen liquor jugs.";
pub const SPHINX: &str = "Sphinx of black quartz, judge my vow";

/// Two pages: the fox and jugs pangrams, then the sphinx.
pub fn write_pangrams(path: &Path) {
    text_document(&[&[FOX, JUGS], &[SPHINX]]).save(path).unwrap();
}

/// Highlight annotation `/Rect`s on a 0-based page.
pub fn highlight_rects(path: &Path, page: usize) -> Vec<[f64; 4]> {
    let doc = Document::load(path).unwrap();
    let page_id = *doc.get_pages().values().nth(page).unwrap();
    let page_dict = doc.get_dictionary(page_id).unwrap();
    let annots = match page_dict.get(b"Annots") {
        Ok(Object::Array(arr)) => arr.clone(),
        Ok(Object::Reference(id)) => doc.get_object(*id).unwrap().as_array().unwrap().clone(),
        _ => return Vec::new(),
    };
    annots
        .iter()
        .filter_map(|a| {
            let annot = doc.get_dictionary(a.as_reference().ok()?).ok()?;
            if annot.get(b"Subtype").ok()?.as_name().ok()? != b"Highlight" {
                return None;
            }
            let r = annot.get(b"Rect").ok()?.as_array().ok()?;
            let n: Vec<f64> = r
                .iter()
                .filter_map(|o| match o {
                    Object::Integer(i) => Some(*i as f64),
                    Object::Real(f) => Some(f64::from(*f)),
                    _ => None,
                })
                .collect();
            Some([n[0], n[1], n[2], n[3]])
        })
        .collect()
}

pub fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-3,
        "expected {expected}, got {actual}"
    );
}
