//! Highlight annotations
//!
//! Annotations are purely additive: existing `/Annots` entries and page
//! content are never touched.

use crate::config::HighlightStyle;
use crate::error::{HighlightError, Result};
use crate::geometry::{PageBox, Rect};
use chrono::Utc;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream, StringFormat};

fn real(v: f64) -> Object {
    Object::Real(v as f32)
}

/// Add one `/Highlight` annotation over `rect` (top-left page space).
///
/// The annotation carries its own appearance stream so viewers that do not
/// synthesize appearances still render it.
pub fn add_highlight_annotation(
    doc: &mut Document,
    page_id: ObjectId,
    rect: &Rect,
    style: &HighlightStyle,
) -> Result<ObjectId> {
    let page_box = PageBox::of_page(doc, page_id);
    let user = page_box.to_user_space(rect);
    let [r, g, b] = style.color;

    let appearance_id = doc.add_object(appearance_stream(&user, style)?);

    let mut annot = Dictionary::new();
    annot.set("Type", Object::Name(b"Annot".to_vec()));
    annot.set("Subtype", Object::Name(b"Highlight".to_vec()));
    annot.set("Rect", rect_array(&user));
    // Quad order: upper-left, upper-right, lower-left, lower-right
    annot.set(
        "QuadPoints",
        Object::Array(vec![
            real(user.x0),
            real(user.y1),
            real(user.x1),
            real(user.y1),
            real(user.x0),
            real(user.y0),
            real(user.x1),
            real(user.y0),
        ]),
    );
    annot.set(
        "C",
        Object::Array(vec![Object::Real(r), Object::Real(g), Object::Real(b)]),
    );
    annot.set("CA", Object::Real(style.opacity));
    // Print flag
    annot.set("F", Object::Integer(4));
    annot.set("P", Object::Reference(page_id));
    annot.set(
        "NM",
        Object::String(
            format!("highlight-{}", uuid::Uuid::new_v4()).into_bytes(),
            StringFormat::Literal,
        ),
    );
    annot.set(
        "M",
        Object::String(
            Utc::now().format("D:%Y%m%d%H%M%SZ").to_string().into_bytes(),
            StringFormat::Literal,
        ),
    );
    annot.set(
        "AP",
        Object::Dictionary(dictionary! { "N" => Object::Reference(appearance_id) }),
    );

    let annot_id = doc.add_object(Object::Dictionary(annot));
    add_annotation_to_page(doc, page_id, annot_id)?;
    Ok(annot_id)
}

fn rect_array(r: &Rect) -> Object {
    Object::Array(vec![real(r.x0), real(r.y0), real(r.x1), real(r.y1)])
}

/// Multiply-blended filled rectangle, the usual look of a text highlight.
fn appearance_stream(user: &Rect, style: &HighlightStyle) -> Result<Stream> {
    let [r, g, b] = style.color;
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new("gs", vec![Object::Name(b"GS0".to_vec())]),
            Operation::new(
                "rg",
                vec![Object::Real(r), Object::Real(g), Object::Real(b)],
            ),
            Operation::new(
                "re",
                vec![
                    real(user.x0),
                    real(user.y0),
                    real(user.width()),
                    real(user.height()),
                ],
            ),
            Operation::new("f", vec![]),
            Operation::new("Q", vec![]),
        ],
    };
    let bytes = content
        .encode()
        .map_err(|e| HighlightError::persist("<appearance stream>", e))?;

    let resources = dictionary! {
        "ExtGState" => dictionary! {
            "GS0" => dictionary! {
                "Type" => "ExtGState",
                "BM" => "Multiply",
                "CA" => Object::Real(style.opacity),
                "ca" => Object::Real(style.opacity),
            },
        },
    };
    let dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Form",
        "BBox" => rect_array(user),
        "Resources" => resources,
    };
    Ok(Stream::new(dict, bytes))
}

/// Append an annotation reference to a page's `/Annots`, creating the array
/// if needed. Handles `/Annots` stored as an indirect array.
fn add_annotation_to_page(
    doc: &mut Document,
    page_id: ObjectId,
    annot_id: ObjectId,
) -> Result<()> {
    let indirect = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Annots").ok())
        .and_then(|annots| annots.as_reference().ok());

    if let Some(array_id) = indirect {
        if let Ok(Object::Array(arr)) = doc.get_object_mut(array_id) {
            arr.push(Object::Reference(annot_id));
            return Ok(());
        }
    }

    let page = doc
        .get_object_mut(page_id)
        .map_err(|e| HighlightError::persist("<page>", e))?;
    let Object::Dictionary(page_dict) = page else {
        return Err(HighlightError::persist("<page>", "page object is not a dictionary"));
    };
    if let Ok(Object::Array(arr)) = page_dict.get_mut(b"Annots") {
        arr.push(Object::Reference(annot_id));
    } else {
        page_dict.set("Annots", Object::Array(vec![Object::Reference(annot_id)]));
    }
    Ok(())
}

/// Highlight annotations on a page, as `(annotation id, user-space rect)`.
pub fn page_highlights(doc: &Document, page_id: ObjectId) -> Vec<(ObjectId, Rect)> {
    let Some(annots) = doc
        .get_dictionary(page_id)
        .ok()
        .and_then(|page| page.get(b"Annots").ok())
        .map(|a| crate::geometry::resolve(doc, a))
        .and_then(|a| a.as_array().ok())
    else {
        return Vec::new();
    };

    annots
        .iter()
        .filter_map(|entry| {
            let id = entry.as_reference().ok()?;
            let annot = doc.get_dictionary(id).ok()?;
            if annot.get(b"Subtype").and_then(Object::as_name).ok()? != b"Highlight" {
                return None;
            }
            let nums: Vec<f64> = annot
                .get(b"Rect")
                .and_then(Object::as_array)
                .ok()?
                .iter()
                .filter_map(crate::geometry::number)
                .collect();
            (nums.len() == 4).then(|| (id, Rect::new(nums[0], nums[1], nums[2], nums[3])))
        })
        .collect()
}
