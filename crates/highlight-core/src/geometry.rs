//! Rectangles and page-space conversion
//!
//! Word boxes and highlight rectangles live in a top-left page space: x grows
//! to the right, y grows downwards, and the origin is the top-left corner of
//! the page's MediaBox. PDF user space (y up) is only used when reading
//! content streams and when writing annotation dictionaries.

use lopdf::{Document, Object, ObjectId};
use serde::{Deserialize, Serialize};

/// Axis-aligned rectangle given by two corners, `x0 <= x1` and `y0 <= y1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
}

impl Rect {
    pub fn new(x0: f64, y0: f64, x1: f64, y1: f64) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Bounding box of a set of points.
    pub fn from_points(points: &[(f64, f64)]) -> Option<Self> {
        let (&(fx, fy), rest) = points.split_first()?;
        let mut r = Rect {
            x0: fx,
            y0: fy,
            x1: fx,
            y1: fy,
        };
        for &(x, y) in rest {
            r.x0 = r.x0.min(x);
            r.y0 = r.y0.min(y);
            r.x1 = r.x1.max(x);
            r.y1 = r.y1.max(y);
        }
        Some(r)
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }

    /// Smallest rectangle containing both `self` and `other`.
    pub fn union(&self, other: &Rect) -> Rect {
        Rect {
            x0: self.x0.min(other.x0),
            y0: self.y0.min(other.y0),
            x1: self.x1.max(other.x1),
            y1: self.y1.max(other.y1),
        }
    }

    /// Running envelope over all boxes; `None` for an empty input.
    ///
    /// A single box yields itself.
    pub fn union_all<'a, I>(boxes: I) -> Option<Rect>
    where
        I: IntoIterator<Item = &'a Rect>,
    {
        let mut iter = boxes.into_iter();
        let first = *iter.next()?;
        Some(iter.fold(first, |acc, r| acc.union(r)))
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.x0 < other.x1 && other.x0 < self.x1 && self.y0 < other.y1 && other.y0 < self.y1
    }
}

/// The visible page area (MediaBox) in PDF user space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PageBox {
    pub llx: f64,
    pub lly: f64,
    pub urx: f64,
    pub ury: f64,
}

impl Default for PageBox {
    /// US Letter
    fn default() -> Self {
        Self {
            llx: 0.0,
            lly: 0.0,
            urx: 612.0,
            ury: 792.0,
        }
    }
}

impl PageBox {
    /// Read the MediaBox of a page, following `/Parent` inheritance.
    pub fn of_page(doc: &Document, page_id: ObjectId) -> Self {
        let Some(obj) = inherited_page_attr(doc, page_id, b"MediaBox") else {
            return Self::default();
        };
        let Ok(arr) = obj.as_array() else {
            return Self::default();
        };
        let nums: Vec<f64> = arr.iter().filter_map(|o| number(resolve(doc, o))).collect();
        if nums.len() < 4 {
            return Self::default();
        }
        Self {
            llx: nums[0].min(nums[2]),
            lly: nums[1].min(nums[3]),
            urx: nums[0].max(nums[2]),
            ury: nums[1].max(nums[3]),
        }
    }

    pub fn width(&self) -> f64 {
        self.urx - self.llx
    }

    pub fn height(&self) -> f64 {
        self.ury - self.lly
    }

    /// User-space rectangle (y up) to top-left page space (y down).
    pub fn to_top_left(&self, user: &Rect) -> Rect {
        Rect::new(
            user.x0 - self.llx,
            self.ury - user.y1,
            user.x1 - self.llx,
            self.ury - user.y0,
        )
    }

    /// Top-left page-space rectangle back to user space.
    pub fn to_user_space(&self, rect: &Rect) -> Rect {
        Rect::new(
            rect.x0 + self.llx,
            self.ury - rect.y1,
            rect.x1 + self.llx,
            self.ury - rect.y0,
        )
    }
}

/// Numeric value of an Integer or Real object.
pub(crate) fn number(obj: &Object) -> Option<f64> {
    match obj {
        Object::Integer(i) => Some(*i as f64),
        Object::Real(r) => Some(f64::from(*r)),
        _ => None,
    }
}

/// Follow a single indirect reference, leaving direct objects untouched.
pub(crate) fn resolve<'a>(doc: &'a Document, obj: &'a Object) -> &'a Object {
    match obj {
        Object::Reference(id) => doc.get_object(*id).unwrap_or(obj),
        _ => obj,
    }
}

/// Look up a page attribute, walking up the page tree for inheritable keys.
pub(crate) fn inherited_page_attr<'a>(
    doc: &'a Document,
    page_id: ObjectId,
    key: &[u8],
) -> Option<&'a Object> {
    let mut current = Some(page_id);
    // Guard against malformed trees with Parent cycles
    for _ in 0..64 {
        let id = current?;
        let dict = doc.get_dictionary(id).ok()?;
        if let Ok(value) = dict.get(key) {
            return Some(resolve(doc, value));
        }
        current = dict.get(b"Parent").and_then(Object::as_reference).ok();
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_union_of_disjoint_unit_boxes() {
        let a = Rect::new(0.0, 0.0, 1.0, 1.0);
        let b = Rect::new(5.0, 5.0, 6.0, 6.0);
        assert_eq!(a.union(&b), Rect::new(0.0, 0.0, 6.0, 6.0));
    }

    #[test]
    fn test_union_all_single_box_is_itself() {
        let a = Rect::new(3.0, 4.0, 10.0, 12.0);
        assert_eq!(Rect::union_all([a].iter()), Some(a));
    }

    #[test]
    fn test_union_all_empty_is_none() {
        assert_eq!(Rect::union_all(std::iter::empty()), None);
    }

    #[test]
    fn test_union_all_permutations_agree() {
        let boxes = [
            Rect::new(10.0, 2.0, 12.0, 4.0),
            Rect::new(-1.0, 8.0, 0.5, 9.0),
            Rect::new(3.0, -3.0, 4.0, 1.0),
        ];
        let expected = Rect::new(-1.0, -3.0, 12.0, 9.0);
        let orders = [
            [0, 1, 2],
            [0, 2, 1],
            [1, 0, 2],
            [1, 2, 0],
            [2, 0, 1],
            [2, 1, 0],
        ];
        for order in orders {
            let permuted: Vec<Rect> = order.iter().map(|&i| boxes[i]).collect();
            assert_eq!(Rect::union_all(permuted.iter()), Some(expected));
        }
    }

    #[test]
    fn test_new_normalizes_corners() {
        let r = Rect::new(5.0, 9.0, 1.0, 2.0);
        assert_eq!((r.x0, r.y0, r.x1, r.y1), (1.0, 2.0, 5.0, 9.0));
    }

    #[test]
    fn test_page_box_round_trip() {
        let page = PageBox {
            llx: 10.0,
            lly: 20.0,
            urx: 622.0,
            ury: 812.0,
        };
        let user = Rect::new(72.0, 700.0, 222.0, 712.0);
        let top_left = page.to_top_left(&user);
        assert_eq!(top_left, Rect::new(62.0, 100.0, 212.0, 112.0));
        assert_eq!(page.to_user_space(&top_left), user);
    }
}
