//! Geometry primitives and the path-data coordinate scanner.
//!
//! The rendered image arrives as vector paths with no identifiers, so the
//! binding engine works purely from coordinates. The scanner extracts
//! absolute coordinate pairs from an SVG path-data string; for curve
//! commands it emits control points as well as endpoints, which keeps the
//! bounding box conservative (a Bézier segment never leaves its control
//! hull) without evaluating any curve.

use serde::{Deserialize, Serialize};

/// A position in image space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance.
    pub fn distance_to(&self, other: Point) -> f64 {
        let dx = self.x - other.x;
        let dy = self.y - other.y;
        (dx * dx + dy * dy).sqrt()
    }
}

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl BoundingBox {
    /// Bounding box of a point set; `None` when the set is empty.
    pub fn of(points: &[Point]) -> Option<Self> {
        let first = points.first()?;
        let mut bb = Self {
            min_x: first.x,
            min_y: first.y,
            max_x: first.x,
            max_y: first.y,
        };
        for p in &points[1..] {
            bb.min_x = bb.min_x.min(p.x);
            bb.min_y = bb.min_y.min(p.y);
            bb.max_x = bb.max_x.max(p.x);
            bb.max_y = bb.max_y.max(p.y);
        }
        Some(bb)
    }

    pub fn centroid(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) / 2.0,
            (self.min_y + self.max_y) / 2.0,
        )
    }
}

// ============================================================================
// Path-data scanner
// ============================================================================

/// Extract absolute coordinate pairs from an SVG path-data string.
///
/// Handles the full command set (`M L H V C S Q T A Z` and their relative
/// forms) including implicit command repetition. Malformed trailing input is
/// ignored rather than reported: a truncated glyph still yields the
/// coordinates scanned so far, which is all the centroid math needs.
pub fn path_coordinates(d: &str) -> Vec<Point> {
    let mut scanner = Scanner::new(d);
    let mut out = Vec::new();

    // Scanner state: current pen position and the subpath start for Z.
    let mut cur = Point::new(0.0, 0.0);
    let mut subpath_start = cur;
    let mut cmd = b' ';

    loop {
        scanner.skip_separators();
        match scanner.peek() {
            None => break,
            Some(c) if c.is_ascii_alphabetic() => {
                scanner.advance();
                cmd = c;
            }
            // A number without a preceding letter repeats the last command;
            // a repeated moveto degrades to lineto per the SVG grammar.
            // Z takes no arguments, so a number after it is malformed input
            // and ends the scan.
            Some(_) => match cmd {
                b'M' => cmd = b'L',
                b'm' => cmd = b'l',
                b'Z' | b'z' | b' ' => break,
                _ => {}
            },
        }

        let relative = cmd.is_ascii_lowercase();
        let origin = if relative { cur } else { Point::new(0.0, 0.0) };

        match cmd.to_ascii_uppercase() {
            b'M' | b'L' | b'T' => {
                let Some(p) = scanner.point(origin) else { break };
                out.push(p);
                cur = p;
                if cmd.to_ascii_uppercase() == b'M' {
                    subpath_start = p;
                }
            }
            b'H' => {
                let Some(x) = scanner.number() else { break };
                let p = Point::new(origin.x + x, cur.y);
                out.push(p);
                cur = p;
            }
            b'V' => {
                let Some(y) = scanner.number() else { break };
                let p = Point::new(cur.x, origin.y + y);
                out.push(p);
                cur = p;
            }
            b'C' => {
                let (Some(c1), Some(c2), Some(end)) = (
                    scanner.point(origin),
                    scanner.point(origin),
                    scanner.point(origin),
                ) else {
                    break;
                };
                out.extend([c1, c2, end]);
                cur = end;
            }
            b'S' | b'Q' => {
                let (Some(c1), Some(end)) = (scanner.point(origin), scanner.point(origin))
                else {
                    break;
                };
                out.extend([c1, end]);
                cur = end;
            }
            b'A' => {
                // rx ry rotation large-arc sweep x y; only the endpoint is
                // a coordinate in image space.
                for _ in 0..5 {
                    if scanner.number().is_none() {
                        return out;
                    }
                }
                let Some(end) = scanner.point(origin) else { break };
                out.push(end);
                cur = end;
            }
            b'Z' => {
                cur = subpath_start;
            }
            _ => break,
        }
    }

    out
}

/// Byte cursor over path data. Numbers follow the SVG grammar: optional
/// sign, digits, fraction, exponent.
struct Scanner<'a> {
    input: &'a [u8],
    pos: usize,
}

impl<'a> Scanner<'a> {
    fn new(input: &'a str) -> Self {
        Self {
            input: input.as_bytes(),
            pos: 0,
        }
    }

    fn peek(&self) -> Option<u8> {
        self.input.get(self.pos).copied()
    }

    fn advance(&mut self) {
        self.pos += 1;
    }

    fn skip_separators(&mut self) {
        while let Some(c) = self.peek() {
            if c.is_ascii_whitespace() || c == b',' {
                self.advance();
            } else {
                break;
            }
        }
    }

    fn number(&mut self) -> Option<f64> {
        self.skip_separators();
        let start = self.pos;

        if matches!(self.peek(), Some(b'+') | Some(b'-')) {
            self.advance();
        }
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.advance();
        }
        if self.peek() == Some(b'.') {
            self.advance();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.advance();
            }
        }
        if matches!(self.peek(), Some(b'e') | Some(b'E')) {
            let mark = self.pos;
            self.advance();
            if matches!(self.peek(), Some(b'+') | Some(b'-')) {
                self.advance();
            }
            if matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.advance();
                }
            } else {
                self.pos = mark;
            }
        }

        if self.pos == start {
            return None;
        }
        std::str::from_utf8(&self.input[start..self.pos])
            .ok()?
            .parse()
            .ok()
    }

    fn point(&mut self, origin: Point) -> Option<Point> {
        let x = self.number()?;
        let y = self.number()?;
        Some(Point::new(origin.x + x, origin.y + y))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_absolute_moveto_lineto() {
        let pts = path_coordinates("M 10 20 L 30 40");
        assert_eq!(pts, vec![Point::new(10.0, 20.0), Point::new(30.0, 40.0)]);
    }

    #[test]
    fn test_relative_commands() {
        let pts = path_coordinates("m 10,20 l 5,5 h 5 v -5");
        assert_eq!(
            pts,
            vec![
                Point::new(10.0, 20.0),
                Point::new(15.0, 25.0),
                Point::new(20.0, 25.0),
                Point::new(20.0, 20.0),
            ]
        );
    }

    #[test]
    fn test_implicit_lineto_after_moveto() {
        let pts = path_coordinates("M 0 0 10 0 10 10");
        assert_eq!(pts.len(), 3);
        assert_eq!(pts[2], Point::new(10.0, 10.0));
    }

    #[test]
    fn test_cubic_emits_control_points() {
        let pts = path_coordinates("M 0 0 C 1 2 3 4 5 6");
        assert_eq!(pts.len(), 4);
        assert_eq!(pts[3], Point::new(5.0, 6.0));
    }

    #[test]
    fn test_relative_cubic_tracks_endpoint() {
        let pts = path_coordinates("M 10 10 c 1 1 2 2 4 4 l 1 0");
        assert_eq!(*pts.last().unwrap(), Point::new(15.0, 14.0));
    }

    #[test]
    fn test_arc_emits_endpoint_only() {
        let pts = path_coordinates("M 0 0 A 25 25 0 0 1 50 50");
        assert_eq!(pts, vec![Point::new(0.0, 0.0), Point::new(50.0, 50.0)]);
    }

    #[test]
    fn test_close_resets_pen() {
        let pts = path_coordinates("M 0 0 L 10 0 L 10 10 Z l 1 1");
        assert_eq!(*pts.last().unwrap(), Point::new(1.0, 1.0));
    }

    #[test]
    fn test_scientific_notation_and_signs() {
        let pts = path_coordinates("M1e2-5 L-3.5.5");
        assert_eq!(
            pts,
            vec![Point::new(100.0, -5.0), Point::new(-3.5, 0.5)]
        );
    }

    #[test]
    fn test_truncated_input_yields_prefix() {
        let pts = path_coordinates("M 10 20 L 30");
        assert_eq!(pts, vec![Point::new(10.0, 20.0)]);
    }

    #[test]
    fn test_numbers_after_close_end_the_scan() {
        let pts = path_coordinates("M 10 20 Z 5 5");
        assert_eq!(pts, vec![Point::new(10.0, 20.0)]);
    }

    #[test]
    fn test_bounding_box_centroid() {
        let pts = vec![
            Point::new(0.0, 0.0),
            Point::new(4.0, 0.0),
            Point::new(2.0, 6.0),
        ];
        let bb = BoundingBox::of(&pts).unwrap();
        assert_eq!(bb.centroid(), Point::new(2.0, 3.0));
        assert!(BoundingBox::of(&[]).is_none());
    }
}
