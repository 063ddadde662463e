//! Boolean combinations of surface half-spaces.
//!
//! Text form follows the engine's region expressions: `-1` and `+1` are
//! half-spaces, juxtaposition is intersection, `|` is union and `~` is
//! complement. Complement binds tightest, then intersection, then union.

use crate::error::{ModelError, ModelResult};
use crate::surface::Surface;
use glam::DVec3;
use pincell_common::SurfaceId;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::{BitAnd, BitOr, Not};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    /// f(p) < 0
    Negative,
    /// f(p) > 0
    Positive,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Region {
    HalfSpace { surface: SurfaceId, side: Side },
    Intersection(Vec<Region>),
    Union(Vec<Region>),
    Complement(Box<Region>),
}

impl Region {
    /// Negative half-space of `surface` (inside a cylinder, below a plane).
    pub fn below(surface: SurfaceId) -> Self {
        Region::HalfSpace {
            surface,
            side: Side::Negative,
        }
    }

    /// Positive half-space of `surface`.
    pub fn above(surface: SurfaceId) -> Self {
        Region::HalfSpace {
            surface,
            side: Side::Positive,
        }
    }

    /// Whether `point` lies inside the region. Points exactly on a bounding
    /// surface belong to neither side. Unknown surfaces contain nothing.
    pub fn contains(&self, point: DVec3, surfaces: &BTreeMap<SurfaceId, Surface>) -> bool {
        match self {
            Region::HalfSpace { surface, side } => match surfaces.get(surface) {
                Some(s) => {
                    let f = s.evaluate(point);
                    match side {
                        Side::Negative => f < 0.0,
                        Side::Positive => f > 0.0,
                    }
                }
                None => false,
            },
            Region::Intersection(nodes) => nodes.iter().all(|n| n.contains(point, surfaces)),
            Region::Union(nodes) => nodes.iter().any(|n| n.contains(point, surfaces)),
            Region::Complement(node) => !node.contains(point, surfaces),
        }
    }

    /// Every surface id the region refers to.
    pub fn surfaces(&self) -> BTreeSet<SurfaceId> {
        let mut out = BTreeSet::new();
        self.collect_surfaces(&mut out);
        out
    }

    /// False when any intersection or union has no operands. Such a region
    /// has no text form.
    pub fn is_well_formed(&self) -> bool {
        match self {
            Region::HalfSpace { .. } => true,
            Region::Intersection(nodes) | Region::Union(nodes) => {
                !nodes.is_empty() && nodes.iter().all(Region::is_well_formed)
            }
            Region::Complement(node) => node.is_well_formed(),
        }
    }

    fn collect_surfaces(&self, out: &mut BTreeSet<SurfaceId>) {
        match self {
            Region::HalfSpace { surface, .. } => {
                out.insert(*surface);
            }
            Region::Intersection(nodes) | Region::Union(nodes) => {
                for n in nodes {
                    n.collect_surfaces(out);
                }
            }
            Region::Complement(node) => node.collect_surfaces(out),
        }
    }
}

impl BitAnd for Region {
    type Output = Region;

    fn bitand(self, rhs: Region) -> Region {
        match self {
            Region::Intersection(mut nodes) => {
                nodes.push(rhs);
                Region::Intersection(nodes)
            }
            lhs => Region::Intersection(vec![lhs, rhs]),
        }
    }
}

impl BitOr for Region {
    type Output = Region;

    fn bitor(self, rhs: Region) -> Region {
        match self {
            Region::Union(mut nodes) => {
                nodes.push(rhs);
                Region::Union(nodes)
            }
            lhs => Region::Union(vec![lhs, rhs]),
        }
    }
}

impl Not for Region {
    type Output = Region;

    fn not(self) -> Region {
        Region::Complement(Box::new(self))
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Region::HalfSpace { surface, side } => match side {
                Side::Negative => write!(f, "-{surface}"),
                Side::Positive => write!(f, "+{surface}"),
            },
            Region::Intersection(nodes) => write_joined(f, nodes, " "),
            Region::Union(nodes) => write_joined(f, nodes, " | "),
            Region::Complement(node) => match node.as_ref() {
                Region::HalfSpace { .. } => write!(f, "~({node})"),
                _ => write!(f, "~{node}"),
            },
        }
    }
}

fn write_joined(f: &mut fmt::Formatter<'_>, nodes: &[Region], sep: &str) -> fmt::Result {
    if let [only] = nodes {
        return write!(f, "{only}");
    }
    f.write_str("(")?;
    for (i, node) in nodes.iter().enumerate() {
        if i > 0 {
            f.write_str(sep)?;
        }
        write!(f, "{node}")?;
    }
    f.write_str(")")
}

impl FromStr for Region {
    type Err = ModelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let tokens = tokenize(s)?;
        let mut parser = Parser { tokens, pos: 0 };
        let region = parser.union()?;
        if let Some((offset, tok)) = parser.peek() {
            return Err(parse_error(offset, format!("unexpected {tok:?}")));
        }
        Ok(region)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum Token {
    Open,
    Close,
    Pipe,
    Tilde,
    Half(SurfaceId, Side),
}

fn parse_error(position: usize, message: String) -> ModelError {
    ModelError::RegionParse { position, message }
}

fn tokenize(s: &str) -> ModelResult<Vec<(usize, Token)>> {
    let bytes = s.as_bytes();
    let mut tokens = Vec::new();
    let mut i = 0;
    while i < bytes.len() {
        let c = bytes[i];
        match c {
            b' ' | b'\t' | b'\n' | b'\r' => i += 1,
            b'(' => {
                tokens.push((i, Token::Open));
                i += 1;
            }
            b')' => {
                tokens.push((i, Token::Close));
                i += 1;
            }
            b'|' => {
                tokens.push((i, Token::Pipe));
                i += 1;
            }
            b'~' => {
                tokens.push((i, Token::Tilde));
                i += 1;
            }
            b'+' | b'-' | b'0'..=b'9' => {
                let start = i;
                let side = if c == b'-' {
                    Side::Negative
                } else {
                    Side::Positive
                };
                if c == b'+' || c == b'-' {
                    i += 1;
                }
                let digits_start = i;
                while i < bytes.len() && bytes[i].is_ascii_digit() {
                    i += 1;
                }
                let id: u32 = s[digits_start..i]
                    .parse()
                    .map_err(|_| parse_error(start, "expected a surface id".into()))?;
                tokens.push((start, Token::Half(SurfaceId(id), side)));
            }
            _ => {
                return Err(parse_error(
                    i,
                    format!("unexpected character '{}'", s[i..].chars().next().unwrap_or('?')),
                ));
            }
        }
    }
    Ok(tokens)
}

struct Parser {
    tokens: Vec<(usize, Token)>,
    pos: usize,
}

impl Parser {
    fn peek(&self) -> Option<(usize, Token)> {
        self.tokens.get(self.pos).copied()
    }

    fn end_offset(&self) -> usize {
        self.tokens.last().map(|(o, _)| o + 1).unwrap_or(0)
    }

    fn union(&mut self) -> ModelResult<Region> {
        let mut nodes = vec![self.intersection()?];
        while let Some((_, Token::Pipe)) = self.peek() {
            self.pos += 1;
            nodes.push(self.intersection()?);
        }
        Ok(collapse(nodes, Region::Union))
    }

    fn intersection(&mut self) -> ModelResult<Region> {
        let mut nodes = vec![self.unary()?];
        while let Some((_, tok)) = self.peek() {
            if matches!(tok, Token::Pipe | Token::Close) {
                break;
            }
            nodes.push(self.unary()?);
        }
        Ok(collapse(nodes, Region::Intersection))
    }

    fn unary(&mut self) -> ModelResult<Region> {
        let Some((offset, tok)) = self.peek() else {
            return Err(parse_error(self.end_offset(), "unexpected end of region".into()));
        };
        self.pos += 1;
        match tok {
            Token::Half(surface, side) => Ok(Region::HalfSpace { surface, side }),
            Token::Tilde => Ok(Region::Complement(Box::new(self.unary()?))),
            Token::Open => {
                let inner = self.union()?;
                match self.peek() {
                    Some((_, Token::Close)) => {
                        self.pos += 1;
                        Ok(inner)
                    }
                    _ => Err(parse_error(offset, "unclosed parenthesis".into())),
                }
            }
            Token::Close | Token::Pipe => Err(parse_error(offset, format!("unexpected {tok:?}"))),
        }
    }
}

fn collapse(mut nodes: Vec<Region>, wrap: fn(Vec<Region>) -> Region) -> Region {
    if nodes.len() == 1 {
        nodes.remove(0)
    } else {
        wrap(nodes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::surface::SurfaceKind;
    use proptest::prelude::*;

    fn surfaces() -> BTreeMap<SurfaceId, Surface> {
        let mut map = BTreeMap::new();
        for (id, r) in [(1, 0.42), (2, 0.45), (3, 0.48)] {
            let s = Surface::new(
                SurfaceId(id),
                SurfaceKind::ZCylinder {
                    x0: 0.0,
                    y0: 0.0,
                    r,
                },
            )
            .unwrap();
            map.insert(s.id, s);
        }
        map
    }

    #[test]
    fn annulus_containment() {
        let clad = Region::above(SurfaceId(2)) & Region::below(SurfaceId(3));
        let s = surfaces();
        assert!(clad.contains(DVec3::new(0.46, 0.0, 0.0), &s));
        assert!(!clad.contains(DVec3::new(0.40, 0.0, 0.0), &s));
        assert!(!clad.contains(DVec3::new(0.50, 0.0, 0.0), &s));
    }

    #[test]
    fn on_surface_belongs_to_neither_side() {
        let s = surfaces();
        let p = DVec3::new(0.42, 0.0, 0.0);
        assert!(!Region::below(SurfaceId(1)).contains(p, &s));
        assert!(!Region::above(SurfaceId(1)).contains(p, &s));
    }

    #[test]
    fn union_and_complement() {
        let s = surfaces();
        let outside_clad = Region::below(SurfaceId(2)) | Region::above(SurfaceId(3));
        assert!(outside_clad.contains(DVec3::ZERO, &s));
        assert!(!outside_clad.contains(DVec3::new(0.46, 0.0, 0.0), &s));
        let not_fuel = !Region::below(SurfaceId(1));
        assert!(!not_fuel.contains(DVec3::ZERO, &s));
    }

    #[test]
    fn unknown_surface_contains_nothing() {
        let r = Region::below(SurfaceId(99));
        assert!(!r.contains(DVec3::ZERO, &surfaces()));
    }

    #[test]
    fn display_engine_syntax() {
        let clad = Region::above(SurfaceId(2)) & Region::below(SurfaceId(3));
        assert_eq!(clad.to_string(), "(+2 -3)");
        let u = Region::below(SurfaceId(1)) | clad.clone();
        assert_eq!(u.to_string(), "(-1 | (+2 -3))");
        assert_eq!((!Region::below(SurfaceId(1))).to_string(), "~(-1)");
        assert_eq!((!clad).to_string(), "~(+2 -3)");
    }

    #[test]
    fn operators_flatten_chains() {
        let r = Region::above(SurfaceId(3))
            & Region::above(SurfaceId(4))
            & Region::below(SurfaceId(5));
        assert_eq!(r.to_string(), "(+3 +4 -5)");
        assert_eq!(r.surfaces().len(), 3);
    }

    #[test]
    fn parse_precedence() {
        // intersection binds tighter than union
        let r: Region = "-1 | 2 -3".parse().unwrap();
        assert_eq!(
            r,
            Region::below(SurfaceId(1)) | (Region::above(SurfaceId(2)) & Region::below(SurfaceId(3)))
        );
        // complement binds tightest
        let r: Region = "~-1 2".parse().unwrap();
        assert_eq!(r, !Region::below(SurfaceId(1)) & Region::above(SurfaceId(2)));
    }

    #[test]
    fn lone_operand_prints_unwrapped() {
        let r = Region::Intersection(vec![Region::below(SurfaceId(1))]);
        assert_eq!(r.to_string(), "-1");
        let r = Region::Complement(Box::new(Region::Union(vec![Region::above(SurfaceId(2))])));
        assert_eq!(r.to_string(), "~+2");
        assert_eq!(r.to_string().parse::<Region>().unwrap(), !Region::above(SurfaceId(2)));
        let r = Region::Union(vec![Region::Intersection(vec![
            Region::below(SurfaceId(1)),
            Region::above(SurfaceId(2)),
        ])]);
        assert_eq!(r.to_string(), "(-1 +2)");
        assert!(r.is_well_formed());
    }

    #[test]
    fn empty_combinators_are_not_well_formed() {
        assert!(!Region::Intersection(vec![]).is_well_formed());
        assert!(!(Region::below(SurfaceId(1)) | Region::Union(vec![])).is_well_formed());
        assert!(!Region::Complement(Box::new(Region::Intersection(vec![]))).is_well_formed());
        assert!(Region::below(SurfaceId(1)).is_well_formed());
    }

    #[test]
    fn parse_errors_report_offset() {
        match "-1 (2".parse::<Region>() {
            Err(ModelError::RegionParse { position, .. }) => assert_eq!(position, 3),
            other => panic!("expected parse error, got {other:?}"),
        }
        assert!("-1 )".parse::<Region>().is_err());
        assert!("".parse::<Region>().is_err());
        assert!("-a".parse::<Region>().is_err());
        assert!("-1 |".parse::<Region>().is_err());
    }

    fn arb_region() -> impl Strategy<Value = Region> {
        let leaf = (1u32..20, any::<bool>()).prop_map(|(id, neg)| Region::HalfSpace {
            surface: SurfaceId(id),
            side: if neg { Side::Negative } else { Side::Positive },
        });
        leaf.prop_recursive(4, 32, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 2..4).prop_map(Region::Intersection),
                prop::collection::vec(inner.clone(), 2..4).prop_map(Region::Union),
                inner.prop_map(|r| Region::Complement(Box::new(r))),
            ]
        })
    }

    proptest! {
        #[test]
        fn text_form_reparses_to_same_tree(region in arb_region()) {
            let text = region.to_string();
            let parsed: Region = text.parse().unwrap();
            prop_assert_eq!(parsed, region);
        }
    }
}
