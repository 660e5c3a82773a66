use std::cmp::Ordering;

use serde::{Deserialize, Serialize};

pub type Path = Vec<usize>;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Point {
    #[serde(default)]
    pub path: Path,
    pub offset: usize,
}

impl Point {
    pub fn new(path: Path, offset: usize) -> Self {
        Self { path, offset }
    }

    pub fn cmp_position(&self, other: &Point) -> Ordering {
        compare_paths(&self.path, &other.path).then(self.offset.cmp(&other.offset))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Range {
    pub anchor: Point,
    pub focus: Point,
}

impl Range {
    pub fn new(anchor: Point, focus: Point) -> Self {
        Self { anchor, focus }
    }

    pub fn collapsed(point: Point) -> Self {
        Self {
            anchor: point.clone(),
            focus: point,
        }
    }

    pub fn is_collapsed(&self) -> bool {
        self.anchor == self.focus
    }

    pub fn is_backward(&self) -> bool {
        self.anchor.cmp_position(&self.focus) == Ordering::Greater
    }

    /// Start and end in document order.
    pub fn edges(&self) -> (&Point, &Point) {
        if self.is_backward() {
            (&self.focus, &self.anchor)
        } else {
            (&self.anchor, &self.focus)
        }
    }

    pub fn start(&self) -> &Point {
        self.edges().0
    }

    pub fn end(&self) -> &Point {
        self.edges().1
    }
}

/// Any location an editor operation may be aimed at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "at", rename_all = "snake_case")]
pub enum Location {
    Path { path: Path },
    Point(Point),
    Range(Range),
}

impl From<Path> for Location {
    fn from(path: Path) -> Self {
        Location::Path { path }
    }
}

impl From<Point> for Location {
    fn from(point: Point) -> Self {
        Location::Point(point)
    }
}

impl From<Range> for Location {
    fn from(range: Range) -> Self {
        Location::Range(range)
    }
}

impl Location {
    /// The path the location starts in.
    pub fn start_path(&self) -> &[usize] {
        match self {
            Location::Path { path } => path,
            Location::Point(point) => &point.path,
            Location::Range(range) => &range.start().path,
        }
    }
}

/// Document order, treating an ancestor as preceding its descendants.
pub fn compare_paths(a: &[usize], b: &[usize]) -> Ordering {
    a.cmp(b)
}

pub fn parent_path(path: &[usize]) -> Option<&[usize]> {
    path.split_last().map(|(_, parent)| parent)
}

pub fn is_ancestor(ancestor: &[usize], path: &[usize]) -> bool {
    ancestor.len() < path.len() && path.starts_with(ancestor)
}

pub fn next_sibling(path: &[usize]) -> Option<Path> {
    let (&last, parent) = path.split_last()?;
    let mut next = parent.to_vec();
    next.push(last + 1);
    Some(next)
}

pub fn previous_sibling(path: &[usize]) -> Option<Path> {
    let (&last, parent) = path.split_last()?;
    let prev = last.checked_sub(1)?;
    let mut out = parent.to_vec();
    out.push(prev);
    Some(out)
}

pub fn child_path(path: &[usize], index: usize) -> Path {
    let mut out = path.to_vec();
    out.push(index);
    out
}
