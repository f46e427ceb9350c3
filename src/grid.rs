// Plane geometry for the navigation phase: coordinates, headings and the
// turn arithmetic the planners share.
use crate::{Error, ServerResult};
use std::fmt::Display;

/// A cell of the integer grid the robots move on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Coord {
    pub x: i32,
    pub y: i32,
}

impl Coord {
    /// Where every robot is headed.
    pub const ORIGIN: Coord = Coord { x: 0, y: 0 };

    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// The neighbouring cell one step towards `side`.
    pub fn step(self, side: Side) -> Self {
        match side {
            Side::Up => Coord::new(self.x, self.y + 1),
            Side::Right => Coord::new(self.x + 1, self.y),
            Side::Down => Coord::new(self.x, self.y - 1),
            Side::Left => Coord::new(self.x - 1, self.y),
        }
    }

    /// Projection onto one axis.
    pub fn along(self, axis: Axis) -> i32 {
        match axis {
            Axis::X => self.x,
            Axis::Y => self.y,
        }
    }
}

impl Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{},{}]", self.x, self.y)
    }
}

/// The four headings a robot can face. The discriminants are laid out so
/// that a left turn is `-1 (mod 4)` and a right turn `+1 (mod 4)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Side {
    Up = 0,
    Right = 1,
    Down = 2,
    Left = 3,
}

impl Side {
    fn index(self) -> u8 {
        self as u8
    }

    fn from_index(index: u8) -> Self {
        match index % 4 {
            0 => Side::Up,
            1 => Side::Right,
            2 => Side::Down,
            _ => Side::Left,
        }
    }

    /// The heading after one turn counter-clockwise.
    pub fn left(self) -> Self {
        Side::from_index(self.index() + 3)
    }

    /// The heading after one turn clockwise.
    pub fn right(self) -> Self {
        Side::from_index(self.index() + 1)
    }

    /// Number of left turns that rotate `self` onto `target`, in `0..4`.
    /// `3` is of course cheaper taken as a single right turn.
    pub fn turns_to(self, target: Side) -> u8 {
        (self.index() + 4 - target.index()) % 4
    }

    /// Infers the heading a robot moved in from its coordinates before and
    /// after a single successful move. The coordinates must differ in
    /// exactly one axis; anything else is not a move a robot can make.
    pub fn between(from: Coord, to: Coord) -> ServerResult<Self> {
        match (from.x == to.x, from.y == to.y) {
            (true, false) => Ok(if to.y > from.y { Side::Up } else { Side::Down }),
            (false, true) => Ok(if to.x > from.x { Side::Right } else { Side::Left }),
            _ => Err(Error::Logic(format!(
                "cannot infer heading from {} -> {}",
                from, to
            ))),
        }
    }
}

impl std::str::FromStr for Side {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.to_ascii_lowercase();
        match s {
            _ if s == "up" => Ok(Self::Up),
            _ if s == "right" => Ok(Self::Right),
            _ if s == "down" => Ok(Self::Down),
            _ if s == "left" => Ok(Self::Left),
            _ => Err(Error::Config(format!(
                "unknown side '{}', expected up, right, down or left",
                s
            ))),
        }
    }
}

/// Axes of the grid, in the order the simple planner clears them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, derive_more::Display)]
pub enum Axis {
    X,
    Y,
}

/// Where a robot is and where it faces. The single piece of mutable model
/// state the navigation phase carries; every TURN_* sent to the client is
/// mirrored here so `side` always matches the client's real heading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Orientation {
    pub coords: Coord,
    pub side: Side,
}

impl Orientation {
    pub fn new(coords: Coord, side: Side) -> Self {
        Self { coords, side }
    }

    pub fn turn_left(&mut self) {
        self.side = self.side.left();
    }

    pub fn turn_right(&mut self) {
        self.side = self.side.right();
    }
}

impl Display for Orientation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} facing {}", self.coords, self.side)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turns_are_modular() {
        assert_eq!(Side::Up.left(), Side::Left);
        assert_eq!(Side::Left.left(), Side::Down);
        assert_eq!(Side::Up.right(), Side::Right);
        assert_eq!(Side::Left.right(), Side::Up);

        let mut orientation = Orientation::new(Coord::ORIGIN, Side::Up);
        for _ in 0..4 {
            orientation.turn_right();
        }
        assert_eq!(orientation.side, Side::Up);
    }

    #[test]
    fn turn_counts() {
        assert_eq!(Side::Up.turns_to(Side::Up), 0);
        assert_eq!(Side::Up.turns_to(Side::Left), 1);
        assert_eq!(Side::Up.turns_to(Side::Down), 2);
        assert_eq!(Side::Up.turns_to(Side::Right), 3);
        assert_eq!(Side::Left.turns_to(Side::Down), 1);
    }

    #[test]
    fn heading_between_coords() {
        let at = Coord::new(2, 3);
        assert_eq!(Side::between(at, Coord::new(2, 4)).unwrap(), Side::Up);
        assert_eq!(Side::between(at, Coord::new(2, 2)).unwrap(), Side::Down);
        assert_eq!(Side::between(at, Coord::new(3, 3)).unwrap(), Side::Right);
        assert_eq!(Side::between(at, Coord::new(1, 3)).unwrap(), Side::Left);
    }

    #[test]
    fn heading_between_rejects_impossible_moves() {
        let at = Coord::new(2, 3);
        assert!(matches!(Side::between(at, at), Err(Error::Logic(_))));
        assert!(matches!(
            Side::between(at, Coord::new(3, 4)),
            Err(Error::Logic(_))
        ));
    }

    #[test]
    fn side_from_str() {
        assert_eq!("up".parse::<Side>().unwrap(), Side::Up);
        assert_eq!("LEFT".parse::<Side>().unwrap(), Side::Left);
        assert!("north".parse::<Side>().is_err());
    }

    #[test]
    fn stepping_moves_one_cell() {
        let at = Coord::new(-1, 5);
        assert_eq!(at.step(Side::Up), Coord::new(-1, 6));
        assert_eq!(at.step(Side::Right), Coord::new(0, 5));
        assert_eq!(at.step(Side::Down), Coord::new(-1, 4));
        assert_eq!(at.step(Side::Left), Coord::new(-2, 5));
        assert_eq!(at.along(Axis::X), -1);
        assert_eq!(at.along(Axis::Y), 5);
    }
}
