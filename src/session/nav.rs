// Navigation phase: orient the robot from two probe moves, then drive it
// to the origin. Obstacles are never known up front; the planners learn
// them one refused move at a time.
use crate::codec::{self, ClientRecord, ServerRecord};
use crate::config::Planner;
use crate::grid::{Axis, Coord, Orientation, Side};
use crate::session::SessionState;
use crate::transport::{RecordReader, RecordWriter};
use crate::{Error, ServerResult};
use log::{debug, info};
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncWrite};

/// Drives one robot to the origin.
pub struct Navigator<'a, R, W> {
    reader: &'a mut RecordReader<R>,
    writer: &'a mut RecordWriter<W>,
    planner: Planner,
    read_timeout: Duration,
    state: &'a mut SessionState,
    id: u64,
}

impl<'a, R: AsyncRead + Unpin, W: AsyncWrite + Unpin> Navigator<'a, R, W> {
    pub fn new(
        reader: &'a mut RecordReader<R>,
        writer: &'a mut RecordWriter<W>,
        planner: Planner,
        read_timeout: Duration,
        state: &'a mut SessionState,
        id: u64,
    ) -> Self {
        Self {
            reader,
            writer,
            planner,
            read_timeout,
            state,
            id,
        }
    }

    /// Orients the robot, then pilots it to `(0,0)` with the configured
    /// planner. Returns as soon as the robot reports the origin.
    pub async fn guide_home(&mut self) -> ServerResult<()> {
        *self.state = SessionState::Orienting;
        let Some(mut orientation) = self.orient().await? else {
            info!("session {}: robot spawned on the origin", self.id);
            return Ok(());
        };
        info!("session {}: robot at {}", self.id, orientation);

        *self.state = SessionState::Navigating;
        match self.planner {
            Planner::Simple => self.drive_axes(&mut orientation).await?,
            Planner::Bfs => self.drive_replanning(&mut orientation).await?,
        }
        info!("session {}: robot reached the origin", self.id);
        Ok(())
    }

    // Two probe moves reveal position and heading. A blocked probe is
    // retried after a left turn until the robot actually moves; the first
    // reply short-circuits when the robot already sits on the origin.
    async fn orient(&mut self) -> ServerResult<Option<Orientation>> {
        let first = self.step().await?;
        if first == Coord::ORIGIN {
            return Ok(None);
        }
        let mut second = self.step().await?;
        while second == first {
            self.turn(ServerRecord::TurnLeft).await?;
            second = self.step().await?;
        }
        let side = Side::between(first, second)?;
        Ok(Some(Orientation::new(second, side)))
    }

    // ======= Simple planner =======

    // X first, then Y, each axis cleared independently.
    async fn drive_axes(&mut self, orientation: &mut Orientation) -> ServerResult<()> {
        self.drive_axis(orientation, Axis::X).await?;
        self.drive_axis(orientation, Axis::Y).await
    }

    async fn drive_axis(
        &mut self,
        orientation: &mut Orientation,
        axis: Axis,
    ) -> ServerResult<()> {
        debug!("session {}: clearing axis {}", self.id, axis);
        let heading = match axis {
            Axis::X => {
                if orientation.coords.x > 0 {
                    Side::Left
                } else {
                    Side::Right
                }
            }
            Axis::Y => {
                if orientation.coords.y > 0 {
                    Side::Down
                } else {
                    Side::Up
                }
            }
        };
        self.rotate_to(orientation, heading).await?;

        while orientation.coords.along(axis) != 0 {
            let reported = self.step().await?;
            if reported == orientation.coords {
                debug!(
                    "session {}: obstacle ahead of {}",
                    self.id, orientation
                );
                orientation.coords = match axis {
                    Axis::X => self.sidestep(orientation).await?,
                    Axis::Y => self.bypass(orientation).await?,
                };
            } else {
                orientation.coords = reported;
            }
            debug!("session {}: robot at {}", self.id, orientation.coords);
        }
        Ok(())
    }

    // One square to the side and back on heading; clearing Y afterwards
    // re-approaches the skipped X column from the side.
    async fn sidestep(&mut self, orientation: &mut Orientation) -> ServerResult<Coord> {
        if orientation.coords.x < 0 {
            orientation.turn_right();
            self.turn(ServerRecord::TurnRight).await?;
            self.step().await?;
            orientation.turn_left();
            self.turn(ServerRecord::TurnLeft).await
        } else {
            orientation.turn_left();
            self.turn(ServerRecord::TurnLeft).await?;
            self.step().await?;
            orientation.turn_right();
            self.turn(ServerRecord::TurnRight).await
        }
    }

    // Loop around a single obstacle to the right and fall back onto the
    // original heading, one square past the blockage.
    async fn bypass(&mut self, orientation: &mut Orientation) -> ServerResult<Coord> {
        orientation.turn_right();
        self.turn(ServerRecord::TurnRight).await?;
        self.step().await?;
        orientation.turn_left();
        self.turn(ServerRecord::TurnLeft).await?;
        self.step().await?;
        self.step().await?;
        orientation.turn_left();
        self.turn(ServerRecord::TurnLeft).await?;
        self.step().await?;
        orientation.turn_right();
        self.turn(ServerRecord::TurnRight).await
    }

    // ======= BFS planner =======

    // Walk shortest paths over the discovered obstacle set, re-planning
    // whenever the robot refuses a step (new obstacle) or reports a cell
    // off the plan.
    async fn drive_replanning(&mut self, orientation: &mut Orientation) -> ServerResult<()> {
        let mut obstacles: HashSet<Coord> = HashSet::new();
        while orientation.coords != Coord::ORIGIN {
            let path = shortest_path(orientation.coords, Coord::ORIGIN, &obstacles)
                .ok_or_else(|| {
                    Error::Logic("robot claims to be walled in on every path".to_string())
                })?;
            for next in path {
                let heading = Side::between(orientation.coords, next)?;
                self.rotate_to(orientation, heading).await?;
                let reported = self.step().await?;
                if reported == orientation.coords {
                    debug!("session {}: obstacle discovered at {}", self.id, next);
                    // The origin is never blocked; a robot claiming so
                    // would starve the search.
                    if next != Coord::ORIGIN {
                        obstacles.insert(next);
                    }
                    break;
                }
                orientation.coords = reported;
                if reported != next {
                    debug!(
                        "session {}: robot strayed to {}, re-planning",
                        self.id, reported
                    );
                    break;
                }
            }
        }
        Ok(())
    }

    // ======= Shared command plumbing =======

    // Shortest rotation onto `target`: nothing, one left, one right, or
    // two rights for a half turn.
    async fn rotate_to(
        &mut self,
        orientation: &mut Orientation,
        target: Side,
    ) -> ServerResult<()> {
        match orientation.side.turns_to(target) {
            0 => {}
            1 => {
                orientation.turn_left();
                self.turn(ServerRecord::TurnLeft).await?;
            }
            3 => {
                orientation.turn_right();
                self.turn(ServerRecord::TurnRight).await?;
            }
            _ => {
                orientation.turn_right();
                self.turn(ServerRecord::TurnRight).await?;
                orientation.turn_right();
                self.turn(ServerRecord::TurnRight).await?;
            }
        }
        Ok(())
    }

    async fn step(&mut self) -> ServerResult<Coord> {
        self.writer.write(ServerRecord::Move).await?;
        self.read_position().await
    }

    // Turns also report coordinates; bypass sequences use the last such
    // report as the robot's authoritative position.
    async fn turn(&mut self, record: ServerRecord) -> ServerResult<Coord> {
        self.writer.write(record).await?;
        self.read_position().await
    }

    async fn read_position(&mut self) -> ServerResult<Coord> {
        let record = self
            .reader
            .read(ClientRecord::Position.max_len(), self.read_timeout)
            .await?;
        codec::decode_position(&record)
    }
}

/// Breadth-first shortest path from `from` to `to` on the 4-connected
/// grid, avoiding `obstacles`. Returns the cells after `from`, in walking
/// order, or `None` when the obstacle set has closed every route (only
/// possible when it encloses `from`, so the search space is finite).
fn shortest_path(from: Coord, to: Coord, obstacles: &HashSet<Coord>) -> Option<Vec<Coord>> {
    if from == to {
        return Some(Vec::new());
    }

    let mut predecessor: HashMap<Coord, Coord> = HashMap::new();
    let mut queue: VecDeque<Coord> = VecDeque::new();
    predecessor.insert(from, from);
    queue.push_back(from);

    'search: while let Some(cell) = queue.pop_front() {
        for next in [
            Coord::new(cell.x - 1, cell.y),
            Coord::new(cell.x + 1, cell.y),
            Coord::new(cell.x, cell.y - 1),
            Coord::new(cell.x, cell.y + 1),
        ] {
            if obstacles.contains(&next) || predecessor.contains_key(&next) {
                continue;
            }
            predecessor.insert(next, cell);
            if next == to {
                break 'search;
            }
            queue.push_back(next);
        }
    }

    predecessor.contains_key(&to).then(|| {
        let mut path = vec![to];
        let mut cell = to;
        while predecessor[&cell] != from {
            cell = predecessor[&cell];
            path.push(cell);
        }
        path.reverse();
        path
    })
}
