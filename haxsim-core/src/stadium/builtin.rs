//! Built-in Stadiums
//!
//! All ten built-in fields share one layout: a rectangular ball area (with
//! optional rounded corners), two goal nets with posts, outer bounds and a
//! kickoff barrier through the centre circle. They differ only in the
//! parameters of [`FieldSpec`].

use crate::core::point::Point;
use crate::game::team::Team;
use crate::physics::{CollisionFlags, Disc, Plane, Segment, Vertex};

use super::{
    default_ball, Background, BackgroundKind, CameraFollow, Goal, KickOffReset, PlayerPhysics,
    Stadium,
};

/// Names of the built-in stadiums in wire index order.
pub const BUILTIN_NAMES: [&str; 10] = [
    "Classic",
    "Easy",
    "Small",
    "Big",
    "Rounded",
    "Hockey",
    "Big Hockey",
    "Big Easy",
    "Big Rounded",
    "Huge",
];

/// Parameters of a built-in field.
#[derive(Clone, Copy, Debug)]
struct FieldSpec {
    /// Outer half width
    width: f64,
    /// Outer half height
    height: f64,
    /// Ball area half width (goal line x)
    field_width: f64,
    /// Ball area half height
    field_height: f64,
    /// Goal half width
    goal: f64,
    /// Net depth behind the goal line
    net_depth: f64,
    kick_off_radius: f64,
    corner_radius: f64,
    spawn_distance: f64,
    background: BackgroundKind,
    /// Players are held inside the ball area too
    confined: bool,
}

impl FieldSpec {
    const CLASSIC: FieldSpec = FieldSpec {
        width: 420.0,
        height: 200.0,
        field_width: 370.0,
        field_height: 170.0,
        goal: 64.0,
        net_depth: 30.0,
        kick_off_radius: 75.0,
        corner_radius: 0.0,
        spawn_distance: 170.0,
        background: BackgroundKind::Grass,
        confined: false,
    };

    const BIG: FieldSpec = FieldSpec {
        width: 600.0,
        height: 270.0,
        field_width: 550.0,
        field_height: 240.0,
        goal: 80.0,
        net_depth: 40.0,
        kick_off_radius: 80.0,
        corner_radius: 0.0,
        spawn_distance: 310.0,
        background: BackgroundKind::Grass,
        confined: false,
    };

    fn build(&self, index: u8) -> Stadium {
        let mut b = Builder::default();
        let (fw, fh, g) = (self.field_width, self.field_height, self.goal);
        let r = self.corner_radius;

        let wall_mask = if self.confined {
            CollisionFlags::BALL | CollisionFlags::RED | CollisionFlags::BLUE
        } else {
            CollisionFlags::BALL
        };

        // Ball area, walked clockwise from the top-left goal post.
        let outline = [
            (Point::new(-fw, -g), Point::new(-fw, -fh + r)),
            (Point::new(-fw + r, -fh), Point::new(fw - r, -fh)),
            (Point::new(fw, -fh + r), Point::new(fw, -g)),
            (Point::new(fw, g), Point::new(fw, fh - r)),
            (Point::new(fw - r, fh), Point::new(-fw + r, fh)),
            (Point::new(-fw, fh - r), Point::new(-fw, g)),
        ];
        for (a, c) in outline {
            b.wall(a, c, 0.0, 1.0, wall_mask, CollisionFlags::WALL, true);
        }
        if r > 0.0 {
            let corners = [
                (Point::new(-fw, -fh + r), Point::new(-fw + r, -fh)),
                (Point::new(fw - r, -fh), Point::new(fw, -fh + r)),
                (Point::new(fw, fh - r), Point::new(fw - r, fh)),
                (Point::new(-fw + r, fh), Point::new(-fw, fh - r)),
            ];
            for (a, c) in corners {
                b.wall(a, c, 90.0, 1.0, wall_mask, CollisionFlags::WALL, true);
            }
        }

        // Nets.
        let net_mask = CollisionFlags::BALL;
        for side in [-1.0, 1.0] {
            let line = side * fw;
            let back = side * (fw + self.net_depth);
            b.wall(Point::new(line, -g), Point::new(back, -g), 0.0, 0.1, net_mask, CollisionFlags::WALL, true);
            b.wall(Point::new(back, -g), Point::new(back, g), 0.0, 0.1, net_mask, CollisionFlags::WALL, true);
            b.wall(Point::new(back, g), Point::new(line, g), 0.0, 0.1, net_mask, CollisionFlags::WALL, true);
        }

        // Kickoff barrier.
        let ko = self.kick_off_radius;
        let barrier_mask = CollisionFlags::RED | CollisionFlags::BLUE;
        let both_ko = CollisionFlags::RED_KO | CollisionFlags::BLUE_KO;
        b.wall(Point::new(0.0, -self.height), Point::new(0.0, -ko), 0.0, 0.1, barrier_mask, both_ko, false);
        b.wall(Point::new(0.0, ko), Point::new(0.0, self.height), 0.0, 0.1, barrier_mask, both_ko, false);
        let top = b.vertex(Point::new(0.0, -ko), 0.1, barrier_mask, both_ko);
        let bottom = b.vertex(Point::new(0.0, ko), 0.1, barrier_mask, both_ko);
        b.segment(bottom, top, 180.0, 0.1, barrier_mask, CollisionFlags::RED_KO, true);
        b.segment(bottom, top, -180.0, 0.1, barrier_mask, CollisionFlags::BLUE_KO, true);

        let planes = vec![
            plane(Point::new(0.0, 1.0), -self.height, 0.1, CollisionFlags::ALL),
            plane(Point::new(0.0, -1.0), -self.height, 0.1, CollisionFlags::ALL),
            plane(Point::new(1.0, 0.0), -self.width, 0.1, CollisionFlags::ALL),
            plane(Point::new(-1.0, 0.0), -self.width, 0.1, CollisionFlags::ALL),
            plane(Point::new(0.0, 1.0), -fh, 1.0, CollisionFlags::BALL),
            plane(Point::new(0.0, -1.0), -fh, 1.0, CollisionFlags::BALL),
        ];

        let goals = vec![
            Goal { p0: Point::new(-fw, g), p1: Point::new(-fw, -g), team: Team::Red },
            Goal { p0: Point::new(fw, g), p1: Point::new(fw, -g), team: Team::Blue },
        ];

        let mut discs = vec![default_ball()];
        for (x, color) in [(-fw, 0xFFCCCC), (fw, 0xCCCCFF)] {
            for y in [-g, g] {
                discs.push(Disc {
                    pos: Point::new(x, y),
                    radius: 8.0,
                    inv_mass: 0.0,
                    color,
                    ..Disc::default()
                });
            }
        }

        Stadium {
            name: BUILTIN_NAMES[index as usize].to_string(),
            builtin: Some(index),
            width: self.width,
            height: self.height,
            max_view_width: 0,
            camera_follow: CameraFollow::Ball,
            spawn_distance: self.spawn_distance,
            can_be_stored: false,
            kick_off_reset: KickOffReset::Partial,
            background: Background {
                kind: self.background,
                width: fw,
                height: fh,
                kick_off_radius: ko,
                corner_radius: self.corner_radius,
                goal_line: 0.0,
                color: 0x718C5A,
            },
            player_physics: PlayerPhysics::default(),
            vertices: b.vertices,
            segments: b.segments,
            planes,
            goals,
            discs,
            joints: Vec::new(),
            red_spawn_points: Vec::new(),
            blue_spawn_points: Vec::new(),
        }
    }
}

#[derive(Default)]
struct Builder {
    vertices: Vec<Vertex>,
    segments: Vec<Segment>,
}

impl Builder {
    fn vertex(&mut self, pos: Point, b_coef: f64, c_mask: CollisionFlags, c_group: CollisionFlags) -> usize {
        self.vertices.push(Vertex { pos, b_coef, c_mask, c_group });
        self.vertices.len() - 1
    }

    #[allow(clippy::too_many_arguments)]
    fn segment(
        &mut self,
        v0: usize,
        v1: usize,
        curve: f64,
        b_coef: f64,
        c_mask: CollisionFlags,
        c_group: CollisionFlags,
        vis: bool,
    ) {
        let mut seg = Segment::new(v0, v1, &self.vertices, curve, 0.0, b_coef, c_mask, c_group);
        seg.vis = vis;
        self.segments.push(seg);
    }

    #[allow(clippy::too_many_arguments)]
    fn wall(
        &mut self,
        a: Point,
        b: Point,
        curve: f64,
        b_coef: f64,
        c_mask: CollisionFlags,
        c_group: CollisionFlags,
        vis: bool,
    ) {
        let v0 = self.vertex(a, b_coef, c_mask, c_group);
        let v1 = self.vertex(b, b_coef, c_mask, c_group);
        self.segment(v0, v1, curve, b_coef, c_mask, c_group, vis);
    }
}

fn plane(normal: Point, dist: f64, b_coef: f64, c_mask: CollisionFlags) -> Plane {
    Plane {
        normal,
        dist,
        b_coef,
        c_mask,
        c_group: CollisionFlags::WALL,
    }
}

fn spec_for(index: u8) -> Option<FieldSpec> {
    let classic = FieldSpec::CLASSIC;
    let big = FieldSpec::BIG;
    let spec = match index {
        0 => classic,
        1 => FieldSpec { goal: 90.0, ..classic },
        2 => FieldSpec {
            width: 320.0,
            height: 160.0,
            field_width: 270.0,
            field_height: 130.0,
            goal: 55.0,
            kick_off_radius: 60.0,
            spawn_distance: 130.0,
            ..classic
        },
        3 => big,
        4 => FieldSpec { corner_radius: 75.0, ..classic },
        5 => FieldSpec {
            height: 204.0,
            field_width: 368.0,
            field_height: 171.0,
            goal: 80.0,
            kick_off_radius: 65.0,
            corner_radius: 60.0,
            spawn_distance: 200.0,
            background: BackgroundKind::Hockey,
            confined: true,
            ..classic
        },
        6 => FieldSpec {
            corner_radius: 75.0,
            background: BackgroundKind::Hockey,
            confined: true,
            ..big
        },
        7 => FieldSpec { goal: 110.0, ..big },
        8 => FieldSpec { corner_radius: 100.0, ..big },
        9 => FieldSpec {
            width: 750.0,
            height: 350.0,
            field_width: 700.0,
            field_height: 320.0,
            goal: 100.0,
            kick_off_radius: 100.0,
            spawn_distance: 360.0,
            ..big
        },
        _ => return None,
    };
    Some(spec)
}

/// Build the built-in stadium at a wire index.
pub fn by_index(index: u8) -> Option<Stadium> {
    spec_for(index).map(|spec| spec.build(index))
}

/// Build a built-in stadium by (case-insensitive) name.
pub fn by_name(name: &str) -> Option<Stadium> {
    BUILTIN_NAMES
        .iter()
        .position(|n| n.eq_ignore_ascii_case(name))
        .and_then(|i| by_index(i as u8))
}

/// Every built-in stadium in index order.
pub fn all() -> Vec<Stadium> {
    (0..BUILTIN_NAMES.len() as u8).filter_map(by_index).collect()
}

macro_rules! builtin_ctor {
    ($($fn_name:ident => $index:expr),* $(,)?) => {
        impl Stadium {
            $(
                #[doc = concat!("The built-in \"", stringify!($fn_name), "\" stadium.")]
                pub fn $fn_name() -> Stadium {
                    spec_for($index)
                        .unwrap_or(FieldSpec::CLASSIC)
                        .build($index)
                }
            )*
        }
    };
}

builtin_ctor! {
    classic => 0,
    easy => 1,
    small => 2,
    big => 3,
    rounded => 4,
    hockey => 5,
    big_hockey => 6,
    big_easy => 7,
    big_rounded => 8,
    huge => 9,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::physics::World;

    #[test]
    fn test_all_builtins_valid() {
        let stadiums = all();
        assert_eq!(stadiums.len(), 10);
        for (i, s) in stadiums.iter().enumerate() {
            assert!(s.validate().is_ok(), "{} failed validation", s.name);
            assert_eq!(s.builtin, Some(i as u8));
            assert_eq!(s.name, BUILTIN_NAMES[i]);
        }
    }

    #[test]
    fn test_classic_dimensions() {
        let s = Stadium::classic();
        assert_eq!(s.width, 420.0);
        assert_eq!(s.height, 200.0);
        assert_eq!(s.spawn_distance, 170.0);
        assert_eq!(s.background.kick_off_radius, 75.0);
        assert_eq!(s.goals[0].team, Team::Red);
        assert_eq!(s.goals[0].p0.x, -370.0);
        assert_eq!(s.ball().pos, Point::ZERO);
        assert_eq!(s.discs.len(), 5);
    }

    #[test]
    fn test_by_name() {
        assert_eq!(by_name("big hockey").map(|s| s.builtin), Some(Some(6)));
        assert!(by_name("nope").is_none());
    }

    #[test]
    fn test_rounded_corner_keeps_ball_in() {
        let s = Stadium::rounded();
        let mut world = World::from_stadium(&s);
        world.discs[0].vel = Point::new(8.0, -8.0);
        for _ in 0..400 {
            world.step(&s);
            let p = world.discs[0].pos;
            assert!(p.y.abs() <= s.background.height);
            assert!(p.x.abs() <= s.background.width + 40.0);
        }
    }
}
