//! Albers USA Projection Module
//! Composite conic equal-area projection: lower 48 plus Alaska and Hawaii insets.

use crate::geo::Point;

/// Projected position in output pixels, y growing downwards.
pub type ScreenPoint = [f64; 2];

const DEFAULT_SCALE: f64 = 1070.0;
const DEFAULT_TRANSLATE: [f64; 2] = [480.0, 250.0];

const ALASKA_FIPS: i64 = 2;
const HAWAII_FIPS: i64 = 15;
/// American Samoa, Guam, Northern Mariana Islands, Puerto Rico, Virgin Islands.
const UNPROJECTED_FIPS: [i64; 5] = [60, 66, 69, 72, 78];

/// Albers equal-area conic projection around one center.
#[derive(Debug, Clone, Copy)]
struct ConicEqualArea {
    n: f64,
    c: f64,
    r0: f64,
    /// Longitude rotation, degrees.
    rotate: f64,
    scale: f64,
    translate: [f64; 2],
    /// Raw projected position of the center, mapped onto `translate`.
    origin: [f64; 2],
}

impl ConicEqualArea {
    fn new(
        parallels: [f64; 2],
        rotate: f64,
        center: Point,
        scale: f64,
        translate: [f64; 2],
    ) -> Self {
        let sy0 = parallels[0].to_radians().sin();
        let n = (sy0 + parallels[1].to_radians().sin()) / 2.0;
        let c = 1.0 + sy0 * (2.0 * n - sy0);
        let r0 = c.sqrt() / n;

        let mut projection = Self {
            n,
            c,
            r0,
            rotate,
            scale,
            translate,
            origin: [0.0, 0.0],
        };
        // The center is expressed in the rotated frame
        projection.origin = projection.raw(center[0].to_radians(), center[1].to_radians());
        projection
    }

    fn raw(&self, lambda: f64, phi: f64) -> [f64; 2] {
        let r = (self.c - 2.0 * self.n * phi.sin()).max(0.0).sqrt() / self.n;
        let theta = lambda * self.n;
        [r * theta.sin(), self.r0 - r * theta.cos()]
    }

    fn project(&self, point: Point) -> ScreenPoint {
        let lambda = wrap_longitude(point[0] + self.rotate).to_radians();
        let [x, y] = self.raw(lambda, point[1].to_radians());
        [
            self.translate[0] + self.scale * (x - self.origin[0]),
            self.translate[1] - self.scale * (y - self.origin[1]),
        ]
    }
}

fn wrap_longitude(degrees: f64) -> f64 {
    let wrapped = (degrees + 180.0).rem_euclid(360.0) - 180.0;
    if wrapped == -180.0 && degrees > 0.0 {
        180.0
    } else {
        wrapped
    }
}

/// US composite projection. Each region is projected whole by the inset its
/// FIPS code belongs to, so Alaska and Hawaii never split across insets.
#[derive(Debug, Clone, Copy)]
pub struct AlbersUsa {
    lower48: ConicEqualArea,
    alaska: ConicEqualArea,
    hawaii: ConicEqualArea,
}

impl Default for AlbersUsa {
    fn default() -> Self {
        Self::new(DEFAULT_SCALE, DEFAULT_TRANSLATE)
    }
}

impl AlbersUsa {
    pub fn new(k: f64, translate: [f64; 2]) -> Self {
        let [x, y] = translate;
        Self {
            lower48: ConicEqualArea::new([29.5, 45.5], 96.0, [-0.6, 38.7], k, [x, y]),
            alaska: ConicEqualArea::new(
                [55.0, 65.0],
                154.0,
                [-2.0, 58.5],
                0.35 * k,
                [x - 0.307 * k, y + 0.201 * k],
            ),
            hawaii: ConicEqualArea::new(
                [8.0, 18.0],
                157.0,
                [-3.0, 19.9],
                k,
                [x - 0.205 * k, y + 0.212 * k],
            ),
        }
    }

    /// Whether the region has a place on the composite map.
    pub fn covers(&self, region_id: i64) -> bool {
        !UNPROJECTED_FIPS.contains(&region_id)
    }

    pub fn project(&self, region_id: i64, point: Point) -> Option<ScreenPoint> {
        match region_id {
            ALASKA_FIPS => Some(self.alaska.project(point)),
            HAWAII_FIPS => Some(self.hawaii.project(point)),
            id if self.covers(id) => Some(self.lower48.project(point)),
            _ => None,
        }
    }
}

/// Uniform scale and offset that fits projected content inside an extent.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub scale: f64,
    pub offset: [f64; 2],
}

impl Viewport {
    /// Fit the bounding box of `points` into `[min, max]`, preserving aspect
    /// ratio and centering the slack. Empty input gives the identity.
    pub fn fit(points: impl IntoIterator<Item = ScreenPoint>, extent: [ScreenPoint; 2]) -> Self {
        let mut min = [f64::INFINITY; 2];
        let mut max = [f64::NEG_INFINITY; 2];
        for p in points {
            if p[0].is_finite() && p[1].is_finite() {
                for axis in 0..2 {
                    min[axis] = min[axis].min(p[axis]);
                    max[axis] = max[axis].max(p[axis]);
                }
            }
        }
        if min[0] > max[0] {
            return Self {
                scale: 1.0,
                offset: [0.0, 0.0],
            };
        }

        let [lo, hi] = extent;
        let avail = [hi[0] - lo[0], hi[1] - lo[1]];
        let size = [max[0] - min[0], max[1] - min[1]];
        let scale = match (size[0] > 0.0, size[1] > 0.0) {
            (true, true) => (avail[0] / size[0]).min(avail[1] / size[1]),
            (true, false) => avail[0] / size[0],
            (false, true) => avail[1] / size[1],
            (false, false) => 1.0,
        };

        let offset = [
            lo[0] + (avail[0] - size[0] * scale) / 2.0 - min[0] * scale,
            lo[1] + (avail[1] - size[1] * scale) / 2.0 - min[1] * scale,
        ];
        Self { scale, offset }
    }

    pub fn apply(&self, p: ScreenPoint) -> ScreenPoint {
        [
            p[0] * self.scale + self.offset[0],
            p[1] * self.scale + self.offset[1],
        ]
    }
}
