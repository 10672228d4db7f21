//! Reprojection from geographic coordinates into a raster's native CRS.
//!
//! Built on `proj4rs` with EPSG lookups from `crs-definitions`, so no system
//! PROJ installation is required. A [`CrsTransformer`] parses both
//! projections once; callers keep it alongside the dataset it belongs to.

use std::f64::consts::PI;

use proj4rs::proj::Proj;
use proj4rs::transform::transform;

use crate::error::ProjectionError;

use super::tile::LngLatBounds;

/// Points inserted between corners on each edge when transforming bounds.
pub const DENSIFY_POINTS: usize = 21;

const WGS84_PROJ4: &str = "+proj=longlat +datum=WGS84 +no_defs";

/// Sphere radius used by web mercator.
const EARTH_RADIUS: f64 = 6378137.0;

/// Latitude where web mercator reaches its square extent.
const MAX_MERCATOR_LAT: f64 = 85.051_128_779_806_6;

/// A coordinate reference system as reported by a dataset.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Crs {
    /// Authority code, e.g. `Epsg(32633)`
    Epsg(u32),
    /// Raw proj4 definition string
    Proj4(String),
}

impl Crs {
    /// WGS84 geographic coordinates.
    pub const WGS84: Crs = Crs::Epsg(4326);

    /// Web mercator.
    pub const WEB_MERCATOR: Crs = Crs::Epsg(3857);

    /// Resolve this CRS to a proj4 definition.
    pub fn proj_string(&self) -> Result<String, ProjectionError> {
        match self {
            Crs::Epsg(code) => u16::try_from(*code)
                .ok()
                .and_then(crs_definitions::from_code)
                .map(|def| def.proj4.to_string())
                .ok_or(ProjectionError::UnsupportedEpsg(*code)),
            Crs::Proj4(definition) if definition.trim().is_empty() => {
                Err(ProjectionError::UndefinedCrs)
            }
            Crs::Proj4(definition) => Ok(definition.clone()),
        }
    }

    /// Whether coordinates in this CRS are web-mercator meters.
    pub fn is_web_mercator(&self) -> bool {
        match self {
            Crs::Epsg(code) => matches!(code, 3857 | 3785 | 900913 | 102100 | 102113),
            Crs::Proj4(def) => def.contains("+proj=merc") && def.contains("+a=6378137 +b=6378137"),
        }
    }
}

impl std::fmt::Display for Crs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Crs::Epsg(code) => write!(f, "EPSG:{code}"),
            Crs::Proj4(def) => f.write_str(def),
        }
    }
}

/// Transforms WGS84 longitude/latitude into one target CRS.
pub struct CrsTransformer {
    target_crs: Crs,
    inner: TransformKind,
}

enum TransformKind {
    /// Target is WGS84 already
    Identity,
    /// Spherical web mercator, computed directly
    WebMercator,
    Proj {
        source: Proj,
        target: Proj,
        target_geographic: bool,
    },
}

impl CrsTransformer {
    /// Build a transformer from WGS84 into `target`.
    ///
    /// Fails when the target CRS is undefined or cannot be parsed; callers
    /// must surface this rather than fall back to a default CRS.
    pub fn from_wgs84(target: &Crs) -> Result<Self, ProjectionError> {
        if *target == Crs::WGS84 {
            return Ok(Self {
                target_crs: target.clone(),
                inner: TransformKind::Identity,
            });
        }
        if target.is_web_mercator() {
            return Ok(Self {
                target_crs: target.clone(),
                inner: TransformKind::WebMercator,
            });
        }

        let target_def = target.proj_string()?;
        let source = parse_proj(WGS84_PROJ4)?;
        let target_proj = parse_proj(&target_def)?;

        Ok(Self {
            target_crs: target.clone(),
            inner: TransformKind::Proj {
                source,
                target: target_proj,
                target_geographic: target_def.contains("+proj=longlat")
                    || target_def.contains("+proj=latlong"),
            },
        })
    }

    /// The CRS this transformer projects into.
    pub fn target_crs(&self) -> &Crs {
        &self.target_crs
    }

    /// Transform a single longitude/latitude pair in degrees.
    pub fn transform_point(&self, lon: f64, lat: f64) -> Result<(f64, f64), ProjectionError> {
        match &self.inner {
            TransformKind::Identity => Ok((lon, lat)),
            TransformKind::WebMercator => {
                let lat = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT);
                let x = EARTH_RADIUS * lon.to_radians();
                let y = EARTH_RADIUS * (PI / 4.0 + lat.to_radians() / 2.0).tan().ln();
                Ok((x, y))
            }
            TransformKind::Proj {
                source,
                target,
                target_geographic,
            } => {
                // proj4rs works in radians for geographic systems
                let mut point = (lon.to_radians(), lat.to_radians(), 0.0);
                transform(source, target, &mut point)
                    .map_err(|e| ProjectionError::Transform(format!("{e:?}")))?;

                let (x, y) = if *target_geographic {
                    (point.0.to_degrees(), point.1.to_degrees())
                } else {
                    (point.0, point.1)
                };

                if !x.is_finite() || !y.is_finite() {
                    return Err(ProjectionError::Transform(format!(
                        "({lon}, {lat}) has no finite image in {}",
                        self.target_crs
                    )));
                }
                Ok((x, y))
            }
        }
    }

    /// Transform geographic bounds to `[left, bottom, right, top]` in the
    /// target CRS.
    ///
    /// Each edge is densified with [`DENSIFY_POINTS`] intermediate points so
    /// curved edges in the target CRS are fully enclosed. Points that fail to
    /// project are skipped; the call fails only if none succeed.
    pub fn transform_bounds(&self, bounds: &LngLatBounds) -> Result<[f64; 4], ProjectionError> {
        if matches!(self.inner, TransformKind::Identity) {
            return Ok([bounds.west, bounds.south, bounds.east, bounds.north]);
        }

        let mut left = f64::INFINITY;
        let mut bottom = f64::INFINITY;
        let mut right = f64::NEG_INFINITY;
        let mut top = f64::NEG_INFINITY;
        let mut last_error = None;

        for (lon, lat) in edge_points(bounds, DENSIFY_POINTS) {
            match self.transform_point(lon, lat) {
                Ok((x, y)) => {
                    left = left.min(x);
                    right = right.max(x);
                    bottom = bottom.min(y);
                    top = top.max(y);
                }
                Err(e) => last_error = Some(e),
            }
        }

        if !left.is_finite() || !top.is_finite() {
            return Err(last_error.unwrap_or_else(|| {
                ProjectionError::Transform("no bounds point could be projected".to_string())
            }));
        }

        Ok([left, bottom, right, top])
    }
}

impl std::fmt::Debug for CrsTransformer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrsTransformer")
            .field("target_crs", &self.target_crs)
            .finish()
    }
}

fn parse_proj(definition: &str) -> Result<Proj, ProjectionError> {
    Proj::from_proj_string(definition).map_err(|e| ProjectionError::InvalidDefinition {
        definition: definition.to_string(),
        message: format!("{e:?}"),
    })
}

/// Corner and intermediate points walking the perimeter of `bounds`.
fn edge_points(bounds: &LngLatBounds, densify: usize) -> Vec<(f64, f64)> {
    let steps = densify + 1;
    let mut points = Vec::with_capacity(steps * 4);

    for i in 0..steps {
        let t = i as f64 / steps as f64;
        let lon = bounds.west + (bounds.east - bounds.west) * t;
        let lat = bounds.south + (bounds.north - bounds.south) * t;
        // bottom edge west→east, right edge south→north,
        // top edge east→west, left edge north→south
        points.push((lon, bounds.south));
        points.push((bounds.east, lat));
        points.push((bounds.east - (bounds.east - bounds.west) * t, bounds.north));
        points.push((bounds.west, bounds.north - (bounds.north - bounds.south) * t));
    }

    points
}
