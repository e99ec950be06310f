#[macro_use] extern crate log;

use futures::future::try_join_all;
use image::{DynamicImage, GenericImage};
use reqwest::Client;
use std::f64::consts::PI;
use std::path::Path;

/// (lat_min, lon_min, lat_max, lon_max)
pub type BoundingBox = (f64, f64, f64, f64);

/// Contiguous United States
pub const CONUS_BBOX: BoundingBox = (24.7433195, -124.7844079, 49.3457868, -66.9513812);

/// Zoom at which CONUS fits a desktop window
pub const DEFAULT_ZOOM: u32 = 5;

pub const TILE_SIZE: u32 = 256;

const DEFAULT_TILE_SERVER: &str = "https://b.tile.openstreetmap.de";

/// Convert lat/lon to OSM tile number at zoom z
pub fn lat_lon_to_tile(lat_deg: f64, lon_deg: f64, zoom: u32) -> (u32, u32) {
    let (x, y) = lat_lon_to_pixel(lat_deg, lon_deg, zoom);
    let size = TILE_SIZE as f64;
    ((x / size).floor() as u32, (y / size).floor() as u32)
}

/// Convert lat/lon to Web-Mercator world pixel coordinates at zoom z
pub fn lat_lon_to_pixel(lat_deg: f64, lon_deg: f64, zoom: u32) -> (f64, f64) {
    let lat_rad = lat_deg.to_radians();
    let n = TILE_SIZE as f64 * 2u32.pow(zoom) as f64;
    let x = ((lon_deg + 180.0) / 360.0) * n;
    let y = ((1.0 - (lat_rad.tan() + 1.0 / lat_rad.cos()).ln() / PI) / 2.0) * n;
    (x, y)
}

/// Inverse of `lat_lon_to_pixel`
pub fn pixel_to_lat_lon(x: f64, y: f64, zoom: u32) -> (f64, f64) {
    let n = TILE_SIZE as f64 * 2u32.pow(zoom) as f64;
    let lon = x / n * 360.0 - 180.0;
    let lat = (PI * (1.0 - 2.0 * y / n)).sinh().atan().to_degrees();
    (lat, lon)
}

/// Ray-casting point-in-polygon test, in any planar coordinate space
pub fn point_in_polygon(point: (f64, f64), ring: &[(f64, f64)]) -> bool {
    if ring.len() < 3 {
        return false;
    }

    let (px, py) = point;
    let mut inside = false;
    let mut j = ring.len() - 1;

    for i in 0..ring.len() {
        let (xi, yi) = ring[i];
        let (xj, yj) = ring[j];
        if (yi > py) != (yj > py) && px < (xj - xi) * (py - yi) / (yj - yi) + xi {
            inside = !inside;
        }
        j = i;
    }

    inside
}

/// Maps geographic coordinates onto a cropped basemap image
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MapView {
    pub zoom: u32,
    /// World pixel of the image's top-left corner
    pub origin: (f64, f64),
    pub width: u32,
    pub height: u32,
}

impl MapView {
    pub fn for_bbox(bbox: BoundingBox, zoom: u32) -> Self {
        let (lat_min, lon_min, lat_max, lon_max) = normalize(bbox);

        let (x_left, y_top) = lat_lon_to_pixel(lat_max, lon_min, zoom);
        let (x_right, y_bottom) = lat_lon_to_pixel(lat_min, lon_max, zoom);

        Self {
            zoom,
            origin: (x_left, y_top),
            width: (x_right - x_left).max(1.0) as u32,
            height: (y_bottom - y_top).max(1.0) as u32,
        }
    }

    /// Image pixel of a (lat, lon) point; may fall outside the image
    pub fn project(&self, lat: f64, lon: f64) -> (f64, f64) {
        let (x, y) = lat_lon_to_pixel(lat, lon, self.zoom);
        (x - self.origin.0, y - self.origin.1)
    }

    /// (lat, lon) under an image pixel
    pub fn unproject(&self, x: f64, y: f64) -> (f64, f64) {
        pixel_to_lat_lon(x + self.origin.0, y + self.origin.1, self.zoom)
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= 0.0 && y >= 0.0 && x < self.width as f64 && y < self.height as f64
    }

    /// Project a (lat, lon) ring into image pixels
    pub fn project_ring(&self, ring: &[(f64, f64)]) -> Vec<(f64, f64)> {
        ring.iter().map(|(lat, lon)| self.project(*lat, *lon)).collect()
    }
}

fn normalize(bbox: BoundingBox) -> BoundingBox {
    let (lat1, lon1, lat2, lon2) = bbox;
    (lat1.min(lat2), lon1.min(lon2), lat1.max(lat2), lon1.max(lon2))
}

/// OpenStreetMap tile client for the dashboard basemap
pub struct BasemapAPI {
    client: Client,
    tile_server: String,
}

impl BasemapAPI {
    pub fn new() -> Result<Self, anyhow::Error> {
        // The OSM tile usage policy requires an identifying User-Agent
        let client = Client::builder()
            .user_agent("WarningNav (warningnav@example.com)")
            .build()?;

        Ok(Self {
            client,
            tile_server: DEFAULT_TILE_SERVER.to_string(),
        })
    }

    pub fn tile_url(&self, z: u32, x: u32, y: u32) -> String {
        format!("{}/{}/{}/{}.png", self.tile_server, z, x, y)
    }

    /// Download a single tile as an image
    pub async fn download_tile(&self, z: u32, x: u32, y: u32) -> Result<DynamicImage, anyhow::Error> {
        let url = self.tile_url(z, x, y);
        debug!("Downloading {}", url);
        let resp = self.client.get(&url).send().await?;
        if resp.status().is_success() {
            let bytes = resp.bytes().await?;
            Ok(image::load_from_memory(&bytes)?)
        } else {
            Err(anyhow::anyhow!("Failed to download tile: HTTP {}", resp.status()))
        }
    }

    /// Download all tiles covering a bounding box, as rows
    pub async fn download_tiles(&self, bbox: BoundingBox, zoom: u32) -> Result<Vec<Vec<DynamicImage>>, anyhow::Error> {
        let (lat_min, lon_min, lat_max, lon_max) = normalize(bbox);

        let (x_start, y_start) = lat_lon_to_tile(lat_max, lon_min, zoom);
        let (x_end, y_end) = lat_lon_to_tile(lat_min, lon_max, zoom);
        let columns = (x_end - x_start + 1) as usize;

        let futures = (y_start..=y_end)
            .flat_map(|y| (x_start..=x_end).map(move |x| (x, y)))
            .map(|(x, y)| self.download_tile(zoom, x, y));

        let tiles_flat: Vec<DynamicImage> = try_join_all(futures).await?;
        info!("Downloaded {} tiles at zoom {}", tiles_flat.len(), zoom);

        Ok(tiles_flat.chunks(columns).map(|row| row.to_vec()).collect())
    }

    /// Download and crop the basemap to the exact bounding box
    pub async fn download_map(&self, bbox: BoundingBox, zoom: u32) -> Result<(DynamicImage, MapView), anyhow::Error> {
        let view = MapView::for_bbox(bbox, zoom);
        let tiles = self.download_tiles(bbox, zoom).await?;
        let mut stitched = stitch_tiles(&tiles)?;

        // Offset of the bbox corner inside its top-left tile
        let offset_x = view.origin.0 % TILE_SIZE as f64;
        let offset_y = view.origin.1 % TILE_SIZE as f64;

        let cropped = stitched.crop(offset_x as u32, offset_y as u32, view.width, view.height);
        Ok((cropped, view))
    }

    /// Load the cached basemap, downloading and saving it on first use
    pub async fn load_or_download(&self, bbox: BoundingBox, zoom: u32, path: &Path) -> Result<(DynamicImage, MapView), anyhow::Error> {
        let view = MapView::for_bbox(bbox, zoom);

        if path.exists() {
            let image = image::open(path)?;
            if (image.width(), image.height()) == (view.width, view.height) {
                info!("Loaded basemap from {:?}", path);
                return Ok((image, view));
            }
            warn!("Cached basemap {:?} has the wrong size, downloading again", path);
        }

        let (image, view) = self.download_map(bbox, zoom).await?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        image.save(path)?;
        info!("Saved basemap to {:?}", path);

        Ok((image, view))
    }
}

/// Stitch rows of equally sized tiles into a single image
pub fn stitch_tiles(tiles: &[Vec<DynamicImage>]) -> Result<DynamicImage, anyhow::Error> {
    let columns = tiles.first().map(Vec::len).unwrap_or(0) as u32;
    if columns == 0 {
        return Err(anyhow::anyhow!("No tiles to stitch"));
    }

    let mut final_image = DynamicImage::new_rgb8(columns * TILE_SIZE, tiles.len() as u32 * TILE_SIZE);

    for (row_idx, row) in tiles.iter().enumerate() {
        for (col_idx, tile) in row.iter().enumerate() {
            final_image.copy_from(tile, col_idx as u32 * TILE_SIZE, row_idx as u32 * TILE_SIZE)?;
        }
    }

    Ok(final_image)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lat_lon_to_tile() {
        assert_eq!(lat_lon_to_tile(0.0, 0.0, 0), (0, 0));
        assert_eq!(lat_lon_to_tile(0.0, 0.0, 1), (1, 1));
        // Oklahoma City
        assert_eq!(lat_lon_to_tile(35.4676, -97.5164, 5), (7, 12));
    }

    #[test]
    fn test_projection_monotonic() {
        let view = MapView::for_bbox(CONUS_BBOX, DEFAULT_ZOOM);
        let (west, _) = view.project(35.0, -110.0);
        let (east, _) = view.project(35.0, -90.0);
        let (_, north) = view.project(45.0, -100.0);
        let (_, south) = view.project(30.0, -100.0);
        assert!(west < east);
        assert!(north < south);
    }

    #[test]
    fn test_bbox_corners_map_to_image_corners() {
        let view = MapView::for_bbox(CONUS_BBOX, DEFAULT_ZOOM);
        let (lat_min, lon_min, lat_max, lon_max) = CONUS_BBOX;

        let (x, y) = view.project(lat_max, lon_min);
        assert!(x.abs() < 1e-9 && y.abs() < 1e-9);

        let (x, y) = view.project(lat_min, lon_max);
        assert!((x - view.width as f64).abs() < 1.0);
        assert!((y - view.height as f64).abs() < 1.0);

        assert!(view.width > 1000 && view.width < 1500);
        assert!(view.contains(10.0, 10.0));
        assert!(!view.contains(-1.0, 10.0));
    }

    #[test]
    fn test_unproject_inverts_project() {
        let view = MapView::for_bbox(CONUS_BBOX, DEFAULT_ZOOM);
        let (x, y) = view.project(35.4676, -97.5164);
        let (lat, lon) = view.unproject(x, y);
        assert!((lat - 35.4676).abs() < 1e-6);
        assert!((lon + 97.5164).abs() < 1e-6);
    }

    #[test]
    fn test_point_in_polygon() {
        let square = [(0.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)];
        assert!(point_in_polygon((5.0, 5.0), &square));
        assert!(!point_in_polygon((15.0, 5.0), &square));

        // Concave "C": the notch is outside
        let c_shape = [(0.0, 0.0), (10.0, 0.0), (10.0, 3.0), (3.0, 3.0), (3.0, 7.0), (10.0, 7.0), (10.0, 10.0), (0.0, 10.0)];
        assert!(point_in_polygon((1.0, 5.0), &c_shape));
        assert!(!point_in_polygon((6.0, 5.0), &c_shape));

        assert!(!point_in_polygon((0.0, 0.0), &[(0.0, 0.0), (1.0, 1.0)]));
    }

    #[test]
    fn test_stitch_tiles() {
        let tile = DynamicImage::new_rgb8(TILE_SIZE, TILE_SIZE);
        let rows = vec![vec![tile.clone(), tile.clone(), tile.clone()], vec![tile.clone(), tile.clone(), tile]];
        let stitched = stitch_tiles(&rows).unwrap();
        assert_eq!((stitched.width(), stitched.height()), (3 * TILE_SIZE, 2 * TILE_SIZE));
        assert!(stitch_tiles(&[]).is_err());
    }

    #[test]
    fn test_tile_url() {
        let api = BasemapAPI::new().unwrap();
        assert_eq!(api.tile_url(5, 7, 12), "https://b.tile.openstreetmap.de/5/7/12.png");
    }
}
