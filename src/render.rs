//! Picture decoding and frame rendering.
//!
//! The drawing primitives hand the renderer a list of point-lists, each
//! point a pair of integers centered on the origin. Every point-list is
//! drawn in its own color from a fixed palette, cycling when there are
//! more point-lists than palette entries. The canvas is fixed at 320x240;
//! a transformed point falling outside it is fatal.

use std::fs;
use std::path::{Path, PathBuf};

use image::{Rgba, RgbaImage};
use log::debug;
use num_traits::ToPrimitive;

use crate::ast::NodeRef;
use crate::evaluator::Evaluator;
use crate::Error;

pub const WIDTH: u32 = 320;
pub const HEIGHT: u32 = 240;

pub const PALETTE: [[u8; 4]; 7] = [
    [255, 255, 255, 128],
    [255, 255, 0, 128],
    [255, 0, 255, 128],
    [255, 0, 0, 128],
    [0, 255, 255, 128],
    [0, 255, 0, 128],
    [0, 0, 255, 128],
];

const BACKGROUND: [u8; 4] = [0, 0, 0, 255];

pub type Point = (i64, i64);
pub type Picture = Vec<Point>;

/// Consumer of decoded point-lists.
pub trait Renderer {
    fn draw(&mut self, pictures: &[Picture]) -> Result<(), Error>;
}

fn coordinate(ev: &Evaluator, node: &NodeRef) -> Result<i64, Error> {
    ev.as_number(node)?.to_i64().ok_or_else(|| {
        Error::TypeError("point coordinate does not fit the canvas range".to_string())
    })
}

/// Decode one point-list: a cons list of integer pairs.
pub fn decode_picture(ev: &Evaluator, node: &NodeRef) -> Result<Picture, Error> {
    let mut points = Vec::new();
    for item in ev.to_vec(node)? {
        let (x, y) = ev.as_pair(&item)?;
        points.push((coordinate(ev, &x)?, coordinate(ev, &y)?));
    }
    Ok(points)
}

/// Decode a list of point-lists.
pub fn decode_pictures(ev: &Evaluator, node: &NodeRef) -> Result<Vec<Picture>, Error> {
    ev.to_vec(node)?
        .iter()
        .map(|picture| decode_picture(ev, picture))
        .collect()
}

/// Rasterize one frame: black canvas, points recentered on the canvas
/// middle, one palette color per point-list.
pub fn rasterize(pictures: &[Picture]) -> Result<RgbaImage, Error> {
    let mut frame = RgbaImage::from_pixel(WIDTH, HEIGHT, Rgba(BACKGROUND));
    for (index, picture) in pictures.iter().enumerate() {
        let color = PALETTE[index % PALETTE.len()];
        for &(ax, ay) in picture {
            let x = ax + i64::from(WIDTH / 2);
            let y = ay + i64::from(HEIGHT / 2);
            if x < 0 || y < 0 || x >= i64::from(WIDTH) || y >= i64::from(HEIGHT) {
                return Err(Error::RenderBounds { x, y });
            }
            frame.put_pixel(x as u32, y as u32, Rgba(color));
        }
    }
    Ok(frame)
}

/// Renderer that discards pictures; the default collaborator.
pub struct NullRenderer;

impl Renderer for NullRenderer {
    fn draw(&mut self, pictures: &[Picture]) -> Result<(), Error> {
        debug!("discarding {} point lists", pictures.len());
        Ok(())
    }
}

/// Renderer writing each frame as a numbered PNG under a directory.
pub struct ImageRenderer {
    dir: PathBuf,
    frame: usize,
}

impl ImageRenderer {
    pub fn new(dir: &Path) -> Result<Self, Error> {
        fs::create_dir_all(dir).map_err(|e| Error::Io(format!("{}: {e}", dir.display())))?;
        Ok(ImageRenderer {
            dir: dir.to_path_buf(),
            frame: 0,
        })
    }
}

impl Renderer for ImageRenderer {
    fn draw(&mut self, pictures: &[Picture]) -> Result<(), Error> {
        let frame = rasterize(pictures)?;
        let path = self.dir.join(format!("frame-{:04}.png", self.frame));
        frame
            .save(&path)
            .map_err(|e| Error::Io(format!("{}: {e}", path.display())))?;
        self.frame += 1;
        debug!("wrote {}", path.display());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluator::Environment;
    use crate::parser::parse_expression;

    fn evaluator() -> Evaluator {
        Evaluator::new(Environment::global())
    }

    #[test]
    fn test_decode_pictures() {
        let ev = evaluator();
        let node =
            parse_expression("ap ap cons ap ap cons ap ap cons 1 -2 nil nil").unwrap();
        let pictures = decode_pictures(&ev, &node).unwrap();
        assert_eq!(pictures, vec![vec![(1, -2)]]);

        let empty = decode_pictures(&ev, &parse_expression("nil").unwrap()).unwrap();
        assert!(empty.is_empty());
    }

    #[test]
    fn test_decode_rejects_non_pairs() {
        let ev = evaluator();
        let node = parse_expression("ap ap cons 1 nil").unwrap();
        assert!(matches!(
            decode_picture(&ev, &node),
            Err(Error::TypeError(_))
        ));
    }

    #[test]
    fn test_decode_rejects_oversized_coordinates() {
        let ev = evaluator();
        let node = parse_expression(
            "ap ap cons ap ap cons 1180591620717411303424 0 nil",
        )
        .unwrap();
        assert!(matches!(
            decode_picture(&ev, &node),
            Err(Error::TypeError(_))
        ));
    }

    #[test]
    fn test_rasterize_recenters_points() {
        let frame = rasterize(&[vec![(0, 0)]]).unwrap();
        assert_eq!(frame.get_pixel(160, 120).0, PALETTE[0]);
        assert_eq!(frame.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn test_rasterize_cycles_the_palette() {
        let pictures: Vec<Picture> = (0..8).map(|i| vec![(i as i64, 0)]).collect();
        let frame = rasterize(&pictures).unwrap();
        assert_eq!(frame.get_pixel(160, 120).0, PALETTE[0]);
        assert_eq!(frame.get_pixel(161, 120).0, PALETTE[1]);
        // the eighth point-list wraps back to the first color
        assert_eq!(frame.get_pixel(167, 120).0, PALETTE[0]);
    }

    #[test]
    fn test_rasterize_rejects_out_of_canvas_points() {
        assert_eq!(
            rasterize(&[vec![(160, 0)]]).unwrap_err(),
            Error::RenderBounds { x: 320, y: 120 }
        );
        assert_eq!(
            rasterize(&[vec![(-161, 10)]]).unwrap_err(),
            Error::RenderBounds { x: -1, y: 130 }
        );
        assert_eq!(
            rasterize(&[vec![(0, 120)]]).unwrap_err(),
            Error::RenderBounds { x: 160, y: 240 }
        );
    }
}
