use std::path::Path;

use anyhow::{anyhow, bail, Context};
use image::{DynamicImage, GenericImageView};

use crate::grid::{Cell, GridMap};

/// Extensions that are loaded as images instead of text
const IMAGE_EXTENSIONS: [&str; 4] = ["png", "jpg", "jpeg", "bmp"];

/// Parse a maze in the text format: the first line holds the side length `n`, followed by `n`
/// rows of (at least) `n` characters. `X` is a cell one can walk on, anything else is a wall.
/// Anything after the first `n` characters of a row, and after the first `n` rows, is ignored.
pub fn parse_maze(text: &str) -> Result<GridMap, anyhow::Error> {
    let mut lines = text.lines();

    let header = lines.next().ok_or_else(|| anyhow!("maze is empty"))?;
    let n: usize = header
        .trim()
        .parse()
        .with_context(|| format!("invalid maze size {:?}", header.trim()))?;

    if n == 0 {
        bail!("maze size must be at least 1");
    }

    let mut cells = vec![vec![Cell::Wall; n]; n];

    for row in 0..n {
        let line = lines
            .next()
            .ok_or_else(|| anyhow!("expected {} rows, found only {}", n, row))?;

        let chars: Vec<char> = line.chars().take(n).collect();
        if chars.len() < n {
            bail!(
                "row {} has {} characters, expected {}",
                row,
                chars.len(),
                n
            );
        }

        for (col, c) in chars.into_iter().enumerate() {
            cells[row][col] = if c == 'X' { Cell::Open } else { Cell::Wall };
        }
    }

    Ok(GridMap {
        rows: n,
        columns: n,
        cells,
    })
}

/// Turn a black and white image into a map, dark pixels become walls
pub fn parse_img(img: &DynamicImage) -> Result<GridMap, anyhow::Error> {
    let width = img.width() as usize;
    let height = img.height() as usize;

    if width == 0 || height == 0 {
        bail!("image has no pixels");
    }

    let mut cells = vec![vec![Cell::Wall; width]; height];

    for row in 0..height {
        for col in 0..width {
            let p = img.get_pixel(col as u32, row as u32);

            cells[row][col] = if p.0[0] < 128 {
                Cell::Wall
            } else {
                Cell::Open
            }
        }
    }

    Ok(GridMap {
        rows: height,
        columns: width,
        cells,
    })
}

/// Load a maze from a file, images are thresholded and everything else is read as text
pub fn load_maze(path: impl AsRef<Path>) -> Result<GridMap, anyhow::Error> {
    let path = path.as_ref();

    let is_image = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false);

    let parsed = if is_image {
        let img = image::open(path).with_context(|| format!("reading {}", path.display()))?;
        parse_img(&img)
    } else {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("reading {}", path.display()))?;
        parse_maze(&text)
    };
    let map = parsed.with_context(|| format!("parsing {}", path.display()))?;

    log::info!(
        "loaded {}x{} maze with {} open cells from {}",
        map.rows,
        map.columns,
        map.open_cells(),
        path.display()
    );

    Ok(map)
}

#[cfg(test)]
mod test {

    use super::*;
    use image::{GrayImage, Luma};

    #[test]
    fn test_parse_maze() {
        let map = parse_maze("2\nXX\n#X\n").unwrap();
        assert_eq!(map.rows, 2);
        assert_eq!(map.columns, 2);
        assert_eq!(
            map.cells,
            vec![vec![Cell::Open, Cell::Open], vec![Cell::Wall, Cell::Open]]
        );
    }

    #[test]
    fn test_parse_maze_lenient() {
        // windows line endings, padded header, lowercase x is a wall, trailing junk ignored
        let map = parse_maze(" 2 \r\nXxXX\r\nX.\r\nthis line is ignored\r\n").unwrap();
        assert_eq!(map.to_string(), "X#\nX#\n");
    }

    #[test]
    fn test_parse_maze_errors() {
        assert!(parse_maze("").is_err());
        assert!(parse_maze("two\nXX\nXX\n").is_err());
        assert!(parse_maze("0\n").is_err());
        assert!(parse_maze("3\nXXX\nXXX\n").is_err());
        assert!(parse_maze("3\nXXX\nXX\nXXX\n").is_err());

        let err = parse_maze("3\nXXX\n").unwrap_err();
        assert!(err.to_string().contains("expected 3 rows"));
    }

    #[test]
    fn test_parse_img() {
        let img = GrayImage::from_fn(3, 2, |x, y| {
            if x == 1 && y == 0 {
                Luma([0])
            } else {
                Luma([255])
            }
        });
        let map = parse_img(&DynamicImage::ImageLuma8(img)).unwrap();

        assert_eq!(map.rows, 2);
        assert_eq!(map.columns, 3);
        assert_eq!(map.to_string(), "X#X\nXXX\n");
    }

    #[test]
    fn test_load_maze() {
        let path = std::env::temp_dir().join(format!("maze-{}.txt", std::process::id()));
        std::fs::write(&path, "3\nX##\nXXX\n##X\n").unwrap();

        let map = load_maze(&path).unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(map.to_string(), "X##\nXXX\n##X\n");
        assert!(load_maze(&path).is_err());
    }
}
